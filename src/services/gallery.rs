use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::storage::{BlobError, BlobStore, Upload};
use crate::validation::{self, FieldErrors, ImageRule};

const PREFIX: &str = "gallery";

const GALLERY_IMAGE: ImageRule = ImageRule {
    max_kilobytes: 5120,
    content_types: &["image/jpeg", "image/png", "image/gif"],
};

/// Uploaded gallery image, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryFile {
    pub name: String,
    pub url: String,
}

/// Free-standing image uploads not attached to any resource.
#[derive(Clone)]
pub struct GalleryService {
    blobs: Arc<dyn BlobStore>,
}

impl GalleryService {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Validate every image first, then upload them in order.
    pub async fn upload(&self, images: Vec<Upload>) -> Result<Vec<GalleryFile>, ApiError> {
        let mut errors = FieldErrors::new();
        if images.is_empty() {
            errors.add("images", "The images field is required.");
        }
        for (index, image) in images.iter().enumerate() {
            validation::validate_image(&format!("images.{index}"), &GALLERY_IMAGE, image, &mut errors);
        }
        errors.into_result()?;

        let mut files = Vec::with_capacity(images.len());
        for image in images {
            let blob = self
                .blobs
                .upload(PREFIX, &image.extension(), image.content, &image.content_type)
                .await?;
            tracing::info!("gallery image uploaded to {}", blob.path);
            files.push(GalleryFile {
                name: blob.path,
                url: blob.url,
            });
        }
        Ok(files)
    }

    pub async fn delete(&self, filename: &str) -> Result<(), ApiError> {
        let filename = filename.trim();
        if filename.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("filename", "The filename field is required.");
            return Err(errors.into());
        }

        // Only gallery objects; resource images are owned by their records.
        let in_gallery = filename
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|name| !name.is_empty() && !name.split('/').any(|part| part == ".."));
        if !in_gallery {
            return Err(ApiError::NotFound("File"));
        }

        let exists = match self.blobs.exists(filename).await {
            Ok(exists) => exists,
            Err(BlobError::InvalidPath(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if !exists {
            return Err(ApiError::NotFound("File"));
        }

        self.blobs.delete(filename).await?;
        tracing::info!("gallery image {} deleted", filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::storage::LocalBlobStore;

    fn png(size: usize) -> Upload {
        Upload {
            file_name: Some("court.png".into()),
            content_type: "image/png".into(),
            content: Bytes::from(vec![7_u8; size]),
        }
    }

    #[tokio::test]
    async fn uploads_land_under_gallery_prefix() {
        let media = tempfile::tempdir().unwrap();
        let gallery = GalleryService::new(Arc::new(LocalBlobStore::new(media.path(), "http://cdn")));

        let files = gallery.upload(vec![png(10), png(20)]).await.unwrap();
        assert_eq!(files.len(), 2);
        for file in &files {
            assert!(file.name.starts_with("gallery/"));
            assert!(file.name.ends_with(".png"));
            assert_eq!(file.url, format!("http://cdn/{}", file.name));
            assert!(media.path().join(&file.name).exists());
        }
    }

    #[tokio::test]
    async fn one_bad_image_rejects_the_batch() {
        let media = tempfile::tempdir().unwrap();
        let gallery = GalleryService::new(Arc::new(LocalBlobStore::new(media.path(), "http://cdn")));

        let mut webp = png(10);
        webp.content_type = "image/webp".into();
        let err = gallery.upload(vec![png(10), webp]).await.unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert!(errors.get("images.0").is_none());
                assert_eq!(errors.get("images.1").unwrap().len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!media.path().join(PREFIX).exists());
    }

    #[tokio::test]
    async fn delete_reports_missing_files() {
        let media = tempfile::tempdir().unwrap();
        let gallery = GalleryService::new(Arc::new(LocalBlobStore::new(media.path(), "http://cdn")));

        let files = gallery.upload(vec![png(10)]).await.unwrap();
        gallery.delete(&files[0].name).await.unwrap();
        assert!(!media.path().join(&files[0].name).exists());

        let err = gallery.delete(&files[0].name).await.unwrap_err();
        assert_eq!(err.to_string(), "File not found");
        let err = gallery.delete("../etc/passwd").await.unwrap_err();
        assert_eq!(err.to_string(), "File not found");
        let err = gallery.delete("gallery/../players/a.png").await.unwrap_err();
        assert_eq!(err.to_string(), "File not found");
    }

    #[tokio::test]
    async fn delete_leaves_resource_images_alone() {
        let media = tempfile::tempdir().unwrap();
        let blobs = Arc::new(LocalBlobStore::new(media.path(), "http://cdn"));
        let gallery = GalleryService::new(blobs.clone());

        let player_image = blobs
            .upload("players", "png", Bytes::from_static(b"face"), "image/png")
            .await
            .unwrap();
        for name in [player_image.path.as_str(), "gallery/", "galleryx/a.png"] {
            let err = gallery.delete(name).await.unwrap_err();
            assert_eq!(err.to_string(), "File not found");
        }
        assert!(blobs.exists(&player_image.path).await.unwrap());
    }
}
