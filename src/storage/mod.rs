//! Blob store adapter for media attachments.
//!
//! Every uploaded object gets a fresh `{prefix}/{uuid}.{ext}` name and is
//! publicly readable; the URL handed back to clients is permanent.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod gcs;
pub mod local;

pub use gcs::GcsBlobStore;
pub use local::LocalBlobStore;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("blob store returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("blob store authentication failed: {0}")]
    Auth(String),
}

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub content: Bytes,
}

impl Upload {
    /// Extension for the stored object: the client's, else one derived
    /// from the content type.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| std::path::Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        if let Some(ext) = from_name {
            return ext.to_ascii_lowercase();
        }
        match self.content_type.as_str() {
            "image/jpeg" => "jpg".into(),
            "image/svg+xml" => "svg".into(),
            other => other
                .strip_prefix("image/")
                .unwrap_or("bin")
                .to_string(),
        }
    }
}

/// Location of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub path: String,
    pub url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `content` at exactly `path`, publicly readable.
    async fn put_object(&self, path: &str, content: Bytes, content_type: &str)
        -> Result<(), BlobError>;

    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    async fn exists(&self, path: &str) -> Result<bool, BlobError>;

    fn public_url(&self, path: &str) -> String;

    /// Upload under a generated unique name below `prefix`.
    async fn upload(
        &self,
        prefix: &str,
        extension: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<StoredBlob, BlobError> {
        let path = object_name(prefix, extension);
        self.put_object(&path, content, content_type).await?;
        Ok(StoredBlob {
            url: self.public_url(&path),
            path,
        })
    }
}

pub fn object_name(prefix: &str, extension: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        format!("{}/{}", prefix, Uuid::new_v4())
    } else {
        format!("{}/{}.{}", prefix, Uuid::new_v4(), extension.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_are_unique_and_prefixed() {
        let a = object_name("players/", ".JPG");
        let b = object_name("players", "jpg");
        assert_ne!(a, b);
        assert!(a.starts_with("players/"));
        assert!(a.ends_with(".jpg"));
    }

    #[test]
    fn upload_extension_prefers_file_name() {
        let mut upload = Upload {
            file_name: Some("Portrait.JPEG".into()),
            content_type: "image/jpeg".into(),
            content: Bytes::new(),
        };
        assert_eq!(upload.extension(), "jpeg");

        upload.file_name = None;
        assert_eq!(upload.extension(), "jpg");
        upload.content_type = "image/png".into();
        assert_eq!(upload.extension(), "png");
    }

    #[test]
    fn object_name_without_extension() {
        let name = object_name("gallery", "");
        assert!(!name.ends_with('.'));
        assert_eq!(name.matches('/').count(), 1);
    }
}
