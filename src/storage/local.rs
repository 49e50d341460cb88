//! Filesystem blob store, served back over HTTP under `/media`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{BlobError, BlobStore};

pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    /// `public_base` is the URL prefix `root` is served from,
    /// e.g. `http://localhost:8080/media`.
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_object(
        &self,
        path: &str,
        content: Bytes,
        _content_type: &str,
    ) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &content).await?;
        tracing::debug!("stored {} bytes at {}", content.len(), target.display());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        match tokio::fs::remove_file(self.resolve(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        Ok(tokio::fs::try_exists(self.resolve(path)?).await?)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_exists_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:8080/media/");

        let blob = store
            .upload("players", "png", Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .unwrap();
        assert!(blob.url.starts_with("http://localhost:8080/media/players/"));
        assert!(store.exists(&blob.path).await.unwrap());

        store.delete(&blob.path).await.unwrap();
        assert!(!store.exists(&blob.path).await.unwrap());
        // Deleting twice is fine.
        store.delete(&blob.path).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost/media");

        for path in ["../secret", "/etc/passwd", ""] {
            let err = store.exists(path).await.unwrap_err();
            assert!(matches!(err, BlobError::InvalidPath(_)));
        }
    }
}
