//! Google Cloud Storage over the JSON API.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};

use super::{BlobError, BlobStore};
use crate::gcp::TokenSource;

const API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const PUBLIC_BASE: &str = "https://storage.googleapis.com";

pub struct GcsBlobStore {
    http: reqwest::Client,
    bucket: String,
    tokens: Arc<TokenSource>,
}

impl GcsBlobStore {
    pub fn new(http: reqwest::Client, bucket: impl Into<String>, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            bucket: bucket.into(),
            tokens,
        }
    }

    async fn token(&self) -> Result<String, BlobError> {
        self.tokens
            .token()
            .await
            .map_err(|e| BlobError::Auth(e.to_string()))
    }

    /// Metadata URL of one object; the name is a single encoded segment.
    fn object_url(&self, path: &str) -> Result<Url, BlobError> {
        let mut url = Url::parse(API_BASE).map_err(|e| BlobError::InvalidPath(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BlobError::InvalidPath(path.to_string()))?
            .extend(["b", self.bucket.as_str(), "o", path]);
        Ok(url)
    }
}

async fn status_error(response: reqwest::Response) -> BlobError {
    let code = response.status().as_u16();
    BlobError::Status {
        code,
        message: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put_object(
        &self,
        path: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let url = format!("{}/b/{}/o", UPLOAD_BASE, self.bucket);
        let response = self
            .http
            .post(url)
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .bearer_auth(self.token().await?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        tracing::info!("uploaded gs://{}/{}", self.bucket, path);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let response = self
            .http
            .delete(self.object_url(path)?)
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(status_error(response).await),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let response = self
            .http
            .get(self.object_url(path)?)
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE, self.bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::Credentials;

    fn store() -> GcsBlobStore {
        let tokens = Arc::new(TokenSource::new(
            reqwest::Client::new(),
            Credentials::Static("t".into()),
        ));
        GcsBlobStore::new(reqwest::Client::new(), "league-media", tokens)
    }

    #[test]
    fn object_urls_keep_the_name_in_one_segment() {
        let url = store().object_url("players/a b.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/league-media/o/players%2Fa%20b.png"
        );
    }

    #[test]
    fn public_url_is_permanent_bucket_url() {
        let store = store();
        assert_eq!(
            store.public_url("events/x.png"),
            "https://storage.googleapis.com/league-media/events/x.png"
        );
    }
}
