//! Request body extractor shared by every create/update handler.
//!
//! Admin screens post either JSON or `multipart/form-data`; both end up
//! as a [`Submission`]. Text parts become string fields and the `image`
//! part, if it carries a file, becomes the media upload.

use std::collections::HashMap;

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form as UrlEncoded,
};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::services::Submission;
use crate::storage::Upload;

const IMAGE_FIELD: &str = "image";

pub struct Form(pub Submission);

impl<S> FromRequest<S> for Form
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return read_multipart(multipart).await.map(Form);
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let UrlEncoded(pairs) = UrlEncoded::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            let fields = pairs
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect();
            return Ok(Form(Submission::from_fields(fields)));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        parse_json(&body).map(|fields| Form(Submission::from_fields(fields)))
    }
}

fn parse_json(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::BadRequest("Request body must be a JSON object".into())),
        Err(e) => Err(ApiError::BadRequest(format!("Malformed JSON body: {e}"))),
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if name == IMAGE_FIELD && (file_name.is_some() || content_type.is_some()) {
            let content = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            // Browsers send an empty part when no file was chosen.
            if content.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                continue;
            }
            submission.image = Some(Upload {
                file_name,
                content_type: content_type.unwrap_or_else(|| "application/octet-stream".into()),
                content,
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        submission.fields.insert(name, Value::String(text));
    }

    Ok(submission)
}

/// Every file part of a gallery upload (`images` or `images[]`).
pub async fn read_images(mut multipart: Multipart) -> Result<Vec<Upload>, ApiError> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default();
        if !(name == "images" || name.starts_with("images[")) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        images.push(Upload {
            file_name,
            content_type,
            content,
        });
    }

    Ok(images)
}
