use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::form::{read_images, Form};
use super::Envelope;
use crate::error::ApiError;
use crate::services::gallery::GalleryFile;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    success: bool,
    message: String,
    files: Vec<GalleryFile>,
}

#[derive(Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    filename: String,
}

// POST /gallery - Upload one or more images (multipart `images[]`)
pub async fn upload_images(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let images = read_images(multipart).await?;
    let files = state.gallery.upload(images).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Images uploaded successfully".into(),
        files,
    }))
}

// DELETE /gallery - Delete one image by stored name
pub async fn delete_image(
    State(state): State<AppState>,
    Form(submission): Form,
) -> Result<Json<Envelope<()>>, ApiError> {
    let request: DeleteRequest = serde_json::from_value(submission.fields.into())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.gallery.delete(&request.filename).await?;
    Ok(Envelope::message("Image deleted successfully"))
}
