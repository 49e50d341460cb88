use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::form::Form;
use super::Envelope;
use crate::error::ApiError;
use crate::models::scores::MatchScoreView;
use crate::state::AppState;

// POST /recent-scores - Record a match result
pub async fn create_score(
    State(state): State<AppState>,
    Form(submission): Form,
) -> Result<(StatusCode, Json<Envelope<MatchScoreView>>), ApiError> {
    let score = state.scores.create(submission).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::with_message("Match score saved successfully", score),
    ))
}

// GET /recent-scores - List results, newest first
pub async fn list_scores(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<MatchScoreView>>>, ApiError> {
    let scores = state.scores.list(None).await?;
    Ok(Envelope::data(scores))
}

// GET /recent-scores/{id}
pub async fn get_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<MatchScoreView>>, ApiError> {
    let score = state.scores.read(&id).await?;
    Ok(Envelope::data(score))
}

// PUT /recent-scores/{id}
pub async fn update_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(submission): Form,
) -> Result<Json<Envelope<MatchScoreView>>, ApiError> {
    let score = state.scores.update(&id, submission).await?;
    Ok(Envelope::with_message("Match score updated successfully", score))
}

// DELETE /recent-scores/{id}
pub async fn delete_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.scores.destroy(&id).await?;
    Ok(Envelope::message("Match score deleted successfully"))
}
