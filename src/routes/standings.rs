use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::form::Form;
use super::Envelope;
use crate::error::ApiError;
use crate::models::Standing;
use crate::state::AppState;

// POST /standings - Add a team to the table (replaces an existing row)
pub async fn create_standing(
    State(state): State<AppState>,
    Form(submission): Form,
) -> Result<(StatusCode, Json<Envelope<Standing>>), ApiError> {
    let standing = state.standings.create(submission).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::with_message("Team standing added successfully", standing),
    ))
}

// GET /standings - League table, most points first
pub async fn list_standings(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Standing>>>, ApiError> {
    let standings = state.standings.list(None).await?;
    Ok(Envelope::data(standings))
}

// GET /standings/{team} - One team's row
pub async fn get_standing(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<Envelope<Standing>>, ApiError> {
    let standing = state.standings.read(&team).await?;
    Ok(Envelope::data(standing))
}

// PUT /standings/{team} - Update record and points; team and conference stay
pub async fn update_standing(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Form(submission): Form,
) -> Result<Json<Envelope<Standing>>, ApiError> {
    let standing = state.standings.update(&team, submission).await?;
    Ok(Envelope::with_message("Team standing updated successfully", standing))
}

// DELETE /standings/{team}
pub async fn delete_standing(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.standings.destroy(&team).await?;
    Ok(Envelope::message("Team standing deleted successfully"))
}
