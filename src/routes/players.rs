use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::form::Form;
use super::Envelope;
use crate::error::ApiError;
use crate::models::players::{team_filter, PlayerView};
use crate::state::AppState;

// Query parameters for filtering players
#[derive(Deserialize)]
pub struct TeamQuery {
    #[serde(default)]
    team: Option<String>,
}

// POST /submit-user - Register a player
pub async fn create_player(
    State(state): State<AppState>,
    Form(submission): Form,
) -> Result<(StatusCode, Json<Envelope<PlayerView>>), ApiError> {
    let player = state.players.create(submission).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::with_message("Player submitted successfully", player),
    ))
}

// GET /submissions - List all players, newest first
pub async fn list_players(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<PlayerView>>>, ApiError> {
    let players = state.players.list(None).await?;
    Ok(Envelope::data(players))
}

// GET /players?team=Jogoo Club - List players, optionally of one team
pub async fn list_players_by_team(
    State(state): State<AppState>,
    Query(params): Query<TeamQuery>,
) -> Result<Json<Envelope<Vec<PlayerView>>>, ApiError> {
    let filter = params
        .team
        .as_deref()
        .map(str::trim)
        .filter(|team| !team.is_empty())
        .map(team_filter);
    let players = state.players.list(filter).await?;
    Ok(Envelope::data(players))
}

// GET /submissions/{id} - Get player by ID
pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<PlayerView>>, ApiError> {
    let player = state.players.read(&id).await?;
    Ok(Envelope::data(player))
}

// PUT /submissions/{id} - Update the given fields of a player
pub async fn update_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(submission): Form,
) -> Result<Json<Envelope<PlayerView>>, ApiError> {
    let player = state.players.update(&id, submission).await?;
    Ok(Envelope::with_message("Player updated successfully", player))
}

// DELETE /submissions/{id} - Delete a player and its image
pub async fn delete_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.players.destroy(&id).await?;
    Ok(Envelope::message("Player deleted successfully"))
}

// GET /teams - Distinct team names across players
pub async fn get_team_names(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<String>>>, ApiError> {
    let teams = state.players.team_names().await?;
    Ok(Envelope::data(teams))
}
