use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::form::Form;
use super::Envelope;
use crate::error::ApiError;
use crate::models::events::EventView;
use crate::state::AppState;

// POST /submit-event - Create an event
pub async fn create_event(
    State(state): State<AppState>,
    Form(submission): Form,
) -> Result<(StatusCode, Json<Envelope<EventView>>), ApiError> {
    let event = state.events.create(submission).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::with_message("Event created successfully", event),
    ))
}

// GET /events - List events, most recently updated first
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<EventView>>>, ApiError> {
    let events = state.events.list(None).await?;
    Ok(Envelope::data(events))
}

// GET /events/{id} - Get event by ID
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<EventView>>, ApiError> {
    let event = state.events.read(&id).await?;
    Ok(Envelope::data(event))
}

// PUT /events/{id} - Update an event
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(submission): Form,
) -> Result<Json<Envelope<EventView>>, ApiError> {
    let event = state.events.update(&id, submission).await?;
    Ok(Envelope::with_message("Event updated successfully", event))
}

// DELETE /events/{id} - Delete an event and its image
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.events.destroy(&id).await?;
    Ok(Envelope::message("Event deleted successfully"))
}
