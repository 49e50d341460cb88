use std::path::PathBuf;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod events;
pub mod form;
pub mod gallery;
pub mod health;
pub mod players;
pub mod scores;
pub mod standings;

/// Router-level knobs that do not belong to any handler.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// Serve local media files under `/media`.
    pub media_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

/// Response body `{"success": true, "message"?, "data"?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        })
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: None,
        })
    }
}

/// Answer bare `OPTIONS` requests before they reach a handler.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

pub fn app(state: AppState, options: HttpOptions) -> Router {
    // CORS configuration for the admin frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        // Root and health
        .route("/", get(|| async { "League Admin API - v1.0" }))
        .route("/health", get(health::health_check))

        // Player endpoints
        .route("/submit-user", post(players::create_player))
        .route("/submissions", get(players::list_players))
        .route(
            "/submissions/{id}",
            get(players::get_player)
                .put(players::update_player)
                .delete(players::delete_player),
        )
        .route("/players", get(players::list_players_by_team))
        .route("/teams", get(players::get_team_names))

        // Event endpoints
        .route("/submit-event", post(events::create_event))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/{id}",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )

        // Match score endpoints
        .route("/recent-scores", get(scores::list_scores).post(scores::create_score))
        .route(
            "/recent-scores/{id}",
            get(scores::get_score)
                .put(scores::update_score)
                .delete(scores::delete_score),
        )

        // Standings endpoints
        .route(
            "/standings",
            get(standings::list_standings).post(standings::create_standing),
        )
        .route(
            "/standings/{team}",
            get(standings::get_standing)
                .put(standings::update_standing)
                .delete(standings::delete_standing),
        )

        // Gallery endpoints
        .route("/gallery", post(gallery::upload_images).delete(gallery::delete_image));

    if let Some(dir) = options.media_dir {
        router = router.nest_service("/media", ServeDir::new(dir));
    }

    let body_limit = if options.max_upload_bytes == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(options.max_upload_bytes)
    };

    router
        .layer(body_limit)
        .layer(middleware::from_fn(preflight))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
