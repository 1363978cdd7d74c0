use std::path::Path;

use axum::{routing::get, Json, Router};
use common::types::Health;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod properties;

pub async fn health() -> Json<Health> {
    Json(Health::ok())
}

/// The JSON API. Mounted at the root and again under `/api`, which is the
/// prefix the web front end calls.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(properties::list).post(properties::create))
        .route("/properties/summary", get(properties::summary))
        .route("/property/:id", axum::routing::put(properties::update).delete(properties::delete))
}

/// Build the application router: health, the listings API and, when a
/// static directory is configured, the front end for every other path.
pub fn build_router(state: AppState, cors: CorsLayer, static_dir: Option<&str>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .nest("/api", api_routes())
        .with_state(state);

    if let Some(dir) = static_dir {
        let index = Path::new(dir).join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
            // 5xx
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    )
}
