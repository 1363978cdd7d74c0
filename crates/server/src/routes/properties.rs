use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use common::types::Ack;
use models::{Property, PropertyData};
use service::Summary;
use tracing::warn;

use crate::errors::JsonApiError;
use crate::state::AppState;

fn body(input: Result<Json<PropertyData>, JsonRejection>) -> Result<PropertyData, JsonApiError> {
    input.map(|Json(data)| data).map_err(|rejection| {
        warn!(error = %rejection, "rejected property body");
        JsonApiError::bad_request(rejection.body_text())
    })
}

fn id(path: Result<Path<i64>, PathRejection>) -> Result<i64, JsonApiError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        warn!(error = %rejection, "rejected property id");
        JsonApiError::bad_request(rejection.body_text())
    })
}

/// GET /properties. Always 200; a store failure yields `[]`.
pub async fn list(State(state): State<AppState>) -> Json<Vec<Property>> {
    Json(state.listings.list().await)
}

pub async fn summary(State(state): State<AppState>) -> Json<Summary> {
    Json(state.listings.summary().await)
}

/// POST /properties
pub async fn create(
    State(state): State<AppState>,
    input: Result<Json<PropertyData>, JsonRejection>,
) -> Result<Json<Property>, JsonApiError> {
    let data = body(input)?;
    state
        .listings
        .create(data)
        .await
        .map(Json)
        .map_err(|e| JsonApiError::from_service(e, "Failed to create property"))
}

/// PUT /property/:id. An `id` in the body is ignored.
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    input: Result<Json<PropertyData>, JsonRejection>,
) -> Result<Json<Property>, JsonApiError> {
    let id = id(path)?;
    let data = body(input)?;
    state
        .listings
        .update(id, data)
        .await
        .map(Json)
        .map_err(|e| JsonApiError::from_service(e, "Failed to update"))
}

/// DELETE /property/:id
pub async fn delete(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Ack>, JsonApiError> {
    let id = id(path)?;
    state
        .listings
        .delete(id)
        .await
        .map(|()| Json(Ack::ok()))
        .map_err(|e| JsonApiError::from_service(e, "Failed to delete"))
}
