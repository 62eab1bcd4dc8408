use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use model::{PositionCreate, PositionRelation, PositionSchema, PositionUpdate};
use service::Service;
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

const RELATED: &[PositionRelation] = &[PositionRelation::Category];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(fetch).put(update).delete(remove))
}

/// Filters by any position field; `name` matches a case-insensitive part.
async fn list(
    State(state): State<AppState>,
    Query(filter): Query<PositionUpdate>,
) -> ApiResult<Json<Vec<PositionSchema>>> {
    info!("Received request to list positions");
    Ok(Json(state.services.positions.get_all(RELATED, Some(&filter)).await?))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PositionSchema>> {
    Ok(Json(state.services.positions.get(id, RELATED).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(data): Json<PositionCreate>,
) -> ApiResult<(StatusCode, Json<PositionSchema>)> {
    let position = state.services.positions.create(&data, RELATED).await?;
    Ok((StatusCode::CREATED, Json(position)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<PositionUpdate>,
) -> ApiResult<Json<PositionSchema>> {
    Ok(Json(state.services.positions.update(id, &data, RELATED).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.services.positions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
