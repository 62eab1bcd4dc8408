use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use model::{CategoryCreate, CategoryRelation, CategorySchema, CategoryUpdate};
use service::Service;
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CategoryUpdate>,
) -> ApiResult<Json<Vec<CategorySchema>>> {
    info!("Received request to list categories");
    Ok(Json(state.services.categories.get_all(&[], Some(&filter)).await?))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CategorySchema>> {
    let category = state
        .services
        .categories
        .get(id, &[CategoryRelation::Positions])
        .await?;
    Ok(Json(category))
}

async fn create(
    State(state): State<AppState>,
    Json(data): Json<CategoryCreate>,
) -> ApiResult<(StatusCode, Json<CategorySchema>)> {
    let category = state.services.categories.create(&data, &[]).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<CategoryUpdate>,
) -> ApiResult<Json<CategorySchema>> {
    Ok(Json(state.services.categories.update(id, &data, &[]).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.services.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
