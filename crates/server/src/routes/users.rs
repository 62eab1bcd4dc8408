use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use model::{UserCreate, UserRelation, UserSchema, UserUpdate};
use service::Service;

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<UserUpdate>,
) -> ApiResult<Json<Vec<UserSchema>>> {
    Ok(Json(state.services.users.get_all(&[], Some(&filter)).await?))
}

/// The user together with their order history.
async fn fetch(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<UserSchema>> {
    Ok(Json(state.services.users.get(id, &[UserRelation::Orders]).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(data): Json<UserCreate>,
) -> ApiResult<(StatusCode, Json<UserSchema>)> {
    let user = state.services.users.create(&data, &[]).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<UserUpdate>,
) -> ApiResult<Json<UserSchema>> {
    Ok(Json(state.services.users.update(id, &data, &[]).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
