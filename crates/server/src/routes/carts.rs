use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use model::{ObtainingMethod, OrderSchema};
use serde::Deserialize;
use service::CartSchema;

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(fetch).delete(clear))
        .route("/{user_id}/items", post(add_item))
        .route("/{user_id}/items/{position_id}", delete(remove_item))
        .route("/{user_id}/checkout", post(checkout))
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct AddItem {
    position_id: i64,
    #[serde(default = "one")]
    quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
struct Checkout {
    #[serde(default)]
    obtaining_method: ObtainingMethod,
}

async fn fetch(State(state): State<AppState>, Path(user_id): Path<i64>) -> Json<CartSchema> {
    Json(state.services.carts.get(user_id).await)
}

async fn clear(State(state): State<AppState>, Path(user_id): Path<i64>) -> StatusCode {
    state.services.carts.clear(user_id).await;
    StatusCode::NO_CONTENT
}

async fn add_item(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(item): Json<AddItem>,
) -> ApiResult<Json<CartSchema>> {
    let cart = state
        .services
        .carts
        .add(user_id, item.position_id, item.quantity)
        .await?;
    Ok(Json(cart))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((user_id, position_id)): Path<(i64, i64)>,
) -> Json<CartSchema> {
    Json(state.services.carts.remove(user_id, position_id).await)
}

async fn checkout(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(data): Json<Checkout>,
) -> ApiResult<(StatusCode, Json<OrderSchema>)> {
    let order = state
        .services
        .carts
        .checkout(user_id, data.obtaining_method)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
