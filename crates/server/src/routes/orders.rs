use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use model::{ObtainingMethod, OrderCreate, OrderRelation, OrderSchema, OrderStatus, OrderUpdate};
use serde::Deserialize;
use service::Service;
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

const RELATED: &[OrderRelation] = &[OrderRelation::Lines];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/active", get(active))
        .route("/{id}", get(fetch).put(update).delete(remove))
        .route("/{id}/status", put(set_status))
}

#[derive(Debug, Default, Deserialize)]
struct OrderFilter {
    user_id: Option<i64>,
    status: Option<OrderStatus>,
    obtaining_method: Option<ObtainingMethod>,
}

impl From<OrderFilter> for OrderUpdate {
    fn from(filter: OrderFilter) -> Self {
        OrderUpdate {
            user_id: filter.user_id,
            status: filter.status,
            obtaining_method: filter.obtaining_method,
            ..OrderUpdate::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: OrderStatus,
    barista_id: i64,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<Json<Vec<OrderSchema>>> {
    let filter = OrderUpdate::from(filter);
    Ok(Json(state.services.orders.get_all(RELATED, Some(&filter)).await?))
}

/// Orders still being prepared.
async fn active(State(state): State<AppState>) -> ApiResult<Json<Vec<OrderSchema>>> {
    info!("Received request for active orders");
    Ok(Json(state.services.orders.active().await?))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderSchema>> {
    Ok(Json(state.services.orders.get(id, RELATED).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(data): Json<OrderCreate>,
) -> ApiResult<(StatusCode, Json<OrderSchema>)> {
    let order = state.services.orders.create(&data, RELATED).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<OrderUpdate>,
) -> ApiResult<Json<OrderSchema>> {
    Ok(Json(state.services.orders.update(id, &data, RELATED).await?))
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Json<OrderSchema>> {
    let order = state
        .services
        .orders
        .set_status(id, change.status, change.barista_id)
        .await?;
    Ok(Json(order))
}

async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.services.orders.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
