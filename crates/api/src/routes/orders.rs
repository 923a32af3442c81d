//! Order lifecycle endpoints.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ListPage, OrderId, Pagination, SortOrder};
use domain::{NewOrderItem, Order, OrderItem, OrderQuery, OrderStatus};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::AppState;
use crate::error::ApiError;
use crate::extract::Tenant;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub sku: String,
    pub quantity: i64,
}

#[derive(Deserialize, Default)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<OrderStatus>,
    pub sort: Option<SortOrder>,
}

/// Optional idempotency reference for confirm and cancel.
#[derive(Deserialize, Default)]
pub struct TransitionParams {
    pub reference: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub tenant_id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub item_id: String,
    pub sku: String,
    pub quantity: u32,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            item_id: item.item_id.to_string(),
            sku: item.sku.as_str().to_string(),
            quantity: item.quantity,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id().to_string(),
            tenant_id: order.tenant_id().to_string(),
            status: order.status(),
            created_at: order.created_at(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
        }
    }
}

/// Runs a confirm or cancel on its own task, so a dropped request stops
/// waiting without interrupting the saga between stock calls.
async fn detached<F>(action: &'static str, transition: F) -> Result<Order, ApiError>
where
    F: Future<Output = saga::Result<Order>> + Send + 'static,
{
    tokio::spawn(transition.instrument(tracing::Span::current()))
        .await
        .map_err(|e| ApiError::Internal(format!("{action} task failed: {e}")))?
        .map_err(ApiError::from)
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}

// -- Handlers --

/// POST /api/v1/orders
#[tracing::instrument(skip(state, ctx, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let items: Vec<NewOrderItem> = req
        .items
        .into_iter()
        .map(|item| NewOrderItem::new(item.sku, item.quantity))
        .collect();

    let order = state.lifecycle.create_order(&ctx, &items).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/v1/orders
#[tracing::instrument(skip(state, ctx, params))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<ListPage<OrderResponse>>, ApiError> {
    let mut query = OrderQuery::new()
        .sort(params.sort.unwrap_or_default())
        .page(Pagination::from_params(params.page, params.page_size));
    if let Some(status) = params.status {
        query = query.status(status);
    }

    let page = state.lifecycle.list_orders(&ctx, &query).await?;
    Ok(Json(page.map(OrderResponse::from)))
}

/// GET /api/v1/orders/{id}
#[tracing::instrument(skip(state, ctx))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.lifecycle.get_order(&ctx, order_id).await?;
    Ok(Json(order.into()))
}

/// POST /api/v1/orders/{id}/confirm
#[tracing::instrument(skip(state, ctx, params))]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
    Query(params): Query<TransitionParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let reference = params.reference;
    let order = detached("confirm", async move {
        state
            .lifecycle
            .confirm_order(&ctx, order_id, reference.as_deref())
            .await
    })
    .await?;
    Ok(Json(order.into()))
}

/// POST /api/v1/orders/{id}/cancel
#[tracing::instrument(skip(state, ctx, params))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
    Query(params): Query<TransitionParams>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let reference = params.reference;
    let order = detached("cancel", async move {
        state
            .lifecycle
            .cancel_order(&ctx, order_id, reference.as_deref())
            .await
    })
    .await?;
    Ok(Json(order.into()))
}
