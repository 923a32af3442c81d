//! Standalone stock endpoints, forwarded to the stock service.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::{AvailabilityCheck, ReleaseResult, ReserveResult};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;
use crate::extract::Tenant;

#[derive(Deserialize)]
pub struct ValidateStockRequest {
    pub sku: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct StockMovementRequest {
    pub sku: String,
    pub quantity: i64,
    #[serde(default)]
    pub reference: String,
}

/// POST /api/v1/stock/validate
#[tracing::instrument(skip(state, ctx, req))]
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Json(req): Json<ValidateStockRequest>,
) -> Result<Json<AvailabilityCheck>, ApiError> {
    let check = state
        .lifecycle
        .validate_stock(&ctx, &req.sku, req.quantity)
        .await?;
    Ok(Json(check))
}

/// POST /api/v1/stock/reserve
#[tracing::instrument(skip(state, ctx, req))]
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Json(req): Json<StockMovementRequest>,
) -> Result<Json<ReserveResult>, ApiError> {
    let result = state
        .lifecycle
        .reserve_stock(&ctx, &req.sku, req.quantity, &req.reference)
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/stock/release
#[tracing::instrument(skip(state, ctx, req))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Json(req): Json<StockMovementRequest>,
) -> Result<Json<ReleaseResult>, ApiError> {
    let result = state
        .lifecycle
        .release_stock(&ctx, &req.sku, req.quantity, &req.reference)
        .await?;
    Ok(Json(result))
}
