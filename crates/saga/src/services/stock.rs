//! Stock gateway contract and wire types.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::RequestContext;

/// The five remote stock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockOperation {
    CheckAvailability,
    Reserve,
    Release,
    Consume,
    RevertConsume,
}

impl StockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOperation::CheckAvailability => "check_availability",
            StockOperation::Reserve => "reserve",
            StockOperation::Release => "release",
            StockOperation::Consume => "consume",
            StockOperation::RevertConsume => "revert_consume",
        }
    }

    /// Path segment under the service's `/api/v1` prefix.
    pub fn path(&self) -> &'static str {
        match self {
            StockOperation::CheckAvailability => "availability",
            StockOperation::Reserve => "reserve",
            StockOperation::Release => "release",
            StockOperation::Consume => "consume",
            StockOperation::RevertConsume => "revert-consume",
        }
    }

    /// Classifies a 409 from the stock service, if this operation gives it a
    /// meaning.
    pub fn conflict_error(&self, body: String) -> Option<StockError> {
        match self {
            StockOperation::Reserve => Some(StockError::InsufficientAvailable { body }),
            StockOperation::Release | StockOperation::Consume => {
                Some(StockError::InsufficientReserved { body })
            }
            StockOperation::CheckAvailability | StockOperation::RevertConsume => None,
        }
    }
}

impl std::fmt::Display for StockOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by a stock gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    /// Reserve was refused: not enough available stock.
    #[error("insufficient stock: {body}")]
    InsufficientAvailable { body: String },

    /// Release or consume was refused: not enough reserved stock.
    #[error("insufficient reserved stock: {body}")]
    InsufficientReserved { body: String },

    /// Any other non-success status.
    #[error("stock service returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("malformed stock service response: {0}")]
    Protocol(String),

    #[error("stock service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("error calling stock service: {0}")]
    Network(String),
}

impl StockError {
    /// Label used for the `outcome` metric dimension.
    pub fn outcome(&self) -> &'static str {
        match self {
            StockError::InsufficientAvailable { .. } | StockError::InsufficientReserved { .. } => {
                "conflict"
            }
            StockError::Upstream { .. } => "upstream",
            StockError::Protocol(_) => "protocol",
            StockError::Timeout(_) => "timeout",
            StockError::Network(_) => "network",
        }
    }
}

/// Body of every mutating stock call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub sku: String,
    pub quantity: u32,
    /// Idempotency token; repeated calls with the same value are safe to retry.
    pub reference: String,
}

impl StockRequest {
    pub fn new(sku: impl Into<String>, quantity: u32, reference: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            reference: reference.into(),
        }
    }
}

/// Stock levels for a SKU as reported by the availability endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAvailability {
    pub variant_sku: String,
    pub product_sku: String,
    pub available_quantity: f64,
    pub reserved_quantity: f64,
    pub total_quantity: f64,
    pub is_out_of_stock: bool,
    pub is_low_stock: bool,
}

/// Availability snapshot plus whether it covers the requested quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityCheck {
    pub availability: StockAvailability,
    pub sufficient: bool,
}

impl AvailabilityCheck {
    pub fn new(availability: StockAvailability, quantity: u32) -> Self {
        let sufficient = availability.available_quantity >= f64::from(quantity);
        Self {
            availability,
            sufficient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveResult {
    pub sku: String,
    pub reserved_qty: i64,
    pub remaining_qty: i64,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub sku: String,
    pub released_qty: i64,
    pub available_qty: i64,
    pub reserved_qty: i64,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeResult {
    pub sku: String,
    pub consumed_qty: i64,
    pub reserved_qty: i64,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertConsumeResult {
    pub sku: String,
    pub reverted_qty: i64,
    pub available_qty: i64,
    pub reference: String,
}

/// Remote stock operations, scoped by the tenant in the request context.
///
/// Implementations never retry; that policy belongs to the caller.
#[async_trait]
pub trait StockGateway: Send + Sync {
    /// Reads stock levels. Never mutates remote state.
    async fn check_availability(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: u32,
    ) -> Result<AvailabilityCheck, StockError>;

    async fn reserve(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReserveResult, StockError>;

    async fn release(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReleaseResult, StockError>;

    async fn consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ConsumeResult, StockError>;

    async fn revert_consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<RevertConsumeResult, StockError>;
}

#[async_trait]
impl<T: StockGateway + ?Sized> StockGateway for Arc<T> {
    async fn check_availability(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: u32,
    ) -> Result<AvailabilityCheck, StockError> {
        (**self).check_availability(ctx, sku, quantity).await
    }

    async fn reserve(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReserveResult, StockError> {
        (**self).reserve(ctx, request).await
    }

    async fn release(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReleaseResult, StockError> {
        (**self).release(ctx, request).await
    }

    async fn consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ConsumeResult, StockError> {
        (**self).consume(ctx, request).await
    }

    async fn revert_consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<RevertConsumeResult, StockError> {
        (**self).revert_consume(ctx, request).await
    }
}
