//! In-memory stock gateway for tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::TenantId;
use tokio::sync::Mutex;

use crate::context::RequestContext;
use crate::services::stock::{
    AvailabilityCheck, ConsumeResult, ReleaseResult, ReserveResult, RevertConsumeResult,
    StockAvailability, StockError, StockGateway, StockOperation, StockRequest,
};

/// Low-stock threshold reported by the availability snapshot.
const LOW_STOCK_THRESHOLD: i64 = 5;

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockCall {
    pub operation: StockOperation,
    pub tenant_id: TenantId,
    pub auth_token: Option<String>,
    pub sku: String,
    pub quantity: u32,
    /// Empty for availability checks.
    pub reference: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockLevel {
    pub available: i64,
    pub reserved: i64,
}

#[derive(Debug, Default)]
struct InMemoryStockState {
    levels: HashMap<(TenantId, String), StockLevel>,
    calls: Vec<StockCall>,
    failures: HashSet<(StockOperation, String)>,
}

/// Simulated stock service keeping available and reserved quantities per
/// tenant and SKU.
///
/// Unknown SKUs behave as zero stock. Failures can be injected per
/// operation and SKU with [`fail_on`](Self::fail_on).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockGateway {
    state: Arc<Mutex<InMemoryStockState>>,
}

impl InMemoryStockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stock level of a SKU for a tenant.
    pub async fn set_stock(&self, tenant_id: &TenantId, sku: &str, available: i64, reserved: i64) {
        self.state.lock().await.levels.insert(
            (tenant_id.clone(), sku.to_string()),
            StockLevel {
                available,
                reserved,
            },
        );
    }

    pub async fn stock(&self, tenant_id: &TenantId, sku: &str) -> StockLevel {
        self.state
            .lock()
            .await
            .levels
            .get(&(tenant_id.clone(), sku.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Makes `operation` on `sku` fail with a 503 upstream error.
    pub async fn fail_on(&self, operation: StockOperation, sku: &str) {
        self.state
            .lock()
            .await
            .failures
            .insert((operation, sku.to_string()));
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Every call received so far, in arrival order.
    pub async fn calls(&self) -> Vec<StockCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls of a single operation, in arrival order.
    pub async fn calls_for(&self, operation: StockOperation) -> Vec<StockCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Records the call, then applies `mutate` to the SKU's stock level.
    async fn apply<T>(
        &self,
        ctx: &RequestContext,
        operation: StockOperation,
        sku: &str,
        quantity: u32,
        reference: &str,
        mutate: impl FnOnce(&mut StockLevel, i64) -> Result<T, StockError> + Send,
    ) -> Result<T, StockError> {
        let mut state = self.state.lock().await;
        state.calls.push(StockCall {
            operation,
            tenant_id: ctx.tenant_id().clone(),
            auth_token: ctx.auth_token().map(str::to_string),
            sku: sku.to_string(),
            quantity,
            reference: reference.to_string(),
        });

        if state.failures.contains(&(operation, sku.to_string())) {
            return Err(StockError::Upstream {
                status: 503,
                body: format!("{operation} unavailable for {sku}"),
            });
        }

        let level = state
            .levels
            .entry((ctx.tenant_id().clone(), sku.to_string()))
            .or_default();
        mutate(level, i64::from(quantity))
    }
}

#[async_trait]
impl StockGateway for InMemoryStockGateway {
    async fn check_availability(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: u32,
    ) -> Result<AvailabilityCheck, StockError> {
        let level = self
            .apply(
                ctx,
                StockOperation::CheckAvailability,
                sku,
                quantity,
                "",
                |level, _| Ok(*level),
            )
            .await?;

        let availability = StockAvailability {
            variant_sku: sku.to_string(),
            product_sku: sku.to_string(),
            available_quantity: level.available as f64,
            reserved_quantity: level.reserved as f64,
            total_quantity: (level.available + level.reserved) as f64,
            is_out_of_stock: level.available <= 0,
            is_low_stock: level.available > 0 && level.available <= LOW_STOCK_THRESHOLD,
        };
        Ok(AvailabilityCheck::new(availability, quantity))
    }

    async fn reserve(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReserveResult, StockError> {
        let sku = request.sku.clone();
        let reference = request.reference.clone();
        self.apply(
            ctx,
            StockOperation::Reserve,
            &request.sku,
            request.quantity,
            &request.reference,
            move |level, qty| {
                if level.available < qty {
                    return Err(StockError::InsufficientAvailable {
                        body: format!("only {} of {sku} available", level.available),
                    });
                }
                level.available -= qty;
                level.reserved += qty;
                Ok(ReserveResult {
                    sku,
                    reserved_qty: qty,
                    remaining_qty: level.available,
                    reference,
                })
            },
        )
        .await
    }

    async fn release(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReleaseResult, StockError> {
        let sku = request.sku.clone();
        let reference = request.reference.clone();
        self.apply(
            ctx,
            StockOperation::Release,
            &request.sku,
            request.quantity,
            &request.reference,
            move |level, qty| {
                if level.reserved < qty {
                    return Err(StockError::InsufficientReserved {
                        body: format!("only {} of {sku} reserved", level.reserved),
                    });
                }
                level.reserved -= qty;
                level.available += qty;
                Ok(ReleaseResult {
                    sku,
                    released_qty: qty,
                    available_qty: level.available,
                    reserved_qty: level.reserved,
                    reference,
                })
            },
        )
        .await
    }

    async fn consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ConsumeResult, StockError> {
        let sku = request.sku.clone();
        let reference = request.reference.clone();
        self.apply(
            ctx,
            StockOperation::Consume,
            &request.sku,
            request.quantity,
            &request.reference,
            move |level, qty| {
                if level.reserved < qty {
                    return Err(StockError::InsufficientReserved {
                        body: format!("only {} of {sku} reserved", level.reserved),
                    });
                }
                level.reserved -= qty;
                Ok(ConsumeResult {
                    sku,
                    consumed_qty: qty,
                    reserved_qty: level.reserved,
                    reference,
                })
            },
        )
        .await
    }

    async fn revert_consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<RevertConsumeResult, StockError> {
        let sku = request.sku.clone();
        let reference = request.reference.clone();
        self.apply(
            ctx,
            StockOperation::RevertConsume,
            &request.sku,
            request.quantity,
            &request.reference,
            move |level, qty| {
                level.available += qty;
                Ok(RevertConsumeResult {
                    sku,
                    reverted_qty: qty,
                    available_qty: level.available,
                    reference,
                })
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(TenantId::new("tenant-a").unwrap()).with_auth_token("Bearer t")
    }

    #[tokio::test]
    async fn reserve_moves_available_to_reserved() {
        let gateway = InMemoryStockGateway::new();
        gateway.set_stock(ctx().tenant_id(), "SKU-001", 10, 0).await;

        let result = gateway
            .reserve(&ctx(), &StockRequest::new("SKU-001", 4, "ref-1"))
            .await
            .unwrap();
        assert_eq!(result.reserved_qty, 4);
        assert_eq!(result.remaining_qty, 6);
        assert_eq!(result.reference, "ref-1");

        let level = gateway.stock(ctx().tenant_id(), "SKU-001").await;
        assert_eq!(level, StockLevel { available: 6, reserved: 4 });
    }

    #[tokio::test]
    async fn reserve_beyond_available_is_insufficient_stock() {
        let gateway = InMemoryStockGateway::new();
        gateway.set_stock(ctx().tenant_id(), "SKU-001", 1, 0).await;

        let result = gateway
            .reserve(&ctx(), &StockRequest::new("SKU-001", 2, "ref-1"))
            .await;
        assert!(matches!(result, Err(StockError::InsufficientAvailable { .. })));
    }

    #[tokio::test]
    async fn consume_requires_reserved_stock() {
        let gateway = InMemoryStockGateway::new();
        gateway.set_stock(ctx().tenant_id(), "SKU-001", 10, 1).await;

        let result = gateway
            .consume(&ctx(), &StockRequest::new("SKU-001", 2, "ref-1"))
            .await;
        assert!(matches!(result, Err(StockError::InsufficientReserved { .. })));
    }

    #[tokio::test]
    async fn stock_is_partitioned_by_tenant() {
        let gateway = InMemoryStockGateway::new();
        gateway.set_stock(ctx().tenant_id(), "SKU-001", 10, 0).await;

        let other = RequestContext::new(TenantId::new("tenant-b").unwrap());
        let check = gateway
            .check_availability(&other, "SKU-001", 1)
            .await
            .unwrap();
        assert!(!check.sufficient);
        assert!(check.availability.is_out_of_stock);
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_and_returned() {
        let gateway = InMemoryStockGateway::new();
        gateway.set_stock(ctx().tenant_id(), "SKU-001", 10, 10).await;
        gateway.fail_on(StockOperation::Release, "SKU-001").await;

        let result = gateway
            .release(&ctx(), &StockRequest::new("SKU-001", 1, "ref-1"))
            .await;
        assert!(matches!(result, Err(StockError::Upstream { status: 503, .. })));

        let calls = gateway.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].auth_token.as_deref(), Some("Bearer t"));
        assert_eq!(
            gateway.stock(ctx().tenant_id(), "SKU-001").await,
            StockLevel { available: 10, reserved: 10 }
        );
    }
}
