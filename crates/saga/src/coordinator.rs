//! Order lifecycle orchestrator.
//!
//! Confirm and cancel walk the order's items in stored order, one remote
//! stock call at a time, and stop at the first failure. Stock already moved
//! by that call is then compensated in reverse order before the error is
//! returned, so a failed transition leaves remote stock as it found it.

use common::{ListPage, OrderId};
use domain::{NewOrderItem, Order, OrderItem, OrderQuery, OrderRepository};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{Result, SagaError};
use crate::services::{
    AvailabilityCheck, ReleaseResult, ReserveResult, StockError, StockGateway, StockOperation,
    StockRequest,
};

/// Suffix appended to the reference of compensating calls.
pub const COMPENSATION_SUFFIX: &str = ":compensate";

/// Status transitions that move stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Confirm,
    Cancel,
}

impl Transition {
    fn action(self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Cancel => "cancel",
        }
    }

    fn forward(self) -> StockOperation {
        match self {
            Transition::Confirm => StockOperation::Consume,
            Transition::Cancel => StockOperation::Release,
        }
    }

    fn inverse(self) -> StockOperation {
        match self {
            Transition::Confirm => StockOperation::RevertConsume,
            Transition::Cancel => StockOperation::Reserve,
        }
    }
}

/// Drives orders through `CREATED → CONFIRMED | CANCELLED` against the
/// remote stock service.
pub struct OrderLifecycle<R, G> {
    orders: R,
    stock: G,
}

impl<R, G> OrderLifecycle<R, G>
where
    R: OrderRepository,
    G: StockGateway,
{
    pub fn new(orders: R, stock: G) -> Self {
        Self { orders, stock }
    }

    /// Validates the lines and persists a new order in `CREATED`.
    ///
    /// Does not touch the stock service; reservation is a separate step.
    #[tracing::instrument(skip(self, ctx, items), fields(tenant_id = %ctx.tenant_id(), items = items.len()))]
    pub async fn create_order(&self, ctx: &RequestContext, items: &[NewOrderItem]) -> Result<Order> {
        let order = Order::create(ctx.tenant_id().clone(), items)?;
        self.orders.save(&order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.order_id(), "order created");
        Ok(order)
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn get_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        Ok(self.orders.find_by_id(order_id, ctx.tenant_id()).await?)
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn list_orders(
        &self,
        ctx: &RequestContext,
        query: &OrderQuery,
    ) -> Result<ListPage<Order>> {
        Ok(self.orders.list(ctx.tenant_id(), query).await?)
    }

    /// Consumes reserved stock for every item, then marks the order
    /// `CONFIRMED`.
    ///
    /// Without a reference, `order-<id>-confirm-<nonce>` is used, fresh for
    /// every call so a retry after compensation is not deduplicated as a
    /// replay of the failed attempt.
    ///
    /// Dropping the returned future between stock calls skips compensation;
    /// callers that can be interrupted should run it on its own task.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn confirm_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        reference: Option<&str>,
    ) -> Result<Order> {
        self.transition(ctx, order_id, reference, Transition::Confirm)
            .await
    }

    /// Releases reserved stock for every item, then marks the order
    /// `CANCELLED`.
    ///
    /// Without a reference, `order-<id>-cancel-<nonce>` is used.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn cancel_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        reference: Option<&str>,
    ) -> Result<Order> {
        self.transition(ctx, order_id, reference, Transition::Cancel)
            .await
    }

    /// Checks whether `quantity` of `sku` is available.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn validate_stock(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: i64,
    ) -> Result<AvailabilityCheck> {
        let (sku, quantity) = NewOrderItem::new(sku, quantity).validate()?;
        self.stock
            .check_availability(ctx, sku.as_str(), quantity)
            .await
            .map_err(|e| SagaError::from_stock(StockOperation::CheckAvailability, sku.as_str(), e))
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn reserve_stock(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: i64,
        reference: &str,
    ) -> Result<ReserveResult> {
        let request = standalone_request(sku, quantity, reference)?;
        self.stock
            .reserve(ctx, &request)
            .await
            .map_err(|e| SagaError::from_stock(StockOperation::Reserve, request.sku.as_str(), e))
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn release_stock(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: i64,
        reference: &str,
    ) -> Result<ReleaseResult> {
        let request = standalone_request(sku, quantity, reference)?;
        self.stock
            .release(ctx, &request)
            .await
            .map_err(|e| SagaError::from_stock(StockOperation::Release, request.sku.as_str(), e))
    }

    async fn transition(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        reference: Option<&str>,
        transition: Transition,
    ) -> Result<Order> {
        let mut order = self.orders.find_by_id(order_id, ctx.tenant_id()).await?;
        match transition {
            Transition::Confirm => order.ensure_confirmable()?,
            Transition::Cancel => order.ensure_cancellable()?,
        }

        let action = transition.action();
        let reference = match reference.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reference) => reference.to_string(),
            None => format!("order-{order_id}-{action}-{}", Uuid::new_v4().simple()),
        };

        let mut applied: Vec<&OrderItem> = Vec::with_capacity(order.item_count());
        for item in order.items() {
            if ctx.is_cancelled() {
                let failure = SagaError::Cancelled {
                    order_id,
                    action,
                    completed: applied.len(),
                };
                return Err(self
                    .abort(ctx, transition, order_id, &reference, &applied, failure)
                    .await);
            }

            let request = StockRequest::new(item.sku.as_str(), item.quantity, &reference);
            if let Err(err) = self.apply(ctx, transition.forward(), &request).await {
                let failure = SagaError::from_stock(transition.forward(), item.sku.as_str(), err);
                return Err(self
                    .abort(ctx, transition, order_id, &reference, &applied, failure)
                    .await);
            }
            applied.push(item);
        }

        let persisted = match transition {
            Transition::Confirm => self.orders.confirm(order_id, ctx.tenant_id()).await,
            Transition::Cancel => self.orders.cancel(order_id, ctx.tenant_id()).await,
        };
        if let Err(source) = persisted {
            let failure = SagaError::PersistenceFailed {
                order_id,
                action,
                source,
            };
            return Err(self
                .abort(ctx, transition, order_id, &reference, &applied, failure)
                .await);
        }

        match transition {
            Transition::Confirm => {
                order.confirm()?;
                metrics::counter!("orders_confirmed_total").increment(1);
            }
            Transition::Cancel => {
                order.cancel()?;
                metrics::counter!("orders_cancelled_total").increment(1);
            }
        }
        tracing::info!(%order_id, status = %order.status(), items = order.item_count(), "order status updated");
        Ok(order)
    }

    /// Undoes the stock calls of a failed transition, most recent first.
    ///
    /// Returns `failure` when every compensation succeeds, otherwise
    /// [`SagaError::Unreconciled`] naming the SKUs left behind.
    async fn abort(
        &self,
        ctx: &RequestContext,
        transition: Transition,
        order_id: OrderId,
        reference: &str,
        applied: &[&OrderItem],
        failure: SagaError,
    ) -> SagaError {
        let action = transition.action();
        metrics::counter!("order_saga_failures_total", "action" => action).increment(1);

        if applied.is_empty() {
            tracing::warn!(%order_id, action, error = %failure, "order transition failed");
            return failure;
        }
        tracing::warn!(
            %order_id,
            action,
            compensating = applied.len(),
            error = %failure,
            "order transition failed, reverting stock"
        );

        let reference = format!("{reference}{COMPENSATION_SUFFIX}");
        let mut unreconciled = Vec::new();
        for item in applied.iter().rev() {
            let request = StockRequest::new(item.sku.as_str(), item.quantity, &reference);
            match self.apply(ctx, transition.inverse(), &request).await {
                Ok(()) => {
                    metrics::counter!("stock_compensations_total", "outcome" => "success")
                        .increment(1);
                }
                Err(err) => {
                    metrics::counter!("stock_compensations_total", "outcome" => "failure")
                        .increment(1);
                    tracing::warn!(%order_id, sku = %item.sku, error = %err, "compensation failed");
                    unreconciled.push(item.sku.to_string());
                }
            }
        }

        if unreconciled.is_empty() {
            return failure;
        }

        tracing::error!(
            %order_id,
            action,
            skus = ?unreconciled,
            error = %failure,
            "stock left unreconciled, manual reconciliation required"
        );
        SagaError::Unreconciled {
            order_id,
            action,
            skus: unreconciled,
            cause: Box::new(failure),
        }
    }

    /// Runs one mutating stock call, discarding the snapshot.
    async fn apply(
        &self,
        ctx: &RequestContext,
        operation: StockOperation,
        request: &StockRequest,
    ) -> std::result::Result<(), StockError> {
        match operation {
            StockOperation::Reserve => self.stock.reserve(ctx, request).await.map(|_| ()),
            StockOperation::Release => self.stock.release(ctx, request).await.map(|_| ()),
            StockOperation::Consume => self.stock.consume(ctx, request).await.map(|_| ()),
            StockOperation::RevertConsume => {
                self.stock.revert_consume(ctx, request).await.map(|_| ())
            }
            StockOperation::CheckAvailability => self
                .stock
                .check_availability(ctx, &request.sku, request.quantity)
                .await
                .map(|_| ()),
        }
    }
}

fn standalone_request(sku: &str, quantity: i64, reference: &str) -> Result<StockRequest> {
    let (sku, quantity) = NewOrderItem::new(sku, quantity).validate()?;
    if reference.trim().is_empty() {
        return Err(SagaError::ReferenceRequired);
    }
    Ok(StockRequest::new(sku.as_str(), quantity, reference))
}
