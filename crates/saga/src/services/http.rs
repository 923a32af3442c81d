//! Stock gateway over HTTP, routed through the API gateway.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::services::stock::{
    AvailabilityCheck, ConsumeResult, ReleaseResult, ReserveResult, RevertConsumeResult,
    StockAvailability, StockError, StockGateway, StockOperation, StockRequest,
};

/// Default gateway address inside the deployment network.
pub const DEFAULT_GATEWAY_URL: &str = "http://kong:8000";

/// Default route prefix of the stock service behind the gateway.
pub const DEFAULT_SERVICE_PATH: &str = "/stock";

/// Default ceiling for a single stock call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the stock service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockGatewayConfig {
    pub gateway_url: String,
    pub service_path: String,
    pub timeout: Duration,
}

impl Default for StockGatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            service_path: DEFAULT_SERVICE_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl StockGatewayConfig {
    pub fn new(gateway_url: impl Into<String>, service_path: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            service_path: service_path.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of an operation's endpoint.
    pub fn endpoint(&self, operation: StockOperation) -> String {
        format!(
            "{}{}/api/v1/{}",
            self.gateway_url.trim_end_matches('/'),
            self.service_path.trim_end_matches('/'),
            operation.path()
        )
    }
}

/// [`StockGateway`] backed by `reqwest`.
///
/// Only `200 OK` counts as success. A `409` is mapped per operation through
/// [`StockOperation::conflict_error`]; every other status becomes
/// [`StockError::Upstream`] with the raw body attached.
#[derive(Debug, Clone)]
pub struct HttpStockGateway {
    client: Client,
    config: StockGatewayConfig,
}

impl HttpStockGateway {
    /// Builds the client with the configured per-call timeout.
    pub fn new(config: StockGatewayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn request(&self, ctx: &RequestContext, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("X-Tenant-ID", ctx.tenant_id().as_str());
        match ctx.auth_token() {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token),
            None => builder,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> StockError {
        if err.is_timeout() {
            StockError::Timeout(self.config.timeout)
        } else {
            StockError::Network(err.to_string())
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: StockOperation,
        builder: RequestBuilder,
    ) -> Result<T, StockError> {
        let started = Instant::now();
        let result = self.send(operation, builder).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.outcome(),
        };
        metrics::counter!(
            "stock_gateway_requests_total",
            "operation" => operation.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("stock_gateway_duration_seconds", "operation" => operation.as_str())
            .record(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            tracing::debug!(%operation, error = %err, "stock call failed");
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: StockOperation,
        builder: RequestBuilder,
    ) -> Result<T, StockError> {
        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status == StatusCode::CONFLICT
            && let Some(err) = operation.conflict_error(body.clone())
        {
            return Err(err);
        }
        if status != StatusCode::OK {
            return Err(StockError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| StockError::Protocol(e.to_string()))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        operation: StockOperation,
        request: &StockRequest,
    ) -> Result<T, StockError> {
        let builder = self.request(
            ctx,
            self.client
                .post(self.config.endpoint(operation))
                .json(request),
        );
        self.execute(operation, builder).await
    }
}

#[async_trait]
impl StockGateway for HttpStockGateway {
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    async fn check_availability(
        &self,
        ctx: &RequestContext,
        sku: &str,
        quantity: u32,
    ) -> Result<AvailabilityCheck, StockError> {
        let operation = StockOperation::CheckAvailability;
        let builder = self.request(
            ctx,
            self.client
                .get(self.config.endpoint(operation))
                .query(&[("sku", sku)]),
        );
        let availability: StockAvailability = self.execute(operation, builder).await?;
        Ok(AvailabilityCheck::new(availability, quantity))
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    async fn reserve(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReserveResult, StockError> {
        self.post(ctx, StockOperation::Reserve, request).await
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    async fn release(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ReleaseResult, StockError> {
        self.post(ctx, StockOperation::Release, request).await
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    async fn consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<ConsumeResult, StockError> {
        self.post(ctx, StockOperation::Consume, request).await
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    async fn revert_consume(
        &self,
        ctx: &RequestContext,
        request: &StockRequest,
    ) -> Result<RevertConsumeResult, StockError> {
        self.post(ctx, StockOperation::RevertConsume, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_gateway() {
        let config = StockGatewayConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(
            config.endpoint(StockOperation::RevertConsume),
            "http://kong:8000/stock/api/v1/revert-consume"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slashes() {
        let config = StockGatewayConfig::new("http://localhost:9000/", "/inventory/");
        assert_eq!(
            config.endpoint(StockOperation::CheckAvailability),
            "http://localhost:9000/inventory/api/v1/availability"
        );
    }
}
