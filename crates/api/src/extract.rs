//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::TenantId;
use saga::RequestContext;

use crate::error::ApiError;

/// Header carrying the tenant of every `/api/v1` request.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Builds a [`RequestContext`] from `X-Tenant-ID` and the optional
/// `Authorization` header, which is forwarded to the stock service as is.
#[derive(Debug, Clone)]
pub struct Tenant(pub RequestContext);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let tenant_id = TenantId::new(tenant)
            .map_err(|_| ApiError::BadRequest("X-Tenant-ID header is required".to_string()))?;

        let mut ctx = RequestContext::new(tenant_id);
        if let Some(token) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
        {
            ctx = ctx.with_auth_token(token);
        }

        Ok(Tenant(ctx))
    }
}
