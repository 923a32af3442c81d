//! Per-call context threaded through the orchestrator and the stock gateway.

use common::TenantId;
use tokio::sync::watch;

/// Tenant, credential and cancellation signal for one logical request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    tenant_id: TenantId,
    auth_token: Option<String>,
    cancel: Option<watch::Receiver<bool>>,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            auth_token: None,
            cancel: None,
        }
    }

    /// Creates a context together with the handle that cancels it.
    pub fn cancellable(tenant_id: TenantId) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self::new(tenant_id).with_cancellation(rx);
        (ctx, CancelHandle(tx))
    }

    /// Attaches an opaque bearer credential. Blank values are ignored.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Returns true once the caller has asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Sender side of a [`RequestContext`] cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("tenant-a").unwrap()
    }

    #[test]
    fn blank_token_is_dropped() {
        let ctx = RequestContext::new(tenant()).with_auth_token("  ");
        assert_eq!(ctx.auth_token(), None);

        let ctx = RequestContext::new(tenant()).with_auth_token("Bearer abc");
        assert_eq!(ctx.auth_token(), Some("Bearer abc"));
    }

    #[test]
    fn cancel_is_visible_to_clones() {
        let (ctx, handle) = RequestContext::cancellable(tenant());
        let clone = ctx.clone();
        assert!(!ctx.is_cancelled());

        handle.cancel();
        assert!(ctx.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn plain_context_is_never_cancelled() {
        assert!(!RequestContext::new(tenant()).is_cancelled());
    }
}
