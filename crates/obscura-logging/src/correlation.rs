//! Operation correlation
//!
//! Every protect, reveal or revoke gets an [`OperationContext`] carrying a
//! fresh operation ID. Its span is entered on whichever thread does the work
//! (including blocking workers), so all log lines from one operation share
//! the same `operation_id` field.

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Correlation context for one cryptographic operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    /// Unique to this operation
    pub operation_id: Uuid,

    /// Operation name (encrypt, decrypt, revoke, ...)
    pub operation: String,

    /// Asset being operated on, once known
    pub asset_id: Option<Uuid>,

    /// Key identifier involved, once known
    pub key_id: Option<String>,
}

impl OperationContext {
    /// Start a new operation
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            operation: operation.into(),
            asset_id: None,
            key_id: None,
        }
    }

    /// Attach an asset ID
    pub fn with_asset(mut self, asset_id: Uuid) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    /// Attach a key identifier
    pub fn with_key(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Build an `operation` span carrying this context's fields
    pub fn span(&self) -> Span {
        let span = tracing::info_span!(
            "operation",
            operation = %self.operation,
            operation_id = %self.operation_id,
            asset_id = tracing::field::Empty,
            key_id = tracing::field::Empty,
        );
        if let Some(asset_id) = self.asset_id {
            span.record(fields::ASSET_ID, tracing::field::display(asset_id));
        }
        if let Some(key_id) = &self.key_id {
            span.record(fields::KEY_ID, key_id.as_str());
        }
        span
    }
}

/// Standard field names used across Obscura logs
pub mod fields {
    pub const OPERATION: &str = "operation";
    pub const OPERATION_ID: &str = "operation_id";
    pub const ASSET_ID: &str = "asset_id";
    pub const KEY_ID: &str = "key_id";
    pub const NAMESPACE: &str = "namespace";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_unique_id() {
        let a = OperationContext::new("encrypt");
        let b = OperationContext::new("encrypt");
        assert_ne!(a.operation_id, b.operation_id);
        assert!(a.asset_id.is_none());
        assert!(a.key_id.is_none());
    }

    #[test]
    fn test_builders() {
        let asset = Uuid::new_v4();
        let ctx = OperationContext::new("revoke")
            .with_asset(asset)
            .with_key("photo-1");
        assert_eq!(ctx.operation, "revoke");
        assert_eq!(ctx.asset_id, Some(asset));
        assert_eq!(ctx.key_id.as_deref(), Some("photo-1"));
    }

    #[test]
    fn test_span_can_be_entered_without_subscriber() {
        let ctx = OperationContext::new("decrypt").with_key("k");
        let value = ctx.span().in_scope(|| 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_serde_roundtrip() {
        let ctx = OperationContext::new("encrypt").with_key("k");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: OperationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, back);
    }
}
