//! Request context for correlating log lines across one gateway call.
//!
//! Every submission or decision gets its own [`RequestContext`]. Running the
//! call inside its span tags every event with the same `request_id`, so a
//! submission can be followed from validation through risk assessment to
//! the pending-store write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Context for a single gateway request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: Uuid,
    /// Component that started the request (`cli`, `gateway`).
    pub source: String,
    /// Operation being performed (`submit`, `approve`, `reject`).
    pub operation: Option<String>,
    /// Logical database the request targets.
    pub database: Option<String>,
    /// When the request started.
    pub started_at: DateTime<Utc>,
    /// Extra attributes, recorded on the span as one `attrs` field.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RequestContext {
    /// Start a context stamped now.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            source: source.into(),
            operation: None,
            database: None,
            started_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the target database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Attach an attribute.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Milliseconds since the request started, clamped at zero.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        u64::try_from(elapsed.num_milliseconds()).unwrap_or(0)
    }

    /// `key=value` pairs of [`Self::metadata`], space separated.
    #[must_use]
    pub fn attrs(&self) -> String {
        self.metadata
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            source = %self.source,
            operation = self.operation.as_deref().unwrap_or("unknown"),
            database = self.database.as_deref().unwrap_or("-"),
            attrs = %self.attrs(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_bare() {
        let ctx = RequestContext::new("cli");
        assert_eq!(ctx.source, "cli");
        assert!(ctx.operation.is_none());
        assert!(ctx.database.is_none());
        assert_ne!(ctx.request_id, RequestContext::new("cli").request_id);
    }

    #[test]
    fn test_builder_and_attrs() {
        let ctx = RequestContext::new("gateway")
            .with_operation("approve")
            .with_database("finance")
            .with_metadata("id", "7")
            .with_metadata("actor", "ops");

        assert_eq!(ctx.operation.as_deref(), Some("approve"));
        assert_eq!(ctx.database.as_deref(), Some("finance"));
        assert_eq!(ctx.attrs(), "actor=ops id=7");
    }

    #[test]
    fn test_span_can_be_entered() {
        let ctx = RequestContext::new("gateway").with_operation("submit");
        let _entered = ctx.span().entered();
        assert!(ctx.elapsed_ms() < 60_000);
    }
}
