use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use vestigia_core::{AppResult, UserIdentity};
use vestigia_domain::AuditAction;

/// Immutable audit record produced once per eligible request.
///
/// Constructed fully populated, written exactly once, never read back by
/// this subsystem. Unless the action is a read, at least one of `old_value`
/// and `new_value` is non-null.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Collection whose records the request mutated.
    pub collection: String,
    /// Semantic action derived from the request verb.
    pub action: AuditAction,
    /// Endpoint path that served the request.
    pub endpoint: String,
    /// Identity the mutation is attributed to.
    pub user: UserIdentity,
    /// Prior state, identifier summary, or null.
    pub old_value: Option<Value>,
    /// Post state, changed fields only, creation marker, or null.
    pub new_value: Option<Value>,
    /// UTC instant the record was produced.
    pub created_on: DateTime<Utc>,
}

/// Port for persisting append-only audit records.
#[async_trait]
pub trait AuditTrailRepository: Send + Sync {
    /// Persists one audit record.
    async fn append_record(&self, record: AuditRecord) -> AppResult<()>;
}
