use async_trait::async_trait;
use tokio::sync::RwLock;

use vestigia_application::{AuditRecord, AuditTrailRepository};
use vestigia_core::AppResult;

/// In-memory append-only audit trail for tests and database-free hosts.
#[derive(Debug, Default)]
pub struct InMemoryAuditTrailRepository {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditTrailRepository {
    /// Creates an empty in-memory trail.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Returns every record appended so far, in append order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditTrailRepository for InMemoryAuditTrailRepository {
    async fn append_record(&self, record: AuditRecord) -> AppResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}
