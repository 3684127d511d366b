use std::sync::Arc;

use vestigia_application::AuditTrailService;
use vestigia_infrastructure::InMemoryCollectionStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub audit_trail_service: AuditTrailService,
    pub collection_store: Arc<InMemoryCollectionStore>,
}
