//! Domain types and decision logic for the Vestigia audit trail.

#![forbid(unsafe_code)]

mod action;
mod change;
mod snapshot;

pub use action::AuditAction;
pub use change::{ID_FIELD, changed_fields};
pub use snapshot::{PrimaryKeyPath, Snapshot};
