use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

/// Semantic action a completed request performed on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A record (or batch of records) was created.
    Create,
    /// An existing record was modified.
    Update,
    /// A record (or batch of records) was removed.
    Delete,
    /// State was read without mutation.
    Read,
    /// The verb does not map to a known collection operation.
    Unknown,
}

impl AuditAction {
    /// Classifies a completed request from its HTTP method and status.
    ///
    /// The status code is accepted so the mapping can later refine on
    /// outcome; the baseline mapping depends only on the method.
    #[must_use]
    pub fn classify(method: &Method, _status: StatusCode) -> Self {
        match *method {
            Method::POST => Self::Create,
            Method::PUT | Method::PATCH => Self::Update,
            Method::DELETE => Self::Delete,
            Method::GET => Self::Read,
            _ => Self::Unknown,
        }
    }

    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Read => "read",
            Self::Unknown => "unknown",
        }
    }
}
