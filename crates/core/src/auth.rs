use serde::{Deserialize, Serialize};

/// User information persisted in the authenticated session.
///
/// Audit records attribute every mutation to one of these. When a request
/// carries no authenticated identity, [`UserIdentity::placeholder`] is used
/// instead so an audit write never fails over a missing identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    email: String,
    #[serde(rename = "fullname")]
    full_name: String,
}

impl UserIdentity {
    /// Creates a user identity from authentication data.
    #[must_use]
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
        }
    }

    /// Returns the stand-in identity recorded for unauthenticated requests.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new("dummy@email.com", "Dummy Name")
    }

    /// Returns the email the identity provider authenticated.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }
}
