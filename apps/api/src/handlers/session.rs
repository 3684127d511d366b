use axum::Json;
use axum::http::StatusCode;
use tower_sessions::Session;

use vestigia_core::{AppError, UserIdentity};

use crate::error::ApiResult;

/// Session key the authenticated identity is stored under.
pub const SESSION_USER_KEY: &str = "vestigia.user";

#[derive(Debug, serde::Deserialize)]
pub struct OpenSessionRequest {
    pub email: String,
    pub fullname: String,
}

/// Stores the caller's identity in the session.
///
/// Identity verification belongs to the deployment's identity provider;
/// this endpoint only records who audit records should be attributed to.
pub async fn open_session_handler(
    session: Session,
    Json(payload): Json<OpenSessionRequest>,
) -> ApiResult<StatusCode> {
    let identity = UserIdentity::new(payload.email, payload.fullname);

    session
        .insert(SESSION_USER_KEY, identity)
        .await
        .map_err(|error| AppError::Internal(format!("failed to store session identity: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn close_session_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .flush()
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}
