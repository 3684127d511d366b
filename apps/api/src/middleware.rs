use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;
use tower_sessions::Session;
use tracing::warn;

use vestigia_application::{AuditContext, CompletedRequest};
use vestigia_core::UserIdentity;

use crate::handlers::session::SESSION_USER_KEY;
use crate::state::AppState;


/// Upper bound on request bodies buffered for audit inspection.
const MAX_AUDITED_BODY_BYTES: usize = 256 * 1024;

/// Runs after every request completes and hands the outcome to the audit
/// trail service.
///
/// Captures the JSON body of state-changing requests on the way in, reads
/// the scratch context the handler attached to the response, and records
/// the completed request. A failed audit write is logged and swallowed;
/// the already-decided response is returned unchanged.
pub async fn audit_completed_requests(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let (request, body) = buffer_json_body(request).await;

    let actor = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .ok()
        .flatten();

    let response = next.run(request).await;

    let context = response
        .extensions()
        .get::<AuditContext>()
        .cloned()
        .unwrap_or_default();

    let completed = CompletedRequest {
        method,
        path: path.clone(),
        status: response.status(),
        context,
        body,
        actor,
    };

    if let Err(error) = state
        .audit_trail_service
        .record_completed_request(completed)
        .await
    {
        warn!(
            error = %error,
            path = %path,
            "audit record write failed after completed request"
        );
    }

    response
}

/// Buffers the JSON body of a state-changing request so the audit trail can
/// inspect it, handing the bytes back to the inner service untouched.
///
/// Non-JSON bodies and bodies declared larger than the audit cap pass
/// through unread; the audit trail simply sees no payload for them.
async fn buffer_json_body(request: Request) -> (Request, Option<Value>) {
    if !is_state_changing_method(request.method()) {
        return (request, None);
    }

    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json {
        return (request, None);
    }

    let declared_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared_length.is_some_and(|length| length > MAX_AUDITED_BODY_BYTES) {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    match to_bytes(body, MAX_AUDITED_BODY_BYTES).await {
        Ok(bytes) => {
            let parsed = serde_json::from_slice::<Value>(&bytes).ok();
            (Request::from_parts(parts, Body::from(bytes)), parsed)
        }
        Err(error) => {
            warn!(error = %error, "failed to buffer request body for auditing");
            (Request::from_parts(parts, Body::empty()), None)
        }
    }
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
