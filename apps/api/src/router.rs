use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Builds the API router with the audit interceptor wired around every route.
///
/// Layer order matters: the session layer sits outside the interceptor so
/// the interceptor can read the session identity, and the interceptor sits
/// outside every route so it observes each response after the handler has
/// decided it.
pub fn build_router<Store>(app_state: AppState, session_layer: SessionManagerLayer<Store>) -> Router
where
    Store: SessionStore + Clone,
{
    Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route(
            "/api/session",
            post(handlers::session::open_session_handler)
                .delete(handlers::session::close_session_handler),
        )
        .route(
            "/api/collections/{collection}/records",
            get(handlers::records::list_records_handler)
                .post(handlers::records::create_records_handler),
        )
        .route(
            "/api/collections/{collection}/records/{record_id}",
            get(handlers::records::get_record_handler)
                .put(handlers::records::replace_record_handler)
                .delete(handlers::records::delete_record_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::audit_completed_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(session_layer)
        .with_state(app_state)
}
