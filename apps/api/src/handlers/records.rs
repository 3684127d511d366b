use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde_json::Value;

use vestigia_application::AuditContext;
use vestigia_core::AppError;
use vestigia_domain::Snapshot;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_records_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ApiResult<(Extension<AuditContext>, Json<Vec<Value>>)> {
    let records = state.collection_store.list(collection.as_str()).await;

    Ok((
        Extension(AuditContext::for_collection(collection)),
        Json(records),
    ))
}

/// Creates one record, or a batch when the payload is an array.
pub async fn create_records_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<(StatusCode, Extension<AuditContext>, Json<Value>)> {
    let stored = match payload {
        Value::Array(items) => {
            let mut stored_items = Vec::with_capacity(items.len());
            for item in items {
                stored_items.push(
                    state
                        .collection_store
                        .insert(collection.as_str(), item)
                        .await?,
                );
            }
            Value::Array(stored_items)
        }
        single => {
            state
                .collection_store
                .insert(collection.as_str(), single)
                .await?
        }
    };

    let mut context = AuditContext::for_collection(collection);
    if let Some(snapshot) = Snapshot::from_json(stored.clone()) {
        context = context.with_supplied_state(snapshot);
    }

    Ok((StatusCode::CREATED, Extension(context), Json(stored)))
}

pub async fn get_record_handler(
    State(state): State<AppState>,
    Path((collection, record_id)): Path<(String, String)>,
) -> ApiResult<(Extension<AuditContext>, Json<Value>)> {
    let record = state
        .collection_store
        .find(collection.as_str(), record_id.as_str())
        .await
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "record '{record_id}' not found in collection '{collection}'"
            ))
        })?;

    Ok((
        Extension(AuditContext::for_collection(collection)),
        Json(record),
    ))
}

/// Replaces a record, capturing the prior state for the audit trail.
pub async fn replace_record_handler(
    State(state): State<AppState>,
    Path((collection, record_id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> ApiResult<(Extension<AuditContext>, Json<Value>)> {
    let prior = state
        .collection_store
        .replace(collection.as_str(), record_id.as_str(), payload)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "record '{record_id}' not found in collection '{collection}'"
            ))
        })?;

    let current = state
        .collection_store
        .find(collection.as_str(), record_id.as_str())
        .await
        .ok_or_else(|| {
            AppError::Internal(format!(
                "record '{record_id}' disappeared from collection '{collection}' mid-request"
            ))
        })?;

    let mut context = AuditContext::for_collection(collection);
    if let Some(snapshot) = Snapshot::from_json(prior) {
        context = context.with_prior_state(snapshot);
    }

    Ok((Extension(context), Json(current)))
}

/// Deletes a record, capturing the removed state for the audit trail.
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path((collection, record_id)): Path<(String, String)>,
) -> ApiResult<(Extension<AuditContext>, StatusCode)> {
    let removed = state
        .collection_store
        .remove(collection.as_str(), record_id.as_str())
        .await
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "record '{record_id}' not found in collection '{collection}'"
            ))
        })?;

    let mut context = AuditContext::for_collection(collection);
    if let Some(snapshot) = Snapshot::from_json(removed) {
        context = context.with_prior_state(snapshot);
    }

    Ok((Extension(context), StatusCode::NO_CONTENT))
}
