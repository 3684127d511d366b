use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::json;
use tokio::sync::Mutex;

use vestigia_core::{AppError, AppResult, UserIdentity};
use vestigia_domain::{AuditAction, Snapshot};

use crate::audit_ports::{AuditRecord, AuditTrailRepository};

use super::{AuditContext, AuditPolicy, AuditTrailService, CompletedRequest};

#[derive(Default)]
struct FakeAuditTrail {
    records: Mutex<Vec<AuditRecord>>,
}

impl FakeAuditTrail {
    async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditTrailRepository for FakeAuditTrail {
    async fn append_record(&self, record: AuditRecord) -> AppResult<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

struct FailingAuditTrail;

#[async_trait]
impl AuditTrailRepository for FailingAuditTrail {
    async fn append_record(&self, _record: AuditRecord) -> AppResult<()> {
        Err(AppError::Internal("audit store unavailable".to_owned()))
    }
}

fn service_with(policy: AuditPolicy) -> (AuditTrailService, Arc<FakeAuditTrail>) {
    let trail = Arc::new(FakeAuditTrail::default());
    (AuditTrailService::new(policy, trail.clone()), trail)
}

fn completed_request(
    method: Method,
    path: &str,
    status: StatusCode,
    context: AuditContext,
) -> CompletedRequest {
    CompletedRequest {
        method,
        path: path.to_owned(),
        status,
        context,
        body: None,
        actor: None,
    }
}

#[test]
fn default_policy_excludes_reads_and_failures() {
    let policy = AuditPolicy::new();

    assert!(policy.is_auditable("users", "/users", &Method::POST, StatusCode::CREATED));
    assert!(!policy.is_auditable("users", "/users", &Method::GET, StatusCode::OK));
    assert!(!policy.is_auditable("users", "/users", &Method::POST, StatusCode::BAD_REQUEST));
}

#[test]
fn policy_rejects_unknown_and_self_collections() {
    let policy = AuditPolicy::new().with_audit_collection("audit");

    assert!(!policy.is_auditable("", "/users", &Method::POST, StatusCode::OK));
    assert!(!policy.is_auditable("audit", "/audit", &Method::POST, StatusCode::OK));
}

#[test]
fn policy_rejects_ignored_paths_and_terms() {
    let policy = AuditPolicy::new().with_ignored_path("/internal/health");

    assert!(!policy.is_auditable("users", "/internal/health", &Method::POST, StatusCode::OK));
    assert!(!policy.is_auditable("users", "/docs/swagger.json", &Method::POST, StatusCode::OK));
    assert!(!policy.is_auditable("users", "/users/search", &Method::POST, StatusCode::OK));
}

#[test]
fn unmapped_collections_fall_back_to_the_name_path() {
    let policy = AuditPolicy::new().with_primary_key("users", "email");

    let record = json!({"name": "fallback", "email": "a@x.com"});
    assert_eq!(policy.primary_key("users").resolve(&record), "a@x.com");
    assert_eq!(policy.primary_key("reports").resolve(&record), "fallback");
}

#[tokio::test]
async fn requests_without_a_collection_produce_no_record() {
    let (service, trail) = service_with(AuditPolicy::new());

    let result = service
        .record_completed_request(completed_request(
            Method::POST,
            "/assets/logo.png",
            StatusCode::OK,
            AuditContext::default(),
        ))
        .await;

    assert!(result.is_ok());
    assert!(trail.records().await.is_empty());
}

#[tokio::test]
async fn the_audit_collection_never_audits_itself() {
    let (service, trail) = service_with(AuditPolicy::new());

    let result = service
        .record_completed_request(completed_request(
            Method::POST,
            "/audit",
            StatusCode::CREATED,
            AuditContext::for_collection("audit"),
        ))
        .await;

    assert!(result.is_ok());
    assert!(trail.records().await.is_empty());
}

#[tokio::test]
async fn failure_statuses_produce_no_record() {
    let (service, trail) = service_with(AuditPolicy::new());

    let result = service
        .record_completed_request(completed_request(
            Method::DELETE,
            "/users/7",
            StatusCode::NOT_FOUND,
            AuditContext::for_collection("users"),
        ))
        .await;

    assert!(result.is_ok());
    assert!(trail.records().await.is_empty());
}

#[tokio::test]
async fn swagger_endpoints_are_never_audited() {
    let (service, trail) = service_with(AuditPolicy::new());

    let result = service
        .record_completed_request(completed_request(
            Method::POST,
            "/swagger/resources",
            StatusCode::OK,
            AuditContext::for_collection("users"),
        ))
        .await;

    assert!(result.is_ok());
    assert!(trail.records().await.is_empty());
}

#[tokio::test]
async fn get_requests_produce_no_record_by_default() {
    let (service, trail) = service_with(AuditPolicy::new());

    let result = service
        .record_completed_request(completed_request(
            Method::GET,
            "/users",
            StatusCode::OK,
            AuditContext::for_collection("users"),
        ))
        .await;

    assert!(result.is_ok());
    assert!(trail.records().await.is_empty());
}

#[tokio::test]
async fn updates_record_only_the_changed_fields() {
    let policy = AuditPolicy::new().with_primary_key("users", "email");
    let (service, trail) = service_with(policy);

    let mut request = completed_request(
        Method::PUT,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users")
            .with_prior_state(Snapshot::One(json!({"email": "a@x.com", "plan": "free"}))),
    );
    request.body = Some(json!({"email": "a@x.com", "plan": "pro"}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Update);
    assert_eq!(records[0].collection, "users");
    assert_eq!(records[0].new_value, Some(json!({"plan": "pro"})));
    assert_eq!(
        records[0].old_value,
        Some(json!({"email": "a@x.com", "plan": "free"}))
    );
}

#[tokio::test]
async fn updates_without_a_prior_snapshot_keep_the_full_payload() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::PUT,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users"),
    );
    request.body = Some(json!({"plan": "pro", "seats": 3}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value, Some(json!({"plan": "pro", "seats": 3})));
    assert_eq!(records[0].old_value, None);
}

#[tokio::test]
async fn supplied_state_is_trusted_verbatim_over_diffing() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::PUT,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users")
            .with_prior_state(Snapshot::One(json!({"plan": "free"})))
            .with_supplied_state(Snapshot::One(json!({"plan": "pro", "seats": 3}))),
    );
    request.body = Some(json!({"plan": "pro"}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value, Some(json!({"plan": "pro", "seats": 3})));
    assert_eq!(records[0].old_value, Some(json!({"plan": "free"})));
}

#[tokio::test]
async fn deletions_collapse_the_prior_batch_to_identifier_pairs() {
    let policy = AuditPolicy::new().with_primary_key("attachments", "filename");
    let (service, trail) = service_with(policy);

    let request = completed_request(
        Method::DELETE,
        "/attachments",
        StatusCode::NO_CONTENT,
        AuditContext::for_collection("attachments").with_prior_state(Snapshot::Many(vec![
            json!({"_id": 1, "filename": "a.pdf"}),
            json!({"_id": 2, "filename": "b.pdf"}),
        ])),
    );

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Delete);
    assert_eq!(
        records[0].old_value,
        Some(json!([
            {"_id": 1, "name": "a.pdf"},
            {"_id": 2, "name": "b.pdf"},
        ]))
    );
    assert_eq!(records[0].new_value, None);
}

#[tokio::test]
async fn deleting_a_single_record_collapses_it_the_same_way() {
    let policy = AuditPolicy::new().with_primary_key("attachments", "filename");
    let (service, trail) = service_with(policy);

    let request = completed_request(
        Method::DELETE,
        "/attachments/1",
        StatusCode::NO_CONTENT,
        AuditContext::for_collection("attachments")
            .with_prior_state(Snapshot::One(json!({"_id": 1, "filename": "a.pdf"}))),
    );

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].old_value, Some(json!({"_id": 1, "name": "a.pdf"})));
}

#[tokio::test]
async fn deletions_drop_an_empty_replacement_state() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::DELETE,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users")
            .with_prior_state(Snapshot::One(json!({"_id": 7, "name": "alex"}))),
    );
    request.body = Some(json!({}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value, None);
    assert_eq!(records[0].old_value, Some(json!({"_id": 7, "name": "alex"})));
}

#[tokio::test]
async fn bulk_creation_joins_identifiers_in_payload_order() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::POST,
        "/reports",
        StatusCode::CREATED,
        AuditContext::for_collection("reports"),
    );
    request.body = Some(json!([
        {"name": "q1"},
        {"name": "q2"},
        {"name": "q3"},
    ]));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Create);
    assert_eq!(records[0].new_value, Some(json!({"name": "q1,q2,q3"})));
}

#[tokio::test]
async fn empty_bulk_creation_records_an_empty_name() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::POST,
        "/reports",
        StatusCode::CREATED,
        AuditContext::for_collection("reports"),
    );
    request.body = Some(json!([]));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value, Some(json!({"name": ""})));
}

#[tokio::test]
async fn single_record_creation_collapses_to_its_identifier() {
    let policy = AuditPolicy::new().with_primary_key("users", "email");
    let (service, trail) = service_with(policy);

    let mut request = completed_request(
        Method::POST,
        "/users",
        StatusCode::CREATED,
        AuditContext::for_collection("users"),
    );
    request.body = Some(json!({"email": "a@x.com", "plan": "free"}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value, Some(json!({"name": "a@x.com"})));
}

#[tokio::test]
async fn a_created_status_collapses_even_on_put() {
    let policy = AuditPolicy::new().with_primary_key("users", "email");
    let (service, trail) = service_with(policy);

    let mut request = completed_request(
        Method::PUT,
        "/users/7",
        StatusCode::CREATED,
        AuditContext::for_collection("users")
            .with_prior_state(Snapshot::One(json!({"email": "a@x.com", "plan": "free"}))),
    );
    request.body = Some(json!({"email": "a@x.com", "plan": "pro"}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    // The diff runs first, so the identifier is resolved against the
    // changed fields; a changed-fields set without the identifier yields
    // an empty name. The status-driven branch is kept as-is.
    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Update);
    assert_eq!(records[0].new_value, Some(json!({"name": ""})));
}

#[tokio::test]
async fn unauthenticated_requests_fall_back_to_the_placeholder_identity() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::POST,
        "/users",
        StatusCode::OK,
        AuditContext::for_collection("users"),
    );
    request.body = Some(json!({"name": "anon"}));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user, UserIdentity::placeholder());
}

#[tokio::test]
async fn the_session_identity_is_attributed_when_present() {
    let (service, trail) = service_with(AuditPolicy::new());

    let mut request = completed_request(
        Method::POST,
        "/users",
        StatusCode::OK,
        AuditContext::for_collection("users"),
    );
    request.body = Some(json!({"name": "anon"}));
    request.actor = Some(UserIdentity::new("ops@x.com", "Ops Team"));

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user.email(), "ops@x.com");
}

#[tokio::test]
async fn reads_force_both_values_to_null_when_configured_auditable() {
    let policy = AuditPolicy::new().with_audited_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
    ]);
    let (service, trail) = service_with(policy);

    let request = completed_request(
        Method::GET,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users")
            .with_prior_state(Snapshot::One(json!({"email": "a@x.com"}))),
    );

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Read);
    assert_eq!(records[0].old_value, None);
    assert_eq!(records[0].new_value, None);
}

#[tokio::test]
async fn writer_failures_surface_to_the_caller() {
    let service = AuditTrailService::new(AuditPolicy::new(), Arc::new(FailingAuditTrail));

    let mut request = completed_request(
        Method::POST,
        "/users",
        StatusCode::OK,
        AuditContext::for_collection("users"),
    );
    request.body = Some(json!({"name": "anon"}));

    let result = service.record_completed_request(request).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
}

#[tokio::test]
async fn non_json_bodies_leave_the_new_state_absent() {
    let (service, trail) = service_with(AuditPolicy::new());

    let request = completed_request(
        Method::POST,
        "/users",
        StatusCode::OK,
        AuditContext::for_collection("users"),
    );

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value, None);
    assert_eq!(records[0].old_value, None);
}

#[tokio::test]
async fn resolving_the_same_request_twice_is_deterministic() {
    let policy = AuditPolicy::new().with_primary_key("users", "email");
    let (service, trail) = service_with(policy);

    for _ in 0..2 {
        let mut request = completed_request(
            Method::PUT,
            "/users/7",
            StatusCode::OK,
            AuditContext::for_collection("users")
                .with_prior_state(Snapshot::One(json!({"email": "a@x.com", "plan": "free"}))),
        );
        request.body = Some(json!({"email": "a@x.com", "plan": "pro"}));

        let result = service.record_completed_request(request).await;
        assert!(result.is_ok());
    }

    let records = trail.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].new_value, records[1].new_value);
    assert_eq!(records[0].old_value, records[1].old_value);
}

#[tokio::test]
async fn unknown_value_is_used_for_unmapped_audited_verbs() {
    let purge = Method::from_bytes(b"PURGE").unwrap_or(Method::POST);
    let policy = AuditPolicy::new().with_audited_methods([purge.clone()]);
    let (service, trail) = service_with(policy);

    let request = completed_request(
        purge,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users"),
    );

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Unknown);
}

#[tokio::test]
async fn delete_uses_the_supplied_state_when_it_carries_data() {
    let (service, trail) = service_with(AuditPolicy::new());

    let request = completed_request(
        Method::DELETE,
        "/users/7",
        StatusCode::OK,
        AuditContext::for_collection("users")
            .with_prior_state(Snapshot::One(json!({"_id": 7, "name": "alex"})))
            .with_supplied_state(Snapshot::One(json!({"archived": true}))),
    );

    let result = service.record_completed_request(request).await;
    assert!(result.is_ok());

    let records = trail.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].old_value, Some(json!({"_id": 7, "name": "alex"})));
    assert_eq!(records[0].new_value, Some(json!({"archived": true})));
}
