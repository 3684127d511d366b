use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use http::{Method, StatusCode};
use serde_json::Value;

use vestigia_core::{AppResult, UserIdentity};
use vestigia_domain::{AuditAction, PrimaryKeyPath, Snapshot, changed_fields};

use crate::audit_ports::{AuditRecord, AuditTrailRepository};

#[cfg(test)]
mod tests;

/// Immutable per-deployment audit configuration.
///
/// Constructed once at composition time and shared by the interceptor.
/// Every fallback the filter applies is an explicit value here, never
/// module-level state.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    audited_methods: HashSet<Method>,
    success_statuses: HashSet<StatusCode>,
    primary_keys: HashMap<String, PrimaryKeyPath>,
    ignored_paths: HashSet<String>,
    ignored_terms: Vec<String>,
    audit_collection: String,
}

impl AuditPolicy {
    /// Creates the default policy: mutating verbs, the 200/201/204 success
    /// statuses, and no per-collection identifier mappings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            audited_methods: HashSet::from([
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
            ]),
            success_statuses: HashSet::from([
                StatusCode::OK,
                StatusCode::CREATED,
                StatusCode::NO_CONTENT,
            ]),
            primary_keys: HashMap::new(),
            ignored_paths: HashSet::new(),
            ignored_terms: vec!["swagger".to_owned(), "search".to_owned()],
            audit_collection: "audit".to_owned(),
        }
    }

    /// Maps a collection to the dotted path of its display identifier.
    #[must_use]
    pub fn with_primary_key(mut self, collection: impl Into<String>, path: &str) -> Self {
        self.primary_keys
            .insert(collection.into(), PrimaryKeyPath::parse(path));
        self
    }

    /// Excludes an exact endpoint path from auditing.
    #[must_use]
    pub fn with_ignored_path(mut self, path: impl Into<String>) -> Self {
        self.ignored_paths.insert(path.into());
        self
    }

    /// Excludes every endpoint path containing the given term.
    #[must_use]
    pub fn with_ignored_term(mut self, term: impl Into<String>) -> Self {
        self.ignored_terms.push(term.into());
        self
    }

    /// Replaces the set of audited HTTP methods.
    #[must_use]
    pub fn with_audited_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.audited_methods = methods.into_iter().collect();
        self
    }

    /// Names the collection the audit trail itself is stored in.
    ///
    /// Requests against this collection are never audited, which keeps the
    /// trail from recursively auditing its own writes.
    #[must_use]
    pub fn with_audit_collection(mut self, collection: impl Into<String>) -> Self {
        self.audit_collection = collection.into();
        self
    }

    /// Returns the identifier path configured for a collection.
    ///
    /// Collections without a mapping fall back to the default `name` path.
    #[must_use]
    pub fn primary_key(&self, collection: &str) -> PrimaryKeyPath {
        self.primary_keys
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Decides whether a completed request deserves an audit record.
    ///
    /// Rules apply in order: the collection must be known and must not be
    /// the audit trail's own; the endpoint must not be ignored exactly or by
    /// substring; the verb and the response status must both be in the
    /// audited sets.
    #[must_use]
    pub fn is_auditable(
        &self,
        collection: &str,
        endpoint: &str,
        method: &Method,
        status: StatusCode,
    ) -> bool {
        if collection.is_empty() || collection == self.audit_collection {
            return false;
        }

        if self.ignored_paths.contains(endpoint)
            || self
                .ignored_terms
                .iter()
                .any(|term| endpoint.contains(term.as_str()))
        {
            return false;
        }

        self.audited_methods.contains(method) && self.success_statuses.contains(&status)
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request scratch state the routing layer attaches to a response.
///
/// This is the narrow contract between handlers and the interceptor: the
/// collection a route operates on plus whatever snapshots the handler
/// captured around the mutation. The state lives for exactly one request
/// lifecycle and is discarded once the record is written or skipped.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    /// Collection the route operates on.
    pub collection: Option<String>,
    /// Snapshot captured before the mutation, when the handler had one.
    pub prior_state: Option<Snapshot>,
    /// Post-mutation snapshot supplied by the handler, trusted verbatim.
    pub supplied_state: Option<Snapshot>,
}

impl AuditContext {
    /// Creates a scratch context naming the collection a route mutates.
    #[must_use]
    pub fn for_collection(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            prior_state: None,
            supplied_state: None,
        }
    }

    /// Attaches the snapshot captured before the mutation.
    #[must_use]
    pub fn with_prior_state(mut self, snapshot: Snapshot) -> Self {
        self.prior_state = Some(snapshot);
        self
    }

    /// Attaches the post-mutation snapshot the handler already holds.
    #[must_use]
    pub fn with_supplied_state(mut self, snapshot: Snapshot) -> Self {
        self.supplied_state = Some(snapshot);
        self
    }
}

/// Everything the interceptor observes about one completed request.
#[derive(Debug, Clone)]
pub struct CompletedRequest {
    /// Request method.
    pub method: Method,
    /// Endpoint path that served the request.
    pub path: String,
    /// Status the response completed with.
    pub status: StatusCode,
    /// Scratch context attached by the routing layer, when any.
    pub context: AuditContext,
    /// Raw JSON request body, when one was readable.
    pub body: Option<Value>,
    /// Authenticated identity, when the session carried one.
    pub actor: Option<UserIdentity>,
}

/// Application service producing the audit trail for completed requests.
#[derive(Clone)]
pub struct AuditTrailService {
    policy: AuditPolicy,
    repository: Arc<dyn AuditTrailRepository>,
}

impl AuditTrailService {
    /// Creates a service from a policy and a writer implementation.
    #[must_use]
    pub fn new(policy: AuditPolicy, repository: Arc<dyn AuditTrailRepository>) -> Self {
        Self { policy, repository }
    }

    /// Returns the policy the service was constructed with.
    #[must_use]
    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Produces and persists the audit record for one completed request.
    ///
    /// Requests the policy rejects are skipped without error. A failed
    /// write surfaces as `Err`; the hosting layer decides what to do with
    /// it, and must never let it alter the already-decided response.
    pub async fn record_completed_request(&self, request: CompletedRequest) -> AppResult<()> {
        let Some(collection) = request
            .context
            .collection
            .as_deref()
            .filter(|name| !name.is_empty())
        else {
            return Ok(());
        };

        if !self.policy.is_auditable(
            collection,
            request.path.as_str(),
            &request.method,
            request.status,
        ) {
            return Ok(());
        }

        let primary_key = self.policy.primary_key(collection);
        let prior = request.context.prior_state;
        let supplied = request.context.supplied_state;
        let current = supplied
            .clone()
            .or_else(|| request.body.and_then(Snapshot::from_json));

        let (old_value, new_value) = if request.method == Method::DELETE {
            (
                prior.map(|snapshot| snapshot.identifier_summary(&primary_key)),
                current.filter(|snapshot| !snapshot.is_empty()),
            )
        } else if request.method == Method::GET {
            (None, None)
        } else {
            let mut new_state = current;

            if supplied.is_none() {
                if let (Some(Snapshot::One(old)), Some(Snapshot::One(new))) = (&prior, &new_state) {
                    if old.as_object().is_some_and(|fields| !fields.is_empty()) {
                        new_state = Some(Snapshot::One(changed_fields(old, new)));
                    }
                }
            }

            if request.status == StatusCode::CREATED {
                new_state = Some(
                    new_state
                        .unwrap_or_else(|| Snapshot::One(Value::Null))
                        .creation_summary(&primary_key),
                );
            }

            (prior, new_state)
        };

        let record = AuditRecord {
            collection: collection.to_owned(),
            action: AuditAction::classify(&request.method, request.status),
            endpoint: request.path,
            user: request.actor.unwrap_or_else(UserIdentity::placeholder),
            old_value: old_value.map(Snapshot::into_json),
            new_value: new_value.map(Snapshot::into_json),
            created_on: Utc::now(),
        };

        self.repository.append_record(record).await
    }
}
