use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Field path locating a record's human-readable identifier.
///
/// Paths are configured per collection as dotted strings such as
/// `type_emission.large_name` and walked segment by segment into nested
/// mappings. Collections without a configured path fall back to `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyPath(Vec<String>);

impl PrimaryKeyPath {
    /// Parses a dotted path specification into its segments.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(ToOwned::to_owned).collect())
    }

    /// Returns the path segments in walking order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        self.0.as_slice()
    }

    /// Walks the path into a record and returns the identifier found there.
    ///
    /// Any missing segment, non-mapping intermediate, or null record
    /// resolves to an empty string. Absence is a normal case (partial
    /// records, sparse updates), never an error.
    #[must_use]
    pub fn resolve(&self, record: &Value) -> String {
        let mut current = record;
        for segment in &self.0 {
            match current.get(segment.as_str()) {
                Some(next) => current = next,
                None => return String::new(),
            }
        }

        match current {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl Default for PrimaryKeyPath {
    fn default() -> Self {
        Self::parse("name")
    }
}

/// Captured state of one record or an ordered batch of records.
///
/// Records are semi-structured JSON mappings with no fixed schema; bulk
/// operations carry a sequence of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    /// A batch snapshot from a bulk operation.
    Many(Vec<Value>),
    /// A single-record snapshot.
    One(Value),
}

impl Snapshot {
    /// Builds a snapshot from a raw JSON payload.
    ///
    /// Arrays become batch snapshots and null becomes no snapshot at all;
    /// anything else is carried as a single-record snapshot.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(Self::Many(items)),
            other => Some(Self::One(other)),
        }
    }

    /// Returns true when the snapshot carries no record data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Many(items) => items.is_empty(),
            Self::One(value) => value.as_object().is_some_and(serde_json::Map::is_empty),
        }
    }

    /// Collapses every record to its `{_id, name}` identifier pair.
    ///
    /// Deletions store these pairs instead of full snapshots; the record
    /// no longer exists to audit in full.
    #[must_use]
    pub fn identifier_summary(&self, path: &PrimaryKeyPath) -> Self {
        match self {
            Self::Many(items) => Self::Many(
                items
                    .iter()
                    .map(|record| identifier_pair(path, record))
                    .collect(),
            ),
            Self::One(record) => Self::One(identifier_pair(path, record)),
        }
    }

    /// Collapses the snapshot to a `{name}` marker for creation responses.
    ///
    /// Batch snapshots join the per-record identifiers with a comma in
    /// payload order; an empty batch yields an empty name.
    #[must_use]
    pub fn creation_summary(&self, path: &PrimaryKeyPath) -> Self {
        let name = match self {
            Self::Many(items) => items
                .iter()
                .map(|record| path.resolve(record))
                .collect::<Vec<_>>()
                .join(","),
            Self::One(record) => path.resolve(record),
        };

        Self::One(json!({ "name": name }))
    }

    /// Returns the snapshot as a raw JSON value.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Many(items) => Value::Array(items),
            Self::One(value) => value,
        }
    }
}

fn identifier_pair(path: &PrimaryKeyPath, record: &Value) -> Value {
    json!({
        "_id": record.get(crate::ID_FIELD).cloned().unwrap_or(Value::Null),
        "name": path.resolve(record),
    })
}
