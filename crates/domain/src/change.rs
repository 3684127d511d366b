use serde_json::{Map, Value};

/// Record-linking field carried through every diff untouched.
pub const ID_FIELD: &str = "_id";

/// Returns the fields of `new` whose values differ from `old`.
///
/// Keys absent from `old` count as changed. The [`ID_FIELD`] linking field
/// is preserved whenever `new` carries one, even if unchanged, so the audit
/// record stays addressable. Inputs that are not JSON mappings pass through
/// unchanged; there is nothing field-wise to compare.
#[must_use]
pub fn changed_fields(old: &Value, new: &Value) -> Value {
    let (Some(old_map), Some(new_map)) = (old.as_object(), new.as_object()) else {
        return new.clone();
    };

    let mut changed = Map::new();
    for (key, value) in new_map {
        if key == ID_FIELD || old_map.get(key) != Some(value) {
            changed.insert(key.clone(), value.clone());
        }
    }

    Value::Object(changed)
}
