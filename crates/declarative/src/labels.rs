//! Bookkeeping labels
//!
//! kongctl layers its own labels under the user's: an ownership tag
//! (namespace), a protection flag, and a managed-by marker with a
//! last-updated timestamp. All of them share the `KONGCTL-` prefix and are
//! rewritten on every create or update. User input can never set them.

use crate::plan::Protection;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;

/// Internal label representation.
pub type Labels = BTreeMap<String, String>;

/// Prefix shared by all bookkeeping keys.
pub const PREFIX: &str = "KONGCTL-";
/// Ownership tag.
pub const NAMESPACE_KEY: &str = "KONGCTL-namespace";
/// Protection flag.
pub const PROTECTED_KEY: &str = "KONGCTL-protected";
/// Managed-by marker.
pub const MANAGED_KEY: &str = "KONGCTL-managed";
/// Timestamp of the last kongctl write.
pub const LAST_UPDATED_KEY: &str = "KONGCTL-last-updated";

pub const TRUE_VALUE: &str = "true";
pub const FALSE_VALUE: &str = "false";

/// Namespace used when a change carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Prefixes the remote API reserves for itself.
const FORBIDDEN_PREFIXES: &[&str] = &["kong", "konnect", "mesh", "kic", "_"];

/// Maximum label key length accepted remotely.
const MAX_KEY_LEN: usize = 63;

/// Whether a key is a bookkeeping key.
pub fn is_bookkeeping_key(key: &str) -> bool {
    key.starts_with(PREFIX)
}

/// Whether labels mark a resource as protected.
pub fn is_protected(labels: &Labels) -> bool {
    labels.get(PROTECTED_KEY).is_some_and(|v| v == TRUE_VALUE)
}

/// Whether labels mark a resource as created by kongctl.
///
/// Resources written before the managed marker existed only carry the
/// namespace tag, so either one is enough.
pub fn is_managed(labels: &Labels) -> bool {
    labels.get(MANAGED_KEY).is_some_and(|v| v == TRUE_VALUE)
        || labels.get(NAMESPACE_KEY).is_some_and(|v| !v.is_empty())
}

/// Labels without bookkeeping keys.
pub fn user_labels(labels: &Labels) -> Labels {
    labels
        .iter()
        .filter(|(k, _)| !is_bookkeeping_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Convert a vendor label map with nullable values to the internal form.
pub fn normalize_labels(labels: &BTreeMap<String, Option<String>>) -> Labels {
    labels
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
        .collect()
}

/// Check a user label key against the remote API's rules.
pub fn validate_label_key(key: &str) -> Result<(), String> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(format!("label key must be 1-{MAX_KEY_LEN} characters: {key}"));
    }
    if is_bookkeeping_key(key) {
        return Ok(());
    }
    if let Some(prefix) = FORBIDDEN_PREFIXES.iter().find(|p| key.starts_with(*p)) {
        return Err(format!("label key cannot start with {prefix}: {key}"));
    }
    Ok(())
}

/// Read user labels from a change's `labels` field.
///
/// Non-string values are rejected; keys are validated.
pub fn labels_from_field(value: Option<&Value>) -> Result<Labels, String> {
    let Some(value) = value else {
        return Ok(Labels::new());
    };
    let object = match value {
        Value::Null => return Ok(Labels::new()),
        Value::Object(object) => object,
        _ => return Err("labels must be an object of strings".to_string()),
    };

    let mut labels = Labels::new();
    for (key, value) in object {
        let Value::String(value) = value else {
            return Err(format!("label '{key}' must be a string"));
        };
        validate_label_key(key)?;
        labels.insert(key.clone(), value.clone());
    }
    Ok(labels)
}

/// Labels for a newly created resource.
///
/// Bookkeeping keys in `user` are discarded before ours are set.
pub fn build_create_labels(
    user: &Labels,
    namespace: &str,
    protection: Option<&Protection>,
) -> Labels {
    let mut result = user_labels(user);
    add_bookkeeping(&mut result, namespace, protection);
    result
}

/// Labels for an update.
///
/// The result replaces the remote label set: user keys present in
/// `current` but absent from `desired` are not carried over. Bookkeeping
/// keys always come from `namespace` and `protection`.
pub fn build_update_labels(
    desired: &Labels,
    current: &Labels,
    namespace: &str,
    protection: Option<&Protection>,
) -> Labels {
    let mut result = user_labels(desired);
    let removed = removed_keys(desired, current);
    if !removed.is_empty() {
        log::debug!("Dropping stale labels: {}", removed.join(", "));
    }
    add_bookkeeping(&mut result, namespace, protection);
    result
}

/// User keys present in `current` but not in `desired`.
pub fn removed_keys(desired: &Labels, current: &Labels) -> Vec<String> {
    current
        .keys()
        .filter(|k| !is_bookkeeping_key(k) && !desired.contains_key(*k))
        .cloned()
        .collect()
}

fn add_bookkeeping(labels: &mut Labels, namespace: &str, protection: Option<&Protection>) {
    let namespace = if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    };
    let protected = protection.is_some_and(Protection::desired);

    labels.insert(NAMESPACE_KEY.to_string(), namespace.to_string());
    labels.insert(
        PROTECTED_KEY.to_string(),
        if protected { TRUE_VALUE } else { FALSE_VALUE }.to_string(),
    );
    labels.insert(MANAGED_KEY.to_string(), TRUE_VALUE.to_string());
    labels.insert(LAST_UPDATED_KEY.to_string(), timestamp());
}

/// Label values cannot contain colons; format is YYYYMMDD-HHMMSSZ.
fn timestamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%SZ").to_string()
}
