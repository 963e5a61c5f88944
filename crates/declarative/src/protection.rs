//! Protection policy
//!
//! A protected resource rejects every mutation except one whose change
//! carries an explicit `{old, new}` transition of the protection flag.

use crate::error::{Error, Result};
use crate::plan::{ActionType, Change, Protection};

/// Whether the change is an explicit protection transition.
pub fn is_protection_change(protection: Option<&Protection>) -> bool {
    protection.is_some_and(Protection::is_transition)
}

/// Reject transitions that do not change anything.
pub fn validate_transition(protection: Option<&Protection>) -> Result<()> {
    match protection {
        Some(Protection::Change { old, new }) if old == new => Err(Error::validation(format!(
            "invalid protection change: old and new are both {old}"
        ))),
        _ => Ok(()),
    }
}

/// Check a mutation of an existing resource against its live protection state.
///
/// `is_protected` must come from the resource as fetched at execution time.
pub fn check_mutation(
    resource_type: &str,
    resource_name: &str,
    is_protected: bool,
    change: &Change,
) -> Result<()> {
    if !is_protected || !matches!(change.action, ActionType::Update | ActionType::Delete) {
        return Ok(());
    }

    match change.protection {
        Some(Protection::Change { old: true, .. }) => Ok(()),
        Some(Protection::Change { old: false, .. }) => Err(Error::validation(format!(
            "protection status of {resource_type} '{resource_name}' changed since the plan was generated"
        ))),
        _ => Err(Error::Protection {
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
            verb: change.action.past_tense().to_string(),
        }),
    }
}
