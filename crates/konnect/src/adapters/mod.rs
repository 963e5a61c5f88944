//! Resource adapters
//!
//! One [`ResourceOperations`](declarative::ResourceOperations)
//! implementation per Konnect resource type. Adapters only map fields and
//! issue requests; the lifecycle around them lives in
//! [`BaseExecutor`](declarative::BaseExecutor).

pub mod api;
pub mod api_implementation;
pub mod api_publication;
pub mod api_version;
pub mod auth_strategy;
pub mod control_plane;
pub mod gateway_service;
pub mod portal;

pub use api::ApiAdapter;
pub use api_implementation::ApiImplementationAdapter;
pub use api_publication::ApiPublicationAdapter;
pub use api_version::ApiVersionAdapter;
pub use auth_strategy::AuthStrategyAdapter;
pub use control_plane::ControlPlaneAdapter;
pub use gateway_service::GatewayServiceAdapter;
pub use portal::PortalAdapter;

use crate::client::KonnectApi;
use crate::types::{LabelPatch, labels_of};
use anyhow::{Context, Result, anyhow};
use declarative::labels::{build_create_labels, build_update_labels, labels_from_field, removed_keys};
use declarative::{Error as ExecError, ExecutionContext, Fields, Labels, ResourceInfo};
use serde::Serialize;
use serde_json::Value;

/// Find a resource in a collection by exact name.
pub(crate) fn find_by_name(
    api: &dyn KonnectApi,
    collection: &str,
    name: &str,
) -> Result<Option<ResourceInfo>> {
    find_by_field(api, collection, "name", name)
}

/// Find a resource in a collection by an exact field value.
pub(crate) fn find_by_field(
    api: &dyn KonnectApi,
    collection: &str,
    field: &str,
    value: &str,
) -> Result<Option<ResourceInfo>> {
    let filter = format!("filter[{field}][eq]");
    let Some(page) = api.get(collection, &[(filter.as_str(), value)])? else {
        return Ok(None);
    };
    // Konnect filters are case-insensitive on some collections.
    Ok(page_items(&page)?
        .iter()
        .find(|item| item.get(field).and_then(Value::as_str) == Some(value))
        .map(|item| resource_info(item, field)))
}

/// Fetch a single resource; `Ok(None)` on 404.
pub(crate) fn find_by_path(api: &dyn KonnectApi, path: &str) -> Result<Option<ResourceInfo>> {
    Ok(api.get(path, &[])?.map(|item| resource_info(&item, "name")))
}

/// Items of a list response.
pub(crate) fn page_items(page: &Value) -> Result<&Vec<Value>> {
    page.get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("list response has no data array"))
}

/// Project a Konnect object onto the engine's resource view.
pub(crate) fn resource_info(item: &Value, name_field: &str) -> ResourceInfo {
    let id = item.get("id").and_then(Value::as_str).unwrap_or_default();
    let name = item
        .get(name_field)
        .and_then(Value::as_str)
        .unwrap_or_default();
    ResourceInfo::new(id, name, labels_of(item))
}

/// ID of a created resource.
pub(crate) fn response_id(response: &Value, resource_type: &str) -> Result<String> {
    response
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("{resource_type} response carried no ID"))
}

/// Serialize a typed request.
pub(crate) fn to_body<T: Serialize>(request: &T) -> Result<Value> {
    serde_json::to_value(request).context("Failed to encode request body")
}

/// Labels for a create request.
pub(crate) fn create_labels(ctx: &ExecutionContext<'_>, fields: &Fields) -> Result<Labels> {
    let user = labels_from_field(fields.get("labels")).map_err(|e| anyhow!(ExecError::validation(e)))?;
    Ok(build_create_labels(&user, ctx.namespace(), ctx.protection()))
}

/// Labels for an update request.
///
/// When the change carries no labels the current user labels are kept and
/// only the bookkeeping keys are rewritten.
pub(crate) fn update_labels(
    ctx: &ExecutionContext<'_>,
    fields: &Fields,
    current: &Labels,
) -> Result<LabelPatch> {
    if !fields.contains_key("labels") {
        let labels = build_update_labels(current, current, ctx.namespace(), ctx.protection());
        return Ok(LabelPatch::new(labels, Vec::new()));
    }

    let desired = labels_from_field(fields.get("labels")).map_err(|e| anyhow!(ExecError::validation(e)))?;
    let labels = build_update_labels(&desired, current, ctx.namespace(), ctx.protection());
    Ok(LabelPatch::new(labels, removed_keys(&desired, current)))
}

/// ID a reference field points at.
///
/// The resolved reference wins; a literal UUID in the field is taken as-is.
/// Anything else is a name that never got resolved.
pub(crate) fn reference_field(ctx: &ExecutionContext<'_>, key: &str) -> Result<Option<String>> {
    if let Some(id) = ctx.reference_id(key) {
        return Ok(Some(id.to_string()));
    }
    match ctx.fields().get(key).and_then(Value::as_str).map(str::trim) {
        None | Some("") => Ok(None),
        Some(id) if declarative::fields::is_valid_uuid(id) => Ok(Some(id.to_string())),
        Some(name) => Err(anyhow!(ExecError::reference(
            declarative::resolver::reference_type(key),
            name,
            "reference was not resolved to an ID"
        ))),
    }
}

/// Resolved ID of the API a child resource belongs to.
pub(crate) fn api_id(ctx: &ExecutionContext<'_>) -> Result<String> {
    if let Some(id) = ctx.parent_id().or_else(|| ctx.reference_id("api_id")) {
        return Ok(id.to_string());
    }
    if let Some(id) = ctx
        .fields()
        .get("api_id")
        .and_then(Value::as_str)
        .filter(|id| declarative::fields::is_valid_uuid(id))
    {
        return Ok(id.to_string());
    }
    let reference = ctx
        .change
        .parent
        .as_ref()
        .map_or("api_id", |p| p.reference.as_str());
    Err(anyhow!(ExecError::reference("api", reference, "API ID was not resolved")))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for adapter tests.

    use declarative::{ActionType, CancelToken, Change, ExecutionContext};

    pub fn change(resource_type: &str, reference: &str, action: ActionType) -> Change {
        Change::new(
            format!("1:{}:{resource_type}:{reference}", action_letter(action)),
            action,
            resource_type,
            reference,
        )
    }

    fn action_letter(action: ActionType) -> &'static str {
        match action {
            ActionType::Create => "c",
            ActionType::Update => "u",
            ActionType::Delete => "d",
            ActionType::ExternalTool => "e",
        }
    }

    pub fn ctx(change: &Change) -> ExecutionContext<'_> {
        ExecutionContext::new(change, false, CancelToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{change, ctx};
    use super::*;
    use crate::MemoryApi;
    use declarative::labels::{MANAGED_KEY, NAMESPACE_KEY};
    use declarative::{ActionType, Protection};
    use serde_json::json;

    #[test]
    fn test_find_by_name_exact_match() {
        let api = MemoryApi::new();
        let id = api.seed("/v3/portals", json!({"name": "dev", "labels": {"team": "a"}}));

        let found = find_by_name(&api, "/v3/portals", "dev").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.labels["team"], "a");
        assert!(find_by_name(&api, "/v3/portals", "prod").unwrap().is_none());
    }

    #[test]
    fn test_create_labels_add_bookkeeping() {
        let change = change("portal", "dev", ActionType::Create)
            .with_namespace("team-a")
            .with_field("labels", json!({"env": "dev"}));
        let ctx = ctx(&change);

        let labels = create_labels(&ctx, ctx.fields()).unwrap();
        assert_eq!(labels["env"], "dev");
        assert_eq!(labels[NAMESPACE_KEY], "team-a");
        assert_eq!(labels[MANAGED_KEY], "true");
    }

    #[test]
    fn test_create_labels_reject_reserved_prefix() {
        let change = change("portal", "dev", ActionType::Create)
            .with_field("labels", json!({"konnect-owned": "x"}));
        let ctx = ctx(&change);

        let err = create_labels(&ctx, ctx.fields()).unwrap_err();
        assert!(err.to_string().contains("konnect-owned"));
    }

    #[test]
    fn test_update_labels_without_labels_keeps_current() {
        let change = change("portal", "dev", ActionType::Update)
            .with_protection(Protection::Change { old: false, new: true });
        let ctx = ctx(&change);
        let mut current = Labels::new();
        current.insert("team".to_string(), "a".to_string());

        let patch = update_labels(&ctx, ctx.fields(), &current).unwrap();
        assert_eq!(patch.labels["team"], "a");
        assert_eq!(patch.labels["KONGCTL-protected"], "true");
        assert!(patch.removed.is_empty());
    }

    #[test]
    fn test_update_labels_removes_dropped_keys() {
        let change = change("portal", "dev", ActionType::Update)
            .with_field("labels", json!({"env": "prod"}));
        let ctx = ctx(&change);
        let mut current = Labels::new();
        current.insert("team".to_string(), "a".to_string());

        let patch = update_labels(&ctx, ctx.fields(), &current).unwrap();
        assert!(!patch.labels.contains_key("team"));
        assert_eq!(patch.removed, vec!["team".to_string()]);
    }

    #[test]
    fn test_api_id_prefers_parent() {
        let change = change("api_version", "v1", ActionType::Create)
            .with_parent("my-api", "00000000-0000-4000-8000-000000000001");
        let mut ctx = ctx(&change);
        ctx.set_parent_id("00000000-0000-4000-8000-000000000001");

        assert_eq!(api_id(&ctx).unwrap(), "00000000-0000-4000-8000-000000000001");
    }

    #[test]
    fn test_api_id_missing_is_reference_error() {
        let change = change("api_version", "v1", ActionType::Create);
        let ctx = ctx(&change);

        let err = api_id(&ctx).unwrap_err();
        assert!(err.downcast_ref::<ExecError>().is_some());
    }
}
