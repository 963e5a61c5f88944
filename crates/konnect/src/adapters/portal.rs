//! Developer portals (`/v3/portals`)

use super::{
    create_labels, find_by_name, find_by_path, reference_field, response_id, to_body,
    update_labels,
};
use crate::client::KonnectApi;
use crate::types::{CreatePortal, UpdatePortal};
use anyhow::Result;
use declarative::fields::{opt_bool, opt_string, string_field};
use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use std::sync::Arc;

const COLLECTION: &str = "/v3/portals";

pub struct PortalAdapter {
    api: Arc<dyn KonnectApi>,
}

impl PortalAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }
}

impl ResourceOperations for PortalAdapter {
    type CreateRequest = CreatePortal;
    type UpdateRequest = UpdatePortal;

    fn resource_type(&self) -> &'static str {
        "portal"
    }

    fn map_create_fields(&self, ctx: &ExecutionContext<'_>, fields: &Fields) -> Result<CreatePortal> {
        Ok(CreatePortal {
            name: string_field(fields, "name").to_string(),
            display_name: opt_string(fields, "display_name"),
            description: opt_string(fields, "description"),
            authentication_enabled: opt_bool(fields, "authentication_enabled"),
            rbac_enabled: opt_bool(fields, "rbac_enabled"),
            auto_approve_developers: opt_bool(fields, "auto_approve_developers"),
            auto_approve_applications: opt_bool(fields, "auto_approve_applications"),
            default_api_visibility: opt_string(fields, "default_api_visibility"),
            default_page_visibility: opt_string(fields, "default_page_visibility"),
            default_application_auth_strategy_id: reference_field(
                ctx,
                "default_application_auth_strategy_id",
            )?,
            labels: create_labels(ctx, fields)?,
        })
    }

    fn map_update_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
        current_labels: &Labels,
    ) -> Result<UpdatePortal> {
        Ok(UpdatePortal {
            name: opt_string(fields, "name"),
            display_name: opt_string(fields, "display_name"),
            description: opt_string(fields, "description"),
            authentication_enabled: opt_bool(fields, "authentication_enabled"),
            rbac_enabled: opt_bool(fields, "rbac_enabled"),
            auto_approve_developers: opt_bool(fields, "auto_approve_developers"),
            auto_approve_applications: opt_bool(fields, "auto_approve_applications"),
            default_api_visibility: opt_string(fields, "default_api_visibility"),
            default_page_visibility: opt_string(fields, "default_page_visibility"),
            default_application_auth_strategy_id: reference_field(
                ctx,
                "default_application_auth_strategy_id",
            )?,
            labels: update_labels(ctx, fields, current_labels)?,
        })
    }

    fn create(&self, _ctx: &ExecutionContext<'_>, request: CreatePortal) -> Result<String> {
        let response = self.api.post(COLLECTION, &to_body(&request)?)?;
        response_id(&response, "portal")
    }

    fn update(&self, _ctx: &ExecutionContext<'_>, id: &str, request: UpdatePortal) -> Result<String> {
        self.api
            .patch(&format!("{COLLECTION}/{id}"), &to_body(&request)?)?;
        Ok(id.to_string())
    }

    fn delete(&self, _ctx: &ExecutionContext<'_>, id: &str) -> Result<()> {
        // Portals with published APIs or developers refuse a plain delete.
        self.api
            .delete(&format!("{COLLECTION}/{id}"), &[("force", "true")])?;
        Ok(())
    }

    fn get_by_name(&self, _ctx: &ExecutionContext<'_>, name: &str) -> Result<Option<ResourceInfo>> {
        find_by_name(self.api.as_ref(), COLLECTION, name)
    }

    fn get_by_id(&self, _ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>> {
        find_by_path(self.api.as_ref(), &format!("{COLLECTION}/{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{change, ctx};
    use super::*;
    use crate::MemoryApi;
    use declarative::labels::{MANAGED_KEY, NAMESPACE_KEY, PROTECTED_KEY};
    use declarative::{ActionType, BaseExecutor, ChangeHandler, ErrorCategory, Protection, ReferenceInfo};
    use serde_json::json;

    fn handler(api: &MemoryApi) -> BaseExecutor<PortalAdapter> {
        BaseExecutor::new(PortalAdapter::new(Arc::new(api.clone())))
    }

    fn managed_portal(api: &MemoryApi, name: &str, extra: &[(&str, &str)]) -> String {
        let mut labels = serde_json::Map::new();
        labels.insert(MANAGED_KEY.to_string(), json!("true"));
        labels.insert(NAMESPACE_KEY.to_string(), json!("default"));
        labels.insert(PROTECTED_KEY.to_string(), json!("false"));
        for (k, v) in extra {
            labels.insert((*k).to_string(), json!(v));
        }
        api.seed(COLLECTION, json!({"name": name, "labels": labels}))
    }

    #[test]
    fn test_create_portal() {
        let api = MemoryApi::new();
        let change = change("portal", "dev", ActionType::Create)
            .with_field("name", "dev-portal")
            .with_field("authentication_enabled", true)
            .with_field("labels", json!({"team": "docs"}));

        let id = handler(&api).create(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(stored["name"], "dev-portal");
        assert_eq!(stored["authentication_enabled"], true);
        assert_eq!(stored["labels"]["team"], "docs");
        assert_eq!(stored["labels"][MANAGED_KEY], "true");
        assert!(stored.get("description").is_none());
    }

    #[test]
    fn test_create_conflict_is_api_error() {
        let api = MemoryApi::new();
        api.fail("POST /v3/portals", 409);
        let change = change("portal", "dev", ActionType::Create).with_field("name", "dev-portal");

        let err = handler(&api).create(&ctx(&change)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Remote);
        let message = err.to_string();
        assert!(message.contains("create of portal 'dev-portal'"), "{message}");
        assert!(message.contains("409"), "{message}");
    }

    #[test]
    fn test_create_with_resolved_default_auth_strategy() {
        let api = MemoryApi::new();
        let change = change("portal", "dev", ActionType::Create)
            .with_field("name", "dev-portal")
            .with_field("default_application_auth_strategy_id", "key-auth")
            .with_reference(
                "default_application_auth_strategy_id",
                ReferenceInfo::to_ref("key-auth"),
            );
        let mut ctx = ctx(&change);
        ctx.set_reference_id(
            "default_application_auth_strategy_id",
            "00000000-0000-4000-8000-0000000000aa",
        );

        let id = handler(&api).create(&ctx).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(
            stored["default_application_auth_strategy_id"],
            "00000000-0000-4000-8000-0000000000aa"
        );
    }

    #[test]
    fn test_create_with_unresolved_reference_fails_before_calls() {
        let api = MemoryApi::new();
        let change = change("portal", "dev", ActionType::Create)
            .with_field("name", "dev-portal")
            .with_field("default_application_auth_strategy_id", "key-auth");

        let err = handler(&api).create(&ctx(&change)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Reference);
        assert_eq!(api.mutation_count(), 0);
    }

    #[test]
    fn test_update_sends_null_for_removed_labels() {
        let api = MemoryApi::new();
        let id = managed_portal(&api, "dev-portal", &[("team", "docs"), ("env", "dev")]);
        let change = change("portal", "dev", ActionType::Update)
            .with_resource_id(&id)
            .with_field("name", "dev-portal")
            .with_field("description", "Developer docs")
            .with_field("labels", json!({"env": "prod"}));

        handler(&api).update(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(stored["description"], "Developer docs");
        assert_eq!(stored["labels"]["env"], "prod");
        assert!(stored["labels"].get("team").is_none());
        assert_eq!(stored["labels"][MANAGED_KEY], "true");
    }

    #[test]
    fn test_update_protection_transition_sets_label() {
        let api = MemoryApi::new();
        let id = managed_portal(&api, "dev-portal", &[("team", "docs")]);
        let change = change("portal", "dev", ActionType::Update)
            .with_resource_id(&id)
            .with_field("name", "dev-portal")
            .with_protection(Protection::Change { old: false, new: true });

        handler(&api).update(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(stored["labels"][PROTECTED_KEY], "true");
        assert_eq!(stored["labels"]["team"], "docs");
    }

    #[test]
    fn test_delete_forces() {
        let api = MemoryApi::new();
        let id = managed_portal(&api, "dev-portal", &[]);
        let change = change("portal", "dev", ActionType::Delete)
            .with_resource_id(&id)
            .with_field("name", "dev-portal");

        handler(&api).delete(&ctx(&change)).unwrap();

        assert!(api.object(&format!("{COLLECTION}/{id}")).is_none());
        assert!(api.calls().contains(&format!("DELETE {COLLECTION}/{id}?force=true")));
    }

    #[test]
    fn test_delete_unmanaged_portal_is_refused() {
        let api = MemoryApi::new();
        let id = api.seed(COLLECTION, json!({"name": "hand-made"}));
        let change = change("portal", "hand-made", ActionType::Delete)
            .with_resource_id(&id)
            .with_field("name", "hand-made");

        assert!(handler(&api).delete(&ctx(&change)).is_err());
        assert!(api.object(&format!("{COLLECTION}/{id}")).is_some());
    }

    #[test]
    fn test_get_by_id() {
        let api = MemoryApi::new();
        let id = managed_portal(&api, "dev-portal", &[]);
        let change = change("portal", "dev", ActionType::Update);

        let info = handler(&api).get_by_id(&ctx(&change), &id).unwrap().unwrap();
        assert_eq!(info.name, "dev-portal");
        assert!(info.is_managed());
        assert!(handler(&api).get_by_id(&ctx(&change), "missing").unwrap().is_none());
    }
}
