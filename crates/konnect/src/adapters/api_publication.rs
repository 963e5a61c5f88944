//! API publications (`/v3/apis/{api}/publications/{portal}`)
//!
//! A publication is keyed by its portal: the portal ID is both the path
//! segment and the identifier returned from create.

use super::{api, api_id, find_by_path, reference_field, to_body};
use crate::client::KonnectApi;
use crate::types::ApiPublication;
use anyhow::{Result, anyhow};
use declarative::fields::{opt_bool, opt_string, string_slice};
use declarative::{Error as ExecError, ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use std::sync::Arc;

pub struct ApiPublicationAdapter {
    api: Arc<dyn KonnectApi>,
}

impl ApiPublicationAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }

    fn path(ctx: &ExecutionContext<'_>, portal_id: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/publications/{portal_id}",
            api::COLLECTION,
            api_id(ctx)?
        ))
    }
}

/// Resolved auth strategy IDs, in configuration order.
fn auth_strategy_ids(ctx: &ExecutionContext<'_>, fields: &Fields) -> Option<Vec<String>> {
    let resolved = ctx.reference_ids("auth_strategy_ids");
    if !resolved.is_empty() {
        return Some(resolved.to_vec());
    }
    fields.get("auth_strategy_ids").and_then(string_slice)
}

impl ResourceOperations for ApiPublicationAdapter {
    type CreateRequest = ApiPublication;
    type UpdateRequest = ();

    fn resource_type(&self) -> &'static str {
        "api_publication"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["portal_id"]
    }

    fn supports_update(&self) -> bool {
        false
    }

    fn supports_labels(&self) -> bool {
        false
    }

    fn map_create_fields(&self, ctx: &ExecutionContext<'_>, fields: &Fields) -> Result<ApiPublication> {
        let portal_id = reference_field(ctx, "portal_id")?.ok_or_else(|| {
            anyhow!(ExecError::reference("portal", "portal_id", "portal ID is required"))
        })?;
        Ok(ApiPublication {
            portal_id,
            auth_strategy_ids: auth_strategy_ids(ctx, fields),
            auto_approve_registrations: opt_bool(fields, "auto_approve_registrations"),
            visibility: opt_string(fields, "visibility"),
        })
    }

    fn map_update_fields(
        &self,
        _ctx: &ExecutionContext<'_>,
        _fields: &Fields,
        _current_labels: &Labels,
    ) -> Result<()> {
        Err(anyhow!("api_publication does not support updates"))
    }

    fn create(&self, ctx: &ExecutionContext<'_>, request: ApiPublication) -> Result<String> {
        let path = Self::path(ctx, &request.portal_id)?;
        self.api.put(&path, &to_body(&request)?)?;
        Ok(request.portal_id)
    }

    fn update(&self, _ctx: &ExecutionContext<'_>, _id: &str, _request: ()) -> Result<String> {
        Err(anyhow!("api_publication does not support updates"))
    }

    fn delete(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<()> {
        self.api.delete(&Self::path(ctx, id)?, &[])?;
        Ok(())
    }

    fn get_by_name(&self, _ctx: &ExecutionContext<'_>, _name: &str) -> Result<Option<ResourceInfo>> {
        // Publications have no name; the planner identifies them by portal.
        Ok(None)
    }

    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>> {
        find_by_path(self.api.as_ref(), &Self::path(ctx, id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{change, ctx};
    use super::*;
    use crate::MemoryApi;
    use declarative::{ActionType, BaseExecutor, ChangeHandler, ReferenceInfo};
    use serde_json::json;

    const NOT_A_UUID: &str = "00000000-0000-4000-8000-0000000000p1";

    fn handler(api: &MemoryApi) -> BaseExecutor<ApiPublicationAdapter> {
        BaseExecutor::new(ApiPublicationAdapter::new(Arc::new(api.clone())))
    }

    #[test]
    fn test_publish_puts_under_portal() {
        let api = MemoryApi::new();
        let api_id = api.seed(api::COLLECTION, json!({"name": "Users API"}));
        let change = change("api_publication", "users-on-dev", ActionType::Create)
            .with_field("portal_id", "dev")
            .with_field("visibility", "public")
            .with_field("auth_strategy_ids", json!(["key-auth", "oidc"]))
            .with_reference("portal_id", ReferenceInfo::to_ref("dev"));
        let mut ctx = ctx(&change);
        ctx.set_parent_id(&api_id);
        ctx.set_reference_id("portal_id", "portal-1");
        ctx.set_reference_ids("auth_strategy_ids", vec!["s-1".to_string(), "s-2".to_string()]);

        let id = handler(&api).create(&ctx).unwrap();

        assert_eq!(id, "portal-1");
        let stored = api
            .object(&format!("/v3/apis/{api_id}/publications/portal-1"))
            .unwrap();
        assert_eq!(stored["visibility"], "public");
        assert_eq!(stored["auth_strategy_ids"], json!(["s-1", "s-2"]));
        assert!(stored.get("labels").is_none());
    }

    #[test]
    fn test_publish_with_literal_portal_id() {
        let api = MemoryApi::new();
        let api_id = api.seed(api::COLLECTION, json!({"name": "Users API"}));
        let portal = "00000000-0000-4000-8000-00000000abcd";
        let change = change("api_publication", "users-on-dev", ActionType::Create)
            .with_field("portal_id", portal);
        let mut ctx = ctx(&change);
        ctx.set_parent_id(&api_id);

        assert_eq!(handler(&api).create(&ctx).unwrap(), portal);
    }

    #[test]
    fn test_unresolved_portal_name_fails() {
        let api = MemoryApi::new();
        let change = change("api_publication", "users-on-dev", ActionType::Create)
            .with_field("portal_id", NOT_A_UUID);
        let mut ctx = ctx(&change);
        ctx.set_parent_id("00000000-0000-4000-8000-000000000001");

        // Not a canonical UUID, so it is treated as an unresolved name.
        assert!(handler(&api).create(&ctx).is_err());
        assert_eq!(api.mutation_count(), 0);
    }

    #[test]
    fn test_unpublish() {
        let api = MemoryApi::new();
        let api_id = api.seed(api::COLLECTION, json!({"name": "Users API"}));
        api.put(&format!("/v3/apis/{api_id}/publications/portal-1"), &json!({}))
            .unwrap();
        let change = change("api_publication", "users-on-dev", ActionType::Delete)
            .with_resource_id("portal-1");
        let mut ctx = ctx(&change);
        ctx.set_parent_id(&api_id);

        handler(&api).delete(&ctx).unwrap();

        assert!(api
            .object(&format!("/v3/apis/{api_id}/publications/portal-1"))
            .is_none());
    }

    #[test]
    fn test_delete_of_absent_publication_succeeds() {
        let api = MemoryApi::new();
        let api_id = api.seed(api::COLLECTION, json!({"name": "Users API"}));
        let change = change("api_publication", "users-on-dev", ActionType::Delete)
            .with_resource_id("portal-1");
        let mut ctx = ctx(&change);
        ctx.set_parent_id(&api_id);

        handler(&api).delete(&ctx).unwrap();

        assert_eq!(api.mutation_count(), 0);
    }

    #[test]
    fn test_lookup_by_name_is_unsupported() {
        let api = MemoryApi::new();
        let change = change("api_publication", "users-on-dev", ActionType::Create);

        assert!(handler(&api).get_by_name(&ctx(&change), "anything").unwrap().is_none());
    }
}
