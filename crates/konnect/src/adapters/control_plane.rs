//! Gateway control planes (`/v2/control-planes`)

use super::{create_labels, find_by_name, find_by_path, response_id, to_body, update_labels};
use crate::client::KonnectApi;
use crate::types::{CreateControlPlane, UpdateControlPlane};
use anyhow::Result;
use declarative::fields::{opt_bool, opt_string, string_field};
use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use serde_json::Value;
use std::sync::Arc;

const COLLECTION: &str = "/v2/control-planes";

pub struct ControlPlaneAdapter {
    api: Arc<dyn KonnectApi>,
}

impl ControlPlaneAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }
}

fn proxy_urls(fields: &Fields) -> Option<Vec<Value>> {
    fields.get("proxy_urls").and_then(Value::as_array).cloned()
}

impl ResourceOperations for ControlPlaneAdapter {
    type CreateRequest = CreateControlPlane;
    type UpdateRequest = UpdateControlPlane;

    fn resource_type(&self) -> &'static str {
        "control_plane"
    }

    fn map_create_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
    ) -> Result<CreateControlPlane> {
        Ok(CreateControlPlane {
            name: string_field(fields, "name").to_string(),
            description: opt_string(fields, "description"),
            cluster_type: opt_string(fields, "cluster_type"),
            auth_type: opt_string(fields, "auth_type"),
            cloud_gateway: opt_bool(fields, "cloud_gateway"),
            proxy_urls: proxy_urls(fields),
            labels: create_labels(ctx, fields)?,
        })
    }

    fn map_update_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
        current_labels: &Labels,
    ) -> Result<UpdateControlPlane> {
        Ok(UpdateControlPlane {
            name: opt_string(fields, "name"),
            description: opt_string(fields, "description"),
            auth_type: opt_string(fields, "auth_type"),
            proxy_urls: proxy_urls(fields),
            labels: update_labels(ctx, fields, current_labels)?,
        })
    }

    fn create(&self, _ctx: &ExecutionContext<'_>, request: CreateControlPlane) -> Result<String> {
        let response = self.api.post(COLLECTION, &to_body(&request)?)?;
        response_id(&response, "control_plane")
    }

    fn update(
        &self,
        _ctx: &ExecutionContext<'_>,
        id: &str,
        request: UpdateControlPlane,
    ) -> Result<String> {
        self.api
            .patch(&format!("{COLLECTION}/{id}"), &to_body(&request)?)?;
        Ok(id.to_string())
    }

    fn delete(&self, _ctx: &ExecutionContext<'_>, id: &str) -> Result<()> {
        self.api.delete(&format!("{COLLECTION}/{id}"), &[])?;
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
    use declarative::labels::PROTECTED_KEY;
    use declarative::{ActionType, BaseExecutor, ChangeHandler, Protection};
    use serde_json::json;

    fn handler(api: &MemoryApi) -> BaseExecutor<ControlPlaneAdapter> {
        BaseExecutor::new(ControlPlaneAdapter::new(Arc::new(api.clone())))
    }

    #[test]
    fn test_create_protected_control_plane() {
        let api = MemoryApi::new();
        let change = change("control_plane", "prod-cp", ActionType::Create)
            .with_field("name", "prod")
            .with_field("cluster_type", "CLUSTER_TYPE_CONTROL_PLANE")
            .with_field("proxy_urls", json!([{"host": "gw.example.com", "port": 443, "protocol": "https"}]))
            .with_protection(Protection::Flag(true));

        let id = handler(&api).create(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(stored["cluster_type"], "CLUSTER_TYPE_CONTROL_PLANE");
        assert_eq!(stored["proxy_urls"][0]["host"], "gw.example.com");
        assert_eq!(stored["labels"][PROTECTED_KEY], "true");
    }

    #[test]
    fn test_update_protected_control_plane_is_blocked() {
        let api = MemoryApi::new();
        let id = api.seed(
            COLLECTION,
            json!({"name": "prod", "labels": {"KONGCTL-managed": "true", "KONGCTL-protected": "true"}}),
        );
        let change = change("control_plane", "prod-cp", ActionType::Update)
            .with_resource_id(&id)
            .with_field("name", "prod")
            .with_field("description", "changed");

        assert!(handler(&api).update(&ctx(&change)).is_err());
        assert_eq!(api.mutation_count(), 0);
    }

    #[test]
    fn test_lookup_by_name() {
        let api = MemoryApi::new();
        let id = api.seed(COLLECTION, json!({"name": "prod"}));
        let change = change("api_implementation", "impl", ActionType::Create);

        let found = handler(&api).get_by_name(&ctx(&change), "prod").unwrap().unwrap();
        assert_eq!(found.id, id);
    }
}
