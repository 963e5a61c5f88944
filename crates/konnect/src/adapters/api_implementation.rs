//! API implementations (`/v3/apis/{api}/implementations`)
//!
//! An implementation binds an API to a gateway service. The service ID is
//! often only known once a decK step earlier in the plan created it.

use super::{api, api_id, find_by_path, response_id, to_body};
use crate::client::KonnectApi;
use crate::types::{CreateApiImplementation, ServiceReference};
use anyhow::{Result, anyhow, bail};
use declarative::fields::{is_ref_placeholder, is_valid_uuid};
use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use serde_json::Value;
use std::sync::Arc;

pub struct ApiImplementationAdapter {
    api: Arc<dyn KonnectApi>,
}

impl ApiImplementationAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }

    fn collection(ctx: &ExecutionContext<'_>) -> Result<String> {
        Ok(format!("{}/{}/implementations", api::COLLECTION, api_id(ctx)?))
    }
}

fn service_id_field(service: &serde_json::Map<String, Value>, key: &str) -> Result<String> {
    let value = service
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        bail!("service.{key} is required");
    }
    if is_ref_placeholder(value) || !is_valid_uuid(value) {
        bail!("service.{key} '{value}' was not resolved to an ID");
    }
    Ok(value.to_string())
}

impl ResourceOperations for ApiImplementationAdapter {
    type CreateRequest = CreateApiImplementation;
    type UpdateRequest = ();

    fn resource_type(&self) -> &'static str {
        "api_implementation"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["service"]
    }

    fn supports_update(&self) -> bool {
        false
    }

    fn supports_labels(&self) -> bool {
        false
    }

    fn map_create_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
    ) -> Result<CreateApiImplementation> {
        let Some(service) = fields.get("service").and_then(Value::as_object) else {
            bail!("service must be an object with id and control_plane_id");
        };

        let id = match ctx.reference_id("service_id") {
            Some(id) => id.to_string(),
            None => service_id_field(service, "id")?,
        };
        let control_plane_id = match ctx.reference_id("control_plane_id") {
            Some(id) => id.to_string(),
            None => service_id_field(service, "control_plane_id")?,
        };

        Ok(CreateApiImplementation {
            service: ServiceReference {
                id,
                control_plane_id,
            },
        })
    }

    fn map_update_fields(
        &self,
        _ctx: &ExecutionContext<'_>,
        _fields: &Fields,
        _current_labels: &Labels,
    ) -> Result<()> {
        Err(anyhow!("api_implementation does not support updates"))
    }

    fn create(&self, ctx: &ExecutionContext<'_>, request: CreateApiImplementation) -> Result<String> {
        let response = self
            .api
            .post(&Self::collection(ctx)?, &to_body(&request)?)?;
        response_id(&response, "api_implementation")
    }

    fn update(&self, _ctx: &ExecutionContext<'_>, _id: &str, _request: ()) -> Result<String> {
        Err(anyhow!("api_implementation does not support updates"))
    }

    fn delete(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<()> {
        self.api
            .delete(&format!("{}/{id}", Self::collection(ctx)?), &[])?;
        Ok(())
    }

    fn get_by_name(&self, _ctx: &ExecutionContext<'_>, _name: &str) -> Result<Option<ResourceInfo>> {
        Ok(None)
    }

    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>> {
        find_by_path(self.api.as_ref(), &format!("{}/{id}", Self::collection(ctx)?))
    }
}
