//! APIs in the catalog (`/v3/apis`)

use super::{create_labels, find_by_name, find_by_path, response_id, to_body, update_labels};
use crate::client::KonnectApi;
use crate::types::{CreateApi, UpdateApi};
use anyhow::Result;
use declarative::fields::{opt_string, string_field};
use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use serde_json::Value;
use std::sync::Arc;

pub(crate) const COLLECTION: &str = "/v3/apis";

pub struct ApiAdapter {
    api: Arc<dyn KonnectApi>,
}

impl ApiAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }
}

fn attributes(fields: &Fields) -> Option<Value> {
    fields.get("attributes").filter(|v| v.is_object()).cloned()
}

impl ResourceOperations for ApiAdapter {
    type CreateRequest = CreateApi;
    type UpdateRequest = UpdateApi;

    fn resource_type(&self) -> &'static str {
        "api"
    }

    fn map_create_fields(&self, ctx: &ExecutionContext<'_>, fields: &Fields) -> Result<CreateApi> {
        Ok(CreateApi {
            name: string_field(fields, "name").to_string(),
            description: opt_string(fields, "description"),
            version: opt_string(fields, "version"),
            slug: opt_string(fields, "slug"),
            attributes: attributes(fields),
            labels: create_labels(ctx, fields)?,
        })
    }

    fn map_update_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
        current_labels: &Labels,
    ) -> Result<UpdateApi> {
        Ok(UpdateApi {
            name: opt_string(fields, "name"),
            description: opt_string(fields, "description"),
            version: opt_string(fields, "version"),
            slug: opt_string(fields, "slug"),
            attributes: attributes(fields),
            labels: update_labels(ctx, fields, current_labels)?,
        })
    }

    fn create(&self, _ctx: &ExecutionContext<'_>, request: CreateApi) -> Result<String> {
        let response = self.api.post(COLLECTION, &to_body(&request)?)?;
        response_id(&response, "api")
    }

    fn update(&self, _ctx: &ExecutionContext<'_>, id: &str, request: UpdateApi) -> Result<String> {
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
