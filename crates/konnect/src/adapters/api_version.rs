//! API versions (`/v3/apis/{api}/versions`)
//!
//! Versions are created and deleted, never updated in place, and carry no
//! labels.

use super::{api, api_id, find_by_field, find_by_path, response_id, to_body};
use crate::client::KonnectApi;
use crate::types::{ApiSpec, CreateApiVersion};
use anyhow::{Context, Result, anyhow};
use declarative::fields::opt_string;
use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use serde_json::Value;
use std::sync::Arc;

/// Konnect's rejection when an API already has a version.
const SINGLE_VERSION_MARKER: &str = "At most one api specification";

pub struct ApiVersionAdapter {
    api: Arc<dyn KonnectApi>,
}

impl ApiVersionAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }

    fn collection(ctx: &ExecutionContext<'_>) -> Result<String> {
        Ok(format!("{}/{}/versions", api::COLLECTION, api_id(ctx)?))
    }
}

/// Spec content, given either inline or as `{content: ...}`.
fn spec(fields: &Fields) -> Option<ApiSpec> {
    let content = match fields.get("spec")? {
        Value::String(content) => content.clone(),
        Value::Object(spec) => spec.get("content")?.as_str()?.to_string(),
        _ => return None,
    };
    Some(ApiSpec { content })
}

impl ResourceOperations for ApiVersionAdapter {
    type CreateRequest = CreateApiVersion;
    type UpdateRequest = ();

    fn resource_type(&self) -> &'static str {
        "api_version"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn supports_update(&self) -> bool {
        false
    }

    fn supports_labels(&self) -> bool {
        false
    }

    fn map_create_fields(
        &self,
        _ctx: &ExecutionContext<'_>,
        fields: &Fields,
    ) -> Result<CreateApiVersion> {
        Ok(CreateApiVersion {
            version: opt_string(fields, "version"),
            spec: spec(fields),
        })
    }

    fn map_update_fields(
        &self,
        _ctx: &ExecutionContext<'_>,
        _fields: &Fields,
        _current_labels: &Labels,
    ) -> Result<()> {
        Err(anyhow!("api_version does not support updates"))
    }

    fn create(&self, ctx: &ExecutionContext<'_>, request: CreateApiVersion) -> Result<String> {
        let response = match self.api.post(&Self::collection(ctx)?, &to_body(&request)?) {
            Ok(response) => response,
            Err(err) if err.to_string().contains(SINGLE_VERSION_MARKER) => {
                return Err(anyhow!(err).context(
                    "Konnect allows only one version per API; update the existing version or create a separate API",
                ));
            }
            Err(err) => return Err(err.into()),
        };
        response_id(&response, "api_version")
    }

    fn update(&self, _ctx: &ExecutionContext<'_>, _id: &str, _request: ()) -> Result<String> {
        Err(anyhow!("api_version does not support updates"))
    }

    fn delete(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<()> {
        let path = format!("{}/{id}", Self::collection(ctx)?);
        self.api
            .delete(&path, &[])
            .with_context(|| format!("Failed to delete API version {id}"))
    }

    fn get_by_name(&self, ctx: &ExecutionContext<'_>, name: &str) -> Result<Option<ResourceInfo>> {
        find_by_field(self.api.as_ref(), &Self::collection(ctx)?, "version", name)
    }

    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>> {
        find_by_path(self.api.as_ref(), &format!("{}/{id}", Self::collection(ctx)?))
    }
}
