//! Gateway services (`/v2/control-planes/{cp}/core-entities/services`)
//!
//! Services are owned by decK; kongctl only looks them up, either by name
//! for references or in bulk after a decK step ran.

use super::{find_by_path, page_items, resource_info};
use crate::client::KonnectApi;
use anyhow::{Result, anyhow, bail};
use declarative::fields::is_valid_uuid;
use declarative::{
    Error as ExecError, ExecutionContext, Fields, GatewayServiceLookup, Labels, ResourceInfo,
    ResourceOperations,
};
use serde_json::Value;
use std::sync::Arc;

const PAGE_SIZE: &str = "1000";

pub struct GatewayServiceAdapter {
    api: Arc<dyn KonnectApi>,
}

impl GatewayServiceAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }

    fn collection(control_plane_id: &str) -> String {
        format!("/v2/control-planes/{control_plane_id}/core-entities/services")
    }

    /// All services of a control plane, following `offset` pagination.
    pub fn list(&self, control_plane_id: &str) -> Result<Vec<ResourceInfo>> {
        let path = Self::collection(control_plane_id);
        let mut services = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query = vec![("size", PAGE_SIZE)];
            if let Some(offset) = offset.as_deref() {
                query.push(("offset", offset));
            }
            let Some(page) = self.api.get(&path, &query)? else {
                break;
            };
            services.extend(page_items(&page)?.iter().map(|s| resource_info(s, "name")));

            match page.get("offset").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => offset = Some(next.to_string()),
                _ => break,
            }
        }

        log::debug!(
            "Found {} gateway services in control plane {control_plane_id}",
            services.len()
        );
        Ok(services)
    }
}

/// Control plane a lookup is scoped to, taken from the consuming change.
fn control_plane_id(ctx: &ExecutionContext<'_>) -> Result<String> {
    if let Some(id) = ctx.reference_id("control_plane_id") {
        return Ok(id.to_string());
    }
    let fields = ctx.fields();
    let candidate = fields
        .get("service")
        .and_then(|s| s.get("control_plane_id"))
        .or_else(|| fields.get("control_plane_id"))
        .and_then(Value::as_str)
        .filter(|id| is_valid_uuid(id));
    candidate.map(ToString::to_string).ok_or_else(|| {
        anyhow!(ExecError::reference(
            "control_plane",
            "control_plane_id",
            "control plane ID is required to look up gateway services"
        ))
    })
}

impl GatewayServiceLookup for GatewayServiceAdapter {
    fn list_gateway_services(&self, control_plane_id: &str) -> Result<Vec<ResourceInfo>> {
        self.list(control_plane_id)
    }
}

impl ResourceOperations for GatewayServiceAdapter {
    type CreateRequest = ();
    type UpdateRequest = ();

    fn resource_type(&self) -> &'static str {
        "gateway_service"
    }

    fn supports_update(&self) -> bool {
        false
    }

    fn map_create_fields(&self, _ctx: &ExecutionContext<'_>, _fields: &Fields) -> Result<()> {
        bail!("gateway services are managed by decK steps")
    }

    fn map_update_fields(
        &self,
        _ctx: &ExecutionContext<'_>,
        _fields: &Fields,
        _current_labels: &Labels,
    ) -> Result<()> {
        bail!("gateway services are managed by decK steps")
    }

    fn create(&self, _ctx: &ExecutionContext<'_>, _request: ()) -> Result<String> {
        bail!("gateway services are managed by decK steps")
    }

    fn update(&self, _ctx: &ExecutionContext<'_>, _id: &str, _request: ()) -> Result<String> {
        bail!("gateway services are managed by decK steps")
    }

    fn delete(&self, _ctx: &ExecutionContext<'_>, _id: &str) -> Result<()> {
        bail!("gateway services are managed by decK steps")
    }

    fn get_by_name(&self, ctx: &ExecutionContext<'_>, name: &str) -> Result<Option<ResourceInfo>> {
        let control_plane_id = control_plane_id(ctx)?;
        let mut matches = self
            .list(&control_plane_id)?
            .into_iter()
            .filter(|s| s.name == name);
        let found = matches.next();
        if matches.next().is_some() {
            bail!("multiple gateway services named '{name}' in control plane {control_plane_id}");
        }
        Ok(found)
    }

    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>> {
        let control_plane_id = control_plane_id(ctx)?;
        find_by_path(
            self.api.as_ref(),
            &format!("{}/{id}", Self::collection(&control_plane_id)),
        )
    }
}
