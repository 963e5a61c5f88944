//! Runtime reference resolution
//!
//! A change may point at other resources through `references`, its
//! `parent`, or `__REF__:` placeholders inside its fields. Each identifier
//! is resolved in this order:
//!
//! 1. an ID the planner already knew, or one recorded in the
//!    [`RefTable`] when an earlier change of this run created it;
//! 2. the change's parent pointer;
//! 3. a reference that is itself a literal UUID;
//! 4. a name lookup through the registered handler of the target type.
//!
//! Results land in the [`ExecutionContext`]; the plan is not modified.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::fields::{is_valid_uuid, parse_ref_placeholder};
use crate::plan::{ParentInfo, ReferenceInfo, is_concrete_id};
use crate::resource::HandlerRegistry;
use serde_json::Value;
use std::collections::HashMap;

/// Reference keys whose target type is not the key minus `_id`.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("default_application_auth_strategy_id", "application_auth_strategy"),
    ("auth_strategy_id", "application_auth_strategy"),
    ("auth_strategy_ids", "application_auth_strategy"),
    ("service", "gateway_service"),
    ("service_id", "gateway_service"),
];

/// Resolved identifiers accumulated during one run: type -> ref -> ID.
#[derive(Debug, Clone, Default)]
pub struct RefTable {
    entries: HashMap<String, HashMap<String, String>>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ID for a reference.
    pub fn insert(&mut self, resource_type: &str, reference: &str, id: impl Into<String>) {
        self.entries
            .entry(resource_type.to_string())
            .or_default()
            .insert(reference.to_string(), id.into());
    }

    /// ID recorded for a typed reference.
    pub fn get(&self, resource_type: &str, reference: &str) -> Option<&str> {
        self.entries
            .get(resource_type)?
            .get(reference)
            .map(String::as_str)
    }

    /// ID recorded for a reference under any type.
    ///
    /// Returns `None` when the reference is ambiguous across types.
    pub fn find(&self, reference: &str) -> Option<&str> {
        let mut matches = self
            .entries
            .values()
            .filter_map(|refs| refs.get(reference).map(String::as_str));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }
}

/// Resource type a reference key points at.
pub fn reference_type(key: &str) -> String {
    if let Some((_, target)) = KEY_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return (*target).to_string();
    }
    key.strip_suffix("_ids")
        .or_else(|| key.strip_suffix("_id"))
        .unwrap_or(key)
        .to_string()
}

/// Parent resource type of a child resource type.
pub fn parent_type(resource_type: &str) -> Option<&'static str> {
    if resource_type.starts_with("api_") {
        Some("api")
    } else if resource_type.starts_with("portal_") {
        Some("portal")
    } else if resource_type == "gateway_service" {
        Some("control_plane")
    } else {
        None
    }
}

/// Resolves the references of one change against the run's table
pub struct ReferenceResolver<'r> {
    registry: &'r HandlerRegistry,
    table: &'r mut RefTable,
}

impl<'r> ReferenceResolver<'r> {
    pub fn new(registry: &'r HandlerRegistry, table: &'r mut RefTable) -> Self {
        Self { registry, table }
    }

    /// Resolve everything the change refers to into `ctx`.
    pub fn resolve(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let change = ctx.change;

        let parent_id = match &change.parent {
            Some(parent) => self.resolve_parent(ctx, &change.resource_type, parent)?,
            None => None,
        };

        let mut singles = Vec::new();
        let mut arrays = Vec::new();
        for (key, info) in &change.references {
            if info.is_array {
                arrays.push((key, self.resolve_array(ctx, key, info, parent_id.as_deref())?));
            } else if let Some(id) = self.resolve_single(ctx, key, info, parent_id.as_deref())? {
                singles.push((key, id));
            }
        }

        if let Some(id) = parent_id {
            ctx.set_parent_id(id);
        }
        for (key, id) in singles {
            ctx.set_reference_id(key.clone(), id);
        }
        for (key, ids) in arrays {
            ctx.set_reference_ids(key.clone(), ids);
        }

        self.substitute_placeholders(ctx)
    }

    fn resolve_single(
        &mut self,
        ctx: &ExecutionContext<'_>,
        key: &str,
        info: &ReferenceInfo,
        parent_id: Option<&str>,
    ) -> Result<Option<String>> {
        let resource_type = reference_type(key);
        if let Some(id) = info.concrete_id() {
            return Ok(Some(id.to_string()));
        }
        if info.reference.is_empty() {
            return Ok(None);
        }

        let name = info
            .lookup_fields
            .get("name")
            .map_or(info.reference.as_str(), String::as_str);
        let parent = ctx
            .change
            .parent
            .as_ref()
            .filter(|p| p.reference == info.reference)
            .and(parent_id);
        self.resolve_id(ctx, &resource_type, &info.reference, name, parent)
            .map(Some)
    }

    fn resolve_array(
        &mut self,
        ctx: &ExecutionContext<'_>,
        key: &str,
        info: &ReferenceInfo,
        parent_id: Option<&str>,
    ) -> Result<Vec<String>> {
        let resource_type = reference_type(key);
        let names = info.lookup_arrays.get("names");
        let mut ids = Vec::with_capacity(info.refs.len());

        for (i, reference) in info.refs.iter().enumerate() {
            if let Some(id) = info.resolved_ids.get(i).filter(|id| is_concrete_id(id)) {
                ids.push(id.clone());
                continue;
            }
            let name = names
                .and_then(|n| n.get(i))
                .map_or(reference.as_str(), String::as_str);
            let parent = ctx
                .change
                .parent
                .as_ref()
                .filter(|p| &p.reference == reference)
                .and(parent_id);
            ids.push(self.resolve_id(ctx, &resource_type, reference, name, parent)?);
        }
        Ok(ids)
    }

    fn resolve_parent(
        &mut self,
        ctx: &ExecutionContext<'_>,
        resource_type: &str,
        parent: &ParentInfo,
    ) -> Result<Option<String>> {
        if is_concrete_id(&parent.id) {
            return Ok(Some(parent.id.clone()));
        }
        let Some(parent_type) = parent_type(resource_type) else {
            return match self.table.find(&parent.reference) {
                Some(id) => Ok(Some(id.to_string())),
                None if is_valid_uuid(&parent.reference) => Ok(Some(parent.reference.clone())),
                None => Err(Error::reference(
                    "parent",
                    &parent.reference,
                    format!("parent type of {resource_type} is unknown"),
                )),
            };
        };
        self.resolve_id(ctx, parent_type, &parent.reference, &parent.reference, None)
            .map(Some)
    }

    /// Steps 1, 2 (via `parent_id`), 3 and 4 for one reference.
    fn resolve_id(
        &mut self,
        ctx: &ExecutionContext<'_>,
        resource_type: &str,
        reference: &str,
        lookup_name: &str,
        parent_id: Option<&str>,
    ) -> Result<String> {
        if let Some(id) = self.table.get(resource_type, reference) {
            return Ok(id.to_string());
        }
        if let Some(id) = parent_id {
            return Ok(id.to_string());
        }
        if is_valid_uuid(reference) {
            return Ok(reference.to_string());
        }

        let handler = self.registry.get(resource_type).ok_or_else(|| {
            Error::reference(
                resource_type,
                reference,
                "not created earlier in this plan and no lookup is available",
            )
        })?;

        log::debug!("Looking up {resource_type} '{lookup_name}' for reference '{reference}'");
        let found = handler
            .get_by_name(ctx, lookup_name)
            .map_err(|e| Error::reference(resource_type, reference, e.to_string()))?;
        let Some(info) = found else {
            return Err(Error::reference(
                resource_type,
                reference,
                format!("no {resource_type} named '{lookup_name}' exists"),
            ));
        };

        self.table.insert(resource_type, reference, info.id.clone());
        Ok(info.id)
    }

    /// Replace `__REF__:<ref>#id` strings in the working fields.
    fn substitute_placeholders(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let change = ctx.change;
        let known: HashMap<&str, String> = change
            .references
            .iter()
            .filter_map(|(key, info)| {
                ctx.reference_id(key)
                    .map(|id| (info.reference.as_str(), id.to_string()))
            })
            .collect();

        for value in ctx.fields_mut().values_mut() {
            substitute_value(value, &|reference| {
                known
                    .get(reference)
                    .cloned()
                    .or_else(|| self.table.find(reference).map(ToString::to_string))
            })?;
        }
        Ok(())
    }
}

fn substitute_value(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
    match value {
        Value::String(s) => {
            let Some((reference, field)) = parse_ref_placeholder(s) else {
                return Ok(());
            };
            if field != "id" {
                return Err(Error::reference(
                    "",
                    reference,
                    format!("unsupported placeholder field '{field}'"),
                ));
            }
            let id = lookup(reference).ok_or_else(|| {
                Error::reference("", reference, "placeholder was not resolved before use")
            })?;
            *s = id;
        }
        Value::Array(items) => {
            for item in items {
                substitute_value(item, lookup)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                substitute_value(item, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}
