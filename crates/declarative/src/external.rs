//! External tool step
//!
//! An `EXTERNAL_TOOL` change runs decK against a control plane in the
//! middle of a plan. Gateway services created by decK get IDs nobody knew
//! at plan time, so afterwards the step looks them up by name and patches
//! the `service` field of later `api_implementation` changes. That patch
//! is the only place the engine writes into a plan.

use crate::context::{CancelToken, ExecutionContext};
use crate::deck::{DeckError, DeckRunner, RunOptions, contains_flag};
use crate::error::{Error, Result};
use crate::fields::{is_valid_uuid, parse_ref_placeholder, string_field, string_slice};
use crate::plan::{ActionType, Change, Fields, Plan, PlanMode};
use crate::resolver::RefTable;
use crate::resource::HandlerRegistry;
use crate::types::ResourceInfo;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Resource type of decK steps in a plan.
pub const DECK_RESOURCE_TYPE: &str = "_deck";

const GATEWAY_SERVICE: &str = "gateway_service";
const API_IMPLEMENTATION: &str = "api_implementation";
const CONTROL_PLANE: &str = "control_plane";

/// Lists gateway services of a control plane
pub trait GatewayServiceLookup: Send + Sync {
    fn list_gateway_services(&self, control_plane_id: &str) -> anyhow::Result<Vec<ResourceInfo>>;
}

/// Everything the engine needs to run decK steps
pub struct ExternalToolConfig {
    pub runner: Box<dyn DeckRunner>,
    pub gateway_services: Option<Box<dyn GatewayServiceLookup>>,
    pub konnect_token: String,
    pub konnect_address: String,
    /// Overrides the plan's mode when set.
    pub mode: Option<PlanMode>,
    /// Directory relative `deck_base_dir` values resolve against.
    pub plan_base_dir: Option<PathBuf>,
}

impl ExternalToolConfig {
    pub fn new(runner: Box<dyn DeckRunner>) -> Self {
        Self {
            runner,
            gateway_services: None,
            konnect_token: String::new(),
            konnect_address: String::new(),
            mode: None,
            plan_base_dir: None,
        }
    }

    pub fn with_gateway_services(mut self, lookup: Box<dyn GatewayServiceLookup>) -> Self {
        self.gateway_services = Some(lookup);
        self
    }

    pub fn with_konnect(mut self, token: impl Into<String>, address: impl Into<String>) -> Self {
        self.konnect_token = token.into();
        self.konnect_address = address.into();
        self
    }

    pub fn with_mode(mut self, mode: PlanMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_plan_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plan_base_dir = Some(dir.into());
        self
    }
}

/// Gateway service decK is expected to create.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceTarget {
    reference: String,
    selector_name: String,
}

/// One decK step execution
pub(crate) struct DeckStep<'e> {
    pub config: &'e ExternalToolConfig,
    pub registry: &'e HandlerRegistry,
    pub table: &'e mut RefTable,
    pub dry_run: bool,
    pub cancel: &'e CancelToken,
}

impl DeckStep<'_> {
    /// Run the step for `plan.changes[index]`.
    pub fn execute(&mut self, plan: &mut Plan, index: usize) -> Result<()> {
        let change = plan.changes[index].clone();
        let ctx = ExecutionContext::new(&change, self.dry_run, self.cancel.clone());

        let fields = &change.fields;
        let mut cp_ref = string_field(fields, "control_plane_ref");
        if cp_ref.is_empty() {
            cp_ref = &change.resource_ref;
        }

        let cp_id = self.resolve_control_plane_id(&ctx, string_field(fields, "control_plane_id"), cp_ref)?;
        let cp_name = match string_field(fields, "control_plane_name") {
            "" => self.resolve_control_plane_name(&ctx, plan, &cp_id, cp_ref)?,
            name => name.to_string(),
        };

        let mode = self.config.mode.unwrap_or(plan.metadata.mode);
        let files = parse_files(fields.get("files")).map_err(|e| step_error(cp_ref, &e))?;
        let flags = parse_flags(fields.get("flags")).map_err(|e| step_error(cp_ref, &e))?;
        let flags = ensure_output_flags(flags);
        let work_dir = self.resolve_work_dir(fields)?;

        let mut args = vec!["gateway".to_string(), mode.to_string()];
        args.extend(flags);
        args.extend(files);
        let opts = RunOptions {
            args,
            mode: mode.to_string(),
            konnect_token: self.config.konnect_token.clone(),
            konnect_control_plane_name: cp_name,
            konnect_address: self.config.konnect_address.clone(),
            work_dir,
        };

        let targets = service_targets(&change).map_err(|e| step_error(cp_ref, &e))?;

        if self.dry_run {
            crate::deck::build_args(&opts).map_err(|e| step_error(cp_ref, &e.to_string()))?;
            for target in &targets {
                self.table
                    .insert(GATEWAY_SERVICE, &target.reference, "dry-run-gateway_service-id");
            }
            return Ok(());
        }

        self.cancel.check()?;
        log::debug!(
            "Running deck gateway {mode} for control plane {cp_ref} ({} args)",
            opts.args.len()
        );
        match self.config.runner.run(&opts) {
            Ok(output) => log_output(cp_ref, &output.stdout, &output.stderr),
            Err(err) => {
                let suffix = match &err {
                    DeckError::Failed { output, .. } => {
                        log_output(cp_ref, &output.stdout, &output.stderr);
                        let stderr = output.stderr.trim();
                        if stderr.is_empty() {
                            String::new()
                        } else {
                            format!(": {stderr}")
                        }
                    }
                    _ => String::new(),
                };
                return Err(Error::ExternalTool(format!(
                    "deck gateway for control_plane {cp_ref} failed: {err}{suffix}"
                )));
            }
        }

        let later = later_change_ids(plan, &change.id);
        for target in targets {
            if !plan_needs_service(plan, &later, &target.reference) {
                log::debug!(
                    "Skipping gateway service {}; no later change depends on it",
                    target.reference
                );
                continue;
            }
            if target.selector_name.is_empty() {
                return Err(step_error(
                    cp_ref,
                    &format!(
                        "selector.matchFields.name is required for gateway_service {}",
                        target.reference
                    ),
                ));
            }

            let service_id = self.resolve_service_by_name(&cp_id, &target.selector_name)?;
            self.table
                .insert(GATEWAY_SERVICE, &target.reference, service_id.clone());
            let patched =
                patch_service_references(plan, &later, &target.reference, &service_id, &cp_id);
            log::debug!(
                "Resolved gateway service {} to {service_id}; patched {patched} changes",
                target.reference
            );
        }

        Ok(())
    }

    fn resolve_control_plane_id(
        &mut self,
        ctx: &ExecutionContext<'_>,
        cp_id: &str,
        cp_ref: &str,
    ) -> Result<String> {
        if !cp_id.is_empty() {
            return Ok(cp_id.to_string());
        }
        if cp_ref.is_empty() {
            return Err(Error::validation(
                "deck step requires control_plane_ref or control_plane_id",
            ));
        }
        if is_valid_uuid(cp_ref) {
            return Ok(cp_ref.to_string());
        }
        if let Some(id) = self.table.get(CONTROL_PLANE, cp_ref) {
            return Ok(id.to_string());
        }

        let handler = self.registry.get(CONTROL_PLANE).ok_or_else(|| {
            Error::reference(CONTROL_PLANE, cp_ref, "no lookup is available")
        })?;
        let info = handler
            .get_by_name(ctx, cp_ref)?
            .ok_or_else(|| Error::reference(CONTROL_PLANE, cp_ref, "control plane not found"))?;
        self.table.insert(CONTROL_PLANE, cp_ref, info.id.clone());
        Ok(info.id)
    }

    fn resolve_control_plane_name(
        &self,
        ctx: &ExecutionContext<'_>,
        plan: &Plan,
        cp_id: &str,
        cp_ref: &str,
    ) -> Result<String> {
        let from_plan = plan.changes.iter().find_map(|c| {
            (c.resource_type == CONTROL_PLANE && c.resource_ref == cp_ref)
                .then(|| string_field(&c.fields, "name"))
                .filter(|name| !name.is_empty())
        });
        if let Some(name) = from_plan {
            return Ok(name.to_string());
        }

        let handler = self.registry.get(CONTROL_PLANE).ok_or_else(|| {
            Error::reference(CONTROL_PLANE, cp_ref, "cannot resolve control plane name")
        })?;
        match handler.get_by_id(ctx, cp_id)? {
            Some(info) if !info.name.trim().is_empty() => Ok(info.name),
            _ => Err(Error::reference(
                CONTROL_PLANE,
                cp_ref,
                format!("control plane {cp_id} not found for deck execution"),
            )),
        }
    }

    fn resolve_work_dir(&self, fields: &Fields) -> Result<Option<PathBuf>> {
        let raw = string_field(fields, "deck_base_dir");
        if raw.is_empty() {
            return Ok(None);
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            return Ok(Some(clean_path(path)));
        }
        let base = match &self.config.plan_base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| {
                Error::validation(format!("resolve deck base dir {raw:?}: {e}"))
            })?,
        };
        Ok(Some(clean_path(&base.join(path))))
    }

    fn resolve_service_by_name(&self, cp_id: &str, name: &str) -> Result<String> {
        let lookup = self.config.gateway_services.as_ref().ok_or_else(|| {
            Error::ExternalTool("gateway service lookup is not configured".to_string())
        })?;
        self.cancel.check()?;
        let services = lookup
            .list_gateway_services(cp_id)
            .map_err(|e| Error::ExternalTool(format!("failed to list gateway services: {e:#}")))?;

        let mut matches = services.into_iter().filter(|s| s.name == name);
        let first = matches.next().ok_or_else(|| {
            Error::reference(
                GATEWAY_SERVICE,
                name,
                format!("gateway_service not found with name {name:?} in control plane {cp_id}"),
            )
        })?;
        if matches.next().is_some() {
            return Err(Error::reference(
                GATEWAY_SERVICE,
                name,
                format!("gateway_service selector matched multiple services for name {name:?}"),
            ));
        }
        Ok(first.id)
    }
}

fn step_error(cp_ref: &str, message: &str) -> Error {
    Error::validation(format!("deck step {cp_ref}: {message}"))
}

fn log_output(cp_ref: &str, stdout: &str, stderr: &str) {
    if !stdout.trim().is_empty() {
        log::debug!("deck [{cp_ref}] stdout: {}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        log::debug!("deck [{cp_ref}] stderr: {}", stderr.trim());
    }
}

/// Validate the `files` field.
fn parse_files(raw: Option<&Value>) -> std::result::Result<Vec<String>, String> {
    let raw = raw.filter(|v| !v.is_null()).ok_or("files are required")?;
    let files = string_slice(raw).ok_or("files must be an array of strings")?;
    let mut cleaned = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let value = file.trim();
        if value.is_empty() {
            return Err(format!("files[{i}] cannot be empty"));
        }
        if value.starts_with('-') {
            return Err(format!("files[{i}] must be a file path, not a flag"));
        }
        cleaned.push(value.to_string());
    }
    if cleaned.is_empty() {
        return Err("files are required".to_string());
    }
    Ok(cleaned)
}

/// Validate the optional `flags` field.
fn parse_flags(raw: Option<&Value>) -> std::result::Result<Vec<String>, String> {
    let Some(raw) = raw.filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let flags = string_slice(raw).ok_or("flags must be an array of strings")?;
    let mut cleaned = Vec::with_capacity(flags.len());
    for (i, flag) in flags.iter().enumerate() {
        let value = flag.trim();
        if value.is_empty() {
            return Err(format!("flags[{i}] cannot be empty"));
        }
        if !value.starts_with('-') {
            return Err(format!("flags[{i}] must be a flag"));
        }
        cleaned.push(value.to_string());
    }
    Ok(cleaned)
}

/// Machine-readable, uncolored output is required for log capture.
fn ensure_output_flags(mut flags: Vec<String>) -> Vec<String> {
    for flag in ["--json-output", "--no-color"] {
        if !contains_flag(&flags, flag) {
            flags.push(flag.to_string());
        }
    }
    flags
}

/// Gateway services the step declares, from post-resolution targets or
/// the older `gateway_services` field.
fn service_targets(change: &Change) -> std::result::Result<Vec<ServiceTarget>, String> {
    if !change.post_resolution_targets.is_empty() {
        return Ok(change
            .post_resolution_targets
            .iter()
            .filter(|t| !t.resource_ref.trim().is_empty())
            .filter(|t| t.resource_type.is_empty() || t.resource_type == GATEWAY_SERVICE)
            .map(|t| ServiceTarget {
                reference: t.resource_ref.clone(),
                selector_name: t
                    .selector
                    .as_ref()
                    .and_then(|s| s.match_fields.get("name"))
                    .map_or(String::new(), |n| n.trim().to_string()),
            })
            .collect());
    }

    let Some(raw) = change.fields.get("gateway_services").filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let entries = raw
        .as_array()
        .ok_or("gateway_services must be an array of objects")?;
    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| {
            let selector_name = match string_field(entry, "selector_name") {
                "" => entry
                    .get("selector")
                    .and_then(|s| s.get("matchFields"))
                    .and_then(|m| m.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                name => name.to_string(),
            };
            ServiceTarget {
                reference: string_field(entry, "ref").to_string(),
                selector_name,
            }
        })
        .filter(|t| !t.reference.is_empty())
        .collect())
}

/// IDs of changes that run after `change_id`.
fn later_change_ids(plan: &Plan, change_id: &str) -> HashSet<String> {
    plan.execution_order
        .iter()
        .skip_while(|id| *id != change_id)
        .skip(1)
        .cloned()
        .collect()
}

fn is_service_consumer(change: &Change, later: &HashSet<String>) -> bool {
    change.resource_type == API_IMPLEMENTATION
        && matches!(change.action, ActionType::Create | ActionType::Update)
        && later.contains(&change.id)
}

/// Whether a later change refers to the gateway service.
fn plan_needs_service(plan: &Plan, later: &HashSet<String>, reference: &str) -> bool {
    plan.changes.iter().any(|c| {
        is_service_consumer(c, later)
            && c.fields
                .get("service")
                .and_then(|s| s.get("id"))
                .and_then(Value::as_str)
                .is_some_and(|id| matches_service_ref(id, reference))
    })
}

fn matches_service_ref(id: &str, reference: &str) -> bool {
    match parse_ref_placeholder(id) {
        Some((r, field)) => field == "id" && r == reference,
        None => id == reference,
    }
}

/// Write the resolved service ID into later `api_implementation` changes.
fn patch_service_references(
    plan: &mut Plan,
    later: &HashSet<String>,
    reference: &str,
    service_id: &str,
    control_plane_id: &str,
) -> usize {
    let mut patched = 0;
    for change in &mut plan.changes {
        if !is_service_consumer(change, later) {
            continue;
        }
        let Some(Value::Object(service)) = change.fields.get_mut("service") else {
            continue;
        };
        let matches = service
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|id| matches_service_ref(id, reference));
        if !matches {
            continue;
        }
        service.insert("id".to_string(), Value::String(service_id.to_string()));
        if !control_plane_id.trim().is_empty() {
            service.insert(
                "control_plane_id".to_string(),
                Value::String(control_plane_id.to_string()),
            );
        }
        patched += 1;
    }
    patched
}

/// Lexically normalize a path (no filesystem access).
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::RunOutput;
    use crate::plan::{PostResolutionTarget, Selector};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const CP_ID: &str = "8f2b6a3c-1d4e-4f5a-9b6c-7d8e9f0a1b2c";

    /// Runner that records invocations
    #[derive(Clone, Default)]
    struct RecordingRunner {
        runs: Arc<Mutex<Vec<RunOptions>>>,
        fail_with: Option<String>,
    }

    impl DeckRunner for RecordingRunner {
        fn run(&self, opts: &RunOptions) -> std::result::Result<RunOutput, DeckError> {
            crate::deck::build_args(opts)?;
            self.runs.lock().unwrap().push(opts.clone());
            match &self.fail_with {
                Some(stderr) => Err(DeckError::Failed {
                    status: Some(1),
                    output: RunOutput {
                        stdout: String::new(),
                        stderr: stderr.clone(),
                    },
                }),
                None => Ok(RunOutput::default()),
            }
        }
    }

    struct Services(Vec<(&'static str, &'static str)>);

    impl GatewayServiceLookup for Services {
        fn list_gateway_services(&self, _cp: &str) -> anyhow::Result<Vec<ResourceInfo>> {
            Ok(self
                .0
                .iter()
                .map(|(name, id)| ResourceInfo::new(*id, *name, Default::default()))
                .collect())
        }
    }

    fn deck_change() -> Change {
        let mut change = Change::new("1", ActionType::ExternalTool, DECK_RESOURCE_TYPE, "cp")
            .with_field("control_plane_id", CP_ID)
            .with_field("control_plane_name", "default")
            .with_field("files", json!(["kong.yaml"]))
            .with_field("deck_base_dir", "gateway");
        change.post_resolution_targets.push(PostResolutionTarget {
            resource_type: "gateway_service".to_string(),
            resource_ref: "svc".to_string(),
            selector: Some(Selector {
                match_fields: [("name".to_string(), "orders".to_string())].into(),
            }),
            ..Default::default()
        });
        change
    }

    fn implementation_change(id: &str, service_id: &str) -> Change {
        Change::new(id, ActionType::Create, "api_implementation", "impl")
            .with_field("service", json!({"id": service_id}))
    }

    fn plan_with(changes: Vec<Change>) -> Plan {
        Plan::sequential(PlanMode::Sync, changes)
    }

    fn config(runner: RecordingRunner, services: Vec<(&'static str, &'static str)>) -> ExternalToolConfig {
        ExternalToolConfig::new(Box::new(runner))
            .with_gateway_services(Box::new(Services(services)))
            .with_konnect("kpat_x", "https://us.api.konghq.com")
            .with_plan_base_dir("/plans")
    }

    fn run(config: &ExternalToolConfig, plan: &mut Plan, table: &mut RefTable, dry_run: bool) -> Result<()> {
        let registry = HandlerRegistry::new();
        let cancel = CancelToken::new();
        DeckStep {
            config,
            registry: &registry,
            table,
            dry_run,
            cancel: &cancel,
        }
        .execute(plan, 0)
    }

    #[test]
    fn test_deck_step_runs_and_patches_later_changes() {
        let runner = RecordingRunner::default();
        let config = config(runner.clone(), vec![("orders", "s-1"), ("billing", "s-2")]);
        let mut plan = plan_with(vec![
            deck_change(),
            implementation_change("2", "__REF__:svc#id"),
            implementation_change("3", "svc"),
        ]);
        let mut table = RefTable::new();

        run(&config, &mut plan, &mut table, false).unwrap();

        let runs = runner.runs.lock().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].args,
            vec!["gateway", "sync", "--json-output", "--no-color", "kong.yaml"]
        );
        assert_eq!(runs[0].work_dir, Some(PathBuf::from("/plans/gateway")));
        assert_eq!(runs[0].konnect_control_plane_name, "default");

        assert_eq!(table.get("gateway_service", "svc"), Some("s-1"));
        for change in &plan.changes[1..] {
            assert_eq!(change.fields["service"]["id"], json!("s-1"));
            assert_eq!(change.fields["service"]["control_plane_id"], json!(CP_ID));
        }
    }

    #[test]
    fn test_deck_step_does_not_patch_earlier_changes() {
        let config = config(RecordingRunner::default(), vec![("orders", "s-1")]);
        let mut plan = plan_with(vec![
            implementation_change("0", "__REF__:svc#id"),
            deck_change(),
            implementation_change("2", "__REF__:svc#id"),
        ]);
        let mut table = RefTable::new();
        let registry = HandlerRegistry::new();
        let cancel = CancelToken::new();

        DeckStep {
            config: &config,
            registry: &registry,
            table: &mut table,
            dry_run: false,
            cancel: &cancel,
        }
        .execute(&mut plan, 1)
        .unwrap();

        assert_eq!(plan.changes[0].fields["service"]["id"], json!("__REF__:svc#id"));
        assert_eq!(plan.changes[2].fields["service"]["id"], json!("s-1"));
    }

    #[test]
    fn test_deck_step_skips_resolution_without_consumers() {
        let config = config(RecordingRunner::default(), vec![]);
        let mut plan = plan_with(vec![deck_change()]);
        let mut table = RefTable::new();
        run(&config, &mut plan, &mut table, false).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_deck_step_ambiguous_service_fails() {
        let config = config(
            RecordingRunner::default(),
            vec![("orders", "s-1"), ("orders", "s-2")],
        );
        let mut plan = plan_with(vec![deck_change(), implementation_change("2", "svc")]);
        let err = run(&config, &mut plan, &mut RefTable::new(), false).unwrap_err();
        assert!(err.to_string().contains("matched multiple services"));
    }

    #[test]
    fn test_deck_step_missing_service_fails() {
        let config = config(RecordingRunner::default(), vec![("billing", "s-2")]);
        let mut plan = plan_with(vec![deck_change(), implementation_change("2", "svc")]);
        let err = run(&config, &mut plan, &mut RefTable::new(), false).unwrap_err();
        assert!(err.to_string().contains("not found with name \"orders\""));
    }

    #[test]
    fn test_deck_step_failure_includes_stderr() {
        let runner = RecordingRunner {
            fail_with: Some("bad file\n".to_string()),
            ..Default::default()
        };
        let config = config(runner, vec![]);
        let mut plan = plan_with(vec![deck_change()]);
        let err = run(&config, &mut plan, &mut RefTable::new(), false).unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
        assert!(err.to_string().ends_with("status 1: bad file"));
    }

    #[test]
    fn test_deck_step_dry_run_does_not_run() {
        let runner = RecordingRunner::default();
        let config = config(runner.clone(), vec![]);
        let mut plan = plan_with(vec![deck_change(), implementation_change("2", "svc")]);
        let mut table = RefTable::new();

        run(&config, &mut plan, &mut table, true).unwrap();

        assert!(runner.runs.lock().unwrap().is_empty());
        assert_eq!(table.get("gateway_service", "svc"), Some("dry-run-gateway_service-id"));
        assert_eq!(plan.changes[1].fields["service"]["id"], json!("svc"));
    }

    #[test]
    fn test_deck_step_mode_override() {
        let runner = RecordingRunner::default();
        let config = config(runner.clone(), vec![]).with_mode(PlanMode::Apply);
        let mut plan = plan_with(vec![deck_change()]);
        run(&config, &mut plan, &mut RefTable::new(), false).unwrap();
        assert_eq!(runner.runs.lock().unwrap()[0].args[1], "apply");
    }

    #[test]
    fn test_deck_step_control_plane_name_from_plan() {
        let runner = RecordingRunner::default();
        let config = config(runner.clone(), vec![]);
        let mut deck = deck_change();
        deck.fields.remove("control_plane_name");
        let cp = Change::new("0", ActionType::Create, "control_plane", "cp")
            .with_field("name", "prod-cp");
        let mut plan = plan_with(vec![deck, cp]);
        run(&config, &mut plan, &mut RefTable::new(), false).unwrap();
        assert_eq!(
            runner.runs.lock().unwrap()[0].konnect_control_plane_name,
            "prod-cp"
        );
    }

    #[test]
    fn test_deck_step_unresolvable_control_plane() {
        let config = config(RecordingRunner::default(), vec![]);
        let mut deck = deck_change();
        deck.fields.remove("control_plane_id");
        let mut plan = plan_with(vec![deck]);
        let err = run(&config, &mut plan, &mut RefTable::new(), false).unwrap_err();
        assert!(matches!(err, Error::Reference { .. }));
    }

    #[test]
    fn test_parse_files() {
        assert_eq!(parse_files(Some(&json!([" a.yaml "]))).unwrap(), vec!["a.yaml"]);
        assert!(parse_files(None).is_err());
        assert!(parse_files(Some(&json!([]))).is_err());
        assert!(parse_files(Some(&json!([""]))).is_err());
        assert!(parse_files(Some(&json!(["--flag"]))).is_err());
        assert!(parse_files(Some(&json!("a.yaml"))).is_err());
    }

    #[test]
    fn test_parse_flags() {
        assert!(parse_flags(None).unwrap().is_empty());
        assert_eq!(
            parse_flags(Some(&json!(["--select-tag=x"]))).unwrap(),
            vec!["--select-tag=x"]
        );
        assert!(parse_flags(Some(&json!(["value"]))).is_err());
        assert!(parse_flags(Some(&json!([" "]))).is_err());
    }

    #[test]
    fn test_ensure_output_flags_keeps_existing() {
        let flags = ensure_output_flags(vec!["--no-color".to_string()]);
        assert_eq!(flags, vec!["--no-color", "--json-output"]);
    }

    #[test]
    fn test_service_targets_from_legacy_field() {
        let change = Change::new("1", ActionType::ExternalTool, DECK_RESOURCE_TYPE, "cp").with_field(
            "gateway_services",
            json!([
                {"ref": "a", "selector": {"matchFields": {"name": "alpha"}}},
                {"ref": "b", "selector_name": "beta"},
                {"selector_name": "no-ref"}
            ]),
        );
        let targets = service_targets(&change).unwrap();
        assert_eq!(
            targets,
            vec![
                ServiceTarget {
                    reference: "a".into(),
                    selector_name: "alpha".into()
                },
                ServiceTarget {
                    reference: "b".into(),
                    selector_name: "beta".into()
                },
            ]
        );
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
