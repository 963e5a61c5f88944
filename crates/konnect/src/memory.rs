//! In-memory Konnect for tests and offline dry runs
//!
//! [`MemoryApi`] stores JSON objects by path and answers the handful of
//! request shapes the adapters use:
//!
//! - `POST <collection>` stores the body under a generated ID
//! - `PUT <path>` stores the body as-is
//! - `PATCH <path>` applies a JSON merge patch (`null` removes a key)
//! - `GET <collection>` lists direct children, honoring `filter[<field>][eq]`;
//!   anything never written to is a 404
//! - `DELETE <path>` removes the object and everything below it
//!
//! ```
//! use konnect::{KonnectApi, MemoryApi};
//! use serde_json::json;
//!
//! let api = MemoryApi::new();
//! let created = api.post("/v3/portals", &json!({"name": "dev"})).unwrap();
//! let id = created["id"].as_str().unwrap();
//!
//! let found = api.get(&format!("/v3/portals/{id}"), &[]).unwrap();
//! assert_eq!(found.unwrap()["name"], "dev");
//! ```

use crate::client::KonnectApi;
use crate::error::{Error, Result};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Value>,
    collections: BTreeSet<String>,
    calls: Vec<String>,
    failures: HashMap<String, (u16, String)>,
    next_id: u64,
}

/// Fake Konnect backed by a shared map
///
/// Clones share state, so a test can hand one clone to the adapters and
/// inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemoryApi {
    state: Arc<Mutex<State>>,
}

impl MemoryApi {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object under `collection` with a generated ID; returns the ID.
    ///
    /// Seeding is not recorded as a call.
    pub fn seed(&self, collection: &str, object: Value) -> String {
        let mut state = self.state();
        let id = state.generate_id();
        let object = with_id(object, &id);
        state.collections.insert(collection.to_string());
        state.objects.insert(format!("{collection}/{id}"), object);
        id
    }

    /// Make the next matching request fail with `status`.
    ///
    /// `call` has the same form as the entries of [`calls`](Self::calls).
    pub fn fail(&self, call: &str, status: u16) {
        self.fail_with(call, status, format!("injected failure for {call}"));
    }

    /// Make the next matching request fail with `status` and `message`.
    pub fn fail_with(&self, call: &str, status: u16, message: impl Into<String>) {
        self.state()
            .failures
            .insert(call.to_string(), (status, message.into()));
    }

    /// Stored object at a path.
    pub fn object(&self, path: &str) -> Option<Value> {
        self.state().objects.get(path).cloned()
    }

    /// Every request received, as `"METHOD /path?query"`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of non-GET requests received.
    pub fn mutation_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| !c.starts_with("GET "))
            .count()
    }
}

impl State {
    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.next_id)
    }

    fn record(&mut self, method: &str, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let mut call = format!("{method} {path}");
        if !query.is_empty() {
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            call = format!("{call}?{}", pairs.join("&"));
        }
        let failure = self.failures.remove(&call);
        self.calls.push(call);
        match failure {
            Some((status, message)) => Err(Error::http(status, message)),
            None => Ok(()),
        }
    }

    fn children(&self, collection: &str) -> Vec<&Value> {
        let prefix = format!("{collection}/");
        self.objects
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(_, object)| object)
            .collect()
    }
}

impl KonnectApi for MemoryApi {
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut state = self.state();
        state.record("GET", path, query)?;

        if let Some(object) = state.objects.get(path) {
            return Ok(Some(object.clone()));
        }
        if !state.collections.contains(path) {
            return Ok(None);
        }

        let filters: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(key, value)| {
                let field = key.strip_prefix("filter[")?.strip_suffix("][eq]")?;
                Some((field, *value))
            })
            .collect();

        let data: Vec<Value> = state
            .children(path)
            .into_iter()
            .filter(|object| {
                filters
                    .iter()
                    .all(|(field, value)| object.get(*field).and_then(Value::as_str) == Some(*value))
            })
            .cloned()
            .collect();

        let total = data.len();
        Ok(Some(json!({ "data": data, "meta": { "page": { "total": total } } })))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let mut state = self.state();
        state.record("POST", path, &[])?;
        let id = state.generate_id();
        let object = with_id(body.clone(), &id);
        state.collections.insert(path.to_string());
        state.objects.insert(format!("{path}/{id}"), object.clone());
        Ok(object)
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        let mut state = self.state();
        state.record("PATCH", path, &[])?;
        let object = state
            .objects
            .get_mut(path)
            .ok_or_else(|| Error::http(404, format!("{path} not found")))?;
        merge_patch(object, body);
        Ok(object.clone())
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let mut state = self.state();
        state.record("PUT", path, &[])?;
        if let Some((collection, _)) = path.rsplit_once('/') {
            state.collections.insert(collection.to_string());
        }
        state.objects.insert(path.to_string(), body.clone());
        Ok(body.clone())
    }

    fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let mut state = self.state();
        state.record("DELETE", path, query)?;
        if state.objects.remove(path).is_none() {
            return Err(Error::http(404, format!("{path} not found")));
        }
        let prefix = format!("{path}/");
        state.objects.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

fn with_id(object: Value, id: &str) -> Value {
    let mut map = match object {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(map)
}

/// RFC 7386 merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_assigns_uuid_ids() {
        let api = MemoryApi::new();
        let first = api.post("/v3/apis", &json!({"name": "a"})).unwrap();
        let second = api.post("/v3/apis", &json!({"name": "b"})).unwrap();
        assert_ne!(first["id"], second["id"]);
        assert!(declarative::fields::is_valid_uuid(first["id"].as_str().unwrap()));
    }

    #[test]
    fn test_list_filters_by_name() {
        let api = MemoryApi::new();
        api.seed("/v3/portals", json!({"name": "dev"}));
        api.seed("/v3/portals", json!({"name": "prod"}));

        let page = api
            .get("/v3/portals", &[("filter[name][eq]", "prod")])
            .unwrap()
            .unwrap();
        let data = page["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], "prod");
    }

    #[test]
    fn test_list_excludes_grandchildren() {
        let api = MemoryApi::new();
        let api_id = api.seed("/v3/apis", json!({"name": "a"}));
        api.seed(&format!("/v3/apis/{api_id}/versions"), json!({"version": "1"}));

        let page = api.get("/v3/apis", &[]).unwrap().unwrap();
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_get_unknown_path_is_not_found() {
        let api = MemoryApi::new();
        assert!(api.get("/v3/portals", &[]).unwrap().is_none());

        let id = api.seed("/v3/portals", json!({"name": "dev"}));
        api.delete(&format!("/v3/portals/{id}"), &[]).unwrap();
        let page = api.get("/v3/portals", &[]).unwrap().unwrap();
        assert!(page["data"].as_array().unwrap().is_empty());
        assert!(api.get("/v3/portals/missing", &[]).unwrap().is_none());
    }

    #[test]
    fn test_patch_null_removes_key() {
        let api = MemoryApi::new();
        let id = api.seed("/v3/portals", json!({"name": "dev", "labels": {"team": "a", "env": "x"}}));
        let path = format!("/v3/portals/{id}");

        api.patch(&path, &json!({"labels": {"team": null, "tier": "gold"}}))
            .unwrap();

        let stored = api.object(&path).unwrap();
        assert_eq!(stored["labels"], json!({"env": "x", "tier": "gold"}));
        assert_eq!(stored["name"], "dev");
    }

    #[test]
    fn test_delete_removes_children() {
        let api = MemoryApi::new();
        let api_id = api.seed("/v3/apis", json!({"name": "a"}));
        let version = api.seed(&format!("/v3/apis/{api_id}/versions"), json!({"version": "1"}));

        api.delete(&format!("/v3/apis/{api_id}"), &[]).unwrap();

        assert!(api.object(&format!("/v3/apis/{api_id}/versions/{version}")).is_none());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let api = MemoryApi::new();
        let err = api.delete("/v3/portals/nope", &[]).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let api = MemoryApi::new();
        api.fail("POST /v3/portals", 409);

        let err = api.post("/v3/portals", &json!({"name": "dev"})).unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(api.post("/v3/portals", &json!({"name": "dev"})).is_ok());
    }

    #[test]
    fn test_calls_and_mutation_count() {
        let api = MemoryApi::new();
        api.get("/v3/portals", &[]).unwrap();
        api.post("/v3/portals", &json!({"name": "dev"})).unwrap();

        assert_eq!(api.calls(), vec!["GET /v3/portals", "POST /v3/portals"]);
        assert_eq!(api.mutation_count(), 1);
    }
}
