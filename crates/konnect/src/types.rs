//! Request bodies sent to Konnect
//!
//! Optional fields are omitted from the JSON when unset so updates only
//! touch what the plan changed.

use declarative::Labels;
use declarative::labels::normalize_labels;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Label set for a PATCH request.
///
/// Konnect merges labels, so keys the plan dropped are sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPatch {
    /// Labels to set.
    pub labels: Labels,
    /// User keys to remove.
    pub removed: Vec<String>,
}

impl LabelPatch {
    pub fn new(labels: Labels, removed: Vec<String>) -> Self {
        Self { labels, removed }
    }
}

impl Serialize for LabelPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.labels.len() + self.removed.len()))?;
        for (key, value) in &self.labels {
            map.serialize_entry(key, value)?;
        }
        for key in self.removed.iter().filter(|k| !self.labels.contains_key(*k)) {
            map.serialize_entry(key, &Option::<String>::None)?;
        }
        map.end()
    }
}

/// Labels of a Konnect response object, with `null` values dropped.
pub fn labels_of(object: &Value) -> Labels {
    let Some(raw) = object.get("labels").and_then(Value::as_object) else {
        return Labels::new();
    };
    let raw: BTreeMap<String, Option<String>> = raw
        .iter()
        .map(|(k, v)| (k.clone(), v.as_str().map(ToString::to_string)))
        .collect();
    normalize_labels(&raw)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreatePortal {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbac_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_developers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_applications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_api_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_page_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_application_auth_strategy_id: Option<String>,
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatePortal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbac_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_developers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_applications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_api_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_page_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_application_auth_strategy_id: Option<String>,
    pub labels: LabelPatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateControlPlane {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_gateway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_urls: Option<Vec<Value>>,
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateControlPlane {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_urls: Option<Vec<Value>>,
    pub labels: LabelPatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateApi {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateApi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
    pub labels: LabelPatch,
}

/// Specification document of an API version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiSpec {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateApiVersion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<ApiSpec>,
}

/// Publication of an API to a portal; Konnect upserts these with PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiPublication {
    #[serde(skip)]
    pub portal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_strategy_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_registrations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

/// Gateway service an API implementation points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReference {
    pub id: String,
    pub control_plane_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateApiImplementation {
    pub service: ServiceReference,
}

/// `key-auth` strategy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyAuthConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_names: Vec<String>,
}

/// `openid-connect` strategy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenIdConnectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credential_claim: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_methods: Vec<String>,
}

/// Strategy settings, keyed by the config name Konnect expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StrategyConfigs {
    #[serde(rename = "key-auth")]
    KeyAuth(KeyAuthConfig),
    #[serde(rename = "openid-connect")]
    OpenIdConnect(OpenIdConnectConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateAuthStrategy {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub strategy_type: String,
    pub configs: StrategyConfigs,
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateAuthStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configs: Option<StrategyConfigs>,
    pub labels: LabelPatch,
}
