//! Application auth strategies (`/v2/application-auth-strategies`)

use super::{create_labels, find_by_name, find_by_path, response_id, to_body, update_labels};
use crate::client::KonnectApi;
use crate::types::{
    CreateAuthStrategy, KeyAuthConfig, OpenIdConnectConfig, StrategyConfigs, UpdateAuthStrategy,
};
use anyhow::{Context, Result, bail};
use declarative::fields::{opt_string, string_field, string_slice};
use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
use serde_json::{Map, Value};
use std::sync::Arc;

const COLLECTION: &str = "/v2/application-auth-strategies";

/// Field the planner fills with the current strategy type on updates.
pub const STRATEGY_TYPE_FIELD: &str = "_strategy_type";

const KEY_AUTH: &str = "key_auth";
const OPENID_CONNECT: &str = "openid_connect";

pub struct AuthStrategyAdapter {
    api: Arc<dyn KonnectApi>,
}

impl AuthStrategyAdapter {
    pub fn new(api: Arc<dyn KonnectApi>) -> Self {
        Self { api }
    }
}

fn strings(config: &Map<String, Value>, key: &str) -> Vec<String> {
    config.get(key).and_then(string_slice).unwrap_or_default()
}

fn config_section<'a>(configs: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>> {
    configs
        .get(name)
        .and_then(Value::as_object)
        .with_context(|| format!("configs.{name} is required"))
}

/// Typed configs for a strategy type.
///
/// Creates must be complete: an OIDC strategy needs an issuer and
/// defaults its credential claim to `sub`. Updates send only what is set.
fn build_configs(strategy_type: &str, configs: &Map<String, Value>, create: bool) -> Result<StrategyConfigs> {
    match strategy_type {
        KEY_AUTH => {
            let section = config_section(configs, "key-auth")?;
            Ok(StrategyConfigs::KeyAuth(KeyAuthConfig {
                key_names: strings(section, "key_names"),
            }))
        }
        OPENID_CONNECT => {
            let section = config_section(configs, "openid-connect")?;
            let issuer = section
                .get("issuer")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            if create && issuer.is_none() {
                bail!("issuer is required for {OPENID_CONNECT} strategy");
            }
            let mut credential_claim = strings(section, "credential_claim");
            if create && credential_claim.is_empty() {
                credential_claim.push("sub".to_string());
            }
            Ok(StrategyConfigs::OpenIdConnect(OpenIdConnectConfig {
                issuer,
                credential_claim,
                scopes: strings(section, "scopes"),
                auth_methods: strings(section, "auth_methods"),
            }))
        }
        other => bail!("unsupported strategy_type: {other}"),
    }
}

impl ResourceOperations for AuthStrategyAdapter {
    type CreateRequest = CreateAuthStrategy;
    type UpdateRequest = UpdateAuthStrategy;

    fn resource_type(&self) -> &'static str {
        "application_auth_strategy"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["name", "strategy_type"]
    }

    fn map_create_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
    ) -> Result<CreateAuthStrategy> {
        let strategy_type = string_field(fields, "strategy_type");
        let configs = fields
            .get("configs")
            .and_then(Value::as_object)
            .with_context(|| format!("configs is required for {strategy_type} strategy"))?;

        Ok(CreateAuthStrategy {
            name: string_field(fields, "name").to_string(),
            display_name: opt_string(fields, "display_name"),
            configs: build_configs(strategy_type, configs, true)?,
            strategy_type: strategy_type.to_string(),
            labels: create_labels(ctx, fields)?,
        })
    }

    fn map_update_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &Fields,
        current_labels: &Labels,
    ) -> Result<UpdateAuthStrategy> {
        let configs = match fields.get("configs").and_then(Value::as_object) {
            Some(configs) => {
                let strategy_type = fields
                    .get(STRATEGY_TYPE_FIELD)
                    .or_else(|| fields.get("strategy_type"))
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .context("strategy type not provided for config update")?;
                Some(build_configs(strategy_type, configs, false)?)
            }
            None => None,
        };

        Ok(UpdateAuthStrategy {
            display_name: opt_string(fields, "display_name"),
            configs,
            labels: update_labels(ctx, fields, current_labels)?,
        })
    }

    fn create(&self, _ctx: &ExecutionContext<'_>, request: CreateAuthStrategy) -> Result<String> {
        let response = self.api.post(COLLECTION, &to_body(&request)?)?;
        response_id(&response, "application_auth_strategy")
    }

    fn update(
        &self,
        _ctx: &ExecutionContext<'_>,
        id: &str,
        request: UpdateAuthStrategy,
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
    use declarative::{ActionType, BaseExecutor, ChangeHandler};
    use serde_json::json;

    fn handler(api: &MemoryApi) -> BaseExecutor<AuthStrategyAdapter> {
        BaseExecutor::new(AuthStrategyAdapter::new(Arc::new(api.clone())))
    }

    #[test]
    fn test_create_key_auth() {
        let api = MemoryApi::new();
        let change = change("application_auth_strategy", "key-auth", ActionType::Create)
            .with_field("name", "key-auth")
            .with_field("display_name", "API Key")
            .with_field("strategy_type", "key_auth")
            .with_field("configs", json!({"key-auth": {"key_names": ["apikey", "x-api-key"]}}));

        let id = handler(&api).create(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(stored["strategy_type"], "key_auth");
        assert_eq!(stored["configs"]["key-auth"]["key_names"], json!(["apikey", "x-api-key"]));
        assert_eq!(stored["labels"]["KONGCTL-managed"], "true");
    }

    #[test]
    fn test_create_oidc_defaults_credential_claim() {
        let api = MemoryApi::new();
        let change = change("application_auth_strategy", "oidc", ActionType::Create)
            .with_field("name", "oidc")
            .with_field("strategy_type", "openid_connect")
            .with_field(
                "configs",
                json!({"openid-connect": {"issuer": "https://idp.example.com", "scopes": ["openid"]}}),
            );

        let id = handler(&api).create(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        let oidc = &stored["configs"]["openid-connect"];
        assert_eq!(oidc["issuer"], "https://idp.example.com");
        assert_eq!(oidc["credential_claim"], json!(["sub"]));
        assert_eq!(oidc["scopes"], json!(["openid"]));
    }

    #[test]
    fn test_create_oidc_without_issuer_fails() {
        let api = MemoryApi::new();
        let change = change("application_auth_strategy", "oidc", ActionType::Create)
            .with_field("name", "oidc")
            .with_field("strategy_type", "openid_connect")
            .with_field("configs", json!({"openid-connect": {}}));

        let err = handler(&api).create(&ctx(&change)).unwrap_err();
        assert!(err.to_string().contains("issuer is required"));
        assert_eq!(api.mutation_count(), 0);
    }

    #[test]
    fn test_create_unsupported_type() {
        let api = MemoryApi::new();
        let change = change("application_auth_strategy", "basic", ActionType::Create)
            .with_field("name", "basic")
            .with_field("strategy_type", "basic_auth")
            .with_field("configs", json!({}));

        let err = handler(&api).create(&ctx(&change)).unwrap_err();
        assert!(err.to_string().contains("unsupported strategy_type: basic_auth"));
    }

    #[test]
    fn test_update_configs_need_strategy_type() {
        let api = MemoryApi::new();
        let id = api.seed(
            COLLECTION,
            json!({"name": "key-auth", "labels": {"KONGCTL-managed": "true"}}),
        );
        let change = change("application_auth_strategy", "key-auth", ActionType::Update)
            .with_resource_id(&id)
            .with_field("name", "key-auth")
            .with_field("configs", json!({"key-auth": {"key_names": ["token"]}}));

        let err = handler(&api).update(&ctx(&change)).unwrap_err();
        assert!(err.to_string().contains("strategy type not provided"));
    }

    #[test]
    fn test_update_configs_with_planner_strategy_type() {
        let api = MemoryApi::new();
        let id = api.seed(
            COLLECTION,
            json!({
                "name": "key-auth",
                "configs": {"key-auth": {"key_names": ["apikey"]}},
                "labels": {"KONGCTL-managed": "true"}
            }),
        );
        let change = change("application_auth_strategy", "key-auth", ActionType::Update)
            .with_resource_id(&id)
            .with_field("name", "key-auth")
            .with_field(STRATEGY_TYPE_FIELD, "key_auth")
            .with_field("configs", json!({"key-auth": {"key_names": ["token"]}}));

        handler(&api).update(&ctx(&change)).unwrap();

        let stored = api.object(&format!("{COLLECTION}/{id}")).unwrap();
        assert_eq!(stored["configs"]["key-auth"]["key_names"], json!(["token"]));
    }
}
