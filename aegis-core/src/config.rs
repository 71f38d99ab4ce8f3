//! The org-scoped global model config (§4.4, §5): the read-mostly default
//! `{provider, model}` pair the LLM Gateway falls back to when a call omits
//! one or both. Swapped atomically behind an `RwLock<Arc<..>>` by the crate
//! that owns it (`aegis-llm`); this module only defines the data shape and
//! its `from_env` loading, following the `ApiConfig::from_env` idiom.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `{provider, model}` pair an organization falls back to when a call
/// to the LLM Gateway omits one or both (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProviderModelDefault {
    pub provider: String,
    pub model: String,
}

/// Org-scoped global model configuration (§3, §5 "Global model config").
///
/// Loaded once at startup from `MODEL_CONFIG_GLOBAL_JSON` (an env override
/// that, when set, shadows whatever the persistence layer holds and logs a
/// warning) and thereafter swapped as a whole via `RwLock<Arc<..>>` by the
/// LLM Gateway.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GlobalModelConfig {
    pub defaults_by_org: HashMap<String, ProviderModelDefault>,
}

impl GlobalModelConfig {
    /// The default for `org_slug`, if one is configured.
    pub fn default_for(&self, org_slug: &str) -> Option<&ProviderModelDefault> {
        self.defaults_by_org.get(org_slug)
    }

    /// Load from `MODEL_CONFIG_GLOBAL_JSON`. Returns the empty config (every
    /// call then requires an explicit `provider`/`model`) when the variable
    /// is unset; malformed JSON is treated the same as unset after logging.
    pub fn from_env() -> Self {
        match std::env::var("MODEL_CONFIG_GLOBAL_JSON") {
            Ok(raw) => match serde_json::from_str::<HashMap<String, ProviderModelDefault>>(&raw) {
                Ok(defaults_by_org) => Self { defaults_by_org },
                Err(err) => {
                    tracing::warn!(error = %err, "MODEL_CONFIG_GLOBAL_JSON is set but not valid JSON; ignoring");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Recognized environment keys for the Observability Bus, LLM Gateway, and
/// Dispatcher (§6). Each subsystem's own `Config::from_env` reads these;
/// this struct documents the full set in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientEnvKeys;

impl AmbientEnvKeys {
    pub const OBS_BUFFER_CAPACITY: &'static str = "OBS_BUFFER_CAPACITY";
    pub const OBS_SUBSCRIBER_QUEUE: &'static str = "OBS_SUBSCRIBER_QUEUE";
    pub const DISPATCH_TIMEOUT_MS: &'static str = "DISPATCH_TIMEOUT_MS";
    pub const PROVIDER_TIMEOUT_MS: &'static str = "PROVIDER_TIMEOUT_MS";
    pub const USAGE_BATCH_WINDOW_MS: &'static str = "USAGE_BATCH_WINDOW_MS";
    pub const MODEL_CONFIG_GLOBAL_JSON: &'static str = "MODEL_CONFIG_GLOBAL_JSON";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_org_defaults() {
        let cfg = GlobalModelConfig::default();
        assert!(cfg.default_for("acme").is_none());
    }

    #[test]
    fn from_env_parses_model_config_global_json() {
        std::env::set_var(
            "MODEL_CONFIG_GLOBAL_JSON",
            r#"{"acme":{"provider":"openai","model":"gpt-5"}}"#,
        );
        let cfg = GlobalModelConfig::from_env();
        assert_eq!(
            cfg.default_for("acme"),
            Some(&ProviderModelDefault {
                provider: "openai".into(),
                model: "gpt-5".into(),
            })
        );
        std::env::remove_var("MODEL_CONFIG_GLOBAL_JSON");
    }

    #[test]
    fn from_env_falls_back_to_default_on_malformed_json() {
        std::env::set_var("MODEL_CONFIG_GLOBAL_JSON", "not json");
        let cfg = GlobalModelConfig::from_env();
        assert!(cfg.defaults_by_org.is_empty());
        std::env::remove_var("MODEL_CONFIG_GLOBAL_JSON");
    }
}
