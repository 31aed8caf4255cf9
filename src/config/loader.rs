//! Load `ApiConfig` from the environment, a JSON string or a JSON file.

use crate::config::{validate, ApiConfig};
use crate::error::ConfigError;
use std::path::Path;

pub const ENV_BASE_PATH: &str = "HS_API_BASE_PATH";
pub const ENV_DOCS_PATH: &str = "HS_API_DOCS_PATH";
pub const ENV_WITH_DOCS: &str = "HS_API_WITH_DOCS";
pub const ENV_SECRET: &str = "HS_API_SECRET";
pub const ENV_BODY_LIMIT: &str = "HS_API_BODY_LIMIT";

impl ApiConfig {
    /// Defaults overridden by `HS_API_*` variables. Reads `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` but with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ApiConfig::default();
        if let Some(v) = lookup(ENV_BASE_PATH) {
            config.base_path = v;
        }
        if let Some(v) = lookup(ENV_DOCS_PATH) {
            config.docs_path = v;
        }
        if let Some(v) = lookup(ENV_WITH_DOCS) {
            config.with_docs = parse_flag(ENV_WITH_DOCS, &v)?;
        }
        if let Some(v) = lookup(ENV_SECRET) {
            config.secret = v;
        }
        if let Some(v) = lookup(ENV_BODY_LIMIT) {
            config.body_limit = v.trim().parse().map_err(|_| ConfigError::Env {
                name: ENV_BODY_LIMIT,
                reason: format!("expected a byte count, got {:?}", v),
            })?;
        }
        validate(&config)?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: ApiConfig =
            serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env {
            name,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[
            (ENV_BASE_PATH, "/v1"),
            (ENV_WITH_DOCS, "off"),
            (ENV_SECRET, "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.base_path, "/v1");
        assert_eq!(config.docs_path, "/docs");
        assert!(!config.with_docs);
        assert_eq!(config.secret, "s3cret");
    }

    #[test]
    fn bad_flag_is_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_WITH_DOCS, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: ENV_WITH_DOCS, .. }));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = ApiConfig::from_json_str(r#"{"base_path": "/rest"}"#).unwrap();
        assert_eq!(config.base_path, "/rest");
        assert_eq!(config.conventions.page, "+page");
        assert!(config.with_docs);
    }

    #[test]
    fn json_parse_error_is_a_load_error() {
        assert!(matches!(
            ApiConfig::from_json_str("{"),
            Err(ConfigError::Load(_))
        ));
    }
}
