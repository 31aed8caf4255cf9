//! Config validation: mount points must be absolute and must not collide.

use crate::config::ApiConfig;
use crate::error::ConfigError;

pub fn validate(config: &ApiConfig) -> Result<(), ConfigError> {
    if !config.base_path.is_empty() && !config.base_path.starts_with('/') {
        return Err(ConfigError::InvalidPath {
            field: "base_path",
            reason: format!("{:?} must start with '/'", config.base_path),
        });
    }
    if !config.docs_path.starts_with('/') {
        return Err(ConfigError::InvalidPath {
            field: "docs_path",
            reason: format!("{:?} must start with '/'", config.docs_path),
        });
    }
    if config.with_docs && trimmed(&config.docs_path) == trimmed(&config.base_path) {
        return Err(ConfigError::InvalidPath {
            field: "docs_path",
            reason: "must differ from base_path while docs are enabled".into(),
        });
    }
    if config.conventions.root.is_empty() {
        return Err(ConfigError::Validation("conventions.root must not be empty".into()));
    }
    Ok(())
}

fn trimmed(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&ApiConfig::default()).is_ok());
    }

    #[test]
    fn relative_base_path_is_rejected() {
        let config = ApiConfig::default().with_base_path("api");
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPath { field: "base_path", .. })
        ));
    }

    #[test]
    fn docs_path_may_not_shadow_the_api() {
        let config = ApiConfig::default().with_docs_path("/api/");
        assert!(validate(&config).is_err());
        assert!(validate(&config.with_docs(false)).is_ok());
    }

    #[test]
    fn empty_base_path_mounts_at_root() {
        assert!(validate(&ApiConfig::default().with_base_path("")).is_ok());
    }
}
