//! Load application config from a JSON file or string, with environment overrides.

use crate::config::types::{AppConfig, Environment};
use crate::error::ConfigError;
use std::path::Path;

/// Env var naming the config file.
pub const CONFIG_PATH_VAR: &str = "FOLIO_CONFIG";
/// Env var overriding `environment`.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

pub fn from_json_str(source: &str) -> Result<AppConfig, ConfigError> {
    serde_json::from_str(source).map_err(|e| ConfigError::Load(e.to_string()))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading config");
    let source = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let mut config = from_json_str(&source)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load the file named by `FOLIO_CONFIG` (default `config/app.json`), after reading `.env`.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config/app.json".into());
    load_from_path(path)
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Ok(env) = std::env::var(ENVIRONMENT_VAR) {
        config.environment = env.parse::<Environment>().map_err(ConfigError::Validation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = from_json_str(
            r#"{
                "routes": [
                    {"name": "home", "route": "/", "module": "blog", "controller": "index"}
                ],
                "service_manager": {"invokables": {"Markdown": "App/Markdown"}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.routes[0].action, "index");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.view_manager.not_found_template, "error/404");
        assert_eq!(config.dispatcher.controller_delimiter, "/");
        assert_eq!(config.service_manager.invokables["Markdown"], "App/Markdown");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(from_json_str("{"), Err(ConfigError::Load(_))));
    }
}
