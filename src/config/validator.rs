//! Config validation: route uniqueness and service descriptor consistency.

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::service::{is_framework_service, CONFIG_SERVICE};
use std::collections::HashSet;

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for r in &config.routes {
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicateRoute(r.name.clone()));
        }
        if !r.route.starts_with('/') {
            return Err(ConfigError::InvalidPattern {
                pattern: r.route.clone(),
                reason: "must start with '/'".into(),
            });
        }
        for (field, value) in [("module", &r.module), ("controller", &r.controller), ("action", &r.action)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("route '{}': empty {}", r.name, field)));
            }
        }
    }

    let sm = &config.service_manager;
    for name in sm.factories.keys().chain(sm.invokables.keys()).chain(sm.aliases.keys()) {
        if name == CONFIG_SERVICE || is_framework_service(name) {
            return Err(ConfigError::ReservedService(name.clone()));
        }
    }
    for name in sm.factories.keys() {
        if sm.invokables.contains_key(name) {
            return Err(ConfigError::DuplicateService(name.clone()));
        }
    }
    for (alias, target) in &sm.aliases {
        if sm.factories.contains_key(alias) || sm.invokables.contains_key(alias) {
            return Err(ConfigError::DuplicateService(alias.clone()));
        }
        if !alias_target_exists(config, target) {
            return Err(ConfigError::DanglingAlias {
                alias: alias.clone(),
                target: target.clone(),
            });
        }
    }

    if config.dispatcher.controller_delimiter.is_empty() {
        return Err(ConfigError::Validation("dispatcher.controller_delimiter must not be empty".into()));
    }
    if config.dispatcher.request_timeout_ms == 0 {
        return Err(ConfigError::Validation("dispatcher.request_timeout_ms must be positive".into()));
    }
    if !(300..400).contains(&config.dispatcher.redirect_status) {
        return Err(ConfigError::Validation(format!(
            "dispatcher.redirect_status {} is not a 3xx status",
            config.dispatcher.redirect_status
        )));
    }
    Ok(())
}

/// Follows alias chains; a cycle or a chain ending nowhere is dangling.
fn alias_target_exists(config: &AppConfig, target: &str) -> bool {
    let sm = &config.service_manager;
    let mut seen = HashSet::new();
    let mut cur = target;
    loop {
        if cur == CONFIG_SERVICE
            || is_framework_service(cur)
            || sm.factories.contains_key(cur)
            || sm.invokables.contains_key(cur)
        {
            return true;
        }
        if !seen.insert(cur) {
            return false;
        }
        match sm.aliases.get(cur) {
            Some(next) => cur = next,
            None => return false,
        }
    }
}
