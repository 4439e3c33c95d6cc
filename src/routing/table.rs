//! Ordered route table built from config. Matching is a linear scan in config order.

use crate::config::RouteConfig;
use crate::error::{ConfigError, RouteError};
use crate::routing::RoutePattern;
use std::collections::HashMap;

/// Module/controller/action used when no route matches.
pub const NOT_FOUND_MODULE: &str = "error";
pub const NOT_FOUND_CONTROLLER: &str = "error";
pub const NOT_FOUND_ACTION: &str = "notFound";

#[derive(Clone, Debug)]
pub struct RouteEntry {
    pub name: String,
    pub pattern: RoutePattern,
    pub module: String,
    pub controller: String,
    pub action: String,
    pub defaults: HashMap<String, String>,
}

/// Result of routing one path. `route_name` is None for the synthesized not-found triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    pub route_name: Option<String>,
    pub module: String,
    pub controller: String,
    pub action: String,
    pub params: HashMap<String, String>,
}

impl RouteMatch {
    pub fn not_found() -> Self {
        RouteMatch {
            route_name: None,
            module: NOT_FOUND_MODULE.into(),
            controller: NOT_FOUND_CONTROLLER.into(),
            action: NOT_FOUND_ACTION.into(),
            params: HashMap::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.route_name.is_none()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    by_name: HashMap<String, usize>,
}

impl RouteTable {
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(routes.len());
        let mut by_name = HashMap::new();
        for r in routes {
            if by_name.insert(r.name.clone(), entries.len()).is_some() {
                return Err(ConfigError::DuplicateRoute(r.name.clone()));
            }
            entries.push(RouteEntry {
                name: r.name.clone(),
                pattern: RoutePattern::parse(&r.route)?,
                module: r.module.clone(),
                controller: r.controller.clone(),
                action: r.action.clone(),
                defaults: r.defaults.clone(),
            });
        }
        tracing::debug!(routes = entries.len(), "route table loaded");
        Ok(RouteTable { entries, by_name })
    }

    /// First entry whose pattern matches `path`. A trailing slash is ignored.
    /// `:module`, `:controller` and `:action` parameters override the configured triple.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize(path);
        self.entries.iter().find_map(|entry| {
            let captured = entry.pattern.captures(path)?;
            let mut params = entry.defaults.clone();
            params.extend(captured);
            let pick = |key: &str, configured: &str| {
                params.get(key).cloned().unwrap_or_else(|| configured.to_string())
            };
            Some(RouteMatch {
                route_name: Some(entry.name.clone()),
                module: pick("module", &entry.module),
                controller: pick("controller", &entry.controller),
                action: pick("action", &entry.action),
                params,
            })
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&RouteEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// URL for a named route.
    pub fn assemble(&self, name: &str, params: &HashMap<String, String>) -> Result<String, RouteError> {
        let entry = self
            .lookup(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?;
        entry
            .pattern
            .assemble(params, &entry.defaults)
            .map_err(|param| RouteError::MissingParameter {
                route: name.to_string(),
                param,
            })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else if path.is_empty() {
        "/"
    } else {
        path
    }
}
