//! Raw config types matching the JSON application config.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Whole application configuration, read once at boot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub routes: Vec<RouteConfig>,
    pub service_manager: ServiceManagerConfig,
    pub controller_plugins: RegistryConfig,
    pub view_helpers: RegistryConfig,
    pub view_manager: ViewManagerConfig,
    pub session: SessionConfig,
    pub dispatcher: DispatcherConfig,
    /// Free-form application settings, read by service factories.
    pub settings: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
    Testing,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    #[serde(alias = "pattern")]
    pub route: String,
    pub module: String,
    pub controller: String,
    #[serde(default = "default_action")]
    pub action: String,
    /// Values used for parameters the path does not supply.
    #[serde(default)]
    pub defaults: HashMap<String, String>,
}

fn default_action() -> String {
    "index".into()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceManagerConfig {
    pub invokables: BTreeMap<String, String>,
    pub factories: BTreeMap<String, String>,
    pub aliases: BTreeMap<String, String>,
}

/// `controller_plugins` / `view_helpers`: name -> implementation path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub invokables: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewManagerConfig {
    pub template_path_stack: Vec<PathBuf>,
    pub template_map: HashMap<String, PathBuf>,
    pub template_suffix: String,
    pub not_found_template: String,
    pub exception_template: String,
    /// Expose error detail on the 500 page. Ignored in production.
    pub display_exceptions: bool,
}

impl Default for ViewManagerConfig {
    fn default() -> Self {
        ViewManagerConfig {
            template_path_stack: vec![PathBuf::from("view")],
            template_map: HashMap::new(),
            template_suffix: "html".into(),
            not_found_template: "error/404".into(),
            exception_template: "error/index".into(),
            display_exceptions: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_path: String,
    pub http_only: bool,
    pub max_age_secs: i64,
    /// Legacy: share one mirror tier across all requests. Unsafe under concurrency.
    pub process_mirror: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            cookie_name: "folio.sid".into(),
            cookie_path: "/".into(),
            http_only: true,
            max_age_secs: 86_400,
            process_mirror: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Joins module and controller names into a controller key (`Admin/DashboardController`).
    pub controller_delimiter: String,
    pub request_timeout_ms: u64,
    pub redirect_status: u16,
    pub body_limit_bytes: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            controller_delimiter: "/".into(),
            request_timeout_ms: 30_000,
            redirect_status: 302,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}
