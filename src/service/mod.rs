//! Service container: named services built lazily from framework factories, application
//! factories and application invokables.

pub mod container;
pub mod descriptor;
pub mod framework;

pub use container::{ServiceContainer, Services};
pub use descriptor::{Invokable, ServiceCatalog, ServiceDescriptor, ServiceFactory, ServiceInstance};

/// Reserved name resolving to the loaded [`crate::config::AppConfig`].
pub const CONFIG_SERVICE: &str = "Config";
pub const AUTHENTICATION_SERVICE: &str = "AuthenticationService";
pub const CONTROLLER_PLUGIN_MANAGER: &str = "ControllerPluginManager";
pub const VIEW_HELPER_MANAGER: &str = "ViewHelperManager";
pub const ROUTER_SERVICE: &str = "Router";

/// Names rebuilt on every `get` and never cached: they depend on the current request.
pub const REQUEST_SCOPED_SERVICES: [&str; 3] = [
    AUTHENTICATION_SERVICE,
    CONTROLLER_PLUGIN_MANAGER,
    VIEW_HELPER_MANAGER,
];

pub fn is_cacheable(name: &str) -> bool {
    !REQUEST_SCOPED_SERVICES.contains(&name)
}

pub fn is_framework_service(name: &str) -> bool {
    framework::FRAMEWORK_FACTORIES.iter().any(|(n, _)| *n == name)
}
