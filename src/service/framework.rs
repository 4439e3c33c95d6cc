//! Factories the framework registers under reserved names. Applications cannot redeclare them.

use crate::auth::AuthenticationService;
use crate::error::ServiceError;
use crate::helpers::HelperManager;
use crate::plugins::PluginManager;
use crate::service::{
    ServiceFactory, ServiceInstance, Services, AUTHENTICATION_SERVICE, CONTROLLER_PLUGIN_MANAGER,
    ROUTER_SERVICE, VIEW_HELPER_MANAGER,
};
use std::sync::Arc;

/// Reserved service name -> implementation path.
pub const FRAMEWORK_FACTORIES: [(&str, &str); 4] = [
    (AUTHENTICATION_SERVICE, "Folio/Authentication/AuthenticationServiceFactory"),
    (CONTROLLER_PLUGIN_MANAGER, "Folio/Mvc/ControllerPluginManagerFactory"),
    (VIEW_HELPER_MANAGER, "Folio/View/HelperManagerFactory"),
    (ROUTER_SERVICE, "Folio/Router/RouteTableFactory"),
];

struct AuthenticationFactory;

impl ServiceFactory for AuthenticationFactory {
    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError> {
        let scope = services.request_scope(AUTHENTICATION_SERVICE)?;
        Ok(Arc::new(AuthenticationService::new(Arc::clone(scope))))
    }
}

struct PluginManagerFactory;

impl ServiceFactory for PluginManagerFactory {
    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError> {
        let scope = services.request_scope(CONTROLLER_PLUGIN_MANAGER)?;
        let catalog = Arc::clone(services.container().plugin_catalog());
        Ok(Arc::new(PluginManager::bind(catalog, Arc::clone(scope))?))
    }
}

struct HelperManagerFactory;

impl ServiceFactory for HelperManagerFactory {
    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError> {
        let scope = services.request_scope(VIEW_HELPER_MANAGER)?;
        let catalog = Arc::clone(services.container().helper_catalog());
        Ok(Arc::new(HelperManager::bind(catalog, Arc::clone(scope))?))
    }
}

struct RouterFactory;

impl ServiceFactory for RouterFactory {
    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError> {
        Ok(Arc::clone(services.container().routes()) as ServiceInstance)
    }
}

pub(crate) fn framework_factories() -> Vec<(&'static str, &'static str, Arc<dyn ServiceFactory>)> {
    FRAMEWORK_FACTORIES
        .iter()
        .map(|&(name, path)| {
            let factory: Arc<dyn ServiceFactory> = match name {
                AUTHENTICATION_SERVICE => Arc::new(AuthenticationFactory),
                CONTROLLER_PLUGIN_MANAGER => Arc::new(PluginManagerFactory),
                VIEW_HELPER_MANAGER => Arc::new(HelperManagerFactory),
                _ => Arc::new(RouterFactory),
            };
            (name, path, factory)
        })
        .collect()
}
