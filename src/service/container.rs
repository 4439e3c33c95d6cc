//! The service container and its request-scoped view.
//!
//! Resolution order: `Config`, framework factories, application factories, application
//! invokables. Names listed in [`REQUEST_SCOPED_SERVICES`](crate::service::REQUEST_SCOPED_SERVICES)
//! are built on every `get`; everything else is built once per container, guarded by a
//! per-name once cell so concurrent first lookups construct a single instance.

use crate::config::AppConfig;
use crate::dispatch::DispatchContext;
use crate::error::{ConfigError, ServiceError};
use crate::helpers::HelperCatalog;
use crate::plugins::PluginCatalog;
use crate::routing::RouteTable;
use crate::service::framework::framework_factories;
use crate::service::{
    is_cacheable, Invokable, ServiceCatalog, ServiceDescriptor, ServiceFactory, ServiceInstance,
    CONFIG_SERVICE,
};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct ServiceContainer {
    config: Arc<AppConfig>,
    descriptors: HashMap<String, ServiceDescriptor>,
    aliases: HashMap<String, String>,
    factories: HashMap<String, Arc<dyn ServiceFactory>>,
    invokables: HashMap<String, Invokable>,
    cache: RwLock<HashMap<String, Arc<OnceCell<ServiceInstance>>>>,
    routes: Arc<RouteTable>,
    plugins: Arc<PluginCatalog>,
    helpers: Arc<HelperCatalog>,
}

impl ServiceContainer {
    /// Resolve every configured descriptor path against the framework set and `catalog`.
    pub fn build(
        config: Arc<AppConfig>,
        catalog: &ServiceCatalog,
        routes: Arc<RouteTable>,
        plugins: Arc<PluginCatalog>,
        helpers: Arc<HelperCatalog>,
    ) -> Result<Self, ConfigError> {
        let mut descriptors = HashMap::new();
        let mut factories: HashMap<String, Arc<dyn ServiceFactory>> = HashMap::new();
        let mut invokables = HashMap::new();

        for (name, path, factory) in framework_factories() {
            descriptors.insert(name.to_string(), ServiceDescriptor::FrameworkFactory(path.to_string()));
            factories.insert(path.to_string(), factory);
        }

        let sm = &config.service_manager;
        for (name, path) in &sm.factories {
            if descriptors.contains_key(name) || name == CONFIG_SERVICE {
                return Err(ConfigError::ReservedService(name.clone()));
            }
            let factory = catalog.get_factory(path).ok_or_else(|| ConfigError::UnknownPath {
                kind: "service factory",
                name: name.clone(),
                path: path.clone(),
            })?;
            factories.insert(path.clone(), Arc::clone(factory));
            descriptors.insert(name.clone(), ServiceDescriptor::ApplicationFactory(path.clone()));
        }
        for (name, path) in &sm.invokables {
            if descriptors.contains_key(name) || name == CONFIG_SERVICE {
                return Err(match descriptors.get(name) {
                    Some(ServiceDescriptor::ApplicationFactory(_)) => ConfigError::DuplicateService(name.clone()),
                    _ => ConfigError::ReservedService(name.clone()),
                });
            }
            let invokable = catalog.get_invokable(path).ok_or_else(|| ConfigError::UnknownPath {
                kind: "invokable",
                name: name.clone(),
                path: path.clone(),
            })?;
            invokables.insert(path.clone(), Arc::clone(invokable));
            descriptors.insert(name.clone(), ServiceDescriptor::Invokable(path.clone()));
        }

        tracing::debug!(
            services = descriptors.len(),
            aliases = sm.aliases.len(),
            "service container built"
        );
        Ok(ServiceContainer {
            aliases: sm.aliases.clone().into_iter().collect(),
            config,
            descriptors,
            factories,
            invokables,
            cache: RwLock::new(HashMap::new()),
            routes,
            plugins,
            helpers,
        })
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn plugin_catalog(&self) -> &Arc<PluginCatalog> {
        &self.plugins
    }

    pub fn helper_catalog(&self) -> &Arc<HelperCatalog> {
        &self.helpers
    }

    /// Unscoped view: singletons only.
    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            container: Arc::clone(self),
            scope: None,
        }
    }

    /// View bound to one dispatch; request-scoped services become available.
    pub fn scoped(self: &Arc<Self>, scope: Arc<DispatchContext>) -> Services {
        Services {
            container: Arc::clone(self),
            scope: Some(scope),
        }
    }

    pub fn get(self: &Arc<Self>, name: &str) -> Result<ServiceInstance, ServiceError> {
        self.resolve(name, None)
    }

    pub fn has(&self, name: &str) -> bool {
        let name = self.canonical(name);
        name == CONFIG_SERVICE || self.descriptors.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.descriptors.get(self.canonical(name))
    }

    /// Names currently holding a built singleton.
    pub fn cached_names(&self) -> Vec<String> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = cache
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Drop every cached singleton; the next `get` rebuilds.
    pub fn clear_cache(&self) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
        tracing::debug!("service cache cleared");
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        let mut cur = name;
        // validator rejects cycles; the bound only guards hand-built configs
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(cur) {
                Some(next) => cur = next,
                None => return cur,
            }
        }
        cur
    }

    fn resolve(
        self: &Arc<Self>,
        name: &str,
        scope: Option<&Arc<DispatchContext>>,
    ) -> Result<ServiceInstance, ServiceError> {
        let name = self.canonical(name);
        if name == CONFIG_SERVICE {
            return Ok(Arc::clone(&self.config) as ServiceInstance);
        }
        let descriptor = self
            .descriptors
            .get(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        if !is_cacheable(name) {
            tracing::debug!(service = name, "building request-scoped service");
            return self.construct(name, descriptor, scope.cloned());
        }

        let cell = self.cell(name);
        // Singletons never see the request that happened to build them.
        let instance = cell.get_or_try_init(|| {
            tracing::debug!(service = name, "building shared service");
            self.construct(name, descriptor, None)
        })?;
        Ok(Arc::clone(instance))
    }

    fn cell(&self, name: &str) -> Arc<OnceCell<ServiceInstance>> {
        if let Some(cell) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Arc::clone(cell);
        }
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cache.entry(name.to_string()).or_default())
    }

    fn construct(
        self: &Arc<Self>,
        name: &str,
        descriptor: &ServiceDescriptor,
        scope: Option<Arc<DispatchContext>>,
    ) -> Result<ServiceInstance, ServiceError> {
        match descriptor {
            ServiceDescriptor::FrameworkFactory(path) | ServiceDescriptor::ApplicationFactory(path) => {
                let factory = self
                    .factories
                    .get(path)
                    .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
                factory
                    .validate_config(&self.config)
                    .map_err(|reason| ServiceError::InvalidConfiguration {
                        name: name.to_string(),
                        reason,
                    })?;
                let services = Services {
                    container: Arc::clone(self),
                    scope,
                };
                factory.create_service(&services)
            }
            ServiceDescriptor::Invokable(path) => {
                let build = self
                    .invokables
                    .get(path)
                    .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
                Ok(build())
            }
        }
    }
}

/// Container view handed to factories, controllers and plugins.
#[derive(Clone)]
pub struct Services {
    container: Arc<ServiceContainer>,
    scope: Option<Arc<DispatchContext>>,
}

impl Services {
    pub fn get(&self, name: &str) -> Result<ServiceInstance, ServiceError> {
        self.container.resolve(name, self.scope.as_ref())
    }

    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ServiceError> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| ServiceError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.container.has(name)
    }

    pub fn config(&self) -> &AppConfig {
        &self.container.config
    }

    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    /// The dispatch this view is bound to; `service` names the caller for the error.
    pub fn request_scope(&self, service: &str) -> Result<&Arc<DispatchContext>, ServiceError> {
        self.scope
            .as_ref()
            .ok_or_else(|| ServiceError::RequestScopeRequired(service.to_string()))
    }
}
