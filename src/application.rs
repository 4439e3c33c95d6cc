//! Boot-time assembly: config validation, route table, registries, service container and
//! controller registry, checked together before the first request.

use crate::config::{self, AppConfig};
use crate::controller::{self, Controller, ControllerFactory, ControllerRegistry};
use crate::dispatch::DispatchContext;
use crate::dispatch::Dispatcher;
use crate::error::{ConfigError, ServiceError};
use crate::helpers::{HelperCatalog, ViewHelper};
use crate::plugins::{ControllerPlugin, PluginCatalog};
use crate::registry::Constructor;
use crate::routing::table::NOT_FOUND_MODULE;
use crate::routing::RouteTable;
use crate::service::{ServiceCatalog, ServiceContainer, ServiceFactory, ServiceInstance, Services};
use crate::view::{MiniJinjaRenderer, TemplateResolver, ViewRenderer};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Application;

impl Application {
    pub fn builder(config: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder {
            controllers: ControllerRegistry::new(config.dispatcher.controller_delimiter.clone()),
            config,
            services: ServiceCatalog::new(),
            plugins: HashMap::new(),
            helpers: HashMap::new(),
            renderer: Arc::new(MiniJinjaRenderer),
            view_root: None,
        }
    }
}

pub struct ApplicationBuilder {
    config: AppConfig,
    services: ServiceCatalog,
    controllers: ControllerRegistry,
    plugins: HashMap<String, Constructor<dyn ControllerPlugin>>,
    helpers: HashMap<String, Constructor<dyn ViewHelper>>,
    renderer: Arc<dyn ViewRenderer>,
    view_root: Option<PathBuf>,
}

impl ApplicationBuilder {
    /// Make a factory available under `path` for `service_manager.factories`.
    pub fn service_factory(mut self, path: &str, factory: impl ServiceFactory + 'static) -> Self {
        self.services.factory(path, factory);
        self
    }

    /// Make `T::default()` available under `path` for `service_manager.invokables`.
    pub fn invokable<T: Default + Send + Sync + 'static>(mut self, path: &str) -> Self {
        self.services.invokable::<T>(path);
        self
    }

    pub fn invokable_with<F>(mut self, path: &str, build: F) -> Self
    where
        F: Fn() -> ServiceInstance + Send + Sync + 'static,
    {
        self.services.invokable_with(path, build);
        self
    }

    pub fn controller<C, F>(mut self, module: &str, controller: &str, build: F) -> Self
    where
        C: Controller + 'static,
        F: Fn(&Services) -> Result<C, ServiceError> + Send + Sync + 'static,
    {
        self.controllers.register(module, controller, controller::factory(build));
        self
    }

    pub fn controller_factory(mut self, module: &str, controller: &str, factory: ControllerFactory) -> Self {
        self.controllers.register(module, controller, factory);
        self
    }

    /// Make a plugin available under `path` for `controller_plugins.invokables`.
    pub fn plugin<P, F>(mut self, path: &str, build: F) -> Self
    where
        P: ControllerPlugin,
        F: Fn(Arc<DispatchContext>, &Value) -> P + Send + Sync + 'static,
    {
        let ctor: Constructor<dyn ControllerPlugin> =
            Arc::new(move |ctx: Arc<DispatchContext>, options: &Value| -> Box<dyn ControllerPlugin> {
                Box::new(build(ctx, options))
            });
        self.plugins.insert(path.to_string(), ctor);
        self
    }

    /// Make a helper available under `path` for `view_helpers.invokables`.
    pub fn helper<H, F>(mut self, path: &str, build: F) -> Self
    where
        H: ViewHelper,
        F: Fn(Arc<DispatchContext>, &Value) -> H + Send + Sync + 'static,
    {
        let ctor: Constructor<dyn ViewHelper> =
            Arc::new(move |ctx: Arc<DispatchContext>, options: &Value| -> Box<dyn ViewHelper> {
                Box::new(build(ctx, options))
            });
        self.helpers.insert(path.to_string(), ctor);
        self
    }

    pub fn renderer(mut self, renderer: impl ViewRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Directory relative template paths resolve against. Defaults to the working directory.
    pub fn view_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.view_root = Some(root.into());
        self
    }

    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        config::validate(&self.config)?;
        let routes = Arc::new(RouteTable::from_config(&self.config.routes)?);

        for entry in routes.entries() {
            if entry.module == NOT_FOUND_MODULE || entry.pattern.has_param("controller") {
                continue;
            }
            let key = self.controllers.key(&entry.module, &entry.controller);
            if !self.controllers.contains(&key) {
                return Err(ConfigError::UnregisteredController {
                    route: entry.name.clone(),
                    controller: key,
                });
            }
        }

        let plugins = PluginCatalog::merge(&self.config.controller_plugins.invokables, &self.plugins)?;
        let helpers = HelperCatalog::merge(&self.config.view_helpers.invokables, &self.helpers)?;

        if self.config.session.process_mirror {
            tracing::warn!(
                "session.process_mirror is enabled: one mirror tier is shared by all requests; \
                 concurrent requests can observe each other's session data"
            );
        }

        let mut resolver = TemplateResolver::new(&self.config.view_manager);
        if let Some(root) = &self.view_root {
            resolver = resolver.rooted(root);
        }

        let config = Arc::new(self.config);
        let container = Arc::new(ServiceContainer::build(
            Arc::clone(&config),
            &self.services,
            Arc::clone(&routes),
            Arc::new(plugins),
            Arc::new(helpers),
        )?);

        tracing::info!(
            routes = routes.len(),
            controllers = self.controllers.keys().len(),
            environment = ?config.environment,
            "application assembled"
        );
        Ok(Dispatcher::new(config, container, self.controllers, resolver, self.renderer))
    }
}
