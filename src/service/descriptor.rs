//! Service descriptors and the catalog of implementations config paths resolve to.

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::service::Services;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A constructed service. Callers downcast with [`Services::get_as`].
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Zero-argument constructor for an invokable service.
pub type Invokable = Arc<dyn Fn() -> ServiceInstance + Send + Sync>;

/// How one named service is built. The payload is the implementation path from config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceDescriptor {
    FrameworkFactory(String),
    ApplicationFactory(String),
    Invokable(String),
}

impl ServiceDescriptor {
    pub fn path(&self) -> &str {
        match self {
            ServiceDescriptor::FrameworkFactory(p)
            | ServiceDescriptor::ApplicationFactory(p)
            | ServiceDescriptor::Invokable(p) => p,
        }
    }
}

/// Builder for a factory-backed service.
pub trait ServiceFactory: Send + Sync {
    /// Runs before every construction. Err carries the reason.
    fn validate_config(&self, _config: &AppConfig) -> Result<(), String> {
        Ok(())
    }

    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError>;
}

impl<F> ServiceFactory for F
where
    F: Fn(&Services) -> Result<ServiceInstance, ServiceError> + Send + Sync,
{
    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError> {
        self(services)
    }
}

/// Implementations the application makes available, keyed by the path config refers to.
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    factories: HashMap<String, Arc<dyn ServiceFactory>>,
    invokables: HashMap<String, Invokable>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&mut self, path: impl Into<String>, factory: impl ServiceFactory + 'static) -> &mut Self {
        self.factories.insert(path.into(), Arc::new(factory));
        self
    }

    /// Invokable built with `T::default()`.
    pub fn invokable<T>(&mut self, path: impl Into<String>) -> &mut Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.invokables
            .insert(path.into(), Arc::new(|| Arc::new(T::default()) as ServiceInstance));
        self
    }

    pub fn invokable_with<F>(&mut self, path: impl Into<String>, build: F) -> &mut Self
    where
        F: Fn() -> ServiceInstance + Send + Sync + 'static,
    {
        self.invokables.insert(path.into(), Arc::new(build));
        self
    }

    pub fn get_factory(&self, path: &str) -> Option<&Arc<dyn ServiceFactory>> {
        self.factories.get(path)
    }

    pub fn get_invokable(&self, path: &str) -> Option<&Invokable> {
        self.invokables.get(path)
    }
}
