//! Controller plugins: per-dispatch helpers a controller reaches through its
//! [`PluginManager`](crate::plugins::PluginManager).

pub mod csrf;
pub mod flash;
pub mod identity;
pub mod params;
pub mod redirect;

pub use csrf::Csrf;
pub use flash::FlashMessenger;
pub use identity::Identity;
pub use params::Params;
pub use redirect::Redirect;

use crate::dispatch::DispatchContext;
use crate::registry::{Catalog, CollisionPolicy, Constructor, Managed, Registry};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Upcast to `Any` so typed lookups can downcast a shared plugin.
pub trait AsAny {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub trait ControllerPlugin: AsAny + Send + Sync + 'static {}

pub type PluginCatalog = Catalog<dyn ControllerPlugin>;
pub type PluginManager = Registry<dyn ControllerPlugin>;

fn redirect(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ControllerPlugin> {
    Box::new(Redirect::new(ctx))
}

fn params(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ControllerPlugin> {
    Box::new(Params::new(ctx))
}

fn flash_messenger(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ControllerPlugin> {
    Box::new(FlashMessenger::new(ctx))
}

fn identity(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ControllerPlugin> {
    Box::new(Identity::new(ctx))
}

fn csrf(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ControllerPlugin> {
    Box::new(Csrf::new(ctx))
}

impl Managed for dyn ControllerPlugin {
    const KIND: &'static str = "controller plugin";
    const POLICY: CollisionPolicy = CollisionPolicy::Warn;

    fn framework() -> Vec<(&'static str, &'static str, Constructor<Self>)> {
        vec![
            ("redirect", "Folio/Mvc/Plugin/Redirect", Arc::new(redirect) as Constructor<Self>),
            ("params", "Folio/Mvc/Plugin/Params", Arc::new(params) as Constructor<Self>),
            ("flashMessenger", "Folio/Mvc/Plugin/FlashMessenger", Arc::new(flash_messenger) as Constructor<Self>),
            ("identity", "Folio/Mvc/Plugin/Identity", Arc::new(identity) as Constructor<Self>),
            ("csrf", "Folio/Mvc/Plugin/Csrf", Arc::new(csrf) as Constructor<Self>),
        ]
    }
}

impl Registry<dyn ControllerPlugin> {
    /// Typed lookup with default options. `None` when unknown or of another type.
    pub fn plugin<P: ControllerPlugin>(&self, name: &str) -> Option<Arc<P>> {
        let found = self.get(name, &Value::Null)?;
        match AsAny::into_any(found).downcast::<P>() {
            Ok(plugin) => Some(plugin),
            Err(_) => {
                tracing::warn!(
                    name,
                    expected = std::any::type_name::<P>(),
                    "controller plugin has another type"
                );
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TransportRequest;
    use crate::routing::RouteTable;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn typed_lookup_downcasts_framework_plugins() {
        let catalog = Arc::new(PluginCatalog::merge(&BTreeMap::new(), &HashMap::new()).unwrap());
        let ctx = test_support::dispatch(TransportRequest::get("/"), RouteTable::default());
        let manager = PluginManager::bind(catalog, ctx).unwrap();
        assert!(manager.plugin::<Redirect>("redirect").is_some());
        assert!(manager.plugin::<Params>("redirect").is_none());
        assert!(manager.plugin::<Csrf>("nope").is_none());
    }
}
