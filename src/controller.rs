//! Controllers and the boot-time registry that constructs them.

use crate::case;
use crate::dispatch::ActionContext;
use crate::error::{ActionError, ServiceError};
use crate::service::Services;
use crate::view::ViewModel;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// What an action produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionResult {
    View(ViewModel),
    /// The redirect plugin recorded a location on the dispatch context.
    Redirect,
}

impl From<ViewModel> for ActionResult {
    fn from(view: ViewModel) -> Self {
        ActionResult::View(view)
    }
}

/// A controller for one module/controller pair. Actions are named in camel case
/// (`view-post` in a route becomes `viewPost`).
#[async_trait]
pub trait Controller: Send {
    fn has_action(&self, action: &str) -> bool;

    /// Runs before the action. A redirect recorded here skips the action.
    async fn pre_dispatch(&mut self, _ctx: &ActionContext) -> Result<(), ActionError> {
        Ok(())
    }

    async fn dispatch_action(&mut self, action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError>;

    async fn post_dispatch(&mut self, _ctx: &ActionContext, _result: &mut ActionResult) -> Result<(), ActionError> {
        Ok(())
    }
}

pub type ControllerFactory = Arc<dyn Fn(&Services) -> Result<Box<dyn Controller>, ServiceError> + Send + Sync>;

/// Wrap a constructor closure, boxing the controller it returns.
pub fn factory<C, F>(build: F) -> ControllerFactory
where
    C: Controller + 'static,
    F: Fn(&Services) -> Result<C, ServiceError> + Send + Sync + 'static,
{
    Arc::new(move |services: &Services| -> Result<Box<dyn Controller>, ServiceError> {
        let controller: Box<dyn Controller> = Box::new(build(services)?);
        Ok(controller)
    })
}

/// Controllers keyed by [`case::controller_key`].
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    delimiter: String,
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn new(delimiter: impl Into<String>) -> Self {
        ControllerRegistry {
            delimiter: delimiter.into(),
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, module: &str, controller: &str, factory: ControllerFactory) -> &mut Self {
        let key = self.key(module, controller);
        if self.factories.insert(key.clone(), factory).is_some() {
            tracing::warn!(controller = %key, "controller registered twice; last registration wins");
        }
        self
    }

    pub fn key(&self, module: &str, controller: &str) -> String {
        case::controller_key(module, controller, &self.delimiter)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn factory(&self, key: &str) -> Option<&ControllerFactory> {
        self.factories.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Handles the synthesized not-found route and missing actions.
#[derive(Debug, Default)]
pub struct ErrorController;

#[async_trait]
impl Controller for ErrorController {
    fn has_action(&self, action: &str) -> bool {
        action == "notFound"
    }

    async fn dispatch_action(&mut self, _action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        ctx.mark_not_found();
        Ok(not_found_view(ctx.request().path()).into())
    }
}

pub(crate) fn not_found_view(path: &str) -> ViewModel {
    ViewModel::new()
        .with("path", path)
        .with("message", "Page not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_keys_follow_naming_convention() {
        let mut registry = ControllerRegistry::new("/");
        let factory = super::factory(|_| Ok(ErrorController));
        registry.register("admin", "dashboard", factory.clone());
        registry.register("blog", "IndexController", factory);
        assert_eq!(registry.keys(), vec!["Admin/DashboardController", "Blog/IndexController"]);
        assert!(registry.contains(&registry.key("blog", "index")));
    }
}
