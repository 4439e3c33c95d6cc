use crate::controller::ActionResult;
use crate::dispatch::DispatchContext;
use crate::error::RouteError;
use crate::plugins::ControllerPlugin;
use std::collections::HashMap;
use std::sync::Arc;

/// Marks the dispatch as a redirect. The dispatcher emits `Location` and skips rendering.
pub struct Redirect {
    ctx: Arc<DispatchContext>,
}

impl ControllerPlugin for Redirect {}

impl Redirect {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Redirect { ctx }
    }

    /// Redirect to a named route.
    pub fn to_route(&self, name: &str, params: &[(&str, &str)]) -> Result<ActionResult, RouteError> {
        let params: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let url = self.ctx.routes().assemble(name, &params)?;
        Ok(self.to_url(url))
    }

    pub fn to_url(&self, url: impl Into<String>) -> ActionResult {
        let url = url.into();
        tracing::debug!(location = %url, "redirect requested");
        self.ctx.redirect_to(url);
        ActionResult::Redirect
    }

    /// Redirect back to the current path.
    pub fn refresh(&self) -> ActionResult {
        let path = self.ctx.request().path().to_string();
        self.to_url(path)
    }
}
