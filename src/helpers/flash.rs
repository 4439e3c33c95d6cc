use crate::dispatch::DispatchContext;
use crate::error::RegistryError;
use crate::helpers::{helper_error, ViewHelper};
use crate::plugins::flash;
use crate::session::FLASH_NAMESPACE;
use serde_json::{Map, Value};
use std::sync::Arc;

/// `flashMessenger(level?)`: drains queued messages. Without a level, every level as an object.
pub struct FlashMessages {
    ctx: Arc<DispatchContext>,
}

impl FlashMessages {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        FlashMessages { ctx }
    }
}

impl ViewHelper for FlashMessages {
    fn call(&self, args: &[Value]) -> Result<Value, RegistryError> {
        if let Some(level) = args.first().and_then(Value::as_str) {
            let drained = flash::take(&self.ctx, level).map_err(|e| helper_error("flashMessenger", e))?;
            return Ok(Value::from(drained));
        }
        let mut all = Map::new();
        for level in self.ctx.session().all(FLASH_NAMESPACE).keys() {
            let drained = flash::take(&self.ctx, level).map_err(|e| helper_error("flashMessenger", e))?;
            all.insert(level.clone(), Value::from(drained));
        }
        Ok(Value::Object(all))
    }
}
