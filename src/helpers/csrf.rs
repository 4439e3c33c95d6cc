use crate::dispatch::DispatchContext;
use crate::error::RegistryError;
use crate::helpers::{helper_error, ViewHelper};
use crate::plugins::csrf;
use serde_json::Value;
use std::sync::Arc;

pub struct CsrfToken {
    ctx: Arc<DispatchContext>,
}

impl CsrfToken {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        CsrfToken { ctx }
    }
}

impl ViewHelper for CsrfToken {
    fn call(&self, _args: &[Value]) -> Result<Value, RegistryError> {
        csrf::token(&self.ctx)
            .map(Value::String)
            .map_err(|e| helper_error("csrfToken", e))
    }
}
