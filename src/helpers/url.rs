use crate::dispatch::DispatchContext;
use crate::error::RegistryError;
use crate::helpers::{helper_error, ViewHelper};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// `url(name, params?)`: path of a named route. With no name, the current path.
pub struct Url {
    ctx: Arc<DispatchContext>,
}

impl Url {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Url { ctx }
    }
}

impl ViewHelper for Url {
    fn call(&self, args: &[Value]) -> Result<Value, RegistryError> {
        let Some(name) = args.first().and_then(Value::as_str) else {
            return Ok(Value::String(self.ctx.request().path().to_string()));
        };
        let params: HashMap<String, String> = match args.get(1) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((k.clone(), v))
                })
                .collect(),
            _ => HashMap::new(),
        };
        self.ctx
            .routes()
            .assemble(name, &params)
            .map(Value::String)
            .map_err(|e| helper_error("url", e))
    }
}
