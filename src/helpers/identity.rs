use crate::auth::AuthenticationService;
use crate::dispatch::DispatchContext;
use crate::error::RegistryError;
use crate::helpers::ViewHelper;
use serde_json::Value;
use std::sync::Arc;

/// `identity()`: the logged-in identity or null.
pub struct IdentityHelper {
    auth: AuthenticationService,
}

impl IdentityHelper {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        IdentityHelper {
            auth: AuthenticationService::new(ctx),
        }
    }
}

impl ViewHelper for IdentityHelper {
    fn call(&self, _args: &[Value]) -> Result<Value, RegistryError> {
        Ok(self.auth.identity().unwrap_or(Value::Null))
    }
}
