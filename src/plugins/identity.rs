use crate::auth::AuthenticationService;
use crate::dispatch::DispatchContext;
use crate::plugins::ControllerPlugin;
use serde_json::Value;
use std::sync::Arc;

/// Current identity, as the authentication service sees it for this request.
pub struct Identity {
    auth: AuthenticationService,
}

impl ControllerPlugin for Identity {}

impl Identity {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Identity {
            auth: AuthenticationService::new(ctx),
        }
    }

    pub fn get(&self) -> Option<Value> {
        self.auth.identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.has_identity()
    }

    pub fn service(&self) -> &AuthenticationService {
        &self.auth
    }
}
