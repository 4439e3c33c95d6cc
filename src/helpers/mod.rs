//! View helpers: functions templates call by name, resolved per dispatch through the
//! [`HelperManager`](crate::helpers::HelperManager).

pub mod csrf;
pub mod flash;
pub mod identity;
pub mod url;

use crate::dispatch::DispatchContext;
use crate::error::RegistryError;
use crate::registry::{Catalog, CollisionPolicy, Constructor, Managed, Registry};
use serde_json::Value;
use std::sync::Arc;

pub trait ViewHelper: Send + Sync + 'static {
    fn call(&self, args: &[Value]) -> Result<Value, RegistryError>;
}

pub type HelperCatalog = Catalog<dyn ViewHelper>;
pub type HelperManager = Registry<dyn ViewHelper>;

fn url(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ViewHelper> {
    Box::new(self::url::Url::new(ctx))
}

fn flash_messenger(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ViewHelper> {
    Box::new(flash::FlashMessages::new(ctx))
}

fn identity(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ViewHelper> {
    Box::new(identity::IdentityHelper::new(ctx))
}

fn csrf_token(ctx: Arc<DispatchContext>, _: &Value) -> Box<dyn ViewHelper> {
    Box::new(csrf::CsrfToken::new(ctx))
}

impl Managed for dyn ViewHelper {
    const KIND: &'static str = "view helper";
    const POLICY: CollisionPolicy = CollisionPolicy::Reject;

    fn framework() -> Vec<(&'static str, &'static str, Constructor<Self>)> {
        vec![
            ("url", "Folio/View/Helper/Url", Arc::new(url) as Constructor<Self>),
            ("flashMessenger", "Folio/View/Helper/FlashMessenger", Arc::new(flash_messenger) as Constructor<Self>),
            ("identity", "Folio/View/Helper/Identity", Arc::new(identity) as Constructor<Self>),
            ("csrfToken", "Folio/View/Helper/CsrfToken", Arc::new(csrf_token) as Constructor<Self>),
        ]
    }
}

impl Registry<dyn ViewHelper> {
    /// Invoke a helper. Unknown helpers render as null so a template never fails on them.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RegistryError> {
        match self.get(name, &Value::Null) {
            Some(helper) => helper.call(args),
            None => Ok(Value::Null),
        }
    }
}

pub(crate) fn helper_error(name: &str, reason: impl ToString) -> RegistryError {
    RegistryError::Helper {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
