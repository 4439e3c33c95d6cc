use crate::dispatch::DispatchContext;
use crate::error::SessionError;
use crate::plugins::ControllerPlugin;
use crate::session::FLASH_NAMESPACE;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT: &str = "default";
pub const SUCCESS: &str = "success";
pub const ERROR: &str = "error";
pub const INFO: &str = "info";
pub const WARNING: &str = "warning";

/// Messages queued for the next request, one list per level, in the `FlashMessenger`
/// session namespace.
pub struct FlashMessenger {
    ctx: Arc<DispatchContext>,
}

impl ControllerPlugin for FlashMessenger {}

impl FlashMessenger {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        FlashMessenger { ctx }
    }

    pub fn add(&self, level: &str, message: impl Into<String>) -> Result<(), SessionError> {
        let mut queued = self.messages(level);
        queued.push(message.into());
        self.ctx
            .session()
            .set(FLASH_NAMESPACE, level, Value::from(queued))
    }

    pub fn success(&self, message: impl Into<String>) -> Result<(), SessionError> {
        self.add(SUCCESS, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Result<(), SessionError> {
        self.add(ERROR, message)
    }

    pub fn info(&self, message: impl Into<String>) -> Result<(), SessionError> {
        self.add(INFO, message)
    }

    pub fn has(&self, level: &str) -> bool {
        !self.messages(level).is_empty()
    }

    /// Queued messages, left in place.
    pub fn messages(&self, level: &str) -> Vec<String> {
        peek(&self.ctx, level)
    }

    /// Queued messages, removed from the session.
    pub fn take(&self, level: &str) -> Result<Vec<String>, SessionError> {
        take(&self.ctx, level)
    }
}

pub(crate) fn peek(ctx: &DispatchContext, level: &str) -> Vec<String> {
    match ctx.session().lookup(FLASH_NAMESPACE, level) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn take(ctx: &DispatchContext, level: &str) -> Result<Vec<String>, SessionError> {
    let messages = peek(ctx, level);
    if !messages.is_empty() {
        ctx.session().remove(FLASH_NAMESPACE, level)?;
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TransportRequest;
    use crate::plugins::test_support::dispatch;
    use crate::routing::RouteTable;

    #[test]
    fn messages_queue_per_level_and_drain_once() {
        let ctx = dispatch(TransportRequest::get("/"), RouteTable::default());
        let flash = FlashMessenger::new(ctx.clone());
        flash.success("Saved").unwrap();
        flash.success("Published").unwrap();
        flash.error("Oops").unwrap();

        assert!(flash.has(SUCCESS));
        assert!(!flash.has(INFO));
        assert_eq!(flash.messages(SUCCESS), vec!["Saved", "Published"]);
        assert_eq!(flash.take(SUCCESS).unwrap(), vec!["Saved", "Published"]);
        assert!(flash.take(SUCCESS).unwrap().is_empty());
        assert_eq!(flash.messages(ERROR), vec!["Oops"]);

        let stored = ctx.session().transport().unwrap().get(FLASH_NAMESPACE).unwrap();
        assert!(stored.get(SUCCESS).is_none());
    }
}
