use crate::dispatch::DispatchContext;
use crate::error::SessionError;
use crate::plugins::ControllerPlugin;
use crate::session::SECURITY_NAMESPACE;
use serde_json::Value;
use std::sync::Arc;

pub const TOKEN_KEY: &str = "csrf_token";
pub const FORM_FIELD: &str = "csrf";
pub const HEADER: &str = "x-csrf-token";

/// Per-session anti-forgery token kept in the `security` namespace.
pub struct Csrf {
    ctx: Arc<DispatchContext>,
}

impl ControllerPlugin for Csrf {}

impl Csrf {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Csrf { ctx }
    }

    /// The session token, generated on first use.
    pub fn token(&self) -> Result<String, SessionError> {
        token(&self.ctx)
    }

    pub fn validate(&self, candidate: &str) -> bool {
        match self.ctx.session().lookup(SECURITY_NAMESPACE, TOKEN_KEY) {
            Some(Value::String(expected)) => constant_time_eq(expected.as_bytes(), candidate.as_bytes()),
            _ => false,
        }
    }

    /// Checks the posted `csrf` field, falling back to the `X-CSRF-Token` header.
    pub fn validate_request(&self) -> bool {
        let request = self.ctx.request();
        let candidate = request
            .post_str(FORM_FIELD)
            .or_else(|| request.header(HEADER));
        match candidate {
            Some(c) => self.validate(c),
            None => {
                tracing::debug!(path = request.path(), "csrf token missing from request");
                false
            }
        }
    }
}

pub(crate) fn token(ctx: &DispatchContext) -> Result<String, SessionError> {
    if let Some(Value::String(existing)) = ctx.session().lookup(SECURITY_NAMESPACE, TOKEN_KEY) {
        return Ok(existing);
    }
    let fresh = uuid::Uuid::new_v4().simple().to_string();
    ctx.session()
        .set(SECURITY_NAMESPACE, TOKEN_KEY, Value::String(fresh.clone()))?;
    Ok(fresh)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TransportRequest;
    use crate::plugins::test_support::dispatch;
    use crate::routing::RouteTable;
    use serde_json::json;

    #[test]
    fn token_is_stable_within_a_session() {
        let csrf = Csrf::new(dispatch(TransportRequest::get("/"), RouteTable::default()));
        let first = csrf.token().unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(csrf.token().unwrap(), first);
        assert!(csrf.validate(&first));
        assert!(!csrf.validate("forged"));
    }

    #[test]
    fn request_validation_reads_field_then_header() {
        let ctx = dispatch(TransportRequest::post("/admin/login", json!({"csrf": "x"})), RouteTable::default());
        let csrf = Csrf::new(ctx.clone());
        assert!(!csrf.validate_request());
        ctx.session()
            .set(SECURITY_NAMESPACE, TOKEN_KEY, json!("x"))
            .unwrap();
        assert!(csrf.validate_request());

        let ctx = dispatch(
            TransportRequest::post("/admin/login", json!({})).with_header(
                axum::http::HeaderName::from_static(HEADER),
                axum::http::HeaderValue::from_static("y"),
            ),
            RouteTable::default(),
        );
        ctx.session().set(SECURITY_NAMESPACE, TOKEN_KEY, json!("y")).unwrap();
        assert!(Csrf::new(ctx).validate_request());
    }
}
