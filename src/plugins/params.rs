use crate::dispatch::DispatchContext;
use crate::plugins::ControllerPlugin;
use serde_json::Value;
use std::sync::Arc;

/// Uniform access to route, query, post and header values.
pub struct Params {
    ctx: Arc<DispatchContext>,
}

impl ControllerPlugin for Params {}

impl Params {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Params { ctx }
    }

    pub fn from_route(&self, name: &str) -> Option<String> {
        self.ctx.request().param(name).map(str::to_string)
    }

    pub fn from_route_or(&self, name: &str, default: &str) -> String {
        self.from_route(name).unwrap_or_else(|| default.to_string())
    }

    pub fn from_query(&self, name: &str) -> Option<String> {
        self.ctx.request().query(name).map(str::to_string)
    }

    pub fn from_post(&self, name: &str) -> Option<Value> {
        self.ctx.request().post(name).cloned()
    }

    pub fn from_header(&self, name: &str) -> Option<String> {
        self.ctx.request().header(name).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_json_str;
    use crate::dispatch::TransportRequest;
    use crate::plugins::test_support::dispatch;
    use crate::routing::RouteTable;
    use serde_json::json;

    #[test]
    fn reads_every_source() {
        let config = from_json_str(
            r#"{"routes": [{"name": "blogIndex", "route": "/blog(/page/:page)?", "module": "blog",
                "controller": "index", "defaults": {"page": "1"}}]}"#,
        )
        .unwrap();
        let routes = RouteTable::from_config(&config.routes).unwrap();
        let request = TransportRequest::post("/blog/page/3", json!({"title": "Hi"}))
            .with_query("q", "rust")
            .with_header(
                axum::http::header::ACCEPT,
                axum::http::HeaderValue::from_static("text/html"),
            );
        let params = Params::new(dispatch(request, routes));
        assert_eq!(params.from_route("page").as_deref(), Some("3"));
        assert_eq!(params.from_route_or("missing", "x"), "x");
        assert_eq!(params.from_query("q").as_deref(), Some("rust"));
        assert_eq!(params.from_post("title"), Some(json!("Hi")));
        assert_eq!(params.from_header("accept").as_deref(), Some("text/html"));
    }
}
