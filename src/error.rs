//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Boot-time configuration errors. Raised while the application is assembled, never per request.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("duplicate route name: {0}")]
    DuplicateRoute(String),
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("service '{0}' is reserved by the framework and cannot be redeclared")]
    ReservedService(String),
    #[error("service '{0}' is declared both as factory and invokable")]
    DuplicateService(String),
    #[error("unknown {kind} path '{path}' for '{name}'")]
    UnknownPath {
        kind: &'static str,
        name: String,
        path: String,
    },
    #[error("alias '{alias}' points to unknown service '{target}'")]
    DanglingAlias { alias: String, target: String },
    #[error("{kind} '{name}' collides with a framework {kind}")]
    Collision { kind: &'static str, name: String },
    #[error("route '{route}' targets unregistered controller '{controller}'")]
    UnregisteredController { route: String, controller: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown route: {0}")]
    UnknownRoute(String),
    #[error("route '{route}' requires parameter '{param}'")]
    MissingParameter { route: String, param: String },
}

/// Failures while resolving a named service.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("service not found: {0}")]
    NotFound(String),
    #[error("service '{name}' failed configuration validation: {reason}")]
    InvalidConfiguration { name: String, reason: String },
    #[error("service '{0}' is request-scoped and needs an active dispatch")]
    RequestScopeRequired(String),
    #[error("service '{name}' could not be constructed: {reason}")]
    Construction { name: String, reason: String },
    #[error("service '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ServiceError {
    /// A factory could not build `name`; `reason` says why.
    pub fn construction(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ServiceError::Construction {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cannot bind {kind}: dispatch has not resolved a controller")]
    NotAController { kind: &'static str },
    #[error("view helper '{name}': {reason}")]
    Helper { name: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session store: {0}")]
    Store(String),
    #[error("session key '{0}' is reserved")]
    ReservedKey(String),
    #[error("session {0} has been destroyed")]
    Destroyed(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("template {path}: {reason}")]
    Template { path: String, reason: String },
    #[error("template io: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can go wrong between controller resolution and a rendered response.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("request exceeded its deadline of {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Failed(String),
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ActionError {
    pub fn msg(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ActionError::Source {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Messages of this error and every source below it, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut out = vec![self.to_string()];
        let mut cur = std::error::Error::source(self);
        while let Some(err) = cur {
            out.push(err.to_string());
            cur = err.source();
        }
        out
    }
}

/// Errors raised by the HTTP adapter before a request reaches the dispatcher.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_walks_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ActionError::with_source("loading post", io);
        assert_eq!(err.chain(), vec!["loading post".to_string(), "disk gone".to_string()]);
    }
}
