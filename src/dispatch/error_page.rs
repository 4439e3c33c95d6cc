//! 404/500 pages: configured template, conventional template, then an inline body.

use crate::config::ViewManagerConfig;
use crate::error::ActionError;
use crate::view::{TemplateResolver, ViewModel};
use axum::http::StatusCode;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Exception,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Exception => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn configured(self, config: &ViewManagerConfig) -> &str {
        match self {
            ErrorKind::NotFound => &config.not_found_template,
            ErrorKind::Exception => &config.exception_template,
        }
    }

    fn conventional(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "error/404",
            ErrorKind::Exception => "error/index",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Page not found",
            ErrorKind::Exception => "An error occurred",
        }
    }
}

/// Template file for an error page, if any exists.
pub(crate) fn resolve_template(
    kind: ErrorKind,
    config: &ViewManagerConfig,
    resolver: &TemplateResolver,
) -> Option<PathBuf> {
    let configured = kind.configured(config);
    resolver.resolve(configured).or_else(|| {
        if configured != kind.conventional() {
            tracing::debug!(template = configured, "configured error template missing; trying conventional path");
            resolver.resolve(kind.conventional())
        } else {
            None
        }
    })
}

/// Variables for the 500 page. Error detail only when `expose` is set.
pub(crate) fn exception_view(path: &str, err: &ActionError, expose: bool) -> ViewModel {
    let mut view = ViewModel::new()
        .with("message", ErrorKind::Exception.title())
        .with("path", path)
        .with("display_exceptions", expose);
    if expose {
        view.set_variable("exception", err.to_string());
        view.set_variable("chain", Value::from(err.chain()));
    }
    view
}

/// Minimal page used when no error template can be rendered.
pub(crate) fn inline_body(kind: ErrorKind, view: &ViewModel) -> String {
    let mut body = format!(
        "<!DOCTYPE html>\n<html><head><title>{code} {title}</title></head><body>\n<h1>{code} {title}</h1>\n",
        code = kind.status().as_u16(),
        title = kind.title()
    );
    if let Some(path) = view.variable("path").and_then(Value::as_str) {
        body.push_str(&format!("<p>{}</p>\n", escape(path)));
    }
    if let Some(Value::Array(chain)) = view.variable("chain") {
        body.push_str("<pre>");
        for line in chain.iter().filter_map(Value::as_str) {
            body.push_str(&escape(line));
            body.push('\n');
        }
        body.push_str("</pre>\n");
    }
    body.push_str("</body></html>\n");
    body
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
