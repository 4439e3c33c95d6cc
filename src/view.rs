//! View models, template resolution and rendering.

use crate::config::ViewManagerConfig;
use crate::error::RenderError;
use crate::helpers::HelperManager;
use axum::http::StatusCode;
use minijinja::value::Rest;
use minijinja::Environment;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// What an action hands back for rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewModel {
    template: Option<String>,
    variables: Map<String, Value>,
    status: Option<StatusCode>,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Serialize `value` into a variable. Values that fail to serialize become null.
    pub fn with_serialized<T: Serialize>(self, key: impl Into<String>, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "view variable did not serialize");
            Value::Null
        });
        self.with(key, value)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = Some(template.into());
    }

    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

/// Maps template names to files: `template_map` first, then each stack directory in order.
#[derive(Clone, Debug)]
pub struct TemplateResolver {
    stack: Vec<PathBuf>,
    map: HashMap<String, PathBuf>,
    suffix: String,
}

impl TemplateResolver {
    pub fn new(config: &ViewManagerConfig) -> Self {
        TemplateResolver {
            stack: config.template_path_stack.clone(),
            map: config.template_map.clone(),
            suffix: config.template_suffix.clone(),
        }
    }

    /// Resolve relative paths against `root`.
    pub fn rooted(mut self, root: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_relative() { root.join(p) } else { p };
        self.stack = self.stack.into_iter().map(anchor).collect();
        self.map = self.map.into_iter().map(|(k, v)| (k, anchor(v))).collect();
        self
    }

    /// Existing file for `name`, or None.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Some(mapped) = self.map.get(name) {
            if mapped.is_file() {
                return Some(mapped.clone());
            }
            tracing::debug!(template = name, path = %mapped.display(), "mapped template missing");
        }
        let relative = safe_relative(name)?;
        let file = if relative.extension().is_some() {
            relative
        } else {
            relative.with_extension(&self.suffix)
        };
        self.stack
            .iter()
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
    }
}

/// Template names never escape the stack directories.
fn safe_relative(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for comp in Path::new(name.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => out.push(s),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// Renders a resolved template file with variables and the request's view helpers.
pub trait ViewRenderer: Send + Sync {
    fn render(
        &self,
        path: &Path,
        variables: &Map<String, Value>,
        helpers: Option<&Arc<HelperManager>>,
    ) -> Result<String, RenderError>;
}

/// Default renderer. Every helper in the catalog is callable from templates by name.
#[derive(Clone, Copy, Debug, Default)]
pub struct MiniJinjaRenderer;

fn template_error(path: &Path, e: impl ToString) -> RenderError {
    RenderError::Template {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

impl ViewRenderer for MiniJinjaRenderer {
    fn render(
        &self,
        path: &Path,
        variables: &Map<String, Value>,
        helpers: Option<&Arc<HelperManager>>,
    ) -> Result<String, RenderError> {
        let source = fs::read_to_string(path)?;
        let mut env = Environment::new();
        if let Some(helpers) = helpers {
            for name in helpers.catalog().names() {
                let helpers = Arc::clone(helpers);
                let helper = name.to_string();
                env.add_function(
                    name.to_string(),
                    move |args: Rest<minijinja::Value>| -> Result<minijinja::Value, minijinja::Error> {
                        let args = args
                            .iter()
                            .map(serde_json::to_value)
                            .collect::<Result<Vec<Value>, _>>()
                            .map_err(|e| {
                                minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
                            })?;
                        let out = helpers.call(&helper, &args).map_err(|e| {
                            minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
                        })?;
                        Ok(minijinja::Value::from_serialize(&out))
                    },
                );
            }
        }
        env.add_template("tpl", &source)
            .map_err(|e| template_error(path, e))?;
        let tmpl = env.get_template("tpl").map_err(|e| template_error(path, e))?;
        tmpl.render(variables).map_err(|e| template_error(path, e))
    }
}
