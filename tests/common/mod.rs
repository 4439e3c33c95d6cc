#![allow(dead_code)]

use async_trait::async_trait;
use folio_mvc::auth::CredentialVerifier;
use folio_mvc::config::{from_json_str, AppConfig, Environment};
use folio_mvc::error::ServiceError;
use folio_mvc::plugins::{FlashMessenger, Redirect};
use folio_mvc::{
    ActionContext, ActionError, ActionResult, Application, ApplicationBuilder, AuthenticationService, Controller,
    Dispatcher, ServiceInstance, Services, ViewModel,
};
use serde_json::Value;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const ROUTES: &str = r#"{
    "routes": [
        {"name": "home", "route": "/", "module": "blog", "controller": "index"},
        {"name": "blogView", "route": "/blog/:slug", "module": "blog", "controller": "index", "action": "view"},
        {"name": "blogSlow", "route": "/slow", "module": "blog", "controller": "index", "action": "slow"},
        {"name": "blogBroken", "route": "/broken", "module": "blog", "controller": "index", "action": "explode"},
        {"name": "blogMissing", "route": "/missing-action", "module": "blog", "controller": "index", "action": "archive"},
        {"name": "adminLogin", "route": "/admin/login", "module": "admin", "controller": "login"},
        {"name": "adminDashboardIndex", "route": "/admin", "module": "admin", "controller": "dashboard"}
    ],
    "service_manager": {
        "invokables": {"Journal": "Test/Journal"},
        "factories": {"Credentials": "Test/CredentialsFactory"}
    }
}"#;

/// Order in which lifecycle steps ran, shared across requests.
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct BlogController {
    journal: Arc<Journal>,
}

#[async_trait]
impl Controller for BlogController {
    fn has_action(&self, action: &str) -> bool {
        matches!(action, "index" | "view" | "slow" | "explode")
    }

    async fn pre_dispatch(&mut self, _ctx: &ActionContext) -> Result<(), ActionError> {
        self.journal.push("pre");
        Ok(())
    }

    async fn dispatch_action(&mut self, action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        match action {
            "index" => Ok(ViewModel::new().with("title", "Latest posts").into()),
            "view" => {
                let slug = ctx.request().param("slug").unwrap_or_default().to_string();
                Ok(ViewModel::new().with("slug", slug).into())
            }
            "slow" => {
                self.journal.push("action:start");
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.journal.push("action:end");
                Ok(ViewModel::new().with("loaded", "after delay").into())
            }
            _ => Err(ActionError::msg("database unreachable: secret-host:5432")),
        }
    }

    async fn post_dispatch(&mut self, _ctx: &ActionContext, result: &mut ActionResult) -> Result<(), ActionError> {
        self.journal.push("post");
        if let ActionResult::View(view) = result {
            view.set_variable("footer", "rendered");
        }
        Ok(())
    }
}

pub struct Credentials;

impl CredentialVerifier for Credentials {
    fn verify(&self, identity: &str, credential: &str) -> Option<Value> {
        (identity == "admin" && credential == "secret").then(|| Value::String(identity.to_string()))
    }
}

pub struct LoginController {
    credentials: Arc<Credentials>,
}

#[async_trait]
impl Controller for LoginController {
    fn has_action(&self, action: &str) -> bool {
        action == "index"
    }

    async fn dispatch_action(&mut self, _action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        if !ctx.request().is_post() {
            return Ok(ViewModel::new().into());
        }
        let auth = ctx
            .services()
            .get_as::<AuthenticationService>("AuthenticationService")?;
        let user = ctx.request().post_str("user").unwrap_or_default().to_string();
        let password = ctx.request().post_str("password").unwrap_or_default().to_string();
        let flash = ctx
            .plugin::<FlashMessenger>("flashMessenger")
            .ok_or_else(|| ActionError::msg("flashMessenger plugin missing"))?;
        if !auth.authenticate(self.credentials.as_ref(), &user, &password)?.is_valid() {
            flash.error("Invalid credentials")?;
            return Ok(ViewModel::new().with_status(axum::http::StatusCode::UNAUTHORIZED).into());
        }
        flash.success("Welcome back")?;
        let redirect = ctx
            .plugin::<Redirect>("redirect")
            .ok_or_else(|| ActionError::msg("redirect plugin missing"))?;
        Ok(redirect.to_route("adminDashboardIndex", &[])?)
    }
}

pub struct DashboardController;

#[async_trait]
impl Controller for DashboardController {
    fn has_action(&self, action: &str) -> bool {
        action == "index"
    }

    async fn pre_dispatch(&mut self, ctx: &ActionContext) -> Result<(), ActionError> {
        let auth = ctx
            .services()
            .get_as::<AuthenticationService>("AuthenticationService")?;
        if !auth.has_identity() {
            if let Some(redirect) = ctx.plugin::<Redirect>("redirect") {
                redirect.to_route("adminLogin", &[])?;
            }
        }
        Ok(())
    }

    async fn dispatch_action(&mut self, _action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        let auth = ctx
            .services()
            .get_as::<AuthenticationService>("AuthenticationService")?;
        Ok(ViewModel::new()
            .with("user", auth.identity().unwrap_or(Value::Null))
            .into())
    }
}

pub struct Fixture {
    pub views: TempDir,
    pub config: AppConfig,
}

/// Config plus a template directory with page and error templates.
pub fn fixture() -> Fixture {
    let views = tempfile::tempdir().unwrap();
    let write = |name: &str, body: &str| {
        let path = views.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    };
    write("blog/index/index.html", "<h1>{{ title }}</h1>");
    write("blog/index/view.html", "<article>{{ slug }}</article><a href=\"{{ url('home') }}\">home</a>");
    write("blog/index/slow.html", "<p>{{ loaded }}|{{ footer }}</p>");
    write(
        "admin/login/index.html",
        "<form><input name=\"csrf\" value=\"{{ csrfToken() }}\"></form>{% for m in flashMessenger('error') %}<p class=\"error\">{{ m }}</p>{% endfor %}",
    );
    write(
        "admin/dashboard/index.html",
        "<h1>Dashboard {{ user }}</h1>{% for m in flashMessenger('success') %}<p class=\"flash\">{{ m }}</p>{% endfor %}",
    );
    write("error/404.html", "<h1>Not found</h1><p>{{ path }}</p>");
    write(
        "error/index.html",
        "<h1>Something went wrong</h1>{% if display_exceptions %}<pre>{{ exception }}</pre>{% endif %}",
    );

    let mut config = from_json_str(ROUTES).unwrap();
    config.view_manager.template_path_stack = vec![views.path().to_path_buf()];
    Fixture { views, config }
}

pub fn builder(config: AppConfig) -> ApplicationBuilder {
    Application::builder(config)
        .invokable::<Journal>("Test/Journal")
        .service_factory("Test/CredentialsFactory", |_: &Services| -> Result<ServiceInstance, ServiceError> {
            Ok(Arc::new(Credentials) as ServiceInstance)
        })
        .controller("blog", "index", |s: &Services| {
            Ok(BlogController {
                journal: s.get_as::<Journal>("Journal")?,
            })
        })
        .controller("admin", "login", |s: &Services| {
            Ok(LoginController {
                credentials: s.get_as::<Credentials>("Credentials")?,
            })
        })
        .controller("admin", "dashboard", |_: &Services| Ok(DashboardController))
}

pub fn dispatcher(config: AppConfig) -> Dispatcher {
    builder(config).build().unwrap()
}

pub fn development(mut config: AppConfig) -> AppConfig {
    config.environment = Environment::Development;
    config.view_manager.display_exceptions = true;
    config
}
