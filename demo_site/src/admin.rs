//! Login, logout and the guarded dashboard.

use crate::blog::{BlogRepository, REPOSITORY};
use async_trait::async_trait;
use axum::http::StatusCode;
use folio_mvc::auth::CredentialVerifier;
use folio_mvc::config::AppConfig;
use folio_mvc::error::ServiceError;
use folio_mvc::plugins::{Csrf, FlashMessenger, Identity, Redirect};
use folio_mvc::{
    ActionContext, ActionError, ActionResult, AuthenticationService, Controller, ServiceFactory, ServiceInstance,
    Services, ViewModel,
};
use serde_json::Value;
use std::sync::Arc;

pub const CREDENTIALS: &str = "Credentials";

/// Single admin account from `settings.admin`.
pub struct AdminCredentials {
    user: String,
    password: String,
}

impl CredentialVerifier for AdminCredentials {
    fn verify(&self, identity: &str, credential: &str) -> Option<Value> {
        (identity == self.user && credential == self.password).then(|| Value::String(identity.to_string()))
    }
}

pub struct CredentialsFactory;

impl ServiceFactory for CredentialsFactory {
    fn validate_config(&self, config: &AppConfig) -> Result<(), String> {
        let admin = &config.settings["admin"];
        if admin["user"].as_str().unwrap_or_default().is_empty() {
            return Err("settings.admin.user is required".into());
        }
        if admin["password"].as_str().unwrap_or_default().is_empty() {
            return Err("settings.admin.password is required".into());
        }
        Ok(())
    }

    fn create_service(&self, services: &Services) -> Result<ServiceInstance, ServiceError> {
        let admin = &services.config().settings["admin"];
        let field = |key: &str| {
            admin[key]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ServiceError::construction(CREDENTIALS, format!("settings.admin.{} is not a string", key)))
        };
        let credentials = AdminCredentials {
            user: field("user")?,
            password: field("password")?,
        };
        Ok(Arc::new(credentials) as ServiceInstance)
    }
}

fn plugin<P: folio_mvc::ControllerPlugin>(ctx: &ActionContext, name: &str) -> Result<Arc<P>, ActionError> {
    ctx.plugin::<P>(name)
        .ok_or_else(|| ActionError::msg(format!("{} plugin missing", name)))
}

pub struct LoginController {
    credentials: Arc<AdminCredentials>,
}

impl LoginController {
    pub fn build(services: &Services) -> Result<Self, ServiceError> {
        Ok(LoginController {
            credentials: services.get_as::<AdminCredentials>(CREDENTIALS)?,
        })
    }
}

#[async_trait]
impl Controller for LoginController {
    fn has_action(&self, action: &str) -> bool {
        matches!(action, "index" | "logout")
    }

    async fn dispatch_action(&mut self, action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        let redirect = plugin::<Redirect>(ctx, "redirect")?;
        let flash = plugin::<FlashMessenger>(ctx, "flashMessenger")?;
        let auth = ctx
            .services()
            .get_as::<AuthenticationService>("AuthenticationService")?;

        if action == "logout" {
            auth.clear_identity()?;
            flash.info("Signed out")?;
            return Ok(redirect.to_route("blogIndex", &[])?);
        }
        if !ctx.request().is_post() {
            return Ok(ViewModel::new().into());
        }
        if !plugin::<Csrf>(ctx, "csrf")?.validate_request() {
            flash.error("Your form expired, please try again")?;
            return Ok(ViewModel::new().with_status(StatusCode::FORBIDDEN).into());
        }

        let user = ctx.request().post_str("user").unwrap_or_default().to_string();
        let password = ctx.request().post_str("password").unwrap_or_default().to_string();
        if !auth.authenticate(self.credentials.as_ref(), &user, &password)?.is_valid() {
            tracing::info!(user = %user, "rejected admin login");
            flash.error("Invalid credentials")?;
            return Ok(ViewModel::new().with_status(StatusCode::UNAUTHORIZED).into());
        }
        flash.success(format!("Welcome back, {}", user))?;
        Ok(redirect.to_route("adminDashboardIndex", &[])?)
    }
}

pub struct DashboardController {
    posts: Arc<BlogRepository>,
}

impl DashboardController {
    pub fn build(services: &Services) -> Result<Self, ServiceError> {
        Ok(DashboardController {
            posts: services.get_as::<BlogRepository>(REPOSITORY)?,
        })
    }
}

#[async_trait]
impl Controller for DashboardController {
    fn has_action(&self, action: &str) -> bool {
        action == "index"
    }

    async fn pre_dispatch(&mut self, ctx: &ActionContext) -> Result<(), ActionError> {
        if !plugin::<Identity>(ctx, "identity")?.is_authenticated() {
            plugin::<Redirect>(ctx, "redirect")?.to_route("adminLogin", &[])?;
        }
        Ok(())
    }

    async fn dispatch_action(&mut self, _action: &str, _ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        Ok(ViewModel::new().with("post_count", self.posts.len() as u64).into())
    }
}
