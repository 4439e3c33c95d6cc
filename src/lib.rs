//! Folio MVC: a convention-driven router -> controller -> view runtime.
//!
//! Requests are routed against a configured route table, dispatched to a controller built
//! from a lazily-resolved service container, and rendered through templates, with session
//! state reconciled and persisted once per request.

pub mod application;
pub mod auth;
pub mod case;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod helpers;
pub mod plugins;
pub mod registry;
pub mod response;
pub mod routes;
pub mod routing;
pub mod service;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod view;

pub use application::{Application, ApplicationBuilder};
pub use auth::{AuthResult, AuthenticationService, CredentialVerifier};
pub use config::{load_from_env, load_from_path, AppConfig, Environment};
pub use controller::{ActionResult, Controller, ControllerRegistry};
pub use dispatch::{ActionContext, DispatchContext, DispatchResponse, DispatchState, Dispatcher, TransportRequest};
pub use error::{ActionError, AppError, ConfigError, RegistryError, RenderError, RouteError, ServiceError, SessionError};
pub use helpers::{HelperManager, ViewHelper};
pub use plugins::{ControllerPlugin, PluginManager};
pub use routes::{app, common_routes, dispatch_routes};
pub use routing::{RouteMatch, RouteTable};
pub use service::{ServiceContainer, ServiceFactory, ServiceInstance, Services};
pub use session::{MemorySessionStore, SessionHandle, SessionMirror, SessionStore};
pub use state::AppState;
pub use view::{MiniJinjaRenderer, ViewModel, ViewRenderer};
