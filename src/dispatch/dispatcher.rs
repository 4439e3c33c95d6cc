//! The dispatch state machine.
//!
//! Routing -> ControllerResolved -> SessionPrimed -> PreDispatch -> ActionRunning ->
//! PostDispatch -> ResponseFinalized, with Error reachable once a controller is resolved.
//! Whatever happens after routing, a response with a body or a redirect comes out, and the
//! session mirror is reconciled and persisted before that response is returned.

use crate::case;
use crate::config::AppConfig;
use crate::controller::{not_found_view, ActionResult, Controller, ControllerRegistry, ErrorController};
use crate::dispatch::error_page::{self, ErrorKind};
use crate::dispatch::{ActionContext, DispatchContext, DispatchState, TransportRequest};
use crate::error::{ActionError, RenderError};
use crate::helpers::HelperManager;
use crate::plugins::PluginManager;
use crate::routing::table::{NOT_FOUND_ACTION, NOT_FOUND_CONTROLLER, NOT_FOUND_MODULE};
use crate::routing::RouteMatch;
use crate::service::{ServiceContainer, CONTROLLER_PLUGIN_MANAGER, VIEW_HELPER_MANAGER};
use crate::session::{ProcessMirror, SessionMirror};
use crate::view::{TemplateResolver, ViewModel, ViewRenderer};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the transport writes back.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// None for redirects.
    pub body: Option<String>,
}

impl DispatchResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    fn html(status: StatusCode, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        DispatchResponse {
            status,
            headers,
            body: Some(body),
        }
    }
}

pub struct Dispatcher {
    config: Arc<AppConfig>,
    container: Arc<ServiceContainer>,
    controllers: ControllerRegistry,
    resolver: TemplateResolver,
    renderer: Arc<dyn ViewRenderer>,
    process_mirror: Option<ProcessMirror>,
}

impl Dispatcher {
    pub(crate) fn new(
        config: Arc<AppConfig>,
        container: Arc<ServiceContainer>,
        controllers: ControllerRegistry,
        resolver: TemplateResolver,
        renderer: Arc<dyn ViewRenderer>,
    ) -> Self {
        let process_mirror = config.session.process_mirror.then(ProcessMirror::new);
        Dispatcher {
            config,
            container,
            controllers,
            resolver,
            renderer,
            process_mirror,
        }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Drive one request through the lifecycle. Never fails: errors become 404/500 pages.
    pub async fn dispatch(&self, request: TransportRequest) -> DispatchResponse {
        let ctx = self.context(request);
        self.dispatch_with(&ctx).await
    }

    /// Like [`dispatch`](Self::dispatch), for callers that inspect the context afterwards.
    pub async fn dispatch_with(&self, ctx: &Arc<DispatchContext>) -> DispatchResponse {
        let started = Instant::now();
        let deadline = Duration::from_millis(self.config.dispatcher.request_timeout_ms);
        let outcome = match tokio::time::timeout(deadline, self.run(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActionError::Timeout(deadline)),
        };
        let response = self.finalize(ctx, outcome).await;
        tracing::info!(
            method = %ctx.request().method(),
            path = ctx.request().path(),
            route = ?ctx.route().route_name,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request dispatched"
        );
        response
    }

    /// Route `request` and build its context, in the Routing state.
    pub fn context(&self, request: TransportRequest) -> Arc<DispatchContext> {
        let routes = self.container.routes();
        let route = routes.match_path(&request.path).unwrap_or_else(|| {
            tracing::debug!(path = %request.path, "no route matched");
            RouteMatch::not_found()
        });
        let mirror = match &self.process_mirror {
            Some(process) => SessionMirror::shared(process),
            None => SessionMirror::per_request(),
        };
        Arc::new(DispatchContext::new(route, request, Arc::clone(routes), mirror))
    }

    async fn run(&self, ctx: &Arc<DispatchContext>) -> Result<ActionResult, ActionError> {
        let route = ctx.route();
        let mut key = self.controllers.key(&route.module, &route.controller);
        if !self.controllers.contains(&key) {
            if !route.is_not_found() {
                tracing::warn!(controller = %key, "no controller registered; treating as not found");
            }
            ctx.mark_not_found();
            key = self.controllers.key(NOT_FOUND_MODULE, NOT_FOUND_CONTROLLER);
        }
        ctx.resolve_controller(key.clone());
        ctx.transition(DispatchState::ControllerResolved);

        let services = self.container.scoped(Arc::clone(ctx));
        let mut controller: Box<dyn Controller> = match self.controllers.factory(&key) {
            Some(build) => build(&services)?,
            None => Box::new(ErrorController),
        };
        let plugins = services.get_as::<PluginManager>(CONTROLLER_PLUGIN_MANAGER)?;
        let actx = ActionContext::new(Arc::clone(ctx), services, plugins);

        let mut action = case::action_name(&route.action);
        if !controller.has_action(&action) {
            tracing::debug!(controller = %key, action = %action, "action not found");
            ctx.mark_not_found();
            controller = Box::new(ErrorController);
            action = NOT_FOUND_ACTION.to_string();
        }

        ctx.prime_session();
        ctx.transition(DispatchState::SessionPrimed);

        ctx.transition(DispatchState::PreDispatch);
        controller.pre_dispatch(&actx).await?;
        if ctx.redirect_location().is_some() {
            tracing::debug!(controller = %key, "pre-dispatch redirected; action skipped");
            return Ok(ActionResult::Redirect);
        }

        ctx.transition(DispatchState::ActionRunning);
        let mut result = controller.dispatch_action(&action, &actx).await?;

        ctx.transition(DispatchState::PostDispatch);
        controller.post_dispatch(&actx, &mut result).await?;
        Ok(result)
    }

    async fn finalize(
        &self,
        ctx: &Arc<DispatchContext>,
        outcome: Result<ActionResult, ActionError>,
    ) -> DispatchResponse {
        let mut response = match outcome {
            Ok(_) if ctx.redirect_location().is_some() => self.redirect(ctx),
            Ok(ActionResult::Redirect) => {
                tracing::warn!("redirect result without a location; rendering 500");
                self.fail(ctx, &ActionError::msg("redirect without location"))
            }
            Ok(ActionResult::View(view)) => match self.render(ctx, view) {
                Ok(response) => response,
                Err(e) => self.fail(ctx, &ActionError::from(e)),
            },
            Err(e) => self.fail(ctx, &e),
        };

        for (name, value) in ctx.response().headers() {
            if !response.headers.contains_key(name) {
                response.headers.insert(name.clone(), value.clone());
            }
        }

        ctx.prime_session();
        ctx.session().reconcile();
        ctx.session().save().await;
        ctx.transition(DispatchState::ResponseFinalized);
        response
    }

    fn redirect(&self, ctx: &Arc<DispatchContext>) -> DispatchResponse {
        let location = ctx.redirect_location().unwrap_or_default();
        let status = StatusCode::from_u16(self.config.dispatcher.redirect_status).unwrap_or(StatusCode::FOUND);
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                let mut headers = HeaderMap::new();
                headers.insert(header::LOCATION, value);
                DispatchResponse {
                    status,
                    headers,
                    body: None,
                }
            }
            Err(e) => self.fail(ctx, &ActionError::with_source(format!("invalid redirect location {:?}", location), e)),
        }
    }

    fn render(&self, ctx: &Arc<DispatchContext>, view: ViewModel) -> Result<DispatchResponse, RenderError> {
        if ctx.is_not_found() {
            let view = if view.variables().is_empty() {
                not_found_view(ctx.request().path())
            } else {
                view
            };
            return Ok(self.error_page(ctx, ErrorKind::NotFound, view));
        }
        let route = ctx.route();
        let name = match view.template() {
            Some(t) => t.to_string(),
            None => case::template_name(&route.module, &route.controller, &route.action),
        };
        let path = self
            .resolver
            .resolve(&name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.clone()))?;
        let helpers = self.helpers(ctx);
        let body = self.renderer.render(&path, view.variables(), helpers.as_ref())?;
        let status = view
            .status()
            .or_else(|| ctx.response().status())
            .unwrap_or(StatusCode::OK);
        Ok(DispatchResponse::html(status, body))
    }

    fn fail(&self, ctx: &Arc<DispatchContext>, err: &ActionError) -> DispatchResponse {
        ctx.transition(DispatchState::Error);
        tracing::error!(path = ctx.request().path(), error = %err, chain = ?err.chain(), "dispatch failed");
        let expose = self.config.view_manager.display_exceptions && !self.config.environment.is_production();
        let view = error_page::exception_view(ctx.request().path(), err, expose);
        self.error_page(ctx, ErrorKind::Exception, view)
    }

    fn error_page(&self, ctx: &Arc<DispatchContext>, kind: ErrorKind, view: ViewModel) -> DispatchResponse {
        let status = match kind {
            ErrorKind::NotFound => view.status().unwrap_or(kind.status()),
            ErrorKind::Exception => kind.status(),
        };
        let rendered = error_page::resolve_template(kind, &self.config.view_manager, &self.resolver).and_then(|path| {
            let helpers = self.helpers(ctx);
            self.renderer
                .render(&path, view.variables(), helpers.as_ref())
                .map_err(|e| tracing::warn!(template = %path.display(), error = %e, "error template failed; using inline page"))
                .ok()
        });
        let body = rendered.unwrap_or_else(|| error_page::inline_body(kind, &view));
        DispatchResponse::html(status, body)
    }

    fn helpers(&self, ctx: &Arc<DispatchContext>) -> Option<Arc<HelperManager>> {
        self.container
            .scoped(Arc::clone(ctx))
            .get_as::<HelperManager>(VIEW_HELPER_MANAGER)
            .map_err(|e| tracing::debug!(error = %e, "view helpers unavailable"))
            .ok()
    }
}
