//! Per-request dispatch context: resolved route, request and response value objects,
//! session mirror and the recorded state transitions. One per request, never shared.

use crate::plugins::{ControllerPlugin, PluginManager};
use crate::routing::{RouteMatch, RouteTable};
use crate::service::Services;
use crate::session::{SessionHandle, SessionMirror};
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Routing,
    ControllerResolved,
    SessionPrimed,
    PreDispatch,
    ActionRunning,
    PostDispatch,
    ResponseFinalized,
    Error,
}

/// What the transport hands to the dispatcher.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Posted body: a JSON object for form and JSON requests, `Null` when empty.
    pub body: Value,
    pub session: Option<SessionHandle>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        TransportRequest {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Value::Null,
            session: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }
}

#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    post: Value,
    headers: HeaderMap,
    session: RwLock<Option<SessionHandle>>,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn post(&self, name: &str) -> Option<&Value> {
        self.post.get(name)
    }

    pub fn post_str(&self, name: &str) -> Option<&str> {
        self.post(name).and_then(Value::as_str)
    }

    pub fn body(&self) -> &Value {
        &self.post
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Transport session, once the dispatcher has primed it.
    pub fn session(&self) -> Option<SessionHandle> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    location: Option<String>,
}

impl Response {
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn redirect_to(&mut self, location: impl Into<String>) {
        self.location = Some(location.into());
    }

    pub fn is_redirect(&self) -> bool {
        self.location.is_some()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

pub struct DispatchContext {
    route: RouteMatch,
    request: Request,
    response: Mutex<Response>,
    session: SessionMirror,
    incoming_session: Mutex<Option<SessionHandle>>,
    routes: Arc<RouteTable>,
    controller: OnceLock<String>,
    not_found: AtomicBool,
    states: Mutex<Vec<DispatchState>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl DispatchContext {
    pub fn new(
        route: RouteMatch,
        transport: TransportRequest,
        routes: Arc<RouteTable>,
        session: SessionMirror,
    ) -> Self {
        let not_found = route.is_not_found();
        let request = Request {
            method: transport.method,
            path: transport.path,
            query: transport.query,
            params: route.params.clone(),
            post: transport.body,
            headers: transport.headers,
            session: RwLock::new(None),
        };
        DispatchContext {
            route,
            request,
            response: Mutex::new(Response::default()),
            session,
            incoming_session: Mutex::new(transport.session),
            routes,
            controller: OnceLock::new(),
            not_found: AtomicBool::new(not_found),
            states: Mutex::new(vec![DispatchState::Routing]),
        }
    }

    pub fn route(&self) -> &RouteMatch {
        &self.route
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> MutexGuard<'_, Response> {
        lock(&self.response)
    }

    pub fn session(&self) -> &SessionMirror {
        &self.session
    }

    /// Redirect target; the finalizer emits `Location` and no body.
    pub fn redirect_to(&self, location: impl Into<String>) {
        self.response().redirect_to(location);
    }

    pub fn redirect_location(&self) -> Option<String> {
        self.response().location().map(str::to_string)
    }

    /// Record the resolved controller. The first key sticks; a later one is logged and
    /// dropped, and false is returned.
    pub(crate) fn resolve_controller(&self, key: impl Into<String>) -> bool {
        match self.controller.set(key.into()) {
            Ok(()) => true,
            Err(rejected) => {
                tracing::debug!(
                    resolved = ?self.controller.get(),
                    rejected = %rejected,
                    path = %self.request.path,
                    "controller already resolved; keeping the first"
                );
                false
            }
        }
    }

    /// Controller key once resolution succeeded.
    pub fn controller_key(&self) -> Option<&str> {
        self.controller.get().map(String::as_str)
    }

    pub fn mark_not_found(&self) {
        self.not_found.store(true, Ordering::SeqCst);
    }

    pub fn is_not_found(&self) -> bool {
        self.not_found.load(Ordering::SeqCst)
    }

    pub fn transition(&self, next: DispatchState) {
        let mut states = lock(&self.states);
        tracing::debug!(
            from = ?states.last(),
            to = ?next,
            path = %self.request.path,
            "dispatch state"
        );
        states.push(next);
    }

    pub fn state(&self) -> DispatchState {
        lock(&self.states)
            .last()
            .copied()
            .unwrap_or(DispatchState::Routing)
    }

    pub fn states(&self) -> Vec<DispatchState> {
        lock(&self.states).clone()
    }

    pub fn has_reached(&self, state: DispatchState) -> bool {
        lock(&self.states).contains(&state)
    }

    /// Attach the incoming transport session to the request and the mirror.
    /// Returns false when there was none, or when it was already primed.
    pub(crate) fn prime_session(&self) -> bool {
        let Some(handle) = lock(&self.incoming_session).take() else {
            return false;
        };
        *self.request.session.write().unwrap_or_else(|e| e.into_inner()) = Some(handle.clone());
        self.session.attach(handle);
        true
    }
}

/// What a controller sees while it runs: the dispatch context plus its scoped services
/// and the plugin manager bound to it.
pub struct ActionContext {
    dispatch: Arc<DispatchContext>,
    services: Services,
    plugins: Arc<PluginManager>,
}

impl ActionContext {
    pub fn new(dispatch: Arc<DispatchContext>, services: Services, plugins: Arc<PluginManager>) -> Self {
        ActionContext {
            dispatch,
            services,
            plugins,
        }
    }

    pub fn dispatch_context(&self) -> &Arc<DispatchContext> {
        &self.dispatch
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Typed plugin lookup with default options.
    pub fn plugin<P: ControllerPlugin>(&self, name: &str) -> Option<Arc<P>> {
        self.plugins.plugin::<P>(name)
    }
}

impl Deref for ActionContext {
    type Target = DispatchContext;

    fn deref(&self) -> &DispatchContext {
        &self.dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(path: &str) -> DispatchContext {
        DispatchContext::new(
            RouteMatch::not_found(),
            TransportRequest::get(path).with_query("page", "2"),
            Arc::new(RouteTable::default()),
            SessionMirror::per_request(),
        )
    }

    #[test]
    fn records_transitions_in_order() {
        let ctx = context("/missing");
        ctx.transition(DispatchState::ControllerResolved);
        ctx.transition(DispatchState::Error);
        assert_eq!(
            ctx.states(),
            vec![DispatchState::Routing, DispatchState::ControllerResolved, DispatchState::Error]
        );
        assert_eq!(ctx.state(), DispatchState::Error);
    }

    #[test]
    fn synthesized_not_found_route_flags_404() {
        let ctx = context("/missing");
        assert!(ctx.is_not_found());
        assert_eq!(ctx.route().action, "notFound");
        assert_eq!(ctx.request().query("page"), Some("2"));
    }

    #[test]
    fn controller_resolves_once() {
        let ctx = context("/admin");
        assert!(ctx.resolve_controller("Admin/DashboardController"));
        assert!(!ctx.resolve_controller("Error/ErrorController"));
        assert_eq!(ctx.controller_key(), Some("Admin/DashboardController"));
    }

    #[test]
    fn priming_without_transport_session_is_a_no_op() {
        let ctx = context("/");
        assert!(!ctx.prime_session());
        assert!(ctx.request().session().is_none());
    }
}
