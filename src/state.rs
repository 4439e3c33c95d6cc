//! Shared application state for the HTTP adapter.

use crate::config::SessionConfig;
use crate::dispatch::Dispatcher;
use crate::session::{MemorySessionStore, SessionStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Backing store for transport sessions. Loaded per request from the session cookie.
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, sessions: Arc<dyn SessionStore>) -> Self {
        AppState {
            dispatcher: Arc::new(dispatcher),
            sessions,
        }
    }

    /// Sessions kept in process memory; lost on restart.
    pub fn with_memory_sessions(dispatcher: Dispatcher) -> Self {
        Self::new(dispatcher, Arc::new(MemorySessionStore::new()))
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.dispatcher.config().session
    }
}
