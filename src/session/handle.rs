//! Transport session handle and session stores.
//!
//! A handle wraps the session object the transport loaded for one request. Its top-level
//! keys are namespaces plus the reserved `id` and `cookie` metadata entries. Writes bump a
//! revision counter; `save` only reaches the store when the revision moved since the last
//! persist, so a request persists at most once however many times `save` is called.

use crate::config::SessionConfig;
use crate::error::SessionError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::RwLock;

pub type SessionData = serde_json::Map<String, Value>;

/// Durable backing for transport sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError>;
    async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError>;
    async fn destroy(&self, id: &str) -> Result<(), SessionError>;
}

/// Process-local store. Suitable for development and tests.
///
/// Expired sessions are never returned by `load`; they are dropped when read and swept
/// whenever a new session id is saved.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove every session whose `cookie.expires` has passed. Returns how many went.
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, data| !is_expired(data, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired sessions evicted");
        }
        evicted
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let data = self.sessions.read().await.get(id).cloned();
        match data {
            Some(data) if is_expired(&data, Utc::now()) => {
                self.sessions.write().await.remove(id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        let is_new = self
            .sessions
            .write()
            .await
            .insert(id.to_string(), data.clone())
            .is_none();
        if is_new {
            self.evict_expired().await;
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

/// Whether the `cookie.expires` metadata lies at or before `now`. Sessions without
/// readable metadata never expire.
pub fn is_expired(data: &SessionData, now: DateTime<Utc>) -> bool {
    data.get("cookie")
        .and_then(|cookie| cookie.get("expires"))
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|expires| expires.with_timezone(&Utc) <= now)
        .unwrap_or(false)
}

struct HandleState {
    id: String,
    data: SessionData,
    revision: u64,
    persisted_revision: Option<u64>,
    is_new: bool,
    cookie_dirty: bool,
    destroyed: bool,
    previous_id: Option<String>,
}

#[derive(Clone)]
pub struct SessionHandle {
    store: Arc<dyn SessionStore>,
    state: Arc<Mutex<HandleState>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionHandle")
            .field("id", &state.id)
            .field("revision", &state.revision)
            .field("is_new", &state.is_new)
            .finish()
    }
}

impl SessionHandle {
    /// Fresh session with a random id. Not persisted until something is written.
    pub fn create(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut data = SessionData::new();
        data.insert("id".into(), Value::String(id.clone()));
        data.insert("cookie".into(), cookie_metadata(config));
        SessionHandle {
            store,
            state: Arc::new(Mutex::new(HandleState {
                id,
                data,
                revision: 0,
                persisted_revision: None,
                is_new: true,
                cookie_dirty: true,
                destroyed: false,
                previous_id: None,
            })),
        }
    }

    /// Session loaded from the store.
    pub fn resume(store: Arc<dyn SessionStore>, id: impl Into<String>, mut data: SessionData) -> Self {
        let id = id.into();
        data.insert("id".into(), Value::String(id.clone()));
        SessionHandle {
            store,
            state: Arc::new(Mutex::new(HandleState {
                id,
                data,
                revision: 0,
                persisted_revision: Some(0),
                is_new: false,
                cookie_dirty: false,
                destroyed: false,
                previous_id: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    pub fn snapshot(&self) -> SessionData {
        self.lock().data.clone()
    }

    /// Returns whether the stored value changed.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Result<bool, SessionError> {
        let key = key.into();
        let mut state = self.lock();
        if state.destroyed {
            return Err(SessionError::Destroyed(state.id.clone()));
        }
        if state.data.get(&key) == Some(&value) {
            return Ok(false);
        }
        state.data.insert(key, value);
        state.revision += 1;
        Ok(true)
    }

    pub fn remove(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let mut state = self.lock();
        if state.destroyed {
            return Err(SessionError::Destroyed(state.id.clone()));
        }
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.revision += 1;
        }
        Ok(removed)
    }

    /// Mutate the data in place. Always counts as a change.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> Result<R, SessionError> {
        let mut state = self.lock();
        if state.destroyed {
            return Err(SessionError::Destroyed(state.id.clone()));
        }
        let out = f(&mut state.data);
        state.revision += 1;
        Ok(out)
    }

    /// New id, same data. The old id is destroyed on the next save.
    pub fn regenerate(&self) {
        let mut state = self.lock();
        let new_id = uuid::Uuid::new_v4().simple().to_string();
        let old = std::mem::replace(&mut state.id, new_id.clone());
        if state.persisted_revision.is_some() && state.previous_id.is_none() {
            state.previous_id = Some(old);
        }
        state.data.insert("id".into(), Value::String(new_id));
        state.revision += 1;
        state.cookie_dirty = true;
    }

    /// Persist if anything changed since the last persist. Returns whether the store was written.
    pub async fn save(&self) -> Result<bool, SessionError> {
        let (id, data, revision, previous) = {
            let state = self.lock();
            if state.destroyed {
                return Ok(false);
            }
            if state.persisted_revision == Some(state.revision) {
                return Ok(false);
            }
            if state.is_new && state.revision == 0 {
                return Ok(false);
            }
            (state.id.clone(), state.data.clone(), state.revision, state.previous_id.clone())
        };
        self.store.save(&id, &data).await?;
        if let Some(old) = previous {
            self.store.destroy(&old).await?;
        }
        let mut state = self.lock();
        state.persisted_revision = Some(revision);
        state.previous_id = None;
        Ok(true)
    }

    pub async fn destroy(&self) -> Result<(), SessionError> {
        let id = {
            let mut state = self.lock();
            state.destroyed = true;
            state.id.clone()
        };
        self.store.destroy(&id).await
    }

    /// True once a fresh or regenerated id has been persisted and the client must learn it.
    pub fn needs_cookie(&self) -> bool {
        let state = self.lock();
        state.cookie_dirty && !state.destroyed && state.persisted_revision.is_some()
    }

    pub fn set_cookie_header(&self, config: &SessionConfig) -> String {
        let id = self.id();
        let mut header = format!(
            "{}={}; Path={}; Max-Age={}; SameSite=Lax",
            config.cookie_name, id, config.cookie_path, config.max_age_secs
        );
        if config.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

fn cookie_metadata(config: &SessionConfig) -> Value {
    let expires = Utc::now() + Duration::seconds(config.max_age_secs);
    json!({
        "path": config.cookie_path,
        "http_only": config.http_only,
        "max_age": config.max_age_secs,
        "expires": expires.to_rfc3339(),
    })
}

/// Value of cookie `name` from a `Cookie` request header.
pub fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name && !v.is_empty()).then(|| v.to_string())
    })
}
