//! Session mirror: per-namespace key/value access over three storage tiers.
//!
//! Reads and writes go to the first tier present: the transport session handle, then the
//! mirror tier, then an in-memory fallback. Writes that land on the transport handle are
//! copied into the mirror tier as well, so `reconcile` (mirror -> transport, minus `id` and
//! `cookie`) never replaces a newer transport value with an older one.
//!
//! The mirror tier is per request unless the application opts into a [`ProcessMirror`].
//! A process mirror is shared by every request and keyed only by namespace: two concurrent
//! requests on that path see and reconcile each other's data. It exists for diagnostics and
//! legacy setups only; production deployments must run with transport sessions.

use crate::error::SessionError;
use crate::session::{SessionData, SessionHandle};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Top-level session keys holding transport metadata. Never written by the mirror.
pub const RESERVED_KEYS: [&str; 2] = ["id", "cookie"];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Transport,
    Mirror,
    Memory,
}

/// Mirror tier shared across requests (legacy mode).
#[derive(Clone, Default)]
pub struct ProcessMirror {
    data: Arc<Mutex<SessionData>>,
}

impl ProcessMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionData {
        lock(&self.data).clone()
    }
}

pub struct SessionMirror {
    transport: RwLock<Option<SessionHandle>>,
    mirror: Option<Arc<Mutex<SessionData>>>,
    memory: Mutex<SessionData>,
}

impl Default for SessionMirror {
    fn default() -> Self {
        Self::per_request()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn namespace_mut<'a>(data: &'a mut SessionData, ns: &str) -> &'a mut Map<String, Value> {
    let slot = data
        .entry(ns.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("namespace slot was just set to an object"),
    }
}

impl SessionMirror {
    /// No transport, no mirror tier: everything lives in this object and is lost afterwards.
    pub fn in_memory() -> Self {
        SessionMirror {
            transport: RwLock::new(None),
            mirror: None,
            memory: Mutex::new(SessionData::new()),
        }
    }

    pub fn per_request() -> Self {
        SessionMirror {
            transport: RwLock::new(None),
            mirror: Some(Arc::new(Mutex::new(SessionData::new()))),
            memory: Mutex::new(SessionData::new()),
        }
    }

    pub fn shared(process: &ProcessMirror) -> Self {
        SessionMirror {
            transport: RwLock::new(None),
            mirror: Some(Arc::clone(&process.data)),
            memory: Mutex::new(SessionData::new()),
        }
    }

    /// Attach the transport session and merge its data into the mirror tier.
    /// Values already staged in the mirror win over the stored ones, key by key, and the
    /// merged namespaces are written to the transport so reads after attaching see them.
    pub fn attach(&self, handle: SessionHandle) {
        if let Some(mirror) = &self.mirror {
            let mut staged = lock(mirror);
            for (k, stored) in handle.snapshot() {
                if is_reserved(&k) {
                    continue;
                }
                let merged = match (staged.remove(&k), stored) {
                    (None, stored) => stored,
                    (Some(Value::Object(pending)), Value::Object(mut merged)) => {
                        merged.extend(pending);
                        Value::Object(merged)
                    }
                    (Some(pending), _) => pending,
                };
                staged.insert(k, merged);
            }
            for (k, v) in staged.iter().filter(|(k, _)| !is_reserved(k)) {
                if let Err(e) = handle.insert(k.clone(), v.clone()) {
                    tracing::warn!(key = %k, error = %e, "session attach: staged key not written");
                }
            }
        }
        *self.transport.write().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    pub fn transport(&self) -> Option<SessionHandle> {
        self.transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn active_tier(&self) -> Tier {
        if self.transport().is_some() {
            Tier::Transport
        } else if self.mirror.is_some() {
            Tier::Mirror
        } else {
            Tier::Memory
        }
    }

    fn namespace_value(&self, ns: &str) -> Option<Value> {
        match (self.transport(), &self.mirror) {
            (Some(handle), _) => handle.get(ns),
            (None, Some(mirror)) => lock(mirror).get(ns).cloned(),
            (None, None) => lock(&self.memory).get(ns).cloned(),
        }
    }

    /// Apply `f` to namespace `ns` on the active tier. With `create == false` a missing
    /// namespace is left alone and `Ok(None)` returned.
    fn write<R>(
        &self,
        ns: &str,
        create: bool,
        f: impl FnOnce(&mut Map<String, Value>) -> R,
    ) -> Result<Option<R>, SessionError> {
        if is_reserved(ns) {
            return Err(SessionError::ReservedKey(ns.to_string()));
        }
        if let Some(handle) = self.transport() {
            if !create && !handle.contains_key(ns) {
                return Ok(None);
            }
            let (out, current) = handle.update(|data| {
                let out = f(namespace_mut(data, ns));
                (out, data.get(ns).cloned())
            })?;
            self.write_through(ns, current);
            return Ok(Some(out));
        }
        let target = match &self.mirror {
            Some(mirror) => mirror.as_ref(),
            None => &self.memory,
        };
        let mut data = lock(target);
        if !create && !data.contains_key(ns) {
            return Ok(None);
        }
        Ok(Some(f(namespace_mut(&mut data, ns))))
    }

    fn write_through(&self, ns: &str, value: Option<Value>) {
        if let Some(mirror) = &self.mirror {
            let mut staged = lock(mirror);
            match value {
                Some(v) => staged.insert(ns.to_string(), v),
                None => staged.remove(ns),
            };
        }
    }

    pub fn set(&self, ns: &str, key: &str, value: Value) -> Result<(), SessionError> {
        self.write(ns, true, |map| {
            map.insert(key.to_string(), value);
        })?;
        Ok(())
    }

    pub fn get(&self, ns: &str, key: &str, default: Value) -> Value {
        self.lookup(ns, key).unwrap_or(default)
    }

    pub fn lookup(&self, ns: &str, key: &str) -> Option<Value> {
        match self.namespace_value(ns)? {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }
    }

    pub fn remove(&self, ns: &str, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.write(ns, false, |map| map.remove(key))?.flatten())
    }

    /// Drop the whole namespace.
    pub fn clear(&self, ns: &str) -> Result<(), SessionError> {
        if is_reserved(ns) {
            return Err(SessionError::ReservedKey(ns.to_string()));
        }
        if let Some(handle) = self.transport() {
            handle.remove(ns)?;
            self.write_through(ns, None);
            return Ok(());
        }
        match &self.mirror {
            Some(mirror) => lock(mirror).remove(ns),
            None => lock(&self.memory).remove(ns),
        };
        Ok(())
    }

    /// Every key of a namespace. Does not create it.
    pub fn all(&self, ns: &str) -> Map<String, Value> {
        match self.namespace_value(ns) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn has_namespace(&self, ns: &str) -> bool {
        self.namespace_value(ns).is_some()
    }

    /// Remove every namespace from every tier, keeping `id` and `cookie`.
    pub fn clear_all(&self) -> Result<(), SessionError> {
        if let Some(handle) = self.transport() {
            handle.update(|data| data.retain(|k, _| is_reserved(k)))?;
        }
        if let Some(mirror) = &self.mirror {
            lock(mirror).retain(|k, _| is_reserved(k));
        }
        lock(&self.memory).clear();
        Ok(())
    }

    /// Copy every mirror-tier key except `id`/`cookie` into the transport session.
    /// Keys the transport refuses are logged and skipped. Returns the number of keys changed.
    pub fn reconcile(&self) -> usize {
        let (Some(handle), Some(mirror)) = (self.transport(), &self.mirror) else {
            tracing::debug!("session reconcile skipped: no transport session or mirror tier");
            return 0;
        };
        let staged: Vec<(String, Value)> = lock(mirror)
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut changed = 0;
        for (key, value) in staged {
            match handle.insert(key.clone(), value) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "session reconcile: skipping key"),
            }
        }
        tracing::debug!(changed, "session reconciled");
        changed
    }

    /// Force-persist the transport session. Store failures are logged, never raised.
    pub async fn save(&self) -> bool {
        let Some(handle) = self.transport() else {
            return false;
        };
        match handle.save().await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(session = %handle.id(), error = %e, "session persist failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::MemorySessionStore;
    use serde_json::json;

    fn handle() -> SessionHandle {
        SessionHandle::create(Arc::new(MemorySessionStore::new()), &SessionConfig::default())
    }

    #[test]
    fn write_then_read_round_trips_on_every_tier() {
        for mirror in [SessionMirror::in_memory(), SessionMirror::per_request()] {
            mirror.set("FlashMessenger", "success", json!(["saved"])).unwrap();
            assert_eq!(mirror.lookup("FlashMessenger", "success"), Some(json!(["saved"])));
        }
        let mirror = SessionMirror::per_request();
        mirror.attach(handle());
        assert_eq!(mirror.active_tier(), Tier::Transport);
        mirror.set("AuthIdentity", "storage", json!("admin")).unwrap();
        assert_eq!(mirror.get("AuthIdentity", "storage", Value::Null), json!("admin"));
    }

    #[test]
    fn tier_priority_is_transport_mirror_memory() {
        assert_eq!(SessionMirror::in_memory().active_tier(), Tier::Memory);
        let mirror = SessionMirror::per_request();
        assert_eq!(mirror.active_tier(), Tier::Mirror);
        mirror.attach(handle());
        assert_eq!(mirror.active_tier(), Tier::Transport);
    }

    #[test]
    fn reading_does_not_create_namespace() {
        let mirror = SessionMirror::per_request();
        assert_eq!(mirror.get("security", "csrf", json!("none")), json!("none"));
        assert!(mirror.all("security").is_empty());
        assert!(!mirror.has_namespace("security"));
        assert_eq!(mirror.remove("security", "csrf").unwrap(), None);
        assert!(!mirror.has_namespace("security"));
    }

    #[test]
    fn staged_values_are_readable_after_attach() {
        let mirror = SessionMirror::per_request();
        mirror.set("security", "csrf_token", json!("early")).unwrap();
        let h = handle();
        mirror.attach(h.clone());
        assert_eq!(mirror.lookup("security", "csrf_token"), Some(json!("early")));
        assert_eq!(h.get("security"), Some(json!({"csrf_token": "early"})));
        assert_eq!(mirror.reconcile(), 0);
        assert_eq!(h.get("security"), Some(json!({"csrf_token": "early"})));
    }

    #[test]
    fn staged_values_survive_attach_over_stored_data() {
        let mirror = SessionMirror::per_request();
        mirror.set("FlashMessenger", "success", json!(["saved"])).unwrap();
        let h = handle();
        h.insert("FlashMessenger", json!({"info": ["older"]})).unwrap();
        mirror.attach(h.clone());
        assert_eq!(mirror.lookup("FlashMessenger", "success"), Some(json!(["saved"])));
        assert_eq!(mirror.lookup("FlashMessenger", "info"), Some(json!(["older"])));
    }

    #[test]
    fn reconcile_never_touches_reserved_keys() {
        let shared = ProcessMirror::new();
        lock(&shared.data).insert("id".into(), json!("forged"));
        lock(&shared.data).insert("cookie".into(), json!({"path": "/evil"}));
        let mirror = SessionMirror::shared(&shared);
        let h = handle();
        let id = h.id();
        mirror.attach(h.clone());
        mirror.reconcile();
        assert_eq!(h.get("id"), Some(json!(id)));
        assert_eq!(h.get("cookie").unwrap()["path"], "/");
        assert!(matches!(mirror.set("id", "x", json!(1)), Err(SessionError::ReservedKey(_))));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mirror = SessionMirror::per_request();
        mirror.set("FlashMessenger", "info", json!(["hi"])).unwrap();
        let h = handle();
        mirror.attach(h.clone());
        mirror.reconcile();
        let once = h.snapshot();
        let revision = h.revision();
        assert_eq!(mirror.reconcile(), 0);
        assert_eq!(h.snapshot(), once);
        assert_eq!(h.revision(), revision);
    }

    #[test]
    fn cleared_namespace_is_not_resurrected_by_reconcile() {
        let mirror = SessionMirror::per_request();
        let h = handle();
        h.insert("AuthIdentity", json!({"storage": "admin"})).unwrap();
        mirror.attach(h.clone());
        mirror.clear("AuthIdentity").unwrap();
        mirror.reconcile();
        assert_eq!(h.get("AuthIdentity"), None);
    }

    #[test]
    fn stored_values_merge_under_staged_ones() {
        let mirror = SessionMirror::per_request();
        mirror.set("prefs", "theme", json!("dark")).unwrap();
        let h = handle();
        h.insert("prefs", json!({"theme": "light", "lang": "en"})).unwrap();
        mirror.attach(h.clone());
        mirror.reconcile();
        assert_eq!(h.get("prefs"), Some(json!({"theme": "dark", "lang": "en"})));
    }

    #[tokio::test]
    async fn reconcile_failure_is_swallowed() {
        let mirror = SessionMirror::per_request();
        mirror.set("blog", "draft", json!(1)).unwrap();
        let h = handle();
        mirror.attach(h.clone());
        h.destroy().await.unwrap();
        assert_eq!(mirror.reconcile(), 0);
        assert!(!mirror.save().await);
    }
}
