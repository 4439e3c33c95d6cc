//! Named, per-dispatch registries for controller plugins and view helpers.
//!
//! A [`Catalog`] is merged once at boot from the framework layer and the application layer.
//! A [`Registry`] is one request's view of a catalog: it builds entries lazily, once each,
//! bound to the dispatch that resolved the controller.

use crate::dispatch::DispatchContext;
use crate::error::{ConfigError, RegistryError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Builds one entry for a dispatch. The options are those passed to the first `get`.
pub type Constructor<T> = Arc<dyn Fn(Arc<DispatchContext>, &Value) -> Box<T> + Send + Sync>;

/// What happens when the application redeclares a framework name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Log at boot, keep the framework entry.
    Warn,
    /// Fail the boot.
    Reject,
}

/// A kind of registry entry: its label, collision policy and framework layer.
pub trait Managed: Send + Sync + 'static {
    const KIND: &'static str;
    const POLICY: CollisionPolicy;

    /// `(name, path, constructor)` for every framework entry.
    fn framework() -> Vec<(&'static str, &'static str, Constructor<Self>)>;
}

struct Entry<T: ?Sized> {
    path: String,
    build: Constructor<T>,
}

pub struct Catalog<T: ?Sized> {
    entries: HashMap<String, Entry<T>>,
    collisions: Vec<String>,
}

impl<T: ?Sized + Managed> Catalog<T> {
    /// Merge `configured` (name -> path) over the framework layer. Paths resolve against
    /// `registered` (path -> constructor) first, then against framework paths.
    pub fn merge(
        configured: &BTreeMap<String, String>,
        registered: &HashMap<String, Constructor<T>>,
    ) -> Result<Self, ConfigError> {
        let framework = T::framework();
        let mut entries = HashMap::new();
        for (name, path, build) in &framework {
            entries.insert(
                name.to_string(),
                Entry {
                    path: path.to_string(),
                    build: Arc::clone(build),
                },
            );
        }

        let mut collisions = Vec::new();
        for (name, path) in configured {
            if let Some(existing) = entries.get(name) {
                match T::POLICY {
                    CollisionPolicy::Reject => {
                        return Err(ConfigError::Collision {
                            kind: T::KIND,
                            name: name.clone(),
                        })
                    }
                    CollisionPolicy::Warn => {
                        tracing::warn!(
                            kind = T::KIND,
                            name = %name,
                            ignored = %path,
                            kept = %existing.path,
                            "application entry collides with framework entry; framework entry wins"
                        );
                        collisions.push(name.clone());
                        continue;
                    }
                }
            }
            let build = registered
                .get(path)
                .cloned()
                .or_else(|| {
                    framework
                        .iter()
                        .find(|(_, p, _)| *p == path.as_str())
                        .map(|(_, _, b)| Arc::clone(b))
                })
                .ok_or_else(|| ConfigError::UnknownPath {
                    kind: T::KIND,
                    name: name.clone(),
                    path: path.clone(),
                })?;
            entries.insert(
                name.clone(),
                Entry {
                    path: path.clone(),
                    build,
                },
            );
        }

        tracing::debug!(kind = T::KIND, entries = entries.len(), "catalog merged");
        Ok(Catalog { entries, collisions })
    }
}

impl<T: ?Sized> Catalog<T> {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn path(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.path.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Application names that lost to a framework entry.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }
}

pub struct Registry<T: ?Sized> {
    catalog: Arc<Catalog<T>>,
    controller: Arc<DispatchContext>,
    instances: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized + Managed> Registry<T> {
    /// Bind to a dispatch that has resolved its controller.
    pub fn bind(catalog: Arc<Catalog<T>>, controller: Arc<DispatchContext>) -> Result<Self, RegistryError> {
        if controller.controller_key().is_none() {
            return Err(RegistryError::NotAController { kind: T::KIND });
        }
        Ok(Registry {
            catalog,
            controller,
            instances: Mutex::new(HashMap::new()),
        })
    }

    /// Instance for `name`, built on first use. Unknown names yield `None`.
    pub fn get(&self, name: &str, options: &Value) -> Option<Arc<T>> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(found) = instances.get(name) {
            return Some(Arc::clone(found));
        }
        let Some(entry) = self.catalog.entries.get(name) else {
            tracing::warn!(kind = T::KIND, name, "unknown registry entry");
            return None;
        };
        let built: Arc<T> = Arc::from((entry.build)(Arc::clone(&self.controller), options));
        instances.insert(name.to_string(), Arc::clone(&built));
        Some(built)
    }

    pub fn has(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }

    pub fn catalog(&self) -> &Arc<Catalog<T>> {
        &self.catalog
    }

    pub fn controller(&self) -> &Arc<DispatchContext> {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TransportRequest;
    use crate::routing::{RouteMatch, RouteTable};
    use crate::session::SessionMirror;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello(String);

    impl Greeter for Hello {
        fn greet(&self) -> String {
            self.0.clone()
        }
    }

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    fn hello(_: Arc<DispatchContext>, options: &Value) -> Box<dyn Greeter> {
        BUILT.fetch_add(1, Ordering::SeqCst);
        Box::new(Hello(options.as_str().unwrap_or("framework").to_string()))
    }

    fn app_hello(_: Arc<DispatchContext>, _: &Value) -> Box<dyn Greeter> {
        Box::new(Hello("app".into()))
    }

    impl Managed for dyn Greeter {
        const KIND: &'static str = "greeter";
        const POLICY: CollisionPolicy = CollisionPolicy::Warn;

        fn framework() -> Vec<(&'static str, &'static str, Constructor<Self>)> {
            vec![("hello", "Folio/Hello", Arc::new(hello) as Constructor<Self>)]
        }
    }

    fn ctx(resolved: bool) -> Arc<DispatchContext> {
        let ctx = DispatchContext::new(
            RouteMatch::not_found(),
            TransportRequest::get("/"),
            Arc::new(RouteTable::default()),
            SessionMirror::per_request(),
        );
        if resolved {
            ctx.resolve_controller("Blog/IndexController");
        }
        Arc::new(ctx)
    }

    fn app_layer() -> HashMap<String, Constructor<dyn Greeter>> {
        HashMap::from([("App/Hello".to_string(), Arc::new(app_hello) as Constructor<dyn Greeter>)])
    }

    #[test]
    fn collision_is_reported_and_framework_wins() {
        let configured = BTreeMap::from([
            ("hello".to_string(), "App/Hello".to_string()),
            ("aloha".to_string(), "App/Hello".to_string()),
        ]);
        let catalog = Catalog::<dyn Greeter>::merge(&configured, &app_layer()).unwrap();
        assert_eq!(catalog.collisions(), ["hello".to_string()]);
        assert_eq!(catalog.path("hello"), Some("Folio/Hello"));
        assert_eq!(catalog.names(), vec!["aloha", "hello"]);

        let registry = Registry::bind(Arc::new(catalog), ctx(true)).unwrap();
        assert_eq!(registry.get("hello", &Value::Null).unwrap().greet(), "framework");
        assert_eq!(registry.get("aloha", &Value::Null).unwrap().greet(), "app");
    }

    #[test]
    fn framework_paths_can_be_aliased_by_name() {
        let configured = BTreeMap::from([("hi".to_string(), "Folio/Hello".to_string())]);
        let catalog = Catalog::<dyn Greeter>::merge(&configured, &HashMap::new()).unwrap();
        assert!(catalog.contains("hi"));
        assert!(catalog.collisions().is_empty());
    }

    #[test]
    fn unknown_path_fails_the_merge() {
        let configured = BTreeMap::from([("x".to_string(), "App/Missing".to_string())]);
        let err = Catalog::<dyn Greeter>::merge(&configured, &HashMap::new()).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownPath { kind: "greeter", .. }));
    }

    #[test]
    fn entries_are_built_once_per_registry() {
        let catalog = Arc::new(Catalog::<dyn Greeter>::merge(&BTreeMap::new(), &HashMap::new()).unwrap());
        let before = BUILT.load(Ordering::SeqCst);
        let registry = Registry::bind(Arc::clone(&catalog), ctx(true)).unwrap();
        let a = registry.get("hello", &Value::String("first".into())).unwrap();
        let b = registry.get("hello", &Value::String("second".into())).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.greet(), "first");
        assert!(BUILT.load(Ordering::SeqCst) >= before + 1);

        let other = Registry::bind(catalog, ctx(true)).unwrap();
        assert!(!Arc::ptr_eq(&a, &other.get("hello", &Value::Null).unwrap()));
    }

    #[test]
    fn unknown_name_is_none() {
        let catalog = Arc::new(Catalog::<dyn Greeter>::merge(&BTreeMap::new(), &HashMap::new()).unwrap());
        let registry = Registry::bind(catalog, ctx(true)).unwrap();
        assert!(registry.get("missing", &Value::Null).is_none());
        assert!(!registry.has("missing"));
    }

    #[test]
    fn binding_requires_a_resolved_controller() {
        let catalog = Arc::new(Catalog::<dyn Greeter>::merge(&BTreeMap::new(), &HashMap::new()).unwrap());
        assert!(matches!(
            Registry::bind(catalog, ctx(false)),
            Err(RegistryError::NotAController { kind: "greeter" })
        ));
    }
}
