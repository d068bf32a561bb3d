//! Custom bean scopes
//!
//! Beans whose definition names a scope other than singleton or prototype
//! are obtained through the [`Scope`] registered under that name. The scope
//! decides when to reuse an instance and when to create one through the
//! container-provided factory.

use crate::storage::{self, NameMap};
use crate::value::BeanRef;
use crate::Result;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Callback run when a scoped bean's scope ends.
pub type DestructionCallback = Box<dyn FnOnce() + Send + Sync>;

/// Strategy for a custom scope.
pub trait Scope: Send + Sync {
    /// Return the scoped instance of `name`, calling `factory` if the scope
    /// holds none yet.
    fn get(&self, name: &str, factory: &mut dyn FnMut() -> Result<BeanRef>) -> Result<BeanRef>;

    /// Remove `name` from the scope, discarding its destruction callback.
    fn remove(&self, name: &str) -> Option<BeanRef>;

    /// Run `callback` when `name` is destroyed with the scope.
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);

    /// Identifier of the underlying conversation, if any.
    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// Unique scope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// A map-backed scope that lives until [`close`](SimpleScope::close) is called.
///
/// Useful for request- or session-like lifetimes: create one per unit of
/// work, register it under a scope name, and close it when the work ends.
///
/// ```rust
/// use bean_container::{BeanClass, BeanDefinition, BeanScope, Container, SimpleScope};
/// use std::sync::Arc;
///
/// struct RequestState;
///
/// let container = Container::new();
/// let request = Arc::new(SimpleScope::new());
/// container.register_scope("request", request.clone()).unwrap();
/// container
///     .register_definition(
///         "state",
///         BeanDefinition::of_class(
///             BeanClass::builder::<RequestState>()
///                 .default_constructor(|| RequestState)
///                 .build(),
///         )
///         .scope(BeanScope::Custom("request".into())),
///     )
///     .unwrap();
///
/// let a = container.get::<RequestState>("state").unwrap();
/// let b = container.get::<RequestState>("state").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// request.close();
/// let c = container.get::<RequestState>("state").unwrap();
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
pub struct SimpleScope {
    id: ScopeId,
    objects: NameMap<BeanRef>,
    /// Held while a factory runs; re-entered when one scoped bean needs another
    creation_lock: ReentrantMutex<()>,
    callbacks: Mutex<Vec<(String, DestructionCallback)>>,
}

impl SimpleScope {
    pub fn new() -> Self {
        let id = ScopeId::new();

        #[cfg(feature = "logging")]
        debug!(target: "bean_container", scope_id = id.id(), "Creating scope");

        Self {
            id,
            objects: storage::name_map(),
            creation_lock: ReentrantMutex::new(()),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// End the scope: run destruction callbacks in reverse registration
    /// order and drop every scoped instance.
    pub fn close(&self) {
        let callbacks: Vec<_> = std::mem::take(&mut *self.callbacks.lock());

        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            scope_id = self.id.id(),
            callbacks = callbacks.len(),
            "Closing scope"
        );

        for (_name, callback) in callbacks.into_iter().rev() {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)).is_err() {
                #[cfg(feature = "logging")]
                warn!(
                    target: "bean_container",
                    scope_id = self.id.id(),
                    bean = %_name,
                    "Destruction callback panicked"
                );
            }
        }
        self.objects.clear();
    }
}

impl Default for SimpleScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for SimpleScope {
    fn get(&self, name: &str, factory: &mut dyn FnMut() -> Result<BeanRef>) -> Result<BeanRef> {
        if let Some(existing) = storage::get_cloned(&self.objects, name) {
            return Ok(existing);
        }
        let _guard = self.creation_lock.lock();
        if let Some(existing) = storage::get_cloned(&self.objects, name) {
            return Ok(existing);
        }
        // No shard guard may be held here: the factory can re-enter the scope.
        let created = factory()?;
        self.objects.insert(name.to_owned(), Arc::clone(&created));
        Ok(created)
    }

    fn remove(&self, name: &str) -> Option<BeanRef> {
        self.callbacks.lock().retain(|(n, _)| n != name);
        self.objects.remove(name).map(|(_, bean)| bean)
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        self.callbacks.lock().push((name.to_owned(), callback));
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.id.to_string())
    }
}

impl std::fmt::Debug for SimpleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleScope")
            .field("id", &self.id)
            .field("objects", &self.objects.len())
            .finish()
    }
}
