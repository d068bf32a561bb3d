//! Singleton registry and dependent-bean graph
//!
//! Every singleton name maps to at most one [`SingletonEntry`]:
//!
//! - `Building` holds a factory that can produce an early reference to a bean
//!   whose construction has started but not finished;
//! - `EarlyRef` holds such an early reference once someone asked for it;
//! - `Built` holds the finished bean.
//!
//! An entry only moves forward (`Building -> EarlyRef -> Built`) within one
//! creation attempt. Finished singletons are read without locking. Creating a
//! singleton and touching early entries happen under one reentrant creation
//! lock, so a singleton's supplier runs at most once even when many threads
//! ask for it concurrently.

use crate::storage::{self, NameMap, NameSet};
use crate::value::BeanRef;
use crate::{BeanError, Result};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Produces an early reference to a bean under construction.
pub(crate) type EarlyFactory = Arc<dyn Fn() -> Result<BeanRef> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum SingletonEntry {
    Building(EarlyFactory),
    EarlyRef(BeanRef),
    Built(BeanRef),
}

/// Something to run when a bean is destroyed. Failures are logged by the
/// implementation, never propagated.
pub(crate) trait Disposable: Send + Sync {
    fn destroy(&self);
}

pub(crate) struct SingletonRegistry {
    entries: NameMap<SingletonEntry>,
    /// Names of finished singletons in registration order
    registered: Mutex<Vec<String>>,
    creation_lock: ReentrantMutex<()>,
    in_creation: NameSet,
    suppressed: Mutex<Option<Vec<BeanError>>>,
    max_suppressed: usize,
    destroying: AtomicBool,
    disposables: Mutex<Vec<(String, Arc<dyn Disposable>)>>,
    /// containing bean -> inner beans
    contained: Mutex<HashMap<String, Vec<String>>>,
    /// bean -> beans depending on it
    dependents: Mutex<HashMap<String, Vec<String>>>,
    /// bean -> beans it depends on
    dependencies: Mutex<HashMap<String, Vec<String>>>,
}

impl SingletonRegistry {
    pub fn new(capacity: usize, max_suppressed: usize) -> Self {
        Self {
            entries: storage::name_map_with_capacity(capacity),
            registered: Mutex::new(Vec::with_capacity(capacity)),
            creation_lock: ReentrantMutex::new(()),
            in_creation: storage::name_set(),
            suppressed: Mutex::new(None),
            max_suppressed,
            destroying: AtomicBool::new(false),
            disposables: Mutex::new(Vec::new()),
            contained: Mutex::new(HashMap::new()),
            dependents: Mutex::new(HashMap::new()),
            dependencies: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Lookup and registration
    // =========================================================================

    #[inline]
    fn entry(&self, name: &str) -> Option<SingletonEntry> {
        storage::get_cloned(&self.entries, name)
    }

    /// Finished or early singleton for `name`.
    ///
    /// With `allow_early`, a pending early factory is invoked and its result
    /// promoted to an early reference.
    pub fn get_singleton(&self, name: &str, allow_early: bool) -> Result<Option<BeanRef>> {
        if let Some(SingletonEntry::Built(bean)) = self.entry(name) {
            #[cfg(feature = "logging")]
            trace!(target: "bean_container", bean = name, "Singleton cache hit");
            return Ok(Some(bean));
        }
        if !self.is_currently_in_creation(name) {
            return Ok(None);
        }

        let _guard = self.creation_lock.lock();
        match self.entry(name) {
            Some(SingletonEntry::Built(bean)) | Some(SingletonEntry::EarlyRef(bean)) => Ok(Some(bean)),
            Some(SingletonEntry::Building(factory)) if allow_early => {
                let early = factory()?;
                // The factory may have finished the bean re-entrantly.
                if let Some(SingletonEntry::Built(bean)) = self.entry(name) {
                    return Ok(Some(bean));
                }
                self.entries
                    .insert(name.to_owned(), SingletonEntry::EarlyRef(Arc::clone(&early)));

                #[cfg(feature = "logging")]
                trace!(
                    target: "bean_container",
                    bean = name,
                    "Handing out early reference to singleton in creation"
                );
                Ok(Some(early))
            }
            _ => Ok(None),
        }
    }

    /// Return the singleton for `name`, creating it with `supplier` if needed.
    pub fn get_or_create<F>(&self, name: &str, supplier: F) -> Result<BeanRef>
    where
        F: FnOnce() -> Result<BeanRef>,
    {
        let _guard = self.creation_lock.lock();
        if let Some(SingletonEntry::Built(bean)) = self.entry(name) {
            return Ok(bean);
        }
        if self.destroying.load(Ordering::Acquire) {
            return Err(BeanError::CreationNotAllowed { name: name.to_owned() });
        }

        self.before_creation(name)?;
        let record_suppressed = {
            let mut suppressed = self.suppressed.lock();
            if suppressed.is_none() {
                *suppressed = Some(Vec::new());
                true
            } else {
                false
            }
        };

        #[cfg(feature = "logging")]
        debug!(target: "bean_container", bean = name, "Creating shared instance of singleton bean");

        let result = match supplier() {
            Ok(bean) => Ok(bean),
            Err(err) => match self.entry(name) {
                // Created re-entrantly while the supplier failed further up.
                Some(SingletonEntry::Built(bean)) => Ok(bean),
                _ if record_suppressed => {
                    let related = self.suppressed.lock().take().unwrap_or_default();
                    Err(err.with_related(related))
                }
                _ => Err(err),
            },
        };

        if record_suppressed {
            *self.suppressed.lock() = None;
        }
        self.after_creation(name);

        if let Ok(bean) = &result {
            self.add_singleton(name, Arc::clone(bean));
        }
        result
    }

    fn before_creation(&self, name: &str) -> Result<()> {
        if !self.in_creation.insert(name.to_owned()) {
            return Err(BeanError::currently_in_creation(name));
        }
        Ok(())
    }

    fn after_creation(&self, name: &str) {
        self.in_creation.remove(name);
    }

    /// Record an error seen on an alternative resolution path. Returns whether
    /// it was retained for the singleton creation in progress.
    pub fn on_suppressed(&self, err: BeanError) -> bool {
        match self.suppressed.lock().as_mut() {
            Some(list) if list.len() < self.max_suppressed => {
                list.push(err);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn max_suppressed(&self) -> usize {
        self.max_suppressed
    }

    /// Store a finished singleton, superseding any early state.
    pub fn add_singleton(&self, name: &str, bean: BeanRef) {
        let _guard = self.creation_lock.lock();
        self.entries.insert(name.to_owned(), SingletonEntry::Built(bean));
        let mut registered = self.registered.lock();
        if !registered.iter().any(|n| n == name) {
            registered.push(name.to_owned());
        }
    }

    /// Register the early-reference factory for a singleton in creation.
    pub fn add_singleton_factory(&self, name: &str, factory: EarlyFactory) {
        let _guard = self.creation_lock.lock();
        if !matches!(self.entry(name), Some(SingletonEntry::Built(_))) {
            self.entries
                .insert(name.to_owned(), SingletonEntry::Building(factory));
        }
    }

    /// Register an externally created object as a finished singleton.
    pub fn register_singleton(&self, name: &str, bean: BeanRef) -> Result<()> {
        let _guard = self.creation_lock.lock();
        if let Some(SingletonEntry::Built(_)) = self.entry(name) {
            return Err(BeanError::definition(
                name,
                "could not register object under this bean name: there is already an object bound",
            ));
        }
        self.add_singleton(name, bean);

        #[cfg(feature = "logging")]
        debug!(target: "bean_container", bean = name, "Registered singleton instance");
        Ok(())
    }

    /// Drop any cache state for `name`.
    pub fn remove_singleton(&self, name: &str) {
        let _guard = self.creation_lock.lock();
        self.entries.remove(name);
        self.registered.lock().retain(|n| n != name);
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        matches!(self.entry(name), Some(SingletonEntry::Built(_)))
    }

    pub fn singleton_names(&self) -> Vec<String> {
        self.registered.lock().clone()
    }

    pub fn singleton_count(&self) -> usize {
        self.registered.lock().len()
    }

    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }

    // =========================================================================
    // Dependent-bean graph
    // =========================================================================

    /// Record that `dependent` depends on `name`. Idempotent.
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        {
            let mut dependents = self.dependents.lock();
            let set = dependents.entry(name.to_owned()).or_default();
            if set.iter().any(|n| n == dependent) {
                return;
            }
            set.push(dependent.to_owned());
        }
        let mut dependencies = self.dependencies.lock();
        let set = dependencies.entry(dependent.to_owned()).or_default();
        if !set.iter().any(|n| n == name) {
            set.push(name.to_owned());
        }
    }

    /// Record an inner bean, destroyed together with its containing bean.
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        {
            let mut map = self.contained.lock();
            let set = map.entry(containing.to_owned()).or_default();
            if set.iter().any(|n| n == contained) {
                return;
            }
            set.push(contained.to_owned());
        }
        self.register_dependent_bean(contained, containing);
    }

    /// Whether `dependent` (transitively) depends on `name`.
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        self.is_dependent_inner(name, dependent, &mut HashSet::new())
    }

    fn is_dependent_inner(&self, name: &str, dependent: &str, seen: &mut HashSet<String>) -> bool {
        if !seen.insert(name.to_owned()) {
            return false;
        }
        let Some(direct) = self.dependents.lock().get(name).cloned() else {
            return false;
        };
        if direct.iter().any(|n| n == dependent) {
            return true;
        }
        direct
            .iter()
            .any(|transitive| self.is_dependent_inner(transitive, dependent, seen))
    }

    pub fn has_dependent_beans(&self, name: &str) -> bool {
        self.dependents
            .lock()
            .get(name)
            .is_some_and(|set| !set.is_empty())
    }

    pub fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.dependents.lock().get(name).cloned().unwrap_or_default()
    }

    pub fn dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.dependencies.lock().get(name).cloned().unwrap_or_default()
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    pub fn register_disposable(&self, name: &str, disposable: Arc<dyn Disposable>) {
        let mut disposables = self.disposables.lock();
        match disposables.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = disposable,
            None => disposables.push((name.to_owned(), disposable)),
        }
    }

    /// Destroy every disposable singleton in reverse registration order, then
    /// clear all caches.
    pub fn destroy_singletons(&self) {
        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            singletons = self.singleton_count(),
            "Destroying singletons"
        );

        self.destroying.store(true, Ordering::Release);

        let names: Vec<String> = self
            .disposables
            .lock()
            .iter()
            .map(|(n, _)| n.clone())
            .collect();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.contained.lock().clear();
        self.dependents.lock().clear();
        self.dependencies.lock().clear();

        {
            let _guard = self.creation_lock.lock();
            self.entries.clear();
            self.registered.lock().clear();
        }
        self.destroying.store(false, Ordering::Release);
    }

    /// Remove `name` from the cache and destroy it, dependents first.
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let disposable = {
            let mut disposables = self.disposables.lock();
            disposables
                .iter()
                .position(|(n, _)| n == name)
                .map(|pos| disposables.remove(pos).1)
        };
        self.destroy_bean(name, disposable);
    }

    /// Destroy a bean: its dependents, then itself, then its inner beans.
    pub fn destroy_bean(&self, name: &str, disposable: Option<Arc<dyn Disposable>>) {
        let dependents = self.dependents.lock().remove(name);
        if let Some(dependents) = dependents {
            #[cfg(feature = "logging")]
            trace!(
                target: "bean_container",
                bean = name,
                dependents = ?dependents,
                "Destroying dependent beans first"
            );
            for dependent in dependents {
                self.destroy_singleton(&dependent);
            }
        }

        if let Some(disposable) = disposable {
            disposable.destroy();
        }

        let contained = self.contained.lock().remove(name);
        if let Some(contained) = contained {
            for inner in contained {
                self.destroy_singleton(&inner);
            }
        }

        {
            let mut dependents = self.dependents.lock();
            for set in dependents.values_mut() {
                set.retain(|n| n != name);
            }
            dependents.retain(|_, set| !set.is_empty());
        }
        self.dependencies.lock().remove(name);
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("singletons", &self.singleton_count())
            .field("in_creation", &self.in_creation.len())
            .finish()
    }
}
