//! Definition store
//!
//! Holds raw bean definitions and aliases, and lazily produces merged
//! definitions (child combined with parent), caching them per name until the
//! raw definition changes. Mutation is serialized by a configuration lock that
//! is separate from the singleton creation lock, so registering definitions
//! never contends with bean creation.

use crate::config::ContainerConfig;
use crate::definition::{merge, BeanDefinition, MergedDefinition};
use crate::storage::{self, NameMap};
use crate::{BeanError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Outcome of registering a definition.
#[derive(Debug)]
pub(crate) enum Registered {
    New,
    /// An existing definition was replaced
    Replaced,
}

pub(crate) struct DefinitionRegistry {
    definitions: NameMap<Arc<BeanDefinition>>,
    /// Registration order
    names: RwLock<Vec<String>>,
    /// alias -> name (which may itself be an alias)
    aliases: NameMap<String>,
    merged: NameMap<Arc<MergedDefinition>>,
    frozen: AtomicBool,
    config_lock: Mutex<()>,
    allow_overriding: bool,
    cache_metadata: bool,
}

impl DefinitionRegistry {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            definitions: storage::name_map_with_capacity(config.initial_capacity),
            names: RwLock::new(Vec::with_capacity(config.initial_capacity)),
            aliases: storage::name_map(),
            merged: storage::name_map_with_capacity(config.initial_capacity),
            frozen: AtomicBool::new(false),
            config_lock: Mutex::new(()),
            allow_overriding: config.allow_bean_definition_overriding,
            cache_metadata: config.cache_bean_metadata,
        }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    pub fn register(&self, name: &str, definition: BeanDefinition) -> Result<Registered> {
        definition.validate(name)?;
        let _guard = self.config_lock.lock();
        if self.is_frozen() {
            return Err(BeanError::ConfigurationFrozen);
        }

        let existing = storage::get_cloned(&self.definitions, name);
        if existing.is_some() && !self.allow_overriding {
            return Err(BeanError::DefinitionOverride { name: name.to_owned() });
        }
        if self.aliases.contains_key(name) {
            if !self.allow_overriding {
                return Err(BeanError::definition(
                    name,
                    "name is already in use as an alias",
                ));
            }
            self.aliases.remove(name);
        }

        self.definitions.insert(name.to_owned(), Arc::new(definition));
        self.reset_merged(name);

        match existing {
            Some(_) => {
                #[cfg(feature = "logging")]
                warn!(
                    target: "bean_container",
                    bean = name,
                    "Overriding bean definition"
                );
                Ok(Registered::Replaced)
            }
            None => {
                self.names.write().push(name.to_owned());
                #[cfg(feature = "logging")]
                debug!(
                    target: "bean_container",
                    bean = name,
                    "Registered bean definition"
                );
                Ok(Registered::New)
            }
        }
    }

    pub fn remove(&self, name: &str) -> Result<Arc<BeanDefinition>> {
        let _guard = self.config_lock.lock();
        if self.is_frozen() {
            return Err(BeanError::ConfigurationFrozen);
        }
        let (_, removed) = self
            .definitions
            .remove(name)
            .ok_or_else(|| BeanError::no_such_bean(name))?;
        self.names.write().retain(|n| n != name);
        self.reset_merged(name);
        Ok(removed)
    }

    /// Drop the merged definition of `name` and of every definition that
    /// (transitively) names it as parent.
    fn reset_merged(&self, name: &str) {
        let mut pending = vec![name.to_owned()];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            self.merged.remove(&current);
            pending.extend(
                self.definitions
                    .iter()
                    .filter(|e| e.value().parent.as_deref() == Some(current.as_str()))
                    .map(|e| e.key().clone()),
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        storage::get_cloned(&self.definitions, name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.names.read().clone()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        if name.is_empty() || alias.is_empty() {
            return Err(BeanError::definition(alias, "alias and name must not be empty"));
        }
        let _guard = self.config_lock.lock();
        if alias == name {
            self.aliases.remove(alias);
            return Ok(());
        }
        if let Some(existing) = storage::get_cloned(&self.aliases, alias) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(BeanError::definition(
                    alias,
                    format!("alias is already registered for bean '{existing}'"),
                ));
            }
        }
        if self.canonical_name(name) == alias || self.resolves_to(name, alias) {
            return Err(BeanError::definition(
                alias,
                format!("circular alias reference: '{alias}' already refers to '{name}'"),
            ));
        }
        self.aliases.insert(alias.to_owned(), name.to_owned());

        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            bean = name,
            alias = alias,
            "Registered alias"
        );
        Ok(())
    }

    fn resolves_to(&self, from: &str, to: &str) -> bool {
        let mut current = from.to_owned();
        let mut hops = 0;
        while let Some(next) = storage::get_cloned(&self.aliases, &current) {
            if next == to {
                return true;
            }
            current = next;
            hops += 1;
            if hops > self.aliases.len() {
                break;
            }
        }
        false
    }

    /// Follow the alias chain to the canonical bean name.
    pub fn canonical_name(&self, name: &str) -> String {
        let mut current = name.to_owned();
        let mut hops = 0;
        while let Some(next) = storage::get_cloned(&self.aliases, &current) {
            current = next;
            hops += 1;
            if hops > self.aliases.len() {
                break;
            }
        }
        current
    }

    /// Every alias that resolves to `name`.
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let mut result: Vec<String> = storage::keys(&self.aliases)
            .into_iter()
            .filter(|alias| self.canonical_name(alias) == name)
            .collect();
        result.sort();
        result
    }

    // =========================================================================
    // Merged definitions
    // =========================================================================

    /// Merged definition for a canonical name.
    ///
    /// `external` supplies merged parents that are not defined locally
    /// (ancestor containers).
    pub fn merged(
        &self,
        name: &str,
        external: &dyn Fn(&str) -> Result<BeanDefinition>,
    ) -> Result<Arc<MergedDefinition>> {
        if let Some(cached) = storage::get_cloned(&self.merged, name) {
            #[cfg(feature = "logging")]
            trace!(target: "bean_container", bean = name, "Merged definition cache hit");
            return Ok(cached);
        }

        let definition = self.merge_chain(name, external, &mut Vec::new())?;
        let merged = Arc::new(MergedDefinition::new(name, definition));
        if !self.cache_metadata {
            return Ok(merged);
        }
        // First writer wins so concurrent mergers share one resolution cache.
        let entry = self.merged.entry(name.to_owned()).or_insert(merged);
        Ok(Arc::clone(entry.value()))
    }

    fn merge_chain(
        &self,
        name: &str,
        external: &dyn Fn(&str) -> Result<BeanDefinition>,
        visiting: &mut Vec<String>,
    ) -> Result<BeanDefinition> {
        let raw = self.get(name).ok_or_else(|| BeanError::no_such_bean(name))?;
        let Some(parent) = raw.parent.as_deref() else {
            return Ok((*raw).clone());
        };

        if visiting.iter().any(|n| n == name) {
            return Err(BeanError::definition(
                name,
                format!("circular parent definition chain: {}", visiting.join(" -> ")),
            ));
        }
        visiting.push(name.to_owned());

        let parent_name = self.canonical_name(parent);
        let parent_def = if parent_name != name && self.contains(&parent_name) {
            match storage::get_cloned(&self.merged, &parent_name) {
                Some(cached) => cached.definition().clone(),
                None => self.merge_chain(&parent_name, external, visiting)?,
            }
        } else {
            external(&parent_name).map_err(|err| {
                if parent_name == name {
                    BeanError::definition(
                        name,
                        format!("parent name '{parent_name}' is equal to bean name and no ancestor container defines it"),
                    )
                } else {
                    BeanError::definition(
                        name,
                        format!("could not resolve parent bean definition '{parent_name}': {err}"),
                    )
                }
            })?
        };

        visiting.pop();
        Ok(merge(&parent_def, &raw))
    }

    /// Drop every merged definition (used when processors are added).
    pub fn clear_merged(&self) {
        self.merged.clear();
    }

    // =========================================================================
    // Freezing
    // =========================================================================

    pub fn freeze(&self) {
        let _guard = self.config_lock.lock();
        self.frozen.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            definitions = self.definitions.len(),
            "Configuration frozen"
        );
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("definitions", &self.definitions.len())
            .field("aliases", &self.aliases.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
