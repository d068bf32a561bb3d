//! The bean container
//!
//! [`Container`] is a cheap, cloneable handle over shared state: the
//! definition store, the singleton registry, class metadata, hooks and
//! scopes. This module holds the public surface (`get_bean`,
//! `register_singleton`, ...) and the top of the creation pipeline; the
//! individual pipeline stages live in `instantiate`, `constructor`,
//! `populate`, `lifecycle` and `resolver`.

use crate::class::{BeanClass, ClassRegistry};
use crate::config::ContainerConfig;
use crate::context::CreationContext;
use crate::convert::{SimpleTypeConverter, TypeConverter};
use crate::definition::{AutowireMode, BeanDefinition, BeanScope, DependencyCheck, MergedDefinition};
use crate::expression::{ExpressionResolver, LiteralExpressionResolver};
use crate::processor::{apply_init_chain, Hooks, PostProcessor};
use crate::provider::{Injectable, ObjectProvider};
use crate::registry::{DefinitionRegistry, Registered};
use crate::resolver::DependencyDescriptor;
use crate::scope::Scope;
use crate::singleton::{Disposable, SingletonRegistry};
use crate::storage::{self, NameMap};
use crate::value::{BeanRef, TypeKey, TypeRef, Value};
use crate::{BeanError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Converter and resolver shared by every root container.
static DEFAULT_CONVERTER: Lazy<Arc<dyn TypeConverter>> =
    Lazy::new(|| Arc::new(SimpleTypeConverter) as Arc<dyn TypeConverter>);
static DEFAULT_EXPRESSIONS: Lazy<Arc<dyn ExpressionResolver>> =
    Lazy::new(|| Arc::new(LiteralExpressionResolver) as Arc<dyn ExpressionResolver>);

/// Cache key for type lookups: (type, include non-singletons, allow eager init)
type TypeLookupKey = (TypeId, bool, bool);

pub(crate) struct Inner {
    pub(crate) config: ContainerConfig,
    pub(crate) definitions: DefinitionRegistry,
    pub(crate) singletons: SingletonRegistry,
    /// Shared with child containers
    pub(crate) classes: Arc<ClassRegistry>,
    processors: RwLock<Arc<Hooks>>,
    scopes: NameMap<Arc<dyn Scope>>,
    resolvable: DashMap<TypeId, BeanRef, RandomState>,
    converter: RwLock<Arc<dyn TypeConverter>>,
    expressions: RwLock<Arc<dyn ExpressionResolver>>,
    pub(crate) parent: Option<Container>,
    depth: u32,
    /// Filled only once configuration is frozen
    names_by_type: DashMap<TypeLookupKey, Vec<String>, RandomState>,
}

/// IoC container creating, wiring and managing beans from definitions.
///
/// # Examples
///
/// ```rust
/// use bean_container::{BeanClass, BeanDefinition, Container, Parameter, ValueSource};
/// use std::sync::Arc;
///
/// struct Pool;
/// struct Repository {
///     pool: Arc<Pool>,
/// }
///
/// let container = Container::new();
/// container
///     .register_definition(
///         "pool",
///         BeanDefinition::of_class(BeanClass::builder::<Pool>().default_constructor(|| Pool).build()),
///     )
///     .unwrap();
/// container
///     .register_definition(
///         "repository",
///         BeanDefinition::of_class(
///             BeanClass::builder::<Repository>()
///                 .constructor([Parameter::bean::<Pool>("pool")], |args| {
///                     Ok(Repository { pool: args.bean(0)? })
///                 })
///                 .build(),
///         ),
///     )
///     .unwrap();
///
/// let repository = container.get::<Repository>("repository").unwrap();
/// let pool = container.get::<Pool>("pool").unwrap();
/// assert!(Arc::ptr_eq(&repository.pool, &pool));
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<Inner>,
}

/// Non-owning container handle held by deferred providers.
#[derive(Clone)]
pub(crate) struct WeakContainer(Weak<Inner>);

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

/// Compare bean handles by the address of their content.
#[inline]
fn same_bean(a: &BeanRef, b: &BeanRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Container {
    /// Create a new empty container with default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Create a container with pre-allocated capacity.
    ///
    /// Use this when you know approximately how many beans will be registered.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(ContainerConfig::default().initial_capacity(capacity))
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            depth = 0,
            capacity = config.initial_capacity,
            "Creating new root container"
        );

        Self::build(config, Arc::new(ClassRegistry::new()), None)
    }

    fn build(config: ContainerConfig, classes: Arc<ClassRegistry>, parent: Option<Container>) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.depth() + 1);
        let (converter, expressions): (Arc<dyn TypeConverter>, Arc<dyn ExpressionResolver>) =
            match &parent {
                Some(p) => (p.type_converter(), p.expression_resolver()),
                None => (Arc::clone(&DEFAULT_CONVERTER), Arc::clone(&DEFAULT_EXPRESSIONS)),
            };
        Self {
            inner: Arc::new(Inner {
                definitions: DefinitionRegistry::new(&config),
                singletons: SingletonRegistry::new(config.initial_capacity, config.max_suppressed_errors),
                classes,
                processors: RwLock::new(Arc::new(Hooks::default())),
                scopes: storage::name_map(),
                resolvable: storage::map(),
                converter: RwLock::new(converter),
                expressions: RwLock::new(expressions),
                parent,
                depth,
                names_by_type: storage::map(),
                config,
            }),
        }
    }

    /// Create a child container. Names not defined in the child resolve
    /// through this container; class metadata is shared.
    ///
    /// ```rust
    /// use bean_container::Container;
    ///
    /// let root = Container::new();
    /// root.register_singleton("greeting", String::from("hello")).unwrap();
    ///
    /// let child = root.child();
    /// assert!(child.contains_bean("greeting"));
    /// assert_eq!(*child.get::<String>("greeting").unwrap(), "hello");
    /// ```
    pub fn child(&self) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            parent_depth = self.depth(),
            child_depth = self.depth() + 1,
            "Creating child container"
        );

        Self::build(
            self.inner.config.clone(),
            Arc::clone(&self.inner.classes),
            Some(self.clone()),
        )
    }

    /// Nesting depth: 0 for a root container.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// Parent container, if this is a child.
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    // =========================================================================
    // Metadata and extension points
    // =========================================================================

    /// Register (or replace) class metadata.
    pub fn register_class(&self, class: Arc<BeanClass>) {
        #[cfg(feature = "logging")]
        trace!(target: "bean_container", class = class.name(), "Registering class metadata");

        self.inner.classes.register(class);
        self.inner.names_by_type.clear();
    }

    pub fn class_registry(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    /// Append a hook. Hooks run in registration order within their phase.
    pub fn add_post_processor(&self, processor: PostProcessor) {
        let mut guard = self.inner.processors.write();
        let mut hooks = Hooks::clone(&guard);
        hooks.all.push(processor);
        *guard = Arc::new(hooks);

        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            processors = guard.all.len(),
            "Added post-processor"
        );
    }

    pub fn post_processor_count(&self) -> usize {
        self.inner.processors.read().all.len()
    }

    pub(crate) fn hooks(&self) -> Arc<Hooks> {
        Arc::clone(&self.inner.processors.read())
    }

    /// Register a custom scope under `name`. `singleton` and `prototype`
    /// cannot be replaced.
    pub fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> Result<()> {
        if name == BeanScope::SINGLETON || name == BeanScope::PROTOTYPE {
            return Err(BeanError::custom(
                "Cannot replace existing scopes 'singleton' and 'prototype'",
            ));
        }
        if self.inner.scopes.insert(name.to_owned(), scope).is_some() {
            #[cfg(feature = "logging")]
            debug!(target: "bean_container", scope = name, "Replacing scope");
        }
        Ok(())
    }

    pub(crate) fn scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        storage::get_cloned(&self.inner.scopes, name)
    }

    /// Registered custom scope names.
    pub fn scope_names(&self) -> Vec<String> {
        storage::keys(&self.inner.scopes)
    }

    /// Make `value` injectable wherever `T` is wanted, without it being a
    /// bean itself.
    pub fn register_resolvable_dependency<T: Injectable>(&self, value: Arc<T>) {
        self.inner.resolvable.insert(TypeId::of::<T>(), value as BeanRef);
    }

    /// Make `value` injectable wherever the interface `I` is wanted.
    pub fn register_resolvable_interface<I: ?Sized + Send + Sync + 'static>(&self, value: Arc<I>) {
        self.inner
            .resolvable
            .insert(TypeKey::interface::<I>().id(), Arc::new(value) as BeanRef);
    }

    pub(crate) fn resolvable_dependency(&self, key: &TypeKey) -> Option<BeanRef> {
        self.inner.resolvable.get(&key.id()).map(|r| Arc::clone(r.value()))
    }

    pub fn set_type_converter(&self, converter: Arc<dyn TypeConverter>) {
        *self.inner.converter.write() = converter;
    }

    pub(crate) fn type_converter(&self) -> Arc<dyn TypeConverter> {
        Arc::clone(&self.inner.converter.read())
    }

    pub fn set_expression_resolver(&self, resolver: Arc<dyn ExpressionResolver>) {
        *self.inner.expressions.write() = resolver;
    }

    pub(crate) fn expression_resolver(&self) -> Arc<dyn ExpressionResolver> {
        Arc::clone(&self.inner.expressions.read())
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Register a bean definition. Replacing an existing definition drops the
    /// singleton built from it.
    pub fn register_definition(&self, name: &str, definition: BeanDefinition) -> Result<()> {
        if let Some(class) = definition.resolved_class() {
            self.inner.classes.register(Arc::clone(class));
        }
        let replaced = matches!(
            self.inner.definitions.register(name, definition)?,
            Registered::Replaced
        );
        if replaced || self.inner.singletons.contains_singleton(name) {
            self.inner.singletons.destroy_singleton(name);
        }
        self.inner.names_by_type.clear();
        Ok(())
    }

    /// Remove a definition and destroy its singleton, if any.
    pub fn remove_definition(&self, name: &str) -> Result<()> {
        self.inner.definitions.remove(name)?;
        self.inner.singletons.destroy_singleton(name);
        self.inner.names_by_type.clear();
        Ok(())
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        self.inner.definitions.register_alias(name, alias)
    }

    /// Other names `name` is known by. Asking with an alias includes the
    /// canonical name.
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let canonical = self.canonical_name(name);
        let mut result: Vec<String> = Vec::new();
        if canonical != name {
            result.push(canonical.clone());
        }
        result.extend(
            self.inner
                .definitions
                .aliases(&canonical)
                .into_iter()
                .filter(|alias| alias != name),
        );
        result
    }

    #[inline]
    fn canonical_name(&self, name: &str) -> String {
        self.inner.definitions.canonical_name(name)
    }

    pub fn contains_definition(&self, name: &str) -> bool {
        self.inner.definitions.contains(name)
    }

    /// Definition names in registration order.
    pub fn definition_names(&self) -> Vec<String> {
        self.inner.definitions.names()
    }

    /// Definition for `name` merged with its parents, with its resolution
    /// cache. Names not defined here are looked up in the parent container.
    pub fn merged_definition(&self, name: &str) -> Result<Arc<MergedDefinition>> {
        let name = self.canonical_name(name);
        if !self.inner.definitions.contains(&name) {
            return match &self.inner.parent {
                Some(parent) => parent.merged_definition(&name),
                None => Err(BeanError::no_such_bean(name)),
            };
        }
        let parent_lookup = |parent_name: &str| -> Result<BeanDefinition> {
            match &self.inner.parent {
                Some(parent) => parent
                    .merged_definition(parent_name)
                    .map(|merged| merged.definition().clone()),
                None => Err(BeanError::no_such_bean(parent_name)),
            }
        };
        self.inner.definitions.merged(&name, &parent_lookup)
    }

    /// Drop cached merged definitions, forcing re-resolution on next use.
    pub fn clear_metadata_cache(&self) {
        self.inner.definitions.clear_merged();
        self.inner.names_by_type.clear();
    }

    /// Disallow further definition changes. Type lookups are cached from now on.
    pub fn freeze_configuration(&self) {
        self.inner.definitions.freeze();
    }

    pub fn is_configuration_frozen(&self) -> bool {
        self.inner.definitions.is_frozen()
    }

    // =========================================================================
    // Manual singletons
    // =========================================================================

    /// Register an already-built object as a singleton.
    pub fn register_singleton<T: Injectable>(&self, name: &str, instance: T) -> Result<()> {
        if self.inner.classes.get(&TypeId::of::<T>()).is_none() {
            self.inner.classes.register(BeanClass::opaque::<T>());
        }
        self.register_singleton_ref(name, Arc::new(instance))
    }

    pub fn register_singleton_ref(&self, name: &str, bean: BeanRef) -> Result<()> {
        self.inner.singletons.register_singleton(name, bean)?;
        self.inner.names_by_type.clear();
        Ok(())
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.inner.singletons.contains_singleton(&self.canonical_name(name))
    }

    /// Names of finished singletons in registration order.
    pub fn singleton_names(&self) -> Vec<String> {
        self.inner.singletons.singleton_names()
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Get the bean registered under `name` (or an alias of it).
    pub fn get_bean(&self, name: &str) -> Result<BeanRef> {
        self.do_get_bean(name, None, &mut CreationContext::new())
    }

    /// Create the bean with explicit constructor or factory-method arguments.
    /// Arguments only apply when a new instance is created.
    pub fn get_bean_with_args(&self, name: &str, args: Vec<Value>) -> Result<BeanRef> {
        self.do_get_bean(name, Some(args), &mut CreationContext::new())
    }

    /// Get a bean as its concrete type.
    pub fn get<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        let bean = self.get_bean(name)?;
        self.downcast_bean(name, bean)
    }

    fn downcast_bean<T: Injectable>(&self, name: &str, bean: BeanRef) -> Result<Arc<T>> {
        let actual = self.inner.classes.type_name_of(&bean);
        bean.downcast::<T>().map_err(|_| BeanError::BeanNotOfRequiredType {
            name: name.to_owned(),
            required: std::any::type_name::<T>().to_owned(),
            actual,
        })
    }

    /// Get a bean viewed as interface `I`.
    pub fn get_shared<I: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<I>> {
        let bean = self.get_bean(name)?;
        let view = self.adapt_bean(name, bean, &TypeKey::interface::<I>())?;
        view.downcast_ref::<Arc<I>>()
            .cloned()
            .ok_or_else(|| BeanError::type_mismatch(std::any::type_name::<Arc<I>>(), std::any::type_name::<I>()))
    }

    /// The single bean of type `T`, chosen like an autowired dependency.
    pub fn get_by_type<T: Injectable>(&self) -> Result<Arc<T>> {
        let descriptor = DependencyDescriptor::new(TypeRef::object::<T>());
        let name = self.unique_candidate_name(&descriptor, None)?;
        self.get::<T>(&name)
    }

    /// The single bean implementing `I`.
    pub fn get_by_interface<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>> {
        let descriptor = DependencyDescriptor::new(TypeRef::interface::<I>());
        let name = self.unique_candidate_name(&descriptor, None)?;
        self.get_shared::<I>(&name)
    }

    /// Deferred handle resolving `ty` on demand.
    pub fn get_provider(&self, ty: TypeRef) -> ObjectProvider {
        ObjectProvider::new(self.downgrade(), DependencyDescriptor::new(ty), None)
    }

    /// Whether a bean or definition exists under `name` here or in an ancestor.
    pub fn contains_bean(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.contains_local_bean(&name)
            || self.inner.parent.as_ref().is_some_and(|p| p.contains_bean(&name))
    }

    fn contains_local_bean(&self, name: &str) -> bool {
        self.inner.singletons.contains_singleton(name) || self.inner.definitions.contains(name)
    }

    pub fn is_singleton(&self, name: &str) -> Result<bool> {
        let name = self.canonical_name(name);
        if self.inner.definitions.contains(&name) {
            return Ok(self.merged_definition(&name)?.is_singleton());
        }
        if self.inner.singletons.contains_singleton(&name) {
            return Ok(true);
        }
        match &self.inner.parent {
            Some(parent) => parent.is_singleton(&name),
            None => Err(BeanError::no_such_bean(name)),
        }
    }

    pub fn is_prototype(&self, name: &str) -> Result<bool> {
        let name = self.canonical_name(name);
        if self.inner.definitions.contains(&name) {
            return Ok(self.merged_definition(&name)?.is_prototype());
        }
        if self.inner.singletons.contains_singleton(&name) {
            return Ok(false);
        }
        match &self.inner.parent {
            Some(parent) => parent.is_prototype(&name),
            None => Err(BeanError::no_such_bean(name)),
        }
    }

    /// Type of the bean under `name`, from its instance if already built,
    /// else predicted from its definition. `Ok(None)` if it cannot be told.
    pub fn get_type(&self, name: &str) -> Result<Option<TypeKey>> {
        let name = self.canonical_name(name);
        let merged = if self.inner.definitions.contains(&name) {
            Some(self.merged_definition(&name)?)
        } else {
            None
        };
        if let Some(bean) = self.inner.singletons.get_singleton(&name, false)? {
            if let Some(class) = self.class_for(&bean, merged.as_deref()) {
                return Ok(Some(class.key()));
            }
        }
        if let Some(merged) = &merged {
            return Ok(self.predict_type(&name, merged));
        }
        if self.inner.singletons.contains_singleton(&name) {
            return Ok(None);
        }
        match &self.inner.parent {
            Some(parent) => parent.get_type(&name),
            None => Err(BeanError::no_such_bean(name)),
        }
    }

    /// Whether the bean under `name` can fill a slot of type `key`.
    pub fn is_type_match(&self, name: &str, key: &TypeKey) -> Result<bool> {
        let name = self.canonical_name(name);
        if let Some(bean) = self.inner.singletons.get_singleton(&name, false)? {
            return Ok(self.inner.classes.is_instance(&bean, key));
        }
        if self.inner.definitions.contains(&name) {
            let merged = self.merged_definition(&name)?;
            return Ok(self
                .predict_type(&name, &merged)
                .is_some_and(|t| self.inner.classes.is_type_assignable(&t, key)));
        }
        match &self.inner.parent {
            Some(parent) => parent.is_type_match(&name, key),
            None => Err(BeanError::no_such_bean(name)),
        }
    }

    /// Type the definition will produce, without creating the bean.
    pub(crate) fn predict_type(&self, name: &str, merged: &MergedDefinition) -> Option<TypeKey> {
        if let Some(known) = merged.resolved_target_type() {
            return Some(known);
        }
        let definition = merged.definition();
        if let Some(declared) = definition.target_type {
            return Some(declared);
        }
        if let Some(method) = definition.factory_method_name.as_deref() {
            let factory_class = match definition.factory_bean_name.as_deref() {
                Some(factory) => {
                    let key = self.get_type(factory).ok().flatten()?;
                    self.inner.classes.get(&key.id())?
                }
                None => self.resolve_bean_class(name, merged).ok()?,
            };
            let is_static = definition.factory_bean_name.is_none();
            let mut products = factory_class
                .factory_methods_named(method, is_static)
                .filter_map(|(_, m)| m.returns());
            let first = products.next()?;
            return products.all(|p| p == first).then_some(first);
        }
        if definition.instance_supplier.is_some() {
            return None;
        }
        self.resolve_bean_class(name, merged).ok().map(|class| class.key())
    }

    /// Names of beans whose type matches `key`: definitions in registration
    /// order, then manually registered singletons.
    ///
    /// With `allow_eager_init`, singletons whose type cannot be predicted are
    /// created to find out.
    pub fn bean_names_for_type(
        &self,
        key: &TypeKey,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        let cache_key = (key.id(), include_non_singletons, allow_eager_init);
        let frozen = self.is_configuration_frozen();
        if frozen {
            if let Some(cached) = self.inner.names_by_type.get(&cache_key) {
                return cached.value().clone();
            }
        }

        let mut result = Vec::new();
        for name in self.inner.definitions.names() {
            let Ok(merged) = self.merged_definition(&name) else {
                continue;
            };
            if merged.definition().is_abstract || (!include_non_singletons && !merged.is_singleton()) {
                continue;
            }
            if self.definition_matches(&name, &merged, key, allow_eager_init) {
                result.push(name);
            }
        }

        for name in self.inner.singletons.singleton_names() {
            if self.inner.definitions.contains(&name) || result.contains(&name) {
                continue;
            }
            if let Ok(Some(bean)) = self.inner.singletons.get_singleton(&name, false) {
                if self.inner.classes.is_instance(&bean, key) {
                    result.push(name);
                }
            }
        }

        if frozen {
            self.inner.names_by_type.insert(cache_key, result.clone());
        }
        result
    }

    fn definition_matches(
        &self,
        name: &str,
        merged: &MergedDefinition,
        key: &TypeKey,
        allow_eager_init: bool,
    ) -> bool {
        if let Ok(Some(bean)) = self.inner.singletons.get_singleton(name, false) {
            return self.inner.classes.is_instance(&bean, key);
        }
        match self.predict_type(name, merged) {
            Some(predicted) => self.inner.classes.is_type_assignable(&predicted, key),
            None if allow_eager_init
                && merged.is_singleton()
                && !self.inner.singletons.is_currently_in_creation(name) =>
            {
                match self.get_bean(name) {
                    Ok(bean) => self.inner.classes.is_instance(&bean, key),
                    Err(err) => {
                        #[cfg(feature = "logging")]
                        debug!(
                            target: "bean_container",
                            bean = name,
                            error = %err,
                            "Ignoring bean creation failure during type lookup"
                        );
                        self.inner.singletons.on_suppressed(err);
                        false
                    }
                }
            }
            None => false,
        }
    }

    /// Type lookup across this container and its ancestors. Ancestor beans
    /// shadowed by a local name are skipped.
    pub(crate) fn bean_names_for_type_including_ancestors(&self, key: &TypeKey) -> Vec<String> {
        let mut result = self.bean_names_for_type(key, true, true);
        if let Some(parent) = &self.inner.parent {
            for name in parent.bean_names_for_type_including_ancestors(key) {
                if !result.contains(&name) && !self.contains_local_bean(&name) {
                    result.push(name);
                }
            }
        }
        result
    }

    // =========================================================================
    // Creation pipeline
    // =========================================================================

    pub(crate) fn do_get_bean(
        &self,
        name: &str,
        args: Option<Vec<Value>>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        let name = self.canonical_name(name);

        if args.is_none() {
            if let Some(bean) = self.inner.singletons.get_singleton(&name, true)? {
                #[cfg(feature = "logging")]
                trace!(target: "bean_container", bean = %name, "Returning cached instance of singleton bean");
                return Ok(bean);
            }
        }

        if ctx.is_prototype_in_creation(&name) {
            return Err(BeanError::currently_in_creation(name));
        }

        if !self.inner.definitions.contains(&name) {
            return match &self.inner.parent {
                Some(parent) => parent.do_get_bean(&name, args, ctx),
                None => Err(BeanError::no_such_bean(name)),
            };
        }

        let merged = self.merged_definition(&name)?;
        if merged.definition().is_abstract {
            return Err(BeanError::BeanIsAbstract { name });
        }

        for dependency in &merged.definition().depends_on {
            let dependency = self.canonical_name(dependency);
            if self.inner.singletons.is_dependent(&name, &dependency) {
                return Err(BeanError::creation(
                    name.as_str(),
                    format!("Circular depends-on relationship between '{name}' and '{dependency}'"),
                ));
            }
            self.inner.singletons.register_dependent_bean(&dependency, &name);
            self.do_get_bean(&dependency, None, ctx).map_err(|err| {
                BeanError::creation_caused_by(
                    name.as_str(),
                    format!("'{name}' depends on missing bean '{dependency}'"),
                    err,
                )
            })?;
        }

        match merged.scope() {
            BeanScope::Singleton => self.inner.singletons.get_or_create(&name, || {
                self.create_bean(&name, &merged, args, ctx).inspect_err(|_| {
                    // Drop whatever an early exposure left behind.
                    self.inner.singletons.destroy_singleton(&name);
                })
            }),
            BeanScope::Prototype => {
                ctx.begin_prototype(&name)?;
                let result = self.create_bean(&name, &merged, args, ctx);
                ctx.end_prototype(&name);
                result
            }
            BeanScope::Custom(scope_name) => {
                let scope = self.scope(&scope_name).ok_or_else(|| {
                    BeanError::custom(format!("No Scope registered for scope name '{scope_name}'"))
                })?;
                let mut pending = args;
                scope.get(&name, &mut || {
                    ctx.begin_prototype(&name)?;
                    let result = self.create_bean(&name, &merged, pending.take(), ctx);
                    ctx.end_prototype(&name);
                    result
                })
            }
        }
    }

    /// Create a bean: before-instantiation hooks may short-circuit,
    /// otherwise instantiate, expose early if needed, populate, initialize
    /// and register for destruction.
    pub(crate) fn create_bean(
        &self,
        name: &str,
        merged: &MergedDefinition,
        args: Option<Vec<Value>>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        #[cfg(feature = "logging")]
        debug!(target: "bean_container", bean = name, scope = %merged.scope(), "Creating instance of bean");

        if let Some(bean) = self.resolve_before_instantiation(name, merged)? {
            return Ok(bean);
        }
        let bean = self.do_create_bean(name, merged, args, ctx)?;

        #[cfg(feature = "logging")]
        debug!(target: "bean_container", bean = name, "Finished creating instance of bean");
        Ok(bean)
    }

    fn resolve_before_instantiation(&self, name: &str, merged: &MergedDefinition) -> Result<Option<BeanRef>> {
        let definition = merged.definition();
        if definition.synthetic
            || definition.factory_method_name.is_some()
            || definition.instance_supplier.is_some()
        {
            return Ok(None);
        }
        let hooks = self.hooks();
        if hooks.before_instantiation().next().is_none() {
            return Ok(None);
        }

        let class = self.resolve_bean_class(name, merged)?;
        for hook in hooks.before_instantiation() {
            let produced = hook(&class, name).map_err(|err| {
                BeanError::creation_caused_by(name, "Post-processing before instantiation of bean failed", err)
            })?;
            if let Some(bean) = produced {
                #[cfg(feature = "logging")]
                debug!(target: "bean_container", bean = name, "Bean supplied by before-instantiation hook");
                return apply_init_chain(hooks.after_init(), bean, name).map(Some);
            }
        }
        Ok(None)
    }

    fn do_create_bean(
        &self,
        name: &str,
        merged: &MergedDefinition,
        args: Option<Vec<Value>>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        let instance = self.create_bean_instance(name, merged, args, ctx)?;
        if let Some(class) = self.class_for(&instance, Some(merged)) {
            merged.set_target_type(class.key());
        }

        let early_exposure = merged.is_singleton()
            && self.inner.config.allow_circular_references
            && self.inner.singletons.is_currently_in_creation(name);
        if early_exposure {
            #[cfg(feature = "logging")]
            trace!(
                target: "bean_container",
                bean = name,
                "Eagerly caching bean to allow for resolving potential circular references"
            );

            let hooks = self.hooks();
            let raw = Arc::clone(&instance);
            let bean_name = name.to_owned();
            let synthetic = merged.definition().synthetic;
            self.inner.singletons.add_singleton_factory(
                name,
                Arc::new(move || {
                    let mut early = Arc::clone(&raw);
                    if !synthetic {
                        for hook in hooks.early_reference() {
                            early = hook(early, &bean_name)?;
                        }
                    }
                    Ok(early)
                }),
            );
        }

        let mut exposed = self
            .populate_bean(name, merged, &instance, ctx)
            .and_then(|()| self.initialize_bean_internal(name, Arc::clone(&instance), Some(merged)))
            .map_err(|err| {
                if err.bean_name() == Some(name) {
                    err
                } else {
                    BeanError::creation_caused_by(name, "Initialization of bean failed", err)
                }
            })?;

        if early_exposure {
            if let Some(early) = self.inner.singletons.get_singleton(name, false)? {
                if same_bean(&exposed, &instance) {
                    exposed = early;
                } else if !self.inner.config.allow_raw_injection_despite_wrapping
                    && self.inner.singletons.has_dependent_beans(name)
                {
                    let dependents = self.inner.singletons.dependent_beans(name);
                    return Err(BeanError::CurrentlyInCreation {
                        name: name.to_owned(),
                        message: format!(
                            "Bean with name '{name}' has been injected into other beans [{}] in its raw version as part of a circular reference, but has eventually been wrapped. This means that said other beans do not use the final version of the bean.",
                            dependents.join(",")
                        ),
                    });
                }
            }
        }

        self.register_disposable_if_necessary(name, &exposed, merged)
            .map_err(|err| BeanError::creation_caused_by(name, "Invalid destruction signature", err))?;
        Ok(exposed)
    }

    // =========================================================================
    // Autowire-capable API
    // =========================================================================

    /// Create a one-off instance of `class`, wired according to `mode`. The
    /// result is not cached and not registered for destruction.
    pub fn create_bean_of_class(&self, class: Arc<BeanClass>, mode: AutowireMode) -> Result<BeanRef> {
        self.inner.classes.register(Arc::clone(&class));
        let name = class.name();
        let definition = BeanDefinition::of_class(class).prototype().autowire(mode);
        let merged = MergedDefinition::new(name, definition);
        self.create_bean(name, &merged, None, &mut CreationContext::new())
    }

    /// Autowire the properties of an existing object by name or by type.
    pub fn autowire_bean_properties(
        &self,
        bean: &BeanRef,
        mode: AutowireMode,
        dependency_check: bool,
    ) -> Result<()> {
        let class = self.inner.classes.class_of(bean).ok_or_else(|| {
            BeanError::custom(format!(
                "No class metadata registered for {}",
                self.inner.classes.type_name_of(bean)
            ))
        })?;
        if mode == AutowireMode::Constructor {
            return Err(BeanError::custom(
                "Constructor autowiring is not supported for an existing bean instance",
            ));
        }
        let name = class.name();
        let check = if dependency_check {
            DependencyCheck::Objects
        } else {
            DependencyCheck::None
        };
        let definition = BeanDefinition::of_class(class)
            .prototype()
            .autowire(mode)
            .dependency_check(check);
        let merged = MergedDefinition::new(name, definition);
        self.populate_bean(name, &merged, bean, &mut CreationContext::new())
    }

    /// Run aware callbacks, init hooks and the type's own init callback on an
    /// existing object.
    pub fn initialize_bean(&self, bean: BeanRef, name: &str) -> Result<BeanRef> {
        self.initialize_bean_internal(name, bean, None)
    }

    /// Run the destruction sequence on `bean` now, using the definition under
    /// `name` if there is one. Meant for prototypes, which are not tracked.
    pub fn destroy_bean(&self, name: &str, bean: &BeanRef) {
        let merged = if self.inner.definitions.contains(name) {
            self.merged_definition(name).ok()
        } else {
            None
        };
        self.destroy_with(name, bean, merged.as_deref());
    }

    fn destroy_with(&self, name: &str, bean: &BeanRef, merged: Option<&MergedDefinition>) {
        match self.disposable_for(name, bean, merged) {
            Ok(Some(adapter)) => adapter.destroy(),
            Ok(None) => {}
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!(
                    target: "bean_container",
                    bean = name,
                    error = %_err,
                    "Cannot destroy bean"
                );
            }
        }
    }

    // =========================================================================
    // Bootstrap and shutdown
    // =========================================================================

    /// Freeze configuration and create every non-abstract, non-lazy
    /// singleton, in registration order.
    pub fn preinstantiate_singletons(&self) -> Result<()> {
        self.freeze_configuration();

        #[cfg(feature = "logging")]
        debug!(
            target: "bean_container",
            definitions = self.inner.definitions.len(),
            "Pre-instantiating singletons"
        );

        for name in self.inner.definitions.names() {
            let merged = self.merged_definition(&name)?;
            if !merged.definition().is_abstract
                && merged.is_singleton()
                && !merged.definition().is_lazy_init()
            {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    /// Destroy one singleton, and every bean depending on it first.
    pub fn destroy_singleton(&self, name: &str) {
        self.inner.singletons.destroy_singleton(&self.canonical_name(name));
    }

    /// Destroy all singletons in reverse registration order.
    pub fn destroy_singletons(&self) {
        self.inner.singletons.destroy_singletons();
        self.inner.names_by_type.clear();
    }

    /// Remove the bean under `name` from its custom scope and destroy it.
    pub fn destroy_scoped_bean(&self, name: &str) -> Result<()> {
        let merged = self.merged_definition(name)?;
        let scope_name = merged.scope();
        if !matches!(scope_name, BeanScope::Custom(_)) {
            return Err(BeanError::custom(format!(
                "Bean name '{name}' does not correspond to an object in a mutable scope"
            )));
        }
        let scope = self.scope(scope_name.name()).ok_or_else(|| {
            BeanError::custom(format!("No Scope SPI registered for scope name '{scope_name}'"))
        })?;
        if let Some(bean) = scope.remove(merged.name()) {
            self.destroy_with(merged.name(), &bean, Some(&merged));
        }
        Ok(())
    }

    // =========================================================================
    // Dependent-bean graph
    // =========================================================================

    /// Record that `dependent` depends on `name`; `dependent` is destroyed
    /// before `name`.
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        let name = self.canonical_name(name);
        let dependent = self.canonical_name(dependent);
        self.inner.singletons.register_dependent_bean(&name, &dependent);
    }

    /// Beans depending on `name`.
    pub fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.inner.singletons.dependent_beans(&self.canonical_name(name))
    }

    /// Beans `name` depends on.
    pub fn dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.inner.singletons.dependencies_for_bean(&self.canonical_name(name))
    }

    /// Whether `dependent` depends on `name`, directly or transitively.
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        self.inner
            .singletons
            .is_dependent(&self.canonical_name(name), &self.canonical_name(dependent))
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.inner.definitions.len())
            .field("singletons", &self.inner.singletons.singleton_count())
            .field("classes", &self.inner.classes.len())
            .field("processors", &self.post_processor_count())
            .field("depth", &self.inner.depth)
            .field("has_parent", &self.inner.parent.is_some())
            .field("frozen", &self.is_configuration_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Parameter;
    use crate::definition::ValueSource;
    use crate::scope::SimpleScope;
    use once_cell::sync::OnceCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Config {
        url: String,
    }

    fn config_class() -> Arc<BeanClass> {
        BeanClass::builder::<Config>()
            .constructor([Parameter::new("url", TypeRef::Str)], |args| {
                Ok(Config { url: args.string(0)? })
            })
            .build()
    }

    #[test]
    fn test_manual_singleton() {
        let container = Container::new();
        container
            .register_singleton("config", Config { url: "test".into() })
            .unwrap();

        assert!(container.contains_bean("config"));
        assert!(container.is_singleton("config").unwrap());
        assert_eq!(container.get::<Config>("config").unwrap().url, "test");
        assert!(container.register_singleton("config", Config { url: "again".into() }).is_err());
    }

    #[test]
    fn test_missing_bean() {
        let container = Container::new();
        let err = container.get_bean("missing").unwrap_err();
        assert!(matches!(err, BeanError::NoSuchBean { .. }));
        assert!(container.is_singleton("missing").is_err());
    }

    #[test]
    fn test_wrong_type_request() {
        let container = Container::new();
        container.register_singleton("config", Config { url: "x".into() }).unwrap();
        let err = container.get::<String>("config").unwrap_err();
        assert!(matches!(err, BeanError::BeanNotOfRequiredType { .. }));
    }

    #[test]
    fn test_singleton_is_shared_prototype_is_not() {
        let container = Container::new();
        container
            .register_definition(
                "single",
                BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("a")),
            )
            .unwrap();
        container
            .register_definition(
                "proto",
                BeanDefinition::of_class(config_class())
                    .prototype()
                    .constructor_arg(0, ValueSource::text("b")),
            )
            .unwrap();

        let a1 = container.get::<Config>("single").unwrap();
        let a2 = container.get::<Config>("single").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));

        let b1 = container.get::<Config>("proto").unwrap();
        let b2 = container.get::<Config>("proto").unwrap();
        assert!(!Arc::ptr_eq(&b1, &b2));
        assert!(container.is_prototype("proto").unwrap());
    }

    #[test]
    fn test_get_bean_with_args() {
        let container = Container::new();
        container
            .register_definition("proto", BeanDefinition::of_class(config_class()).prototype())
            .unwrap();
        let bean = container
            .get_bean_with_args("proto", vec![Value::str("explicit")])
            .unwrap();
        assert_eq!(bean.downcast_ref::<Config>().map(|c| c.url.as_str()), Some("explicit"));
    }

    #[test]
    fn test_abstract_definition_cannot_be_created() {
        let container = Container::new();
        container
            .register_definition("base", BeanDefinition::of_class(config_class()).abstract_definition())
            .unwrap();
        assert!(matches!(
            container.get_bean("base").unwrap_err(),
            BeanError::BeanIsAbstract { .. }
        ));
        assert!(container
            .bean_names_for_type(&TypeKey::of::<Config>(), true, false)
            .is_empty());
    }

    #[test]
    fn test_replacing_definition_drops_singleton() {
        let container = Container::new();
        container
            .register_definition(
                "config",
                BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("old")),
            )
            .unwrap();
        assert_eq!(container.get::<Config>("config").unwrap().url, "old");

        container
            .register_definition(
                "config",
                BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("new")),
            )
            .unwrap();
        assert_eq!(container.get::<Config>("config").unwrap().url, "new");
    }

    #[test]
    fn test_override_disabled() {
        let container = Container::with_config(ContainerConfig::default().allow_bean_definition_overriding(false));
        container
            .register_definition("config", BeanDefinition::of_class(config_class()))
            .unwrap();
        let err = container
            .register_definition("config", BeanDefinition::of_class(config_class()))
            .unwrap_err();
        assert!(matches!(err, BeanError::DefinitionOverride { .. }));
    }

    #[test]
    fn test_aliases_resolve() {
        let container = Container::new();
        container
            .register_definition(
                "config",
                BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("x")),
            )
            .unwrap();
        container.register_alias("config", "settings").unwrap();

        let by_alias = container.get::<Config>("settings").unwrap();
        let by_name = container.get::<Config>("config").unwrap();
        assert!(Arc::ptr_eq(&by_alias, &by_name));
        assert_eq!(container.aliases("config"), vec!["settings".to_owned()]);
        assert_eq!(container.aliases("settings"), vec!["config".to_owned()]);
    }

    #[test]
    fn test_depends_on_creates_dependency_first() {
        static ORDER: AtomicUsize = AtomicUsize::new(0);
        struct First(usize);
        struct Second(usize);

        let container = Container::new();
        container
            .register_definition(
                "second",
                BeanDefinition::of_class(
                    BeanClass::builder::<Second>()
                        .default_constructor(|| Second(ORDER.fetch_add(1, Ordering::SeqCst)))
                        .build(),
                )
                .depends_on("first"),
            )
            .unwrap();
        container
            .register_definition(
                "first",
                BeanDefinition::of_class(
                    BeanClass::builder::<First>()
                        .default_constructor(|| First(ORDER.fetch_add(1, Ordering::SeqCst)))
                        .build(),
                ),
            )
            .unwrap();

        let second = container.get::<Second>("second").unwrap();
        let first = container.get::<First>("first").unwrap();
        assert!(first.0 < second.0);
        assert_eq!(container.dependent_beans("first"), vec!["second".to_owned()]);
    }

    #[test]
    fn test_circular_depends_on() {
        let container = Container::new();
        container
            .register_definition("a", BeanDefinition::of_class(config_class()).depends_on("b"))
            .unwrap();
        container
            .register_definition("b", BeanDefinition::of_class(config_class()).depends_on("a"))
            .unwrap();
        let err = container.get_bean("a").unwrap_err();
        assert!(err
            .root_cause()
            .to_string()
            .contains("Circular depends-on relationship"));
    }

    #[test]
    fn test_custom_scope_and_destroy_scoped_bean() {
        static DESTROYED: AtomicUsize = AtomicUsize::new(0);
        struct Session;

        let container = Container::new();
        let scope = Arc::new(SimpleScope::new());
        container.register_scope("session", scope.clone()).unwrap();
        container
            .register_definition(
                "session",
                BeanDefinition::of_class(
                    BeanClass::builder::<Session>()
                        .default_constructor(|| Session)
                        .on_destroy(|_| {
                            DESTROYED.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .build(),
                )
                .scope(BeanScope::Custom("session".into())),
            )
            .unwrap();

        let a = container.get::<Session>("session").unwrap();
        let b = container.get::<Session>("session").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(scope.contains("session"));

        container.destroy_scoped_bean("session").unwrap();
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
        assert!(!scope.contains("session"));
    }

    #[test]
    fn test_reserved_scope_names() {
        let container = Container::new();
        assert!(container.register_scope("singleton", Arc::new(SimpleScope::new())).is_err());
        assert!(container.register_scope("prototype", Arc::new(SimpleScope::new())).is_err());
    }

    #[test]
    fn test_unknown_scope() {
        let container = Container::new();
        container
            .register_definition(
                "config",
                BeanDefinition::of_class(config_class()).scope(BeanScope::Custom("request".into())),
            )
            .unwrap();
        let err = container.get_bean("config").unwrap_err();
        assert!(err.to_string().contains("No Scope registered for scope name 'request'"));
    }

    #[test]
    fn test_preinstantiate_skips_lazy() {
        static CREATED: AtomicUsize = AtomicUsize::new(0);
        struct Eager;
        struct Lazy;

        let container = Container::new();
        container
            .register_definition(
                "eager",
                BeanDefinition::of_class(
                    BeanClass::builder::<Eager>()
                        .default_constructor(|| {
                            CREATED.fetch_add(1, Ordering::SeqCst);
                            Eager
                        })
                        .build(),
                ),
            )
            .unwrap();
        container
            .register_definition(
                "lazy",
                BeanDefinition::of_class(
                    BeanClass::builder::<Lazy>()
                        .default_constructor(|| {
                            CREATED.fetch_add(10, Ordering::SeqCst);
                            Lazy
                        })
                        .build(),
                )
                .lazy(true),
            )
            .unwrap();

        container.preinstantiate_singletons().unwrap();
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
        assert!(container.is_configuration_frozen());
        assert!(container.contains_singleton("eager"));
        assert!(!container.contains_singleton("lazy"));
        assert!(matches!(
            container.register_definition("late", BeanDefinition::of_class(config_class())),
            Err(BeanError::ConfigurationFrozen)
        ));
    }

    #[test]
    fn test_get_type_predicts_without_creating() {
        let container = Container::new();
        container
            .register_definition("config", BeanDefinition::of_class(config_class()))
            .unwrap();
        assert_eq!(container.get_type("config").unwrap(), Some(TypeKey::of::<Config>()));
        assert!(container.is_type_match("config", &TypeKey::of::<Config>()).unwrap());
        assert!(!container.contains_singleton("config"));
    }

    #[test]
    fn test_child_container_shadows_parent() {
        let root = Container::new();
        root.register_singleton("config", Config { url: "root".into() }).unwrap();
        let child = root.child();
        assert_eq!(child.depth(), 1);
        assert_eq!(child.get::<Config>("config").unwrap().url, "root");

        child.register_singleton("config", Config { url: "child".into() }).unwrap();
        assert_eq!(child.get::<Config>("config").unwrap().url, "child");
        assert_eq!(root.get::<Config>("config").unwrap().url, "root");
        assert_eq!(
            child.bean_names_for_type_including_ancestors(&TypeKey::of::<Config>()),
            vec!["config".to_owned()]
        );
    }

    #[test]
    fn test_resolvable_dependency() {
        struct Clock;
        struct Service {
            clock: Arc<Clock>,
        }

        let container = Container::new();
        let clock = Arc::new(Clock);
        container.register_resolvable_dependency(Arc::clone(&clock));
        container
            .register_definition(
                "service",
                BeanDefinition::of_class(
                    BeanClass::builder::<Service>()
                        .constructor([Parameter::bean::<Clock>("clock")], |args| {
                            Ok(Service { clock: args.bean(0)? })
                        })
                        .build(),
                ),
            )
            .unwrap();

        let service = container.get::<Service>("service").unwrap();
        assert!(Arc::ptr_eq(&service.clock, &clock));
    }

    #[test]
    fn test_resolvable_interface() {
        trait Clock: Send + Sync {
            fn now(&self) -> i64;
        }
        struct Fixed;
        impl Clock for Fixed {
            fn now(&self) -> i64 {
                42
            }
        }
        struct Service {
            clock: Arc<dyn Clock>,
        }

        let container = Container::new();
        container.register_resolvable_interface::<dyn Clock>(Arc::new(Fixed));
        container
            .register_definition(
                "service",
                BeanDefinition::of_class(
                    BeanClass::builder::<Service>()
                        .constructor([Parameter::interface::<dyn Clock>("clock")], |args| {
                            Ok(Service { clock: args.shared(0)? })
                        })
                        .build(),
                ),
            )
            .unwrap();

        assert_eq!(container.get::<Service>("service").unwrap().clock.now(), 42);
        // Not a bean in its own right.
        assert!(container.bean_names_for_type(&TypeKey::interface::<dyn Clock>(), true, true).is_empty());
    }

    // -- autowire-capable API --------------------------------------------------

    struct Widget {
        config: OnceCell<Arc<Config>>,
        name: parking_lot::Mutex<String>,
        inits: AtomicUsize,
        destroyed: AtomicUsize,
    }

    impl Widget {
        fn new() -> Self {
            Self {
                config: OnceCell::new(),
                name: parking_lot::Mutex::new(String::new()),
                inits: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
            }
        }
    }

    fn widget_class() -> Arc<BeanClass> {
        BeanClass::builder::<Widget>()
            .default_constructor(Widget::new)
            .property("config", TypeRef::object::<Config>(), |w, v| {
                let config = v.as_bean::<Config>().ok_or_else(|| BeanError::custom("not a config"))?;
                let _ = w.config.set(config);
                Ok(())
            })
            .aware(|w, ctx| {
                *w.name.lock() = ctx.bean_name.to_owned();
                Ok(())
            })
            .on_init(|w| {
                w.inits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_destroy(|w| {
                w.destroyed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
    }

    fn with_config_bean() -> Container {
        let container = Container::new();
        container
            .register_definition(
                "config",
                BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("db")),
            )
            .unwrap();
        container
    }

    #[test]
    fn test_create_bean_of_class() {
        let container = with_config_bean();

        let first = container
            .create_bean_of_class(widget_class(), AutowireMode::ByType)
            .unwrap()
            .downcast::<Widget>()
            .unwrap();
        let second = container
            .create_bean_of_class(widget_class(), AutowireMode::ByType)
            .unwrap()
            .downcast::<Widget>()
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.config.get().unwrap().url, "db");
        assert_eq!(first.inits.load(Ordering::SeqCst), 1);
        assert!(first.name.lock().ends_with("Widget"));
        assert_eq!(container.singleton_names(), vec!["config"]);

        let plain = container
            .create_bean_of_class(widget_class(), AutowireMode::No)
            .unwrap()
            .downcast::<Widget>()
            .unwrap();
        assert!(plain.config.get().is_none());
    }

    #[test]
    fn test_autowire_bean_properties() {
        let container = with_config_bean();
        container.register_class(widget_class());

        let bean: BeanRef = Arc::new(Widget::new());
        container
            .autowire_bean_properties(&bean, AutowireMode::ByName, false)
            .unwrap();
        let widget = bean.downcast_ref::<Widget>().unwrap();
        assert_eq!(widget.config.get().unwrap().url, "db");
        // Population only: no init callbacks.
        assert_eq!(widget.inits.load(Ordering::SeqCst), 0);

        assert!(container
            .autowire_bean_properties(&bean, AutowireMode::Constructor, false)
            .is_err());
        let unknown: BeanRef = Arc::new(5i64);
        assert!(container.autowire_bean_properties(&unknown, AutowireMode::ByType, false).is_err());
    }

    #[test]
    fn test_autowire_bean_properties_dependency_check() {
        let container = Container::new();
        container.register_class(widget_class());

        let bean: BeanRef = Arc::new(Widget::new());
        container
            .autowire_bean_properties(&bean, AutowireMode::ByType, false)
            .unwrap();
        let err = container
            .autowire_bean_properties(&bean, AutowireMode::ByType, true)
            .unwrap_err();
        assert!(matches!(err, BeanError::UnsatisfiedDependency { .. }));
    }

    #[test]
    fn test_initialize_and_destroy_existing_bean() {
        let container = Container::new();
        container.register_class(widget_class());

        let bean: BeanRef = Arc::new(Widget::new());
        let initialized = container.initialize_bean(Arc::clone(&bean), "manual").unwrap();
        assert!(same_bean(&initialized, &bean));

        let widget = initialized.downcast_ref::<Widget>().unwrap();
        assert_eq!(widget.inits.load(Ordering::SeqCst), 1);
        assert_eq!(*widget.name.lock(), "manual");

        container.destroy_bean("manual", &initialized);
        assert_eq!(widget.destroyed.load(Ordering::SeqCst), 1);
        assert!(!container.contains_singleton("manual"));
    }

    #[test]
    fn test_destroy_bean_prototype_instance() {
        let container = Container::new();
        container
            .register_definition("widget", BeanDefinition::of_class(widget_class()).prototype())
            .unwrap();

        let widget = container.get::<Widget>("widget").unwrap();
        container.destroy_singletons();
        // Prototypes are not tracked.
        assert_eq!(widget.destroyed.load(Ordering::SeqCst), 0);

        container.destroy_bean("widget", &(Arc::clone(&widget) as BeanRef));
        assert_eq!(widget.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_output() {
        let container = Container::new();
        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("depth"));
    }
}
