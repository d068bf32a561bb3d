//! Bean definitions
//!
//! A [`BeanDefinition`] is the declarative recipe for a bean: where the
//! instance comes from (class constructor, factory method or supplier),
//! its scope, constructor arguments, property values and lifecycle methods.
//!
//! Child definitions name a parent and are combined with it by the pure
//! [`merge`] function. The merged result is wrapped in a [`MergedDefinition`],
//! which additionally caches what the creation pipeline learns about the
//! definition (chosen constructor, prepared arguments, converted property
//! values) so that later instances skip re-resolution.

use crate::class::BeanClass;
use crate::value::{BeanRef, TypeKey, TypeRef, Value};
use crate::{Container, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Caller-supplied instance factory, bypassing constructor resolution.
pub type InstanceSupplier = Arc<dyn Fn(&Container) -> Result<BeanRef> + Send + Sync>;

// =============================================================================
// Scope, autowiring and dependency-check modes
// =============================================================================

/// Lifetime of beans produced from a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BeanScope {
    /// One shared instance per container
    #[default]
    Singleton,
    /// A fresh instance per request
    Prototype,
    /// Instances managed by a registered [`Scope`](crate::Scope)
    Custom(String),
}

impl BeanScope {
    pub const SINGLETON: &'static str = "singleton";
    pub const PROTOTYPE: &'static str = "prototype";

    /// Parse a scope name; anything but the two built-ins is a custom scope.
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | Self::SINGLETON => Self::Singleton,
            Self::PROTOTYPE => Self::Prototype,
            other => Self::Custom(other.to_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Singleton => Self::SINGLETON,
            Self::Prototype => Self::PROTOTYPE,
            Self::Custom(name) => name,
        }
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton)
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        matches!(self, Self::Prototype)
    }
}

impl fmt::Display for BeanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How unset dependencies are wired automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutowireMode {
    #[default]
    No,
    /// Writable properties are matched against bean names
    ByName,
    /// Writable properties are resolved by their declared type
    ByType,
    /// The greediest satisfiable constructor is chosen and its parameters resolved by type
    Constructor,
}

/// Which unset properties make population fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DependencyCheck {
    #[default]
    None,
    /// Properties of simple type must be set
    Simple,
    /// Properties of object type must be set
    Objects,
    /// Every writable property must be set
    All,
}

/// Destroy method configured on a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DestroyMethod {
    /// Call the named no-arg method
    Named(String),
    /// Use `close`, then `shutdown`, if the bean's class has one
    Infer,
}

/// Name of the conventional destroy methods probed by [`DestroyMethod::Infer`].
pub const INFERRED_DESTROY_METHODS: [&str; 2] = ["close", "shutdown"];

// =============================================================================
// Value sources
// =============================================================================

/// Unresolved value of a constructor argument or property.
#[derive(Clone)]
pub enum ValueSource {
    /// Explicit null
    Null,
    /// A ready value (used as-is, converted to the target type if needed)
    Literal(Value),
    /// A string to be converted to the target type
    Text(String),
    /// Reference to another bean by name
    Ref(String),
    /// The name of another bean, validated to exist, injected as a string
    NameRef(String),
    /// Anonymous nested bean created as a dependent of its owner
    Inner(Box<BeanDefinition>),
    /// Element-wise resolved list
    List(Vec<ValueSource>),
    /// Entry-wise resolved string-keyed map
    Map(Vec<(String, ValueSource)>),
    /// Expression evaluated through the container's expression resolver
    Expr(String),
}

impl ValueSource {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn bean_ref(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    pub fn inner(definition: BeanDefinition) -> Self {
        Self::Inner(Box::new(definition))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Whether resolving this source touches other beans or the expression
    /// resolver. Such sources are never cached in resolved form.
    pub fn needs_resolution(&self) -> bool {
        match self {
            Self::Null | Self::Literal(_) | Self::Text(_) => false,
            Self::Ref(_) | Self::NameRef(_) | Self::Inner(_) | Self::Expr(_) => true,
            Self::List(items) => items.iter().any(Self::needs_resolution),
            Self::Map(entries) => entries.iter().any(|(_, v)| v.needs_resolution()),
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Ref(n) => f.debug_tuple("Ref").field(n).finish(),
            Self::NameRef(n) => f.debug_tuple("NameRef").field(n).finish(),
            Self::Inner(d) => f.debug_tuple("Inner").field(d).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Expr(e) => f.debug_tuple("Expr").field(e).finish(),
        }
    }
}

impl From<Value> for ValueSource {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// A constructor argument with optional type and parameter-name hints.
#[derive(Debug, Clone)]
pub struct ValueHolder {
    pub source: ValueSource,
    pub ty: Option<TypeRef>,
    pub name: Option<String>,
}

impl ValueHolder {
    pub fn new(source: ValueSource) -> Self {
        Self {
            source,
            ty: None,
            name: None,
        }
    }

    pub fn typed(source: ValueSource, ty: TypeRef) -> Self {
        Self {
            source,
            ty: Some(ty),
            name: None,
        }
    }

    pub fn named(source: ValueSource, name: impl Into<String>) -> Self {
        Self {
            source,
            ty: None,
            name: Some(name.into()),
        }
    }
}

/// Constructor or factory-method arguments: indexed first, then generic.
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgs {
    pub indexed: BTreeMap<usize, ValueHolder>,
    pub generic: Vec<ValueHolder>,
}

impl ConstructorArgs {
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    /// Minimum parameter count a candidate needs to accept these arguments.
    pub fn min_required(&self) -> usize {
        let highest = self.indexed.keys().next_back().map(|i| i + 1).unwrap_or(0);
        highest.max(self.len())
    }

    /// Overlay `other`: indexed arguments replace by index, generic ones append.
    pub fn add_all(&mut self, other: &ConstructorArgs) {
        for (index, holder) in &other.indexed {
            self.indexed.insert(*index, holder.clone());
        }
        self.generic.extend(other.generic.iter().cloned());
    }
}

/// A named property value.
#[derive(Debug, Clone)]
pub struct PropertyValue {
    pub name: String,
    pub source: ValueSource,
}

/// Ordered, name-unique property values.
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the value for `name`.
    pub fn add(&mut self, name: impl Into<String>, source: ValueSource) {
        let name = name.into();
        match self.values.iter_mut().find(|pv| pv.name == name) {
            Some(existing) => existing.source = source,
            None => self.values.push(PropertyValue { name, source }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ValueSource> {
        self.values.iter().find(|pv| pv.name == name).map(|pv| &pv.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|pv| pv.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ValueSource> {
        let pos = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(pos).source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|pv| pv.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other`; values from `other` win.
    pub fn add_all(&mut self, other: &PropertyValues) {
        for pv in &other.values {
            self.add(pv.name.clone(), pv.source.clone());
        }
    }
}

impl IntoIterator for PropertyValues {
    type Item = PropertyValue;
    type IntoIter = std::vec::IntoIter<PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

// =============================================================================
// BeanDefinition
// =============================================================================

/// Where a definition's class comes from.
#[derive(Clone)]
pub enum ClassRef {
    Resolved(Arc<BeanClass>),
    /// Looked up in the class registry by (full or short) type name
    Named(String),
    /// Evaluated through the expression resolver, then looked up by name
    Expr(String),
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(class) => write!(f, "Resolved({})", class.name()),
            Self::Named(name) => write!(f, "Named({name})"),
            Self::Expr(expr) => write!(f, "Expr({expr})"),
        }
    }
}

/// Declarative recipe for a bean.
///
/// ```rust
/// use bean_container::{BeanDefinition, BeanScope, ValueSource};
///
/// let def = BeanDefinition::named_class("Repository")
///     .scope(BeanScope::Prototype)
///     .constructor_arg(0, ValueSource::text("jdbc:test"))
///     .property("pool", ValueSource::bean_ref("pool"))
///     .init_method("connect");
/// assert!(def.scope_or_default().is_prototype());
/// ```
#[derive(Clone, Default)]
pub struct BeanDefinition {
    pub parent: Option<String>,
    pub class: Option<ClassRef>,
    /// `None` inherits from the parent (or defaults to singleton)
    pub scope: Option<BeanScope>,
    pub is_abstract: bool,
    /// `None` inherits from the parent (or defaults to eager)
    pub lazy_init: Option<bool>,
    pub autowire: AutowireMode,
    pub dependency_check: DependencyCheck,
    pub depends_on: Vec<String>,
    pub autowire_candidate: Option<bool>,
    pub primary: bool,
    pub priority: Option<i32>,
    /// Type the bean will have, for definitions whose class cannot tell
    /// (instance suppliers)
    pub target_type: Option<TypeKey>,
    pub instance_supplier: Option<InstanceSupplier>,
    pub factory_bean_name: Option<String>,
    pub factory_method_name: Option<String>,
    pub constructor_args: ConstructorArgs,
    pub properties: PropertyValues,
    pub init_method: Option<String>,
    pub destroy_method: Option<DestroyMethod>,
    pub enforce_init_method: bool,
    pub enforce_destroy_method: bool,
    /// Created by the container itself rather than by application config
    pub synthetic: bool,
    /// `None` means lenient (the default)
    pub lenient_constructor_resolution: Option<bool>,
    pub description: Option<String>,
}

impl BeanDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definition for an already-described class.
    pub fn of_class(class: Arc<BeanClass>) -> Self {
        Self {
            class: Some(ClassRef::Resolved(class)),
            ..Self::default()
        }
    }

    /// Definition whose class is looked up by type name at creation time.
    pub fn named_class(name: impl Into<String>) -> Self {
        Self {
            class: Some(ClassRef::Named(name.into())),
            ..Self::default()
        }
    }

    /// Definition whose class name is an expression.
    pub fn class_expr(expr: impl Into<String>) -> Self {
        Self {
            class: Some(ClassRef::Expr(expr.into())),
            ..Self::default()
        }
    }

    /// Child definition inheriting from `parent`.
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    /// Definition backed by a supplier function.
    pub fn supplied<F>(supplier: F) -> Self
    where
        F: Fn(&Container) -> Result<BeanRef> + Send + Sync + 'static,
    {
        Self {
            instance_supplier: Some(Arc::new(supplier)),
            ..Self::default()
        }
    }

    // -- builder setters ----------------------------------------------------

    pub fn class(mut self, class: Arc<BeanClass>) -> Self {
        self.class = Some(ClassRef::Resolved(class));
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn scope(mut self, scope: BeanScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(BeanScope::Prototype)
    }

    pub fn abstract_definition(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire = mode;
        self
    }

    pub fn dependency_check(mut self, check: DependencyCheck) -> Self {
        self.dependency_check = check;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = Some(candidate);
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Declare the produced type up front so type-based lookups can match
    /// the bean before it exists.
    pub fn target_type(mut self, key: TypeKey) -> Self {
        self.target_type = Some(key);
        self
    }

    pub fn instance_supplier<F>(mut self, supplier: F) -> Self
    where
        F: Fn(&Container) -> Result<BeanRef> + Send + Sync + 'static,
    {
        self.instance_supplier = Some(Arc::new(supplier));
        self
    }

    /// Use an instance factory method on another bean.
    pub fn factory_bean(mut self, bean: impl Into<String>, method: impl Into<String>) -> Self {
        self.factory_bean_name = Some(bean.into());
        self.factory_method_name = Some(method.into());
        self
    }

    /// Use a static factory method of this definition's class.
    pub fn factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method_name = Some(method.into());
        self
    }

    pub fn constructor_arg(mut self, index: usize, source: ValueSource) -> Self {
        self.constructor_args.indexed.insert(index, ValueHolder::new(source));
        self
    }

    pub fn generic_arg(mut self, source: ValueSource) -> Self {
        self.constructor_args.generic.push(ValueHolder::new(source));
        self
    }

    /// Generic argument that only matches parameters of type `ty`.
    pub fn typed_arg(mut self, source: ValueSource, ty: TypeRef) -> Self {
        self.constructor_args.generic.push(ValueHolder::typed(source, ty));
        self
    }

    /// Generic argument that matches the parameter called `name`.
    pub fn named_arg(mut self, name: impl Into<String>, source: ValueSource) -> Self {
        self.constructor_args.generic.push(ValueHolder::named(source, name));
        self
    }

    pub fn property(mut self, name: impl Into<String>, source: ValueSource) -> Self {
        self.properties.add(name, source);
        self
    }

    /// Explicitly declared init methods must exist; see
    /// [`enforce_init_method`](Self::enforce_init_method) to relax this.
    pub fn init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method = Some(name.into());
        self.enforce_init_method = true;
        self
    }

    pub fn destroy_method(mut self, name: impl Into<String>) -> Self {
        self.destroy_method = Some(DestroyMethod::Named(name.into()));
        self.enforce_destroy_method = true;
        self
    }

    pub fn infer_destroy_method(mut self) -> Self {
        self.destroy_method = Some(DestroyMethod::Infer);
        self
    }

    pub fn enforce_init_method(mut self, enforce: bool) -> Self {
        self.enforce_init_method = enforce;
        self
    }

    pub fn enforce_destroy_method(mut self, enforce: bool) -> Self {
        self.enforce_destroy_method = enforce;
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient_constructor_resolution = Some(lenient);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    // -- queries ------------------------------------------------------------

    pub fn scope_or_default(&self) -> BeanScope {
        self.scope.clone().unwrap_or_default()
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate.unwrap_or(true)
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient_constructor_resolution.unwrap_or(true)
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    /// The class if it is already resolved.
    pub fn resolved_class(&self) -> Option<&Arc<BeanClass>> {
        match &self.class {
            Some(ClassRef::Resolved(class)) => Some(class),
            _ => None,
        }
    }

    /// Structural checks run at registration time.
    pub fn validate(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(crate::BeanError::definition(name, "bean name must not be empty"));
        }
        if self.factory_bean_name.is_some() && self.factory_method_name.is_none() {
            return Err(crate::BeanError::definition(
                name,
                "factory bean specified without a factory method",
            ));
        }
        if self.depends_on.iter().any(String::is_empty) {
            return Err(crate::BeanError::definition(name, "empty depends-on entry"));
        }
        if !self.is_abstract
            && self.parent.is_none()
            && self.class.is_none()
            && self.factory_bean_name.is_none()
            && self.instance_supplier.is_none()
        {
            return Err(crate::BeanError::definition(
                name,
                "neither a class, a parent, a factory bean nor an instance supplier is specified",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("class", &self.class)
            .field("parent", &self.parent)
            .field("scope", &self.scope_or_default())
            .field("abstract", &self.is_abstract)
            .field("lazy_init", &self.is_lazy_init())
            .field("autowire", &self.autowire)
            .field("primary", &self.primary)
            .field("factory_bean", &self.factory_bean_name)
            .field("factory_method", &self.factory_method_name)
            .field("has_supplier", &self.instance_supplier.is_some())
            .field("init_method", &self.init_method)
            .field("destroy_method", &self.destroy_method)
            .finish()
    }
}

/// Combine a (merged) parent definition with a child definition.
///
/// Identity-bearing settings come from the child: abstractness, autowiring,
/// dependency check, depends-on, primary. Optional settings are taken from the
/// child when it sets them and inherited otherwise. Constructor arguments and
/// property values are overlaid: the child's entries win.
pub fn merge(parent: &BeanDefinition, child: &BeanDefinition) -> BeanDefinition {
    let mut merged = parent.clone();
    merged.parent = None;

    if child.class.is_some() {
        merged.class = child.class.clone();
    }
    if child.scope.is_some() {
        merged.scope = child.scope.clone();
    }
    if child.lazy_init.is_some() {
        merged.lazy_init = child.lazy_init;
    }
    if child.factory_bean_name.is_some() {
        merged.factory_bean_name = child.factory_bean_name.clone();
    }
    if child.factory_method_name.is_some() {
        merged.factory_method_name = child.factory_method_name.clone();
    }
    if child.instance_supplier.is_some() {
        merged.instance_supplier = child.instance_supplier.clone();
    }
    if child.init_method.is_some() {
        merged.init_method = child.init_method.clone();
        merged.enforce_init_method = child.enforce_init_method;
    }
    if child.destroy_method.is_some() {
        merged.destroy_method = child.destroy_method.clone();
        merged.enforce_destroy_method = child.enforce_destroy_method;
    }
    if child.autowire_candidate.is_some() {
        merged.autowire_candidate = child.autowire_candidate;
    }
    if child.priority.is_some() {
        merged.priority = child.priority;
    }
    if child.target_type.is_some() {
        merged.target_type = child.target_type;
    }
    if child.lenient_constructor_resolution.is_some() {
        merged.lenient_constructor_resolution = child.lenient_constructor_resolution;
    }
    if child.description.is_some() {
        merged.description = child.description.clone();
    }

    merged.is_abstract = child.is_abstract;
    merged.autowire = child.autowire;
    merged.dependency_check = child.dependency_check;
    merged.depends_on = child.depends_on.clone();
    merged.primary = child.primary;
    merged.synthetic = child.synthetic;

    merged.constructor_args.add_all(&child.constructor_args);
    merged.properties.add_all(&child.properties);
    merged
}

// =============================================================================
// MergedDefinition and its resolution cache
// =============================================================================

/// Constructor or factory method chosen for a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Executable {
    Constructor(usize),
    FactoryMethod(usize),
}

/// A cached argument: either fully resolved or re-resolved per instance.
#[derive(Debug, Clone)]
pub(crate) enum PreparedArg {
    Resolved(Value),
    Source(ValueHolder),
    Autowired,
}

#[derive(Default)]
pub(crate) struct ResolvedCache {
    pub executable: Option<Executable>,
    /// Class owning the cached factory method
    pub factory_class: Option<Arc<BeanClass>>,
    pub args_resolved: bool,
    pub resolved_args: Option<Vec<Value>>,
    pub prepared_args: Option<Vec<PreparedArg>>,
    pub target_type: Option<TypeKey>,
    pub resolved_class: Option<Arc<BeanClass>>,
    pub converted_properties: HashMap<String, Value>,
    pub external_init_methods: HashSet<String>,
    pub external_destroy_methods: HashSet<String>,
}

/// A definition after parent merging, plus what creation learned about it.
pub struct MergedDefinition {
    name: String,
    definition: BeanDefinition,
    pub(crate) cache: Mutex<ResolvedCache>,
    resolution_count: AtomicUsize,
}

impl MergedDefinition {
    pub(crate) fn new(name: impl Into<String>, definition: BeanDefinition) -> Self {
        let resolved_class = definition.resolved_class().cloned();
        Self {
            name: name.into(),
            definition,
            cache: Mutex::new(ResolvedCache {
                resolved_class,
                ..ResolvedCache::default()
            }),
            resolution_count: AtomicUsize::new(0),
        }
    }

    /// Name the definition is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &BeanDefinition {
        &self.definition
    }

    pub fn scope(&self) -> BeanScope {
        self.definition.scope_or_default()
    }

    pub fn is_singleton(&self) -> bool {
        self.scope().is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.scope().is_prototype()
    }

    /// How many full constructor or factory-method candidate searches ran.
    pub fn resolution_count(&self) -> usize {
        self.resolution_count.load(Ordering::Acquire)
    }

    pub(crate) fn record_resolution(&self) {
        self.resolution_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Type of the produced bean, once known.
    pub fn resolved_target_type(&self) -> Option<TypeKey> {
        let cache = self.cache.lock();
        cache
            .target_type
            .or_else(|| cache.resolved_class.as_ref().map(|c| c.key()))
    }

    pub(crate) fn set_target_type(&self, key: TypeKey) {
        self.cache.lock().target_type = Some(key);
    }

    pub(crate) fn cached_class(&self) -> Option<Arc<BeanClass>> {
        self.cache.lock().resolved_class.clone()
    }

    /// Mark a method as called by something other than the definition's own
    /// lifecycle handling (so it is not invoked twice).
    pub fn register_external_init_method(&self, method: impl Into<String>) {
        self.cache.lock().external_init_methods.insert(method.into());
    }

    pub fn register_external_destroy_method(&self, method: impl Into<String>) {
        self.cache.lock().external_destroy_methods.insert(method.into());
    }

    pub fn is_external_init_method(&self, method: &str) -> bool {
        self.cache.lock().external_init_methods.contains(method)
    }

    pub fn is_external_destroy_method(&self, method: &str) -> bool {
        self.cache.lock().external_destroy_methods.contains(method)
    }
}

impl fmt::Debug for MergedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedDefinition")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .field("resolution_count", &self.resolution_count())
            .finish()
    }
}
