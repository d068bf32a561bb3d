//! Bean class metadata
//!
//! A [`BeanClass`] tells the container everything it would otherwise learn by
//! reflection: which constructors and factory methods exist, which properties
//! are writable, which interfaces the type can be viewed as, and which
//! lifecycle callbacks it carries.
//!
//! # Example
//!
//! ```rust
//! use bean_container::{BeanClass, Parameter, TypeRef};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English {
//!     name: String,
//! }
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         format!("hello {}", self.name)
//!     }
//! }
//!
//! let class = BeanClass::builder::<English>()
//!     .implements::<dyn Greeter>(|e| e)
//!     .constructor([Parameter::new("name", TypeRef::Str)], |args| {
//!         Ok(English { name: args.string(0)? })
//!     })
//!     .build();
//!
//! assert_eq!(class.constructors().len(), 1);
//! ```

use crate::provider::Injectable;
use crate::storage::{self, NameMap};
use crate::value::{content_type, Args, BeanRef, TypeKey, TypeRef, Value};
use crate::{BeanError, Container, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Name under which a type's own initialization callback is registered.
pub const OWN_INIT_METHOD: &str = "after_properties_set";

/// Name under which a type's own destruction callback is registered.
pub const OWN_DESTROY_METHOD: &str = "destroy";

type ConstructFn = Arc<dyn Fn(&mut Args) -> Result<BeanRef> + Send + Sync>;
type FactoryFn = Arc<dyn Fn(Option<&BeanRef>, &mut Args) -> Result<BeanRef> + Send + Sync>;
type SetterFn = Arc<dyn Fn(&BeanRef, Value) -> Result<()> + Send + Sync>;
type MethodFn = Arc<dyn Fn(&BeanRef) -> Result<()> + Send + Sync>;
type UpcastFn = Arc<dyn Fn(&BeanRef) -> Option<BeanRef> + Send + Sync>;
type AwareFn = Arc<dyn Fn(&BeanRef, &AwareContext<'_>) -> Result<()> + Send + Sync>;

/// What an "aware" bean is told about itself before initialization.
pub struct AwareContext<'a> {
    /// Name the bean is registered under
    pub bean_name: &'a str,
    /// Owning container
    pub container: &'a Container,
}

/// A declared constructor or method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Option<String>,
    pub ty: TypeRef,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    /// Parameter without a usable name (no name-based fallback matching).
    pub fn unnamed(ty: TypeRef) -> Self {
        Self { name: None, ty }
    }

    /// `name: Arc<T>` parameter.
    pub fn bean<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeRef::object::<T>())
    }

    /// `name: Arc<dyn I>` parameter.
    pub fn interface<I: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeRef::interface::<I>())
    }
}

/// A constructor of a bean class.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Parameter>,
    invoke: ConstructFn,
}

impl Constructor {
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn invoke(&self, args: Vec<Value>) -> Result<BeanRef> {
        (self.invoke)(&mut Args::new(args))
    }

    /// Signature string for diagnostics, e.g. `(String, i64)`.
    pub fn signature(&self) -> String {
        signature(&self.params)
    }
}

/// A static or instance factory method declared on a bean class.
#[derive(Clone)]
pub struct FactoryMethod {
    name: String,
    is_static: bool,
    params: Vec<Parameter>,
    returns: Option<TypeKey>,
    order: Option<i32>,
    invoke: FactoryFn,
}

impl FactoryMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Product type, `None` for a method without a return value.
    pub fn returns(&self) -> Option<TypeKey> {
        self.returns
    }

    /// Ordering metadata attached to the method itself.
    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub(crate) fn invoke(&self, target: Option<&BeanRef>, args: Vec<Value>) -> Result<BeanRef> {
        (self.invoke)(target, &mut Args::new(args))
    }

    pub fn signature(&self) -> String {
        format!("{}{}", self.name, signature(&self.params))
    }
}

/// A writable property.
#[derive(Clone)]
pub struct Property {
    name: String,
    ty: TypeRef,
    setter: SetterFn,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub(crate) fn set(&self, bean: &BeanRef, value: Value) -> Result<()> {
        (self.setter)(bean, value)
    }
}

#[derive(Clone)]
struct Interface {
    key: TypeKey,
    upcast: UpcastFn,
}

/// Metadata describing a managed type.
pub struct BeanClass {
    key: TypeKey,
    interfaces: Vec<Interface>,
    constructors: Vec<Constructor>,
    factory_methods: Vec<FactoryMethod>,
    properties: Vec<Property>,
    methods: Vec<(String, MethodFn)>,
    own_init: Option<MethodFn>,
    own_destroy: Option<MethodFn>,
    aware: Option<AwareFn>,
    closeable: bool,
    order: Option<i32>,
    priority: Option<i32>,
}

impl BeanClass {
    /// Start describing type `T`.
    pub fn builder<T: Injectable>() -> ClassBuilder<T> {
        ClassBuilder {
            class: BeanClass {
                key: TypeKey::of::<T>(),
                interfaces: Vec::new(),
                constructors: Vec::new(),
                factory_methods: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                own_init: None,
                own_destroy: None,
                aware: None,
                closeable: false,
                order: None,
                priority: None,
            },
            _marker: PhantomData,
        }
    }

    /// Metadata for a type that is only ever registered as a finished instance.
    pub fn opaque<T: Injectable>() -> Arc<Self> {
        Self::builder::<T>().build()
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    pub fn factory_methods(&self) -> &[FactoryMethod] {
        &self.factory_methods
    }

    /// Factory methods with the given name and staticness.
    pub fn factory_methods_named<'a>(
        &'a self,
        name: &'a str,
        is_static: bool,
    ) -> impl Iterator<Item = (usize, &'a FactoryMethod)> + 'a {
        self.factory_methods
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.name == name && m.is_static == is_static)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Whether a named no-arg method exists (init/destroy by name).
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn invoke_method(&self, name: &str, bean: &BeanRef) -> Option<Result<()>> {
        self.methods
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f(bean))
    }

    /// Whether the type carries its own initialization callback.
    pub fn has_own_init(&self) -> bool {
        self.own_init.is_some()
    }

    pub(crate) fn invoke_own_init(&self, bean: &BeanRef) -> Option<Result<()>> {
        self.own_init.as_ref().map(|f| f(bean))
    }

    /// Whether the type carries its own destruction callback.
    pub fn has_own_destroy(&self) -> bool {
        self.own_destroy.is_some()
    }

    pub(crate) fn invoke_own_destroy(&self, bean: &BeanRef) -> Option<Result<()>> {
        self.own_destroy.as_ref().map(|f| f(bean))
    }

    pub(crate) fn invoke_aware(&self, bean: &BeanRef, ctx: &AwareContext<'_>) -> Result<()> {
        match &self.aware {
            Some(f) => f(bean, ctx),
            None => Ok(()),
        }
    }

    /// Auto-closeable types get `close` inferred as their destroy method.
    pub fn is_closeable(&self) -> bool {
        self.closeable
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    /// Interfaces this type can be viewed as.
    pub fn interfaces(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.interfaces.iter().map(|i| i.key)
    }

    /// Whether instances of this class can fill a slot of type `key`.
    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.key == *key || self.interfaces.iter().any(|i| i.key == *key)
    }

    fn upcast(&self, bean: &BeanRef, key: &TypeKey) -> Option<BeanRef> {
        self.interfaces
            .iter()
            .find(|i| i.key == *key)
            .and_then(|i| (i.upcast)(bean))
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("type", &self.key)
            .field("interfaces", &self.interfaces.iter().map(|i| i.key).collect::<Vec<_>>())
            .field("constructors", &self.constructors.len())
            .field("factory_methods", &self.factory_methods.len())
            .field("properties", &self.properties.iter().map(|p| &p.name).collect::<Vec<_>>())
            .finish()
    }
}

fn signature(params: &[Parameter]) -> String {
    let types: Vec<String> = params.iter().map(|p| p.ty.display_name()).collect();
    format!("({})", types.join(", "))
}

fn downcast_target<T: Injectable>(bean: &BeanRef) -> Result<&T> {
    bean.downcast_ref::<T>().ok_or_else(|| {
        BeanError::type_mismatch("bean", std::any::type_name::<T>())
    })
}

/// Typed builder for [`BeanClass`].
pub struct ClassBuilder<T> {
    class: BeanClass,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ClassBuilder<T> {
    /// Declare that `T` can be viewed as interface `I`.
    pub fn implements<I>(mut self, upcast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::interface::<I>();
        let upcast: UpcastFn = Arc::new(move |bean: &BeanRef| {
            let concrete = Arc::clone(bean).downcast::<T>().ok()?;
            let view: Arc<I> = upcast(concrete);
            Some(Arc::new(view) as BeanRef)
        });
        self.class.interfaces.push(Interface { key, upcast });
        self
    }

    /// Declare a constructor.
    pub fn constructor<F>(mut self, params: impl IntoIterator<Item = Parameter>, f: F) -> Self
    where
        F: Fn(&mut Args) -> Result<T> + Send + Sync + 'static,
    {
        self.class.constructors.push(Constructor {
            params: params.into_iter().collect(),
            invoke: Arc::new(move |args| f(args).map(|t| Arc::new(t) as BeanRef)),
        });
        self
    }

    /// Declare a no-argument constructor.
    pub fn default_constructor<F>(self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor([], move |_| Ok(f()))
    }

    /// Declare a static factory method producing `R`.
    pub fn static_factory<R, F>(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = Parameter>,
        f: F,
    ) -> Self
    where
        R: Injectable,
        F: Fn(&mut Args) -> Result<R> + Send + Sync + 'static,
    {
        self.class.factory_methods.push(FactoryMethod {
            name: name.into(),
            is_static: true,
            params: params.into_iter().collect(),
            returns: Some(TypeKey::of::<R>()),
            order: None,
            invoke: Arc::new(move |_, args| f(args).map(|r| Arc::new(r) as BeanRef)),
        });
        self
    }

    /// Declare an instance factory method on `T` producing `R`.
    pub fn factory_method<R, F>(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = Parameter>,
        f: F,
    ) -> Self
    where
        R: Injectable,
        F: Fn(&T, &mut Args) -> Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        self.class.factory_methods.push(FactoryMethod {
            name,
            is_static: false,
            params: params.into_iter().collect(),
            returns: Some(TypeKey::of::<R>()),
            order: None,
            invoke: Arc::new(move |target, args| {
                let target = target.ok_or_else(|| {
                    BeanError::custom(format!("factory method '{method_name}' needs a target instance"))
                })?;
                let this = downcast_target::<T>(target)?;
                f(this, args).map(|r| Arc::new(r) as BeanRef)
            }),
        });
        self
    }

    /// Declare a static method without a return value.
    ///
    /// Such a method can never serve as a factory method; naming it as one is
    /// a creation error.
    pub fn void_method(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = Parameter>,
    ) -> Self {
        let name = name.into();
        let method_name = name.clone();
        self.class.factory_methods.push(FactoryMethod {
            name,
            is_static: true,
            params: params.into_iter().collect(),
            returns: None,
            order: None,
            invoke: Arc::new(move |_, _| {
                Err(BeanError::custom(format!("method '{method_name}' returns nothing")))
            }),
        });
        self
    }

    /// Attach an order value to the most recently declared factory method.
    pub fn with_method_order(mut self, order: i32) -> Self {
        if let Some(last) = self.class.factory_methods.last_mut() {
            last.order = Some(order);
        }
        self
    }

    /// Declare a writable property. The setter works through `&T`, so the
    /// field needs interior mutability (`OnceCell`, `RwLock`, atomics...).
    pub fn property<F>(mut self, name: impl Into<String>, ty: TypeRef, setter: F) -> Self
    where
        F: Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.class.properties.push(Property {
            name: name.into(),
            ty,
            setter: Arc::new(move |bean, value| setter(downcast_target::<T>(bean)?, value)),
        });
        self
    }

    /// Declare a named no-argument method usable as init or destroy method.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        self.class
            .methods
            .push((name.into(), Arc::new(move |bean| f(downcast_target::<T>(bean)?))));
        self
    }

    /// The type's own initialization callback, run after properties are set.
    pub fn on_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        let f: MethodFn = Arc::new(move |bean| f(downcast_target::<T>(bean)?));
        self.class.methods.push((OWN_INIT_METHOD.to_owned(), Arc::clone(&f)));
        self.class.own_init = Some(f);
        self
    }

    /// The type's own destruction callback.
    pub fn on_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        let f: MethodFn = Arc::new(move |bean| f(downcast_target::<T>(bean)?));
        self.class.methods.push((OWN_DESTROY_METHOD.to_owned(), Arc::clone(&f)));
        self.class.own_destroy = Some(f);
        self
    }

    /// Mark the type auto-closeable with the given `close` method.
    pub fn closeable<F>(self, close: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        let mut this = self.method("close", close);
        this.class.closeable = true;
        this
    }

    /// Callback receiving the bean's name and owning container.
    pub fn aware<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &AwareContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.class.aware = Some(Arc::new(move |bean, ctx| f(downcast_target::<T>(bean)?, ctx)));
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.class.order = Some(order);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.class.priority = Some(priority);
        self
    }

    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

/// Lookup of class metadata by `TypeId` and by type name.
///
/// The name index serves class names that arrive as strings (including
/// expression-valued class names); both full and short names are indexed.
pub struct ClassRegistry {
    by_id: DashMap<TypeId, Arc<BeanClass>, RandomState>,
    by_name: NameMap<Arc<BeanClass>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::with_hasher(RandomState::new()),
            by_name: storage::name_map(),
        }
    }

    /// Register (or replace) metadata for a type.
    pub fn register(&self, class: Arc<BeanClass>) {
        let key = class.key();
        self.by_name.insert(key.name().to_owned(), Arc::clone(&class));
        self.by_name.insert(key.short_name().to_owned(), Arc::clone(&class));
        self.by_id.insert(key.id(), class);
    }

    pub fn get(&self, id: &TypeId) -> Option<Arc<BeanClass>> {
        self.by_id.get(id).map(|c| Arc::clone(c.value()))
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<BeanClass>> {
        self.by_name.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Class metadata for the content of a bean handle.
    pub fn class_of(&self, bean: &BeanRef) -> Option<Arc<BeanClass>> {
        self.get(&content_type(bean))
    }

    /// Whether the value behind `bean` can fill a slot of type `key`.
    pub fn is_instance(&self, bean: &BeanRef, key: &TypeKey) -> bool {
        let actual = content_type(bean);
        actual == key.id()
            || self
                .get(&actual)
                .is_some_and(|class| class.is_assignable_to(key))
    }

    /// Whether instances of type `actual` could fill a slot of type `key`,
    /// judged from metadata alone.
    pub fn is_type_assignable(&self, actual: &TypeKey, key: &TypeKey) -> bool {
        actual == key
            || self
                .get(&actual.id())
                .is_some_and(|class| class.is_assignable_to(key))
    }

    /// Adapt a bean to a slot of type `key`, upcasting to an interface view
    /// when needed. `None` if the bean is not assignable.
    pub fn adapt(&self, bean: &BeanRef, key: &TypeKey) -> Option<BeanRef> {
        let actual = content_type(bean);
        if actual == key.id() {
            return Some(Arc::clone(bean));
        }
        self.get(&actual).and_then(|class| class.upcast(bean, key))
    }

    /// Type name of a bean's content for diagnostics.
    pub fn type_name_of(&self, bean: &BeanRef) -> String {
        self.class_of(bean)
            .map(|c| c.name().to_owned())
            .unwrap_or_else(|| "<unregistered type>".to_owned())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("count", &self.len())
            .finish()
    }
}
