//! Injectable types and deferred lookup handles
//!
//! [`Injectable`] marks what the container can manage. [`ObjectProvider`] is
//! what a `Provider`-typed injection point receives: a handle that resolves
//! its target only when asked, so a bean can depend on something that is
//! lazy, optional, scoped, or not unique.

use crate::container::{Container, WeakContainer};
use crate::resolver::DependencyDescriptor;
use crate::value::{BeanRef, TypeRef, Value};
use crate::{BeanError, Result};
use std::fmt;
use std::sync::Arc;

/// Marker trait for types that can be managed by the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Deferred, repeatable lookup of a dependency.
///
/// The handle does not keep its container alive; using it after the container
/// is dropped yields [`BeanError::ContainerDropped`].
///
/// ```rust
/// use bean_container::{BeanClass, BeanDefinition, Container, TypeRef};
///
/// struct Clock;
///
/// let container = Container::new();
/// let provider = container.get_provider(TypeRef::object::<Clock>());
/// assert!(provider.get_if_available().unwrap().is_none());
///
/// container
///     .register_definition(
///         "clock",
///         BeanDefinition::of_class(BeanClass::builder::<Clock>().default_constructor(|| Clock).build()),
///     )
///     .unwrap();
/// assert!(provider.get_as::<Clock>().is_ok());
/// ```
#[derive(Clone)]
pub struct ObjectProvider {
    container: WeakContainer,
    descriptor: DependencyDescriptor,
    requesting_bean: Option<Arc<str>>,
}

impl ObjectProvider {
    pub(crate) fn new(
        container: WeakContainer,
        descriptor: DependencyDescriptor,
        requesting_bean: Option<&str>,
    ) -> Self {
        Self {
            container,
            descriptor,
            requesting_bean: requesting_bean.map(Arc::from),
        }
    }

    /// Declared type this provider resolves.
    pub fn target(&self) -> &TypeRef {
        &self.descriptor.ty
    }

    fn container(&self) -> Result<Container> {
        self.container.upgrade().ok_or(BeanError::ContainerDropped)
    }

    fn resolve(&self, descriptor: &DependencyDescriptor) -> Result<Option<Value>> {
        self.container()?
            .resolve_dependency(descriptor, self.requesting_bean.as_deref(), &mut Vec::new())
    }

    /// The single matching bean; fails if there is none or no unique one.
    pub fn get(&self) -> Result<BeanRef> {
        let descriptor = self.descriptor.clone().required(true);
        match self.resolve(&descriptor)? {
            Some(value) => expect_bean(value, &descriptor.ty),
            None => Err(BeanError::NoSuchBeanOfType {
                type_name: descriptor.ty.display_name(),
                message: "expected at least 1 bean".into(),
            }),
        }
    }

    /// Create the matching bean with explicit constructor or factory-method
    /// arguments. Only meaningful for prototype beans.
    pub fn get_with_args(&self, args: Vec<Value>) -> Result<BeanRef> {
        let container = self.container()?;
        let name = container
            .unique_candidate_name(&self.descriptor, self.requesting_bean.as_deref())?;
        let bean = container.get_bean_with_args(&name, args)?;
        container.adapt_to(&name, bean, &self.descriptor.ty)
    }

    /// The matching bean, or `None` when nothing matches. Several matches
    /// without a primary or priority winner are still an error.
    pub fn get_if_available(&self) -> Result<Option<BeanRef>> {
        let descriptor = self.descriptor.clone().required(false);
        self.resolve(&descriptor)?
            .map(|value| expect_bean(value, &descriptor.ty))
            .transpose()
    }

    /// The matching bean if exactly one can be chosen, `None` otherwise.
    pub fn get_if_unique(&self) -> Result<Option<BeanRef>> {
        match self.get_if_available() {
            Err(BeanError::NoUniqueBean { .. }) => Ok(None),
            other => other,
        }
    }

    /// Every matching bean, in registration order.
    pub fn stream(&self) -> Result<Vec<BeanRef>> {
        self.collect(false)
    }

    /// Every matching bean, sorted by declared order and priority.
    pub fn ordered_stream(&self) -> Result<Vec<BeanRef>> {
        self.collect(true)
    }

    fn collect(&self, ordered: bool) -> Result<Vec<BeanRef>> {
        let descriptor = DependencyDescriptor::new(TypeRef::list(self.descriptor.ty.clone()))
            .required(false)
            .ordered(ordered);
        let Some(value) = self.resolve(&descriptor)? else {
            return Ok(Vec::new());
        };
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| expect_bean(item, &self.descriptor.ty))
                .collect(),
            other => Ok(vec![expect_bean(other, &self.descriptor.ty)?]),
        }
    }

    /// [`get`](Self::get) downcast to a concrete type.
    pub fn get_as<T: Injectable>(&self) -> Result<Arc<T>> {
        let bean = self.get()?;
        bean.downcast::<T>()
            .map_err(|_| BeanError::type_mismatch(self.descriptor.ty.display_name(), std::any::type_name::<T>()))
    }

    /// [`get`](Self::get) as an interface view.
    pub fn get_shared<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>> {
        let bean = self.get()?;
        bean.downcast_ref::<Arc<I>>().cloned().ok_or_else(|| {
            BeanError::type_mismatch(self.descriptor.ty.display_name(), std::any::type_name::<I>())
        })
    }
}

fn expect_bean(value: Value, ty: &TypeRef) -> Result<BeanRef> {
    match value {
        Value::Bean(bean) => Ok(bean),
        other => Err(BeanError::type_mismatch(other.kind_name(), ty.display_name())),
    }
}

impl fmt::Debug for ObjectProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProvider")
            .field("target", &self.descriptor.ty)
            .field("requesting_bean", &self.requesting_bean)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BeanClass, BeanDefinition, Parameter};

    trait Codec: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct Json;
    struct Yaml;

    impl Codec for Json {
        fn name(&self) -> &'static str {
            "json"
        }
    }

    impl Codec for Yaml {
        fn name(&self) -> &'static str {
            "yaml"
        }
    }

    fn codecs() -> Container {
        let container = Container::new();
        container
            .register_definition(
                "yaml",
                BeanDefinition::of_class(
                    BeanClass::builder::<Yaml>()
                        .implements::<dyn Codec>(|y| y)
                        .default_constructor(|| Yaml)
                        .order(5)
                        .build(),
                ),
            )
            .unwrap();
        container
            .register_definition(
                "json",
                BeanDefinition::of_class(
                    BeanClass::builder::<Json>()
                        .implements::<dyn Codec>(|j| j)
                        .default_constructor(|| Json)
                        .order(1)
                        .build(),
                ),
            )
            .unwrap();
        container
    }

    fn names(beans: Vec<BeanRef>) -> Vec<&'static str> {
        beans
            .iter()
            .filter_map(|b| b.downcast_ref::<Arc<dyn Codec>>())
            .map(|c| c.name())
            .collect()
    }

    #[test]
    fn test_stream_and_ordered_stream() {
        let container = codecs();
        let provider = container.get_provider(TypeRef::interface::<dyn Codec>());

        assert_eq!(names(provider.stream().unwrap()), vec!["yaml", "json"]);
        assert_eq!(names(provider.ordered_stream().unwrap()), vec!["json", "yaml"]);

        let nothing = container.get_provider(TypeRef::object::<String>());
        assert!(nothing.stream().unwrap().is_empty());
    }

    #[test]
    fn test_get_if_unique() {
        let container = codecs();
        let provider = container.get_provider(TypeRef::interface::<dyn Codec>());

        assert!(provider.get_if_unique().unwrap().is_none());
        assert!(matches!(provider.get_if_available(), Err(BeanError::NoUniqueBean { .. })));

        let json = container.get_provider(TypeRef::object::<Json>());
        assert!(json.get_if_unique().unwrap().is_some());
        assert_eq!(json.get_as::<Json>().unwrap().name(), "json");
    }

    #[test]
    fn test_get_with_args_creates_prototype() {
        struct Label(String);

        let container = Container::new();
        container
            .register_definition(
                "label",
                BeanDefinition::of_class(
                    BeanClass::builder::<Label>()
                        .constructor([Parameter::new("text", TypeRef::Str)], |args| Ok(Label(args.string(0)?)))
                        .build(),
                )
                .prototype(),
            )
            .unwrap();

        let provider = container.get_provider(TypeRef::object::<Label>());
        let first = provider.get_with_args(vec![Value::str("one")]).unwrap();
        let second = provider.get_with_args(vec![Value::str("two")]).unwrap();
        assert_eq!(first.downcast_ref::<Label>().map(|l| l.0.as_str()), Some("one"));
        assert_eq!(second.downcast_ref::<Label>().map(|l| l.0.as_str()), Some("two"));
    }

    #[test]
    fn test_provider_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ObjectProvider>();
    }
}
