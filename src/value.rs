//! Runtime type model
//!
//! Rust has no runtime reflection, so the container describes everything it
//! injects with three small types:
//!
//! - [`TypeKey`] identifies a concrete type or an interface (trait object) type
//! - [`TypeRef`] is the declared type of an injection point
//! - [`Value`] is a resolved argument or property value
//!
//! Beans themselves travel as [`BeanRef`], a type-erased `Arc`. Its content is
//! either the concrete bean type `T`, or an interface view `Arc<dyn I>` produced
//! when a bean is injected into an interface-typed slot.

use crate::provider::ObjectProvider;
use crate::{BeanError, Result};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased shared bean handle.
pub type BeanRef = Arc<dyn Any + Send + Sync>;

/// Identity of a concrete or interface type.
///
/// Equality and hashing use the `TypeId` only; the name is for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of a concrete type.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key of an interface type, e.g. `TypeKey::interface::<dyn Greeter>()`.
    ///
    /// Interface views are stored inside a [`BeanRef`] as `Arc<dyn I>`, so the
    /// key carries that `TypeId` while keeping the trait name for messages.
    #[inline]
    pub fn interface<I: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<Arc<I>>(),
            name: std::any::type_name::<I>(),
        }
    }

    /// The underlying `TypeId`.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name without module path, e.g. `Greeter` for `app::greeting::Greeter`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `TypeId` of the value stored behind a bean handle.
#[inline]
pub fn content_type(bean: &BeanRef) -> TypeId {
    // Deref twice: `Arc<dyn Any>` itself is `Any` too.
    (**bean).type_id()
}

/// Declared type of an injection point, parameter or property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Str,
    Int,
    Float,
    Bool,
    /// A managed object (concrete type or interface)
    Object(TypeKey),
    /// Ordered collection of elements
    List(Box<TypeRef>),
    /// String-keyed map of elements
    Map(Box<TypeRef>),
    /// Value that may be absent
    Optional(Box<TypeRef>),
    /// Deferred lookup handle
    Provider(Box<TypeRef>),
    /// Accepts anything without conversion
    Any,
}

impl TypeRef {
    /// A concrete managed type.
    #[inline]
    pub fn object<T: ?Sized + 'static>() -> Self {
        Self::Object(TypeKey::of::<T>())
    }

    /// An interface type, e.g. `TypeRef::interface::<dyn Greeter>()`.
    #[inline]
    pub fn interface<I: ?Sized + 'static>() -> Self {
        Self::Object(TypeKey::interface::<I>())
    }

    pub fn list(element: TypeRef) -> Self {
        Self::List(Box::new(element))
    }

    pub fn map(element: TypeRef) -> Self {
        Self::Map(Box::new(element))
    }

    pub fn optional(inner: TypeRef) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn provider(inner: TypeRef) -> Self {
        Self::Provider(Box::new(inner))
    }

    /// Scalar types and lists of scalars. Simple properties are never autowired.
    pub fn is_simple(&self) -> bool {
        match self {
            Self::Str | Self::Int | Self::Float | Self::Bool => true,
            Self::List(inner) | Self::Optional(inner) => inner.is_simple(),
            _ => false,
        }
    }

    /// Whether the dependency shape asks for several beans at once.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// The managed type this reference ultimately points at, looking through
    /// collection, optional and provider wrappers.
    pub fn object_key(&self) -> Option<TypeKey> {
        match self {
            Self::Object(key) => Some(*key),
            Self::List(inner) | Self::Map(inner) | Self::Optional(inner) | Self::Provider(inner) => {
                inner.object_key()
            }
            _ => None,
        }
    }

    /// Display name used in diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            Self::Str => "String".into(),
            Self::Int => "i64".into(),
            Self::Float => "f64".into(),
            Self::Bool => "bool".into(),
            Self::Object(key) => key.name().into(),
            Self::List(inner) => format!("List<{}>", inner.display_name()),
            Self::Map(inner) => format!("Map<String, {}>", inner.display_name()),
            Self::Optional(inner) => format!("Option<{}>", inner.display_name()),
            Self::Provider(inner) => format!("ObjectProvider<{}>", inner.display_name()),
            Self::Any => "Any".into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A resolved argument or property value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bean(BeanRef),
    List(Vec<Value>),
    /// Insertion-ordered string-keyed entries
    Map(Vec<(String, Value)>),
    Optional(Option<Box<Value>>),
    Provider(ObjectProvider),
}

impl Value {
    /// Wrap a bean instance.
    pub fn bean<T: Send + Sync + 'static>(instance: T) -> Self {
        Self::Bean(Arc::new(instance))
    }

    /// Wrap an already shared bean instance.
    pub fn shared<T: Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self::Bean(instance)
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Short name of the value's kind, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Str(_) => "String",
            Self::Int(_) => "i64",
            Self::Float(_) => "f64",
            Self::Bool(_) => "bool",
            Self::Bean(_) => "Bean",
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::Optional(_) => "Option",
            Self::Provider(_) => "ObjectProvider",
        }
    }

    /// Whether this value can be handed to a slot of `ty` without any conversion.
    ///
    /// Bean values only match their exact content type here; interface
    /// assignability needs class metadata and lives in the class registry.
    pub fn matches_exactly(&self, ty: &TypeRef) -> bool {
        match (self, ty) {
            (_, TypeRef::Any) => true,
            (Self::Str(_), TypeRef::Str)
            | (Self::Int(_), TypeRef::Int)
            | (Self::Float(_), TypeRef::Float)
            | (Self::Bool(_), TypeRef::Bool) => true,
            (Self::Bean(bean), TypeRef::Object(key)) => content_type(bean) == key.id(),
            (Self::List(items), TypeRef::List(inner)) => {
                items.iter().all(|item| item.matches_exactly(inner))
            }
            (Self::Map(entries), TypeRef::Map(inner)) => {
                entries.iter().all(|(_, v)| v.matches_exactly(inner))
            }
            (Self::Optional(None), TypeRef::Optional(_)) => true,
            (Self::Optional(Some(v)), TypeRef::Optional(inner)) => v.matches_exactly(inner),
            (Self::Provider(_), TypeRef::Provider(_)) => true,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_bean_ref(&self) -> Option<&BeanRef> {
        match self {
            Self::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Downcast a bean value to its concrete type.
    pub fn as_bean<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Self::Bean(bean) => Arc::clone(bean).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Extract an interface view, e.g. `value.as_shared::<dyn Greeter>()`.
    pub fn as_shared<I: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<I>> {
        match self {
            Self::Bean(bean) => bean.downcast_ref::<Arc<I>>().cloned(),
            _ => None,
        }
    }

    pub fn as_provider(&self) -> Option<&ObjectProvider> {
        match self {
            Self::Provider(p) => Some(p),
            _ => None,
        }
    }

    /// Unwrap an optional value; a non-optional value is returned as present.
    pub fn into_option(self) -> Option<Value> {
        match self {
            Self::Optional(inner) => inner.map(|v| *v),
            Self::Null => None,
            other => Some(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Bean(_) => f.write_str("Bean(..)"),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Self::Optional(inner) => write!(f, "Optional({inner:?})"),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<BeanRef> for Value {
    fn from(bean: BeanRef) -> Self {
        Self::Bean(bean)
    }
}

/// Positional arguments handed to constructors and factory methods.
///
/// Values have already been converted to the declared parameter types, so the
/// typed accessors only fail when a callback reads a parameter as something
/// other than what it declared.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn at(&self, index: usize, expected: &str) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            BeanError::custom(format!(
                "argument index {index} out of range (expected {expected}, have {} arguments)",
                self.values.len()
            ))
        })
    }

    fn mismatch(value: &Value, expected: &str) -> BeanError {
        BeanError::type_mismatch(value.kind_name(), expected)
    }

    /// Take ownership of an argument, leaving `Null` behind.
    pub fn take(&mut self, index: usize) -> Result<Value> {
        self.at(index, "any value")?;
        Ok(std::mem::take(&mut self.values[index]))
    }

    pub fn string(&self, index: usize) -> Result<String> {
        let value = self.at(index, "String")?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| Self::mismatch(value, "String"))
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        let value = self.at(index, "i64")?;
        value.as_int().ok_or_else(|| Self::mismatch(value, "i64"))
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        let value = self.at(index, "f64")?;
        value.as_float().ok_or_else(|| Self::mismatch(value, "f64"))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        let value = self.at(index, "bool")?;
        value.as_bool().ok_or_else(|| Self::mismatch(value, "bool"))
    }

    /// Concrete bean argument.
    pub fn bean<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        let name = std::any::type_name::<T>();
        let value = self.at(index, name)?;
        value.as_bean::<T>().ok_or_else(|| Self::mismatch(value, name))
    }

    /// Interface-typed bean argument, e.g. `args.shared::<dyn Greeter>(0)`.
    pub fn shared<I: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<I>> {
        let name = std::any::type_name::<I>();
        let value = self.at(index, name)?;
        value.as_shared::<I>().ok_or_else(|| Self::mismatch(value, name))
    }

    /// Optional concrete bean argument; `Null` and empty optionals yield `None`.
    pub fn optional_bean<T: Send + Sync + 'static>(&self, index: usize) -> Result<Option<Arc<T>>> {
        let name = std::any::type_name::<T>();
        match self.at(index, name)? {
            Value::Null | Value::Optional(None) => Ok(None),
            Value::Optional(Some(inner)) => inner
                .as_bean::<T>()
                .map(Some)
                .ok_or_else(|| Self::mismatch(inner, name)),
            other => other
                .as_bean::<T>()
                .map(Some)
                .ok_or_else(|| Self::mismatch(other, name)),
        }
    }

    pub fn list(&self, index: usize) -> Result<&[Value]> {
        let value = self.at(index, "List")?;
        value.as_list().ok_or_else(|| Self::mismatch(value, "List"))
    }

    /// List of concrete beans.
    pub fn beans<T: Send + Sync + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        let name = std::any::type_name::<T>();
        self.list(index)?
            .iter()
            .map(|v| v.as_bean::<T>().ok_or_else(|| Self::mismatch(v, name)))
            .collect()
    }

    pub fn map(&self, index: usize) -> Result<&[(String, Value)]> {
        let value = self.at(index, "Map")?;
        value.as_map().ok_or_else(|| Self::mismatch(value, "Map"))
    }

    pub fn provider(&self, index: usize) -> Result<ObjectProvider> {
        let value = self.at(index, "ObjectProvider")?;
        value
            .as_provider()
            .cloned()
            .ok_or_else(|| Self::mismatch(value, "ObjectProvider"))
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn test_interface_key_differs_from_concrete() {
        assert_ne!(TypeKey::of::<English>(), TypeKey::interface::<dyn Greeter>());
        assert_eq!(TypeKey::interface::<dyn Greeter>().id(), TypeId::of::<Arc<dyn Greeter>>());
        assert!(TypeKey::interface::<dyn Greeter>().name().contains("Greeter"));
    }

    #[test]
    fn test_content_type_sees_through_arc() {
        let bean: BeanRef = Arc::new(English);
        assert_eq!(content_type(&bean), TypeId::of::<English>());

        let view: Arc<dyn Greeter> = Arc::new(English);
        let wrapped: BeanRef = Arc::new(view);
        assert_eq!(content_type(&wrapped), TypeKey::interface::<dyn Greeter>().id());
        let back = Value::Bean(wrapped).as_shared::<dyn Greeter>().unwrap();
        assert_eq!(back.greet(), "hello");
    }

    #[test]
    fn test_exact_matching() {
        assert!(Value::from("x").matches_exactly(&TypeRef::Str));
        assert!(!Value::from("5").matches_exactly(&TypeRef::Int));
        assert!(Value::bean(English).matches_exactly(&TypeRef::object::<English>()));
        assert!(!Value::bean(English).matches_exactly(&TypeRef::interface::<dyn Greeter>()));
        assert!(
            Value::List(vec![Value::Int(1), Value::Int(2)])
                .matches_exactly(&TypeRef::list(TypeRef::Int))
        );
        assert!(Value::Optional(None).matches_exactly(&TypeRef::optional(TypeRef::Str)));
    }

    #[test]
    fn test_simple_types() {
        assert!(TypeRef::Str.is_simple());
        assert!(TypeRef::list(TypeRef::Int).is_simple());
        assert!(!TypeRef::object::<English>().is_simple());
        assert!(!TypeRef::list(TypeRef::object::<English>()).is_simple());
    }

    #[test]
    fn test_args_accessors() {
        let args = Args::new(vec![
            Value::from("name"),
            Value::Int(3),
            Value::bean(English),
            Value::Optional(None),
        ]);
        assert_eq!(args.string(0).unwrap(), "name");
        assert_eq!(args.int(1).unwrap(), 3);
        assert_eq!(args.float(1).unwrap(), 3.0);
        assert!(args.bean::<English>(2).is_ok());
        assert!(args.optional_bean::<English>(3).unwrap().is_none());
        assert!(args.int(0).is_err());
        assert!(args.string(9).is_err());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeKey::of::<English>().short_name(), "English");
        assert_eq!(TypeKey::of::<String>().short_name(), "String");
    }
}
