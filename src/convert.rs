//! Value conversion
//!
//! The container converts definition-supplied values into the declared types
//! of constructor parameters and properties through a [`TypeConverter`].
//! Object-typed slots are handled before the converter is consulted: a bean
//! either matches the slot exactly or is upcast to an interface view through
//! the class registry.

use crate::class::ClassRegistry;
use crate::value::{TypeRef, Value};
use crate::{BeanError, Result};

/// Converts a value to a declared type.
pub trait TypeConverter: Send + Sync {
    fn convert(&self, value: Value, target: &TypeRef) -> Result<Value>;
}

/// Cost of handing a value to a slot, used to rank constructor candidates.
pub type Weight = u32;

/// Value already of the declared type.
pub const WEIGHT_EXACT: Weight = 0;
/// Bean assignable only through an interface upcast.
pub const WEIGHT_UPCAST: Weight = 1;
/// Value needed conversion.
pub const WEIGHT_CONVERTED: Weight = 2;

/// Default converter for scalar values, lists, maps and optionals.
///
/// - strings parse into `i64`, `f64` and `bool` (`true/false/yes/no/on/off/1/0`)
/// - scalars stringify
/// - ints widen to floats
/// - comma-separated strings split into lists, single values wrap into
///   one-element lists
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTypeConverter;

impl SimpleTypeConverter {
    fn mismatch(value: &Value, target: &TypeRef, detail: Option<String>) -> BeanError {
        match detail {
            Some(detail) => {
                BeanError::type_mismatch_because(value.kind_name(), target.display_name(), detail)
            }
            None => BeanError::type_mismatch(value.kind_name(), target.display_name()),
        }
    }

    fn parse_bool(s: &str) -> Option<bool> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl TypeConverter for SimpleTypeConverter {
    fn convert(&self, value: Value, target: &TypeRef) -> Result<Value> {
        if value.matches_exactly(target) {
            return Ok(value);
        }
        match (value, target) {
            (Value::Null, TypeRef::Object(_) | TypeRef::Any) => Ok(Value::Null),
            (Value::Null, TypeRef::Optional(_)) => Ok(Value::Optional(None)),

            (Value::Int(i), TypeRef::Str) => Ok(Value::Str(i.to_string())),
            (Value::Float(f), TypeRef::Str) => Ok(Value::Str(f.to_string())),
            (Value::Bool(b), TypeRef::Str) => Ok(Value::Str(b.to_string())),

            (Value::Str(s), TypeRef::Int) => s.trim().parse::<i64>().map(Value::Int).map_err(|e| {
                Self::mismatch(&Value::Str(s.clone()), target, Some(e.to_string()))
            }),
            (Value::Str(s), TypeRef::Float) => {
                s.trim().parse::<f64>().map(Value::Float).map_err(|e| {
                    Self::mismatch(&Value::Str(s.clone()), target, Some(e.to_string()))
                })
            }
            (Value::Int(i), TypeRef::Float) => Ok(Value::Float(i as f64)),
            (Value::Str(s), TypeRef::Bool) => Self::parse_bool(&s).map(Value::Bool).ok_or_else(|| {
                Self::mismatch(
                    &Value::Str(s.clone()),
                    target,
                    Some(format!("'{s}' is not a boolean")),
                )
            }),

            (Value::List(items), TypeRef::List(inner)) => items
                .into_iter()
                .map(|item| self.convert(item, inner))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            (Value::Str(s), TypeRef::List(inner)) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| self.convert(Value::Str(part.to_owned()), inner))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            (Value::Map(entries), TypeRef::Map(inner)) => entries
                .into_iter()
                .map(|(k, v)| self.convert(v, inner).map(|v| (k, v)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
            (Value::Optional(inner_value), TypeRef::Optional(inner)) => match inner_value {
                None => Ok(Value::Optional(None)),
                Some(v) => self
                    .convert(*v, inner)
                    .map(|v| Value::Optional(Some(Box::new(v)))),
            },
            (single, TypeRef::List(inner)) if !matches!(single, Value::Map(_) | Value::Null) => {
                self.convert(single, inner).map(|v| Value::List(vec![v]))
            }
            (other, TypeRef::Optional(inner)) => self
                .convert(other, inner)
                .map(|v| Value::Optional(Some(Box::new(v)))),

            (other, _) => Err(Self::mismatch(&other, target, None)),
        }
    }
}

/// Coerce `value` into `target`, returning the converted value and its weight.
///
/// Structure (lists, maps, optionals) is walked here so that beans nested in
/// collections are adapted to interface views as well; scalar leaves are
/// delegated to `converter`.
pub(crate) fn coerce(
    value: Value,
    target: &TypeRef,
    converter: &dyn TypeConverter,
    classes: &ClassRegistry,
) -> Result<(Value, Weight)> {
    if value.matches_exactly(target) {
        return Ok((value, WEIGHT_EXACT));
    }
    match (value, target) {
        (Value::Bean(bean), TypeRef::Object(key)) => match classes.adapt(&bean, key) {
            Some(view) => Ok((Value::Bean(view), WEIGHT_UPCAST)),
            None => Err(BeanError::type_mismatch(
                classes.type_name_of(&bean),
                key.name(),
            )),
        },
        (Value::List(items), TypeRef::List(inner)) => {
            let mut weight = WEIGHT_EXACT;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let (v, w) = coerce(item, inner, converter, classes)?;
                weight = weight.max(w);
                out.push(v);
            }
            Ok((Value::List(out), weight))
        }
        (Value::Map(entries), TypeRef::Map(inner)) => {
            let mut weight = WEIGHT_EXACT;
            let mut out = Vec::with_capacity(entries.len());
            for (k, item) in entries {
                let (v, w) = coerce(item, inner, converter, classes)?;
                weight = weight.max(w);
                out.push((k, v));
            }
            Ok((Value::Map(out), weight))
        }
        (Value::Optional(None), TypeRef::Optional(_)) => Ok((Value::Optional(None), WEIGHT_EXACT)),
        (Value::Optional(Some(v)), TypeRef::Optional(inner)) => {
            let (v, w) = coerce(*v, inner, converter, classes)?;
            Ok((Value::Optional(Some(Box::new(v))), w))
        }
        (Value::Bean(bean), TypeRef::Optional(inner)) => {
            let (v, w) = coerce(Value::Bean(bean), inner, converter, classes)?;
            Ok((Value::Optional(Some(Box::new(v))), w.max(WEIGHT_UPCAST)))
        }
        (Value::Bean(bean), TypeRef::List(inner)) => {
            let (v, w) = coerce(Value::Bean(bean), inner, converter, classes)?;
            Ok((Value::List(vec![v]), w.max(WEIGHT_UPCAST)))
        }
        (Value::Null, TypeRef::Object(_)) => Ok((Value::Null, WEIGHT_EXACT)),
        (other, _) => converter
            .convert(other, target)
            .map(|v| (v, WEIGHT_CONVERTED)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::BeanClass;
    use crate::value::{BeanRef, TypeKey};
    use std::sync::Arc;

    #[test]
    fn test_scalar_conversions() {
        let c = SimpleTypeConverter;
        assert_eq!(c.convert(Value::from("42"), &TypeRef::Int).unwrap().as_int(), Some(42));
        assert_eq!(c.convert(Value::from(" 2.5 "), &TypeRef::Float).unwrap().as_float(), Some(2.5));
        assert_eq!(c.convert(Value::from("yes"), &TypeRef::Bool).unwrap().as_bool(), Some(true));
        assert_eq!(c.convert(Value::from(7i64), &TypeRef::Str).unwrap().as_str(), Some("7"));
        assert_eq!(c.convert(Value::from(7i64), &TypeRef::Float).unwrap().as_float(), Some(7.0));
        assert!(c.convert(Value::from("x"), &TypeRef::Int).is_err());
        assert!(c.convert(Value::from(true), &TypeRef::Int).is_err());
    }

    #[test]
    fn test_collection_conversions() {
        let c = SimpleTypeConverter;
        let list = c
            .convert(Value::from("1, 2,3"), &TypeRef::list(TypeRef::Int))
            .unwrap();
        let ints: Vec<i64> = list.as_list().unwrap().iter().filter_map(Value::as_int).collect();
        assert_eq!(ints, vec![1, 2, 3]);

        let wrapped = c.convert(Value::from(5i64), &TypeRef::list(TypeRef::Str)).unwrap();
        assert_eq!(wrapped.as_list().unwrap()[0].as_str(), Some("5"));

        let opt = c.convert(Value::Null, &TypeRef::optional(TypeRef::Int)).unwrap();
        assert!(matches!(opt, Value::Optional(None)));
    }

    #[test]
    fn test_coerce_weights() {
        trait Named: Send + Sync {}
        struct Thing;
        impl Named for Thing {}

        let classes = ClassRegistry::new();
        classes.register(
            BeanClass::builder::<Thing>()
                .implements::<dyn Named>(|t| t)
                .build(),
        );
        let c = SimpleTypeConverter;
        let bean: BeanRef = Arc::new(Thing);

        let (_, exact) = coerce(Value::Bean(Arc::clone(&bean)), &TypeRef::object::<Thing>(), &c, &classes).unwrap();
        assert_eq!(exact, WEIGHT_EXACT);

        let (view, upcast) = coerce(Value::Bean(Arc::clone(&bean)), &TypeRef::interface::<dyn Named>(), &c, &classes).unwrap();
        assert_eq!(upcast, WEIGHT_UPCAST);
        assert!(view.as_shared::<dyn Named>().is_some());

        let (_, converted) = coerce(Value::from("3"), &TypeRef::Int, &c, &classes).unwrap();
        assert_eq!(converted, WEIGHT_CONVERTED);

        assert!(coerce(Value::Bean(bean), &TypeRef::Object(TypeKey::of::<String>()), &c, &classes).is_err());
    }
}
