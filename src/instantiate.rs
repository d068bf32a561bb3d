//! Raw bean instantiation
//!
//! Chooses how a bean instance comes into being, in order of precedence:
//! instance supplier, factory method, a previously resolved constructor,
//! constructor autowiring (when hooks pick constructors, the definition asks
//! for it, or arguments are given), and finally the no-argument constructor.

use crate::class::BeanClass;
use crate::container::Container;
use crate::context::CreationContext;
use crate::definition::{AutowireMode, ClassRef, Executable, MergedDefinition};
use crate::value::{BeanRef, Value};
use crate::{BeanError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

impl Container {
    /// Produce the raw instance for `name`, before population and
    /// initialization.
    pub(crate) fn create_bean_instance(
        &self,
        name: &str,
        merged: &MergedDefinition,
        explicit: Option<Vec<Value>>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        let definition = merged.definition();

        if let Some(supplier) = &definition.instance_supplier {
            #[cfg(feature = "logging")]
            trace!(target: "bean_container", bean = name, "Obtaining bean from instance supplier");

            return supplier(self).map_err(|err| {
                BeanError::creation_caused_by(name, "Instantiation of supplied bean failed", err)
            });
        }

        if definition.factory_method_name.is_some() {
            return self.instantiate_using_factory_method(name, merged, explicit, ctx);
        }

        let class = self.resolve_bean_class(name, merged)?;

        // Re-creating the same bean: reuse the constructor found last time.
        if explicit.is_none() && matches!(merged.cache.lock().executable, Some(Executable::Constructor(_))) {
            return self.autowire_constructor(name, merged, &class, None, None, ctx);
        }

        let determined = self.determine_constructors(&class, name)?;
        if determined.is_some()
            || definition.autowire == AutowireMode::Constructor
            || definition.has_constructor_args()
            || explicit.is_some()
        {
            return self.autowire_constructor(name, merged, &class, determined, explicit, ctx);
        }

        self.instantiate_default(name, merged, &class, ctx)
    }

    /// No-argument construction. A class whose only constructor takes
    /// parameters is autowired through it instead.
    fn instantiate_default(
        &self,
        name: &str,
        merged: &MergedDefinition,
        class: &Arc<BeanClass>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        let constructors = class.constructors();
        if let Some(index) = constructors.iter().position(|c| c.param_count() == 0) {
            return constructors[index].invoke(Vec::new()).map_err(|err| {
                BeanError::creation_caused_by(
                    name,
                    format!("Bean instantiation via no-argument constructor of {} failed", class.name()),
                    err,
                )
            });
        }
        if constructors.len() == 1 {
            return self.autowire_constructor(name, merged, class, Some(vec![0]), None, ctx);
        }
        Err(BeanError::creation(
            name,
            format!("No default constructor found on bean class [{}]", class.name()),
        ))
    }

    /// Ask constructor-determining hooks for candidates; the first hook with
    /// an answer wins.
    fn determine_constructors(&self, class: &BeanClass, name: &str) -> Result<Option<Vec<usize>>> {
        let hooks = self.hooks();
        for hook in hooks.determine_constructors() {
            if let Some(indices) = hook(class, name)? {
                if !indices.is_empty() {
                    return Ok(Some(indices));
                }
            }
        }
        Ok(None)
    }

    /// Resolve the definition's class reference against the class registry,
    /// evaluating expression-valued names. Plain names are cached.
    pub(crate) fn resolve_bean_class(&self, name: &str, merged: &MergedDefinition) -> Result<Arc<BeanClass>> {
        if let Some(class) = merged.cached_class() {
            return Ok(class);
        }
        match &merged.definition().class {
            Some(ClassRef::Resolved(class)) => Ok(Arc::clone(class)),
            Some(ClassRef::Named(class_name)) => {
                let class = self.lookup_class(name, class_name)?;
                merged.cache.lock().resolved_class = Some(Arc::clone(&class));
                Ok(class)
            }
            Some(ClassRef::Expr(expression)) => {
                let evaluated = self.expression_resolver().evaluate(expression, name)?;
                match evaluated.as_str() {
                    Some(class_name) => self.lookup_class(name, class_name),
                    None => Err(BeanError::CannotLoadClass {
                        name: name.to_owned(),
                        class_name: format!("{expression} (evaluated to {})", evaluated.kind_name()),
                    }),
                }
            }
            None => Err(BeanError::definition(name, "no bean class specified on bean definition")),
        }
    }

    fn lookup_class(&self, name: &str, class_name: &str) -> Result<Arc<BeanClass>> {
        self.inner
            .classes
            .by_name(class_name)
            .ok_or_else(|| BeanError::CannotLoadClass {
                name: name.to_owned(),
                class_name: class_name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BeanDefinition;
    use crate::expression::PlaceholderResolver;

    struct Sqlite;
    struct Postgres;

    fn storage_container(kind: &str) -> Container {
        let container = Container::new();
        container.register_class(BeanClass::builder::<Sqlite>().default_constructor(|| Sqlite).build());
        container.register_class(BeanClass::builder::<Postgres>().default_constructor(|| Postgres).build());
        container.set_expression_resolver(Arc::new(PlaceholderResolver::with_properties([(
            "storage.kind",
            kind,
        )])));
        container
            .register_definition("storage", BeanDefinition::class_expr("${storage.kind}"))
            .unwrap();
        container
    }

    #[test]
    fn test_class_name_from_expression() {
        let sqlite = storage_container("Sqlite");
        assert!(sqlite.get::<Sqlite>("storage").is_ok());

        let postgres = storage_container("Postgres");
        assert!(postgres.get::<Postgres>("storage").is_ok());
        assert!(postgres.get::<Sqlite>("storage").is_err());
    }

    #[test]
    fn test_class_name_from_expression_unknown() {
        let container = storage_container("Oracle");
        let err = container.get_bean("storage").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            BeanError::CannotLoadClass { class_name, .. } if class_name == "Oracle"
        ));
    }

    #[test]
    fn test_named_class_is_cached() {
        let container = Container::new();
        container.register_class(BeanClass::builder::<Sqlite>().default_constructor(|| Sqlite).build());
        container
            .register_definition("storage", BeanDefinition::named_class("Sqlite").prototype())
            .unwrap();

        assert!(container.get::<Sqlite>("storage").is_ok());
        assert!(container.merged_definition("storage").unwrap().cached_class().is_some());
    }
}
