//! Property population and definition value resolution
//!
//! After instantiation a bean's properties are filled in: by-name or by-type
//! autowiring adds values for unset object properties, property hooks may
//! rewrite the set, an optional dependency check runs, and each value is
//! resolved and converted before its setter is called.

use crate::class::{BeanClass, Property};
use crate::container::Container;
use crate::context::CreationContext;
use crate::convert::coerce;
use crate::definition::{
    merge, AutowireMode, BeanScope, DependencyCheck, MergedDefinition, PropertyValues, ValueSource,
};
use crate::resolver::DependencyDescriptor;
use crate::value::{content_type, BeanRef, TypeRef, Value};
use crate::{BeanError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Prefix of generated inner bean names.
pub const INNER_BEAN_PREFIX: &str = "(inner bean)";

static INNER_BEAN_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Container {
    // =========================================================================
    // Population
    // =========================================================================

    /// Fill in `bean`'s properties as described by `merged`.
    pub(crate) fn populate_bean(
        &self,
        name: &str,
        merged: &MergedDefinition,
        bean: &BeanRef,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        let definition = merged.definition();
        let hooks = self.hooks();

        if !definition.synthetic {
            for hook in hooks.after_instantiation() {
                if !hook(bean, name)? {
                    #[cfg(feature = "logging")]
                    trace!(target: "bean_container", bean = name, "Property population skipped by hook");
                    return Ok(());
                }
            }
        }

        let class = self
            .inner
            .classes
            .class_of(bean)
            .or_else(|| merged.cached_class().filter(|c| c.key().id() == content_type(bean)));
        let mut values = definition.properties.clone();

        if let Some(class) = &class {
            match definition.autowire {
                AutowireMode::ByName => self.autowire_by_name(name, class, &mut values, ctx)?,
                AutowireMode::ByType => self.autowire_by_type(name, class, &mut values, ctx)?,
                AutowireMode::No | AutowireMode::Constructor => {}
            }
        }

        if !definition.synthetic {
            for hook in hooks.properties() {
                values = hook(values, bean, name)?;
            }
        }

        if definition.dependency_check != DependencyCheck::None {
            if let Some(class) = &class {
                Self::check_dependencies(name, class, definition.dependency_check, &values)?;
            }
        }

        if values.is_empty() {
            return Ok(());
        }
        let class = class.ok_or_else(|| {
            BeanError::creation(
                name,
                format!(
                    "Cannot set properties on bean of type {}: no class metadata registered",
                    self.inner.classes.type_name_of(bean)
                ),
            )
        })?;
        self.apply_property_values(name, merged, bean, &class, values, ctx)
    }

    /// Object-typed properties of `class` with no value yet.
    fn unsatisfied_object_properties<'c>(
        class: &'c BeanClass,
        values: &PropertyValues,
    ) -> impl Iterator<Item = &'c Property> {
        let set: Vec<String> = values.names().map(str::to_owned).collect();
        class
            .properties()
            .iter()
            .filter(move |p| !p.ty().is_simple() && !set.iter().any(|n| n == p.name()))
    }

    fn autowire_by_name(
        &self,
        name: &str,
        class: &BeanClass,
        values: &mut PropertyValues,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        let wanted: Vec<String> = Self::unsatisfied_object_properties(class, values)
            .map(|p| p.name().to_owned())
            .collect();
        for property in wanted {
            if !self.contains_bean(&property) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "bean_container",
                    bean = name,
                    property = %property,
                    "Not autowiring property by name: no matching bean"
                );
                continue;
            }
            let dependency = self.do_get_bean(&property, None, ctx)?;
            self.register_dependent_bean(&property, name);
            values.add(property.clone(), ValueSource::Literal(Value::Bean(dependency)));

            #[cfg(feature = "logging")]
            debug!(
                target: "bean_container",
                bean = name,
                property = %property,
                "Added autowiring by name"
            );
        }
        Ok(())
    }

    fn autowire_by_type(
        &self,
        name: &str,
        class: &BeanClass,
        values: &mut PropertyValues,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        let wanted: Vec<Property> = Self::unsatisfied_object_properties(class, values)
            .filter(|p| !matches!(p.ty(), TypeRef::Any))
            .cloned()
            .collect();
        for property in wanted {
            let descriptor = DependencyDescriptor::for_property(&property);
            let mut injected = Vec::new();
            let resolved = self
                .do_resolve_dependency(&descriptor, Some(name), &mut injected, ctx)
                .map_err(|err| BeanError::unsatisfied(name, descriptor.injection_point.clone(), err))?;
            if let Some(value) = resolved {
                values.add(property.name().to_owned(), ValueSource::Literal(value));
            }
            for dependency in injected {
                self.register_dependent_bean(&dependency, name);

                #[cfg(feature = "logging")]
                debug!(
                    target: "bean_container",
                    bean = name,
                    property = property.name(),
                    dependency = %dependency,
                    "Autowiring by type"
                );
            }
        }
        Ok(())
    }

    /// Every property covered by `check` must have a value.
    fn check_dependencies(
        name: &str,
        class: &BeanClass,
        check: DependencyCheck,
        values: &PropertyValues,
    ) -> Result<()> {
        for property in class.properties() {
            if values.contains(property.name()) {
                continue;
            }
            let simple = property.ty().is_simple();
            let checked = match check {
                DependencyCheck::None => false,
                DependencyCheck::Simple => simple,
                DependencyCheck::Objects => !simple,
                DependencyCheck::All => true,
            };
            if checked {
                return Err(BeanError::unsatisfied(
                    name,
                    format!("bean property '{}'", property.name()),
                    BeanError::custom(
                        "Set this property value or disable dependency checking for this bean.",
                    ),
                ));
            }
        }
        Ok(())
    }

    fn apply_property_values(
        &self,
        name: &str,
        merged: &MergedDefinition,
        bean: &BeanRef,
        class: &BeanClass,
        values: PropertyValues,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        let converter = self.type_converter();
        for entry in values {
            let property = class.property(&entry.name).ok_or_else(|| {
                BeanError::creation(
                    name,
                    format!(
                        "Invalid property '{}' of bean class [{}]: Bean property '{}' is not writable",
                        entry.name,
                        class.name(),
                        entry.name
                    ),
                )
            })?;

            // Text values straight from the definition convert the same way
            // every time.
            let cacheable = matches!(
                (&entry.source, merged.definition().properties.get(&entry.name)),
                (ValueSource::Text(a), Some(ValueSource::Text(b))) if a == b
            );
            let cached = if cacheable {
                merged.cache.lock().converted_properties.get(&entry.name).cloned()
            } else {
                None
            };

            let value = match cached {
                Some(value) => value,
                None => {
                    let label = format!("bean property '{}'", entry.name);
                    let raw = self.resolve_value(name, merged, &entry.source, &label, ctx)?;
                    let (converted, _) = coerce(raw, property.ty(), converter.as_ref(), &self.inner.classes)
                        .map_err(|err| {
                            BeanError::creation_caused_by(
                                name,
                                format!("Failed to convert property value for property '{}'", entry.name),
                                err,
                            )
                        })?;
                    if cacheable {
                        merged
                            .cache
                            .lock()
                            .converted_properties
                            .insert(entry.name.clone(), converted.clone());
                    }
                    converted
                }
            };

            property.set(bean, value).map_err(|err| {
                BeanError::creation_caused_by(
                    name,
                    format!("Error setting property value for property '{}'", entry.name),
                    err,
                )
            })?;
        }
        Ok(())
    }

    // =========================================================================
    // Value resolution
    // =========================================================================

    /// Resolve a definition value: bean references, bean names, inner beans,
    /// expressions, and collections of those. Conversion happens later,
    /// against the target slot.
    pub(crate) fn resolve_value(
        &self,
        owner: &str,
        merged: &MergedDefinition,
        source: &ValueSource,
        context: &str,
        ctx: &mut CreationContext,
    ) -> Result<Value> {
        match source {
            ValueSource::Null => Ok(Value::Null),
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::Text(text) => Ok(Value::Str(text.clone())),
            ValueSource::Expr(expression) => self.expression_resolver().evaluate(expression, owner),
            ValueSource::Ref(reference) => {
                let target = self.evaluate_name(reference, owner)?;
                let bean = self.do_get_bean(&target, None, ctx).map_err(|err| {
                    BeanError::creation_caused_by(
                        owner,
                        format!("Cannot resolve reference to bean '{target}' while setting {context}"),
                        err,
                    )
                })?;
                self.register_dependent_bean(&target, owner);
                Ok(Value::Bean(bean))
            }
            ValueSource::NameRef(reference) => {
                let target = self.evaluate_name(reference, owner)?;
                if !self.contains_bean(&target) {
                    return Err(BeanError::definition(
                        owner,
                        format!("Invalid bean name '{target}' in bean reference for {context}"),
                    ));
                }
                Ok(Value::Str(target))
            }
            ValueSource::Inner(definition) => self
                .resolve_inner_bean(owner, merged, definition, ctx)
                .map_err(|err| {
                    BeanError::creation_caused_by(
                        owner,
                        format!("Cannot create inner bean while setting {context}"),
                        err,
                    )
                }),
            ValueSource::List(items) => items
                .iter()
                .map(|item| self.resolve_value(owner, merged, item, context, ctx))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            ValueSource::Map(entries) => entries
                .iter()
                .map(|(key, item)| {
                    self.resolve_value(owner, merged, item, context, ctx)
                        .map(|v| (key.clone(), v))
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
        }
    }

    /// Bean names in references may themselves be expressions.
    fn evaluate_name(&self, reference: &str, owner: &str) -> Result<String> {
        if !reference.contains("${") {
            return Ok(reference.to_owned());
        }
        let evaluated = self.expression_resolver().evaluate(reference, owner)?;
        evaluated
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| BeanError::definition(owner, format!("bean reference '{reference}' did not evaluate to a name")))
    }

    /// Create an anonymous inner bean owned by `owner`. It is registered as
    /// contained in its owner, inherits a non-singleton owner scope, and is
    /// never cached as a singleton.
    ///
    /// Only inner beans of singletons get a unique name. Every instance of a
    /// non-singleton owner shares one name, so repeated creation adds no new
    /// graph entries.
    fn resolve_inner_bean(
        &self,
        owner: &str,
        outer: &MergedDefinition,
        definition: &crate::definition::BeanDefinition,
        ctx: &mut CreationContext,
    ) -> Result<Value> {
        let inner_name = if outer.is_singleton() {
            let id = INNER_BEAN_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("{INNER_BEAN_PREFIX}#{id:x}")
        } else {
            format!("{INNER_BEAN_PREFIX}#{owner}")
        };

        let mut resolved = match definition.parent.as_deref() {
            Some(parent) => {
                let parent_def = self.merged_definition(parent)?.definition().clone();
                merge(&parent_def, definition)
            }
            None => definition.clone(),
        };
        if !outer.is_singleton() {
            resolved.scope = Some(outer.scope());
        } else if resolved.scope.is_none() {
            resolved.scope = Some(BeanScope::Singleton);
        }

        #[cfg(feature = "logging")]
        trace!(target: "bean_container", bean = owner, inner = %inner_name, "Creating inner bean");

        let inner = Arc::new(MergedDefinition::new(inner_name.clone(), resolved));
        self.inner.singletons.register_contained_bean(&inner_name, owner);
        let bean = self.create_bean(&inner_name, &inner, None, ctx)?;
        Ok(Value::Bean(bean))
    }
}
