//! Dependency resolution
//!
//! Turns a declared injection point ([`DependencyDescriptor`]) into a value:
//! a single bean chosen among type-compatible candidates, every candidate for
//! collection-shaped points, an optional wrapper, or a deferred
//! [`ObjectProvider`].
//!
//! Choosing among several candidates goes primary first, then lowest priority
//! value, then a name match against the injection point.

use crate::class::{Parameter, Property};
use crate::container::Container;
use crate::context::CreationContext;
use crate::provider::ObjectProvider;
use crate::value::{BeanRef, TypeKey, TypeRef, Value};
use crate::{BeanError, Result};

#[cfg(feature = "logging")]
use tracing::trace;

/// A declared dependency: what type is wanted and how strictly.
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    pub ty: TypeRef,
    /// Parameter or property name, used as the last tie-breaker
    pub name: Option<String>,
    pub required: bool,
    /// Sort collection-shaped results by order and priority
    pub ordered: bool,
    /// Describes the injection point in error messages
    pub injection_point: String,
}

impl DependencyDescriptor {
    /// Required dependency on `ty`.
    pub fn new(ty: TypeRef) -> Self {
        Self {
            injection_point: format!("dependency of type '{}'", ty.display_name()),
            ty,
            name: None,
            required: true,
            ordered: true,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub(crate) fn for_parameter(index: usize, param: &Parameter) -> Self {
        let mut descriptor = Self::new(param.ty.clone());
        descriptor.name = param.name.clone();
        descriptor.injection_point = format!("constructor parameter {index}");
        descriptor
    }

    /// By-type property autowiring: optional, and no name fallback.
    pub(crate) fn for_property(property: &Property) -> Self {
        let mut descriptor = Self::new(property.ty().clone()).required(false);
        descriptor.injection_point = format!("bean property '{}'", property.name());
        descriptor
    }

    fn with_type(&self, ty: TypeRef) -> Self {
        Self {
            ty,
            ..self.clone()
        }
    }
}

impl Container {
    /// Resolve `descriptor` on behalf of `requesting_bean` (if any). Names of
    /// the beans injected are appended to `injected`.
    ///
    /// Returns `Ok(None)` only for non-required dependencies that have no
    /// candidate.
    pub fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
        injected: &mut Vec<String>,
    ) -> Result<Option<Value>> {
        self.do_resolve_dependency(
            descriptor,
            requesting_bean,
            injected,
            &mut CreationContext::new(),
        )
    }

    /// Core resolution. Names of the beans injected are appended to `injected`
    /// so callers can record dependency edges.
    pub(crate) fn do_resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        injected: &mut Vec<String>,
        ctx: &mut CreationContext,
    ) -> Result<Option<Value>> {
        match &descriptor.ty {
            TypeRef::Optional(inner) => {
                let inner = descriptor.with_type((**inner).clone()).required(false);
                let value = self.do_resolve_dependency(&inner, requesting, injected, ctx)?;
                return Ok(Some(Value::Optional(value.map(Box::new))));
            }
            TypeRef::Provider(inner) => {
                let target = descriptor.with_type((**inner).clone());
                return Ok(Some(Value::Provider(ObjectProvider::new(
                    self.downgrade(),
                    target,
                    requesting,
                ))));
            }
            TypeRef::Object(key) => {
                if let Some(known) = self.resolvable_dependency(key) {
                    return Ok(Some(Value::Bean(known)));
                }
            }
            _ => {}
        }

        if let Some(all) = self.resolve_multiple(descriptor, requesting, injected, ctx)? {
            return Ok(Some(all));
        }

        let TypeRef::Object(key) = &descriptor.ty else {
            return self.absent(descriptor);
        };
        let candidates = self.find_autowire_candidates(key, requesting);
        let chosen = match candidates.len() {
            0 => return self.absent(descriptor),
            1 => candidates[0].clone(),
            _ => match self.determine_autowire_candidate(&candidates, descriptor)? {
                Some(name) => name,
                None if descriptor.required || !descriptor.ty.is_multiple() => {
                    return Err(BeanError::NoUniqueBean {
                        type_name: key.name().to_owned(),
                        message: format!(
                            "expected single matching bean but found {}",
                            candidates.len()
                        ),
                        names: candidates,
                    });
                }
                None => return Ok(None),
            },
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "bean_container",
            dependency = key.name(),
            candidate = %chosen,
            "Resolved dependency by type"
        );

        injected.push(chosen.clone());
        let bean = self.do_get_bean(&chosen, None, ctx)?;
        self.adapt_bean(&chosen, bean, key).map(|b| Some(Value::Bean(b)))
    }

    fn absent(&self, descriptor: &DependencyDescriptor) -> Result<Option<Value>> {
        if descriptor.required {
            Err(self.no_matching_bean(descriptor))
        } else {
            Ok(None)
        }
    }

    /// Every candidate for a list- or map-shaped dependency; `None` when the
    /// shape does not apply or nothing matches.
    fn resolve_multiple(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        injected: &mut Vec<String>,
        ctx: &mut CreationContext,
    ) -> Result<Option<Value>> {
        let (element, as_map) = match &descriptor.ty {
            TypeRef::List(element) => (element, false),
            TypeRef::Map(element) => (element, true),
            _ => return Ok(None),
        };
        let TypeRef::Object(key) = element.as_ref() else {
            return Ok(None);
        };

        let candidates = self.find_autowire_candidates(key, requesting);
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut found: Vec<(String, BeanRef, i32)> = Vec::with_capacity(candidates.len());
        for name in candidates {
            let bean = self.do_get_bean(&name, None, ctx)?;
            let order = self.order_of(&name, &bean);
            let view = self.adapt_bean(&name, bean, key)?;
            injected.push(name.clone());
            found.push((name, view, order));
        }
        if descriptor.ordered && !as_map {
            found.sort_by_key(|(_, _, order)| *order);
        }

        Ok(Some(if as_map {
            Value::Map(
                found
                    .into_iter()
                    .map(|(name, bean, _)| (name, Value::Bean(bean)))
                    .collect(),
            )
        } else {
            Value::List(found.into_iter().map(|(_, bean, _)| Value::Bean(bean)).collect())
        }))
    }

    /// Names of beans that can fill a slot of type `key`, excluding the
    /// requesting bean itself and non-candidates.
    ///
    /// If nothing else matches, a bean produced by one of the requesting
    /// bean's own factory methods is accepted.
    pub(crate) fn find_autowire_candidates(&self, key: &TypeKey, requesting: Option<&str>) -> Vec<String> {
        let names = self.bean_names_for_type_including_ancestors(key);
        let result: Vec<String> = names
            .iter()
            .filter(|c| !self.is_self_reference(requesting, c) && self.is_autowire_candidate(c))
            .cloned()
            .collect();
        if !result.is_empty() {
            return result;
        }
        names
            .into_iter()
            .filter(|c| {
                requesting != Some(c.as_str())
                    && self.is_self_reference(requesting, c)
                    && self.is_autowire_candidate(c)
            })
            .collect()
    }

    /// Whether `candidate` is `requesting` or is produced by a factory method
    /// on `requesting`.
    fn is_self_reference(&self, requesting: Option<&str>, candidate: &str) -> bool {
        let Some(requesting) = requesting else {
            return false;
        };
        requesting == candidate
            || (self.inner.definitions.contains(candidate)
                && self.merged_definition(candidate).is_ok_and(|m| {
                    m.definition().factory_bean_name.as_deref() == Some(requesting)
                }))
    }

    fn is_autowire_candidate(&self, name: &str) -> bool {
        if self.inner.definitions.contains(name) {
            return self
                .merged_definition(name)
                .is_ok_and(|m| m.definition().is_autowire_candidate());
        }
        if !self.inner.singletons.contains_singleton(name) {
            if let Some(parent) = &self.inner.parent {
                return parent.is_autowire_candidate(name);
            }
        }
        true
    }

    /// Pick one of several candidates: primary, then priority, then name.
    fn determine_autowire_candidate(
        &self,
        candidates: &[String],
        descriptor: &DependencyDescriptor,
    ) -> Result<Option<String>> {
        if let Some(primary) = self.determine_primary_candidate(candidates, descriptor)? {
            return Ok(Some(primary));
        }
        if let Some(best) = self.determine_highest_priority_candidate(candidates, descriptor)? {
            return Ok(Some(best));
        }
        if let Some(wanted) = descriptor.name.as_deref() {
            if let Some(found) = candidates
                .iter()
                .find(|c| c.as_str() == wanted || self.aliases(c).iter().any(|a| a == wanted))
            {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    fn determine_primary_candidate(
        &self,
        candidates: &[String],
        descriptor: &DependencyDescriptor,
    ) -> Result<Option<String>> {
        let mut primary: Option<&String> = None;
        for candidate in candidates {
            if !self.is_primary(candidate) {
                continue;
            }
            match primary {
                None => primary = Some(candidate),
                Some(current) => {
                    let candidate_local = self.inner.definitions.contains(candidate);
                    let current_local = self.inner.definitions.contains(current);
                    if candidate_local && current_local {
                        return Err(BeanError::NoUniqueBean {
                            type_name: descriptor.ty.display_name(),
                            names: candidates.to_vec(),
                            message: "more than one 'primary' bean found among candidates".into(),
                        });
                    }
                    // A local primary shadows one from an ancestor container.
                    if candidate_local {
                        primary = Some(candidate);
                    }
                }
            }
        }
        Ok(primary.cloned())
    }

    /// Candidate with the lowest priority value. Candidates without a
    /// priority are ignored; a tie on the lowest value is an error.
    fn determine_highest_priority_candidate(
        &self,
        candidates: &[String],
        descriptor: &DependencyDescriptor,
    ) -> Result<Option<String>> {
        let ranked: Vec<(&String, i32)> = candidates
            .iter()
            .filter_map(|c| self.priority_of(c).map(|p| (c, p)))
            .collect();
        let Some(best) = ranked.iter().map(|(_, p)| *p).min() else {
            return Ok(None);
        };
        let mut winners = ranked.iter().filter(|(_, p)| *p == best).map(|(c, _)| *c);
        let first = winners.next().cloned();
        if winners.next().is_some() {
            return Err(BeanError::NoUniqueBean {
                type_name: descriptor.ty.display_name(),
                names: candidates.to_vec(),
                message: format!("Multiple beans found with the same priority ('{best}') among candidates"),
            });
        }
        Ok(first)
    }

    fn is_primary(&self, name: &str) -> bool {
        if self.inner.definitions.contains(name) {
            return self.merged_definition(name).is_ok_and(|m| m.definition().primary);
        }
        match &self.inner.parent {
            Some(parent) if !self.inner.singletons.contains_singleton(name) => parent.is_primary(name),
            _ => false,
        }
    }

    fn priority_of(&self, name: &str) -> Option<i32> {
        if self.inner.definitions.contains(name) {
            let merged = self.merged_definition(name).ok()?;
            if let Some(priority) = merged.definition().priority {
                return Some(priority);
            }
            return self
                .predict_type(name, &merged)
                .and_then(|t| self.inner.classes.get(&t.id()))
                .and_then(|c| c.priority());
        }
        if let Ok(Some(bean)) = self.inner.singletons.get_singleton(name, false) {
            return self.inner.classes.class_of(&bean).and_then(|c| c.priority());
        }
        self.inner.parent.as_ref().and_then(|p| p.priority_of(name))
    }

    /// Sort key for collection injection: factory-method order, then class
    /// order, then class priority; unordered beans go last.
    fn order_of(&self, name: &str, bean: &BeanRef) -> i32 {
        if let Some(order) = self.factory_method_order(name) {
            return order;
        }
        self.inner
            .classes
            .class_of(bean)
            .and_then(|c| c.order().or(c.priority()))
            .unwrap_or(i32::MAX)
    }

    fn factory_method_order(&self, name: &str) -> Option<i32> {
        if !self.inner.definitions.contains(name) {
            return None;
        }
        let merged = self.merged_definition(name).ok()?;
        let method = merged.definition().factory_method_name.as_deref()?;
        let cache = merged.cache.lock();
        if let (Some(crate::definition::Executable::FactoryMethod(index)), Some(class)) =
            (cache.executable, cache.factory_class.as_ref())
        {
            return class.factory_methods().get(index).and_then(|m| m.order());
        }
        let class = cache.factory_class.clone().or_else(|| cache.resolved_class.clone())?;
        drop(cache);
        class
            .factory_methods()
            .iter()
            .filter(|m| m.name() == method)
            .find_map(|m| m.order())
    }

    /// Error for a required dependency with no candidate. Distinguishes a
    /// bean that was declared with a matching type but whose exposed instance
    /// no longer matches.
    fn no_matching_bean(&self, descriptor: &DependencyDescriptor) -> BeanError {
        if let TypeRef::Object(key) = &descriptor.ty {
            for name in self.inner.definitions.names() {
                let Ok(Some(bean)) = self.inner.singletons.get_singleton(&name, false) else {
                    continue;
                };
                if self.inner.classes.is_instance(&bean, key) {
                    continue;
                }
                let declared = self
                    .merged_definition(&name)
                    .ok()
                    .and_then(|m| m.resolved_target_type());
                if declared.is_some_and(|t| self.inner.classes.is_type_assignable(&t, key)) {
                    return BeanError::BeanNotOfRequiredType {
                        name,
                        required: key.name().to_owned(),
                        actual: self.inner.classes.type_name_of(&bean),
                    };
                }
            }
        }
        BeanError::NoSuchBeanOfType {
            type_name: descriptor.ty.display_name(),
            message: "expected at least 1 bean which qualifies as autowire candidate".into(),
        }
    }

    /// Name of the single bean `descriptor` would resolve to.
    pub(crate) fn unique_candidate_name(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
    ) -> Result<String> {
        let TypeRef::Object(key) = &descriptor.ty else {
            return Err(self.no_matching_bean(descriptor));
        };
        let candidates = self.find_autowire_candidates(key, requesting);
        match candidates.len() {
            0 => Err(self.no_matching_bean(descriptor)),
            1 => Ok(candidates[0].clone()),
            n => self
                .determine_autowire_candidate(&candidates, descriptor)?
                .ok_or_else(|| BeanError::NoUniqueBean {
                    type_name: key.name().to_owned(),
                    message: format!("expected single matching bean but found {n}"),
                    names: candidates.clone(),
                }),
        }
    }

    /// View `bean` as `key`, or report it under `name` as the wrong type.
    pub(crate) fn adapt_bean(&self, name: &str, bean: BeanRef, key: &TypeKey) -> Result<BeanRef> {
        self.inner
            .classes
            .adapt(&bean, key)
            .ok_or_else(|| BeanError::BeanNotOfRequiredType {
                name: name.to_owned(),
                required: key.name().to_owned(),
                actual: self.inner.classes.type_name_of(&bean),
            })
    }

    pub(crate) fn adapt_to(&self, name: &str, bean: BeanRef, ty: &TypeRef) -> Result<BeanRef> {
        match ty {
            TypeRef::Object(key) => self.adapt_bean(name, bean, key),
            _ => Ok(bean),
        }
    }
}
