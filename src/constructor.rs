//! Constructor and factory-method resolution
//!
//! Picks the constructor (or factory method) to call and builds its argument
//! list from the definition's arguments and, where allowed, autowiring.
//!
//! Candidates are tried greediest first. Each satisfiable candidate gets a
//! weight (the sum of its arguments' conversion costs) and the lightest wins.
//! Once a candidate has been satisfied, candidates with fewer parameters are
//! not considered. A tie between different signatures is an error unless the
//! definition resolves leniently, in which case the first one tried wins.
//!
//! The outcome is cached on the merged definition so later instances of the
//! same bean skip the search.

use crate::class::{BeanClass, FactoryMethod, Parameter};
use crate::container::Container;
use crate::context::CreationContext;
use crate::convert::{coerce, Weight};
use crate::definition::{AutowireMode, Executable, MergedDefinition, PreparedArg, ValueHolder};
use crate::resolver::DependencyDescriptor;
use crate::value::{BeanRef, TypeRef, Value};
use crate::{BeanError, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// A definition argument after reference resolution, before conversion.
struct ResolvedArg {
    value: Value,
    holder: ValueHolder,
}

#[derive(Default)]
struct ResolvedArgs {
    indexed: BTreeMap<usize, ResolvedArg>,
    generic: Vec<ResolvedArg>,
}

impl ResolvedArgs {
    fn count(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }
}

/// Where arguments for a candidate come from.
enum ArgSource<'a> {
    Explicit(&'a [Value]),
    Definition(ResolvedArgs),
}

/// Arguments built for one candidate.
#[derive(Default)]
struct ArgumentsHolder {
    args: Vec<Value>,
    prepared: Vec<PreparedArg>,
    resolve_necessary: bool,
    weight: Weight,
    autowired: Vec<String>,
}

/// A constructor or factory method under consideration.
struct Candidate<'a> {
    index: usize,
    params: &'a [Parameter],
    signature: String,
    returns_void: bool,
}

impl Candidate<'_> {
    fn same_parameter_types(&self, other: &Candidate<'_>) -> bool {
        self.params
            .iter()
            .map(|p| &p.ty)
            .eq(other.params.iter().map(|p| &p.ty))
    }
}

/// Arguments remembered from an earlier resolution.
enum CachedArgs {
    Resolved(Vec<Value>),
    Prepared(Vec<PreparedArg>),
}

fn parameter_label(index: usize) -> String {
    format!("constructor parameter {index}")
}

impl Container {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Instantiate `class` through one of its constructors.
    ///
    /// `determined` restricts the candidates (as chosen by a
    /// constructor-determining hook) and enables autowiring of parameters
    /// not covered by definition arguments.
    pub(crate) fn autowire_constructor(
        &self,
        name: &str,
        merged: &MergedDefinition,
        class: &Arc<BeanClass>,
        determined: Option<Vec<usize>>,
        explicit: Option<Vec<Value>>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        if explicit.is_none() {
            if let Some((Executable::Constructor(index), cached)) = Self::cached_plan(merged) {
                if let Some(constructor) = class.constructors().get(index) {
                    let args = self.cached_arguments(name, merged, constructor.params(), cached, ctx)?;
                    return self.invoke_constructor(name, class, index, args);
                }
            }
        }

        merged.record_resolution();
        let definition = merged.definition();
        let autowiring = determined.is_some() || definition.autowire == AutowireMode::Constructor;
        let indices: Vec<usize> =
            determined.unwrap_or_else(|| (0..class.constructors().len()).collect());

        if indices.len() == 1 && explicit.is_none() && !definition.has_constructor_args() {
            let index = indices[0];
            if class.constructors().get(index).is_some_and(|c| c.param_count() == 0) {
                self.store_plan(merged, Executable::Constructor(index), None, &ArgumentsHolder::default());
                return self.invoke_constructor(name, class, index, Vec::new());
            }
        }

        let candidates: Vec<Candidate<'_>> = indices
            .iter()
            .filter_map(|&index| {
                class.constructors().get(index).map(|c| Candidate {
                    index,
                    params: c.params(),
                    signature: c.signature(),
                    returns_void: false,
                })
            })
            .collect();
        if candidates.is_empty() {
            return Err(BeanError::creation(
                name,
                format!("No constructor declared on bean class [{}]", class.name()),
            ));
        }

        let source = match explicit.as_deref() {
            Some(args) => ArgSource::Explicit(args),
            None => ArgSource::Definition(self.resolve_constructor_arguments(name, merged, ctx)?),
        };
        let (chosen, holder) =
            self.select_candidate(name, merged, "constructor", class, candidates, &source, autowiring, ctx)?;

        if explicit.is_none() {
            self.store_plan(merged, Executable::Constructor(chosen.index), None, &holder);
        }
        self.register_autowired(name, &holder.autowired);
        self.invoke_constructor(name, class, chosen.index, holder.args)
    }

    fn invoke_constructor(
        &self,
        name: &str,
        class: &BeanClass,
        index: usize,
        args: Vec<Value>,
    ) -> Result<BeanRef> {
        let constructor = class.constructors().get(index).ok_or_else(|| {
            BeanError::creation(name, format!("Constructor #{index} not found on [{}]", class.name()))
        })?;
        constructor.invoke(args).map_err(|err| {
            BeanError::creation_caused_by(
                name,
                format!(
                    "Bean instantiation via constructor {}{} failed",
                    class.name(),
                    constructor.signature()
                ),
                err,
            )
        })
    }

    // =========================================================================
    // Factory methods
    // =========================================================================

    /// Instantiate through a static factory method of the bean's class or an
    /// instance factory method of another bean.
    pub(crate) fn instantiate_using_factory_method(
        &self,
        name: &str,
        merged: &MergedDefinition,
        explicit: Option<Vec<Value>>,
        ctx: &mut CreationContext,
    ) -> Result<BeanRef> {
        let definition = merged.definition();
        let method_name = definition
            .factory_method_name
            .as_deref()
            .ok_or_else(|| BeanError::definition(name, "no factory method specified"))?;

        let (factory_bean, factory_class, is_static) = match definition.factory_bean_name.as_deref() {
            Some(factory_name) => {
                if factory_name == name {
                    return Err(BeanError::definition(
                        name,
                        "factory-bean reference points back to the same bean definition",
                    ));
                }
                let bean = self.do_get_bean(factory_name, None, ctx)?;
                self.register_dependent_bean(factory_name, name);
                let class = self.inner.classes.class_of(&bean).ok_or_else(|| {
                    BeanError::creation(
                        name,
                        format!("Factory bean '{factory_name}' has no registered class metadata"),
                    )
                })?;
                (Some(bean), class, false)
            }
            None => (None, self.resolve_bean_class(name, merged)?, true),
        };

        if explicit.is_none() {
            if let Some((Executable::FactoryMethod(index), cached)) = Self::cached_plan(merged) {
                if let Some(method) = factory_class
                    .factory_methods()
                    .get(index)
                    .filter(|m| m.name() == method_name)
                {
                    let args = self.cached_arguments(name, merged, method.params(), cached, ctx)?;
                    return self.invoke_factory_method(name, merged, method, factory_bean.as_ref(), args);
                }
            }
        }

        merged.record_resolution();
        let candidates: Vec<Candidate<'_>> = factory_class
            .factory_methods_named(method_name, is_static)
            .map(|(index, m)| Candidate {
                index,
                params: m.params(),
                signature: m.signature(),
                returns_void: m.returns().is_none(),
            })
            .collect();

        if candidates.is_empty() {
            let owner = match definition.factory_bean_name.as_deref() {
                Some(factory_name) => format!("factory bean '{factory_name}'; "),
                None => String::new(),
            };
            return Err(BeanError::creation(
                name,
                format!(
                    "No matching factory method found on class [{}]: {owner}factory method '{method_name}()'. \
                     Check that a method with the specified name exists and that it is {}.",
                    factory_class.name(),
                    if is_static { "static" } else { "non-static" }
                ),
            ));
        }

        if candidates.len() == 1
            && explicit.is_none()
            && !definition.has_constructor_args()
            && candidates[0].params.is_empty()
        {
            let only = &candidates[0];
            if only.returns_void {
                return Err(Self::void_factory_method(name, method_name));
            }
            let index = only.index;
            self.store_plan(
                merged,
                Executable::FactoryMethod(index),
                Some(Arc::clone(&factory_class)),
                &ArgumentsHolder::default(),
            );
            let method = &factory_class.factory_methods()[index];
            return self.invoke_factory_method(name, merged, method, factory_bean.as_ref(), Vec::new());
        }

        let autowiring = definition.autowire == AutowireMode::Constructor;
        let source = match explicit.as_deref() {
            Some(args) => ArgSource::Explicit(args),
            None => ArgSource::Definition(self.resolve_constructor_arguments(name, merged, ctx)?),
        };
        let (chosen, holder) = self.select_candidate(
            name,
            merged,
            "factory method",
            &factory_class,
            candidates,
            &source,
            autowiring,
            ctx,
        )?;
        if chosen.returns_void {
            return Err(Self::void_factory_method(name, method_name));
        }

        if explicit.is_none() {
            self.store_plan(
                merged,
                Executable::FactoryMethod(chosen.index),
                Some(Arc::clone(&factory_class)),
                &holder,
            );
        }
        self.register_autowired(name, &holder.autowired);
        let method = &factory_class.factory_methods()[chosen.index];
        self.invoke_factory_method(name, merged, method, factory_bean.as_ref(), holder.args)
    }

    fn void_factory_method(name: &str, method_name: &str) -> BeanError {
        BeanError::creation(
            name,
            format!("Invalid factory method '{method_name}': needs to have a non-void return type"),
        )
    }

    fn invoke_factory_method(
        &self,
        name: &str,
        merged: &MergedDefinition,
        method: &FactoryMethod,
        target: Option<&BeanRef>,
        args: Vec<Value>,
    ) -> Result<BeanRef> {
        let bean = method.invoke(target, args).map_err(|err| {
            BeanError::creation_caused_by(
                name,
                format!("Instantiation via factory method '{}' failed", method.signature()),
                err,
            )
        })?;
        if let Some(returns) = method.returns() {
            merged.set_target_type(returns);
        }
        Ok(bean)
    }

    // =========================================================================
    // Candidate selection
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    fn select_candidate<'a>(
        &self,
        name: &str,
        merged: &MergedDefinition,
        kind: &str,
        owner: &BeanClass,
        mut candidates: Vec<Candidate<'a>>,
        source: &ArgSource<'_>,
        autowiring: bool,
        ctx: &mut CreationContext,
    ) -> Result<(Candidate<'a>, ArgumentsHolder)> {
        candidates.sort_by(|a, b| b.params.len().cmp(&a.params.len()));

        let min_args = match source {
            ArgSource::Explicit(args) => args.len(),
            ArgSource::Definition(_) => merged.definition().constructor_args.min_required(),
        };

        let mut best: Option<(usize, ArgumentsHolder)> = None;
        let mut min_weight = Weight::MAX;
        let mut ambiguous: Vec<usize> = Vec::new();
        let mut causes: Vec<BeanError> = Vec::new();

        for (position, candidate) in candidates.iter().enumerate() {
            let count = candidate.params.len();
            if let Some((_, holder)) = &best {
                if holder.args.len() > count {
                    // Already satisfied a greedier candidate.
                    break;
                }
            }
            if count < min_args {
                continue;
            }

            let attempt = match source {
                ArgSource::Explicit(args) if args.len() != count => continue,
                ArgSource::Explicit(args) => self.explicit_argument_array(name, candidate.params, args),
                ArgSource::Definition(resolved) => {
                    self.create_argument_array(name, resolved, candidate.params, autowiring, ctx)
                }
            };
            let holder = match attempt {
                Ok(holder) => holder,
                Err(err) => {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: "bean_container",
                        bean = name,
                        candidate = %candidate.signature,
                        error = %err,
                        "Candidate not satisfiable"
                    );
                    causes.push(err);
                    continue;
                }
            };

            if holder.weight < min_weight {
                min_weight = holder.weight;
                best = Some((position, holder));
                ambiguous.clear();
            } else if let Some((winner, _)) = &best {
                let winner = &candidates[*winner];
                if holder.weight == min_weight
                    && winner.params.len() == count
                    && !winner.same_parameter_types(candidate)
                {
                    ambiguous.push(position);
                }
            }
        }

        let Some((position, holder)) = best else {
            return Err(self.unresolvable_candidates(name, kind, owner, causes));
        };

        if !ambiguous.is_empty() && !merged.definition().is_lenient() {
            let signatures: Vec<&str> = std::iter::once(position)
                .chain(ambiguous)
                .map(|i| candidates[i].signature.as_str())
                .collect();
            return Err(BeanError::creation(
                name,
                format!(
                    "Ambiguous {kind} matches found on bean class [{}] (hint: specify index/type/name \
                     arguments for simple parameters to avoid type ambiguities): {}",
                    owner.name(),
                    signatures.join(", ")
                ),
            ));
        }

        Ok((candidates.swap_remove(position), holder))
    }

    /// Error when no candidate could be satisfied. The last failure becomes
    /// the cause; earlier ones are recorded as suppressed errors of the
    /// singleton creation in progress, or attached directly otherwise.
    fn unresolvable_candidates(
        &self,
        name: &str,
        kind: &str,
        owner: &BeanClass,
        mut causes: Vec<BeanError>,
    ) -> BeanError {
        let message = format!(
            "Could not resolve matching {kind} on bean class [{}] (hint: specify index/type/name \
             arguments for simple parameters to avoid type ambiguities)",
            owner.name()
        );
        let Some(last) = causes.pop() else {
            return BeanError::creation(name, message);
        };

        let limit = self.inner.singletons.max_suppressed();
        let mut related = Vec::new();
        for cause in causes {
            if !self.inner.singletons.on_suppressed(cause.clone()) && related.len() < limit {
                related.push(cause);
            }
        }
        BeanError::creation_caused_by(name, message, last).with_related(related)
    }

    // =========================================================================
    // Argument construction
    // =========================================================================

    /// Resolve the definition's constructor arguments (references, inner
    /// beans, expressions) without converting them yet.
    fn resolve_constructor_arguments(
        &self,
        name: &str,
        merged: &MergedDefinition,
        ctx: &mut CreationContext,
    ) -> Result<ResolvedArgs> {
        let args = &merged.definition().constructor_args;
        let mut resolved = ResolvedArgs::default();
        for (index, holder) in &args.indexed {
            let label = format!("constructor argument with index {index}");
            let value = self.resolve_value(name, merged, &holder.source, &label, ctx)?;
            resolved.indexed.insert(
                *index,
                ResolvedArg {
                    value,
                    holder: holder.clone(),
                },
            );
        }
        for holder in &args.generic {
            let value = self.resolve_value(name, merged, &holder.source, "constructor argument", ctx)?;
            resolved.generic.push(ResolvedArg {
                value,
                holder: holder.clone(),
            });
        }
        Ok(resolved)
    }

    fn create_argument_array(
        &self,
        name: &str,
        resolved: &ResolvedArgs,
        params: &[Parameter],
        autowiring: bool,
        ctx: &mut CreationContext,
    ) -> Result<ArgumentsHolder> {
        let fallback = !autowiring || params.len() == resolved.count();
        let mut holder = ArgumentsHolder::default();
        let mut used: HashSet<usize> = HashSet::new();

        for (index, param) in params.iter().enumerate() {
            match self.find_argument(resolved, index, param, &mut used, fallback) {
                Some(arg) => {
                    let (converted, weight) = self.convert_argument(name, index, arg.value.clone(), param)?;
                    holder.weight += weight;
                    if arg.holder.source.needs_resolution() {
                        holder.resolve_necessary = true;
                        holder.prepared.push(PreparedArg::Source(arg.holder.clone()));
                    } else {
                        holder.prepared.push(PreparedArg::Resolved(converted.clone()));
                    }
                    holder.args.push(converted);
                }
                None if autowiring => {
                    let (value, injected) = self.resolve_autowired_argument(name, index, param, ctx)?;
                    holder.autowired.extend(injected);
                    holder.prepared.push(PreparedArg::Autowired);
                    holder.resolve_necessary = true;
                    holder.args.push(value);
                }
                None => {
                    return Err(BeanError::unsatisfied(
                        name,
                        parameter_label(index),
                        BeanError::custom(format!(
                            "Ambiguous argument values for parameter of type [{}] - did you specify \
                             the correct bean references as arguments?",
                            param.ty.display_name()
                        )),
                    ));
                }
            }
        }
        Ok(holder)
    }

    fn explicit_argument_array(
        &self,
        name: &str,
        params: &[Parameter],
        explicit: &[Value],
    ) -> Result<ArgumentsHolder> {
        let mut holder = ArgumentsHolder::default();
        for (index, (param, value)) in params.iter().zip(explicit).enumerate() {
            let (converted, weight) = self.convert_argument(name, index, value.clone(), param)?;
            holder.weight += weight;
            holder.args.push(converted);
        }
        Ok(holder)
    }

    /// Pick the definition argument for parameter `index`: indexed first, then
    /// a generic one whose hints or value fit, then (if `fallback`) any unused
    /// generic argument.
    fn find_argument<'r>(
        &self,
        resolved: &'r ResolvedArgs,
        index: usize,
        param: &Parameter,
        used: &mut HashSet<usize>,
        fallback: bool,
    ) -> Option<&'r ResolvedArg> {
        if let Some(arg) = resolved.indexed.get(&index) {
            if Self::hints_match(&arg.holder, param) {
                return Some(arg);
            }
        }

        let typed = resolved
            .generic
            .iter()
            .enumerate()
            .find(|(i, arg)| !used.contains(i) && self.generic_matches(arg, param));
        if let Some((i, arg)) = typed {
            used.insert(i);
            return Some(arg);
        }

        if fallback {
            let any = resolved.generic.iter().enumerate().find(|(i, _)| !used.contains(i));
            if let Some((i, arg)) = any {
                used.insert(i);
                return Some(arg);
            }
        }
        None
    }

    fn hints_match(holder: &ValueHolder, param: &Parameter) -> bool {
        let type_ok = holder.ty.as_ref().is_none_or(|ty| *ty == param.ty);
        let name_ok = match (&holder.name, &param.name) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };
        type_ok && name_ok
    }

    fn generic_matches(&self, arg: &ResolvedArg, param: &Parameter) -> bool {
        let holder = &arg.holder;
        if let Some(wanted) = &holder.name {
            if param.name.as_ref() != Some(wanted) {
                return false;
            }
        }
        if let Some(ty) = &holder.ty {
            if *ty != param.ty {
                return false;
            }
        }
        if holder.ty.is_none() && holder.name.is_none() {
            return self.is_assignable_value(&arg.value, &param.ty);
        }
        true
    }

    /// Whether `value` fits `ty` without conversion.
    fn is_assignable_value(&self, value: &Value, ty: &TypeRef) -> bool {
        if value.matches_exactly(ty) {
            return true;
        }
        match (value, ty) {
            (Value::Bean(bean), TypeRef::Object(key)) => self.inner.classes.is_instance(bean, key),
            (Value::Null, TypeRef::Object(_) | TypeRef::Optional(_)) => true,
            _ => false,
        }
    }

    fn convert_argument(
        &self,
        name: &str,
        index: usize,
        value: Value,
        param: &Parameter,
    ) -> Result<(Value, Weight)> {
        let converter = self.type_converter();
        coerce(value, &param.ty, converter.as_ref(), &self.inner.classes)
            .map_err(|err| BeanError::unsatisfied(name, parameter_label(index), err))
    }

    fn resolve_autowired_argument(
        &self,
        name: &str,
        index: usize,
        param: &Parameter,
        ctx: &mut CreationContext,
    ) -> Result<(Value, Vec<String>)> {
        let descriptor = DependencyDescriptor::for_parameter(index, param);
        let mut injected = Vec::new();
        let value = self
            .do_resolve_dependency(&descriptor, Some(name), &mut injected, ctx)
            .map_err(|err| BeanError::unsatisfied(name, descriptor.injection_point.clone(), err))?;
        Ok((value.unwrap_or_default(), injected))
    }

    // =========================================================================
    // Resolution cache
    // =========================================================================

    fn cached_plan(merged: &MergedDefinition) -> Option<(Executable, CachedArgs)> {
        let cache = merged.cache.lock();
        if !cache.args_resolved {
            return None;
        }
        let executable = cache.executable?;
        let args = match (&cache.resolved_args, &cache.prepared_args) {
            (Some(resolved), _) => CachedArgs::Resolved(resolved.clone()),
            (None, Some(prepared)) => CachedArgs::Prepared(prepared.clone()),
            (None, None) => return None,
        };
        Some((executable, args))
    }

    fn cached_arguments(
        &self,
        name: &str,
        merged: &MergedDefinition,
        params: &[Parameter],
        cached: CachedArgs,
        ctx: &mut CreationContext,
    ) -> Result<Vec<Value>> {
        let prepared = match cached {
            CachedArgs::Resolved(args) => return Ok(args),
            CachedArgs::Prepared(prepared) => prepared,
        };

        let mut args = Vec::with_capacity(prepared.len());
        for (index, (arg, param)) in prepared.into_iter().zip(params).enumerate() {
            let value = match arg {
                PreparedArg::Resolved(value) => value,
                PreparedArg::Source(holder) => {
                    let label = format!("constructor argument with index {index}");
                    let raw = self.resolve_value(name, merged, &holder.source, &label, ctx)?;
                    self.convert_argument(name, index, raw, param)?.0
                }
                PreparedArg::Autowired => {
                    let (value, injected) = self.resolve_autowired_argument(name, index, param, ctx)?;
                    self.register_autowired(name, &injected);
                    value
                }
            };
            args.push(value);
        }
        Ok(args)
    }

    fn store_plan(
        &self,
        merged: &MergedDefinition,
        executable: Executable,
        factory_class: Option<Arc<BeanClass>>,
        holder: &ArgumentsHolder,
    ) {
        let mut cache = merged.cache.lock();
        cache.executable = Some(executable);
        cache.factory_class = factory_class;
        cache.args_resolved = true;
        if holder.resolve_necessary {
            cache.prepared_args = Some(holder.prepared.clone());
            cache.resolved_args = None;
        } else {
            cache.resolved_args = Some(holder.args.clone());
            cache.prepared_args = None;
        }
    }

    fn register_autowired(&self, name: &str, autowired: &[String]) {
        for dependency in autowired {
            self.register_dependent_bean(dependency, name);

            #[cfg(feature = "logging")]
            trace!(
                target: "bean_container",
                bean = name,
                dependency = %dependency,
                "Autowired constructor argument"
            );
        }
    }
}
