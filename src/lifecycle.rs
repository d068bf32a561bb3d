//! Initialization and destruction callbacks
//!
//! Initialization order: aware callback, before-init hooks, the type's own
//! init callback, the definition's init method, after-init hooks. Destruction
//! order: before-destroy hooks, the type's own destroy callback, then the
//! definition's destroy method (named, or inferred for closeable types).

use crate::class::{AwareContext, BeanClass, OWN_DESTROY_METHOD, OWN_INIT_METHOD};
use crate::container::Container;
use crate::definition::{DestroyMethod, MergedDefinition, INFERRED_DESTROY_METHODS};
use crate::processor::apply_init_chain;
use crate::singleton::Disposable;
use crate::value::{content_type, BeanRef};
use crate::{BeanError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

type DestroyHook = Arc<dyn Fn(&BeanRef, &str) -> Result<()> + Send + Sync>;

impl Container {
    /// Class metadata for a bean: registered metadata for its content type,
    /// else the class its definition resolved to.
    pub(crate) fn class_for(
        &self,
        bean: &BeanRef,
        merged: Option<&MergedDefinition>,
    ) -> Option<Arc<BeanClass>> {
        self.inner.classes.class_of(bean).or_else(|| {
            merged
                .and_then(MergedDefinition::cached_class)
                .filter(|class| class.key().id() == content_type(bean))
        })
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Run the initialization sequence; returns the bean to expose, which
    /// hooks may have replaced.
    pub(crate) fn initialize_bean_internal(
        &self,
        name: &str,
        bean: BeanRef,
        merged: Option<&MergedDefinition>,
    ) -> Result<BeanRef> {
        let class = self.class_for(&bean, merged);
        if let Some(class) = &class {
            class.invoke_aware(
                &bean,
                &AwareContext {
                    bean_name: name,
                    container: self,
                },
            )?;
        }

        let synthetic = merged.is_some_and(|m| m.definition().synthetic);
        let hooks = self.hooks();

        let mut current = bean;
        if !synthetic {
            current = apply_init_chain(hooks.before_init(), current, name)?;
        }

        self.invoke_init_methods(name, &current, merged)
            .map_err(|err| match err {
                err @ BeanError::BeanDefinition { .. } => err,
                err => BeanError::creation_caused_by(name, "Invocation of init method failed", err),
            })?;

        if !synthetic {
            current = apply_init_chain(hooks.after_init(), current, name)?;
        }
        Ok(current)
    }

    fn invoke_init_methods(
        &self,
        name: &str,
        bean: &BeanRef,
        merged: Option<&MergedDefinition>,
    ) -> Result<()> {
        // A hook may have swapped in a bean of another type.
        let Some(class) = self.class_for(bean, merged) else {
            return Ok(());
        };

        let own_external = merged.is_some_and(|m| m.is_external_init_method(OWN_INIT_METHOD));
        if !own_external {
            if let Some(result) = class.invoke_own_init(bean) {
                #[cfg(feature = "logging")]
                trace!(target: "bean_container", bean = name, "Invoking own init callback");
                result?;
            }
        }

        let Some(merged) = merged else {
            return Ok(());
        };
        let definition = merged.definition();
        let Some(method) = definition.init_method.as_deref() else {
            return Ok(());
        };
        if (method == OWN_INIT_METHOD && class.has_own_init()) || merged.is_external_init_method(method) {
            return Ok(());
        }

        match class.invoke_method(method, bean) {
            Some(result) => {
                #[cfg(feature = "logging")]
                trace!(target: "bean_container", bean = name, method, "Invoking init method");
                result
            }
            None if definition.enforce_init_method => Err(BeanError::definition(
                name,
                format!("Could not find an init method named '{method}' on bean with name '{name}'"),
            )),
            None => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "bean_container",
                    bean = name,
                    method,
                    "No default init method found"
                );
                Ok(())
            }
        }
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Build the destruction callback for `bean`, or `None` if nothing needs
    /// to run when it goes away.
    pub(crate) fn disposable_for(
        &self,
        name: &str,
        bean: &BeanRef,
        merged: Option<&MergedDefinition>,
    ) -> Result<Option<Arc<DisposableAdapter>>> {
        let class = self.class_for(bean, merged);
        let hooks = self.hooks().before_destroy_for(bean);

        let invoke_own = class.as_ref().is_some_and(|c| c.has_own_destroy())
            && !merged.is_some_and(|m| m.is_external_destroy_method(OWN_DESTROY_METHOD));

        let mut methods = Vec::new();
        if let Some(class) = &class {
            methods = Self::destroy_method_names(name, class, merged, invoke_own)?;
        }

        if hooks.is_empty() && !invoke_own && methods.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(DisposableAdapter {
            name: name.to_owned(),
            bean: Arc::clone(bean),
            class,
            hooks,
            invoke_own,
            methods,
        })))
    }

    fn destroy_method_names(
        name: &str,
        class: &BeanClass,
        merged: Option<&MergedDefinition>,
        invoke_own: bool,
    ) -> Result<Vec<String>> {
        let declared = merged.and_then(|m| m.definition().destroy_method.clone());
        let names: Vec<String> = match declared {
            Some(DestroyMethod::Named(method)) => {
                if !class.has_method(&method) {
                    if merged.is_some_and(|m| m.definition().enforce_destroy_method) {
                        return Err(BeanError::definition(
                            name,
                            format!("Could not find a destroy method named '{method}' on bean with name '{name}'"),
                        ));
                    }
                    #[cfg(feature = "logging")]
                    trace!(target: "bean_container", bean = name, method = %method, "No default destroy method found");
                    Vec::new()
                } else {
                    vec![method]
                }
            }
            Some(DestroyMethod::Infer) => Self::inferred_destroy_method(class).into_iter().collect(),
            None if class.is_closeable() => Self::inferred_destroy_method(class).into_iter().collect(),
            None => Vec::new(),
        };

        Ok(names
            .into_iter()
            .filter(|method| !(invoke_own && method == OWN_DESTROY_METHOD))
            .filter(|method| !merged.is_some_and(|m| m.is_external_destroy_method(method)))
            .collect())
    }

    fn inferred_destroy_method(class: &BeanClass) -> Option<String> {
        if class.has_own_destroy() {
            return None;
        }
        if class.is_closeable() {
            return Some("close".to_owned());
        }
        INFERRED_DESTROY_METHODS
            .iter()
            .find(|m| class.has_method(m))
            .map(|m| (*m).to_owned())
    }

    /// Register `bean` for destruction with its scope. Prototypes are never
    /// tracked.
    pub(crate) fn register_disposable_if_necessary(
        &self,
        name: &str,
        bean: &BeanRef,
        merged: &MergedDefinition,
    ) -> Result<()> {
        if merged.is_prototype() {
            return Ok(());
        }
        let Some(adapter) = self.disposable_for(name, bean, Some(merged))? else {
            return Ok(());
        };

        if merged.is_singleton() {
            self.inner.singletons.register_disposable(name, adapter);
        } else {
            let scope_name = merged.scope();
            let scope = self.scope(scope_name.name()).ok_or_else(|| {
                BeanError::custom(format!("No Scope registered for scope name '{scope_name}'"))
            })?;
            scope.register_destruction_callback(name, Box::new(move || adapter.destroy()));
        }

        #[cfg(feature = "logging")]
        debug!(target: "bean_container", bean = name, "Registered bean for destruction");
        Ok(())
    }
}

/// Runs a bean's destruction sequence. Every step is attempted; failures are
/// logged and swallowed.
pub(crate) struct DisposableAdapter {
    name: String,
    bean: BeanRef,
    class: Option<Arc<BeanClass>>,
    hooks: Vec<DestroyHook>,
    invoke_own: bool,
    methods: Vec<String>,
}

impl Disposable for DisposableAdapter {
    fn destroy(&self) {
        for hook in &self.hooks {
            if let Err(_err) = hook(&self.bean, &self.name) {
                #[cfg(feature = "logging")]
                warn!(
                    target: "bean_container",
                    bean = %self.name,
                    error = %_err,
                    "Destruction hook failed"
                );
            }
        }

        let Some(class) = &self.class else {
            return;
        };

        if self.invoke_own {
            if let Some(Err(_err)) = class.invoke_own_destroy(&self.bean) {
                #[cfg(feature = "logging")]
                warn!(
                    target: "bean_container",
                    bean = %self.name,
                    error = %_err,
                    "Invocation of destroy method failed"
                );
            }
        }

        for method in &self.methods {
            match class.invoke_method(method, &self.bean) {
                Some(Ok(())) => {
                    #[cfg(feature = "logging")]
                    trace!(target: "bean_container", bean = %self.name, method = %method, "Invoked destroy method");
                }
                Some(Err(_err)) => {
                    #[cfg(feature = "logging")]
                    warn!(
                        target: "bean_container",
                        bean = %self.name,
                        method = %method,
                        error = %_err,
                        "Invocation of destroy method failed"
                    );
                }
                None => {}
            }
        }
    }
}
