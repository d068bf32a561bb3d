//! Post-processor hooks
//!
//! Extension logic plugs into the creation pipeline as a list of
//! [`PostProcessor`] values. Each variant names the phase it runs in and holds
//! a plain closure; the pipeline walks the list once per phase, in
//! registration order.
//!
//! ```rust
//! use bean_container::{Container, PostProcessor};
//!
//! let container = Container::new();
//! container.add_post_processor(PostProcessor::after_init(|bean, name| {
//!     println!("{name} is ready");
//!     Ok(Some(bean))
//! }));
//! ```

use crate::definition::PropertyValues;
use crate::value::BeanRef;
use crate::Result;
use std::fmt;
use std::sync::Arc;

type BeforeInstantiationFn =
    dyn Fn(&crate::class::BeanClass, &str) -> Result<Option<BeanRef>> + Send + Sync;
type AfterInstantiationFn = dyn Fn(&BeanRef, &str) -> Result<bool> + Send + Sync;
type PropertiesFn = dyn Fn(PropertyValues, &BeanRef, &str) -> Result<PropertyValues> + Send + Sync;
type DetermineConstructorsFn =
    dyn Fn(&crate::class::BeanClass, &str) -> Result<Option<Vec<usize>>> + Send + Sync;
type EarlyReferenceFn = dyn Fn(BeanRef, &str) -> Result<BeanRef> + Send + Sync;
type InitFn = dyn Fn(BeanRef, &str) -> Result<Option<BeanRef>> + Send + Sync;
type BeforeDestroyFn = dyn Fn(&BeanRef, &str) -> Result<()> + Send + Sync;
type RequiresDestructionFn = dyn Fn(&BeanRef) -> bool + Send + Sync;

/// A hook into one phase of bean creation or destruction.
#[derive(Clone)]
pub enum PostProcessor {
    /// Before instantiation; a returned bean short-circuits creation and only
    /// after-init hooks still run on it
    BeforeInstantiation(Arc<BeforeInstantiationFn>),
    /// After instantiation, before population; `false` skips property population
    AfterInstantiation(Arc<AfterInstantiationFn>),
    /// Rewrites the property values about to be applied
    Properties(Arc<PropertiesFn>),
    /// Picks candidate constructors (indices into the class's constructors)
    DetermineConstructors(Arc<DetermineConstructorsFn>),
    /// Produces the reference handed out to break a circular dependency
    EarlyReference(Arc<EarlyReferenceFn>),
    /// Before initialization callbacks; `None` stops the chain
    BeforeInit(Arc<InitFn>),
    /// After initialization callbacks; `None` stops the chain
    AfterInit(Arc<InitFn>),
    /// Before the bean's own destroy callbacks
    BeforeDestroy {
        hook: Arc<BeforeDestroyFn>,
        applies_to: Arc<RequiresDestructionFn>,
    },
}

impl PostProcessor {
    pub fn before_instantiation<F>(f: F) -> Self
    where
        F: Fn(&crate::class::BeanClass, &str) -> Result<Option<BeanRef>> + Send + Sync + 'static,
    {
        Self::BeforeInstantiation(Arc::new(f))
    }

    pub fn after_instantiation<F>(f: F) -> Self
    where
        F: Fn(&BeanRef, &str) -> Result<bool> + Send + Sync + 'static,
    {
        Self::AfterInstantiation(Arc::new(f))
    }

    pub fn properties<F>(f: F) -> Self
    where
        F: Fn(PropertyValues, &BeanRef, &str) -> Result<PropertyValues> + Send + Sync + 'static,
    {
        Self::Properties(Arc::new(f))
    }

    pub fn determine_constructors<F>(f: F) -> Self
    where
        F: Fn(&crate::class::BeanClass, &str) -> Result<Option<Vec<usize>>> + Send + Sync + 'static,
    {
        Self::DetermineConstructors(Arc::new(f))
    }

    pub fn early_reference<F>(f: F) -> Self
    where
        F: Fn(BeanRef, &str) -> Result<BeanRef> + Send + Sync + 'static,
    {
        Self::EarlyReference(Arc::new(f))
    }

    pub fn before_init<F>(f: F) -> Self
    where
        F: Fn(BeanRef, &str) -> Result<Option<BeanRef>> + Send + Sync + 'static,
    {
        Self::BeforeInit(Arc::new(f))
    }

    pub fn after_init<F>(f: F) -> Self
    where
        F: Fn(BeanRef, &str) -> Result<Option<BeanRef>> + Send + Sync + 'static,
    {
        Self::AfterInit(Arc::new(f))
    }

    /// Destruction hook applying to every bean.
    pub fn before_destroy<F>(f: F) -> Self
    where
        F: Fn(&BeanRef, &str) -> Result<()> + Send + Sync + 'static,
    {
        Self::BeforeDestroy {
            hook: Arc::new(f),
            applies_to: Arc::new(|_| true),
        }
    }

    /// Destruction hook applying only to beans accepted by `applies_to`.
    pub fn before_destroy_if<F, P>(applies_to: P, f: F) -> Self
    where
        F: Fn(&BeanRef, &str) -> Result<()> + Send + Sync + 'static,
        P: Fn(&BeanRef) -> bool + Send + Sync + 'static,
    {
        Self::BeforeDestroy {
            hook: Arc::new(f),
            applies_to: Arc::new(applies_to),
        }
    }

    fn phase(&self) -> &'static str {
        match self {
            Self::BeforeInstantiation(_) => "before_instantiation",
            Self::AfterInstantiation(_) => "after_instantiation",
            Self::Properties(_) => "properties",
            Self::DetermineConstructors(_) => "determine_constructors",
            Self::EarlyReference(_) => "early_reference",
            Self::BeforeInit(_) => "before_init",
            Self::AfterInit(_) => "after_init",
            Self::BeforeDestroy { .. } => "before_destroy",
        }
    }
}

impl fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostProcessor::{}", self.phase())
    }
}

/// Snapshot of the registered hooks, grouped for the pipeline.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub all: Vec<PostProcessor>,
}

impl Hooks {
    pub fn before_instantiation(&self) -> impl Iterator<Item = &Arc<BeforeInstantiationFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::BeforeInstantiation(f) => Some(f),
            _ => None,
        })
    }

    pub fn after_instantiation(&self) -> impl Iterator<Item = &Arc<AfterInstantiationFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::AfterInstantiation(f) => Some(f),
            _ => None,
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertiesFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::Properties(f) => Some(f),
            _ => None,
        })
    }

    pub fn determine_constructors(&self) -> impl Iterator<Item = &Arc<DetermineConstructorsFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::DetermineConstructors(f) => Some(f),
            _ => None,
        })
    }

    pub fn early_reference(&self) -> impl Iterator<Item = &Arc<EarlyReferenceFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::EarlyReference(f) => Some(f),
            _ => None,
        })
    }

    pub fn before_init(&self) -> impl Iterator<Item = &Arc<InitFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::BeforeInit(f) => Some(f),
            _ => None,
        })
    }

    pub fn after_init(&self) -> impl Iterator<Item = &Arc<InitFn>> {
        self.all.iter().filter_map(|p| match p {
            PostProcessor::AfterInit(f) => Some(f),
            _ => None,
        })
    }

    /// Destruction hooks that apply to `bean`.
    pub fn before_destroy_for(&self, bean: &BeanRef) -> Vec<Arc<BeforeDestroyFn>> {
        self.all
            .iter()
            .filter_map(|p| match p {
                PostProcessor::BeforeDestroy { hook, applies_to } if applies_to(bean) => {
                    Some(Arc::clone(hook))
                }
                _ => None,
            })
            .collect()
    }
}

/// Run an init-phase chain: each hook gets the previous result; `None`
/// stops the chain and the last non-empty result is kept.
pub(crate) fn apply_init_chain<'a>(
    hooks: impl Iterator<Item = &'a Arc<InitFn>>,
    bean: BeanRef,
    name: &str,
) -> Result<BeanRef> {
    let mut current = bean;
    for hook in hooks {
        match hook(Arc::clone(&current), name)? {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_init_chain_substitutes_and_short_circuits() {
        static THIRD_CALLS: AtomicUsize = AtomicUsize::new(0);
        let hooks = Hooks {
            all: vec![
                PostProcessor::after_init(|_, _| Ok(Some(Arc::new(String::from("wrapped")) as BeanRef))),
                PostProcessor::after_init(|_, _| Ok(None)),
                PostProcessor::after_init(|bean, _| {
                    THIRD_CALLS.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(bean))
                }),
            ],
        };

        let out = apply_init_chain(hooks.after_init(), Arc::new(1i64), "a").unwrap();
        assert_eq!(out.downcast_ref::<String>().map(String::as_str), Some("wrapped"));
        assert_eq!(THIRD_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_phase_filters() {
        let hooks = Hooks {
            all: vec![
                PostProcessor::before_init(|b, _| Ok(Some(b))),
                PostProcessor::before_destroy_if(|b| b.is::<i64>(), |_, _| Ok(())),
            ],
        };
        assert_eq!(hooks.before_init().count(), 1);
        assert_eq!(hooks.after_init().count(), 0);
        assert_eq!(hooks.before_instantiation().count(), 0);

        assert_eq!(hooks.before_destroy_for(&(Arc::new(1i64) as BeanRef)).len(), 1);
        assert!(hooks.before_destroy_for(&(Arc::new("x") as BeanRef)).is_empty());
    }
}
