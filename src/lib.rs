//! # Bean Container - Inversion of Control for Rust
//!
//! A container that creates, wires and manages application objects ("beans")
//! from declarative definitions.
//!
//! ## Features
//!
//! - **Definitions** - Class, scope, constructor arguments, properties,
//!   init/destroy methods, parent definitions and aliases
//! - **Constructor resolution** - Overloaded constructors and factory methods
//!   are matched against the arguments at hand by conversion weight
//! - **Autowiring** - By type, by name or through constructors, with
//!   primary/priority/name tie-breaking
//! - **Circular references** - Singletons are exposed early to break
//!   property-injection cycles; constructor cycles are reported
//! - **Lifecycle** - Aware callbacks, init and destroy hooks, ordered shutdown
//!   of dependent beans
//! - **Scopes** - Singleton, prototype and pluggable custom scopes
//! - **Thread-safe** - Every singleton is created exactly once, whatever the
//!   number of threads asking for it
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use bean_container::prelude::*;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//!
//! container
//!     .register_definition(
//!         "database",
//!         BeanDefinition::of_class(
//!             BeanClass::builder::<Database>()
//!                 .constructor([Parameter::new("url", TypeRef::Str)], |args| {
//!                     Ok(Database { url: args.string(0)? })
//!                 })
//!                 .build(),
//!         )
//!         .constructor_arg(0, ValueSource::text("postgres://localhost")),
//!     )
//!     .unwrap();
//!
//! container
//!     .register_definition(
//!         "users",
//!         BeanDefinition::of_class(
//!             BeanClass::builder::<UserService>()
//!                 .constructor([Parameter::bean::<Database>("db")], |args| {
//!                     Ok(UserService { db: args.bean(0)? })
//!                 })
//!                 .build(),
//!         ),
//!     )
//!     .unwrap();
//!
//! let users = container.get::<UserService>("users").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Interfaces
//!
//! ```rust
//! use bean_container::prelude::*;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register_definition(
//!         "english",
//!         BeanDefinition::of_class(
//!             BeanClass::builder::<English>()
//!                 .implements::<dyn Greeter>(|e| e)
//!                 .default_constructor(|| English)
//!                 .build(),
//!         ),
//!     )
//!     .unwrap();
//!
//! let greeter = container.get_by_interface::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```

mod class;
mod config;
mod constructor;
mod container;
mod context;
mod convert;
mod definition;
mod error;
mod expression;
mod instantiate;
mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod populate;
mod processor;
mod provider;
mod registry;
mod resolver;
mod scope;
mod singleton;
mod storage;
mod value;

pub use class::*;
pub use config::*;
pub use container::Container;
pub use convert::{SimpleTypeConverter, TypeConverter, Weight, WEIGHT_CONVERTED, WEIGHT_EXACT, WEIGHT_UPCAST};
pub use definition::*;
pub use error::*;
pub use expression::*;
pub use populate::INNER_BEAN_PREFIX;
pub use processor::PostProcessor;
pub use provider::*;
pub use resolver::DependencyDescriptor;
pub use scope::*;
pub use value::*;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, AutowireMode, BeanClass, BeanDefinition, BeanError, BeanRef, BeanScope, Container,
        ContainerConfig, Injectable, ObjectProvider, Parameter, PostProcessor, Result, Scope,
        SimpleScope, TypeKey, TypeRef, Value, ValueSource,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::OnceCell;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    // =========================================================================
    // Fixtures
    // =========================================================================

    struct Pool;

    struct Repository {
        pool: Arc<Pool>,
    }

    fn pool_class(log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<BeanClass> {
        let log = Arc::clone(log);
        BeanClass::builder::<Pool>()
            .default_constructor(|| Pool)
            .on_destroy(move |_| {
                log.lock().push("pool");
                Ok(())
            })
            .build()
    }

    fn repository_class(log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<BeanClass> {
        let log = Arc::clone(log);
        BeanClass::builder::<Repository>()
            .constructor([Parameter::bean::<Pool>("pool")], |args| {
                Ok(Repository { pool: args.bean(0)? })
            })
            .on_destroy(move |_| {
                log.lock().push("repository");
                Ok(())
            })
            .build()
    }

    trait Store: Send + Sync {
        fn label(&self) -> &'static str;
    }

    struct Memory;
    struct Disk;

    impl Store for Memory {
        fn label(&self) -> &'static str {
            "memory"
        }
    }

    impl Store for Disk {
        fn label(&self) -> &'static str {
            "disk"
        }
    }

    fn memory_class() -> Arc<BeanClass> {
        BeanClass::builder::<Memory>()
            .implements::<dyn Store>(|m| m)
            .default_constructor(|| Memory)
            .order(2)
            .build()
    }

    fn disk_class() -> Arc<BeanClass> {
        BeanClass::builder::<Disk>()
            .implements::<dyn Store>(|d| d)
            .default_constructor(|| Disk)
            .order(1)
            .build()
    }

    struct Husband {
        wife: OnceCell<Arc<Wife>>,
    }

    struct Wife {
        husband: OnceCell<Arc<Husband>>,
    }

    fn couple(container: &Container) {
        container
            .register_definition(
                "husband",
                BeanDefinition::of_class(
                    BeanClass::builder::<Husband>()
                        .default_constructor(|| Husband { wife: OnceCell::new() })
                        .property("wife", TypeRef::object::<Wife>(), |h, v| {
                            let wife = v.as_bean::<Wife>().ok_or_else(|| BeanError::custom("not a wife"))?;
                            let _ = h.wife.set(wife);
                            Ok(())
                        })
                        .build(),
                )
                .property("wife", ValueSource::bean_ref("wife")),
            )
            .unwrap();
        container
            .register_definition(
                "wife",
                BeanDefinition::of_class(
                    BeanClass::builder::<Wife>()
                        .default_constructor(|| Wife { husband: OnceCell::new() })
                        .property("husband", TypeRef::object::<Husband>(), |w, v| {
                            let husband = v
                                .as_bean::<Husband>()
                                .ok_or_else(|| BeanError::custom("not a husband"))?;
                            let _ = w.husband.set(husband);
                            Ok(())
                        })
                        .build(),
                )
                .property("husband", ValueSource::bean_ref("husband")),
            )
            .unwrap();
    }

    struct Greeting {
        text: String,
        times: i64,
    }

    fn greeting_class() -> Arc<BeanClass> {
        BeanClass::builder::<Greeting>()
            .constructor([Parameter::new("text", TypeRef::Str)], |args| {
                Ok(Greeting {
                    text: args.string(0)?,
                    times: 1,
                })
            })
            .constructor(
                [
                    Parameter::new("text", TypeRef::Str),
                    Parameter::new("times", TypeRef::Int),
                ],
                |args| {
                    Ok(Greeting {
                        text: args.string(0)?,
                        times: args.int(1)?,
                    })
                },
            )
            .build()
    }

    // =========================================================================
    // Singletons and concurrency
    // =========================================================================

    #[test]
    fn test_singleton_created_once_across_threads() {
        static CREATED: AtomicUsize = AtomicUsize::new(0);
        struct Slow;

        let container = Container::new();
        container
            .register_definition(
                "slow",
                BeanDefinition::of_class(
                    BeanClass::builder::<Slow>()
                        .default_constructor(|| {
                            CREATED.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(5));
                            Slow
                        })
                        .build(),
                ),
            )
            .unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    container.get::<Slow>("slow").unwrap()
                })
            })
            .collect();
        let beans: Vec<Arc<Slow>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
        assert!(beans.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    // =========================================================================
    // Circular references
    // =========================================================================

    #[test]
    fn test_setter_cycle_resolved_through_early_reference() {
        let container = Container::new();
        couple(&container);

        let husband = container.get::<Husband>("husband").unwrap();
        let wife = container.get::<Wife>("wife").unwrap();
        assert!(Arc::ptr_eq(husband.wife.get().unwrap(), &wife));
        assert!(Arc::ptr_eq(wife.husband.get().unwrap(), &husband));
        assert!(container.dependent_beans("husband").contains(&"wife".to_owned()));
    }

    #[test]
    fn test_setter_cycle_rejected_when_circular_references_disabled() {
        let container = Container::with_config(ContainerConfig::default().allow_circular_references(false));
        couple(&container);

        let err = container.get_bean("husband").unwrap_err();
        assert!(err.is_circular_reference());
        assert!(!container.contains_singleton("husband"));
        assert!(!container.contains_singleton("wife"));
    }

    #[test]
    fn test_constructor_cycle_is_circular_reference() {
        struct Left(#[allow(dead_code)] Arc<Right>);
        struct Right(#[allow(dead_code)] Arc<Left>);

        let container = Container::new();
        container
            .register_definition(
                "left",
                BeanDefinition::of_class(
                    BeanClass::builder::<Left>()
                        .constructor([Parameter::bean::<Right>("right")], |args| Ok(Left(args.bean(0)?)))
                        .build(),
                ),
            )
            .unwrap();
        container
            .register_definition(
                "right",
                BeanDefinition::of_class(
                    BeanClass::builder::<Right>()
                        .constructor([Parameter::bean::<Left>("left")], |args| Ok(Right(args.bean(0)?)))
                        .build(),
                ),
            )
            .unwrap();

        let err = container.get_bean("left").unwrap_err();
        assert!(err.is_circular_reference());
        assert_eq!(err.bean_name(), Some("left"));
    }

    struct Driver {
        vehicle: Arc<Vehicle>,
    }

    struct Vehicle {
        driver: OnceCell<Arc<Driver>>,
    }

    /// `driver` takes its vehicle through the constructor, `vehicle` gets its
    /// driver through a property.
    fn driver_and_vehicle() -> Container {
        let container = Container::new();
        container
            .register_definition(
                "driver",
                BeanDefinition::of_class(
                    BeanClass::builder::<Driver>()
                        .constructor([Parameter::bean::<Vehicle>("vehicle")], |args| {
                            Ok(Driver { vehicle: args.bean(0)? })
                        })
                        .build(),
                ),
            )
            .unwrap();
        container
            .register_definition(
                "vehicle",
                BeanDefinition::of_class(
                    BeanClass::builder::<Vehicle>()
                        .default_constructor(|| Vehicle { driver: OnceCell::new() })
                        .property("driver", TypeRef::object::<Driver>(), |v, value| {
                            let driver = value
                                .as_bean::<Driver>()
                                .ok_or_else(|| BeanError::custom("not a driver"))?;
                            let _ = v.driver.set(driver);
                            Ok(())
                        })
                        .build(),
                )
                .property("driver", ValueSource::bean_ref("driver")),
            )
            .unwrap();
        container
    }

    #[test]
    fn test_constructor_property_cycle_from_property_side() {
        let container = driver_and_vehicle();

        let vehicle = container.get::<Vehicle>("vehicle").unwrap();
        let driver = container.get::<Driver>("driver").unwrap();
        assert!(Arc::ptr_eq(&driver.vehicle, &vehicle));
        assert!(Arc::ptr_eq(vehicle.driver.get().unwrap(), &driver));
    }

    #[test]
    fn test_constructor_property_cycle_from_constructor_side() {
        let container = driver_and_vehicle();

        let err = container.get_bean("driver").unwrap_err();
        assert!(err.is_circular_reference());
        assert_eq!(err.bean_name(), Some("driver"));
        assert!(!container.contains_singleton("driver"));
        assert!(!container.contains_singleton("vehicle"));
    }

    #[test]
    fn test_wrapped_bean_injected_raw_is_error() {
        let container = Container::new();
        couple(&container);
        container.add_post_processor(PostProcessor::after_init(|bean, name| {
            if name == "husband" {
                Ok(Some(Arc::new(Husband { wife: OnceCell::new() }) as BeanRef))
            } else {
                Ok(Some(bean))
            }
        }));

        let err = container.get_bean("husband").unwrap_err();
        assert!(matches!(err, BeanError::CurrentlyInCreation { .. }));
        assert!(err.to_string().contains("in its raw version"));
    }

    #[test]
    fn test_wrapped_bean_allowed_when_raw_injection_permitted() {
        let container =
            Container::with_config(ContainerConfig::default().allow_raw_injection_despite_wrapping(true));
        couple(&container);
        container.add_post_processor(PostProcessor::after_init(|bean, name| {
            if name == "husband" {
                Ok(Some(Arc::new(Husband { wife: OnceCell::new() }) as BeanRef))
            } else {
                Ok(Some(bean))
            }
        }));

        let husband = container.get::<Husband>("husband").unwrap();
        let wife = container.get::<Wife>("wife").unwrap();
        assert!(husband.wife.get().is_none());
        assert!(!Arc::ptr_eq(wife.husband.get().unwrap(), &husband));
    }

    // =========================================================================
    // Constructor resolution
    // =========================================================================

    #[test]
    fn test_overload_chosen_by_available_arguments() {
        let container = Container::new();
        container
            .register_definition(
                "once",
                BeanDefinition::of_class(greeting_class()).constructor_arg(0, ValueSource::text("hi")),
            )
            .unwrap();
        container
            .register_definition(
                "thrice",
                BeanDefinition::of_class(greeting_class())
                    .constructor_arg(0, ValueSource::text("hey"))
                    .constructor_arg(1, ValueSource::text("3")),
            )
            .unwrap();

        let once = container.get::<Greeting>("once").unwrap();
        assert_eq!((once.text.as_str(), once.times), ("hi", 1));
        let thrice = container.get::<Greeting>("thrice").unwrap();
        assert_eq!((thrice.text.as_str(), thrice.times), ("hey", 3));
    }

    #[test]
    fn test_equal_weight_tie_lenient_and_strict() {
        struct Number {
            via: &'static str,
        }
        let class = BeanClass::builder::<Number>()
            .constructor([Parameter::new("value", TypeRef::Int)], |_| Ok(Number { via: "int" }))
            .constructor([Parameter::new("value", TypeRef::Float)], |_| Ok(Number { via: "float" }))
            .build();

        let container = Container::new();
        container
            .register_definition(
                "lenient",
                BeanDefinition::of_class(Arc::clone(&class)).generic_arg(ValueSource::text("5")),
            )
            .unwrap();
        container
            .register_definition(
                "strict",
                BeanDefinition::of_class(class)
                    .generic_arg(ValueSource::text("5"))
                    .lenient(false),
            )
            .unwrap();

        assert_eq!(container.get::<Number>("lenient").unwrap().via, "int");
        let err = container.get_bean("strict").unwrap_err();
        assert!(err.to_string().contains("Ambiguous constructor matches"));
    }

    #[test]
    fn test_prototype_reuses_resolved_constructor() {
        let container = Container::new();
        container
            .register_definition(
                "greeting",
                BeanDefinition::of_class(greeting_class())
                    .prototype()
                    .constructor_arg(0, ValueSource::text("hi")),
            )
            .unwrap();

        let first = container.get::<Greeting>("greeting").unwrap();
        let second = container.get::<Greeting>("greeting").unwrap();
        let third = container.get::<Greeting>("greeting").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(third.text, "hi");
        assert_eq!(container.merged_definition("greeting").unwrap().resolution_count(), 1);
    }

    #[test]
    fn test_instance_factory_method_and_predicted_type() {
        struct ConnectionFactory {
            url: String,
        }
        struct Connection {
            url: String,
        }

        let container = Container::new();
        container
            .register_definition(
                "factory",
                BeanDefinition::of_class(
                    BeanClass::builder::<ConnectionFactory>()
                        .default_constructor(|| ConnectionFactory { url: "db://main".into() })
                        .factory_method("connect", [], |f, _| Ok(Connection { url: f.url.clone() }))
                        .build(),
                ),
            )
            .unwrap();
        container
            .register_definition("connection", BeanDefinition::new().factory_bean("factory", "connect"))
            .unwrap();

        assert_eq!(
            container.get_type("connection").unwrap(),
            Some(TypeKey::of::<Connection>())
        );
        assert!(!container.contains_singleton("connection"));

        let connection = container.get_by_type::<Connection>().unwrap();
        assert_eq!(connection.url, "db://main");
        assert_eq!(container.dependent_beans("factory"), vec!["connection".to_owned()]);
    }

    // =========================================================================
    // Candidate selection
    // =========================================================================

    #[test]
    fn test_primary_candidate_wins() {
        let container = Container::new();
        container
            .register_definition("memory", BeanDefinition::of_class(memory_class()).primary())
            .unwrap();
        container
            .register_definition("disk", BeanDefinition::of_class(disk_class()))
            .unwrap();

        assert_eq!(container.get_by_interface::<dyn Store>().unwrap().label(), "memory");
    }

    #[test]
    fn test_lowest_priority_value_wins() {
        let container = Container::new();
        container
            .register_definition("memory", BeanDefinition::of_class(memory_class()).priority(5))
            .unwrap();
        container
            .register_definition("disk", BeanDefinition::of_class(disk_class()).priority(1))
            .unwrap();

        assert_eq!(container.get_by_interface::<dyn Store>().unwrap().label(), "disk");
    }

    #[test]
    fn test_priority_tie_is_not_unique() {
        let container = Container::new();
        container
            .register_definition("memory", BeanDefinition::of_class(memory_class()).priority(2))
            .unwrap();
        container
            .register_definition("disk", BeanDefinition::of_class(disk_class()).priority(2))
            .unwrap();

        let err = container.get_by_interface::<dyn Store>().err().unwrap();
        assert!(matches!(err, BeanError::NoUniqueBean { .. }));
    }

    #[test]
    fn test_parameter_name_breaks_tie() {
        struct Backup {
            store: Arc<dyn Store>,
        }

        let container = Container::new();
        container
            .register_definition("memory", BeanDefinition::of_class(memory_class()))
            .unwrap();
        container
            .register_definition("disk", BeanDefinition::of_class(disk_class()))
            .unwrap();
        container
            .register_definition(
                "backup",
                BeanDefinition::of_class(
                    BeanClass::builder::<Backup>()
                        .constructor([Parameter::interface::<dyn Store>("disk")], |args| {
                            Ok(Backup { store: args.shared(0)? })
                        })
                        .build(),
                ),
            )
            .unwrap();

        assert_eq!(container.get::<Backup>("backup").unwrap().store.label(), "disk");
    }

    #[test]
    fn test_optional_and_ordered_collection_injection() {
        struct Clock;
        struct Report {
            clock: Option<Arc<Clock>>,
            stores: Vec<&'static str>,
        }

        let container = Container::new();
        container
            .register_definition("memory", BeanDefinition::of_class(memory_class()))
            .unwrap();
        container
            .register_definition("disk", BeanDefinition::of_class(disk_class()))
            .unwrap();
        container
            .register_definition(
                "report",
                BeanDefinition::of_class(
                    BeanClass::builder::<Report>()
                        .constructor(
                            [
                                Parameter::new("clock", TypeRef::optional(TypeRef::object::<Clock>())),
                                Parameter::new("stores", TypeRef::list(TypeRef::interface::<dyn Store>())),
                            ],
                            |args| {
                                let stores = args
                                    .list(1)?
                                    .iter()
                                    .filter_map(|v| v.as_shared::<dyn Store>())
                                    .map(|s| s.label())
                                    .collect();
                                Ok(Report {
                                    clock: args.optional_bean(0)?,
                                    stores,
                                })
                            },
                        )
                        .build(),
                ),
            )
            .unwrap();

        let report = container.get::<Report>("report").unwrap();
        assert!(report.clock.is_none());
        assert_eq!(report.stores, vec!["disk", "memory"]);
        assert_eq!(container.dependencies_for_bean("report").len(), 2);
    }

    // =========================================================================
    // Deferred providers
    // =========================================================================

    #[test]
    fn test_provider_resolves_lazily() {
        struct Clock;
        struct Scheduler {
            clock: ObjectProvider,
        }

        let container = Container::new();
        container
            .register_definition(
                "scheduler",
                BeanDefinition::of_class(
                    BeanClass::builder::<Scheduler>()
                        .constructor(
                            [Parameter::new("clock", TypeRef::provider(TypeRef::object::<Clock>()))],
                            |args| Ok(Scheduler { clock: args.provider(0)? }),
                        )
                        .build(),
                ),
            )
            .unwrap();

        let scheduler = container.get::<Scheduler>("scheduler").unwrap();
        assert!(scheduler.clock.get_if_available().unwrap().is_none());

        container
            .register_definition(
                "clock",
                BeanDefinition::of_class(BeanClass::builder::<Clock>().default_constructor(|| Clock).build()),
            )
            .unwrap();
        let clock = scheduler.clock.get_as::<Clock>().unwrap();
        assert!(Arc::ptr_eq(&clock, &container.get::<Clock>("clock").unwrap()));

        drop(container);
        assert!(matches!(scheduler.clock.get(), Err(BeanError::ContainerDropped)));
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    #[test]
    fn test_before_instantiation_short_circuits() {
        static AFTER_INIT: AtomicUsize = AtomicUsize::new(0);
        struct Real;
        struct Stub;

        let container = Container::new();
        container
            .register_definition(
                "service",
                BeanDefinition::of_class(BeanClass::builder::<Real>().default_constructor(|| Real).build()),
            )
            .unwrap();
        container.add_post_processor(PostProcessor::before_instantiation(|_, name| {
            Ok((name == "service").then(|| Arc::new(Stub) as BeanRef))
        }));
        container.add_post_processor(PostProcessor::after_init(|bean, _| {
            AFTER_INIT.fetch_add(1, Ordering::SeqCst);
            Ok(Some(bean))
        }));

        assert!(container.get::<Stub>("service").is_ok());
        assert_eq!(AFTER_INIT.load(Ordering::SeqCst), 1);
        assert_eq!(container.post_processor_count(), 2);
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    #[test]
    fn test_destroying_dependency_destroys_dependents_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        container
            .register_definition("pool", BeanDefinition::of_class(pool_class(&log)))
            .unwrap();
        container
            .register_definition("repository", BeanDefinition::of_class(repository_class(&log)))
            .unwrap();

        let repository = container.get::<Repository>("repository").unwrap();
        assert!(Arc::ptr_eq(&repository.pool, &container.get::<Pool>("pool").unwrap()));
        assert!(container.is_dependent("pool", "repository"));

        container.destroy_singleton("pool");
        assert_eq!(*log.lock(), vec!["repository", "pool"]);
        assert!(!container.contains_singleton("repository"));
    }

    #[test]
    fn test_destroy_singletons_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        container
            .register_definition("pool", BeanDefinition::of_class(pool_class(&log)))
            .unwrap();
        container
            .register_definition("repository", BeanDefinition::of_class(repository_class(&log)))
            .unwrap();

        container.preinstantiate_singletons().unwrap();
        container.destroy_singletons();
        assert_eq!(*log.lock(), vec!["repository", "pool"]);
        assert!(container.singleton_names().is_empty());
    }

    #[test]
    fn test_inner_bean_destroyed_with_outer() {
        struct Engine;
        struct Car {
            engine: OnceCell<Arc<Engine>>,
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let engine_log = Arc::clone(&log);
        let car_log = Arc::clone(&log);

        let engine = BeanClass::builder::<Engine>()
            .default_constructor(|| Engine)
            .on_destroy(move |_| {
                engine_log.lock().push("engine");
                Ok(())
            })
            .build();
        let car = BeanClass::builder::<Car>()
            .default_constructor(|| Car { engine: OnceCell::new() })
            .property("engine", TypeRef::object::<Engine>(), |c, v| {
                let engine = v.as_bean::<Engine>().ok_or_else(|| BeanError::custom("not an engine"))?;
                let _ = c.engine.set(engine);
                Ok(())
            })
            .on_destroy(move |_| {
                car_log.lock().push("car");
                Ok(())
            })
            .build();

        let container = Container::new();
        container
            .register_definition(
                "car",
                BeanDefinition::of_class(car)
                    .property("engine", ValueSource::inner(BeanDefinition::of_class(engine))),
            )
            .unwrap();

        let car = container.get::<Car>("car").unwrap();
        assert!(car.engine.get().is_some());
        assert_eq!(container.definition_names(), vec!["car".to_owned()]);

        container.destroy_singletons();
        assert_eq!(*log.lock(), vec!["car", "engine"]);
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    #[test]
    fn test_child_autowires_from_parent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let root = Container::new();
        root.register_definition("pool", BeanDefinition::of_class(pool_class(&log)))
            .unwrap();

        let child = root.child();
        child
            .register_definition("repository", BeanDefinition::of_class(repository_class(&log)))
            .unwrap();

        let repository = child.get::<Repository>("repository").unwrap();
        assert!(Arc::ptr_eq(&repository.pool, &root.get::<Pool>("pool").unwrap()));
        assert!(!root.contains_bean("repository"));
        assert!(child.contains_bean("pool"));
    }
}
