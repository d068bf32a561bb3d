//! Benchmarks for the bean container

use bean_container::{
    BeanClass, BeanDefinition, Container, DependencyDescriptor, Parameter, TypeRef, Value, ValueSource,
};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct Config {
    url: String,
}

#[allow(dead_code)]
struct Pool {
    config: Arc<Config>,
}

#[allow(dead_code)]
struct Repository {
    pool: Arc<Pool>,
}

#[allow(dead_code)]
struct Greeting {
    text: String,
    times: i64,
}

fn config_class() -> Arc<BeanClass> {
    BeanClass::builder::<Config>()
        .constructor([Parameter::new("url", TypeRef::Str)], |args| {
            Ok(Config { url: args.string(0)? })
        })
        .build()
}

fn pool_class() -> Arc<BeanClass> {
    BeanClass::builder::<Pool>()
        .constructor([Parameter::bean::<Config>("config")], |args| {
            Ok(Pool { config: args.bean(0)? })
        })
        .build()
}

fn repository_class() -> Arc<BeanClass> {
    BeanClass::builder::<Repository>()
        .constructor([Parameter::bean::<Pool>("pool")], |args| {
            Ok(Repository { pool: args.bean(0)? })
        })
        .build()
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

/// Config, pool and repository, wired by constructor autowiring.
fn wired_container() -> Container {
    let container = Container::new();
    container
        .register_definition(
            "config",
            BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("db://bench")),
        )
        .unwrap();
    container
        .register_definition("pool", BeanDefinition::of_class(pool_class()))
        .unwrap();
    container
        .register_definition("repository", BeanDefinition::of_class(repository_class()))
        .unwrap();
    container.register_alias("repository", "repo").unwrap();
    container
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("definition", |b| {
        let class = config_class();
        b.iter(|| {
            let container = Container::new();
            container
                .register_definition("config", BeanDefinition::of_class(Arc::clone(&class)))
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("manual_singleton", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .register_singleton("config", Config { url: "db://bench".into() })
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("wire_and_preinstantiate_3", |b| {
        b.iter(|| {
            let container = wired_container();
            container.preinstantiate_singletons().unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_singleton_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("singleton_lookup");
    group.throughput(Throughput::Elements(1));

    let container = wired_container();
    container.preinstantiate_singletons().unwrap();

    group.bench_function("get_bean", |b| {
        b.iter(|| black_box(container.get_bean("repository").unwrap()))
    });

    group.bench_function("get_typed", |b| {
        b.iter(|| black_box(container.get::<Repository>("repository").unwrap()))
    });

    group.bench_function("get_by_alias", |b| {
        b.iter(|| black_box(container.get::<Repository>("repo").unwrap()))
    });

    group.bench_function("get_by_type_frozen", |b| {
        b.iter(|| black_box(container.get_by_type::<Repository>().unwrap()))
    });

    group.bench_function("contains_bean_missing", |b| {
        b.iter(|| black_box(container.contains_bean("missing")))
    });

    let child = container.child();
    group.bench_function("get_from_parent", |b| {
        b.iter(|| black_box(child.get_bean("repository").unwrap()))
    });

    group.finish();
}

fn bench_prototype_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("prototype_creation");
    group.throughput(Throughput::Elements(1));

    let container = Container::new();
    container
        .register_definition(
            "greeting",
            BeanDefinition::of_class(greeting_class())
                .prototype()
                .constructor_arg(0, ValueSource::text("hi"))
                .constructor_arg(1, ValueSource::text("3")),
        )
        .unwrap();

    // The first creation resolves the constructor, the rest reuse it.
    group.bench_function("cached_constructor", |b| {
        b.iter(|| black_box(container.get_bean("greeting").unwrap()))
    });

    group.bench_function("explicit_args", |b| {
        b.iter(|| {
            black_box(
                container
                    .get_bean_with_args("greeting", vec![Value::str("hey"), Value::Int(2)])
                    .unwrap(),
            )
        })
    });

    group.finish();
}

fn bench_autowiring(c: &mut Criterion) {
    let mut group = c.benchmark_group("autowiring");

    let container = Container::new();
    container
        .register_definition(
            "config",
            BeanDefinition::of_class(config_class()).constructor_arg(0, ValueSource::text("db://bench")),
        )
        .unwrap();
    container
        .register_definition("pool", BeanDefinition::of_class(pool_class()).prototype())
        .unwrap();
    container
        .register_definition("repository", BeanDefinition::of_class(repository_class()).prototype())
        .unwrap();

    group.bench_function("prototype_chain_depth_3", |b| {
        b.iter(|| black_box(container.get_bean("repository").unwrap()))
    });

    let descriptor = DependencyDescriptor::new(TypeRef::object::<Config>());
    group.bench_function("resolve_dependency", |b| {
        b.iter(|| {
            let mut injected = Vec::new();
            black_box(container.resolve_dependency(&descriptor, None, &mut injected).unwrap())
        })
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = wired_container();
        container.preinstantiate_singletons().unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.get::<Repository>("repository").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.bench_function("first_creation_contended_4", |b| {
        b.iter(|| {
            let container = wired_container();
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || c.get_bean("repository").unwrap())
                })
                .collect();

            for h in handles {
                black_box(h.join().unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_singleton_lookup,
    bench_prototype_creation,
    bench_autowiring,
    bench_concurrent,
);

criterion_main!(benches);
