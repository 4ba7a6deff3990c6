use criterion::{criterion_group, criterion_main, Criterion};
use stackplan_core::{Engine, ExposureMode};
use stackplan_schema::{get_template, Manifest, PortBinding, ServiceName, ServiceSpec};

fn starter_manifest() -> Manifest {
    get_template("local-ai").unwrap().parse().unwrap()
}

/// Starter stack padded with `extra` proxied services on distinct ports.
fn large_manifest(extra: u16) -> Manifest {
    let mut manifest = starter_manifest();
    for i in 0..extra {
        manifest.services.insert(
            ServiceName::new(format!("svc-{i:03}")),
            ServiceSpec {
                enabled: true,
                reverse_proxy: true,
                profiles: [stackplan_schema::ProfileName::new("all")].into(),
                ports: vec![PortBinding::tcp(20_000 + i, 8080)],
                ..ServiceSpec::default()
            },
        );
    }
    manifest
}

fn bench_validate(c: &mut Criterion) {
    let engine = Engine::default();
    let manifest = large_manifest(100);
    c.bench_function("validate_all_profiles_110_services", |b| {
        b.iter(|| engine.validate(&manifest, None));
    });
}

fn bench_dry_run(c: &mut Criterion) {
    let engine = Engine::default();
    let manifest = starter_manifest();
    c.bench_function("dry_run_starter_private", |b| {
        b.iter(|| {
            engine
                .dry_run(&manifest, "cpu", ExposureMode::Private)
                .unwrap()
        });
    });
}

fn bench_generate_large(c: &mut Criterion) {
    let engine = Engine::default();
    let manifest = large_manifest(100);
    let resolved = engine.resolve(&manifest, "cpu").unwrap();
    let planned = engine.plan(&resolved, ExposureMode::Private);
    c.bench_function("generate_110_services", |b| {
        b.iter(|| engine.generate(&planned).unwrap());
    });
}

fn bench_generate_to_dir(c: &mut Criterion) {
    let engine = Engine::default();
    let manifest = starter_manifest();
    c.bench_function("generate_to_dir_starter_public", |b| {
        b.iter_with_setup(
            || tempfile::tempdir().unwrap(),
            |dir| {
                engine
                    .generate_to_dir(&manifest, "cpu", ExposureMode::Public, dir.path())
                    .unwrap();
            },
        );
    });
}

criterion_group!(
    benches,
    bench_validate,
    bench_dry_run,
    bench_generate_large,
    bench_generate_to_dir,
);
criterion_main!(benches);
