use std::sync::Arc;
use std::time::Duration;

use auricle_host::{LibraryResolver, ModuleLoader};
use auricle_sdk::{AcSpace, Registry, SignalFormat, Waveform};
use criterion::{criterion_group, criterion_main, Criterion};

fn resolver() -> LibraryResolver {
    let mut registry = Registry::new();
    auricle_plugins::register(&mut registry);
    LibraryResolver::new(Arc::new(registry)).with_search_path(Vec::new())
}

fn chain_of_gains(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    group.bench_function("16_gains_stereo_block64", |b| {
        let resolver = resolver();
        let ac = AcSpace::new();
        let mut loader = ModuleLoader::load(&resolver, &ac, "chain").expect("chain");
        let stages: Vec<String> = (0..16).map(|stage| format!("gain:g{stage}")).collect();
        loader
            .parse(&format!("algos=[{} acframeno:frames]", stages.join(" ")))
            .expect("algos");
        for stage in 0..16 {
            loader
                .parse(&format!("g{stage}.gains=[-0.5 0.5]"))
                .expect("gains");
        }
        loader
            .prepare(SignalFormat::waveform(2, 64, 48_000.0))
            .expect("prepare");
        let mut block = Waveform::new(64, 2);

        b.iter(|| {
            block.as_mut_slice().fill(0.1);
            loader.process_wave(&mut block).expect("process block");
        });
    });

    group.finish();
}

fn ac_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("ac");

    group.bench_function("get_int_after_publish", |b| {
        let resolver = resolver();
        let ac = AcSpace::new();
        let mut loader = ModuleLoader::load(&resolver, &ac, "acframeno:frames").expect("load");
        loader
            .prepare(SignalFormat::waveform(1, 64, 48_000.0))
            .expect("prepare");
        let mut block = Waveform::new(64, 1);

        b.iter(|| {
            loader.process_wave(&mut block).expect("process block");
            ac.get_int("frames").expect("counter")
        });
    });

    group.finish();
}

criterion_group!(benches, chain_of_gains, ac_publish);
criterion_main!(benches);
