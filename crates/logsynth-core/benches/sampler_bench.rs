use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use logsynth_core::{Event, GeneratorConfig, LogGenerator, WeightedKeySampler};

fn bench_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_key_sampler");
    for n in [1_000u64, 50_000, 1_000_000] {
        let mut sampler = WeightedKeySampler::seeded(n, 0.8, 42).unwrap();
        group.bench_with_input(BenchmarkId::new("sample_key", n), &n, |b, _| {
            b.iter(|| black_box(sampler.sample_key()))
        });
        group.bench_with_input(BenchmarkId::new("build", n), &n, |b, &n| {
            b.iter(|| WeightedKeySampler::seeded(black_box(n), 0.8, 42).unwrap())
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let ev = Event::new(444691, 1382920806122, "static/image-4", -599092377).unwrap();
    let line = ev.serialize();

    c.bench_function("event_serialize", |b| b.iter(|| black_box(&ev).serialize()));
    c.bench_function("event_parse", |b| {
        b.iter(|| black_box(line.as_str()).parse::<Event>().unwrap())
    });
}

fn bench_generator(c: &mut Criterion) {
    let mut gen = LogGenerator::seeded(GeneratorConfig::default(), 7).unwrap();
    c.bench_function("log_generator_sample", |b| b.iter(|| black_box(gen.sample())));
}

criterion_group!(benches, bench_sampler, bench_codec, bench_generator);
criterion_main!(benches);
