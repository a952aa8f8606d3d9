use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use hashkernel::{Dictionary, EngineOptions, ProbeFamily};

fn criterion_benchmark(c: &mut Criterion) {
	let keys = (0..1_000i32).collect::<Vec<_>>();

	c.bench_function("insert-1k", |b| {
		b.iter_batched(
			|| Dictionary::<i32, i32>::new(),
			|mut d| {
				for k in keys.iter() {
					d.add(*k, *k);
				}
			},
			BatchSize::LargeInput,
		)
	});

	c.bench_function("insert-1k-double-hashing", |b| {
		b.iter_batched(
			|| Dictionary::<i32, i32>::with_options(EngineOptions::new().probe_family(ProbeFamily::Double)),
			|mut d| {
				for k in keys.iter() {
					d.add(*k, *k);
				}
			},
			BatchSize::LargeInput,
		)
	});

	c.bench_function("insert-1k-preallocated", |b| {
		b.iter_batched(
			|| Dictionary::<i32, i32>::with_capacity(2048),
			|mut d| {
				for k in keys.iter() {
					d.add(*k, *k);
				}
			},
			BatchSize::LargeInput,
		)
	});

	c.bench_function("remove-1k", |b| {
		b.iter_batched(
			|| {
				let mut d = Dictionary::<i32, i32>::new();
				for k in keys.iter() {
					d.add(*k, *k);
				}
				d
			},
			|mut d| {
				for k in keys.iter() {
					d.remove(k);
				}
			},
			BatchSize::LargeInput,
		)
	});

	c.bench_function("bump-1k", |b| {
		b.iter_batched(
			|| {
				let mut d = Dictionary::<i32, i32>::new();
				for k in keys.iter() {
					d.add(*k, *k);
				}
				d
			},
			|mut d| {
				for k in keys.iter() {
					d.set(*k, *k);
				}
			},
			BatchSize::LargeInput,
		)
	});
}

criterion_group! {
	name = benches;
	config = Criterion::default().sample_size(10);
	targets = criterion_benchmark
}
criterion_main!(benches);
