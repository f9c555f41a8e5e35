use arbor_backend::{Backend, ManyMapping, MappedBackend, MemoryEngine};
use arbor_types::{Id, RawValue, SingleFeatureKey};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const SIZE: usize = 1_000;

fn filled(mapping: ManyMapping) -> (MappedBackend<MemoryEngine>, SingleFeatureKey) {
    let backend = MappedBackend::new(MemoryEngine::new(), mapping);
    let key = SingleFeatureKey::new(Id::generate(), "items");
    let values = (0..SIZE).map(|i| RawValue::Literal(i.to_string())).collect();
    backend.append_all_values(&key, values).unwrap();
    (backend, key)
}

fn mappings(c: &mut Criterion) {
    let all = [ManyMapping::Indices, ManyMapping::Lists, ManyMapping::Arrays];

    let mut group = c.benchmark_group("insert_middle");
    for mapping in all {
        group.bench_with_input(BenchmarkId::from_parameter(mapping), &mapping, |b, &m| {
            let (backend, key) = filled(m);
            b.iter(|| {
                backend
                    .add_value(&key.at(SIZE / 2), RawValue::from("x"))
                    .unwrap();
                backend.remove_value(&key.at(SIZE / 2)).unwrap();
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("read_slot");
    for mapping in all {
        group.bench_with_input(BenchmarkId::from_parameter(mapping), &mapping, |b, &m| {
            let (backend, key) = filled(m);
            b.iter(|| black_box(backend.value_at(&key.at(SIZE / 3)).unwrap()));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("append");
    for mapping in all {
        group.bench_with_input(BenchmarkId::from_parameter(mapping), &mapping, |b, &m| {
            let (backend, key) = filled(m);
            b.iter(|| backend.append_value(&key, RawValue::from("y")).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, mappings);
criterion_main!(benches);
