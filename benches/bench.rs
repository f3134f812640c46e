use criterion::{criterion_group, criterion_main, Criterion};
use yaml_binder::{
    copy, free, load_bytes, save_bytes, Config, Field, Schema, ValueFlags, UNLIMITED,
};

const RECORDS: usize = 10_000;

fn record_schema() -> Schema {
    let record = Schema::mapping(
        32,
        vec![
            Field::new("id", 0, Schema::uint(4)),
            Field::new("name", 8, Schema::string(0, UNLIMITED)),
            Field::new("score", 16, Schema::float(8)),
            Field::new("flags", 24, Schema::flags(4, [("a", 1), ("b", 2), ("c", 4)])),
        ],
    );
    Schema::sequence(record, 0, UNLIMITED).with_flags(ValueFlags::POINTER)
}

fn large_yaml() -> String {
    let mut yaml = String::new();
    for i in 0..RECORDS {
        yaml.push_str(&format!(
            "- id: {i}\n  name: record number {i}\n  score: {}.25\n  flags: [a, c]\n",
            i % 100
        ));
    }
    yaml
}

pub fn binder(c: &mut Criterion) {
    let schema = record_schema();
    let config = Config::new();
    let input = large_yaml();

    c.bench_function("load large", |b| {
        b.iter(|| {
            let mut count = 0;
            let value = load_bytes(input.as_bytes(), &config, &schema, Some(&mut count)).unwrap();
            free(&config, &schema, value, Some(count)).unwrap();
        })
    });

    let mut count = 0;
    let value = load_bytes(input.as_bytes(), &config, &schema, Some(&mut count))
        .unwrap()
        .unwrap();

    c.bench_function("save large", |b| {
        b.iter(|| save_bytes(&config, &schema, Some(&value), Some(count)).unwrap())
    });

    c.bench_function("copy large", |b| {
        b.iter(|| {
            let copied = copy(&config, &schema, Some(&value), Some(count), None).unwrap();
            free(&config, &schema, copied, Some(count)).unwrap();
        })
    });
}

criterion_group!(benches, binder);
criterion_main!(benches);
