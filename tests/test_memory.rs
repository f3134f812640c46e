mod common;

use common::{config_with, TestAllocator};
use pretty_assertions::assert_eq;
use yaml_binder::{
    copy, free, load_bytes, save_bytes, Config, ErrorKind, Field, LengthField, Missing, Schema,
    ValueFlags, UNLIMITED,
};

const INPUT: &[u8] = b"name: box\ntags: [a, b, c]\npoint: {x: 1, y: 2}\nblob: aGVsbG8=\n";

fn record() -> Schema {
    let point = Schema::mapping(
        8,
        vec![
            Field::new("x", 0, Schema::int(4)),
            Field::new("y", 4, Schema::int(4)),
        ],
    )
    .with_flags(ValueFlags::POINTER);
    Schema::mapping(
        48,
        vec![
            Field::new("name", 0, Schema::string(0, UNLIMITED)),
            Field::sequence(
                "tags",
                8,
                16,
                4,
                Schema::sequence(Schema::string(0, UNLIMITED), 0, UNLIMITED)
                    .with_flags(ValueFlags::POINTER),
            ),
            Field::new("point", 24, point),
            Field::new(
                "note",
                32,
                Schema::string(0, UNLIMITED)
                    .with_flags(ValueFlags::OPTIONAL)
                    .with_missing(Missing::Str("none".into())),
            ),
            Field::new(
                "blob",
                40,
                Schema::binary(0, UNLIMITED, LengthField { offset: 20, width: 4 }),
            ),
        ],
    )
    .with_flags(ValueFlags::POINTER)
}

#[test]
fn load_then_free_releases_everything() {
    let allocator = TestAllocator::new();
    let config = config_with(&allocator);
    let value = load_bytes(INPUT, &config, &record(), None).unwrap();
    assert!(allocator.live() > 0);
    free(&config, &record(), value, None).unwrap();
    assert_eq!(allocator.live(), 0);
}

#[test]
fn copy_then_free_releases_everything() {
    let value = load_bytes(INPUT, &Config::new(), &record(), None)
        .unwrap()
        .unwrap();
    let allocator = TestAllocator::new();
    let config = config_with(&allocator);

    let copied = copy(&config, &record(), Some(&value), None, None)
        .unwrap()
        .unwrap();
    assert_eq!(copied, value);
    assert_eq!(copied.child(32).unwrap().as_str().unwrap(), "none");
    free(&config, &record(), Some(copied), None).unwrap();
    assert_eq!(allocator.live(), 0);
}

#[test]
fn load_survives_oom_at_every_allocation() {
    let counting = TestAllocator::new();
    let value = load_bytes(INPUT, &config_with(&counting), &record(), None).unwrap();
    let total = counting.requests();
    assert!(total >= 8, "only {total} allocations");
    free(&config_with(&counting), &record(), value, None).unwrap();

    for fail_at in 0..total {
        let allocator = TestAllocator::failing_at(fail_at);
        let err = load_bytes(INPUT, &config_with(&allocator), &record(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Oom, "failing request {fail_at}");
        assert_eq!(allocator.live(), 0, "leak after failing request {fail_at}");
    }
}

#[test]
fn copy_survives_oom_at_every_allocation() {
    let value = load_bytes(INPUT, &Config::new(), &record(), None)
        .unwrap()
        .unwrap();
    let counting = TestAllocator::new();
    let copied = copy(&config_with(&counting), &record(), Some(&value), None, None).unwrap();
    let total = counting.requests();
    free(&config_with(&counting), &record(), copied, None).unwrap();

    for fail_at in 0..total {
        let allocator = TestAllocator::failing_at(fail_at);
        let err = copy(&config_with(&allocator), &record(), Some(&value), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Oom, "failing request {fail_at}");
        assert_eq!(allocator.live(), 0, "leak after failing request {fail_at}");
    }
}

#[test]
fn save_output_comes_from_the_allocator() {
    let value = load_bytes(INPUT, &Config::new(), &record(), None)
        .unwrap()
        .unwrap();
    let allocator = TestAllocator::new();
    let output = save_bytes(&config_with(&allocator), &record(), Some(&value), None).unwrap();
    assert_eq!(allocator.live(), 1);
    assert!(!output.is_empty());

    let allocator = TestAllocator::failing_at(0);
    let err = save_bytes(&config_with(&allocator), &record(), Some(&value), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Oom);
}

#[test]
fn failed_load_releases_partial_values() {
    let allocator = TestAllocator::new();
    let config = config_with(&allocator);
    let input = b"name: box\ntags: [a, b, c]\npoint: {x: 1, y: oops}\n";
    let err = load_bytes(input, &config, &record(), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(allocator.live(), 0);
}
