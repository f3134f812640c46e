#![no_main]

use libfuzzer_sys::fuzz_target;
use yaml_binder::{
    free, load_bytes, save_bytes, Config, ConfigFlags, Field, LengthField, Schema, ValueFlags,
    UNLIMITED,
};

fn schema() -> Schema {
    let entry = Schema::mapping(
        16,
        vec![
            Field::new("key", 0, Schema::string(0, 64).with_flags(ValueFlags::POINTER_NULL_STR)),
            Field::new("value", 8, Schema::int(8).with_flags(ValueFlags::OPTIONAL)),
        ],
    );
    Schema::mapping(
        48,
        vec![
            Field::new("name", 0, Schema::string(0, UNLIMITED)),
            Field::sequence(
                "entries",
                8,
                16,
                4,
                Schema::sequence(entry, 0, 1024).with_flags(ValueFlags::POINTER),
            ),
            Field::new("mode", 20, Schema::enumeration(4, [("fast", 0), ("slow", 1)])),
            Field::new(
                "blob",
                24,
                Schema::binary(0, 4096, LengthField { offset: 32, width: 4 })
                    .with_flags(ValueFlags::OPTIONAL),
            ),
            Field::new(
                "bits",
                36,
                Schema::bitfield(4, [("lo", 0, 8), ("hi", 8, 8)]).with_flags(ValueFlags::OPTIONAL),
            ),
        ],
    )
    .with_flags(ValueFlags::POINTER_NULL)
}

fuzz_target!(|data: &[u8]| {
    let schema = schema();
    let config = Config::new().with_flags(ConfigFlags::IGNORE_UNKNOWN_KEYS);
    if let Ok(value) = load_bytes(data, &config, &schema, None) {
        let _ = save_bytes(&config, &schema, value.as_ref(), None);
        let _ = free(&config, &schema, value, None);
    }
});
