#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/yaml-binder/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::manual_range_contains,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::unnecessary_wraps,
    clippy::match_wildcard_for_single_variants
)]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
mod macros;

mod anchor;
mod block;
mod config;
mod copy;
mod data;
mod error;
mod event;
mod free;
mod load;
mod memory;
mod save;
mod scalar;
mod schema;
mod utf8;

pub use crate::block::{Addr, Block, POINTER_SIZE};
pub use crate::config::*;
pub use crate::copy::copy;
pub use crate::data::*;
pub use crate::error::*;
pub use crate::event::Mark;
pub use crate::free::free;
pub use crate::load::{load_bytes, load_file};
pub use crate::memory::{Allocator, DefaultAllocator};
pub use crate::save::{save_bytes, save_file};
pub use crate::schema::*;
pub use crate::utf8::casecmp;

/// The library version as a string.
pub const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

/// The library version packed into 32 bits.
///
/// Bit 31 is set for pre-release builds; bits 16..24 hold the major version,
/// bits 8..16 the minor version and bits 0..8 the patch level.
pub fn version() -> u32 {
    let (major, minor, patch) = version_parts();
    let release = u32::from(!env!("CARGO_PKG_VERSION_PRE").is_empty());
    release << 31 | (major & 0xff) << 16 | (minor & 0xff) << 8 | (patch & 0xff)
}

/// The major, minor and patch components of the library version.
pub fn version_parts() -> (u32, u32, u32) {
    let part = |value: &str| value.parse().unwrap_or(0);
    (
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

/// A root entry count is required for a dynamic sequence root, and
/// meaningless for anything else.
pub(crate) fn check_seq_count(schema: &Schema, given: bool) -> Result<()> {
    if matches!(schema.kind, Kind::Sequence(_)) == given {
        Ok(())
    } else {
        Err(ErrorKind::BadParamSeqCount.into())
    }
}
