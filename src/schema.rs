use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::block::{Addr, Block, POINTER_SIZE};
use crate::utf8::names_equal;
use crate::{ConfigFlags, ErrorKind, Result};

/// Upper bound meaning "no limit" for string, binary and sequence lengths.
pub const UNLIMITED: u64 = u64::MAX;

bitflags::bitflags! {
    /// Per-value behaviour switches.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ValueFlags: u32 {
        /// The slot owns a pointer to the value instead of holding it inline.
        const POINTER = 1 << 0;
        /// A pointer that may be null; an empty plain scalar loads as null.
        const POINTER_NULL = Self::POINTER.bits() | 1 << 1;
        /// A nullable pointer that also treats `null`, `Null`, `NULL` and `~`
        /// as null.
        const POINTER_NULL_STR = Self::POINTER_NULL.bits() | 1 << 2;
        /// The mapping field may be absent.
        const OPTIONAL = 1 << 3;
        /// Reject numeric forms for enums and flags; fail on float range loss.
        const STRICT = 1 << 4;
        /// Emit in block style.
        const BLOCK = 1 << 5;
        /// Emit in flow style.
        const FLOW = 1 << 6;
        /// Compare names case-sensitively regardless of configuration.
        const CASE_SENSITIVE = 1 << 7;
        /// Compare names case-insensitively regardless of configuration.
        const CASE_INSENSITIVE = 1 << 8;
        /// Emit scalars plain.
        const SCALAR_PLAIN = 1 << 9;
        /// Emit scalars folded.
        const SCALAR_FOLDED = 1 << 10;
        /// Emit scalars literal.
        const SCALAR_LITERAL = 1 << 11;
        /// Emit scalars single-quoted.
        const SCALAR_QUOTE_SINGLE = 1 << 12;
        /// Emit scalars double-quoted.
        const SCALAR_QUOTE_DOUBLE = 1 << 13;
    }
}

/// A fully materialized value as seen by a [`Validator`].
#[derive(Clone, Copy, Debug)]
pub enum ValueRef<'a> {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
    Mapping(Addr<'a>),
    Sequence {
        /// The first entry, or `None` for an empty pointer sequence.
        data: Option<Addr<'a>>,
        count: u64,
    },
}

/// Accepts or rejects a value after it has been built.
///
/// Receives the config's client context, the value's schema and the value.
pub type Validator =
    Arc<dyn Fn(Option<&(dyn Any + Send + Sync)>, &Schema, ValueRef<'_>) -> bool + Send + Sync>;

/// Written to the target of an absent optional field.
#[derive(Clone, Debug, PartialEq)]
pub enum Missing {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// The value's bytes (and owned children), deep-copied into place.
    Data(Block),
    Sequence(SequenceDefault),
}

/// Default entries for an absent sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceDefault {
    /// `count` entries laid out back to back.
    pub data: Block,
    pub count: u64,
}

/// A name with its numeric value, for enums.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedValue {
    pub name: String,
    pub value: i64,
}

/// A name with its bit pattern, for flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedFlag {
    pub name: String,
    pub value: u64,
}

/// A named run of bits inside a bitfield value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitRegion {
    pub name: String,
    /// Position of the least significant bit.
    pub offset: u32,
    /// Number of bits.
    pub bits: u32,
}

/// Where a binary value's byte count is stored, relative to the enclosing
/// mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LengthField {
    pub offset: usize,
    pub width: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntSchema {
    /// Both bounds zero means unconstrained.
    pub min: i64,
    pub max: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UIntSchema {
    /// Both bounds zero means unconstrained.
    pub min: u64,
    pub max: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnumSchema {
    pub values: Vec<NamedValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagsSchema {
    pub flags: Vec<NamedFlag>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitfieldSchema {
    pub regions: Vec<BitRegion>,
}

/// Lengths are in bytes, excluding the terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StringSchema {
    pub min: u64,
    pub max: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinarySchema {
    pub min: u64,
    pub max: u64,
    pub length: LengthField,
}

#[derive(Clone, Debug, Default)]
pub struct MappingSchema {
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug)]
pub struct SequenceSchema {
    pub entry: Box<Schema>,
    pub min: u64,
    pub max: u64,
}

/// The type of a value together with its type-specific parameters.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Kind {
    Int(IntSchema),
    UInt(UIntSchema),
    Bool,
    Enum(EnumSchema),
    Flags(FlagsSchema),
    Bitfield(BitfieldSchema),
    Float,
    String(StringSchema),
    Binary(BinarySchema),
    Mapping(MappingSchema),
    /// A sequence whose entry count is stored alongside it.
    Sequence(SequenceSchema),
    /// An inline array of exactly `min == max` entries.
    SequenceFixed(SequenceSchema),
    /// Any value, consumed and discarded on load and skipped on save.
    Ignore,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Int(_) => "INT",
            Kind::UInt(_) => "UINT",
            Kind::Bool => "BOOL",
            Kind::Enum(_) => "ENUM",
            Kind::Flags(_) => "FLAGS",
            Kind::Bitfield(_) => "BITFIELD",
            Kind::Float => "FLOAT",
            Kind::String(_) => "STRING",
            Kind::Binary(_) => "BINARY",
            Kind::Mapping(_) => "MAPPING",
            Kind::Sequence(_) => "SEQUENCE",
            Kind::SequenceFixed(_) => "SEQUENCE_FIXED",
            Kind::Ignore => "IGNORE",
        }
    }
}

/// Describes one YAML value position and how it is bound to memory.
#[derive(Clone)]
pub struct Schema {
    pub kind: Kind,
    pub flags: ValueFlags,
    /// Width of the target in bytes. For inline strings and binaries, the
    /// capacity; for pointer strings, 1; for mappings, the record size.
    pub data_size: usize,
    pub validator: Option<Validator>,
    /// Value written when an optional field is absent.
    pub missing: Option<Missing>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("data_size", &self.data_size)
            .field("validator", &self.validator.is_some())
            .field("missing", &self.missing)
            .finish()
    }
}

/// One key of a mapping.
#[derive(Clone, Debug)]
pub struct Field {
    pub key: String,
    /// Offset of the value's slot inside the mapping's record.
    pub data_offset: usize,
    /// Offset of the entry count, for dynamic sequence values.
    pub count_offset: usize,
    /// Width of the entry count, for dynamic sequence values.
    pub count_width: usize,
    pub value: Schema,
}

impl Field {
    pub fn new(key: impl Into<String>, data_offset: usize, value: Schema) -> Self {
        Field {
            key: key.into(),
            data_offset,
            count_offset: 0,
            count_width: 0,
            value,
        }
    }

    /// A dynamic sequence field whose entry count lives at `count_offset`.
    pub fn sequence(
        key: impl Into<String>,
        data_offset: usize,
        count_offset: usize,
        count_width: usize,
        value: Schema,
    ) -> Self {
        Field {
            key: key.into(),
            data_offset,
            count_offset,
            count_width,
            value,
        }
    }

    /// A field whose value is consumed and dropped.
    pub fn ignore(key: impl Into<String>) -> Self {
        Field::new(key, 0, Schema::ignore())
    }
}

/// Where a value sits relative to its parent, for schema checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Position {
    Root,
    Field,
    Entry,
}

impl Schema {
    fn with_kind(kind: Kind, data_size: usize) -> Self {
        Schema {
            kind,
            flags: ValueFlags::empty(),
            data_size,
            validator: None,
            missing: None,
        }
    }

    pub fn int(size: usize) -> Self {
        Schema::with_kind(Kind::Int(IntSchema::default()), size)
    }

    pub fn int_range(size: usize, min: i64, max: i64) -> Self {
        Schema::with_kind(Kind::Int(IntSchema { min, max }), size)
    }

    pub fn uint(size: usize) -> Self {
        Schema::with_kind(Kind::UInt(UIntSchema::default()), size)
    }

    pub fn uint_range(size: usize, min: u64, max: u64) -> Self {
        Schema::with_kind(Kind::UInt(UIntSchema { min, max }), size)
    }

    pub fn boolean(size: usize) -> Self {
        Schema::with_kind(Kind::Bool, size)
    }

    pub fn float(size: usize) -> Self {
        Schema::with_kind(Kind::Float, size)
    }

    pub fn enumeration<'a>(size: usize, values: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let values = values
            .into_iter()
            .map(|(name, value)| NamedValue {
                name: String::from(name),
                value,
            })
            .collect();
        Schema::with_kind(Kind::Enum(EnumSchema { values }), size)
    }

    pub fn flags<'a>(size: usize, flags: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let flags = flags
            .into_iter()
            .map(|(name, value)| NamedFlag {
                name: String::from(name),
                value,
            })
            .collect();
        Schema::with_kind(Kind::Flags(FlagsSchema { flags }), size)
    }

    /// Regions are `(name, bit offset, bit count)`.
    pub fn bitfield<'a>(
        size: usize,
        regions: impl IntoIterator<Item = (&'a str, u32, u32)>,
    ) -> Self {
        let regions = regions
            .into_iter()
            .map(|(name, offset, bits)| BitRegion {
                name: String::from(name),
                offset,
                bits,
            })
            .collect();
        Schema::with_kind(Kind::Bitfield(BitfieldSchema { regions }), size)
    }

    /// An owned, NUL-terminated string behind a pointer.
    pub fn string(min: u64, max: u64) -> Self {
        Schema::with_kind(Kind::String(StringSchema { min, max }), 1)
            .with_flags(ValueFlags::POINTER)
    }

    /// A string stored in a `capacity`-byte array, terminator included.
    pub fn inline_string(capacity: usize, min: u64) -> Self {
        let max = capacity.saturating_sub(1) as u64;
        Schema::with_kind(Kind::String(StringSchema { min, max }), capacity)
    }

    /// Owned bytes behind a pointer, base64 in YAML.
    pub fn binary(min: u64, max: u64, length: LengthField) -> Self {
        Schema::with_kind(Kind::Binary(BinarySchema { min, max, length }), 1)
            .with_flags(ValueFlags::POINTER)
    }

    /// Bytes stored in a `capacity`-byte array.
    pub fn inline_binary(capacity: usize, min: u64, length: LengthField) -> Self {
        let max = capacity as u64;
        Schema::with_kind(Kind::Binary(BinarySchema { min, max, length }), capacity)
    }

    pub fn mapping(size: usize, fields: Vec<Field>) -> Self {
        Schema::with_kind(Kind::Mapping(MappingSchema { fields }), size)
    }

    pub fn sequence(entry: Schema, min: u64, max: u64) -> Self {
        let stride = entry.slot_size();
        Schema::with_kind(
            Kind::Sequence(SequenceSchema {
                entry: Box::new(entry),
                min,
                max,
            }),
            stride,
        )
    }

    pub fn sequence_fixed(entry: Schema, count: u64) -> Self {
        let stride = entry.slot_size();
        Schema::with_kind(
            Kind::SequenceFixed(SequenceSchema {
                entry: Box::new(entry),
                min: count,
                max: count,
            }),
            stride,
        )
    }

    pub fn ignore() -> Self {
        Schema::with_kind(Kind::Ignore, 0)
    }

    /// Add `flags` to the value's flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ValueFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_validator(
        mut self,
        validator: impl Fn(Option<&(dyn Any + Send + Sync)>, &Schema, ValueRef<'_>) -> bool
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn with_missing(mut self, missing: Missing) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn is_pointer(&self) -> bool {
        self.flags.contains(ValueFlags::POINTER)
    }

    pub(crate) fn is_nullable(&self) -> bool {
        self.flags.contains(ValueFlags::POINTER_NULL)
    }

    pub(crate) fn is_strict(&self) -> bool {
        self.flags.contains(ValueFlags::STRICT)
    }

    /// Bytes the value occupies inside its parent.
    pub fn slot_size(&self) -> usize {
        if self.is_pointer() {
            POINTER_SIZE
        } else {
            self.footprint()
        }
    }

    /// Bytes the value itself occupies, wherever it is stored.
    pub fn footprint(&self) -> usize {
        match &self.kind {
            Kind::Sequence(seq) | Kind::SequenceFixed(seq) => {
                let max = usize::try_from(seq.max).unwrap_or(usize::MAX);
                max.saturating_mul(seq.entry.slot_size())
            }
            Kind::Ignore => 0,
            _ => self.data_size,
        }
    }

    /// Whether names under this value compare without regard to case.
    pub(crate) fn case_insensitive(&self, config: ConfigFlags) -> bool {
        if self.flags.contains(ValueFlags::CASE_SENSITIVE) {
            false
        } else if self.flags.contains(ValueFlags::CASE_INSENSITIVE) {
            true
        } else {
            config.contains(ConfigFlags::CASE_INSENSITIVE)
        }
    }

    /// Static consistency checks for this value (not its children).
    pub(crate) fn check(&self, position: Position) -> Result<()> {
        match &self.kind {
            Kind::Int(int) => {
                check_width(self.data_size)?;
                if int.min > int.max {
                    return Err(ErrorKind::BadMinMaxSchema.into());
                }
            }
            Kind::UInt(uint) => {
                check_width(self.data_size)?;
                if uint.min > uint.max {
                    return Err(ErrorKind::BadMinMaxSchema.into());
                }
            }
            Kind::Bool | Kind::Enum(_) | Kind::Flags(_) => check_width(self.data_size)?,
            Kind::Bitfield(bitfield) => {
                check_width(self.data_size)?;
                let bits = self.data_size as u64 * 8;
                for region in &bitfield.regions {
                    if region.bits == 0 || region.offset as u64 + region.bits as u64 > bits {
                        return Err(ErrorKind::BadBitvalInSchema.into());
                    }
                }
            }
            Kind::Float => {
                if self.data_size != 4 && self.data_size != 8 {
                    return Err(ErrorKind::InvalidDataSize.into());
                }
            }
            Kind::String(string) => {
                if string.min > string.max {
                    return Err(ErrorKind::BadMinMaxSchema.into());
                }
                if !self.is_pointer()
                    && (self.data_size == 0 || string.max > self.data_size as u64 - 1)
                {
                    return Err(ErrorKind::BadMinMaxSchema.into());
                }
            }
            Kind::Binary(binary) => {
                if position != Position::Field {
                    return Err(ErrorKind::MappingRequired.into());
                }
                check_width(binary.length.width)?;
                if binary.min > binary.max
                    || (!self.is_pointer() && binary.max > self.data_size as u64)
                {
                    return Err(ErrorKind::BadMinMaxSchema.into());
                }
            }
            Kind::Mapping(mapping) => {
                for field in &mapping.fields {
                    self.check_field_layout(field)?;
                }
            }
            Kind::Sequence(seq) => {
                if position == Position::Entry {
                    return Err(ErrorKind::SequenceInSequence.into());
                }
                if seq.min > seq.max || (!self.is_pointer() && seq.max == UNLIMITED) {
                    return Err(ErrorKind::BadMinMaxSchema.into());
                }
                if matches!(seq.entry.kind, Kind::Sequence(_)) {
                    return Err(ErrorKind::SequenceInSequence.into());
                }
            }
            Kind::SequenceFixed(seq) => {
                if seq.min != seq.max || seq.max == UNLIMITED {
                    return Err(ErrorKind::SequenceFixedCount.into());
                }
                if matches!(seq.entry.kind, Kind::Sequence(_)) {
                    return Err(ErrorKind::SequenceInSequence.into());
                }
            }
            Kind::Ignore => match position {
                Position::Root => return Err(ErrorKind::BadTypeInSchema.into()),
                Position::Entry => return Err(ErrorKind::MappingRequired.into()),
                Position::Field => {}
            },
        }
        self.check_missing()
    }

    fn check_field_layout(&self, field: &Field) -> Result<()> {
        let end = field.data_offset.saturating_add(field.value.slot_size());
        if end > self.data_size {
            return Err(ErrorKind::InvalidDataSize.into());
        }
        match &field.value.kind {
            Kind::Sequence(_) => {
                check_width(field.count_width)?;
                if field.count_offset + field.count_width > self.data_size {
                    return Err(ErrorKind::InvalidDataSize.into());
                }
            }
            Kind::Binary(binary) => {
                if binary.length.offset + binary.length.width > self.data_size {
                    return Err(ErrorKind::InvalidDataSize.into());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_missing(&self) -> Result<()> {
        let Some(missing) = &self.missing else {
            return Ok(());
        };
        let matches = match (&self.kind, missing) {
            (Kind::Int(_) | Kind::Enum(_), Missing::Int(_))
            | (Kind::UInt(_) | Kind::Flags(_) | Kind::Bitfield(_), Missing::UInt(_))
            | (Kind::Bool, Missing::Bool(_))
            | (Kind::Float, Missing::Float(_))
            | (Kind::String(_), Missing::Str(_))
            | (Kind::Binary(_), Missing::Bytes(_))
            | (Kind::Mapping(_), Missing::Data(_))
            | (Kind::Sequence(_) | Kind::SequenceFixed(_), Missing::Sequence(_)) => true,
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(ErrorKind::BadTypeInSchema.into())
        }
    }
}

impl MappingSchema {
    pub(crate) fn find(&self, key: &str, case_insensitive: bool) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| names_equal(&field.key, key, case_insensitive))
    }
}

impl EnumSchema {
    pub(crate) fn find(&self, name: &str, case_insensitive: bool) -> Option<i64> {
        self.values
            .iter()
            .find(|entry| names_equal(&entry.name, name, case_insensitive))
            .map(|entry| entry.value)
    }

    pub(crate) fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|entry| entry.value == value)
            .map(|entry| entry.name.as_str())
    }
}

impl FlagsSchema {
    pub(crate) fn find(&self, name: &str, case_insensitive: bool) -> Option<u64> {
        self.flags
            .iter()
            .find(|entry| names_equal(&entry.name, name, case_insensitive))
            .map(|entry| entry.value)
    }
}

impl BitfieldSchema {
    pub(crate) fn find(&self, name: &str, case_insensitive: bool) -> Option<usize> {
        self.regions
            .iter()
            .position(|region| names_equal(&region.name, name, case_insensitive))
    }
}

fn check_width(width: usize) -> Result<()> {
    match width {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(ErrorKind::InvalidDataSize.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(schema: &Schema, position: Position) -> Option<ErrorKind> {
        schema.check(position).err().map(|err| err.kind())
    }

    #[test]
    fn pointer_null_implies_pointer() {
        let schema = Schema::int(4).with_flags(ValueFlags::POINTER_NULL_STR);
        assert!(schema.is_pointer());
        assert!(schema.is_nullable());
        assert_eq!(schema.slot_size(), POINTER_SIZE);
    }

    #[test]
    fn widths() {
        assert_eq!(
            kind_of(&Schema::int(3), Position::Field),
            Some(ErrorKind::InvalidDataSize)
        );
        assert_eq!(
            kind_of(&Schema::float(2), Position::Field),
            Some(ErrorKind::InvalidDataSize)
        );
        assert_eq!(kind_of(&Schema::float(4), Position::Field), None);
    }

    #[test]
    fn ranges() {
        assert_eq!(
            kind_of(&Schema::int_range(4, 5, 1), Position::Field),
            Some(ErrorKind::BadMinMaxSchema)
        );
        let mut inline = Schema::inline_string(8, 0);
        assert_eq!(kind_of(&inline, Position::Field), None);
        inline.kind = Kind::String(StringSchema { min: 0, max: 8 });
        assert_eq!(
            kind_of(&inline, Position::Field),
            Some(ErrorKind::BadMinMaxSchema)
        );
    }

    #[test]
    fn bitfield_regions_must_fit() {
        let schema = Schema::bitfield(8, [("a", 62, 4)]);
        assert_eq!(
            kind_of(&schema, Position::Root),
            Some(ErrorKind::BadBitvalInSchema)
        );
        let schema = Schema::bitfield(8, [("a", 60, 4)]);
        assert_eq!(kind_of(&schema, Position::Root), None);
    }

    #[test]
    fn sequences() {
        let dynamic = Schema::sequence(Schema::int(4), 0, UNLIMITED).with_flags(ValueFlags::POINTER);
        assert_eq!(
            kind_of(&dynamic, Position::Entry),
            Some(ErrorKind::SequenceInSequence)
        );
        let nested = Schema::sequence(dynamic.clone(), 0, 4).with_flags(ValueFlags::POINTER);
        assert_eq!(
            kind_of(&nested, Position::Root),
            Some(ErrorKind::SequenceInSequence)
        );
        let inline_unbounded = Schema::sequence(Schema::int(4), 0, UNLIMITED);
        assert_eq!(
            kind_of(&inline_unbounded, Position::Field),
            Some(ErrorKind::BadMinMaxSchema)
        );
        let mut fixed = Schema::sequence_fixed(Schema::int(4), 3);
        assert_eq!(fixed.footprint(), 12);
        if let Kind::SequenceFixed(seq) = &mut fixed.kind {
            seq.min = 2;
        }
        assert_eq!(
            kind_of(&fixed, Position::Field),
            Some(ErrorKind::SequenceFixedCount)
        );
        let fixed_in_dynamic = Schema::sequence(Schema::sequence_fixed(Schema::int(1), 2), 0, 8)
            .with_flags(ValueFlags::POINTER);
        assert_eq!(kind_of(&fixed_in_dynamic, Position::Root), None);
    }

    #[test]
    fn mapping_only_types() {
        let binary = Schema::binary(0, 16, LengthField { offset: 8, width: 4 });
        assert_eq!(
            kind_of(&binary, Position::Entry),
            Some(ErrorKind::MappingRequired)
        );
        assert_eq!(kind_of(&binary, Position::Field), None);
        assert_eq!(
            kind_of(&Schema::ignore(), Position::Root),
            Some(ErrorKind::BadTypeInSchema)
        );
    }

    #[test]
    fn field_layout() {
        let schema = Schema::mapping(4, alloc::vec![Field::new("x", 2, Schema::int(4))]);
        assert_eq!(
            kind_of(&schema, Position::Root),
            Some(ErrorKind::InvalidDataSize)
        );
        let schema = Schema::mapping(
            16,
            alloc::vec![Field::sequence(
                "x",
                0,
                8,
                3,
                Schema::sequence(Schema::int(1), 0, 4).with_flags(ValueFlags::POINTER)
            )],
        );
        assert_eq!(
            kind_of(&schema, Position::Root),
            Some(ErrorKind::InvalidDataSize)
        );
    }

    #[test]
    fn missing_must_match_kind() {
        let schema = Schema::int(4).with_missing(Missing::Str(String::from("x")));
        assert_eq!(
            kind_of(&schema, Position::Field),
            Some(ErrorKind::BadTypeInSchema)
        );
        let schema = Schema::int(4).with_missing(Missing::Int(42));
        assert_eq!(kind_of(&schema, Position::Field), None);
    }

    #[test]
    fn case_sensitivity_precedence() {
        let plain = Schema::int(4);
        assert!(!plain.case_insensitive(ConfigFlags::empty()));
        assert!(plain.case_insensitive(ConfigFlags::CASE_INSENSITIVE));
        let sensitive = Schema::int(4).with_flags(ValueFlags::CASE_SENSITIVE);
        assert!(!sensitive.case_insensitive(ConfigFlags::CASE_INSENSITIVE));
        let insensitive = Schema::int(4).with_flags(ValueFlags::CASE_INSENSITIVE);
        assert!(insensitive.case_insensitive(ConfigFlags::empty()));
    }
}
