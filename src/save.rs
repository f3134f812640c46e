use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use std::path::Path;

use crate::block::{Addr, Block};
use crate::event::{EventData, MappingStyle, ScalarStyle, SequenceStyle, Sink};
use crate::memory;
use crate::scalar;
use crate::schema::{Kind, Position};
use crate::{Config, ConfigFlags, Error, ErrorKind, Field, PathEntry, Result, Schema, ValueFlags};

/// Serialize `value` as a YAML document and write it to `path`.
///
/// See [`save_bytes`].
pub fn save_file(
    path: impl AsRef<Path>,
    config: &Config,
    schema: &Schema,
    value: Option<&Block>,
    seq_count: Option<u64>,
) -> Result<()> {
    let path = path.as_ref();
    let output = save_bytes(config, schema, value, seq_count)?;
    let written = std::fs::write(path, &output);
    config.allocator().release(output);
    if let Err(err) = written {
        let err = Error::new(ErrorKind::FileOpen).with_problem(err.to_string());
        log!(config, Error, "Save: Failed to write {}: {err}", path.display());
        return Err(err);
    }
    Ok(())
}

/// Serialize `value` as a single YAML document.
///
/// The root schema must be a pointer; `value` is the block it points to, or
/// `None` for a null root. `seq_count` is the entry count of a root
/// [`Kind::Sequence`]. The returned buffer comes from the configured
/// allocator.
pub fn save_bytes(
    config: &Config,
    schema: &Schema,
    value: Option<&Block>,
    seq_count: Option<u64>,
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    if let Err(err) = emit_document(config, schema, value, seq_count, &mut output) {
        config.log_failure("Save", &err);
        return Err(err);
    }
    let (buffer, _) = memory::allocate_copy(config.allocator(), &output)?.into_parts();
    Ok(buffer)
}

fn emit_document(
    config: &Config,
    schema: &Schema,
    value: Option<&Block>,
    seq_count: Option<u64>,
    output: &mut Vec<u8>,
) -> Result<()> {
    if !schema.is_pointer() {
        return Err(ErrorKind::TopLevelNonPtr.into());
    }
    crate::check_seq_count(schema, seq_count.is_some())?;
    schema.check(Position::Root)?;

    let implicit = !config.flags.contains(ConfigFlags::DOCUMENT_DELIM);
    let mut saver = Saver {
        config,
        sink: Sink::new(output),
    };
    saver.sink.emit(EventData::StreamStart)?;
    saver.sink.emit(EventData::DocumentStart { implicit })?;
    match value {
        Some(block) => saver.content(schema, Addr::new(block, 0), seq_count.unwrap_or(0))?,
        None if schema.is_nullable() => saver.null(schema)?,
        None => return Err(ErrorKind::BadParamNullData.into()),
    }
    saver.sink.emit(EventData::DocumentEnd { implicit })?;
    saver.sink.emit(EventData::StreamEnd)
}

struct Saver<'c, 'w> {
    config: &'c Config,
    sink: Sink<'w>,
}

impl Saver<'_, '_> {
    /// Emit the value stored in `slot`: inline, or behind the pointer there.
    fn slot(&mut self, schema: &Schema, position: Position, slot: Addr<'_>, len: u64) -> Result<()> {
        schema.check(position)?;
        if !schema.is_pointer() {
            return self.content(schema, slot, len);
        }
        match slot.child(0) {
            Some(child) => self.content(schema, Addr::new(child, 0), len),
            None if schema.is_nullable() => self.null(schema),
            None if len == 0 && matches!(schema.kind, Kind::Sequence(_)) => {
                let style = self.sequence_style(schema);
                self.sink.emit(EventData::SequenceStart { anchor: None, style })?;
                self.sink.emit(EventData::SequenceEnd)
            }
            None if len == 0 && matches!(schema.kind, Kind::Binary(_)) => {
                self.scalar(schema, String::new())
            }
            None => {
                log!(self.config, Error, "Save: Null {} is not allowed", schema.kind.name());
                Err(ErrorKind::InvalidValue.into())
            }
        }
    }

    fn null(&mut self, schema: &Schema) -> Result<()> {
        log!(self.config, Debug, "Save: Null {}", schema.kind.name());
        let value = if schema.flags.contains(ValueFlags::POINTER_NULL_STR) {
            "null"
        } else {
            ""
        };
        self.sink.emit(EventData::Scalar {
            anchor: None,
            value: String::from(value),
            style: ScalarStyle::Plain,
        })
    }

    fn scalar(&mut self, schema: &Schema, value: String) -> Result<()> {
        let mut style = scalar_style(schema.flags);
        let looks_null = value.is_empty()
            || (schema.flags.contains(ValueFlags::POINTER_NULL_STR)
                && scalar::is_null_literal(&value));
        if schema.is_nullable() && looks_null && matches!(style, ScalarStyle::Any | ScalarStyle::Plain)
        {
            style = ScalarStyle::SingleQuoted;
        }
        self.sink.emit(EventData::Scalar {
            anchor: None,
            value,
            style,
        })
    }

    fn key(&mut self, name: &str) -> Result<()> {
        self.sink.emit(EventData::Scalar {
            anchor: None,
            value: String::from(name),
            style: ScalarStyle::Any,
        })
    }

    /// Emit a value whose bytes start at `addr`.
    fn content(&mut self, schema: &Schema, addr: Addr<'_>, len: u64) -> Result<()> {
        let size = schema.data_size;
        match &schema.kind {
            Kind::Int(_) => self.scalar(schema, addr.read_int(0, size)?.to_string()),
            Kind::UInt(_) => self.scalar(schema, addr.read_uint(0, size)?.to_string()),
            Kind::Bool => {
                let value = if addr.read_bool(0, size)? { "true" } else { "false" };
                self.scalar(schema, String::from(value))
            }
            Kind::Float => {
                let value = scalar::format_float(addr.read_float(0, size)?, size);
                self.scalar(schema, value)
            }
            Kind::String(_) => self.scalar(schema, String::from(addr.read_str(0)?)),
            Kind::Binary(_) => {
                let len = usize::try_from(len).map_err(|_| ErrorKind::InvalidDataSize)?;
                let bytes = addr.block().slice(addr.offset(), len)?;
                self.scalar(schema, scalar::encode_base64(bytes))
            }
            Kind::Enum(values) => {
                let number = addr.read_int(0, size)?;
                match values.name_of(number) {
                    Some(name) => self.scalar(schema, String::from(name)),
                    None if schema.is_strict() => {
                        log!(self.config, Error, "Save: Invalid enumeration value: {number}");
                        Err(Error::new(ErrorKind::InvalidValue)
                            .with_problem(format!("no name for enumeration value {number}")))
                    }
                    None => self.scalar(schema, number.to_string()),
                }
            }
            Kind::Flags(flags) => {
                let value = addr.read_uint(0, size)?;
                let style = self.sequence_style(schema);
                self.sink.emit(EventData::SequenceStart { anchor: None, style })?;
                let mut rest = value;
                for flag in &flags.flags {
                    if flag.value != 0 && value & flag.value == flag.value {
                        self.scalar(schema, flag.name.clone())?;
                        rest &= !flag.value;
                    }
                }
                if rest != 0 {
                    if schema.is_strict() {
                        log!(self.config, Error, "Save: Unknown flag bits: {rest:#x}");
                        return Err(Error::new(ErrorKind::InvalidValue)
                            .with_problem(format!("unnamed flag bits {rest:#x}")));
                    }
                    self.scalar(schema, rest.to_string())?;
                }
                self.sink.emit(EventData::SequenceEnd)
            }
            Kind::Bitfield(bitfield) => {
                let bytes = addr.block().slice(addr.offset(), size)?;
                let style = self.mapping_style(schema);
                self.sink.emit(EventData::MappingStart { anchor: None, style })?;
                for region in &bitfield.regions {
                    let value = crate::data::read_bitfield(bytes, size, region.offset, region.bits)?;
                    if value != 0 {
                        self.key(&region.name)?;
                        self.scalar(schema, value.to_string())?;
                    }
                }
                self.sink.emit(EventData::MappingEnd)
            }
            Kind::Mapping(mapping) => {
                let style = self.mapping_style(schema);
                self.sink.emit(EventData::MappingStart { anchor: None, style })?;
                for field in &mapping.fields {
                    self.field(field, addr)
                        .map_err(|err| {
                            err.within(PathEntry::Field {
                                name: field.key.clone(),
                                mark: None,
                            })
                        })?;
                }
                self.sink.emit(EventData::MappingEnd)
            }
            Kind::Sequence(seq) | Kind::SequenceFixed(seq) => {
                let count = match schema.kind {
                    Kind::SequenceFixed(_) => seq.max,
                    _ => len,
                };
                if count < seq.min {
                    log!(self.config, Error, "Save: Insufficient entries ({count}) in sequence");
                    return Err(ErrorKind::SequenceEntriesMin.into());
                }
                if count > seq.max {
                    log!(self.config, Error, "Save: Excessive entries ({count}) in sequence");
                    return Err(ErrorKind::SequenceEntriesMax.into());
                }
                let style = self.sequence_style(schema);
                self.sink.emit(EventData::SequenceStart { anchor: None, style })?;
                let stride = seq.entry.slot_size();
                for index in 0..count {
                    let entry = addr.at(index as usize * stride);
                    self.slot(&seq.entry, Position::Entry, entry, 0)
                        .map_err(|err| err.within(PathEntry::Entry { index, mark: None }))?;
                }
                self.sink.emit(EventData::SequenceEnd)
            }
            Kind::Ignore => Ok(()),
        }
    }

    fn field(&mut self, field: &Field, record: Addr<'_>) -> Result<()> {
        let schema = &field.value;
        let slot = record.at(field.data_offset);
        let len = match &schema.kind {
            Kind::Ignore => return Ok(()),
            Kind::Sequence(_) => record.read_uint(field.count_offset, field.count_width)?,
            Kind::Binary(binary) => record.read_uint(binary.length.offset, binary.length.width)?,
            _ => 0,
        };
        if schema.is_pointer()
            && schema.flags.contains(ValueFlags::OPTIONAL)
            && slot.child(0).is_none()
            && len == 0
        {
            log!(self.config, Debug, "Save: Skipping absent field: {}", field.key);
            return Ok(());
        }
        self.key(&field.key)?;
        self.slot(schema, Position::Field, slot, len)
    }

    fn mapping_style(&self, schema: &Schema) -> MappingStyle {
        match self.container_style(schema) {
            Some(true) => MappingStyle::Block,
            Some(false) => MappingStyle::Flow,
            None => MappingStyle::Any,
        }
    }

    fn sequence_style(&self, schema: &Schema) -> SequenceStyle {
        match self.container_style(schema) {
            Some(true) => SequenceStyle::Block,
            Some(false) => SequenceStyle::Flow,
            None => SequenceStyle::Any,
        }
    }

    /// `Some(true)` for block, `Some(false)` for flow.
    fn container_style(&self, schema: &Schema) -> Option<bool> {
        if schema.flags.contains(ValueFlags::BLOCK) {
            Some(true)
        } else if schema.flags.contains(ValueFlags::FLOW) {
            Some(false)
        } else if self.config.flags.contains(ConfigFlags::STYLE_BLOCK) {
            Some(true)
        } else if self.config.flags.contains(ConfigFlags::STYLE_FLOW) {
            Some(false)
        } else {
            None
        }
    }
}

fn scalar_style(flags: ValueFlags) -> ScalarStyle {
    if flags.contains(ValueFlags::SCALAR_QUOTE_DOUBLE) {
        ScalarStyle::DoubleQuoted
    } else if flags.contains(ValueFlags::SCALAR_QUOTE_SINGLE) {
        ScalarStyle::SingleQuoted
    } else if flags.contains(ValueFlags::SCALAR_LITERAL) {
        ScalarStyle::Literal
    } else if flags.contains(ValueFlags::SCALAR_FOLDED) {
        ScalarStyle::Folded
    } else if flags.contains(ValueFlags::SCALAR_PLAIN) {
        ScalarStyle::Plain
    } else {
        ScalarStyle::Any
    }
}
