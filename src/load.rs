//! Schema-directed loading: YAML events in, bound values out.
//!
//! The loader keeps one [`Frame`] per value under construction. Each parser
//! event is handed to the innermost frame; a frame that starts a child value
//! pushes a new frame and, if the event belongs to the child, hands the same
//! event on to it.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use std::path::Path;

use crate::anchor::Reader;
use crate::block::{Addr, Block};
use crate::copy::Copier;
use crate::event::{Event, EventData, Mark, ScalarStyle, Source};
use crate::memory;
use crate::scalar;
use crate::schema::{Kind, Position, ValueRef};
use crate::{Config, ConfigFlags, Error, ErrorKind, PathEntry, Result, Schema, ValueFlags};

/// Deepest nesting of values the loader will follow.
pub(crate) const MAX_DEPTH: usize = 256;

/// Stands in for the values of unknown keys.
static IGNORED: Schema = Schema {
    kind: Kind::Ignore,
    flags: ValueFlags::empty(),
    data_size: 0,
    validator: None,
    missing: None,
};

/// Load the first document of the YAML file at `path`.
///
/// See [`load_bytes`].
pub fn load_file(
    path: impl AsRef<Path>,
    config: &Config,
    schema: &Schema,
    seq_count: Option<&mut u64>,
) -> Result<Option<Block>> {
    let path = path.as_ref();
    let input = match std::fs::read(path) {
        Ok(input) => input,
        Err(err) => {
            let err = Error::new(ErrorKind::FileOpen).with_problem(err.to_string());
            log!(config, Error, "Load: Failed to open {}: {err}", path.display());
            return Err(err);
        }
    };
    load_bytes(&input, config, schema, seq_count)
}

/// Load the first document of `input` according to `schema`.
///
/// The root schema must be a pointer. Returns `None` when the document is
/// null and the root is nullable. When the root is a dynamic sequence,
/// `seq_count` must be given and receives the number of entries.
///
/// On failure nothing is leaked: every allocation made so far is released
/// through the configured allocator.
pub fn load_bytes(
    input: &[u8],
    config: &Config,
    schema: &Schema,
    seq_count: Option<&mut u64>,
) -> Result<Option<Block>> {
    if !schema.is_pointer() {
        let err = Error::new(ErrorKind::TopLevelNonPtr);
        config.log_failure("Load", &err);
        return Err(err);
    }
    if let Err(err) = crate::check_seq_count(schema, seq_count.is_some()) {
        config.log_failure("Load", &err);
        return Err(err);
    }

    let mut input = input;
    let no_alias = config.flags.contains(ConfigFlags::NO_ALIAS);
    let mut loader = Loader {
        config,
        reader: Reader::new(Source::new(&mut input), no_alias),
        stack: Vec::new(),
        root: None,
        top_count: 0,
    };
    match loader.run(schema) {
        Ok(value) => {
            if let Some(out) = seq_count {
                *out = loader.top_count;
            }
            Ok(value)
        }
        Err(err) => Err(loader.unwind(err)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Waiting for the event that begins the value.
    Start,
    /// Inside a mapping or bitfield, waiting for a key or the end.
    Key,
    /// Inside a bitfield, waiting for the value of a region.
    BitValue(usize),
    /// Inside a sequence or flags list.
    Entries,
    /// Skipping a value.
    Ignoring,
}

/// Where a pointer value's block goes once it is complete.
#[derive(Clone, Copy, Debug)]
enum Link {
    Root,
    Slot { owner: usize, offset: usize },
}

/// Where an entry count or byte length is written.
#[derive(Clone, Copy, Debug)]
enum Counter {
    None,
    Top,
    Field {
        owner: usize,
        offset: usize,
        width: usize,
    },
}

struct Frame<'s> {
    schema: &'s Schema,
    state: State,
    /// Frame whose block holds this value's bytes.
    owner: usize,
    offset: usize,
    /// The value's own allocation, when it sits behind a pointer.
    block: Option<Block>,
    link: Link,
    counter: Counter,
    /// Mapping fields or bitfield regions seen so far.
    seen: Vec<bool>,
    /// The field or region being bound, and where its key was.
    field: Option<(usize, Mark)>,
    count: u64,
    /// Start of the latest sequence entry, while it is being bound.
    entry: Option<Mark>,
    flags: u64,
    /// Nesting depth inside an ignored value.
    depth: u32,
}

enum Step {
    Done,
    /// Hand the same event to the frame just pushed.
    Redeliver,
}

struct Loader<'c, 's, 'r> {
    config: &'c Config,
    reader: Reader<'r>,
    stack: Vec<Frame<'s>>,
    root: Option<Block>,
    top_count: u64,
}

impl<'c, 's, 'r> Loader<'c, 's, 'r> {
    fn run(&mut self, schema: &'s Schema) -> Result<Option<Block>> {
        let event = self.reader.next_event()?;
        if !matches!(event.data, EventData::StreamStart) {
            return Err(unexpected(&event));
        }
        let event = self.reader.next_event()?;
        match event.data {
            EventData::DocumentStart { .. } => {}
            EventData::StreamEnd if schema.is_nullable() => {
                log!(self.config, Debug, "Load: Empty stream, root is null");
                return Ok(None);
            }
            _ => return Err(unexpected(&event)),
        }

        let counter = match schema.kind {
            Kind::Sequence(_) => Counter::Top,
            _ => Counter::None,
        };
        self.push(schema, Position::Root, 0, 0, Link::Root, counter)?;
        while !self.stack.is_empty() {
            let event = self.reader.next_event()?;
            self.dispatch(&event)?;
        }

        let event = self.reader.next_event()?;
        if !matches!(event.data, EventData::DocumentEnd { .. }) {
            return Err(unexpected(&event));
        }
        self.reader.reset_anchors();
        Ok(self.root.take())
    }

    fn dispatch(&mut self, event: &Event) -> Result<()> {
        loop {
            let index = self.stack.len() - 1;
            let step = match self.stack[index].state {
                State::Start => self.start(index, event)?,
                State::Key => self.key(index, event)?,
                State::BitValue(region) => self.bit_value(index, region, event)?,
                State::Entries => self.entry(index, event)?,
                State::Ignoring => self.ignore(index, event)?,
            };
            match step {
                Step::Done => return Ok(()),
                Step::Redeliver => {}
            }
        }
    }

    fn push(
        &mut self,
        schema: &'s Schema,
        position: Position,
        owner: usize,
        offset: usize,
        link: Link,
        counter: Counter,
    ) -> Result<()> {
        if self.stack.len() >= MAX_DEPTH {
            return Err(Error::new(ErrorKind::UnexpectedEvent).with_problem("nesting too deep"));
        }
        schema.check(position)?;
        log!(self.config, Debug, "Load: Push {}", schema.kind.name());
        let seen = match &schema.kind {
            Kind::Mapping(mapping) => vec![false; mapping.fields.len()],
            Kind::Bitfield(bitfield) => vec![false; bitfield.regions.len()],
            _ => Vec::new(),
        };
        self.stack.push(Frame {
            schema,
            state: State::Start,
            owner,
            offset,
            block: None,
            link,
            counter,
            seen,
            field: None,
            count: 0,
            entry: None,
            flags: 0,
            depth: 0,
        });
        Ok(())
    }

    /// Finish the innermost value and hand its block to whoever owns it.
    fn pop(&mut self) -> Result<()> {
        let frame = self.stack.pop().ok_or(ErrorKind::InternalError)?;
        log!(self.config, Debug, "Load: Pop {}", frame.schema.kind.name());
        if let Some(block) = frame.block {
            self.attach(frame.link, block)?;
        }
        if let Some(parent) = self.stack.last_mut() {
            parent.field = None;
            parent.entry = None;
        }
        Ok(())
    }

    fn attach(&mut self, link: Link, block: Block) -> Result<()> {
        match link {
            Link::Root => {
                if let Some(stale) = self.root.replace(block) {
                    memory::release(self.config.allocator(), stale);
                }
            }
            Link::Slot { owner, offset } => {
                let Some(parent) = self.stack.get_mut(owner).and_then(|f| f.block.as_mut())
                else {
                    memory::release(self.config.allocator(), block);
                    return Err(ErrorKind::InternalError.into());
                };
                if let Some(stale) = parent.set_child(offset, block) {
                    memory::release(self.config.allocator(), stale);
                }
            }
        }
        Ok(())
    }

    /// The block and offset holding the value of frame `index`.
    fn target(&mut self, index: usize) -> Result<(&mut Block, usize)> {
        let (owner, offset) = (self.stack[index].owner, self.stack[index].offset);
        let block = self.stack[owner]
            .block
            .as_mut()
            .ok_or(ErrorKind::InternalError)?;
        Ok((block, offset))
    }

    /// Where the value of frame `index` can be read, if it has storage.
    fn value_addr(&self, index: usize) -> Option<Addr<'_>> {
        let frame = &self.stack[index];
        if let Some(block) = &frame.block {
            return Some(Addr::new(block, 0));
        }
        if frame.schema.is_pointer() {
            let block = match frame.link {
                Link::Root => self.root.as_ref(),
                Link::Slot { owner, offset } => self.stack[owner].block.as_ref()?.child(offset),
            }?;
            return Some(Addr::new(block, 0));
        }
        let block = self.stack[frame.owner].block.as_ref()?;
        Some(Addr::new(block, frame.offset))
    }

    fn validate(&self, schema: &Schema, value: ValueRef<'_>) -> Result<()> {
        if let Some(validator) = &schema.validator {
            if !validator(self.config.context(), schema, value) {
                log!(self.config, Error, "Load: Validator failed");
                return Err(ErrorKind::InvalidValue.into());
            }
        }
        Ok(())
    }

    fn write_count(&mut self, counter: Counter, count: u64) -> Result<()> {
        match counter {
            Counter::None => Ok(()),
            Counter::Top => {
                self.top_count = count;
                Ok(())
            }
            Counter::Field {
                owner,
                offset,
                width,
            } => self.stack[owner]
                .block
                .as_mut()
                .ok_or(ErrorKind::InternalError)?
                .write_uint(offset, width, count),
        }
    }

    fn is_null(&self, schema: &Schema, event: &Event) -> bool {
        let EventData::Scalar { value, style, .. } = &event.data else {
            return false;
        };
        schema.is_nullable()
            && *style == ScalarStyle::Plain
            && (value.is_empty()
                || (schema.flags.contains(ValueFlags::POINTER_NULL_STR)
                    && scalar::is_null_literal(value)))
    }

    fn start(&mut self, index: usize, event: &Event) -> Result<Step> {
        let schema = self.stack[index].schema;
        if let Kind::Ignore = schema.kind {
            return self.ignore(index, event);
        }

        if schema.is_pointer() {
            if self.is_null(schema, event) {
                log!(self.config, Debug, "Load: Null {}", schema.kind.name());
                let counter = self.stack[index].counter;
                self.write_count(counter, 0)?;
                self.pop()?;
                return Ok(Step::Done);
            }
            if !matches!(
                schema.kind,
                Kind::String(_) | Kind::Binary(_) | Kind::Sequence(_)
            ) && starts_value(event)
            {
                let block = memory::allocate(self.config.allocator(), schema.footprint())?;
                let frame = &mut self.stack[index];
                frame.block = Some(block);
                frame.owner = index;
                frame.offset = 0;
            }
        }

        match (&schema.kind, &event.data) {
            (Kind::Flags(_), EventData::SequenceStart { .. })
            | (Kind::Sequence(_) | Kind::SequenceFixed(_), EventData::SequenceStart { .. }) => {
                self.stack[index].state = State::Entries;
                Ok(Step::Done)
            }
            (Kind::Mapping(_) | Kind::Bitfield(_), EventData::MappingStart { .. }) => {
                self.stack[index].state = State::Key;
                Ok(Step::Done)
            }
            (
                Kind::Flags(_) | Kind::Sequence(_) | Kind::SequenceFixed(_),
                EventData::Scalar { .. } | EventData::MappingStart { .. },
            ) => {
                log!(self.config, Error, "Load: Expected sequence for {}", schema.kind.name());
                Err(ErrorKind::InvalidValue.into())
            }
            (
                Kind::Mapping(_) | Kind::Bitfield(_),
                EventData::Scalar { .. } | EventData::SequenceStart { .. },
            ) => {
                log!(self.config, Error, "Load: Expected mapping for {}", schema.kind.name());
                Err(ErrorKind::InvalidValue.into())
            }
            (_, EventData::Scalar { value, .. }) => {
                self.bind_scalar(index, value)?;
                self.pop()?;
                Ok(Step::Done)
            }
            (_, EventData::SequenceStart { .. } | EventData::MappingStart { .. }) => {
                log!(self.config, Error, "Load: Expected scalar for {}", schema.kind.name());
                Err(ErrorKind::InvalidValue.into())
            }
            _ => Err(unexpected(event)),
        }
    }

    fn bind_scalar(&mut self, index: usize, value: &str) -> Result<()> {
        let schema = self.stack[index].schema;
        let size = schema.data_size;
        let ci = schema.case_insensitive(self.config.flags);
        let invalid = || {
            Error::new(ErrorKind::InvalidValue).with_problem(format!(
                "'{value}' is not a valid {}",
                schema.kind.name()
            ))
        };

        match &schema.kind {
            Kind::Int(range) => {
                let number = scalar::parse_int(value).ok_or_else(invalid)?;
                let bounded = !(range.min == 0 && range.max == 0);
                if bounded && (number < range.min || number > range.max) {
                    log!(self.config, Error, "Load: Value {number} out of range");
                    return Err(invalid());
                }
                self.validate(schema, ValueRef::Int(number))?;
                let (block, offset) = self.target(index)?;
                block.write_int(offset, size, number)
            }
            Kind::UInt(range) => {
                let number = scalar::parse_uint(value).ok_or_else(invalid)?;
                let bounded = !(range.min == 0 && range.max == 0);
                if bounded && (number < range.min || number > range.max) {
                    log!(self.config, Error, "Load: Value {number} out of range");
                    return Err(invalid());
                }
                self.validate(schema, ValueRef::UInt(number))?;
                let (block, offset) = self.target(index)?;
                block.write_uint(offset, size, number)
            }
            Kind::Bool => {
                let flag = scalar::parse_bool(value).ok_or_else(invalid)?;
                self.validate(schema, ValueRef::Bool(flag))?;
                let (block, offset) = self.target(index)?;
                block.write_uint(offset, size, u64::from(flag))
            }
            Kind::Enum(values) => {
                let number = match values.find(value, ci) {
                    Some(number) => number,
                    None if schema.is_strict() => {
                        log!(self.config, Error, "Load: Invalid enumeration value: {value}");
                        return Err(invalid());
                    }
                    None => scalar::parse_int(value).ok_or_else(invalid)?,
                };
                self.validate(schema, ValueRef::Int(number))?;
                let (block, offset) = self.target(index)?;
                block.write_int(offset, size, number)
            }
            Kind::Float => {
                let (number, lossy) = scalar::parse_float(value, size).ok_or_else(invalid)?;
                if lossy {
                    if schema.is_strict() {
                        log!(self.config, Error, "Load: Float out of range: {value}");
                        return Err(invalid());
                    }
                    log!(self.config, Warning, "Load: Float out of range: {value}");
                }
                self.validate(schema, ValueRef::Float(number))?;
                let (block, offset) = self.target(index)?;
                block.write_float(offset, size, number)
            }
            Kind::String(limits) => {
                let len = value.len() as u64;
                if len < limits.min {
                    log!(self.config, Error, "Load: String length {len} below minimum {}", limits.min);
                    return Err(ErrorKind::StringLengthMin.into());
                }
                if len > limits.max {
                    log!(self.config, Error, "Load: String length {len} above maximum {}", limits.max);
                    return Err(ErrorKind::StringLengthMax.into());
                }
                self.validate(schema, ValueRef::Str(value))?;
                if schema.is_pointer() {
                    let mut block = memory::allocate(self.config.allocator(), value.len() + 1)?;
                    block.write_bytes(0, value.as_bytes())?;
                    let link = self.stack[index].link;
                    self.attach(link, block)
                } else {
                    let (block, offset) = self.target(index)?;
                    block.write_str(offset, size, value)
                }
            }
            Kind::Binary(limits) => {
                let bytes = scalar::decode_base64(value, limits.max).map_err(|kind| {
                    log!(self.config, Error, "Load: Bad base64 data");
                    Error::new(kind)
                })?;
                if (bytes.len() as u64) < limits.min {
                    log!(self.config, Error, "Load: Binary length {} below minimum", bytes.len());
                    return Err(invalid());
                }
                self.validate(schema, ValueRef::Bytes(&bytes))?;
                let counter = self.stack[index].counter;
                self.write_count(counter, bytes.len() as u64)?;
                if schema.is_pointer() {
                    if bytes.is_empty() {
                        return Ok(());
                    }
                    let block = memory::allocate_copy(self.config.allocator(), &bytes)?;
                    let link = self.stack[index].link;
                    self.attach(link, block)
                } else {
                    let (block, offset) = self.target(index)?;
                    block.write_bytes(offset, &bytes)
                }
            }
            _ => Err(ErrorKind::InternalError.into()),
        }
    }

    fn key(&mut self, index: usize, event: &Event) -> Result<Step> {
        let schema = self.stack[index].schema;
        let ci = schema.case_insensitive(self.config.flags);
        match (&schema.kind, &event.data) {
            (Kind::Mapping(mapping), EventData::Scalar { value: key, .. }) => {
                let Some(field_index) = mapping.find(key, ci) else {
                    return self.unknown_key(index, key);
                };
                let frame = &mut self.stack[index];
                if frame.seen[field_index] {
                    log!(self.config, Error, "Load: Repeated mapping field: {key}");
                    return Err(Error::new(ErrorKind::UnexpectedEvent)
                        .with_problem(format!("repeated mapping field '{key}'")));
                }
                frame.seen[field_index] = true;
                frame.field = Some((field_index, event.mark));
                let (owner, base) = (frame.owner, frame.offset);

                let field = &mapping.fields[field_index];
                let offset = base + field.data_offset;
                let counter = match &field.value.kind {
                    Kind::Sequence(_) => Counter::Field {
                        owner,
                        offset: base + field.count_offset,
                        width: field.count_width,
                    },
                    Kind::Binary(binary) => Counter::Field {
                        owner,
                        offset: base + binary.length.offset,
                        width: binary.length.width,
                    },
                    _ => Counter::None,
                };
                let link = Link::Slot { owner, offset };
                self.push(&field.value, Position::Field, owner, offset, link, counter)?;
                Ok(Step::Done)
            }
            (Kind::Bitfield(bitfield), EventData::Scalar { value: key, .. }) => {
                let Some(region) = bitfield.find(key, ci) else {
                    log!(self.config, Error, "Load: Unknown bit value: {key}");
                    return Err(Error::new(ErrorKind::InvalidValue)
                        .with_problem(format!("unknown bitfield region '{key}'")));
                };
                let frame = &mut self.stack[index];
                if frame.seen[region] {
                    return Err(Error::new(ErrorKind::UnexpectedEvent)
                        .with_problem(format!("repeated bitfield region '{key}'")));
                }
                frame.seen[region] = true;
                frame.field = Some((region, event.mark));
                frame.state = State::BitValue(region);
                Ok(Step::Done)
            }
            (Kind::Mapping(_), EventData::MappingEnd) => self.finish_mapping(index),
            (Kind::Bitfield(_), EventData::MappingEnd) => {
                let value = match self.value_addr(index) {
                    Some(addr) => addr.read_uint(0, schema.data_size)?,
                    None => return Err(ErrorKind::InternalError.into()),
                };
                self.validate(schema, ValueRef::UInt(value))?;
                self.pop()?;
                Ok(Step::Done)
            }
            _ => Err(unexpected(event)),
        }
    }

    fn unknown_key(&mut self, index: usize, key: &str) -> Result<Step> {
        if !self.config.flags.contains(ConfigFlags::IGNORE_UNKNOWN_KEYS) {
            log!(self.config, Error, "Load: Invalid key: {key}");
            return Err(Error::new(ErrorKind::InvalidKey).with_problem(key.to_string()));
        }
        if self.config.flags.contains(ConfigFlags::IGNORED_KEY_WARNING) {
            log!(self.config, Warning, "Load: Ignoring key: {key}");
        } else {
            log!(self.config, Debug, "Load: Ignoring key: {key}");
        }
        self.push(&IGNORED, Position::Field, index, 0, Link::Root, Counter::None)?;
        Ok(Step::Done)
    }

    fn finish_mapping(&mut self, index: usize) -> Result<Step> {
        let schema = self.stack[index].schema;
        let Kind::Mapping(mapping) = &schema.kind else {
            return Err(ErrorKind::InternalError.into());
        };
        let config = self.config;
        let copier = Copier::new(config.allocator());
        for (i, field) in mapping.fields.iter().enumerate() {
            if self.stack[index].seen[i] || matches!(field.value.kind, Kind::Ignore) {
                continue;
            }
            if !field.value.flags.contains(ValueFlags::OPTIONAL) {
                log!(self.config, Error, "Load: Missing required mapping field: {}", field.key);
                return Err(
                    Error::new(ErrorKind::MappingFieldMissing).with_problem(field.key.clone())
                );
            }
            if field.value.missing.is_some() {
                log!(self.config, Debug, "Load: Default for missing field: {}", field.key);
                let (block, base) = self.target(index)?;
                copier.write_missing(field, block, base)?;
            }
        }

        if let Some(validator) = &schema.validator {
            let accepted = match self.value_addr(index) {
                Some(addr) => validator(self.config.context(), schema, ValueRef::Mapping(addr)),
                None => return Err(ErrorKind::InternalError.into()),
            };
            if !accepted {
                log!(self.config, Error, "Load: Validator failed");
                return Err(ErrorKind::InvalidValue.into());
            }
        }
        self.pop()?;
        Ok(Step::Done)
    }

    fn bit_value(&mut self, index: usize, region: usize, event: &Event) -> Result<Step> {
        let schema = self.stack[index].schema;
        let Kind::Bitfield(bitfield) = &schema.kind else {
            return Err(ErrorKind::InternalError.into());
        };
        let EventData::Scalar { value, .. } = &event.data else {
            log!(self.config, Error, "Load: Bitfield values must be scalars");
            return Err(ErrorKind::InvalidValue.into());
        };
        let region = &bitfield.regions[region];
        let number = scalar::parse_uint(value).ok_or_else(|| {
            Error::new(ErrorKind::InvalidValue)
                .with_problem(format!("'{value}' is not a valid bit value"))
        })?;
        let size = schema.data_size;
        let (block, offset) = self.target(index)?;
        let bytes = block
            .as_bytes_mut()
            .get_mut(offset..)
            .ok_or(ErrorKind::InternalError)?;
        crate::data::write_bitfield(bytes, size, region.offset, region.bits, number)?;
        let frame = &mut self.stack[index];
        frame.state = State::Key;
        frame.field = None;
        Ok(Step::Done)
    }

    fn entry(&mut self, index: usize, event: &Event) -> Result<Step> {
        let schema = self.stack[index].schema;
        match (&schema.kind, &event.data) {
            (Kind::Flags(flags), EventData::Scalar { value, .. }) => {
                let ci = schema.case_insensitive(self.config.flags);
                let bit = match flags.find(value, ci) {
                    Some(bit) => bit,
                    None if schema.is_strict() => {
                        log!(self.config, Error, "Load: Unknown flag: {value}");
                        return Err(Error::new(ErrorKind::InvalidValue)
                            .with_problem(format!("unknown flag '{value}'")));
                    }
                    None => scalar::parse_uint(value)
                        .filter(|bit| crate::data::uint_fits(*bit, schema.data_size))
                        .ok_or_else(|| {
                            Error::new(ErrorKind::InvalidValue)
                                .with_problem(format!("unknown flag '{value}'"))
                        })?,
                };
                self.stack[index].flags |= bit;
                Ok(Step::Done)
            }
            (Kind::Flags(_), EventData::SequenceEnd) => {
                let value = self.stack[index].flags;
                self.validate(schema, ValueRef::UInt(value))?;
                let (block, offset) = self.target(index)?;
                block.write_uint(offset, schema.data_size, value)?;
                self.pop()?;
                Ok(Step::Done)
            }
            (Kind::Flags(_), _) => {
                log!(self.config, Error, "Load: Flags must be scalars");
                Err(ErrorKind::InvalidValue.into())
            }
            (
                Kind::Sequence(seq) | Kind::SequenceFixed(seq),
                EventData::Scalar { .. }
                | EventData::SequenceStart { .. }
                | EventData::MappingStart { .. },
            ) => {
                let count = self.stack[index].count;
                if count >= seq.max {
                    log!(self.config, Error, "Load: Excessive entries ({}) in sequence", count + 1);
                    return Err(ErrorKind::SequenceEntriesMax.into());
                }
                let stride = seq.entry.slot_size();
                let slot = usize::try_from(count)
                    .ok()
                    .and_then(|count| count.checked_mul(stride))
                    .ok_or(ErrorKind::SequenceEntriesMax)?;
                if schema.is_pointer() && matches!(schema.kind, Kind::Sequence(_)) {
                    self.reserve_entry(index, slot + stride)?;
                }
                let frame = &mut self.stack[index];
                frame.count += 1;
                frame.entry = Some(event.mark);
                let (owner, offset) = (frame.owner, frame.offset + slot);
                let link = Link::Slot { owner, offset };
                self.push(&seq.entry, Position::Entry, owner, offset, link, Counter::None)?;
                Ok(Step::Redeliver)
            }
            (Kind::Sequence(seq) | Kind::SequenceFixed(seq), EventData::SequenceEnd) => {
                let frame = &self.stack[index];
                let (count, counter) = (frame.count, frame.counter);
                if count < seq.min {
                    log!(self.config, Error, "Load: Insufficient entries ({count}) in sequence, minimum {}", seq.min);
                    return Err(if matches!(schema.kind, Kind::SequenceFixed(_)) {
                        ErrorKind::SequenceFixedCount
                    } else {
                        ErrorKind::SequenceEntriesMin
                    }
                    .into());
                }
                self.write_count(counter, count)?;
                if let Some(validator) = &schema.validator {
                    let data = self.value_addr(index);
                    if !validator(
                        self.config.context(),
                        schema,
                        ValueRef::Sequence { data, count },
                    ) {
                        log!(self.config, Error, "Load: Validator failed");
                        return Err(ErrorKind::InvalidValue.into());
                    }
                }
                self.pop()?;
                Ok(Step::Done)
            }
            _ => Err(unexpected(event)),
        }
    }

    /// Make room for one more entry of a pointer sequence.
    fn reserve_entry(&mut self, index: usize, size: usize) -> Result<()> {
        let allocator = self.config.allocator();
        let frame = &mut self.stack[index];
        match &mut frame.block {
            Some(block) => memory::grow(allocator, block, size)?,
            None => {
                frame.block = Some(memory::allocate(allocator, size)?);
                frame.owner = index;
                frame.offset = 0;
            }
        }
        Ok(())
    }

    fn ignore(&mut self, index: usize, event: &Event) -> Result<Step> {
        let frame = &mut self.stack[index];
        frame.state = State::Ignoring;
        match &event.data {
            EventData::Scalar { .. } => {}
            EventData::SequenceStart { .. } | EventData::MappingStart { .. } => frame.depth += 1,
            EventData::SequenceEnd | EventData::MappingEnd if frame.depth > 0 => frame.depth -= 1,
            _ => return Err(unexpected(event)),
        }
        if frame.depth == 0 {
            self.pop()?;
        }
        Ok(Step::Done)
    }

    /// The enclosing fields and entries of the innermost value, innermost
    /// first.
    fn backtrace(&self) -> Vec<PathEntry> {
        let mut path = Vec::new();
        for frame in self.stack.iter().rev() {
            match (&frame.schema.kind, frame.field, frame.entry) {
                (Kind::Mapping(mapping), Some((field, mark)), _) => path.push(PathEntry::Field {
                    name: mapping.fields[field].key.clone(),
                    mark: Some(mark),
                }),
                (Kind::Bitfield(bitfield), Some((region, mark)), _) => {
                    path.push(PathEntry::Field {
                        name: bitfield.regions[region].name.clone(),
                        mark: Some(mark),
                    });
                }
                (Kind::Sequence(_) | Kind::SequenceFixed(_), _, Some(mark)) => {
                    path.push(PathEntry::Entry {
                        index: frame.count.saturating_sub(1),
                        mark: Some(mark),
                    });
                }
                _ => {}
            }
        }
        path
    }

    /// Release everything built so far and decorate `err` with where it
    /// happened.
    fn unwind(&mut self, err: Error) -> Error {
        let err = err.with_backtrace(self.backtrace());
        self.config.log_failure("Load", &err);
        let allocator = self.config.allocator();
        while let Some(frame) = self.stack.pop() {
            if let Some(block) = frame.block {
                memory::release(allocator, block);
            }
        }
        if let Some(root) = self.root.take() {
            memory::release(allocator, root);
        }
        self.reader.reset_anchors();
        err
    }
}

fn starts_value(event: &Event) -> bool {
    matches!(
        event.data,
        EventData::Scalar { .. } | EventData::SequenceStart { .. } | EventData::MappingStart { .. }
    )
}

fn unexpected(event: &Event) -> Error {
    Error::new(ErrorKind::UnexpectedEvent).with_problem(String::from(event.data.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, UNLIMITED};
    use pretty_assertions::assert_eq;

    fn point() -> Schema {
        Schema::mapping(
            8,
            vec![
                Field::new("x", 0, Schema::int(4)),
                Field::new("y", 4, Schema::int(4)),
            ],
        )
        .with_flags(ValueFlags::POINTER)
    }

    #[test]
    fn binds_a_mapping() {
        let config = Config::new();
        let value = load_bytes(b"x: 1\ny: -2\n", &config, &point(), None)
            .unwrap()
            .unwrap();
        assert_eq!(value.read_int(0, 4).unwrap(), 1);
        assert_eq!(value.read_int(4, 4).unwrap(), -2);
    }

    #[test]
    fn keys_may_come_in_any_order() {
        let config = Config::new();
        let value = load_bytes(b"{y: 5, x: 6}", &config, &point(), None)
            .unwrap()
            .unwrap();
        assert_eq!(value.read_int(0, 4).unwrap(), 6);
        assert_eq!(value.read_int(4, 4).unwrap(), 5);
    }

    #[test]
    fn repeated_key_is_rejected() {
        let config = Config::new();
        let err = load_bytes(b"x: 1\nx: 2\ny: 3\n", &config, &point(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEvent);
    }

    #[test]
    fn root_must_be_a_pointer() {
        let config = Config::new();
        let err = load_bytes(b"1", &config, &Schema::int(4), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopLevelNonPtr);
    }

    #[test]
    fn root_sequence_reports_its_count() {
        let config = Config::new();
        let schema = Schema::sequence(Schema::int(2), 0, UNLIMITED).with_flags(ValueFlags::POINTER);
        let mut count = 0;
        let value = load_bytes(b"[3, 4, 5]", &config, &schema, Some(&mut count))
            .unwrap()
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(value.len(), 6);
        assert_eq!(value.read_int(4, 2).unwrap(), 5);

        let err = load_bytes(b"[3]", &config, &schema, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParamSeqCount);
    }

    #[test]
    fn empty_pointer_sequence_stays_null() {
        let config = Config::new();
        let schema = Schema::sequence(Schema::int(2), 0, UNLIMITED).with_flags(ValueFlags::POINTER);
        let mut count = 9;
        let value = load_bytes(b"[]", &config, &schema, Some(&mut count)).unwrap();
        assert!(value.is_none());
        assert_eq!(count, 0);
    }

    #[test]
    fn nesting_is_bounded() {
        let config = Config::new().with_flags(ConfigFlags::IGNORE_UNKNOWN_KEYS);
        let mut input = String::from("other: ");
        let schema = Schema::mapping(4, vec![Field::new("x", 0, Schema::int(4))])
            .with_flags(ValueFlags::POINTER);
        input.push_str(&"[".repeat(10));
        input.push_str(&"]".repeat(10));
        input.push_str("\nx: 1\n");
        let value = load_bytes(input.as_bytes(), &config, &schema, None)
            .unwrap()
            .unwrap();
        assert_eq!(value.read_int(0, 4).unwrap(), 1);

        let mut nested = Schema::int(4).with_flags(ValueFlags::POINTER);
        for _ in 0..MAX_DEPTH {
            nested = Schema::mapping(8, vec![Field::new("a", 0, nested)])
                .with_flags(ValueFlags::POINTER);
        }
        let input = "{a: ".repeat(MAX_DEPTH) + "1" + &"}".repeat(MAX_DEPTH);
        let err = load_bytes(input.as_bytes(), &config, &nested, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEvent);
    }

    #[test]
    fn backtrace_names_the_field() {
        let config = Config::new();
        let schema = Schema::mapping(
            8,
            vec![Field::new("inner", 0, point())],
        )
        .with_flags(ValueFlags::POINTER);
        let err = load_bytes(b"inner:\n  x: 1\n  y: nope\n", &config, &schema, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let names: Vec<_> = err
            .backtrace()
            .iter()
            .map(|entry| match entry {
                PathEntry::Field { name, .. } => name.as_str(),
                PathEntry::Entry { .. } => "#",
            })
            .collect();
        assert_eq!(names, ["y", "inner"]);
        assert_eq!(
            err.backtrace()[0],
            PathEntry::Field {
                name: "y".into(),
                mark: Some(Mark { line: 2, column: 2 }),
            }
        );
    }
}
