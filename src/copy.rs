use crate::block::{Addr, Block};
use crate::memory::{self, Allocator};
use crate::schema::{Kind, Missing, Position};
use crate::{Config, ErrorKind, Field, PathEntry, Result, Schema};

/// Deep-copy `value`.
///
/// For a pointer root the copy is allocated and returned; `target` must be
/// `None`. Otherwise `value` is copied into the caller's `target`, which must
/// be at least as large as the root value, and `Ok(None)` is returned.
///
/// `seq_count` is the entry count of a root [`Kind::Sequence`], and must be
/// `None` for any other root.
pub fn copy(
    config: &Config,
    schema: &Schema,
    value: Option<&Block>,
    seq_count: Option<u64>,
    target: Option<&mut Block>,
) -> Result<Option<Block>> {
    let copier = Copier::new(config.allocator());
    let result = copier.copy_root(schema, value, seq_count, target);
    if let Err(err) = &result {
        config.log_failure("Copy", err);
    }
    result
}

pub(crate) struct Copier<'a> {
    allocator: &'a dyn Allocator,
}

impl<'a> Copier<'a> {
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Copier { allocator }
    }

    fn copy_root(
        &self,
        schema: &Schema,
        value: Option<&Block>,
        seq_count: Option<u64>,
        target: Option<&mut Block>,
    ) -> Result<Option<Block>> {
        crate::check_seq_count(schema, seq_count.is_some())?;
        let count = seq_count.unwrap_or(0);
        schema.check(Position::Root)?;

        if schema.is_pointer() {
            if target.is_some() {
                return Err(ErrorKind::DataTargetNonNull.into());
            }
            return match value {
                Some(value) => self.copy_target(schema, value, count).map(Some),
                None if schema.is_nullable() => Ok(None),
                None => Err(ErrorKind::BadParamNullData.into()),
            };
        }

        let (Some(value), Some(target)) = (value, target) else {
            return Err(ErrorKind::BadParamNullData.into());
        };
        let size = schema.footprint();
        if target.len() < size {
            return Err(ErrorKind::InvalidDataSize.into());
        }
        target.write_bytes(0, value.slice(0, size)?)?;
        if let Err(err) = self.copy_owned(schema, Addr::new(value, 0), target, 0, count) {
            memory::release_children(self.allocator, target);
            target.as_bytes_mut()[..size].fill(0);
            return Err(err);
        }
        Ok(None)
    }

    /// Duplicate the block a pointer slot owns, with everything under it.
    pub fn copy_target(&self, schema: &Schema, src: &Block, count: u64) -> Result<Block> {
        let mut dst = memory::allocate_copy(self.allocator, src.as_bytes())?;
        match self.copy_owned(schema, Addr::new(src, 0), &mut dst, 0, count) {
            Ok(()) => Ok(dst),
            Err(err) => {
                memory::release(self.allocator, dst);
                Err(err)
            }
        }
    }

    /// Duplicate the allocations owned by a value whose bytes have already
    /// been copied to `dst` at `offset`.
    pub fn copy_owned(
        &self,
        schema: &Schema,
        src: Addr<'_>,
        dst: &mut Block,
        offset: usize,
        count: u64,
    ) -> Result<()> {
        match &schema.kind {
            Kind::Mapping(mapping) => {
                for field in &mapping.fields {
                    if matches!(field.value.kind, Kind::Ignore) {
                        continue;
                    }
                    let count = field_count(field, src);
                    self.copy_slot(
                        &field.value,
                        Position::Field,
                        src.at(field.data_offset),
                        dst,
                        offset + field.data_offset,
                        count,
                    )
                    .map_err(|err| {
                        err.within(PathEntry::Field {
                            name: field.key.clone(),
                            mark: None,
                        })
                    })?;
                }
            }
            Kind::Sequence(seq) | Kind::SequenceFixed(seq) => {
                let stride = seq.entry.slot_size();
                let entries = entry_count(schema, count, src, stride);
                for index in 0..entries {
                    let at = index as usize * stride;
                    self.copy_slot(&seq.entry, Position::Entry, src.at(at), dst, offset + at, 0)
                        .map_err(|err| err.within(PathEntry::Entry { index, mark: None }))?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn copy_slot(
        &self,
        schema: &Schema,
        position: Position,
        src: Addr<'_>,
        dst: &mut Block,
        offset: usize,
        count: u64,
    ) -> Result<()> {
        schema.check(position)?;
        if !schema.is_pointer() {
            return self.copy_owned(schema, src, dst, offset, count);
        }
        if let Some(child) = src.child(0) {
            let copied = self.copy_target(schema, child, count)?;
            if let Some(stale) = dst.set_child(offset, copied) {
                memory::release(self.allocator, stale);
            }
        }
        Ok(())
    }

    /// Store an absent field's default at `offset` in `dst`, the block
    /// holding the enclosing mapping at `base`.
    pub fn write_missing(&self, field: &Field, dst: &mut Block, base: usize) -> Result<()> {
        let schema = &field.value;
        let Some(missing) = &schema.missing else {
            return Ok(());
        };
        let offset = base + field.data_offset;
        let size = schema.data_size;

        if let Missing::Data(template) = missing {
            return self.place(schema, dst, offset, template.as_bytes(), Addr::new(template, 0), 0);
        }
        if let Missing::Sequence(default) = missing {
            let (Kind::Sequence(seq) | Kind::SequenceFixed(seq)) = &schema.kind else {
                return Err(ErrorKind::BadTypeInSchema.into());
            };
            let len = default.count as usize * seq.entry.slot_size();
            let bytes = default.data.slice(0, len)?;
            if matches!(schema.kind, Kind::Sequence(_)) {
                dst.write_uint(base + field.count_offset, field.count_width, default.count)?;
            }
            if default.count == 0 {
                return Ok(());
            }
            return self.place(schema, dst, offset, bytes, Addr::new(&default.data, 0), default.count);
        }

        let mut scratch;
        let (target, at) = if schema.is_pointer() {
            let size = match missing {
                Missing::Str(value) => value.len() + 1,
                Missing::Bytes(value) => value.len(),
                _ => size,
            };
            scratch = memory::allocate(self.allocator, size)?;
            (&mut scratch, 0)
        } else {
            scratch = Block::default();
            (&mut *dst, offset)
        };
        let written = match missing {
            Missing::Int(value) => target.write_int(at, size, *value),
            Missing::UInt(value) => target.write_uint(at, size, *value),
            Missing::Bool(value) => target.write_uint(at, size, u64::from(*value)),
            Missing::Float(value) => target.write_float(at, size, *value),
            Missing::Str(value) if schema.is_pointer() => target.write_bytes(at, value.as_bytes()),
            Missing::Str(value) => target.write_str(at, size, value),
            Missing::Bytes(value) => target.write_bytes(at, value),
            Missing::Data(_) | Missing::Sequence(_) => Err(ErrorKind::InternalError.into()),
        };
        if let Err(err) = written {
            if schema.is_pointer() {
                memory::release(self.allocator, scratch);
            }
            return Err(err);
        }
        if let (Missing::Bytes(value), Kind::Binary(binary)) = (missing, &schema.kind) {
            dst.write_uint(
                base + binary.length.offset,
                binary.length.width,
                value.len() as u64,
            )?;
        }
        if schema.is_pointer() {
            if let Some(stale) = dst.set_child(offset, scratch) {
                memory::release(self.allocator, stale);
            }
        }
        Ok(())
    }

    /// Put a copy of `bytes` (the value at `src`) into the slot at `offset`.
    fn place(
        &self,
        schema: &Schema,
        dst: &mut Block,
        offset: usize,
        bytes: &[u8],
        src: Addr<'_>,
        count: u64,
    ) -> Result<()> {
        if schema.is_pointer() {
            let mut child = memory::allocate_copy(self.allocator, bytes)?;
            if let Err(err) = self.copy_owned(schema, src, &mut child, 0, count) {
                memory::release(self.allocator, child);
                return Err(err);
            }
            if let Some(stale) = dst.set_child(offset, child) {
                memory::release(self.allocator, stale);
            }
            Ok(())
        } else {
            let len = bytes.len().min(schema.footprint());
            dst.write_bytes(offset, &bytes[..len])?;
            self.copy_owned(schema, src, dst, offset, count)
        }
    }
}

/// The entry count stored alongside a dynamic sequence field.
pub(crate) fn field_count(field: &Field, record: Addr<'_>) -> u64 {
    match field.value.kind {
        Kind::Sequence(_) => record
            .read_uint(field.count_offset, field.count_width)
            .unwrap_or(0),
        _ => 0,
    }
}

/// How many entries of a sequence value are present and addressable.
pub(crate) fn entry_count(schema: &Schema, count: u64, data: Addr<'_>, stride: usize) -> u64 {
    let count = match &schema.kind {
        Kind::SequenceFixed(seq) => seq.max,
        _ => count,
    };
    if stride == 0 {
        return 0;
    }
    let room = data.block().len().saturating_sub(data.offset()) / stride;
    count.min(room as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LengthField, ValueFlags, UNLIMITED};
    use alloc::vec;

    fn record() -> Schema {
        Schema::mapping(
            24,
            vec![
                Field::new("id", 0, Schema::uint(4)),
                Field::new("name", 8, Schema::string(0, UNLIMITED)),
                Field::sequence(
                    "tags",
                    16,
                    4,
                    4,
                    Schema::sequence(Schema::string(0, UNLIMITED), 0, UNLIMITED)
                        .with_flags(ValueFlags::POINTER),
                ),
            ],
        )
        .with_flags(ValueFlags::POINTER)
    }

    fn sample() -> Block {
        let mut root = Block::new(24);
        root.write_uint(0, 4, 7).unwrap();
        root.set_child(8, Block::string("seven"));
        root.write_uint(4, 4, 2).unwrap();
        let mut tags = Block::new(16);
        tags.set_child(0, Block::string("a"));
        tags.set_child(8, Block::string("b"));
        root.set_child(16, tags);
        root
    }

    #[test]
    fn pointer_root_is_duplicated() {
        let config = Config::new();
        let original = sample();
        let copied = copy(&config, &record(), Some(&original), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(copied, original);
        assert_eq!(
            copied.child(16).unwrap().child(8).unwrap().as_str().unwrap(),
            "b"
        );
    }

    #[test]
    fn pointer_root_refuses_target() {
        let config = Config::new();
        let mut target = Block::new(24);
        let err = copy(&config, &record(), Some(&sample()), None, Some(&mut target)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataTargetNonNull);
    }

    #[test]
    fn inline_root_copies_into_target() {
        let config = Config::new();
        let mut schema = record();
        schema.flags = ValueFlags::empty();
        let mut target = Block::new(24);
        let result = copy(&config, &schema, Some(&sample()), None, Some(&mut target)).unwrap();
        assert!(result.is_none());
        assert_eq!(target, sample());

        let err = copy(&config, &schema, Some(&sample()), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParamNullData);
    }

    #[test]
    fn missing_scalars_and_strings() {
        let copier = Copier::new(&crate::DefaultAllocator);
        let mut dst = Block::new(16);
        let int = Field::new("n", 0, Schema::int(4).with_missing(Missing::Int(42)));
        copier.write_missing(&int, &mut dst, 0).unwrap();
        assert_eq!(dst.read_int(0, 4).unwrap(), 42);

        let text = Field::new(
            "s",
            8,
            Schema::string(0, UNLIMITED).with_missing(Missing::Str("hi".into())),
        );
        copier.write_missing(&text, &mut dst, 0).unwrap();
        assert_eq!(dst.child(8).unwrap().as_str().unwrap(), "hi");

        let inline = Field::new(
            "i",
            4,
            Schema::inline_string(4, 0).with_missing(Missing::Str("ab".into())),
        );
        copier.write_missing(&inline, &mut dst, 0).unwrap();
        assert_eq!(dst.read_str(4).unwrap(), "ab");
    }

    #[test]
    fn missing_binary_sets_length() {
        let copier = Copier::new(&crate::DefaultAllocator);
        let mut dst = Block::new(16);
        let field = Field::new(
            "b",
            0,
            Schema::binary(0, 8, LengthField { offset: 8, width: 2 })
                .with_missing(Missing::Bytes(vec![1, 2, 3])),
        );
        copier.write_missing(&field, &mut dst, 0).unwrap();
        assert_eq!(dst.child(0).unwrap().as_bytes(), [1, 2, 3]);
        assert_eq!(dst.read_uint(8, 2).unwrap(), 3);
    }
}
