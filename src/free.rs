use crate::block::Block;
use crate::copy::{entry_count, field_count};
use crate::memory::{self, Allocator};
use crate::schema::Kind;
use crate::{Addr, Config, Result, Schema};

/// Release `value` and every allocation reachable from it.
///
/// `seq_count` is the entry count of a root [`Kind::Sequence`]. Passing
/// `None` for `value` is a no-op. For a non-pointer root only the owned
/// allocations are released; the root's own bytes stay with the caller.
pub fn free(
    config: &Config,
    schema: &Schema,
    value: Option<Block>,
    seq_count: Option<u64>,
) -> Result<()> {
    let Some(mut value) = value else {
        return Ok(());
    };
    let allocator = config.allocator();
    if let Err(err) = crate::check_seq_count(schema, seq_count.is_some()) {
        config.log_failure("Free", &err);
        memory::release(allocator, value);
        return Err(err);
    }

    let freer = Freer { config, allocator };
    freer.free_owned(schema, &mut value, 0, seq_count.unwrap_or(0));
    if schema.is_pointer() {
        log!(config, Debug, "Free: Freeing {}", schema.kind.name());
        memory::release(allocator, value);
    } else {
        memory::release_children(allocator, &mut value);
    }
    Ok(())
}

struct Freer<'a> {
    config: &'a Config,
    allocator: &'a dyn Allocator,
}

impl Freer<'_> {
    /// Release the allocations owned by the value at `offset` in `block`.
    fn free_owned(&self, schema: &Schema, block: &mut Block, offset: usize, count: u64) {
        match &schema.kind {
            Kind::Mapping(mapping) => {
                for field in &mapping.fields {
                    let count = field_count(field, Addr::new(block, offset));
                    self.free_slot(&field.value, block, offset + field.data_offset, count);
                }
            }
            Kind::Sequence(seq) | Kind::SequenceFixed(seq) => {
                let stride = seq.entry.slot_size();
                let entries = entry_count(schema, count, Addr::new(block, offset), stride);
                for index in 0..entries {
                    let at = offset + index as usize * stride;
                    self.free_slot(&seq.entry, block, at, 0);
                }
            }
            _ => {}
        }
    }

    fn free_slot(&self, schema: &Schema, block: &mut Block, offset: usize, count: u64) {
        if !schema.is_pointer() {
            self.free_owned(schema, block, offset, count);
            return;
        }
        if let Some(mut child) = block.take_child(offset) {
            self.free_owned(schema, &mut child, 0, count);
            log!(self.config, Debug, "Free: Freeing {}", schema.kind.name());
            memory::release(self.allocator, child);
        }
    }
}
