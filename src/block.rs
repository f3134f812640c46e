use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::data;
use crate::{ErrorKind, Result};

/// Width in bytes that a pointer slot takes up inside its parent's layout.
pub const POINTER_SIZE: usize = 8;

/// One allocation in a bound data tree.
///
/// A block is a run of bytes laid out the way the schema describes it, plus
/// the blocks owned by the pointer slots inside those bytes, keyed by the
/// slot's byte offset. A pointer slot is null when no child is stored at its
/// offset; the slot's own bytes are never interpreted.
///
/// Blocks produced by [`load_bytes()`](crate::load_bytes) and
/// [`copy()`](crate::copy) come from the configured
/// [`Allocator`](crate::Allocator) and should be handed back with
/// [`free()`](crate::free).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    bytes: Vec<u8>,
    children: BTreeMap<usize, Block>,
}

impl Block {
    /// A zeroed block of `size` bytes.
    pub fn new(size: usize) -> Self {
        Block::from_bytes(alloc::vec![0; size])
    }

    /// A block holding exactly `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Block {
            bytes,
            children: BTreeMap::new(),
        }
    }

    /// A block holding `value` followed by a NUL terminator, as pointer
    /// strings are stored.
    pub fn string(value: &str) -> Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Block::from_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// The block owned by the pointer slot at `offset`, or `None` if the
    /// slot is null.
    pub fn child(&self, offset: usize) -> Option<&Block> {
        self.children.get(&offset)
    }

    pub fn child_mut(&mut self, offset: usize) -> Option<&mut Block> {
        self.children.get_mut(&offset)
    }

    /// Point the slot at `offset` to `child`, returning the previous target.
    pub fn set_child(&mut self, offset: usize, child: Block) -> Option<Block> {
        self.children.insert(offset, child)
    }

    /// Null the slot at `offset`, returning what it pointed to.
    pub fn take_child(&mut self, offset: usize) -> Option<Block> {
        self.children.remove(&offset)
    }

    /// All non-null pointer slots, in offset order.
    pub fn children(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.children.iter().map(|(offset, child)| (*offset, child))
    }

    pub fn read_int(&self, offset: usize, width: usize) -> Result<i64> {
        data::read_int(self.tail(offset)?, width)
    }

    pub fn read_uint(&self, offset: usize, width: usize) -> Result<u64> {
        data::read_uint(self.tail(offset)?, width)
    }

    pub fn read_float(&self, offset: usize, width: usize) -> Result<f64> {
        data::read_float(self.tail(offset)?, width)
    }

    pub fn read_bool(&self, offset: usize, width: usize) -> Result<bool> {
        Ok(self.read_uint(offset, width)? != 0)
    }

    pub fn write_int(&mut self, offset: usize, width: usize, value: i64) -> Result<()> {
        data::write_int(self.tail_mut(offset)?, width, value)
    }

    pub fn write_uint(&mut self, offset: usize, width: usize, value: u64) -> Result<()> {
        data::write_uint(self.tail_mut(offset)?, width, value)
    }

    pub fn write_float(&mut self, offset: usize, width: usize, value: f64) -> Result<()> {
        data::write_float(self.tail_mut(offset)?, width, value)
    }

    /// The NUL-terminated UTF-8 string starting at `offset`.
    pub fn read_str(&self, offset: usize) -> Result<&str> {
        let tail = self.tail(offset)?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ErrorKind::InvalidValue)?;
        core::str::from_utf8(&tail[..len]).map_err(|_| ErrorKind::InvalidValue.into())
    }

    /// The whole block read as a NUL-terminated string.
    pub fn as_str(&self) -> Result<&str> {
        self.read_str(0)
    }

    /// Store `value` plus a terminator at `offset`, within `capacity` bytes.
    pub fn write_str(&mut self, offset: usize, capacity: usize, value: &str) -> Result<()> {
        if value.len() >= capacity {
            return Err(ErrorKind::StringLengthMax.into());
        }
        let out = self
            .bytes
            .get_mut(offset..offset + capacity)
            .ok_or(ErrorKind::InternalError)?;
        out.fill(0);
        out[..value.len()].copy_from_slice(value.as_bytes());
        Ok(())
    }

    /// Copy `src` into this block at `offset`.
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.bytes
            .get_mut(offset..offset + src.len())
            .ok_or(ErrorKind::InternalError)?
            .copy_from_slice(src);
        Ok(())
    }

    /// The `len` bytes at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.bytes
            .get(offset..offset + len)
            .ok_or_else(|| ErrorKind::InternalError.into())
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, BTreeMap<usize, Block>) {
        (self.bytes, self.children)
    }

    pub(crate) fn bytes_vec_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Remove every child at an offset in `start..end`.
    pub(crate) fn take_children_in(&mut self, start: usize, end: usize) -> Vec<(usize, Block)> {
        let offsets: Vec<usize> = self.children.range(start..end).map(|(o, _)| *o).collect();
        offsets
            .into_iter()
            .filter_map(|offset| self.children.remove(&offset).map(|child| (offset, child)))
            .collect()
    }

    fn tail(&self, offset: usize) -> Result<&[u8]> {
        self.bytes
            .get(offset..)
            .ok_or_else(|| ErrorKind::InternalError.into())
    }

    fn tail_mut(&mut self, offset: usize) -> Result<&mut [u8]> {
        self.bytes
            .get_mut(offset..)
            .ok_or_else(|| ErrorKind::InternalError.into())
    }
}

impl From<&str> for Block {
    fn from(value: &str) -> Self {
        Block::string(value)
    }
}

impl From<String> for Block {
    fn from(value: String) -> Self {
        Block::string(&value)
    }
}

/// A position inside a block: the address of one value.
#[derive(Clone, Copy, Debug)]
pub struct Addr<'a> {
    block: &'a Block,
    offset: usize,
}

impl<'a> Addr<'a> {
    pub fn new(block: &'a Block, offset: usize) -> Self {
        Addr { block, offset }
    }

    pub fn block(&self) -> &'a Block {
        self.block
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The address `delta` bytes further on.
    pub fn at(&self, delta: usize) -> Addr<'a> {
        Addr::new(self.block, self.offset + delta)
    }

    pub fn read_int(&self, delta: usize, width: usize) -> Result<i64> {
        self.block.read_int(self.offset + delta, width)
    }

    pub fn read_uint(&self, delta: usize, width: usize) -> Result<u64> {
        self.block.read_uint(self.offset + delta, width)
    }

    pub fn read_float(&self, delta: usize, width: usize) -> Result<f64> {
        self.block.read_float(self.offset + delta, width)
    }

    pub fn read_bool(&self, delta: usize, width: usize) -> Result<bool> {
        self.block.read_bool(self.offset + delta, width)
    }

    pub fn read_str(&self, delta: usize) -> Result<&'a str> {
        self.block.read_str(self.offset + delta)
    }

    /// The block owned by the pointer slot `delta` bytes further on.
    pub fn child(&self, delta: usize) -> Option<&'a Block> {
        self.block.child(self.offset + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_carry_a_terminator() {
        let block = Block::string("hello");
        assert_eq!(block.len(), 6);
        assert_eq!(block.as_str().unwrap(), "hello");
    }

    #[test]
    fn inline_strings_respect_capacity() {
        let mut block = Block::new(8);
        block.write_str(2, 4, "abc").unwrap();
        assert_eq!(block.read_str(2).unwrap(), "abc");
        let err = block.write_str(2, 4, "abcd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StringLengthMax);
    }

    #[test]
    fn children_are_keyed_by_offset() {
        let mut block = Block::new(24);
        assert!(block.child(8).is_none());
        block.set_child(8, Block::string("x"));
        block.set_child(16, Block::string("y"));
        let offsets: Vec<_> = block.children().map(|(o, _)| o).collect();
        assert_eq!(offsets, [8, 16]);

        let taken = block.take_children_in(0, 12);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].1.as_str().unwrap(), "x");
        assert_eq!(block.children().count(), 1);
    }

    #[test]
    fn addresses_are_relative() {
        let mut block = Block::new(16);
        block.write_uint(10, 2, 513).unwrap();
        block.set_child(4, Block::string("z"));
        let addr = Addr::new(&block, 4);
        assert_eq!(addr.read_uint(6, 2).unwrap(), 513);
        assert_eq!(addr.child(0).unwrap().as_str().unwrap(), "z");
        assert_eq!(addr.at(6).offset(), 10);
    }
}
