use alloc::vec::Vec;

use crate::{Block, ErrorKind, Result};

/// Supplies and reclaims the byte buffers behind every [`Block`] the engine
/// creates.
///
/// Methods take `&self`, as `GlobalAlloc` does; implementations that keep
/// statistics need interior mutability.
pub trait Allocator: Send + Sync {
    /// Allocate `size` zeroed bytes, or `None` if out of memory.
    fn allocate(&self, size: usize) -> Option<Vec<u8>>;

    /// Resize `block` to `size` bytes, zero-filling any growth. On failure
    /// `block` must be left untouched and `false` returned.
    fn reallocate(&self, block: &mut Vec<u8>, size: usize) -> bool {
        block.resize(size, 0);
        true
    }

    /// Give `block` back.
    fn release(&self, block: Vec<u8>) {
        drop(block);
    }
}

/// The global heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAllocator;

impl Allocator for DefaultAllocator {
    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        Some(alloc::vec![0; size])
    }
}

pub(crate) fn allocate(allocator: &dyn Allocator, size: usize) -> Result<Block> {
    match allocator.allocate(size) {
        Some(bytes) if bytes.len() == size => Ok(Block::from_bytes(bytes)),
        Some(bytes) => {
            allocator.release(bytes);
            Err(ErrorKind::InternalError.into())
        }
        None => Err(ErrorKind::Oom.into()),
    }
}

pub(crate) fn allocate_copy(allocator: &dyn Allocator, src: &[u8]) -> Result<Block> {
    let mut block = allocate(allocator, src.len())?;
    block.as_bytes_mut().copy_from_slice(src);
    Ok(block)
}

pub(crate) fn grow(allocator: &dyn Allocator, block: &mut Block, size: usize) -> Result<()> {
    if allocator.reallocate(block.bytes_vec_mut(), size) {
        Ok(())
    } else {
        Err(ErrorKind::Oom.into())
    }
}

/// Release `block` and everything reachable from it.
pub(crate) fn release(allocator: &dyn Allocator, block: Block) {
    let mut pending = alloc::vec![block];
    while let Some(block) = pending.pop() {
        let (bytes, children) = block.into_parts();
        pending.extend(children.into_values());
        allocator.release(bytes);
    }
}

/// Release every child of `block` but keep its bytes.
pub(crate) fn release_children(allocator: &dyn Allocator, block: &mut Block) {
    for (_, child) in block.take_children_in(0, usize::MAX) {
        release(allocator, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        live: AtomicUsize,
    }

    impl Allocator for Counting {
        fn allocate(&self, size: usize) -> Option<Vec<u8>> {
            self.live.fetch_add(1, Ordering::SeqCst);
            Some(alloc::vec![0; size])
        }

        fn release(&self, _block: Vec<u8>) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct Exhausted;

    impl Allocator for Exhausted {
        fn allocate(&self, _size: usize) -> Option<Vec<u8>> {
            None
        }

        fn reallocate(&self, _block: &mut Vec<u8>, _size: usize) -> bool {
            false
        }
    }

    #[test]
    fn release_walks_the_whole_tree() {
        let counting = Counting::default();
        let mut root = allocate(&counting, 16).unwrap();
        let mut child = allocate(&counting, 8).unwrap();
        child.set_child(0, allocate_copy(&counting, b"hi\0").unwrap());
        root.set_child(8, child);
        assert_eq!(counting.live.load(Ordering::SeqCst), 3);

        release(&counting, root);
        assert_eq!(counting.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn release_children_keeps_the_parent() {
        let counting = Counting::default();
        let mut root = Block::new(16);
        root.set_child(0, allocate(&counting, 4).unwrap());
        release_children(&counting, &mut root);
        assert_eq!(counting.live.load(Ordering::SeqCst), 0);
        assert_eq!(root.len(), 16);
        assert!(root.child(0).is_none());
    }

    #[test]
    fn failures_are_oom() {
        assert_eq!(allocate(&Exhausted, 4).unwrap_err().kind(), ErrorKind::Oom);
        let mut block = Block::new(4);
        assert_eq!(
            grow(&Exhausted, &mut block, 8).unwrap_err().kind(),
            ErrorKind::Oom
        );
        assert_eq!(block.len(), 4);
    }
}
