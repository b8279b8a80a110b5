// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The memory pool manager.
//!
//! Single-unit allocations dominate the engine (object headers, float
//! cells), so freed chunks of that size are kept on an intrusive free list
//! and served in O(1) without touching the block allocator. Chunks must be
//! freed with the size they were allocated with; the pool never merges or
//! splits chunks.

use core::ptr::NonNull;

use crate::heap::allocator::HeapAllocator;

/// Size of a pool chunk in bytes.
pub(crate) const POOL_CHUNK_SIZE: usize = 8;

/// A free chunk, linked through its own storage.
#[repr(C)]
struct PoolChunk {
    next: Option<NonNull<PoolChunk>>,
}

pub(crate) struct Pools {
    free_chunks: Option<NonNull<PoolChunk>>,
}

impl Pools {
    pub(crate) fn new() -> Pools {
        Pools { free_chunks: None }
    }

    /// Pop a free chunk, if one is cached. The chunk's contents are
    /// undefined.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let chunk = self.free_chunks?;
        // SAFETY: every pointer on the list was pushed as a live chunk of
        // POOL_CHUNK_SIZE bytes inside the arena.
        self.free_chunks = unsafe { chunk.as_ref().next };
        Some(chunk.cast())
    }

    /// Push a chunk onto the free list without returning it to the block
    /// allocator. `size` must match the allocation size.
    #[inline]
    pub(crate) fn push(&mut self, ptr: NonNull<u8>, size: usize) {
        debug_assert!(size <= POOL_CHUNK_SIZE);
        let mut chunk = ptr.cast::<PoolChunk>();
        // SAFETY: ptr is a live arena block of at least POOL_CHUNK_SIZE
        // bytes that the caller relinquishes.
        unsafe {
            chunk.as_mut().next = self.free_chunks;
        }
        self.free_chunks = Some(chunk);
    }

    /// Return every cached chunk to the block allocator. Run by the garbage
    /// collector after major reclamations.
    pub(crate) fn collect_empty(&mut self, allocator: &mut HeapAllocator) {
        let mut chunk = self.free_chunks.take();
        while let Some(current) = chunk {
            // SAFETY: list members are live chunks; read the link before the
            // storage is handed back.
            chunk = unsafe { current.as_ref().next };
            allocator.free(current.cast(), POOL_CHUNK_SIZE);
        }
    }

    /// Collect all chunks and verify nothing is left cached.
    pub(crate) fn finalize(&mut self, allocator: &mut HeapAllocator) {
        self.collect_empty(allocator);
        debug_assert!(self.free_chunks.is_none());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_chunks_are_reused_most_recent_first() {
        let mut allocator = HeapAllocator::new();
        let mut pools = Pools::new();

        let a = allocator.alloc_inner(POOL_CHUNK_SIZE).unwrap();
        let b = allocator.alloc_inner(POOL_CHUNK_SIZE).unwrap();
        pools.push(a, POOL_CHUNK_SIZE);
        pools.push(b, POOL_CHUNK_SIZE);

        assert_eq!(pools.pop().unwrap().as_ptr(), b.as_ptr());
        assert_eq!(pools.pop().unwrap().as_ptr(), a.as_ptr());
        assert!(pools.pop().is_none());

        allocator.free(a, POOL_CHUNK_SIZE);
        allocator.free(b, POOL_CHUNK_SIZE);
        assert_eq!(allocator.allocated_size(), 0);
    }

    #[test]
    fn collect_empty_returns_chunks_to_the_allocator() {
        let mut allocator = HeapAllocator::new();
        let mut pools = Pools::new();

        for _ in 0..32 {
            let chunk = allocator.alloc_inner(POOL_CHUNK_SIZE).unwrap();
            pools.push(chunk, POOL_CHUNK_SIZE);
        }
        assert_eq!(allocator.allocated_size(), 32 * POOL_CHUNK_SIZE);

        pools.finalize(&mut allocator);
        assert_eq!(allocator.allocated_size(), 0);
        allocator.validate_free_list();
    }
}
