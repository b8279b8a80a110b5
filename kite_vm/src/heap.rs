// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-context heap: arena allocator, pools, the global object list,
//! the magic string registry, and the free-unused-memory severity ladder
//! that connects allocation pressure to the garbage collector.

pub(crate) mod allocator;
pub mod gc;
pub mod pointer;
pub(crate) mod pools;
#[cfg(feature = "heap-snapshot")]
pub mod snapshot;

use core::ptr::NonNull;

use hashbrown::HashMap;

use crate::ecmascript::execution::ExternalFunctionEntry;
use crate::ecmascript::types::MagicStringId;
use crate::ecmascript::types::string::BUILTIN_MAGIC_STRINGS;
use crate::heap::allocator::HeapAllocator;
use crate::heap::pointer::CompressedPointer;
use crate::heap::pools::Pools;

#[cfg(feature = "mem-stats")]
pub use crate::heap::allocator::HeapStats;

/// Terminal engine failures. These never unwind through engine code; the
/// fatal handler is invoked and the process aborts if it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCode {
    OutOfMemory,
    RefCountLimit,
}

/// Memory pressure levels of the free-unused-memory ladder. A failed
/// allocation retries after each level; failure after `High` is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GcPressure {
    Low,
    High,
}

pub(crate) struct Heap {
    pub(crate) allocator: HeapAllocator,
    pub(crate) pools: Pools,
    /// Head of the singly-linked list of every live object record, threaded
    /// through the records' `gc_next_cp` field. Owned by the collector.
    pub(crate) object_list: CompressedPointer,
    /// The global lexical environment; a collector root.
    pub(crate) global_env: CompressedPointer,
    /// Registered native function handlers and their native data. Indexed
    /// by the handler slot stored in external function records.
    pub(crate) external_functions: Vec<Option<ExternalFunctionEntry>>,
    magic_lookup: HashMap<&'static str, u16>,
    external_magic_strings: Vec<&'static str>,
    pub(crate) fatal_handler: Option<fn(FatalCode)>,
    pub(crate) gc_disabled: bool,
    /// Guards against re-entering the collector from a finalizer's frees.
    pub(crate) gc_running: bool,
}

impl Heap {
    pub(crate) fn new(gc_disabled: bool) -> Heap {
        let mut magic_lookup = HashMap::with_capacity(BUILTIN_MAGIC_STRINGS.len());
        for (id, text) in BUILTIN_MAGIC_STRINGS.iter().enumerate() {
            if (id as u16) < MagicStringId::FIRST_HIDDEN {
                magic_lookup.insert(*text, id as u16);
            }
        }
        Heap {
            allocator: HeapAllocator::new(),
            pools: Pools::new(),
            object_list: CompressedPointer::NULL,
            global_env: CompressedPointer::NULL,
            external_functions: Vec::new(),
            magic_lookup,
            external_magic_strings: Vec::new(),
            fatal_handler: None,
            gc_disabled,
            gc_running: false,
        }
    }

    /// Report a terminal failure and never return.
    pub(crate) fn fatal(&self, code: FatalCode) -> ! {
        eprintln!("kite: fatal engine error: {code:?}");
        if let Some(handler) = self.fatal_handler {
            handler(code);
        }
        std::process::abort();
    }

    /// Run the free-unused-memory hooks at the given pressure.
    pub(crate) fn run_free_unused_memory(&mut self, pressure: GcPressure) {
        if self.gc_disabled || self.gc_running {
            return;
        }
        gc::run(self, pressure);
    }

    /// Allocate a block, reclaiming memory as needed. Terminal on failure.
    pub(crate) fn alloc(&mut self, size: usize) -> NonNull<u8> {
        match self.try_alloc(size) {
            Some(ptr) => ptr,
            None => self.fatal(FatalCode::OutOfMemory),
        }
    }

    /// Allocate a block, reclaiming memory as needed; reports failure
    /// instead of terminating.
    pub(crate) fn try_alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        debug_assert!(size > 0);
        if self.allocator.crosses_limit(size) {
            self.run_free_unused_memory(GcPressure::Low);
        }
        if let Some(ptr) = self.allocator.alloc_inner(size) {
            return Some(ptr);
        }
        for pressure in [GcPressure::Low, GcPressure::High] {
            self.run_free_unused_memory(pressure);
            if let Some(ptr) = self.allocator.alloc_inner(size) {
                return Some(ptr);
            }
        }
        None
    }

    pub(crate) fn free_block(&mut self, ptr: NonNull<u8>, size: usize) {
        self.allocator.free(ptr, size);
    }

    /// Reallocate a block: shrink in place, grow in place when the
    /// following region is free, or allocate-copy-free.
    pub(crate) fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> NonNull<u8> {
        let align = crate::config::HEAP_ALIGNMENT - 1;
        let aligned_old = (old_size + align) & !align;
        let aligned_new = (new_size + align) & !align;
        if aligned_new == aligned_old {
            return ptr;
        }
        if aligned_new < aligned_old {
            self.allocator.shrink(ptr, old_size, new_size);
            return ptr;
        }
        if self.allocator.grow_in_place(ptr, old_size, new_size) {
            return ptr;
        }
        let replacement = self.alloc(new_size);
        // SAFETY: both blocks are live and at least old_size bytes.
        unsafe {
            core::ptr::copy_nonoverlapping(ptr.as_ptr(), replacement.as_ptr(), old_size);
        }
        self.free_block(ptr, old_size);
        replacement
    }

    /// Allocate a pool cell: one allocation unit, O(1) when the pool has a
    /// cached chunk.
    pub(crate) fn pool_alloc(&mut self) -> NonNull<u8> {
        if let Some(chunk) = self.pools.pop() {
            return chunk;
        }
        self.alloc(pools::POOL_CHUNK_SIZE)
    }

    pub(crate) fn pool_free(&mut self, ptr: NonNull<u8>) {
        self.pools.push(ptr, pools::POOL_CHUNK_SIZE);
    }

    #[inline]
    pub(crate) fn compress(&self, ptr: NonNull<u8>) -> CompressedPointer {
        self.allocator.compress(ptr)
    }

    #[inline]
    pub(crate) fn decompress(&self, cp: CompressedPointer) -> NonNull<u8> {
        self.allocator.decompress(cp)
    }

    /// Raw pointer to the record a compressed pointer references. Reads and
    /// writes through it are unsafe; the pointer itself is valid as long as
    /// the record has not been freed.
    #[inline]
    pub(crate) fn deref<T>(&self, cp: CompressedPointer) -> *mut T {
        debug_assert!(!cp.is_null());
        self.allocator.decompress(cp).as_ptr() as *mut T
    }

    /// Resolve a magic string id to its text.
    pub(crate) fn magic_string_text(&self, id: MagicStringId) -> &str {
        if id.0 >= MagicStringId::EXTERNAL_BASE {
            self.external_magic_strings[(id.0 - MagicStringId::EXTERNAL_BASE) as usize]
        } else {
            BUILTIN_MAGIC_STRINGS[id.0 as usize]
        }
    }

    /// Look up content in the magic registries. Hidden internal names are
    /// never returned.
    pub(crate) fn find_magic_string(&self, bytes: &[u8]) -> Option<MagicStringId> {
        let text = core::str::from_utf8(bytes).ok()?;
        self.magic_lookup.get(text).copied().map(MagicStringId)
    }

    /// Append embedder magic strings. Their ids start at
    /// [`MagicStringId::EXTERNAL_BASE`] in registration order.
    pub(crate) fn register_magic_strings(&mut self, strings: &[&'static str]) {
        for &text in strings {
            let id = MagicStringId::EXTERNAL_BASE + self.external_magic_strings.len() as u16;
            self.external_magic_strings.push(text);
            self.magic_lookup.entry(text).or_insert(id);
        }
    }

    #[cfg(feature = "mem-stats")]
    pub(crate) fn stats(&self) -> HeapStats {
        self.allocator.stats()
    }
}
