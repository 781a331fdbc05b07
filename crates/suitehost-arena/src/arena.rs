//! The session memory arena.
//!
//! A thin, accounting layer over a [`HeapProvider`]. Every higher
//! component (buffer allocator, suite registry, handle allocator, buffer
//! suite) draws its blocks from one arena per session and is solely
//! responsible for handing them back.

use std::cell::Cell;

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::raw::{HeapProvider, MemoryBlock, SystemHeap};

/// Point-in-time arena counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Blocks currently outstanding.
    pub live_blocks: usize,
    /// Bytes currently outstanding.
    pub live_bytes: usize,
    /// Blocks handed out over the arena's lifetime.
    pub total_allocations: u64,
}

/// Allocate/free/resize/size over a heap provider, scoped to one session.
///
/// Not thread-safe: sessions are strictly sequential. Methods take `&self`
/// so the arena can be shared (via `Rc`) by every component that draws
/// from it.
pub struct MemoryArena {
    heap: Box<dyn HeapProvider>,
    config: ArenaConfig,
    live_blocks: Cell<usize>,
    live_bytes: Cell<usize>,
    total_allocations: Cell<u64>,
    torn_down: Cell<bool>,
}

impl MemoryArena {
    /// Create an arena over an explicit heap provider.
    pub fn new(heap: impl HeapProvider + 'static, config: ArenaConfig) -> Self {
        Self {
            heap: Box::new(heap),
            config,
            live_blocks: Cell::new(0),
            live_bytes: Cell::new(0),
            total_allocations: Cell::new(0),
            torn_down: Cell::new(false),
        }
    }

    /// Create an arena over the global Rust allocator.
    pub fn system(config: ArenaConfig) -> Self {
        Self::new(SystemHeap, config)
    }

    /// The configuration this arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    fn ensure_live(&self) -> Result<(), ArenaError> {
        if self.torn_down.get() {
            return Err(ArenaError::TornDown);
        }
        Ok(())
    }

    /// Allocate a block of `size` bytes, zeroed if `zero_fill`.
    pub fn allocate(&self, size: usize, zero_fill: bool) -> Result<MemoryBlock, ArenaError> {
        self.ensure_live()?;
        if size > self.config.max_block_bytes {
            return Err(ArenaError::SizeOverflow {
                requested: size,
                limit: self.config.max_block_bytes,
            });
        }
        let ptr = self
            .heap
            .allocate(size, zero_fill)
            .ok_or(ArenaError::OutOfMemory { requested: size })?;
        self.live_blocks.set(self.live_blocks.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + size);
        self.total_allocations.set(self.total_allocations.get() + 1);
        tracing::trace!(bytes = size, zero_fill, "arena allocate");
        Ok(MemoryBlock::new(ptr, size))
    }

    /// Release a block.
    ///
    /// A provider failure here is fatal: the heap can no longer be trusted.
    #[allow(unsafe_code)]
    pub fn free(&self, block: MemoryBlock) -> Result<(), ArenaError> {
        self.ensure_live()?;
        let size = block.len();
        // SAFETY: `block` was produced by this arena's provider and is
        // consumed here, so it cannot be released twice through safe code.
        let result = unsafe { self.heap.free(block.non_null()) };
        match result {
            Ok(()) => {
                self.live_blocks.set(self.live_blocks.get().saturating_sub(1));
                self.live_bytes.set(self.live_bytes.get().saturating_sub(size));
                tracing::trace!(bytes = size, "arena free");
                Ok(())
            }
            Err(fault) => {
                tracing::error!(%fault, bytes = size, "heap provider failed to free block");
                Err(ArenaError::HeapCorrupted(fault))
            }
        }
    }

    /// Resize a block in place or by moving it, preserving contents up to
    /// the smaller of the two sizes.
    ///
    /// On out-of-memory the block is left untouched.
    #[allow(unsafe_code)]
    pub fn realloc(&self, block: &mut MemoryBlock, new_size: usize) -> Result<(), ArenaError> {
        self.ensure_live()?;
        if new_size > self.config.max_block_bytes {
            return Err(ArenaError::SizeOverflow {
                requested: new_size,
                limit: self.config.max_block_bytes,
            });
        }
        let old_size = block.len();
        // SAFETY: `block` is live and owned by the caller; on success we
        // immediately replace its pointer with the provider's new one.
        let result = unsafe { self.heap.resize(block.non_null(), new_size) };
        match result {
            Ok(Some(ptr)) => {
                block.set(ptr, new_size);
                let bytes = self.live_bytes.get().saturating_sub(old_size) + new_size;
                self.live_bytes.set(bytes);
                tracing::trace!(from = old_size, to = new_size, "arena realloc");
                Ok(())
            }
            Ok(None) => Err(ArenaError::OutOfMemory {
                requested: new_size,
            }),
            Err(fault) => {
                tracing::error!(
                    %fault,
                    from = old_size,
                    to = new_size,
                    "heap provider failed to resize block"
                );
                Err(ArenaError::HeapCorrupted(fault))
            }
        }
    }

    /// Usable size of a block as reported by the provider; 0 once torn down.
    #[allow(unsafe_code)]
    pub fn size(&self, block: &MemoryBlock) -> usize {
        if self.torn_down.get() {
            return 0;
        }
        // SAFETY: the caller owns a live block from this arena.
        unsafe { self.heap.size_of(block.non_null()) }
    }

    /// Free memory the provider reports.
    pub fn available(&self) -> u64 {
        if self.torn_down.get() {
            return 0;
        }
        self.heap.available_memory()
    }

    /// Current counters.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_blocks: self.live_blocks.get(),
            live_bytes: self.live_bytes.get(),
            total_allocations: self.total_allocations.get(),
        }
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    /// Mark the arena destroyed. Any later allocate/free/realloc fails with
    /// [`ArenaError::TornDown`].
    ///
    /// Returns the number of blocks still outstanding; those are leaked.
    pub fn teardown(&self) -> usize {
        if self.torn_down.replace(true) {
            return 0;
        }
        let leaked = self.live_blocks.get();
        if leaked > 0 {
            tracing::warn!(
                blocks = leaked,
                bytes = self.live_bytes.get(),
                "memory arena torn down with outstanding blocks"
            );
        }
        leaked
    }
}
