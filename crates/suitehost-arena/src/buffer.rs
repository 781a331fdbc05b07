//! Opaque buffer allocator backing the plugin buffer procs.
//!
//! Plugins never see a block address until they lock a buffer id; the
//! allocator maps ids to arena blocks and owns those blocks until the
//! plugin frees them or the session tears down.

use std::rc::Rc;

use suitehost_core::BufferId;

use crate::arena::MemoryArena;
use crate::error::{ArenaError, BufferError};
use crate::handle::HandleTable;
use crate::raw::MemoryBlock;

/// Per-session buffer id allocator built on the memory arena.
pub struct BufferAllocator {
    arena: Rc<MemoryArena>,
    buffers: HandleTable<MemoryBlock>,
}

impl BufferAllocator {
    /// Create an empty allocator drawing from `arena`.
    pub fn new(arena: Rc<MemoryArena>) -> Self {
        Self {
            arena,
            buffers: HandleTable::new(),
        }
    }

    /// Allocate a buffer of `size` bytes.
    ///
    /// Negative sizes are rejected without touching the arena.
    pub fn allocate(&mut self, size: i32) -> Result<BufferId, BufferError> {
        let Ok(bytes) = usize::try_from(size) else {
            return Err(BufferError::InvalidParameter { size });
        };
        let block = self.arena.allocate(bytes, false)?;
        let id = BufferId::from_token(self.buffers.insert(block));
        tracing::debug!(%id, bytes, "buffer allocated");
        Ok(id)
    }

    /// Address of a buffer's memory. Blocks never relocate, so locking is
    /// an identity lookup; `None` for an unknown id.
    pub fn lock(&self, id: BufferId) -> Option<*mut u8> {
        self.buffers.get(id).map(MemoryBlock::as_ptr)
    }

    /// Counterpart of [`lock`](Self::lock). Nothing to undo.
    pub fn unlock(&self, _id: BufferId) {}

    /// Release a buffer.
    ///
    /// Returns `Ok(false)` for an id that is not live (freed twice or never
    /// allocated); that is a caller bug, not a host error.
    pub fn free(&mut self, id: BufferId) -> Result<bool, ArenaError> {
        let Some(block) = self.buffers.remove(id) else {
            tracing::debug!(%id, "free of unknown buffer ignored");
            return Ok(false);
        };
        let bytes = block.len();
        self.arena.free(block)?;
        tracing::debug!(%id, bytes, "buffer freed");
        Ok(true)
    }

    /// Size in bytes of a live buffer.
    pub fn size_of(&self, id: BufferId) -> Option<usize> {
        self.buffers.get(id).map(MemoryBlock::len)
    }

    /// Whether `id` was allocated by this allocator and is still live.
    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains(id)
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffers are live.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Advisory space hint: the smaller of the configured ceiling and the
    /// memory the arena reports free. Never a guaranteed capacity.
    pub fn available_space(&self) -> u64 {
        self.arena
            .available()
            .min(self.arena.config().buffer_ceiling)
    }

    /// Release every outstanding buffer.
    ///
    /// Always visits every buffer. Returns the number released, or the
    /// first fatal arena error encountered along the way.
    pub fn release_all(&mut self) -> Result<usize, ArenaError> {
        let drained = self.buffers.drain();
        let count = drained.len();
        if count > 0 {
            tracing::warn!(buffers = count, "releasing buffers still held at teardown");
        }
        let mut first_fault = None;
        for (_, block) in drained {
            if let Err(e) = self.arena.free(block) {
                first_fault.get_or_insert(e);
            }
        }
        match first_fault {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }
}
