//! Pointer-addressed scratch buffers for the PICA buffer suite.
//!
//! A request that cannot be met in full is retried at half the size until
//! it would drop below the caller's minimum.

use std::rc::Rc;

use suitehost_arena::{ArenaError, MemoryArena};

use crate::blocks::BlockTable;

/// A block handed out by [`BufferSuite::new_block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrantedBlock {
    /// Address of the first byte.
    pub ptr: *mut u8,
    /// Bytes actually granted; between the minimum and the request.
    pub size: u32,
}

/// State behind the PICA buffer suite.
pub struct BufferSuite {
    blocks: BlockTable,
}

impl BufferSuite {
    /// Create an empty suite drawing from `arena`.
    pub fn new(arena: Rc<MemoryArena>) -> Self {
        Self {
            blocks: BlockTable::new(arena),
        }
    }

    fn ceiling(&self) -> u64 {
        self.blocks.arena().config().buffer_ceiling
    }

    /// Allocate between `minimum` and `requested` bytes.
    ///
    /// Returns `Ok(None)` when not even `minimum` bytes are available.
    pub fn new_block(
        &mut self,
        requested: u32,
        minimum: u32,
    ) -> Result<Option<GrantedBlock>, ArenaError> {
        let ceiling = u32::try_from(self.ceiling()).unwrap_or(u32::MAX);
        let minimum = minimum.min(requested);
        let mut size = requested.min(ceiling).max(minimum);
        loop {
            match self.blocks.allocate(size as usize) {
                Ok(ptr) => {
                    tracing::debug!(requested, granted = size, "suite buffer allocated");
                    return Ok(Some(GrantedBlock { ptr, size }));
                }
                Err(ArenaError::OutOfMemory { .. } | ArenaError::SizeOverflow { .. }) => {
                    if size <= minimum {
                        tracing::debug!(requested, minimum, "suite buffer unavailable");
                        return Ok(None);
                    }
                    size = (size / 2).max(minimum);
                }
                Err(fatal) => return Err(fatal),
            }
        }
    }

    /// Release the block at `ptr`. Returns `Ok(false)` for an address this
    /// suite did not hand out.
    pub fn dispose(&mut self, ptr: *const u8) -> Result<bool, ArenaError> {
        self.blocks.free(ptr)
    }

    /// Size of the block at `ptr`, or 0 if unknown.
    pub fn size_of(&self, ptr: *const u8) -> u32 {
        self.blocks
            .size_of(ptr)
            .map_or(0, |len| u32::try_from(len).unwrap_or(u32::MAX))
    }

    /// Advisory free-space hint, capped at the buffer ceiling.
    pub fn space(&self) -> u32 {
        let space = self.blocks.arena().available().min(self.ceiling());
        u32::try_from(space).unwrap_or(u32::MAX)
    }

    /// Number of outstanding blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are outstanding.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Release every outstanding block.
    pub fn release_all(&mut self) -> Result<usize, ArenaError> {
        self.blocks.release_all()
    }
}
