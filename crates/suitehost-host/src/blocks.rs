//! Arena blocks addressed by their start address.
//!
//! Backs the basic suite's raw block calls and the PICA buffer suite,
//! both of which hand plugins bare pointers and take them back later.

use std::rc::Rc;

use indexmap::IndexMap;
use suitehost_arena::{ArenaError, MemoryArena, MemoryBlock};

/// Address-keyed table of arena blocks.
pub struct BlockTable {
    arena: Rc<MemoryArena>,
    blocks: IndexMap<usize, MemoryBlock>,
}

impl BlockTable {
    /// Create an empty table drawing from `arena`.
    pub fn new(arena: Rc<MemoryArena>) -> Self {
        Self {
            arena,
            blocks: IndexMap::new(),
        }
    }

    /// The arena blocks are drawn from.
    pub fn arena(&self) -> &MemoryArena {
        &self.arena
    }

    /// Allocate `size` bytes and return the block address.
    pub fn allocate(&mut self, size: usize) -> Result<*mut u8, ArenaError> {
        let block = self.arena.allocate(size, false)?;
        let ptr = block.as_ptr();
        self.blocks.insert(ptr as usize, block);
        Ok(ptr)
    }

    /// Release the block at `ptr`. Returns `Ok(false)` for an address not
    /// in the table.
    pub fn free(&mut self, ptr: *const u8) -> Result<bool, ArenaError> {
        let Some(block) = self.blocks.shift_remove(&(ptr as usize)) else {
            return Ok(false);
        };
        self.arena.free(block)?;
        Ok(true)
    }

    /// Resize the block at `ptr`, which may move it.
    ///
    /// Returns `Ok(None)` for an address not in the table. On failure the
    /// block stays where it was, still owned by the table.
    pub fn reallocate(
        &mut self,
        ptr: *const u8,
        new_size: usize,
    ) -> Result<Option<*mut u8>, ArenaError> {
        let Some(mut block) = self.blocks.shift_remove(&(ptr as usize)) else {
            return Ok(None);
        };
        let result = self.arena.realloc(&mut block, new_size);
        let moved = block.as_ptr();
        self.blocks.insert(moved as usize, block);
        result.map(|()| Some(moved))
    }

    /// Size of the block at `ptr`.
    pub fn size_of(&self, ptr: *const u8) -> Option<usize> {
        self.blocks.get(&(ptr as usize)).map(MemoryBlock::len)
    }

    /// Number of outstanding blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are outstanding.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Release every outstanding block, visiting all of them even after a
    /// fault.
    pub fn release_all(&mut self) -> Result<usize, ArenaError> {
        let count = self.blocks.len();
        let mut first_fault = None;
        for (_, block) in self.blocks.drain(..) {
            if let Err(e) = self.arena.free(block) {
                first_fault.get_or_insert(e);
            }
        }
        first_fault.map_or(Ok(count), Err)
    }
}
