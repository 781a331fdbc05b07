//! Session-owned relocatable handles.
//!
//! A handle is an opaque token for an arena block whose address may change
//! when it is resized. Plugins lock a handle to get an address and unlock
//! it when done; a locked handle cannot be resized. Resource blobs cross
//! the boundary as handles.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use suitehost_arena::{ArenaError, FatalFault, HandleTable, MemoryArena, MemoryBlock};
use suitehost_core::HandleId;

/// Errors from [`ArenaHandles`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// A negative size was requested.
    InvalidParameter {
        /// The rejected size.
        size: i32,
    },
    /// The arena could not satisfy the request.
    MemoryFull {
        /// Number of bytes requested.
        requested: usize,
    },
    /// The handle is not live.
    NotFound {
        /// The stale or unknown handle.
        id: HandleId,
    },
    /// The handle is locked and cannot be resized.
    Locked {
        /// The locked handle.
        id: HandleId,
    },
    /// A fatal arena failure surfaced while serving the request.
    Fatal(ArenaError),
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { size } => write!(f, "invalid handle size {size}"),
            Self::MemoryFull { requested } => {
                write!(f, "handle allocation of {requested} bytes failed")
            }
            Self::NotFound { id } => write!(f, "{id} is not live"),
            Self::Locked { id } => write!(f, "{id} is locked"),
            Self::Fatal(e) => write!(f, "fatal arena failure: {e}"),
        }
    }
}

impl Error for HandleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fatal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for HandleError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::OutOfMemory { requested } | ArenaError::SizeOverflow { requested, .. } => {
                Self::MemoryFull { requested }
            }
            fatal => Self::Fatal(fatal),
        }
    }
}

impl FatalFault for HandleError {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        match self {
            Self::Fatal(e) => Some(e),
            _ => None,
        }
    }
}

struct HandleSlot {
    block: MemoryBlock,
    locks: u32,
}

/// Handle allocator drawing from the session arena.
pub struct ArenaHandles {
    arena: Rc<MemoryArena>,
    handles: HandleTable<HandleSlot>,
}

impl ArenaHandles {
    /// Create an empty allocator.
    pub fn new(arena: Rc<MemoryArena>) -> Self {
        Self {
            arena,
            handles: HandleTable::new(),
        }
    }

    /// Allocate a zeroed handle of `size` bytes.
    pub fn new_handle(&mut self, size: i32) -> Result<HandleId, HandleError> {
        let bytes = usize::try_from(size).map_err(|_| HandleError::InvalidParameter { size })?;
        let block = self.arena.allocate(bytes, true)?;
        Ok(self.insert(block))
    }

    /// Allocate a handle holding a copy of `data`.
    pub fn from_bytes(&mut self, data: &[u8]) -> Result<HandleId, HandleError> {
        let mut block = self.arena.allocate(data.len(), false)?;
        block.as_mut_slice().copy_from_slice(data);
        Ok(self.insert(block))
    }

    fn insert(&mut self, block: MemoryBlock) -> HandleId {
        let bytes = block.len();
        let id = HandleId::from_token(self.handles.insert(HandleSlot { block, locks: 0 }));
        tracing::debug!(%id, bytes, "handle allocated");
        id
    }

    /// Pin a handle and return its current address.
    pub fn lock(&mut self, id: HandleId) -> Option<*mut u8> {
        let slot = self.handles.get_mut(id)?;
        slot.locks = slot.locks.saturating_add(1);
        Some(slot.block.as_ptr())
    }

    /// Undo one [`lock`](Self::lock). Unlocking an unlocked handle is a no-op.
    pub fn unlock(&mut self, id: HandleId) {
        if let Some(slot) = self.handles.get_mut(id) {
            slot.locks = slot.locks.saturating_sub(1);
        }
    }

    /// Whether the handle is currently locked.
    pub fn is_locked(&self, id: HandleId) -> bool {
        self.handles.get(id).is_some_and(|slot| slot.locks > 0)
    }

    /// Size in bytes of a live handle.
    pub fn size_of(&self, id: HandleId) -> Option<usize> {
        self.handles.get(id).map(|slot| slot.block.len())
    }

    /// Contents of a live handle.
    pub fn bytes(&self, id: HandleId) -> Option<&[u8]> {
        self.handles.get(id).map(|slot| slot.block.as_slice())
    }

    /// Resize an unlocked handle, preserving its contents up to the
    /// smaller size. Out-of-memory leaves the handle unchanged.
    pub fn set_size(&mut self, id: HandleId, size: i32) -> Result<(), HandleError> {
        let bytes = usize::try_from(size).map_err(|_| HandleError::InvalidParameter { size })?;
        let slot = self
            .handles
            .get_mut(id)
            .ok_or(HandleError::NotFound { id })?;
        if slot.locks > 0 {
            return Err(HandleError::Locked { id });
        }
        self.arena.realloc(&mut slot.block, bytes)?;
        Ok(())
    }

    /// Release a handle. Returns `Ok(false)` if it was not live.
    pub fn dispose(&mut self, id: HandleId) -> Result<bool, ArenaError> {
        let Some(slot) = self.handles.remove(id) else {
            return Ok(false);
        };
        self.arena.free(slot.block)?;
        tracing::debug!(%id, "handle disposed");
        Ok(true)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handles are live.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every handle, visiting all of them even after a fault.
    pub fn release_all(&mut self) -> Result<usize, ArenaError> {
        let drained = self.handles.drain();
        let count = drained.len();
        if count > 0 {
            tracing::warn!(handles = count, "releasing handles still held at teardown");
        }
        let mut first_fault = None;
        for (_, slot) in drained {
            if let Err(e) = self.arena.free(slot.block) {
                first_fault.get_or_insert(e);
            }
        }
        first_fault.map_or(Ok(count), Err)
    }
}
