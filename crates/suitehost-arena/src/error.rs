//! Arena and buffer allocator error types.

use std::convert::Infallible;
use std::error::Error;
use std::fmt;

use crate::raw::HeapFault;

/// Errors from [`MemoryArena`](crate::MemoryArena) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The heap provider returned no memory.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },
    /// The requested size exceeds what the arena will hand out in one block.
    SizeOverflow {
        /// Number of bytes requested.
        requested: usize,
        /// Configured per-block maximum.
        limit: usize,
    },
    /// The provider reported a failure while releasing or resizing a block.
    /// Heap integrity can no longer be trusted.
    HeapCorrupted(HeapFault),
    /// The arena was used after [`teardown`](crate::MemoryArena::teardown).
    TornDown,
}

impl ArenaError {
    /// Whether this error invalidates the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::HeapCorrupted(_) | Self::TornDown)
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: requested {requested} bytes")
            }
            Self::SizeOverflow { requested, limit } => {
                write!(f, "block size {requested} exceeds limit of {limit} bytes")
            }
            Self::HeapCorrupted(fault) => write!(f, "heap corrupted: {fault}"),
            Self::TornDown => write!(f, "memory arena used after teardown"),
        }
    }
}

impl Error for ArenaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HeapCorrupted(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Errors from [`BufferAllocator`](crate::BufferAllocator) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferError {
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
    /// A fatal arena failure surfaced while serving the request.
    Fatal(ArenaError),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { size } => write!(f, "invalid buffer size {size}"),
            Self::MemoryFull { requested } => {
                write!(f, "buffer allocation of {requested} bytes failed")
            }
            Self::Fatal(e) => write!(f, "fatal arena failure: {e}"),
        }
    }
}

impl Error for BufferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fatal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for BufferError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::OutOfMemory { requested } | ArenaError::SizeOverflow { requested, .. } => {
                Self::MemoryFull { requested }
            }
            fatal => Self::Fatal(fatal),
        }
    }
}

/// Errors that may carry a session-ending arena fault.
///
/// The session checks every component error through this trait and
/// latches the fault when one is present.
pub trait FatalFault {
    /// The fatal arena error inside `self`, if any.
    fn fatal_fault(&self) -> Option<&ArenaError>;
}

impl FatalFault for ArenaError {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        self.is_fatal().then_some(self)
    }
}

impl FatalFault for BufferError {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        match self {
            Self::Fatal(e) => Some(e),
            _ => None,
        }
    }
}

impl FatalFault for Infallible {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        match *self {}
    }
}
