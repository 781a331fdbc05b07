//! Arena configuration parameters.

use crate::raw::HEADER_BYTES;

/// Configuration for the memory arena and the buffer allocator built on it.
///
/// All values are immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Largest single block the arena will request from the provider.
    ///
    /// Default: `isize::MAX` minus the block header, the most a Rust
    /// allocation can describe.
    pub max_block_bytes: usize,

    /// Upper bound reported by the buffer allocator's space query.
    ///
    /// Default: 1 GiB. Plugins size their working sets from this number,
    /// so it stays well below what a 32-bit plugin can address.
    pub buffer_ceiling: u64,
}

impl ArenaConfig {
    /// Default buffer space ceiling: 1 GiB.
    pub const DEFAULT_BUFFER_CEILING: u64 = 1 << 30;

    /// Default per-block maximum.
    pub const DEFAULT_MAX_BLOCK_BYTES: usize = isize::MAX as usize - HEADER_BYTES;

    /// Create a config with the given buffer ceiling and default limits.
    pub fn with_buffer_ceiling(buffer_ceiling: u64) -> Self {
        Self {
            buffer_ceiling,
            ..Self::default()
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_block_bytes: Self::DEFAULT_MAX_BLOCK_BYTES,
            buffer_ceiling: Self::DEFAULT_BUFFER_CEILING,
        }
    }
}
