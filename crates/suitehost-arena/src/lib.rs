//! Session memory arena and buffer allocator for the suitehost plugin host.
//!
//! Every byte a plugin can reach is drawn from one [`MemoryArena`] per
//! session. The arena wraps a [`HeapProvider`] (the system allocator in
//! production, a tracking stand-in in tests) and hands out exclusively
//! owned [`MemoryBlock`]s. This crate is one of two that may contain
//! `unsafe` code (along with `suitehost-ffi`); all of it lives in `raw.rs`
//! and the three provider call sites in `arena.rs`.
//!
//! # Architecture
//!
//! ```text
//! MemoryArena (one per session, Rc-shared)
//! ├── Box<dyn HeapProvider>   (SystemHeap / TrackingHeap)
//! └── counters + teardown flag
//! BufferAllocator
//! └── HandleTable<MemoryBlock>  (BufferId → block)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod buffer;
pub mod config;
pub mod error;
pub mod handle;
pub mod meminfo;
pub mod raw;

pub use arena::{ArenaStats, MemoryArena};
pub use buffer::BufferAllocator;
pub use config::ArenaConfig;
pub use error::{ArenaError, BufferError, FatalFault};
pub use handle::HandleTable;
pub use raw::{HeapFault, HeapProvider, MemoryBlock, SystemHeap, BLOCK_ALIGN};
