//! Suitehost: the host side of a PICA-style plugin suite broker.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all suitehost sub-crates. For most hosts, adding `suitehost` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use suitehost::prelude::*;
//!
//! let mut session = HostSession::new(SessionConfig {
//!     plugin_name: "Lens Blur".into(),
//!     ..SessionConfig::default()
//! })
//! .unwrap();
//!
//! // Persist a script parameter the way a plugin would.
//! let script = ResType(four_cc(b"Scrp"));
//! let index = session
//!     .resources(CollectionRole::Pseudo, |r| r.add(script, b"0.75"))
//!     .unwrap();
//! assert_eq!(index, 1);
//!
//! // Acquire and release a suite table.
//! let key = SuiteKind::ZString.key();
//! let table = session.acquire_suite(key.clone(), &PublishedSuites).unwrap();
//! assert!(!table.as_ptr().is_null());
//! assert!(session.release_suite(&key).unwrap());
//!
//! let report = session.teardown();
//! assert!(report.is_clean());
//! assert_eq!(report.resources_cleared, 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `suitehost-core` | Tokens, suite keys, resource types, string resolution |
//! | [`arena`] | `suitehost-arena` | Memory arena, heap providers, buffers, handle tables |
//! | [`host`] | `suitehost-host` | Sessions, suite registry, resources, errors, suite state |
//! | [`ffi`] | `suitehost-ffi` | C callback tables, suite tables, host session C API |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core tokens and identifiers (`suitehost-core`).
///
/// Contains [`types::SuiteKey`], [`types::ResType`], the token newtypes,
/// and the [`types::StringResolver`] seam used by the error channel.
pub use suitehost_core as types;

/// Memory arena and allocators (`suitehost-arena`).
///
/// [`arena::MemoryArena`] draws from a [`arena::HeapProvider`]; the
/// [`arena::BufferAllocator`] and [`arena::HandleTable`] sit on top.
pub use suitehost_arena as arena;

/// Session and suite state (`suitehost-host`).
///
/// [`host::HostSession`] owns everything one plugin invocation can reach.
pub use suitehost_host as host;

/// C ABI (`suitehost-ffi`).
///
/// Callback tables and suite tables for plugins, and the
/// `suitehost_session_*` functions for C hosts.
pub use suitehost_ffi as ffi;

/// Common imports for typical host usage.
///
/// ```rust
/// use suitehost::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use suitehost_core::{four_cc, BufferId, HandleId, ResType, SuiteKey, ZStringRef};

    // Arena
    pub use suitehost_arena::{ArenaConfig, ArenaError, HeapProvider, MemoryArena};

    // Session
    pub use suitehost_host::{
        CallError, CollectionRole, ConfigError, HostSession, SessionConfig, SuiteKind,
        TeardownReport,
    };

    // Errors
    pub use suitehost_host::{BrokerError, ErrorChannelError, HandleError, ResourceError};

    // ABI
    pub use suitehost_ffi::{HostStatus, PublishedSuites, SessionScope, SuiteStatus};
}
