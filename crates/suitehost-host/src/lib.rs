//! Suite broker, resource collections and the host session for suitehost.
//!
//! [`HostSession`] is the context object for one plugin run. It owns the
//! session [`MemoryArena`](suitehost_arena::MemoryArena) and every
//! component drawing from it:
//!
//! ```text
//! HostSession
//! ├── Rc<MemoryArena>
//! ├── BufferAllocator           buffer procs
//! ├── ArenaHandles              handle procs, resource blobs
//! ├── BlockTable                basic suite blocks
//! ├── ResourceCollection ×2     primary and pseudo resources
//! ├── ErrorChannel              error suite
//! ├── SuiteRegistry             acquire / release
//! └── SuiteFacade               lazily built suite state
//!     ├── BufferSuite
//!     ├── ZStringTable
//!     ├── ColorSpaceTable
//!     └── UiHooks
//! ```
//!
//! Nothing here renders function tables or touches plugin memory; that is
//! the boundary crate's job, through [`SuiteCatalog`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod blocks;
pub mod buffer_suite;
pub mod catalog;
pub mod colorspace;
pub mod config;
pub mod error_channel;
pub mod facade;
pub mod handles;
pub mod registry;
pub mod resource;
pub mod session;
pub mod uihooks;
pub mod zstring;

pub use blocks::BlockTable;
pub use buffer_suite::{BufferSuite, GrantedBlock};
pub use catalog::{SuiteCatalog, SuiteKind};
pub use colorspace::{ColorError, ColorSpace, ColorSpaceTable};
pub use config::{ConfigError, SessionConfig};
pub use error_channel::{ErrorChannel, ErrorChannelError};
pub use facade::SuiteFacade;
pub use handles::{ArenaHandles, HandleError};
pub use registry::{BrokerError, SuitePtr, SuiteRegistry};
pub use resource::{CollectionRole, ResourceCollection, ResourceEntry, ResourceError};
pub use session::{CallError, HostSession, TeardownReport};
pub use uihooks::UiHooks;
pub use zstring::{ZStringError, ZStringTable};
