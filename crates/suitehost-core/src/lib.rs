//! Core identifiers and collaborator traits for the suitehost plugin host.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! token types that cross the plugin boundary, suite keys, resource type
//! tags, and the string-resolution trait shared by the host components.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod id;
pub mod traits;

pub use id::{four_cc, BufferId, ColorId, HandleId, ResType, SuiteKey, ZStringRef};
pub use traits::{NoStrings, StringResolver};
