//! Test utilities and stand-in collaborators for suitehost development.
//!
//! Provides [`TrackingHeap`], a heap provider that records every
//! allocation and release and can inject faults, and [`FixedStrings`], a
//! string-table stand-in for exercising opaque string references.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod heap;
pub mod strings;

pub use heap::TrackingHeap;
pub use strings::FixedStrings;
