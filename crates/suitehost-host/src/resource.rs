//! Ordered, typed collections of plugin resource blobs.
//!
//! Entries are addressed by a four-byte type tag and a 1-based index that
//! is unique within the tag. Indices of one tag stay contiguous from 1:
//! deleting an entry shifts every later entry of the same tag down by one.

use std::collections::TryReserveError;
use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use suitehost_core::ResType;

/// Highest index a resource may carry. Plugins address entries with a
/// signed 16-bit index.
pub const MAX_RESOURCE_INDEX: u16 = i16::MAX as u16;

/// Which plugin-visible role a collection serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionRole {
    /// Resources the plugin reads and writes through the resource procs.
    Primary,
    /// Scratch resources handed to the plugin's pseudo-resource procs.
    Pseudo,
}

/// Errors from [`ResourceCollection`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// No entry with this type and index.
    NotFound {
        /// Requested type tag.
        kind: ResType,
        /// Requested index.
        index: i16,
    },
    /// The copy could not be stored, or the type ran out of indices.
    MemoryFull {
        /// Size of the blob that was being stored.
        bytes: usize,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, index } => write!(f, "resource {kind} #{index} not found"),
            Self::MemoryFull { bytes } => write!(f, "cannot store {bytes}-byte resource"),
        }
    }
}

impl Error for ResourceError {}

impl suitehost_arena::FatalFault for ResourceError {
    fn fatal_fault(&self) -> Option<&suitehost_arena::ArenaError> {
        None
    }
}

/// One stored blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceEntry {
    kind: ResType,
    index: u16,
    data: Box<[u8]>,
}

impl ResourceEntry {
    /// Type tag.
    pub fn kind(&self) -> ResType {
        self.kind
    }

    /// 1-based index within the type.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Stored bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn copy_bytes(bytes: &[u8]) -> Result<Vec<u8>, TryReserveError> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(bytes.len())?;
    copy.extend_from_slice(bytes);
    Ok(copy)
}

/// An ordered resource collection for one plugin-visible role.
#[derive(Debug)]
pub struct ResourceCollection {
    role: CollectionRole,
    entries: Vec<ResourceEntry>,
    counts: IndexMap<ResType, u16>,
    max_entry_bytes: usize,
}

impl ResourceCollection {
    /// Create an empty collection. Blobs larger than `max_entry_bytes`
    /// are refused as memory-full.
    pub fn new(role: CollectionRole, max_entry_bytes: usize) -> Self {
        Self {
            role,
            entries: Vec::new(),
            counts: IndexMap::new(),
            max_entry_bytes,
        }
    }

    /// The role this collection serves.
    pub fn role(&self) -> CollectionRole {
        self.role
    }

    /// Number of entries with type `kind`.
    pub fn count(&self, kind: ResType) -> u16 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Append a copy of `bytes` as the next index of `kind`.
    ///
    /// Returns the new index. On failure nothing is stored.
    pub fn add(&mut self, kind: ResType, bytes: &[u8]) -> Result<u16, ResourceError> {
        let full = ResourceError::MemoryFull { bytes: bytes.len() };
        if bytes.len() > self.max_entry_bytes {
            tracing::debug!(%kind, bytes = bytes.len(), "resource exceeds entry cap");
            return Err(full);
        }
        let index = self.count(kind) + 1;
        if index > MAX_RESOURCE_INDEX {
            return Err(full);
        }
        let data = copy_bytes(bytes).map_err(|_| full.clone())?;
        self.entries.try_reserve(1).map_err(|_| full)?;
        self.counts.insert(kind, index);
        self.entries.push(ResourceEntry {
            kind,
            index,
            data: data.into_boxed_slice(),
        });
        tracing::debug!(role = ?self.role, %kind, index, bytes = bytes.len(), "resource added");
        Ok(index)
    }

    /// Borrow the entry at (`kind`, `index`).
    pub fn find(&self, kind: ResType, index: i16) -> Option<&ResourceEntry> {
        let index = u16::try_from(index).ok()?;
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.index == index)
    }

    /// A fresh copy of the bytes at (`kind`, `index`).
    pub fn get(&self, kind: ResType, index: i16) -> Result<Vec<u8>, ResourceError> {
        let entry = self
            .find(kind, index)
            .ok_or(ResourceError::NotFound { kind, index })?;
        copy_bytes(&entry.data).map_err(|_| ResourceError::MemoryFull {
            bytes: entry.data.len(),
        })
    }

    /// Remove the entry at (`kind`, `index`) and close the gap it leaves.
    pub fn delete(&mut self, kind: ResType, index: i16) -> Result<(), ResourceError> {
        let position = u16::try_from(index)
            .ok()
            .and_then(|i| {
                self.entries
                    .iter()
                    .position(|e| e.kind == kind && e.index == i)
            })
            .ok_or(ResourceError::NotFound { kind, index })?;
        let removed = self.entries.remove(position);
        if let Some(n) = self.counts.get_mut(&kind) {
            *n -= 1;
        }

        let mut next = removed.index;
        loop {
            next += 1;
            let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.kind == kind && e.index == next)
            else {
                break;
            };
            entry.index = next - 1;
        }
        tracing::debug!(role = ?self.role, %kind, index, "resource deleted");
        Ok(())
    }

    /// Drop every entry. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        self.counts.clear();
        n
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.iter()
    }
}
