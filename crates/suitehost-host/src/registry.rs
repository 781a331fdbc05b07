//! Reference-counted suite registry.
//!
//! Each [`SuiteKey`] moves through a small state machine:
//!
//! ```text
//! Unregistered ──allocate_suite──▶ Active(1)
//! Active(n) ──add_ref──▶ Active(n+1)
//! Active(n) ──remove_ref──▶ Active(n-1)     (n > 1)
//! Active(1) ──remove_ref──▶ Unregistered    (block freed exactly once)
//! ```
//!
//! The suite table itself lives in an arena block so that its address is
//! stable for as long as any plugin holds a reference.

use std::error::Error;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

use indexmap::IndexMap;
use suitehost_arena::{ArenaError, FatalFault, MemoryArena, MemoryBlock};
use suitehost_core::SuiteKey;

/// Address of a published suite table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SuitePtr(NonNull<u8>);

impl SuitePtr {
    /// Raw table address, for the boundary layer.
    pub fn as_ptr(self) -> *const u8 {
        self.0.as_ptr()
    }
}

/// Errors from the suite broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerError {
    /// The key is already Active; use `add_ref` instead.
    AlreadyRegistered {
        /// The offending key.
        key: SuiteKey,
    },
    /// The key is not registered.
    NotRegistered {
        /// The requested key.
        key: SuiteKey,
    },
    /// The host does not publish a suite under this key.
    NotFound {
        /// The requested key.
        key: SuiteKey,
    },
    /// The table type needs stricter alignment than arena blocks provide.
    Misaligned {
        /// The key being registered.
        key: SuiteKey,
        /// Alignment the table type requires.
        align: usize,
    },
    /// The arena failed while allocating or releasing the table.
    Arena(ArenaError),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { key } => write!(f, "suite {key} is already registered"),
            Self::NotRegistered { key } => write!(f, "suite {key} is not registered"),
            Self::NotFound { key } => write!(f, "suite {key} is not published by this host"),
            Self::Misaligned { key, align } => {
                write!(f, "suite {key} table needs {align}-byte alignment")
            }
            Self::Arena(e) => write!(f, "suite table allocation failed: {e}"),
        }
    }
}

impl Error for BrokerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for BrokerError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl FatalFault for BrokerError {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        match self {
            Self::Arena(e) => e.fatal_fault(),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct SuiteEntry {
    block: MemoryBlock,
    ref_count: u32,
}

/// Registry of published suite tables, keyed by name and version.
pub struct SuiteRegistry {
    arena: Rc<MemoryArena>,
    entries: IndexMap<SuiteKey, SuiteEntry>,
}

impl SuiteRegistry {
    /// Create an empty registry drawing table blocks from `arena`.
    pub fn new(arena: Rc<MemoryArena>) -> Self {
        Self {
            arena,
            entries: IndexMap::new(),
        }
    }

    /// Publish `table` under `key` with a reference count of one.
    ///
    /// The table is copied into a zeroed arena block. Only valid for an
    /// unregistered key.
    pub fn allocate_suite<T: Copy>(
        &mut self,
        key: SuiteKey,
        table: T,
    ) -> Result<SuitePtr, BrokerError> {
        if self.entries.contains_key(&key) {
            return Err(BrokerError::AlreadyRegistered { key });
        }
        let mut block = self.arena.allocate(std::mem::size_of::<T>(), true)?;
        if !block.write_value(table) {
            self.arena.free(block)?;
            return Err(BrokerError::Misaligned {
                key,
                align: std::mem::align_of::<T>(),
            });
        }
        let ptr = SuitePtr(block.non_null());
        tracing::debug!(suite = %key, bytes = block.len(), "suite allocated");
        self.entries.insert(key, SuiteEntry { block, ref_count: 1 });
        Ok(ptr)
    }

    /// Whether `key` is Active. No side effects.
    pub fn is_loaded(&self, key: &SuiteKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Table address of an Active key, without touching its count.
    pub fn lookup(&self, key: &SuiteKey) -> Option<SuitePtr> {
        self.entries
            .get(key)
            .map(|entry| SuitePtr(entry.block.non_null()))
    }

    /// Current reference count of `key`, if Active.
    pub fn ref_count(&self, key: &SuiteKey) -> Option<u32> {
        self.entries.get(key).map(|entry| entry.ref_count)
    }

    /// Take another reference to an Active key.
    pub fn add_ref(&mut self, key: &SuiteKey) -> Result<SuitePtr, BrokerError> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| BrokerError::NotRegistered { key: key.clone() })?;
        entry.ref_count = entry.ref_count.saturating_add(1);
        tracing::debug!(suite = %key, refs = entry.ref_count, "suite referenced");
        Ok(SuitePtr(entry.block.non_null()))
    }

    /// Drop one reference to `key`.
    ///
    /// Returns `true` when this was the last reference and the table was
    /// freed. Releasing an unregistered key is a no-op.
    pub fn remove_ref(&mut self, key: &SuiteKey) -> Result<bool, ArenaError> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.ref_count > 1 {
            entry.ref_count -= 1;
            tracing::debug!(suite = %key, refs = entry.ref_count, "suite released");
            return Ok(false);
        }
        if let Some(entry) = self.entries.shift_remove(key) {
            self.arena.free(entry.block)?;
            tracing::debug!(suite = %key, "suite freed");
        }
        Ok(true)
    }

    /// Number of Active keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are Active.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &SuiteKey> {
        self.entries.keys()
    }

    /// Force-free every Active table regardless of its count.
    ///
    /// Visits every entry. Returns how many were forced, or the first
    /// fatal arena error.
    pub fn dispose(&mut self) -> Result<usize, ArenaError> {
        let mut forced = 0;
        let mut first_fault = None;
        for (key, entry) in self.entries.drain(..) {
            tracing::warn!(
                suite = %key,
                refs = entry.ref_count,
                "suite still referenced at teardown"
            );
            forced += 1;
            if let Err(e) = self.arena.free(entry.block) {
                first_fault.get_or_insert(e);
            }
        }
        match first_fault {
            Some(e) => Err(e),
            None => Ok(forced),
        }
    }
}
