//! Allocation-tracking heap provider with fault injection.
//!
//! Wraps [`SystemHeap`] and records every allocation and release by
//! address. Clones share state, so a test can keep one clone for
//! inspection while the arena owns the other.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;
use std::rc::Rc;

use suitehost_arena::{ArenaConfig, HeapFault, HeapProvider, MemoryArena, SystemHeap};

#[derive(Default)]
struct TrackingState {
    live: HashMap<usize, usize>,
    freed: HashSet<usize>,
    free_counts: HashMap<usize, u32>,
    allocations: u64,
    frees: u64,
    fail_allocations: u32,
    fault_next_free: bool,
    fault_next_resize: bool,
    available: Option<u64>,
}

/// Heap provider that counts allocations and releases per address.
#[derive(Clone, Default)]
pub struct TrackingHeap {
    inner: SystemHeap,
    state: Rc<RefCell<TrackingState>>,
}

impl TrackingHeap {
    /// Create a tracker with no injected faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an arena over a clone of this tracker.
    pub fn arena(&self) -> Rc<MemoryArena> {
        self.arena_with(ArenaConfig::default())
    }

    /// Build an arena over a clone of this tracker with explicit config.
    pub fn arena_with(&self, config: ArenaConfig) -> Rc<MemoryArena> {
        Rc::new(MemoryArena::new(self.clone(), config))
    }

    /// Number of blocks currently live.
    pub fn live_blocks(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Bytes currently live.
    pub fn live_bytes(&self) -> usize {
        self.state.borrow().live.values().sum()
    }

    /// Total successful allocations.
    pub fn allocations(&self) -> u64 {
        self.state.borrow().allocations
    }

    /// Total successful releases.
    pub fn frees(&self) -> u64 {
        self.state.borrow().frees
    }

    /// How many times the block at `address` has been released.
    pub fn free_count(&self, address: usize) -> u32 {
        self.state
            .borrow()
            .free_counts
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    /// Whether `address` is a live block.
    pub fn is_live(&self, address: usize) -> bool {
        self.state.borrow().live.contains_key(&address)
    }

    /// Make the next `n` allocations (and resizes) report out-of-memory.
    pub fn fail_next_allocations(&self, n: u32) {
        self.state.borrow_mut().fail_allocations = n;
    }

    /// Make the next release report a provider fault.
    pub fn fault_next_free(&self) {
        self.state.borrow_mut().fault_next_free = true;
    }

    /// Make the next resize report a provider fault.
    pub fn fault_next_resize(&self) {
        self.state.borrow_mut().fault_next_resize = true;
    }

    /// Override the free-memory figure reported to the arena.
    pub fn set_available(&self, bytes: u64) {
        self.state.borrow_mut().available = Some(bytes);
    }

    fn take_allocation_failure(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.fail_allocations > 0 {
            state.fail_allocations -= 1;
            true
        } else {
            false
        }
    }
}

impl HeapProvider for TrackingHeap {
    fn allocate(&self, size: usize, zero_fill: bool) -> Option<NonNull<u8>> {
        if self.take_allocation_failure() {
            return None;
        }
        let ptr = self.inner.allocate(size, zero_fill)?;
        let mut state = self.state.borrow_mut();
        let address = ptr.as_ptr() as usize;
        state.live.insert(address, size);
        state.freed.remove(&address);
        state.allocations += 1;
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) -> Result<(), HeapFault> {
        let address = ptr.as_ptr() as usize;
        {
            let mut state = self.state.borrow_mut();
            if std::mem::take(&mut state.fault_next_free) {
                return Err(HeapFault::Rejected {
                    reason: "injected free fault".into(),
                });
            }
            if state.live.remove(&address).is_none() {
                *state.free_counts.entry(address).or_default() += 1;
                let reason = if state.freed.contains(&address) {
                    format!("double release of block {address:#x}")
                } else {
                    format!("release of untracked block {address:#x}")
                };
                return Err(HeapFault::Rejected { reason });
            }
            state.freed.insert(address);
            *state.free_counts.entry(address).or_default() += 1;
            state.frees += 1;
        }
        // SAFETY: address was live in this tracker, so it came from `inner`.
        unsafe { self.inner.free(ptr) }
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, HeapFault> {
        let address = ptr.as_ptr() as usize;
        if std::mem::take(&mut self.state.borrow_mut().fault_next_resize) {
            return Err(HeapFault::Rejected {
                reason: "injected resize fault".into(),
            });
        }
        if !self.is_live(address) {
            return Err(HeapFault::Rejected {
                reason: format!("resize of untracked block {address:#x}"),
            });
        }
        if self.take_allocation_failure() {
            return Ok(None);
        }
        // SAFETY: address is live in this tracker.
        let Some(new_ptr) = (unsafe { self.inner.resize(ptr, new_size)? }) else {
            return Ok(None);
        };
        let mut state = self.state.borrow_mut();
        state.live.remove(&address);
        state.live.insert(new_ptr.as_ptr() as usize, new_size);
        Ok(Some(new_ptr))
    }

    unsafe fn size_of(&self, ptr: NonNull<u8>) -> usize {
        self.state
            .borrow()
            .live
            .get(&(ptr.as_ptr() as usize))
            .copied()
            .unwrap_or(0)
    }

    fn available_memory(&self) -> u64 {
        self.state
            .borrow()
            .available
            .unwrap_or_else(|| self.inner.available_memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_allocate_and_free() {
        let heap = TrackingHeap::new();
        let arena = heap.arena();
        let block = arena.allocate(32, true).unwrap();
        let address = block.as_ptr() as usize;
        assert!(heap.is_live(address));
        assert_eq!(heap.live_bytes(), 32);
        arena.free(block).unwrap();
        assert!(!heap.is_live(address));
        assert_eq!(heap.free_count(address), 1);
        assert_eq!(heap.frees(), 1);
    }

    #[test]
    fn injected_allocation_failure() {
        let heap = TrackingHeap::new();
        let arena = heap.arena();
        heap.fail_next_allocations(1);
        assert!(arena.allocate(8, false).is_err());
        let block = arena.allocate(8, false).unwrap();
        arena.free(block).unwrap();
    }

    #[test]
    fn second_release_is_reported_as_double() {
        let heap = TrackingHeap::new();
        let ptr = heap.allocate(16, false).unwrap();
        let address = ptr.as_ptr() as usize;
        // SAFETY: `ptr` came from this heap and is released once here.
        unsafe { heap.free(ptr) }.unwrap();
        // SAFETY: the tracker rejects the stale address before touching it.
        let fault = unsafe { heap.free(ptr) }.unwrap_err();
        assert_eq!(
            fault,
            HeapFault::Rejected {
                reason: format!("double release of block {address:#x}")
            }
        );
        assert_eq!(heap.free_count(address), 2);
        assert_eq!(heap.frees(), 1);

        let mut local = [0u8; 8];
        let stray = NonNull::from(&mut local).cast::<u8>();
        // SAFETY: never tracked, so the tracker rejects it.
        let fault = unsafe { heap.free(stray) }.unwrap_err();
        assert!(matches!(
            fault,
            HeapFault::Rejected { reason } if reason.starts_with("release of untracked")
        ));
    }

    #[test]
    fn injected_free_fault_is_fatal() {
        let heap = TrackingHeap::new();
        let arena = heap.arena();
        let block = arena.allocate(8, false).unwrap();
        heap.fault_next_free();
        assert!(arena.free(block).unwrap_err().is_fatal());
    }
}
