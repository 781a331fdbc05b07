//! Low-level heap primitives: the provider trait, the system heap, and
//! the [`MemoryBlock`] type that owns one allocation.
//!
//! This is the only module in the crate that contains `unsafe` code. Every
//! block carries a small header written by the provider so that `free`
//! and `resize` can detect a pointer the provider never produced (or one
//! whose header was trampled) and report it as a [`HeapFault`] instead of
//! corrupting the process heap further.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;

use crate::meminfo;

/// Alignment of every block handed out. Suite tables and plugin buffers
/// both rely on at least pointer alignment.
pub const BLOCK_ALIGN: usize = 16;

/// Bytes reserved in front of each block for provider bookkeeping.
pub const HEADER_BYTES: usize = 16;

const LIVE_MAGIC: usize = 0x5348_4c56_424c_4b21_u64 as usize;

/// A failure reported by the heap provider while releasing or resizing.
///
/// Faults mean the heap can no longer be trusted; callers treat them as
/// fatal for the whole session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapFault {
    /// The block header did not carry the provider's live marker.
    BadHeader {
        /// Address of the block as seen by the caller.
        address: usize,
    },
    /// The provider refused the operation for a provider-specific reason.
    Rejected {
        /// Description supplied by the provider.
        reason: String,
    },
}

impl fmt::Display for HeapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadHeader { address } => {
                write!(f, "block at {address:#x} has a corrupt or foreign header")
            }
            Self::Rejected { reason } => write!(f, "heap provider rejected operation: {reason}"),
        }
    }
}

impl std::error::Error for HeapFault {}

/// An OS-style heap: allocate, free, resize, size, and free-memory query.
///
/// Implementations return [`BLOCK_ALIGN`]-aligned pointers.
pub trait HeapProvider {
    /// Allocate `size` bytes, zeroed if `zero_fill`. `None` means out of memory.
    fn allocate(&self, size: usize, zero_fill: bool) -> Option<NonNull<u8>>;

    /// Release a block.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` or `resize` on this
    /// provider and not released since.
    unsafe fn free(&self, ptr: NonNull<u8>) -> Result<(), HeapFault>;

    /// Resize a block, preserving contents up to the smaller size.
    ///
    /// `Ok(None)` means out of memory; the original block is untouched.
    ///
    /// # Safety
    ///
    /// Same contract as [`free`](Self::free). On `Ok(Some(_))` the old
    /// pointer is invalidated.
    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize)
        -> Result<Option<NonNull<u8>>, HeapFault>;

    /// Usable size of a live block.
    ///
    /// # Safety
    ///
    /// Same contract as [`free`](Self::free).
    unsafe fn size_of(&self, ptr: NonNull<u8>) -> usize;

    /// Free memory the provider could still hand out, in bytes.
    fn available_memory(&self) -> u64;
}

/// Heap provider backed by the global Rust allocator.
///
/// Each allocation is prefixed by a header holding the usable size and a
/// live marker. The marker is checked on `free`/`resize`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHeap;

impl SystemHeap {
    fn layout_for(size: usize) -> Option<Layout> {
        let total = size.checked_add(HEADER_BYTES)?;
        Layout::from_size_align(total, BLOCK_ALIGN).ok()
    }

    /// Recover the allocation base and validate the header.
    unsafe fn header_of(ptr: NonNull<u8>) -> Result<(*mut u8, usize), HeapFault> {
        // SAFETY: every pointer we hand out sits HEADER_BYTES past its base.
        let base = unsafe { ptr.as_ptr().sub(HEADER_BYTES) };
        let words = base as *const usize;
        // SAFETY: the header lies inside the same allocation and is aligned.
        let (size, magic) = unsafe { (words.read(), words.add(1).read()) };
        if magic != LIVE_MAGIC {
            return Err(HeapFault::BadHeader {
                address: ptr.as_ptr() as usize,
            });
        }
        Ok((base, size))
    }

    unsafe fn stamp(base: *mut u8, size: usize) -> NonNull<u8> {
        let words = base as *mut usize;
        // SAFETY: base is a fresh allocation of at least HEADER_BYTES, aligned to 16.
        unsafe {
            words.write(size);
            words.add(1).write(LIVE_MAGIC);
            NonNull::new_unchecked(base.add(HEADER_BYTES))
        }
    }
}

impl HeapProvider for SystemHeap {
    fn allocate(&self, size: usize, zero_fill: bool) -> Option<NonNull<u8>> {
        let layout = Self::layout_for(size)?;
        // SAFETY: layout has non-zero size (the header is always present).
        let base = unsafe {
            if zero_fill {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        if base.is_null() {
            return None;
        }
        // SAFETY: base is a live allocation described by `layout`.
        Some(unsafe { Self::stamp(base, size) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>) -> Result<(), HeapFault> {
        // SAFETY: caller contract.
        let (base, size) = unsafe { Self::header_of(ptr)? };
        let layout = Self::layout_for(size).ok_or_else(|| HeapFault::Rejected {
            reason: format!("recorded size {size} has no valid layout"),
        })?;
        // SAFETY: clear the marker so a stale pointer is caught if the
        // memory is handed back unchanged, then release with the original layout.
        unsafe {
            (base as *mut usize).add(1).write(0);
            alloc::dealloc(base, layout);
        }
        Ok(())
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, HeapFault> {
        // SAFETY: caller contract.
        let (base, size) = unsafe { Self::header_of(ptr)? };
        let old_layout = Self::layout_for(size).ok_or_else(|| HeapFault::Rejected {
            reason: format!("recorded size {size} has no valid layout"),
        })?;
        let Some(new_layout) = Self::layout_for(new_size) else {
            return Ok(None);
        };
        // SAFETY: base/old_layout describe a live allocation; new size is non-zero.
        let new_base = unsafe { alloc::realloc(base, old_layout, new_layout.size()) };
        if new_base.is_null() {
            return Ok(None);
        }
        // SAFETY: new_base is live with the new layout.
        Ok(Some(unsafe { Self::stamp(new_base, new_size) }))
    }

    unsafe fn size_of(&self, ptr: NonNull<u8>) -> usize {
        // SAFETY: caller contract.
        match unsafe { Self::header_of(ptr) } {
            Ok((_, size)) => size,
            Err(_) => 0,
        }
    }

    fn available_memory(&self) -> u64 {
        meminfo::available_bytes().unwrap_or(u64::MAX)
    }
}

/// One allocation drawn from a [`MemoryArena`](crate::MemoryArena).
///
/// Exclusively owned by whichever component allocated it; it is neither
/// `Clone` nor `Copy` and has no `Drop`. It must be handed back to the
/// arena that produced it, otherwise the memory leaks.
#[derive(Debug)]
#[must_use]
pub struct MemoryBlock {
    ptr: NonNull<u8>,
    size: usize,
}

impl MemoryBlock {
    pub(crate) fn new(ptr: NonNull<u8>, size: usize) -> Self {
        Self { ptr, size }
    }

    /// Address of the first usable byte as a non-null pointer.
    pub fn non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn set(&mut self, ptr: NonNull<u8>, size: usize) {
        self.ptr = ptr;
        self.size = size;
    }

    /// Usable size in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the block has zero usable bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Address of the first usable byte.
    ///
    /// Only the boundary layer should turn this into something a plugin
    /// can see.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Whether `address` falls inside this block.
    pub fn contains_address(&self, address: usize) -> bool {
        let start = self.ptr.as_ptr() as usize;
        address >= start && address < start + self.size.max(1)
    }

    /// Block contents.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the block owns `size` initialised-or-zeroed bytes at `ptr`
        // for as long as it exists; freeing consumes it.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// Mutable block contents.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    /// Store a `#[repr(C)]` value at the start of the block.
    ///
    /// Returns `false` (and writes nothing) if the block is too small or
    /// misaligned for `T`.
    pub fn write_value<T: Copy>(&mut self, value: T) -> bool {
        if self.size < std::mem::size_of::<T>()
            || (self.ptr.as_ptr() as usize) % std::mem::align_of::<T>() != 0
        {
            return false;
        }
        // SAFETY: size and alignment checked above; T is Copy so no drop glue.
        unsafe { (self.ptr.as_ptr() as *mut T).write(value) };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_heap_round_trip() {
        let heap = SystemHeap;
        let ptr = heap.allocate(64, true).unwrap();
        assert_eq!(ptr.as_ptr() as usize % BLOCK_ALIGN, 0);
        assert_eq!(unsafe { heap.size_of(ptr) }, 64);
        assert!(unsafe { heap.free(ptr) }.is_ok());
    }

    #[test]
    fn zero_fill_is_honoured() {
        let heap = SystemHeap;
        let ptr = heap.allocate(256, true).unwrap();
        let block = MemoryBlock::new(ptr, 256);
        assert!(block.as_slice().iter().all(|&b| b == 0));
        unsafe { heap.free(ptr) }.unwrap();
    }

    #[test]
    fn resize_preserves_prefix() {
        let heap = SystemHeap;
        let ptr = heap.allocate(8, true).unwrap();
        let mut block = MemoryBlock::new(ptr, 8);
        block.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let grown = unsafe { heap.resize(ptr, 4096) }.unwrap().unwrap();
        let block = MemoryBlock::new(grown, 4096);
        assert_eq!(&block.as_slice()[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(unsafe { heap.size_of(grown) }, 4096);
        unsafe { heap.free(grown) }.unwrap();
    }

    #[test]
    fn foreign_pointer_is_a_fault() {
        let heap = SystemHeap;
        // A zeroed buffer large enough to hold a fake header in front.
        let mut backing = vec![0u128; 4];
        let fake = NonNull::new(unsafe { (backing.as_mut_ptr() as *mut u8).add(HEADER_BYTES) })
            .unwrap();
        assert!(matches!(
            unsafe { heap.free(fake) },
            Err(HeapFault::BadHeader { .. })
        ));
    }

    #[test]
    fn write_value_checks_size() {
        let heap = SystemHeap;
        let ptr = heap.allocate(4, true).unwrap();
        let mut block = MemoryBlock::new(ptr, 4);
        assert!(!block.write_value(0u64));
        assert!(block.write_value(0xABCD_u32));
        assert_eq!(block.as_slice(), &0xABCD_u32.to_ne_bytes());
        unsafe { heap.free(ptr) }.unwrap();
    }
}
