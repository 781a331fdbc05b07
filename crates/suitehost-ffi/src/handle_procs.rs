//! Handle callback table.
//!
//! Handles are relocatable: their address is only stable between a lock
//! and the matching unlock, and a locked handle cannot be resized.

use std::convert::Infallible;
use std::ptr;

use suitehost_core::HandleId;
use suitehost_host::HandleError;

use crate::scope::in_session;
use crate::status::{host_code, HostStatus};
use crate::types::{OSErr, SPBoolean, Token};

/// Table version advertised in [`HandleProcs::version`].
pub const HANDLE_PROCS_VERSION: i16 = 1;

/// Number of callbacks in [`HandleProcs`].
pub const HANDLE_PROCS_COUNT: i16 = 6;

/// Handle callbacks handed to plugins.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HandleProcs {
    /// Table version.
    pub version: i16,
    /// Number of callbacks that follow.
    pub count: i16,
    /// Allocate a zeroed handle of `size` bytes. Returns 0 on failure.
    pub new_handle: extern "C" fn(size: i32) -> Token,
    /// Release a handle. Unknown tokens are ignored.
    pub dispose: extern "C" fn(handle: Token),
    /// Size of a handle in bytes, or 0 for an unknown token.
    pub get_size: extern "C" fn(handle: Token) -> i32,
    /// Resize an unlocked handle.
    pub set_size: extern "C" fn(handle: Token, size: i32) -> OSErr,
    /// Pin a handle and return its address, or null for an unknown token.
    pub lock: extern "C" fn(handle: Token, move_high: SPBoolean) -> *mut u8,
    /// Undo one `lock`.
    pub unlock: extern "C" fn(handle: Token),
}

// Compile-time layout assertions for ABI stability.
// 2×i16 + 4 bytes padding + 6 function pointers = 56 bytes, align 8.
const _: () = assert!(std::mem::size_of::<HandleProcs>() == 56);
const _: () = assert!(std::mem::align_of::<HandleProcs>() == 8);

static HANDLE_PROCS: HandleProcs = HandleProcs {
    version: HANDLE_PROCS_VERSION,
    count: HANDLE_PROCS_COUNT,
    new_handle,
    dispose: dispose_handle,
    get_size: get_handle_size,
    set_size: set_handle_size,
    lock: lock_handle,
    unlock: unlock_handle,
};

/// The handle callback table. Valid for the life of the process.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_handle_procs() -> *const HandleProcs {
    &HANDLE_PROCS
}

extern "C" fn new_handle(size: i32) -> Token {
    ffi_guard_or!(0, {
        match in_session(|s| s.handles(|h| h.new_handle(size))) {
            Ok(id) => id.to_raw(),
            Err(e) => {
                tracing::debug!(size, error = %e, "handle allocation failed");
                0
            }
        }
    })
}

extern "C" fn dispose_handle(handle: Token) {
    ffi_guard_or!((), {
        let Some(id) = HandleId::from_raw(handle) else {
            return;
        };
        match in_session(|s| s.handles(|h| h.dispose(id))) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(%id, "dispose of unknown handle ignored"),
            Err(e) => tracing::debug!(%id, error = %e, "handle dispose failed"),
        }
    })
}

extern "C" fn get_handle_size(handle: Token) -> i32 {
    ffi_guard_or!(0, {
        let Some(id) = HandleId::from_raw(handle) else {
            return 0;
        };
        in_session(|s| s.handles(|h| Ok::<_, Infallible>(h.size_of(id))))
            .ok()
            .flatten()
            .map_or(0, |len| i32::try_from(len).unwrap_or(i32::MAX))
    })
}

extern "C" fn set_handle_size(handle: Token, size: i32) -> OSErr {
    ffi_guard!(HostStatus, {
        let Some(id) = HandleId::from_raw(handle) else {
            return HostStatus::NilHandleErr as i16;
        };
        host_code(in_session(|s| s.handles(|h| h.set_size(id, size))))
    })
}

extern "C" fn lock_handle(handle: Token, _move_high: SPBoolean) -> *mut u8 {
    ffi_guard_or!(ptr::null_mut(), {
        let Some(id) = HandleId::from_raw(handle) else {
            return ptr::null_mut();
        };
        in_session(|s| s.handles(|h| h.lock(id).ok_or(HandleError::NotFound { id })))
            .unwrap_or(ptr::null_mut())
    })
}

extern "C" fn unlock_handle(handle: Token) {
    ffi_guard_or!((), {
        if let Some(id) = HandleId::from_raw(handle) {
            let _ = in_session(|s| {
                s.handles(|h| {
                    h.unlock(id);
                    Ok::<_, Infallible>(())
                })
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::SessionScope;
    use suitehost_host::{HostSession, SessionConfig};
    use suitehost_test_utils::TrackingHeap;

    #[allow(unsafe_code)]
    fn procs() -> &'static HandleProcs {
        // SAFETY: points at a static.
        unsafe { &*suitehost_handle_procs() }
    }

    #[allow(unsafe_code)]
    fn read(addr: *const u8, len: usize) -> Vec<u8> {
        // SAFETY: test callers pass a locked handle address and its size.
        unsafe { std::slice::from_raw_parts(addr, len) }.to_vec()
    }

    #[test]
    fn new_handle_is_zeroed_and_sized() {
        let heap = TrackingHeap::new();
        let session = HostSession::with_heap(SessionConfig::default(), heap.clone()).unwrap();
        SessionScope::enter(&session, || {
            let p = procs();
            let h = (p.new_handle)(16);
            assert_ne!(h, 0);
            assert_eq!((p.get_size)(h), 16);
            let addr = (p.lock)(h, 0);
            assert_eq!(read(addr, 16), vec![0; 16]);
            (p.unlock)(h);
            (p.dispose)(h);
            assert_eq!((p.get_size)(h), 0);
        });
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn locked_handle_refuses_resize() {
        let session = HostSession::new(SessionConfig::default()).unwrap();
        SessionScope::enter(&session, || {
            let p = procs();
            let h = (p.new_handle)(8);
            (p.lock)(h, 0);
            assert_eq!((p.set_size)(h, 64), HostStatus::MemLockedErr as i16);
            (p.unlock)(h);
            assert_eq!((p.set_size)(h, 64), HostStatus::NoErr as i16);
            assert_eq!((p.get_size)(h), 64);
        });
    }

    #[test]
    fn unknown_handles() {
        let session = HostSession::new(SessionConfig::default()).unwrap();
        SessionScope::enter(&session, || {
            let p = procs();
            assert_eq!((p.set_size)(0, 4), HostStatus::NilHandleErr as i16);
            assert_eq!((p.set_size)(0xdead, 4), HostStatus::NilHandleErr as i16);
            assert!((p.lock)(0xdead, 0).is_null());
            assert_eq!((p.new_handle)(-4), 0);
            (p.dispose)(0xdead);
        });
    }
}
