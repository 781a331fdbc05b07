//! Buffer callback table.
//!
//! Buffers are identified by token. Blocks never move, so lock is a
//! lookup and unlock does nothing beyond validating the token.

use std::convert::Infallible;
use std::ptr;

use suitehost_core::BufferId;

use crate::scope::in_session;
use crate::status::HostStatus;
use crate::types::{OSErr, SPBoolean, Token};

/// Table version advertised in [`BufferProcs::version`].
pub const BUFFER_PROCS_VERSION: i16 = 2;

/// Number of callbacks in [`BufferProcs`].
pub const BUFFER_PROCS_COUNT: i16 = 5;

/// Buffer callbacks handed to plugins.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BufferProcs {
    /// Table version.
    pub version: i16,
    /// Number of callbacks that follow.
    pub count: i16,
    /// Allocate `size` bytes; the token goes to `out`.
    pub allocate: extern "C" fn(size: i32, out: *mut Token) -> OSErr,
    /// Address of a buffer, or null for an unknown token.
    pub lock: extern "C" fn(buffer: Token, move_high: SPBoolean) -> *mut u8,
    /// Counterpart of `lock`.
    pub unlock: extern "C" fn(buffer: Token),
    /// Release a buffer. Unknown tokens are ignored.
    pub free: extern "C" fn(buffer: Token),
    /// Advisory number of bytes a single allocation may get.
    pub space: extern "C" fn() -> i32,
}

// Compile-time layout assertions for ABI stability.
// 2×i16 + 4 bytes padding + 5 function pointers = 48 bytes, align 8.
const _: () = assert!(std::mem::size_of::<BufferProcs>() == 48);
const _: () = assert!(std::mem::align_of::<BufferProcs>() == 8);

static BUFFER_PROCS: BufferProcs = BufferProcs {
    version: BUFFER_PROCS_VERSION,
    count: BUFFER_PROCS_COUNT,
    allocate: allocate_buffer,
    lock: lock_buffer,
    unlock: unlock_buffer,
    free: free_buffer,
    space: buffer_space,
};

/// The buffer callback table. Valid for the life of the process.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_buffer_procs() -> *const BufferProcs {
    &BUFFER_PROCS
}

#[allow(unsafe_code)]
extern "C" fn allocate_buffer(size: i32, out: *mut Token) -> OSErr {
    ffi_guard!(HostStatus, {
        if out.is_null() {
            return HostStatus::ParamErr as i16;
        }
        let result = in_session(|s| s.buffers(|b| b.allocate(size)));
        // SAFETY: `out` is non-null and the caller passes a writable token slot.
        match result {
            Ok(id) => {
                unsafe { *out = id.to_raw() };
                HostStatus::NoErr as i16
            }
            Err(e) => {
                unsafe { *out = 0 };
                HostStatus::from(&e) as i16
            }
        }
    })
}

extern "C" fn lock_buffer(buffer: Token, _move_high: SPBoolean) -> *mut u8 {
    ffi_guard_or!(ptr::null_mut(), {
        let Some(id) = BufferId::from_raw(buffer) else {
            return ptr::null_mut();
        };
        in_session(|s| s.buffers(|b| Ok::<_, Infallible>(b.lock(id))))
            .ok()
            .flatten()
            .unwrap_or(ptr::null_mut())
    })
}

extern "C" fn unlock_buffer(buffer: Token) {
    ffi_guard_or!((), {
        if let Some(id) = BufferId::from_raw(buffer) {
            let _ = in_session(|s| {
                s.buffers(|b| {
                    b.unlock(id);
                    Ok::<_, Infallible>(())
                })
            });
        }
    })
}

extern "C" fn free_buffer(buffer: Token) {
    ffi_guard_or!((), {
        let Some(id) = BufferId::from_raw(buffer) else {
            return;
        };
        if let Err(e) = in_session(|s| s.buffers(|b| b.free(id))) {
            tracing::debug!(%id, error = %e, "buffer free failed");
        }
    })
}

extern "C" fn buffer_space() -> i32 {
    ffi_guard_or!(0, {
        in_session(|s| s.buffers(|b| Ok::<_, Infallible>(b.available_space())))
            .map_or(0, |space| i32::try_from(space).unwrap_or(i32::MAX))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::SessionScope;
    use suitehost_host::{HostSession, SessionConfig};
    use suitehost_test_utils::TrackingHeap;

    #[allow(unsafe_code)]
    fn procs() -> &'static BufferProcs {
        // SAFETY: points at a static.
        unsafe { &*suitehost_buffer_procs() }
    }

    fn session() -> (HostSession, TrackingHeap) {
        let heap = TrackingHeap::new();
        heap.set_available(8 << 30);
        (
            HostSession::with_heap(SessionConfig::default(), heap.clone()).unwrap(),
            heap,
        )
    }

    #[test]
    fn header_advertises_five_callbacks() {
        assert_eq!(procs().version, BUFFER_PROCS_VERSION);
        assert_eq!(procs().count, 5);
    }

    #[test]
    fn allocate_lock_free_round_trip() {
        let (session, heap) = session();
        SessionScope::enter(&session, || {
            let p = procs();
            let before = (p.space)();
            let mut token = 0;
            assert_eq!((p.allocate)(100, &mut token), 0);
            assert_ne!(token, 0);
            let addr = (p.lock)(token, 0);
            assert!(!addr.is_null());
            (p.unlock)(token);
            (p.free)(token);
            assert!((p.lock)(token, 0).is_null());
            assert_eq!((p.space)(), before);
        });
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn negative_size_is_param_err() {
        let (session, heap) = session();
        SessionScope::enter(&session, || {
            let mut token = 7;
            assert_eq!((procs().allocate)(-1, &mut token), HostStatus::ParamErr as i16);
            assert_eq!(token, 0);
        });
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn exhausted_heap_is_mem_full() {
        let (session, heap) = session();
        heap.fail_next_allocations(1);
        SessionScope::enter(&session, || {
            let mut token = 0;
            assert_eq!((procs().allocate)(64, &mut token), HostStatus::MemFullErr as i16);
        });
        assert!(session.fault().is_none());
    }

    #[test]
    fn null_out_is_param_err() {
        let (session, _heap) = session();
        SessionScope::enter(&session, || {
            assert_eq!(
                (procs().allocate)(8, ptr::null_mut()),
                HostStatus::ParamErr as i16
            );
        });
    }

    #[test]
    fn no_session_aborts() {
        let mut token = 0;
        assert_eq!((procs().allocate)(8, &mut token), HostStatus::Aborted as i16);
        assert_eq!((procs().space)(), 0);
        (procs().free)(1);
    }
}
