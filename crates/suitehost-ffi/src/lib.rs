//! C ABI for the suitehost plugin host.
//!
//! Two surfaces live here. Plugins see callback tables ([`BufferProcs`],
//! [`HandleProcs`], two [`ResourceProcs`]) and the suites reachable
//! through [`SPBasicSuite`]. Hosts see the `suitehost_session_*` API,
//! which creates sessions and marks one active around each plugin call.
//!
//! Every exported function is wrapped in a panic guard: a panic never
//! unwinds into C. It is logged, its message kept for
//! [`suitehost_last_panic_message`], and the call returns the abort
//! status of its family.
//!
//! This crate is one of two that may contain `unsafe` code (along with
//! `suitehost-arena`).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!(
    "suitehost-ffi passes handle tokens through pointer-sized slots and requires a 64-bit target"
);

use std::cell::RefCell;
use std::ffi::c_char;

thread_local! {
    pub(crate) static LAST_PANIC: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Keep the message of a caught panic for [`suitehost_last_panic_message`].
pub(crate) fn record_panic(payload: &(dyn std::any::Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".to_owned());
    tracing::error!(%message, "panic caught at the plugin boundary");
    LAST_PANIC.with(|cell| *cell.borrow_mut() = message);
}

/// Run `$body`, returning `$fallback` if it panics.
macro_rules! ffi_guard_or {
    ($fallback:expr, $body:block) => {{
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(payload) => {
                $crate::record_panic(payload.as_ref());
                $fallback
            }
        }
    }};
}

/// Run `$body`, returning the family's abort status if it panics.
macro_rules! ffi_guard {
    (HostStatus, $body:block) => {
        ffi_guard_or!($crate::status::HostStatus::Aborted as i16, $body)
    };
    (SuiteStatus, $body:block) => {
        ffi_guard_or!($crate::status::SuiteStatus::Aborted as i32, $body)
    };
}

pub mod basic;
pub mod buffer_procs;
pub mod handle_procs;
pub mod resource_procs;
pub mod scope;
pub mod session;
pub mod status;
pub mod suites;
pub mod types;

pub use basic::{suitehost_basic_suite, PublishedSuites, SPBasicSuite};
pub use buffer_procs::{suitehost_buffer_procs, BufferProcs};
pub use handle_procs::{suitehost_handle_procs, HandleProcs};
pub use resource_procs::{suitehost_pseudo_resource_procs, suitehost_resource_procs, ResourceProcs};
pub use scope::SessionScope;
pub use session::{SuitehostSessionConfig, SuitehostTeardownReport};
pub use status::{HostStatus, SuiteStatus};
pub use suites::{BufferSuite1, ColorSpaceSuite1, ErrorSuite1, UIHooksSuite1, ZStringSuite1};

/// Copy the message of the last panic caught on this thread into `buf`.
///
/// Returns the full message length in bytes, not counting the NUL, or 0
/// if no panic has been caught. At most `cap - 1` bytes are copied and
/// the copy is always NUL-terminated. Pass a null `buf` to query the
/// length.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_last_panic_message(buf: *mut c_char, cap: usize) -> i32 {
    LAST_PANIC.with(|cell| copy_message(cell.borrow().as_bytes(), buf, cap))
}

/// Copy `bytes` into a C buffer of `cap` bytes, truncating and always
/// NUL-terminating. Returns the untruncated length.
#[allow(unsafe_code)]
pub(crate) fn copy_message(bytes: &[u8], buf: *mut c_char, cap: usize) -> i32 {
    if !buf.is_null() && cap > 0 {
        let n = bytes.len().min(cap - 1);
        // SAFETY: caller guarantees `buf` points to at least `cap` writable bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), n);
            *buf.add(n) = 0;
        }
    }
    i32::try_from(bytes.len()).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{HostStatus, SuiteStatus};

    fn last_panic() -> String {
        let len = suitehost_last_panic_message(std::ptr::null_mut(), 0);
        let mut buf = vec![0u8; len as usize + 1];
        suitehost_last_panic_message(buf.as_mut_ptr().cast(), buf.len());
        String::from_utf8(buf[..len as usize].to_vec()).unwrap()
    }

    #[test]
    fn guard_passes_value_through() {
        let status = ffi_guard!(HostStatus, { HostStatus::NoErr as i16 });
        assert_eq!(status, 0);
    }

    #[test]
    fn guard_maps_panic_to_abort_status() {
        let host = ffi_guard!(HostStatus, {
            panic!("host family panic");
        });
        assert_eq!(host, -128);
        assert_eq!(last_panic(), "host family panic");

        let suite = ffi_guard!(SuiteStatus, {
            panic!("suite family {}", 2);
        });
        assert_eq!(suite, SuiteStatus::Aborted as i32);
        assert_eq!(last_panic(), "suite family 2");
    }

    #[test]
    fn panic_message_is_truncated_and_terminated() {
        LAST_PANIC.with(|cell| *cell.borrow_mut() = "abcdef".to_owned());
        let mut buf = [0x7fu8; 4];
        let len = suitehost_last_panic_message(buf.as_mut_ptr().cast(), buf.len());
        assert_eq!(len, 6);
        assert_eq!(&buf, b"abc\0");
    }

    #[test]
    fn no_panic_reports_zero() {
        LAST_PANIC.with(|cell| cell.borrow_mut().clear());
        assert_eq!(suitehost_last_panic_message(std::ptr::null_mut(), 0), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn copy_always_terminates_within_cap(
                message in proptest::collection::vec(1u8..=255, 0..64),
                cap in 1usize..80,
            ) {
                let mut buf = vec![0xaau8; cap];
                let len = copy_message(&message, buf.as_mut_ptr().cast(), cap);
                prop_assert_eq!(len as usize, message.len());
                let copied = message.len().min(cap - 1);
                prop_assert_eq!(&buf[..copied], &message[..copied]);
                prop_assert_eq!(buf[copied], 0);
            }
        }
    }
}
