//! The basic suite and the catalog of published tables.
//!
//! "SP Basic Suite" is the plugin's entry into everything else: it
//! acquires and releases the other suites by name and version, and hands
//! out raw arena blocks tracked by address.

use std::ffi::{c_char, c_void, CStr};

use suitehost_core::SuiteKey;
use suitehost_host::{BrokerError, SuiteCatalog, SuiteKind, SuitePtr, SuiteRegistry};

use crate::scope::in_session;
use crate::status::{suite_code, SuiteStatus};
use crate::suites::{BUFFER_SUITE, COLORSPACE_SUITE, ERROR_SUITE, UIHOOKS_SUITE, ZSTRING_SUITE};
use crate::types::{SPBoolean, SPErr};

/// "SP Basic Suite" version 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SPBasicSuite {
    /// Acquire the suite `name` at `version`; its table address goes to
    /// `out`.
    pub acquire_suite:
        extern "C" fn(name: *const c_char, version: i32, out: *mut *const c_void) -> SPErr,
    /// Drop one reference to a suite.
    pub release_suite: extern "C" fn(name: *const c_char, version: i32) -> SPErr,
    /// Whether two NUL-terminated tokens are equal.
    pub is_equal: extern "C" fn(token1: *const c_char, token2: *const c_char) -> SPBoolean,
    /// Allocate `size` bytes; the address goes to `out`.
    pub allocate_block: extern "C" fn(size: usize, out: *mut *mut c_void) -> SPErr,
    /// Release a block from `allocate_block`.
    pub free_block: extern "C" fn(block: *mut c_void) -> SPErr,
    /// Resize a block, which may move it. A null block allocates.
    pub reallocate_block:
        extern "C" fn(block: *mut c_void, new_size: usize, out: *mut *mut c_void) -> SPErr,
    /// Placeholder slot; always unimplemented.
    pub undefined: extern "C" fn() -> SPErr,
}

// Compile-time layout assertions for ABI stability.
// 7 function pointers = 56 bytes, align 8.
const _: () = assert!(std::mem::size_of::<SPBasicSuite>() == 56);
const _: () = assert!(std::mem::align_of::<SPBasicSuite>() == 8);

/// Table published for the basic suite.
pub const BASIC_SUITE: SPBasicSuite = SPBasicSuite {
    acquire_suite,
    release_suite,
    is_equal,
    allocate_block,
    free_block,
    reallocate_block,
    undefined,
};

static BASIC_SUITE_STATIC: SPBasicSuite = BASIC_SUITE;

/// The basic suite table, for handing to a plugin at entry. Valid for
/// the life of the process.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_basic_suite() -> *const SPBasicSuite {
    &BASIC_SUITE_STATIC
}

/// The tables this crate renders, one per [`SuiteKind`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PublishedSuites;

impl SuiteCatalog for PublishedSuites {
    fn publish(
        &self,
        kind: SuiteKind,
        key: SuiteKey,
        registry: &mut SuiteRegistry,
    ) -> Result<SuitePtr, BrokerError> {
        match kind {
            SuiteKind::Basic => registry.allocate_suite(key, BASIC_SUITE),
            SuiteKind::Buffer => registry.allocate_suite(key, BUFFER_SUITE),
            SuiteKind::ZString => registry.allocate_suite(key, ZSTRING_SUITE),
            SuiteKind::ColorSpace => registry.allocate_suite(key, COLORSPACE_SUITE),
            SuiteKind::UiHooks => registry.allocate_suite(key, UIHOOKS_SUITE),
            SuiteKind::Error => registry.allocate_suite(key, ERROR_SUITE),
        }
    }
}

/// Read a suite name. `None` for null.
#[allow(unsafe_code)]
fn suite_key(name: *const c_char, version: i32) -> Option<SuiteKey> {
    if name.is_null() {
        return None;
    }
    // SAFETY: a non-null suite name is NUL-terminated.
    let name = unsafe { CStr::from_ptr(name) };
    Some(SuiteKey::new(name.to_bytes(), version))
}

#[allow(unsafe_code)]
extern "C" fn acquire_suite(name: *const c_char, version: i32, out: *mut *const c_void) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid table slot or null.
        let (Some(key), Some(out)) = (suite_key(name, version), unsafe { out.as_mut() }) else {
            return SuiteStatus::BadParameter as i32;
        };
        match in_session(|s| s.acquire_suite(key, &PublishedSuites)) {
            Ok(table) => {
                *out = table.as_ptr().cast();
                SuiteStatus::NoError as i32
            }
            Err(e) => {
                *out = std::ptr::null();
                SuiteStatus::from(&e) as i32
            }
        }
    })
}

extern "C" fn release_suite(name: *const c_char, version: i32) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(key) = suite_key(name, version) else {
            return SuiteStatus::BadParameter as i32;
        };
        suite_code(in_session(|s| s.release_suite(&key).map(drop)))
    })
}

#[allow(unsafe_code)]
extern "C" fn is_equal(token1: *const c_char, token2: *const c_char) -> SPBoolean {
    ffi_guard_or!(0, {
        if token1.is_null() || token2.is_null() {
            return 0;
        }
        // SAFETY: non-null tokens are NUL-terminated.
        let equal = unsafe { CStr::from_ptr(token1) == CStr::from_ptr(token2) };
        SPBoolean::from(equal)
    })
}

#[allow(unsafe_code)]
extern "C" fn allocate_block(size: usize, out: *mut *mut c_void) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid block slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return SuiteStatus::BadParameter as i32;
        };
        match in_session(|s| s.blocks(|b| b.allocate(size))) {
            Ok(ptr) => {
                *out = ptr.cast();
                SuiteStatus::NoError as i32
            }
            Err(e) => {
                *out = std::ptr::null_mut();
                SuiteStatus::from(&e) as i32
            }
        }
    })
}

extern "C" fn free_block(block: *mut c_void) -> SPErr {
    ffi_guard!(SuiteStatus, {
        if block.is_null() {
            return SuiteStatus::NoError as i32;
        }
        let freed = in_session(|s| s.blocks(|b| b.free(block.cast::<u8>())));
        match freed {
            Ok(true) => SuiteStatus::NoError as i32,
            Ok(false) => SuiteStatus::BadParameter as i32,
            Err(e) => SuiteStatus::from(&e) as i32,
        }
    })
}

#[allow(unsafe_code)]
extern "C" fn reallocate_block(
    block: *mut c_void,
    new_size: usize,
    out: *mut *mut c_void,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid block slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return SuiteStatus::BadParameter as i32;
        };
        let result = in_session(|s| {
            s.blocks(|b| {
                if block.is_null() {
                    b.allocate(new_size).map(Some)
                } else {
                    b.reallocate(block.cast::<u8>(), new_size)
                }
            })
        });
        match result {
            Ok(Some(ptr)) => {
                *out = ptr.cast();
                SuiteStatus::NoError as i32
            }
            Ok(None) => SuiteStatus::BadParameter as i32,
            Err(e) => {
                *out = block;
                SuiteStatus::from(&e) as i32
            }
        }
    })
}

extern "C" fn undefined() -> SPErr {
    SuiteStatus::Unimplemented as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::SessionScope;
    use crate::suites::{BufferSuite1, ErrorSuite1};
    use suitehost_host::{HostSession, SessionConfig};
    use suitehost_test_utils::TrackingHeap;

    fn session() -> (HostSession, TrackingHeap) {
        let heap = TrackingHeap::new();
        (
            HostSession::with_heap(SessionConfig::default(), heap.clone()).unwrap(),
            heap,
        )
    }

    #[allow(unsafe_code)]
    fn acquire<T>(name: &CStr, version: i32) -> Result<&'static T, SPErr> {
        let mut table = std::ptr::null();
        let status = (BASIC_SUITE.acquire_suite)(name.as_ptr(), version, &mut table);
        if status != 0 {
            assert!(table.is_null());
            return Err(status);
        }
        // SAFETY: a published table of type `T`, alive while referenced.
        Ok(unsafe { &*table.cast::<T>() })
    }

    #[test]
    fn acquire_returns_usable_tables() {
        let (mut session, _heap) = session();
        SessionScope::enter(&session, || {
            let errors = acquire::<ErrorSuite1>(c"Photoshop Error Suite for Plug-ins", 1).unwrap();
            assert_eq!((errors.set_error_from_cstring)(c"via table".as_ptr()), 0);
        });
        assert_eq!(session.take_error_message().as_deref(), Some("via table"));
    }

    #[test]
    fn repeated_acquire_shares_table_until_last_release() {
        let (session, heap) = session();
        let name = c"Photoshop Buffer Suite for Plug-ins";
        SessionScope::enter(&session, || {
            let a = acquire::<BufferSuite1>(name, 1).unwrap() as *const BufferSuite1;
            let b = acquire::<BufferSuite1>(name, 1).unwrap() as *const BufferSuite1;
            assert_eq!(a, b);
            assert_eq!((BASIC_SUITE.release_suite)(name.as_ptr(), 1), 0);
            assert!(heap.is_live(a as usize));
            assert_eq!((BASIC_SUITE.release_suite)(name.as_ptr(), 1), 0);
            assert!(!heap.is_live(a as usize));
            assert_eq!((BASIC_SUITE.release_suite)(name.as_ptr(), 1), 0);
        });
    }

    #[test]
    fn unknown_suite_or_version_is_not_found() {
        let (session, heap) = session();
        SessionScope::enter(&session, || {
            assert_eq!(
                acquire::<u8>(c"Photoshop Descriptor Suite", 1).err(),
                Some(SuiteStatus::SuiteNotFound as i32)
            );
            assert_eq!(
                acquire::<u8>(c"AS ZString Suite", 2).err(),
                Some(SuiteStatus::SuiteNotFound as i32)
            );
        });
        assert_eq!(heap.live_blocks(), 0);
        assert!(session.fault().is_none());
    }

    #[test]
    fn null_name_is_bad_parameter() {
        let (session, _heap) = session();
        SessionScope::enter(&session, || {
            let mut table = std::ptr::null();
            assert_eq!(
                (BASIC_SUITE.acquire_suite)(std::ptr::null(), 1, &mut table),
                SuiteStatus::BadParameter as i32
            );
        });
    }

    #[test]
    fn is_equal_compares_contents() {
        let a = c"SP Basic Suite";
        let b = std::ffi::CString::new("SP Basic Suite").unwrap();
        assert_eq!((BASIC_SUITE.is_equal)(a.as_ptr(), b.as_ptr()), 1);
        assert_eq!((BASIC_SUITE.is_equal)(a.as_ptr(), c"SP".as_ptr()), 0);
        assert_eq!((BASIC_SUITE.is_equal)(a.as_ptr(), std::ptr::null()), 0);
    }

    #[test]
    fn blocks_allocate_grow_and_free() {
        let (session, heap) = session();
        SessionScope::enter(&session, || {
            let mut block = std::ptr::null_mut();
            assert_eq!((BASIC_SUITE.allocate_block)(32, &mut block), 0);
            assert!(!block.is_null());
            let mut grown = std::ptr::null_mut();
            assert_eq!((BASIC_SUITE.reallocate_block)(block, 4096, &mut grown), 0);
            assert_eq!((BASIC_SUITE.free_block)(grown), 0);
            assert_eq!(
                (BASIC_SUITE.free_block)(grown),
                SuiteStatus::BadParameter as i32
            );

            let mut fresh = std::ptr::null_mut();
            assert_eq!((BASIC_SUITE.reallocate_block)(std::ptr::null_mut(), 8, &mut fresh), 0);
            assert_eq!((BASIC_SUITE.free_block)(fresh), 0);
        });
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn undefined_is_unimplemented() {
        assert_eq!((BASIC_SUITE.undefined)(), SuiteStatus::Unimplemented as i32);
    }
}
