//! Function tables for the PICA suites other than the basic suite.
//!
//! Each table is a plain fixed-order list of function pointers; its
//! version travels in the acquisition key. Tables are copied into the
//! suite registry on first acquisition, so they are `const` values here.

use std::convert::Infallible;
use std::ffi::{c_char, c_void, CStr};

use suitehost_core::{ColorId, ZStringRef};
use suitehost_host::{ColorError, ColorSpace, ZStringError, ZStringTable};

use crate::scope::in_session;
use crate::status::{suite_code, SuiteStatus};
use crate::types::{SPBoolean, SPErr, Token};

const BAD_PARAMETER: SPErr = SuiteStatus::BadParameter as i32;
const NO_ERROR: SPErr = SuiteStatus::NoError as i32;

/// Borrow `len` elements at `src`. A zero length never reads `src`.
///
/// # Safety
///
/// A non-null `src` must point to `len` readable elements that stay
/// valid for `'a`.
#[allow(unsafe_code)]
unsafe fn input<'a, T>(src: *const T, len: usize) -> Option<&'a [T]> {
    if len == 0 {
        return Some(&[]);
    }
    if src.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(src, len) })
}

/// Borrow `len` writable elements at `dst`.
///
/// # Safety
///
/// A non-null `dst` must point to `len` writable elements, not aliased,
/// that stay valid for `'a`.
#[allow(unsafe_code)]
unsafe fn output<'a, T>(dst: *mut T, len: usize) -> Option<&'a mut [T]> {
    if len == 0 {
        return Some(&mut []);
    }
    if dst.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts_mut(dst, len) })
}

// ── Buffer suite ────────────────────────────────────────────────

/// "Photoshop Buffer Suite for Plug-ins" version 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BufferSuite1 {
    /// Allocate between `minimum_size` and `*requested_size` bytes. The
    /// granted size is written back to `*requested_size`; null if even
    /// the minimum cannot be met.
    pub new: extern "C" fn(requested_size: *mut u32, minimum_size: u32) -> *mut u8,
    /// Release `*buffer` and null it.
    pub dispose: extern "C" fn(buffer: *mut *mut u8),
    /// Size of a block, or 0 if this suite did not hand it out.
    pub get_size: extern "C" fn(buffer: *mut u8) -> u32,
    /// Advisory number of bytes a single block may get.
    pub get_space: extern "C" fn() -> u32,
}

const _: () = assert!(std::mem::size_of::<BufferSuite1>() == 32);

/// Table published for the buffer suite.
pub const BUFFER_SUITE: BufferSuite1 = BufferSuite1 {
    new: buffer_new,
    dispose: buffer_dispose,
    get_size: buffer_get_size,
    get_space: buffer_get_space,
};

#[allow(unsafe_code)]
extern "C" fn buffer_new(requested_size: *mut u32, minimum_size: u32) -> *mut u8 {
    ffi_guard_or!(std::ptr::null_mut(), {
        // SAFETY: the plugin passes a valid in/out size slot or null.
        let Some(requested) = (unsafe { requested_size.as_mut() }) else {
            return std::ptr::null_mut();
        };
        match in_session(|s| s.facade(|f| f.buffer_suite().new_block(*requested, minimum_size))) {
            Ok(Some(granted)) => {
                *requested = granted.size;
                granted.ptr
            }
            Ok(None) => std::ptr::null_mut(),
            Err(e) => {
                tracing::debug!(error = %e, "suite buffer allocation failed");
                std::ptr::null_mut()
            }
        }
    })
}

#[allow(unsafe_code)]
extern "C" fn buffer_dispose(buffer: *mut *mut u8) {
    ffi_guard_or!((), {
        // SAFETY: the plugin passes a valid pointer slot or null.
        let Some(slot) = (unsafe { buffer.as_mut() }) else {
            return;
        };
        if slot.is_null() {
            return;
        }
        let ptr = *slot;
        match in_session(|s| s.facade(|f| f.buffer_suite().dispose(ptr))) {
            Ok(true) => *slot = std::ptr::null_mut(),
            Ok(false) => tracing::debug!(?ptr, "dispose of unknown suite buffer ignored"),
            Err(e) => tracing::debug!(?ptr, error = %e, "suite buffer dispose failed"),
        }
    })
}

extern "C" fn buffer_get_size(buffer: *mut u8) -> u32 {
    ffi_guard_or!(0, {
        in_session(|s| s.facade(|f| Ok::<_, Infallible>(f.buffer_suite().size_of(buffer))))
            .unwrap_or(0)
    })
}

extern "C" fn buffer_get_space() -> u32 {
    ffi_guard_or!(0, {
        in_session(|s| s.facade(|f| Ok::<_, Infallible>(f.buffer_suite().space()))).unwrap_or(0)
    })
}

// ── ZString suite ───────────────────────────────────────────────

/// "AS ZString Suite" version 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ZStringSuite1 {
    /// New string from `byte_count` bytes of UTF-16.
    pub make_from_unicode:
        extern "C" fn(src: *const u16, byte_count: usize, out: *mut Token) -> SPErr,
    /// New string from `byte_count` bytes of UTF-8; 0 reads up to the NUL.
    pub make_from_c_string:
        extern "C" fn(src: *const c_char, byte_count: usize, out: *mut Token) -> SPErr,
    /// New string from a length-prefixed buffer of `byte_count` bytes; 0
    /// trusts the length byte.
    pub make_from_pascal_string:
        extern "C" fn(src: *const u8, byte_count: usize, out: *mut Token) -> SPErr,
    /// Take another reference.
    pub add_ref: extern "C" fn(string: Token) -> SPErr,
    /// Drop a reference.
    pub release: extern "C" fn(string: Token) -> SPErr,
    /// UTF-16 units needed, terminator included.
    pub length_as_unicode_c_string: extern "C" fn(string: Token, out: *mut u32) -> SPErr,
    /// Copy as NUL-terminated UTF-16.
    pub as_unicode_c_string:
        extern "C" fn(string: Token, dst: *mut u16, dst_units: u32, check_size: SPBoolean) -> SPErr,
    /// UTF-8 bytes needed, terminator included.
    pub length_as_c_string: extern "C" fn(string: Token, out: *mut u32) -> SPErr,
    /// Copy as NUL-terminated UTF-8.
    pub as_c_string: extern "C" fn(
        string: Token,
        dst: *mut c_char,
        dst_size: u32,
        check_size: SPBoolean,
    ) -> SPErr,
}

const _: () = assert!(std::mem::size_of::<ZStringSuite1>() == 72);

/// Table published for the ZString suite.
pub const ZSTRING_SUITE: ZStringSuite1 = ZStringSuite1 {
    make_from_unicode: zstring_make_from_unicode,
    make_from_c_string: zstring_make_from_c_string,
    make_from_pascal_string: zstring_make_from_pascal_string,
    add_ref: zstring_add_ref,
    release: zstring_release,
    length_as_unicode_c_string: zstring_length_as_unicode,
    as_unicode_c_string: zstring_as_unicode,
    length_as_c_string: zstring_length_as_c_string,
    as_c_string: zstring_as_c_string,
};

fn make_string(out: &mut Token, make: impl FnOnce(&mut ZStringTable) -> ZStringRef) -> SPErr {
    match in_session(|s| s.facade(|f| Ok::<_, Infallible>(make(f.zstrings())))) {
        Ok(reference) => {
            *out = reference.to_raw();
            NO_ERROR
        }
        Err(e) => {
            *out = 0;
            SuiteStatus::from(&e) as i32
        }
    }
}

#[allow(unsafe_code)]
extern "C" fn zstring_make_from_unicode(
    src: *const u16,
    byte_count: usize,
    out: *mut Token,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid token slot or null, and
        // `byte_count` readable bytes at `src`.
        let (Some(out), Some(units)) =
            (unsafe { out.as_mut() }, unsafe { input(src, byte_count / 2) })
        else {
            return BAD_PARAMETER;
        };
        make_string(out, |table| table.make_from_unicode(units))
    })
}

#[allow(unsafe_code)]
extern "C" fn zstring_make_from_c_string(
    src: *const c_char,
    byte_count: usize,
    out: *mut Token,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid token slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return BAD_PARAMETER;
        };
        let bytes = if byte_count == 0 && !src.is_null() {
            // SAFETY: with no count the plugin passes a NUL-terminated string.
            Some(unsafe { CStr::from_ptr(src) }.to_bytes())
        } else {
            // SAFETY: `byte_count` readable bytes at `src`.
            unsafe { input(src.cast::<u8>(), byte_count) }
        };
        let Some(bytes) = bytes else {
            return BAD_PARAMETER;
        };
        make_string(out, |table| table.make_from_c_string(bytes))
    })
}

#[allow(unsafe_code)]
extern "C" fn zstring_make_from_pascal_string(
    src: *const u8,
    byte_count: usize,
    out: *mut Token,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid token slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return BAD_PARAMETER;
        };
        let len = if byte_count == 0 && !src.is_null() {
            // SAFETY: with no count the plugin vouches for the length byte.
            usize::from(unsafe { *src }) + 1
        } else {
            byte_count
        };
        // SAFETY: `len` readable bytes at `src`.
        let Some(bytes) = (unsafe { input(src, len) }) else {
            return BAD_PARAMETER;
        };
        make_string(out, |table| table.make_from_pascal_string(bytes))
    })
}

extern "C" fn zstring_add_ref(string: Token) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(reference) = ZStringRef::from_raw(string) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| s.facade(|f| f.zstrings().add_ref(reference))))
    })
}

extern "C" fn zstring_release(string: Token) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(reference) = ZStringRef::from_raw(string) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| {
            s.facade(|f| f.zstrings().release(reference).map(drop))
        }))
    })
}

#[allow(unsafe_code)]
fn write_length(
    string: Token,
    out: *mut u32,
    length: impl FnOnce(&ZStringTable, ZStringRef) -> Result<usize, ZStringError>,
) -> SPErr {
    // SAFETY: the plugin passes a valid length slot or null.
    let (Some(reference), Some(out)) = (ZStringRef::from_raw(string), unsafe { out.as_mut() })
    else {
        return BAD_PARAMETER;
    };
    match in_session(|s| s.facade(|f| length(&*f.zstrings(), reference))) {
        Ok(n) => {
            *out = u32::try_from(n).unwrap_or(u32::MAX);
            NO_ERROR
        }
        Err(e) => SuiteStatus::from(&e) as i32,
    }
}

extern "C" fn zstring_length_as_unicode(string: Token, out: *mut u32) -> SPErr {
    ffi_guard!(SuiteStatus, {
        write_length(string, out, ZStringTable::length_as_unicode)
    })
}

extern "C" fn zstring_length_as_c_string(string: Token, out: *mut u32) -> SPErr {
    ffi_guard!(SuiteStatus, {
        write_length(string, out, ZStringTable::length_as_c_string)
    })
}

#[allow(unsafe_code)]
extern "C" fn zstring_as_unicode(
    string: Token,
    dst: *mut u16,
    dst_units: u32,
    check_size: SPBoolean,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: `dst_units` writable units at `dst`.
        let (Some(reference), Some(out)) = (
            ZStringRef::from_raw(string),
            unsafe { output(dst, dst_units as usize) },
        ) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| {
            s.facade(|f| f.zstrings().copy_unicode(reference, out, check_size != 0).map(drop))
        }))
    })
}

#[allow(unsafe_code)]
extern "C" fn zstring_as_c_string(
    string: Token,
    dst: *mut c_char,
    dst_size: u32,
    check_size: SPBoolean,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: `dst_size` writable bytes at `dst`.
        let (Some(reference), Some(out)) = (ZStringRef::from_raw(string), unsafe {
            output(dst.cast::<u8>(), dst_size as usize)
        }) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| {
            s.facade(|f| f.zstrings().copy_c_string(reference, out, check_size != 0).map(drop))
        }))
    })
}

// ── ColorSpace suite ────────────────────────────────────────────

/// "Photoshop ColorSpace Suite for Plug-ins" version 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ColorSpaceSuite1 {
    /// New colour, RGB black.
    pub make: extern "C" fn(out: *mut Token) -> SPErr,
    /// Delete `*color` and zero it.
    pub delete: extern "C" fn(color: *mut Token) -> SPErr,
    /// Set a colour's space and components.
    pub stuff_components:
        extern "C" fn(color: Token, space: i16, c0: u8, c1: u8, c2: u8, c3: u8) -> SPErr,
    /// Read components in `space`, which must be the colour's own space.
    /// Null component slots are skipped.
    pub extract_components: extern "C" fn(
        color: Token,
        space: i16,
        c0: *mut u8,
        c1: *mut u8,
        c2: *mut u8,
        c3: *mut u8,
        in_gamut: *mut SPBoolean,
    ) -> SPErr,
    /// The colour's current space.
    pub get_color_space: extern "C" fn(color: Token, out: *mut i16) -> SPErr,
    /// Convert in place; only the identity conversion is provided.
    pub convert: extern "C" fn(color: Token, space: i16) -> SPErr,
}

const _: () = assert!(std::mem::size_of::<ColorSpaceSuite1>() == 48);

/// Table published for the colorspace suite.
pub const COLORSPACE_SUITE: ColorSpaceSuite1 = ColorSpaceSuite1 {
    make: color_make,
    delete: color_delete,
    stuff_components: color_stuff,
    extract_components: color_extract,
    get_color_space: color_get_space,
    convert: color_convert,
};

#[allow(unsafe_code)]
extern "C" fn color_make(out: *mut Token) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid token slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return BAD_PARAMETER;
        };
        match in_session(|s| s.facade(|f| Ok::<_, Infallible>(f.colors().make()))) {
            Ok(id) => {
                *out = id.to_raw();
                NO_ERROR
            }
            Err(e) => {
                *out = 0;
                SuiteStatus::from(&e) as i32
            }
        }
    })
}

#[allow(unsafe_code)]
extern "C" fn color_delete(color: *mut Token) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid token slot or null.
        let Some(slot) = (unsafe { color.as_mut() }) else {
            return BAD_PARAMETER;
        };
        let Some(id) = ColorId::from_raw(*slot) else {
            return BAD_PARAMETER;
        };
        let result = in_session(|s| {
            s.facade(|f| {
                if f.colors().delete(id) {
                    Ok(())
                } else {
                    Err(ColorError::UnknownColor { id })
                }
            })
        });
        if result.is_ok() {
            *slot = 0;
        }
        suite_code(result)
    })
}

extern "C" fn color_stuff(color: Token, space: i16, c0: u8, c1: u8, c2: u8, c3: u8) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(id) = ColorId::from_raw(color) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| {
            s.facade(|f| {
                let space = ColorSpace::try_from(space)?;
                f.colors().stuff(id, space, [c0, c1, c2, c3])
            })
        }))
    })
}

#[allow(unsafe_code)]
extern "C" fn color_extract(
    color: Token,
    space: i16,
    c0: *mut u8,
    c1: *mut u8,
    c2: *mut u8,
    c3: *mut u8,
    in_gamut: *mut SPBoolean,
) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(id) = ColorId::from_raw(color) else {
            return BAD_PARAMETER;
        };
        let result = in_session(|s| {
            s.facade(|f| {
                let space = ColorSpace::try_from(space)?;
                f.colors().extract(id, space)
            })
        });
        match result {
            Ok(components) => {
                for (slot, value) in [c0, c1, c2, c3].into_iter().zip(components) {
                    // SAFETY: each slot is a valid component pointer or null.
                    if let Some(slot) = unsafe { slot.as_mut() } {
                        *slot = value;
                    }
                }
                // SAFETY: valid flag pointer or null.
                if let Some(flag) = unsafe { in_gamut.as_mut() } {
                    *flag = 1;
                }
                NO_ERROR
            }
            Err(e) => SuiteStatus::from(&e) as i32,
        }
    })
}

#[allow(unsafe_code)]
extern "C" fn color_get_space(color: Token, out: *mut i16) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid space slot or null.
        let (Some(id), Some(out)) = (ColorId::from_raw(color), unsafe { out.as_mut() }) else {
            return BAD_PARAMETER;
        };
        match in_session(|s| s.facade(|f| f.colors().space_of(id))) {
            Ok(space) => {
                *out = space as i16;
                NO_ERROR
            }
            Err(e) => SuiteStatus::from(&e) as i32,
        }
    })
}

extern "C" fn color_convert(color: Token, space: i16) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(id) = ColorId::from_raw(color) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| {
            s.facade(|f| {
                let space = ColorSpace::try_from(space)?;
                f.colors().convert(id, space)
            })
        }))
    })
}

// ── UIHooks suite ───────────────────────────────────────────────

/// "Photoshop UIHooks Suite for Plug-ins" version 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct UIHooksSuite1 {
    /// Accepted and ignored.
    pub process_event: extern "C" fn(event: *mut c_void) -> SPErr,
    /// The host's main window token.
    pub main_app_window: extern "C" fn() -> isize,
    /// Accepted and ignored.
    pub set_cursor: extern "C" fn(cursor: *mut c_void) -> SPErr,
    /// Sixtieths of a second since the hooks were first used.
    pub tick_count: extern "C" fn() -> u32,
    /// A new ZString holding the plugin name.
    pub get_plugin_name: extern "C" fn(plugin: *mut c_void, out: *mut Token) -> SPErr,
}

const _: () = assert!(std::mem::size_of::<UIHooksSuite1>() == 40);

/// Table published for the UI hooks suite.
pub const UIHOOKS_SUITE: UIHooksSuite1 = UIHooksSuite1 {
    process_event: ui_process_event,
    main_app_window: ui_main_app_window,
    set_cursor: ui_set_cursor,
    tick_count: ui_tick_count,
    get_plugin_name: ui_get_plugin_name,
};

fn ui_no_op() -> SPErr {
    suite_code(in_session(|s| {
        s.facade(|f| {
            f.ui_hooks();
            Ok::<_, Infallible>(())
        })
    }))
}

extern "C" fn ui_process_event(_event: *mut c_void) -> SPErr {
    ffi_guard!(SuiteStatus, { ui_no_op() })
}

extern "C" fn ui_set_cursor(_cursor: *mut c_void) -> SPErr {
    ffi_guard!(SuiteStatus, { ui_no_op() })
}

extern "C" fn ui_main_app_window() -> isize {
    ffi_guard_or!(0, {
        in_session(|s| s.facade(|f| Ok::<_, Infallible>(f.ui_hooks().main_app_window())))
            .map_or(0, |window| window as isize)
    })
}

extern "C" fn ui_tick_count() -> u32 {
    ffi_guard_or!(0, {
        in_session(|s| s.facade(|f| Ok::<_, Infallible>(f.ui_hooks().tick_count()))).unwrap_or(0)
    })
}

#[allow(unsafe_code)]
extern "C" fn ui_get_plugin_name(_plugin: *mut c_void, out: *mut Token) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the plugin passes a valid token slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return BAD_PARAMETER;
        };
        match in_session(|s| s.plugin_name_zstring()) {
            Ok(reference) => {
                *out = reference.to_raw();
                NO_ERROR
            }
            Err(e) => {
                *out = 0;
                SuiteStatus::from(&e) as i32
            }
        }
    })
}

// ── Error suite ─────────────────────────────────────────────────

/// "Photoshop Error Suite for Plug-ins" version 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ErrorSuite1 {
    /// Record a length-prefixed message.
    pub set_error_from_pstring: extern "C" fn(message: *const u8) -> SPErr,
    /// Record a NUL-terminated message.
    pub set_error_from_cstring: extern "C" fn(message: *const c_char) -> SPErr,
    /// Record the text of a ZString.
    pub set_error_from_zstring: extern "C" fn(message: Token) -> SPErr,
}

const _: () = assert!(std::mem::size_of::<ErrorSuite1>() == 24);

/// Table published for the error suite.
pub const ERROR_SUITE: ErrorSuite1 = ErrorSuite1 {
    set_error_from_pstring: error_from_pstring,
    set_error_from_cstring: error_from_cstring,
    set_error_from_zstring: error_from_zstring,
};

#[allow(unsafe_code)]
extern "C" fn error_from_pstring(message: *const u8) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let bytes = if message.is_null() {
            None
        } else {
            // SAFETY: a non-null message is a length byte followed by that
            // many readable bytes.
            let len = usize::from(unsafe { *message }) + 1;
            unsafe { input(message, len) }
        };
        suite_code(in_session(|s| s.errors(|e| e.set_from_length_prefixed(bytes))))
    })
}

#[allow(unsafe_code)]
extern "C" fn error_from_cstring(message: *const c_char) -> SPErr {
    ffi_guard!(SuiteStatus, {
        // SAFETY: a non-null message is NUL-terminated.
        let text = (!message.is_null()).then(|| unsafe { CStr::from_ptr(message) });
        suite_code(in_session(|s| s.errors(|e| e.set_from_null_terminated(text))))
    })
}

extern "C" fn error_from_zstring(message: Token) -> SPErr {
    ffi_guard!(SuiteStatus, {
        let Some(reference) = ZStringRef::from_raw(message) else {
            return BAD_PARAMETER;
        };
        suite_code(in_session(|s| s.set_error_from_zstring(reference)))
    })
}
