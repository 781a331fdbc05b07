//! Reference-counted strings behind the ZString suite.
//!
//! Strings are stored as UTF-16 code units. A string lives until its
//! reference count drops to zero; released references resolve to nothing.

use std::error::Error;
use std::fmt;

use suitehost_arena::{ArenaError, FatalFault, HandleTable};
use suitehost_core::{StringResolver, ZStringRef};

/// Errors from [`ZStringTable`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZStringError {
    /// The reference is not live.
    UnknownString {
        /// The stale or unknown reference.
        reference: ZStringRef,
    },
    /// The caller's buffer cannot hold the string and its terminator.
    BufferTooSmall {
        /// Units needed, including the terminator.
        needed: usize,
        /// Units available.
        capacity: usize,
    },
}

impl fmt::Display for ZStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownString { reference } => write!(f, "{reference} is not live"),
            Self::BufferTooSmall { needed, capacity } => {
                write!(f, "buffer holds {capacity} units, {needed} needed")
            }
        }
    }
}

impl Error for ZStringError {}

impl FatalFault for ZStringError {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        None
    }
}

struct ZString {
    units: Vec<u16>,
    refs: u32,
}

/// Table of live reference-counted strings.
#[derive(Default)]
pub struct ZStringTable {
    strings: HandleTable<ZString>,
}

fn until_nul<T: Copy + Default + PartialEq>(units: &[T]) -> &[T] {
    let end = units
        .iter()
        .position(|&u| u == T::default())
        .unwrap_or(units.len());
    &units[..end]
}

impl ZStringTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn make(&mut self, units: Vec<u16>) -> ZStringRef {
        let reference = ZStringRef::from_token(self.strings.insert(ZString { units, refs: 1 }));
        tracing::trace!(%reference, "zstring created");
        reference
    }

    /// Create a string from a Rust string.
    pub fn make_from_str(&mut self, text: &str) -> ZStringRef {
        self.make(text.encode_utf16().collect())
    }

    /// Create a string from UTF-16 units; a NUL ends the string early.
    pub fn make_from_unicode(&mut self, units: &[u16]) -> ZStringRef {
        self.make(until_nul(units).to_vec())
    }

    /// Create a string from bytes; a NUL ends the string early. Invalid
    /// UTF-8 is replaced.
    pub fn make_from_c_string(&mut self, bytes: &[u8]) -> ZStringRef {
        let text = String::from_utf8_lossy(until_nul(bytes)).into_owned();
        self.make_from_str(&text)
    }

    /// Create a string from a length-prefixed byte string. A missing
    /// length byte yields the empty string; the length is clamped to the
    /// bytes present.
    pub fn make_from_pascal_string(&mut self, bytes: &[u8]) -> ZStringRef {
        let text = match bytes.split_first() {
            Some((&len, rest)) => &rest[..usize::from(len).min(rest.len())],
            None => &[][..],
        };
        self.make_from_str(&String::from_utf8_lossy(text))
    }

    /// Take another reference.
    pub fn add_ref(&mut self, reference: ZStringRef) -> Result<(), ZStringError> {
        let entry = self
            .strings
            .get_mut(reference)
            .ok_or(ZStringError::UnknownString { reference })?;
        entry.refs = entry.refs.saturating_add(1);
        Ok(())
    }

    /// Drop a reference, freeing the string at zero. Returns `true` if the
    /// string was freed.
    pub fn release(&mut self, reference: ZStringRef) -> Result<bool, ZStringError> {
        let entry = self
            .strings
            .get_mut(reference)
            .ok_or(ZStringError::UnknownString { reference })?;
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(false);
        }
        self.strings.remove(reference);
        tracing::trace!(%reference, "zstring freed");
        Ok(true)
    }

    /// UTF-16 units of a live string, without terminator.
    pub fn units(&self, reference: ZStringRef) -> Option<&[u16]> {
        self.strings.get(reference).map(|s| s.units.as_slice())
    }

    /// Units needed for the UTF-16 form, including the terminator.
    pub fn length_as_unicode(&self, reference: ZStringRef) -> Result<usize, ZStringError> {
        self.units(reference)
            .map(|units| units.len() + 1)
            .ok_or(ZStringError::UnknownString { reference })
    }

    /// Copy the NUL-terminated UTF-16 form into `out`.
    ///
    /// With `check_size` a short buffer is an error; without it the
    /// string is cut to fit.
    pub fn copy_unicode(
        &self,
        reference: ZStringRef,
        out: &mut [u16],
        check_size: bool,
    ) -> Result<usize, ZStringError> {
        let units = self
            .units(reference)
            .ok_or(ZStringError::UnknownString { reference })?;
        copy_terminated(units, out, check_size)
    }

    /// Bytes needed for the UTF-8 form, including the terminator.
    pub fn length_as_c_string(&self, reference: ZStringRef) -> Result<usize, ZStringError> {
        self.resolve(reference)
            .map(|text| text.len() + 1)
            .ok_or(ZStringError::UnknownString { reference })
    }

    /// Copy the NUL-terminated UTF-8 form into `out`. A cut string may end
    /// inside a multi-byte sequence.
    pub fn copy_c_string(
        &self,
        reference: ZStringRef,
        out: &mut [u8],
        check_size: bool,
    ) -> Result<usize, ZStringError> {
        let text = self
            .resolve(reference)
            .ok_or(ZStringError::UnknownString { reference })?;
        copy_terminated(text.as_bytes(), out, check_size)
    }

    /// Number of live strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether no strings are live.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Copy `src` plus a zero terminator into `out`. Returns units written,
/// terminator included.
fn copy_terminated<T: Copy + Default>(
    src: &[T],
    out: &mut [T],
    check_size: bool,
) -> Result<usize, ZStringError> {
    let needed = src.len() + 1;
    if out.len() < needed && (check_size || out.is_empty()) {
        return Err(ZStringError::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }
    let n = src.len().min(out.len() - 1);
    out[..n].copy_from_slice(&src[..n]);
    out[n] = T::default();
    Ok(n + 1)
}

impl StringResolver for ZStringTable {
    fn resolve(&self, reference: ZStringRef) -> Option<String> {
        self.units(reference).map(String::from_utf16_lossy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings_agree() {
        let mut table = ZStringTable::new();
        let a = table.make_from_c_string(b"Gr\xc3\xbcn\0ignored");
        let b = table.make_from_pascal_string(b"\x05Gr\xc3\xbcn");
        let units: Vec<u16> = "Grün".encode_utf16().collect();
        let c = table.make_from_unicode(&units);
        for r in [a, b, c] {
            assert_eq!(table.resolve(r).as_deref(), Some("Grün"));
        }
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn refcount_frees_at_zero() {
        let mut table = ZStringTable::new();
        let r = table.make_from_str("x");
        table.add_ref(r).unwrap();
        assert_eq!(table.release(r), Ok(false));
        assert_eq!(table.release(r), Ok(true));
        assert!(table.resolve(r).is_none());
        assert_eq!(
            table.release(r),
            Err(ZStringError::UnknownString { reference: r })
        );
    }

    #[test]
    fn c_string_copy_checks_capacity() {
        let mut table = ZStringTable::new();
        let r = table.make_from_str("abc");
        assert_eq!(table.length_as_c_string(r), Ok(4));
        let mut small = [0xffu8; 3];
        assert_eq!(
            table.copy_c_string(r, &mut small, true),
            Err(ZStringError::BufferTooSmall {
                needed: 4,
                capacity: 3
            })
        );
        let mut out = [0xffu8; 8];
        assert_eq!(table.copy_c_string(r, &mut out, true), Ok(4));
        assert_eq!(&out[..4], b"abc\0");
    }

    #[test]
    fn unicode_copy_is_terminated() {
        let mut table = ZStringTable::new();
        let r = table.make_from_str("hi");
        assert_eq!(table.length_as_unicode(r), Ok(3));
        let mut out = [1u16; 3];
        table.copy_unicode(r, &mut out, true).unwrap();
        assert_eq!(out, [u16::from(b'h'), u16::from(b'i'), 0]);
    }

    #[test]
    fn unchecked_copy_truncates() {
        let mut table = ZStringTable::new();
        let r = table.make_from_str("abcdef");
        let mut out = [0xffu8; 4];
        assert_eq!(table.copy_c_string(r, &mut out, false), Ok(4));
        assert_eq!(&out, b"abc\0");
        assert!(table.copy_c_string(r, &mut [], false).is_err());
    }

    #[test]
    fn empty_pascal_string() {
        let mut table = ZStringTable::new();
        let r = table.make_from_pascal_string(b"");
        assert_eq!(table.resolve(r).as_deref(), Some(""));
    }
}
