//! Strongly-typed identifiers and opaque tokens.
//!
//! Every handle that crosses the plugin boundary is a non-zero 64-bit
//! token minted by a slot+generation table. The newtypes here keep the
//! different token families from being mixed up on the host side.

use smallvec::SmallVec;
use std::fmt;
use std::num::NonZeroU64;

/// Pack a four-character code big-endian, the way plugin headers spell
/// resource types and status codes (`'TEST'` → `0x5445_5354`).
pub const fn four_cc(tag: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*tag)
}

/// A resource type tag: four human-readable bytes, big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResType(pub u32);

impl ResType {
    /// Build a type tag from its four ASCII bytes.
    pub const fn from_tag(tag: &[u8; 4]) -> Self {
        Self(four_cc(tag))
    }

    /// The four bytes of the tag in reading order.
    pub fn tag(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ResType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        if tag.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            // All bytes printable, so this is valid ASCII.
            write!(f, "'{}'", String::from_utf8_lossy(&tag))
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl From<u32> for ResType {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

macro_rules! opaque_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw token. Returns `None` for the reserved zero value.
            pub const fn from_raw(raw: u64) -> Option<Self> {
                if raw == 0 {
                    None
                } else {
                    Some(Self(raw))
                }
            }

            /// Wrap a token minted by a handle table.
            pub const fn from_token(token: NonZeroU64) -> Self {
                Self(token.get())
            }

            /// The raw token value as seen by plugins.
            pub const fn to_raw(self) -> u64 {
                self.0
            }
        }

        impl From<$name> for u64 {
            fn from(token: $name) -> u64 {
                token.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{:x}", stringify!($name), self.0)
            }
        }
    };
}

opaque_token!(
    /// Identifies a buffer handed out by the buffer allocator.
    BufferId
);

opaque_token!(
    /// Identifies a relocatable handle minted by the session handle allocator.
    HandleId
);

opaque_token!(
    /// Identifies a reference-counted string in the string-table suite.
    ZStringRef
);

opaque_token!(
    /// Identifies a colour object created through the colorspace suite.
    ColorId
);

/// Suite name bytes held without a heap allocation. Must be one of the
/// array lengths `smallvec` implements `Array` for.
const INLINE_NAME_BYTES: usize = 64;

/// Identity of a suite: its advertised name and interface version.
///
/// Names are stored without the trailing NUL. Every suite name the host
/// publishes fits the inline capacity, so keys never touch the heap.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SuiteKey {
    name: SmallVec<[u8; INLINE_NAME_BYTES]>,
    version: i32,
}

impl SuiteKey {
    /// Create a key from raw name bytes (without NUL) and a version.
    pub fn new(name: impl AsRef<[u8]>, version: i32) -> Self {
        Self {
            name: SmallVec::from_slice(name.as_ref()),
            version,
        }
    }

    /// Suite name bytes.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Suite interface version.
    pub fn version(&self) -> i32 {
        self.version
    }
}

impl fmt::Display for SuiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" v{}",
            String::from_utf8_lossy(self.name.as_slice()),
            self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_cc_is_big_endian() {
        assert_eq!(four_cc(b"TEST"), 0x5445_5354);
        assert_eq!(ResType::from_tag(b"TEST").tag(), *b"TEST");
    }

    #[test]
    fn res_type_display_prints_tag_or_hex() {
        assert_eq!(ResType::from_tag(b"PiPL").to_string(), "'PiPL'");
        assert_eq!(ResType(0x0001_0203).to_string(), "0x00010203");
    }

    #[test]
    fn zero_token_is_rejected() {
        assert!(BufferId::from_raw(0).is_none());
        assert_eq!(BufferId::from_raw(7).map(BufferId::to_raw), Some(7));
        assert_eq!(BufferId::from_token(NonZeroU64::MIN).to_raw(), 1);
    }

    #[test]
    fn suite_keys_differ_by_version() {
        let a = SuiteKey::new("SP Basic Suite", 1);
        let b = SuiteKey::new("SP Basic Suite", 2);
        assert_ne!(a, b);
        assert_eq!(a, SuiteKey::new(b"SP Basic Suite", 1));
        assert_eq!(a.to_string(), "\"SP Basic Suite\" v1");
    }

    #[test]
    fn published_length_names_stay_inline() {
        let key = SuiteKey::new("Photoshop ColorSpace Suite for Plug-ins", 1);
        assert!(!key.name.spilled());
        let long = SuiteKey::new([b'x'; INLINE_NAME_BYTES + 1], 1);
        assert!(long.name.spilled());
        assert_eq!(long.name().len(), INLINE_NAME_BYTES + 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn res_type_tag_round_trips(tag in proptest::array::uniform4(any::<u8>())) {
                prop_assert_eq!(ResType::from_tag(&tag).tag(), tag);
            }
        }
    }
}
