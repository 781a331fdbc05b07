//! Scalar types used in the callback and suite tables.
//!
//! Opaque objects (buffers, handles, strings, colours) cross the boundary
//! as non-zero 64-bit tokens; 0 means "none".

/// Classic 16-bit status code, see [`HostStatus`](crate::HostStatus).
pub type OSErr = i16;

/// 32-bit suite status code, see [`SuiteStatus`](crate::SuiteStatus).
pub type SPErr = i32;

/// C boolean: 0 is false, anything else true.
pub type SPBoolean = u8;

/// Opaque object token.
pub type Token = u64;

/// Four-character resource type tag, big-endian.
pub type ResTypeCode = u32;

