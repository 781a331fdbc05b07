//! Capture of the one error message a plugin may report per session.

use std::error::Error;
use std::ffi::CStr;
use std::fmt;

use suitehost_core::{StringResolver, ZStringRef};

/// Errors from [`ErrorChannel`] writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorChannelError {
    /// The string was missing or could not be resolved.
    BadParameter,
}

impl fmt::Display for ErrorChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadParameter => write!(f, "error message missing or unresolvable"),
        }
    }
}

impl Error for ErrorChannelError {}

impl suitehost_arena::FatalFault for ErrorChannelError {
    fn fatal_fault(&self) -> Option<&suitehost_arena::ArenaError> {
        None
    }
}

/// Single-slot error message store. The last successful write wins.
#[derive(Debug, Default)]
pub struct ErrorChannel {
    message: Option<String>,
}

impl ErrorChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a length-prefixed string: the first byte is the length, the
    /// text follows. A length past the end of `bytes` is clamped.
    pub fn set_from_length_prefixed(
        &mut self,
        bytes: Option<&[u8]>,
    ) -> Result<(), ErrorChannelError> {
        let (&len, rest) = bytes
            .and_then(<[u8]>::split_first)
            .ok_or(ErrorChannelError::BadParameter)?;
        let text = &rest[..usize::from(len).min(rest.len())];
        self.store(String::from_utf8_lossy(text).into_owned());
        Ok(())
    }

    /// Store a NUL-terminated string.
    pub fn set_from_null_terminated(
        &mut self,
        text: Option<&CStr>,
    ) -> Result<(), ErrorChannelError> {
        let text = text.ok_or(ErrorChannelError::BadParameter)?;
        self.store(text.to_string_lossy().into_owned());
        Ok(())
    }

    /// Store the string behind an opaque string-table reference.
    pub fn set_from_opaque_ref(
        &mut self,
        reference: ZStringRef,
        resolver: &dyn StringResolver,
    ) -> Result<(), ErrorChannelError> {
        let text = resolver
            .resolve(reference)
            .ok_or(ErrorChannelError::BadParameter)?;
        self.store(text);
        Ok(())
    }

    fn store(&mut self, text: String) {
        tracing::debug!(message = %text, "plugin reported error");
        self.message = Some(text);
    }

    /// Whether a message has been captured.
    pub fn has_message(&self) -> bool {
        self.message.is_some()
    }

    /// The captured message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Remove and return the captured message.
    pub fn take(&mut self) -> Option<String> {
        self.message.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suitehost_core::NoStrings;
    use suitehost_test_utils::FixedStrings;

    #[test]
    fn length_prefixed_message() {
        let mut channel = ErrorChannel::new();
        channel.set_from_length_prefixed(Some(b"\x05hello world")).unwrap();
        assert_eq!(channel.message(), Some("hello"));
    }

    #[test]
    fn length_prefix_is_clamped() {
        let mut channel = ErrorChannel::new();
        channel.set_from_length_prefixed(Some(b"\xffabc")).unwrap();
        assert_eq!(channel.message(), Some("abc"));
    }

    #[test]
    fn missing_strings_are_bad_parameter() {
        let mut channel = ErrorChannel::new();
        assert_eq!(
            channel.set_from_length_prefixed(None),
            Err(ErrorChannelError::BadParameter)
        );
        assert_eq!(
            channel.set_from_length_prefixed(Some(b"")),
            Err(ErrorChannelError::BadParameter)
        );
        assert_eq!(
            channel.set_from_null_terminated(None),
            Err(ErrorChannelError::BadParameter)
        );
        assert!(!channel.has_message());
    }

    #[test]
    fn last_write_wins() {
        let mut channel = ErrorChannel::new();
        channel.set_from_null_terminated(Some(c"first")).unwrap();
        channel.set_from_null_terminated(Some(c"second")).unwrap();
        assert_eq!(channel.take().as_deref(), Some("second"));
        assert!(!channel.has_message());
    }

    #[test]
    fn failed_write_keeps_previous_message() {
        let mut channel = ErrorChannel::new();
        channel.set_from_null_terminated(Some(c"kept")).unwrap();
        let missing = ZStringRef::from_raw(9).unwrap();
        assert!(channel.set_from_opaque_ref(missing, &NoStrings).is_err());
        assert_eq!(channel.message(), Some("kept"));
    }

    #[test]
    fn opaque_ref_resolves_through_table() {
        let mut strings = FixedStrings::new();
        let reference = strings.insert("disk full");
        let mut channel = ErrorChannel::new();
        channel.set_from_opaque_ref(reference, &strings).unwrap();
        assert_eq!(channel.message(), Some("disk full"));
    }
}
