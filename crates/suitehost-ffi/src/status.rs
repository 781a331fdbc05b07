//! Status codes returned across the plugin boundary.
//!
//! Two families exist. The callback tables speak classic 16-bit
//! [`HostStatus`] codes; the PICA suites and the host session API speak
//! 32-bit [`SuiteStatus`] codes, several of which are four-character
//! tags. Values are ABI-stable.

use std::convert::Infallible;

use suitehost_arena::{ArenaError, BufferError};
use suitehost_core::four_cc;
use suitehost_host::{
    BrokerError, CallError, ColorError, ConfigError, ErrorChannelError, HandleError, ResourceError,
    ZStringError,
};

/// Status returned by the callback tables.
#[repr(i16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostStatus {
    /// Success.
    NoErr = 0,
    /// The host component is in use by an outer call on this thread.
    Busy = -1,
    /// A parameter is negative, null or otherwise invalid.
    ParamErr = -50,
    /// The arena cannot satisfy the request.
    MemFullErr = -108,
    /// The handle is unknown or already disposed.
    NilHandleErr = -109,
    /// The handle is locked and cannot be resized.
    MemLockedErr = -117,
    /// The session has faulted, is gone, or the call panicked.
    Aborted = -128,
    /// No resource of that type at that index.
    ResNotFound = -192,
}

/// Status returned by the PICA suites and the host session API.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteStatus {
    /// Success.
    NoError = 0,
    /// The arena cannot satisfy the request.
    OutOfMemory = -108,
    /// The session has faulted, is gone, or the call panicked.
    Aborted = -128,
    /// No suite is published under the requested name and version.
    SuiteNotFound = four_cc(b"S!Fd") as i32,
    /// A parameter is null, unknown or otherwise invalid.
    BadParameter = four_cc(b"Parm") as i32,
    /// The operation exists but this host does not implement it.
    Unimplemented = four_cc(b"!IMP") as i32,
    /// The caller's buffer is too small for the result.
    BufferTooSmall = four_cc(b"tiny") as i32,
    /// The host component is in use by an outer call on this thread.
    Busy = four_cc(b"BUSY") as i32,
}

// ── HostStatus conversions ──────────────────────────────────────

impl From<&ArenaError> for HostStatus {
    fn from(e: &ArenaError) -> Self {
        if e.is_fatal() {
            Self::Aborted
        } else {
            Self::MemFullErr
        }
    }
}

impl From<&BufferError> for HostStatus {
    fn from(e: &BufferError) -> Self {
        match e {
            BufferError::InvalidParameter { .. } => Self::ParamErr,
            BufferError::MemoryFull { .. } => Self::MemFullErr,
            BufferError::Fatal(_) => Self::Aborted,
        }
    }
}

impl From<&HandleError> for HostStatus {
    fn from(e: &HandleError) -> Self {
        match e {
            HandleError::InvalidParameter { .. } => Self::ParamErr,
            HandleError::MemoryFull { .. } => Self::MemFullErr,
            HandleError::NotFound { .. } => Self::NilHandleErr,
            HandleError::Locked { .. } => Self::MemLockedErr,
            HandleError::Fatal(_) => Self::Aborted,
        }
    }
}

impl From<&ResourceError> for HostStatus {
    fn from(e: &ResourceError) -> Self {
        match e {
            ResourceError::NotFound { .. } => Self::ResNotFound,
            ResourceError::MemoryFull { .. } => Self::MemFullErr,
        }
    }
}

impl From<&Infallible> for HostStatus {
    fn from(e: &Infallible) -> Self {
        match *e {}
    }
}

// ── SuiteStatus conversions ─────────────────────────────────────

impl From<&ArenaError> for SuiteStatus {
    fn from(e: &ArenaError) -> Self {
        if e.is_fatal() {
            Self::Aborted
        } else {
            Self::OutOfMemory
        }
    }
}

impl From<&BrokerError> for SuiteStatus {
    fn from(e: &BrokerError) -> Self {
        match e {
            BrokerError::NotFound { .. } | BrokerError::NotRegistered { .. } => Self::SuiteNotFound,
            BrokerError::AlreadyRegistered { .. } | BrokerError::Misaligned { .. } => {
                Self::BadParameter
            }
            BrokerError::Arena(arena) => Self::from(arena),
        }
    }
}

impl From<&ErrorChannelError> for SuiteStatus {
    fn from(e: &ErrorChannelError) -> Self {
        match e {
            ErrorChannelError::BadParameter => Self::BadParameter,
        }
    }
}

impl From<&ZStringError> for SuiteStatus {
    fn from(e: &ZStringError) -> Self {
        match e {
            ZStringError::UnknownString { .. } => Self::BadParameter,
            ZStringError::BufferTooSmall { .. } => Self::BufferTooSmall,
        }
    }
}

impl From<&ColorError> for SuiteStatus {
    fn from(e: &ColorError) -> Self {
        match e {
            ColorError::UnknownColor { .. } | ColorError::InvalidSpace { .. } => Self::BadParameter,
            ColorError::Unimplemented { .. } => Self::Unimplemented,
        }
    }
}

impl From<&ConfigError> for SuiteStatus {
    fn from(_: &ConfigError) -> Self {
        Self::BadParameter
    }
}

impl From<&Infallible> for SuiteStatus {
    fn from(e: &Infallible) -> Self {
        match *e {}
    }
}

// ── Session call errors ─────────────────────────────────────────

/// Map `CallError<E>` for each listed `E` the family already converts.
macro_rules! call_error_status {
    ($status:ident: $($error:ty),+ $(,)?) => {
        $(
            impl From<&CallError<$error>> for $status {
                fn from(e: &CallError<$error>) -> Self {
                    match e {
                        CallError::Op(op) => Self::from(op),
                        CallError::Busy { .. } => Self::Busy,
                        CallError::Faulted(_) | CallError::TornDown => Self::Aborted,
                    }
                }
            }
        )+
    };
}

call_error_status!(HostStatus: ArenaError, BufferError, HandleError, ResourceError, Infallible);
call_error_status!(
    SuiteStatus: ArenaError,
    BrokerError,
    ErrorChannelError,
    ZStringError,
    ColorError,
    ConfigError,
    Infallible,
);

/// Collapse a session call result into a host status code.
pub(crate) fn host_code<E>(result: Result<(), CallError<E>>) -> i16
where
    for<'e> HostStatus: From<&'e CallError<E>>,
{
    match result {
        Ok(()) => HostStatus::NoErr as i16,
        Err(e) => HostStatus::from(&e) as i16,
    }
}

/// Collapse a session call result into a suite status code.
pub(crate) fn suite_code<E>(result: Result<(), CallError<E>>) -> i32
where
    for<'e> SuiteStatus: From<&'e CallError<E>>,
{
    match result {
        Ok(()) => SuiteStatus::NoError as i32,
        Err(e) => SuiteStatus::from(&e) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suitehost_arena::HeapFault;
    use suitehost_core::{HandleId, ResType};

    #[test]
    fn host_status_values_are_stable() {
        assert_eq!(HostStatus::NoErr as i16, 0);
        assert_eq!(HostStatus::ParamErr as i16, -50);
        assert_eq!(HostStatus::MemFullErr as i16, -108);
        assert_eq!(HostStatus::NilHandleErr as i16, -109);
        assert_eq!(HostStatus::MemLockedErr as i16, -117);
        assert_eq!(HostStatus::Aborted as i16, -128);
        assert_eq!(HostStatus::ResNotFound as i16, -192);
    }

    #[test]
    fn suite_status_values_are_stable() {
        assert_eq!(SuiteStatus::NoError as i32, 0);
        assert_eq!(SuiteStatus::OutOfMemory as i32, -108);
        assert_eq!(SuiteStatus::Aborted as i32, -128);
        assert_eq!(SuiteStatus::SuiteNotFound as i32, 0x5321_4664);
        assert_eq!(SuiteStatus::BadParameter as i32, 0x5061_726d);
        assert_eq!(SuiteStatus::Unimplemented as i32, 0x2149_4d50);
    }

    #[test]
    fn fatal_arena_errors_abort() {
        let fatal = ArenaError::HeapCorrupted(HeapFault::BadHeader { address: 0x10 });
        assert_eq!(HostStatus::from(&fatal), HostStatus::Aborted);
        assert_eq!(SuiteStatus::from(&fatal), SuiteStatus::Aborted);
        let oom = ArenaError::OutOfMemory { requested: 8 };
        assert_eq!(HostStatus::from(&oom), HostStatus::MemFullErr);
        assert_eq!(SuiteStatus::from(&oom), SuiteStatus::OutOfMemory);
    }

    #[test]
    fn call_errors_map_per_family() {
        let busy: CallError<HandleError> = CallError::Busy { component: "handles" };
        assert_eq!(HostStatus::from(&busy), HostStatus::Busy);
        let locked = CallError::Op(HandleError::Locked {
            id: HandleId::from_raw(1).unwrap(),
        });
        assert_eq!(HostStatus::from(&locked), HostStatus::MemLockedErr);
        let gone: CallError<ResourceError> = CallError::TornDown;
        assert_eq!(HostStatus::from(&gone), HostStatus::Aborted);
        let missing = CallError::Op(ResourceError::NotFound {
            kind: ResType::from_tag(b"PiMI"),
            index: 1,
        });
        assert_eq!(HostStatus::from(&missing), HostStatus::ResNotFound);
    }

    #[test]
    fn suite_call_errors_map_for_each_error_type() {
        let missing = CallError::Op(BrokerError::NotFound {
            key: suitehost_core::SuiteKey::new("No Such Suite", 1),
        });
        assert_eq!(SuiteStatus::from(&missing), SuiteStatus::SuiteNotFound);
        let short: CallError<ZStringError> = CallError::Busy { component: "suite facade" };
        assert_eq!(SuiteStatus::from(&short), SuiteStatus::Busy);
        let faulted: CallError<ErrorChannelError> =
            CallError::Faulted(ArenaError::HeapCorrupted(HeapFault::BadHeader { address: 0x20 }));
        assert_eq!(SuiteStatus::from(&faulted), SuiteStatus::Aborted);
        assert_eq!(suite_code::<Infallible>(Err(CallError::TornDown)), SuiteStatus::Aborted as i32);
        assert_eq!(suite_code::<ArenaError>(Ok(())), 0);
        assert_eq!(host_code::<BufferError>(Err(CallError::TornDown)), -128);
    }

    #[test]
    fn code_helpers_collapse_results() {
        assert_eq!(host_code::<Infallible>(Ok(())), 0);
        assert_eq!(
            suite_code(Err(CallError::Op(ColorError::Unimplemented {
                from: suitehost_host::ColorSpace::Rgb,
                to: suitehost_host::ColorSpace::Lab,
            }))),
            SuiteStatus::Unimplemented as i32
        );
    }
}
