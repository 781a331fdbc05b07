//! Host-side C API: session lifecycle.
//!
//! A C host creates a session, marks it active around each call into the
//! plugin, reads back the plugin's error message, and destroys it. Sessions
//! live in a per-thread handle table and never cross threads.

use std::cell::RefCell;
use std::ffi::{c_char, CStr};

use suitehost_arena::HandleTable;
use suitehost_host::{HostSession, SessionConfig, TeardownReport};

use crate::scope;
use crate::status::SuiteStatus;

thread_local! {
    static SESSIONS: RefCell<HandleTable<Box<HostSession>>> =
        const { RefCell::new(HandleTable::new()) };
}

/// C-compatible session configuration.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SuitehostSessionConfig {
    /// NUL-terminated plugin name. Null keeps the default.
    pub plugin_name: *const c_char,
    /// Largest single buffer the host hands out, in bytes.
    pub buffer_ceiling: u64,
    /// Host main-window token reported through the UI hooks suite.
    pub main_window: usize,
    /// Largest single resource entry, in bytes.
    pub max_resource_bytes: u64,
}

// 8 + 8 + 8 + 8 = 32 bytes, align 8.
const _: () = assert!(std::mem::size_of::<SuitehostSessionConfig>() == 32);

/// C-compatible summary of a session teardown.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SuitehostTeardownReport {
    /// Buffers the plugin never freed.
    pub buffers_released: u64,
    /// Handles the plugin never disposed.
    pub handles_released: u64,
    /// Suites still referenced, freed by force.
    pub suites_forced: u64,
    /// Buffer suite blocks the plugin never disposed.
    pub suite_buffers_released: u64,
    /// Basic suite blocks the plugin never freed.
    pub blocks_released: u64,
    /// Resource entries dropped across both collections.
    pub resources_cleared: u64,
    /// Arena blocks still outstanding after teardown.
    pub leaked_blocks: u64,
    /// Number of arena faults hit during teardown.
    pub fault_count: u64,
}

const _: () = assert!(std::mem::size_of::<SuitehostTeardownReport>() == 64);

impl From<&TeardownReport> for SuitehostTeardownReport {
    fn from(r: &TeardownReport) -> Self {
        let n = |v: usize| v as u64;
        Self {
            buffers_released: n(r.buffers_released),
            handles_released: n(r.handles_released),
            suites_forced: n(r.suites_forced),
            suite_buffers_released: n(r.suite_buffers_released),
            blocks_released: n(r.blocks_released),
            resources_cleared: n(r.resources_cleared),
            leaked_blocks: n(r.leaked_blocks),
            fault_count: n(r.faults.len()),
        }
    }
}

impl SuitehostSessionConfig {
    #[allow(unsafe_code)]
    fn to_rust(self) -> Option<SessionConfig> {
        let defaults = SessionConfig::default();
        let plugin_name = if self.plugin_name.is_null() {
            defaults.plugin_name
        } else {
            // SAFETY: a non-null name is NUL-terminated.
            unsafe { CStr::from_ptr(self.plugin_name) }.to_str().ok()?.to_owned()
        };
        Some(SessionConfig {
            plugin_name,
            buffer_ceiling: self.buffer_ceiling,
            main_window: self.main_window,
            max_resource_bytes: usize::try_from(self.max_resource_bytes).ok()?,
        })
    }
}

/// Fill `out` with the default configuration.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_config_default(out: *mut SuitehostSessionConfig) -> i32 {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the host passes a valid config slot or null.
        let Some(out) = (unsafe { out.as_mut() }) else {
            return SuiteStatus::BadParameter as i32;
        };
        let defaults = SessionConfig::default();
        *out = SuitehostSessionConfig {
            plugin_name: std::ptr::null(),
            buffer_ceiling: defaults.buffer_ceiling,
            main_window: defaults.main_window,
            max_resource_bytes: defaults.max_resource_bytes as u64,
        };
        SuiteStatus::NoError as i32
    })
}

/// Create a session. The handle goes to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_create(
    config: *const SuitehostSessionConfig,
    out: *mut u64,
) -> i32 {
    ffi_guard!(SuiteStatus, {
        // SAFETY: the host passes valid config and handle slots or null.
        let (Some(config), Some(out)) = (unsafe { config.as_ref() }, unsafe { out.as_mut() }) else {
            return SuiteStatus::BadParameter as i32;
        };
        let Some(config) = config.to_rust() else {
            return SuiteStatus::BadParameter as i32;
        };
        match HostSession::new(config) {
            Ok(session) => {
                let handle =
                    SESSIONS.with(|sessions| sessions.borrow_mut().insert(Box::new(session)));
                *out = handle.get();
                SuiteStatus::NoError as i32
            }
            Err(e) => {
                tracing::warn!(error = %e, "session configuration rejected");
                *out = 0;
                SuiteStatus::from(&e) as i32
            }
        }
    })
}

/// Make a session the one plugin callbacks reach on this thread.
///
/// Fails if any session is already entered on this thread.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_enter(handle: u64) -> i32 {
    ffi_guard!(SuiteStatus, {
        let installed = SESSIONS.with(|sessions| {
            let sessions = sessions.borrow();
            let session: &HostSession = sessions.get(handle)?;
            Some(scope::install(session))
        });
        match installed {
            Some(true) => SuiteStatus::NoError as i32,
            Some(false) => SuiteStatus::Busy as i32,
            None => SuiteStatus::BadParameter as i32,
        }
    })
}

/// Stop routing plugin callbacks to a session.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_exit(handle: u64) -> i32 {
    ffi_guard!(SuiteStatus, {
        let cleared = SESSIONS.with(|sessions| {
            let sessions = sessions.borrow();
            let session: &HostSession = sessions.get(handle)?;
            Some(scope::uninstall(session))
        });
        match cleared {
            Some(true) => SuiteStatus::NoError as i32,
            Some(false) | None => SuiteStatus::BadParameter as i32,
        }
    })
}

/// Tear down and destroy a session. The report goes to `report` if it is
/// non-null. A session still entered on this thread cannot be destroyed,
/// even while a nested scope shadows it.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_destroy(
    handle: u64,
    report: *mut SuitehostTeardownReport,
) -> i32 {
    ffi_guard!(SuiteStatus, {
        let removed = SESSIONS.with(|sessions| {
            let Ok(mut sessions) = sessions.try_borrow_mut() else {
                return Err(SuiteStatus::Busy);
            };
            let entered = sessions
                .get(handle)
                .is_some_and(|session| scope::is_entered(&**session));
            if entered {
                return Err(SuiteStatus::Busy);
            }
            sessions.remove(handle).ok_or(SuiteStatus::BadParameter)
        });
        let mut session = match removed {
            Ok(session) => session,
            Err(status) => return status as i32,
        };
        let summary = session.teardown();
        // SAFETY: the host passes a valid report slot or null.
        if let Some(out) = unsafe { report.as_mut() } {
            *out = SuitehostTeardownReport::from(&summary);
        }
        SuiteStatus::NoError as i32
    })
}

/// Whether the session has latched a fatal fault: 1 if so, 0 if not, or
/// a negative status for an unknown handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_faulted(handle: u64) -> i32 {
    ffi_guard!(SuiteStatus, {
        SESSIONS.with(|sessions| match sessions.borrow().get(handle) {
            Some(session) => i32::from(session.fault().is_some()),
            None => SuiteStatus::Aborted as i32,
        })
    })
}

/// Copy the plugin's reported error message into `buf`.
///
/// Returns the full message length in bytes, not counting the NUL, or 0
/// if there is none or the handle is unknown. At most `cap - 1` bytes are
/// copied and the copy is always NUL-terminated.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_session_error_message(
    handle: u64,
    buf: *mut c_char,
    cap: usize,
) -> i32 {
    ffi_guard_or!(0, {
        let message = SESSIONS.with(|sessions| {
            sessions
                .borrow()
                .get(handle)
                .and_then(|session| session.error_message())
        });
        let Some(message) = message else {
            return 0;
        };
        crate::copy_message(message.as_bytes(), buf, cap)
    })
}
