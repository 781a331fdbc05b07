//! Integration test: a plugin driven entirely through the C surface.
//!
//! The "plugin" here only ever sees raw tables and tokens, as a C plugin
//! would. The host side uses the `suitehost_session_*` API to create a
//! session, mark it active around the plugin call, read the plugin's
//! error message back, and tear down.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_void, CStr};
use std::ptr;

use suitehost_ffi::basic::suitehost_basic_suite;
use suitehost_ffi::session::{
    suitehost_session_config_default, suitehost_session_create, suitehost_session_destroy,
    suitehost_session_enter, suitehost_session_error_message, suitehost_session_exit,
    suitehost_session_faulted,
};
use suitehost_ffi::{
    suitehost_buffer_procs, suitehost_handle_procs, suitehost_pseudo_resource_procs, BufferProcs,
    BufferSuite1, ErrorSuite1, HandleProcs, HostStatus, ResourceProcs, SPBasicSuite, SessionScope,
    SuiteStatus, SuitehostSessionConfig, SuitehostTeardownReport, UIHooksSuite1, ZStringSuite1,
};
use suitehost_host::{HostSession, SessionConfig};
use suitehost_test_utils::TrackingHeap;

// ── Plugin side ──────────────────────────────────────────────────────

/// Everything the host hands a plugin at entry.
struct PluginRecord {
    basic: &'static SPBasicSuite,
    buffers: &'static BufferProcs,
    handles: &'static HandleProcs,
    pseudo_resources: &'static ResourceProcs,
}

impl PluginRecord {
    fn from_host() -> Self {
        // SAFETY: all four point at process-lifetime statics.
        unsafe {
            Self {
                basic: &*suitehost_basic_suite(),
                buffers: &*suitehost_buffer_procs(),
                handles: &*suitehost_handle_procs(),
                pseudo_resources: &*suitehost_pseudo_resource_procs(),
            }
        }
    }

    fn acquire<T>(&self, name: &CStr) -> &'static T {
        let mut table: *const c_void = ptr::null();
        assert_eq!((self.basic.acquire_suite)(name.as_ptr(), 1, &mut table), 0);
        assert!(!table.is_null());
        // SAFETY: the table stays valid until the matching release, and
        // every test releases before the session goes away.
        unsafe { &*table.cast::<T>() }
    }

    fn release(&self, name: &CStr) {
        assert_eq!((self.basic.release_suite)(name.as_ptr(), 1), 0);
    }
}

const ZSTRING: &CStr = c"AS ZString Suite";
const UI_HOOKS: &CStr = c"Photoshop UIHooks Suite for Plug-ins";
const BUFFER: &CStr = c"Photoshop Buffer Suite for Plug-ins";
const ERROR: &CStr = c"Photoshop Error Suite for Plug-ins";

const SCRIPT: u32 = u32::from_be_bytes(*b"Scrp");

/// Read the plugin's own name back through the UI hooks and ZString
/// suites.
fn plugin_name(record: &PluginRecord) -> String {
    let zstrings: &ZStringSuite1 = record.acquire(ZSTRING);
    let hooks: &UIHooksSuite1 = record.acquire(UI_HOOKS);

    let mut name = 0;
    assert_eq!((hooks.get_plugin_name)(ptr::null_mut(), &mut name), 0);
    let mut needed = 0;
    assert_eq!((zstrings.length_as_c_string)(name, &mut needed), 0);
    let mut buf = vec![0 as c_char; needed as usize];
    assert_eq!((zstrings.as_c_string)(name, buf.as_mut_ptr(), needed, 1), 0);
    assert_eq!((zstrings.release)(name), 0);

    record.release(UI_HOOKS);
    record.release(ZSTRING);
    // SAFETY: `as_c_string` always terminates inside the buffer.
    unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap().to_owned()
}

/// A filter pass: scratch buffers, a persisted script parameter, and a
/// reported failure. Leaves one raw block and one buffer behind on
/// purpose.
fn run_filter(record: &PluginRecord) {
    let suite: &BufferSuite1 = record.acquire(BUFFER);
    let mut granted = 1 << 16;
    let scratch = (suite.new)(&mut granted, 256);
    assert!(!scratch.is_null());
    assert!(granted >= 256);
    assert_eq!((suite.get_size)(scratch), granted);
    // SAFETY: `scratch` holds `granted` bytes.
    unsafe { ptr::write_bytes(scratch, 0x7f, granted as usize) };
    let mut scratch = scratch;
    (suite.dispose)(&mut scratch);
    assert!(scratch.is_null());
    record.release(BUFFER);

    let mut token = 0;
    assert_eq!((record.buffers.allocate)(512, &mut token), 0);
    let addr = (record.buffers.lock)(token, 0);
    assert!(!addr.is_null());
    (record.buffers.unlock)(token);

    let h = (record.handles.new_handle)(4);
    let bytes = (record.handles.lock)(h, 0);
    // SAFETY: a locked four-byte handle.
    unsafe { ptr::copy_nonoverlapping(b"0.75".as_ptr(), bytes, 4) };
    (record.handles.unlock)(h);
    assert_eq!((record.pseudo_resources.add_resource)(SCRIPT, h), 0);
    (record.handles.dispose)(h);
    assert_eq!((record.pseudo_resources.count_resources)(SCRIPT), 1);

    let mut block: *mut c_void = ptr::null_mut();
    assert_eq!((record.basic.allocate_block)(64, &mut block), 0);
    let mut grown: *mut c_void = ptr::null_mut();
    assert_eq!((record.basic.reallocate_block)(block, 128, &mut grown), 0);
    assert!(!grown.is_null());

    let errors: &ErrorSuite1 = record.acquire(ERROR);
    assert_eq!(
        (errors.set_error_from_cstring)(c"Could not complete the filter".as_ptr()),
        0
    );
    record.release(ERROR);
}

// ── Host side ────────────────────────────────────────────────────────

fn create_session(name: &CStr) -> u64 {
    let mut config = SuitehostSessionConfig {
        plugin_name: ptr::null(),
        buffer_ceiling: 0,
        main_window: 0,
        max_resource_bytes: 0,
    };
    assert_eq!(suitehost_session_config_default(&mut config), 0);
    config.plugin_name = name.as_ptr();
    let mut handle = 0;
    assert_eq!(suitehost_session_create(&config, &mut handle), 0);
    assert_ne!(handle, 0);
    handle
}

fn error_message(handle: u64) -> String {
    let mut buf = [0 as c_char; 128];
    let len = suitehost_session_error_message(handle, buf.as_mut_ptr(), buf.len());
    assert!(len > 0);
    // SAFETY: the export always terminates inside the buffer.
    unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap().to_owned()
}

#[test]
fn plugin_sees_its_own_name() {
    let handle = create_session(c"Lens Blur");
    let record = PluginRecord::from_host();

    assert_eq!(suitehost_session_enter(handle), 0);
    let name = plugin_name(&record);
    assert_eq!(suitehost_session_exit(handle), 0);

    assert_eq!(name, "Lens Blur");
    let mut report = SuitehostTeardownReport::default();
    assert_eq!(suitehost_session_destroy(handle, &mut report), 0);
    assert_eq!(report.suites_forced, 0);
    assert_eq!(report.leaked_blocks, 0);
    assert_eq!(report.fault_count, 0);
}

#[test]
fn filter_run_reports_error_and_reclaims_leaks() {
    let handle = create_session(c"Lens Blur");
    let record = PluginRecord::from_host();

    assert_eq!(suitehost_session_enter(handle), 0);
    run_filter(&record);
    assert_eq!(suitehost_session_exit(handle), 0);

    assert_eq!(error_message(handle), "Could not complete the filter");
    assert_eq!(suitehost_session_faulted(handle), 0);

    let mut report = SuitehostTeardownReport::default();
    assert_eq!(suitehost_session_destroy(handle, &mut report), 0);
    assert_eq!(report.buffers_released, 1);
    assert_eq!(report.blocks_released, 1);
    assert_eq!(report.handles_released, 0);
    assert_eq!(report.suite_buffers_released, 0);
    assert_eq!(report.resources_cleared, 1);
    assert_eq!(report.suites_forced, 0);
    assert_eq!(report.leaked_blocks, 0);
}

#[test]
fn callbacks_outside_a_session_abort() {
    let record = PluginRecord::from_host();
    let mut token = 0;
    assert_eq!(
        (record.buffers.allocate)(16, &mut token),
        HostStatus::Aborted as i16
    );
    let mut table: *const c_void = ptr::null();
    assert_eq!(
        (record.basic.acquire_suite)(BUFFER.as_ptr(), 1, &mut table),
        SuiteStatus::Aborted as i32
    );
    assert!(table.is_null());
}

#[test]
fn heap_fault_latches_and_aborts_later_calls() {
    let heap = TrackingHeap::new();
    let mut session = HostSession::with_heap(SessionConfig::default(), heap.clone()).unwrap();
    let record = PluginRecord::from_host();

    SessionScope::enter(&session, || {
        let mut first = 0;
        assert_eq!((record.buffers.allocate)(32, &mut first), 0);
        heap.fault_next_free();
        (record.buffers.free)(first);

        let mut second = 0;
        assert_eq!(
            (record.buffers.allocate)(32, &mut second),
            HostStatus::Aborted as i16
        );
        assert_eq!(second, 0);
        assert_eq!((record.handles.new_handle)(8), 0);
        let mut block: *mut c_void = ptr::null_mut();
        assert_eq!(
            (record.basic.allocate_block)(8, &mut block),
            SuiteStatus::Aborted as i32
        );
    });

    assert!(session.fault().is_some());
    let report = session.teardown();
    assert!(!report.is_clean());
}

#[test]
fn unknown_suite_and_version_mismatch() {
    let handle = create_session(c"probe");
    let record = PluginRecord::from_host();
    assert_eq!(suitehost_session_enter(handle), 0);

    let mut table: *const c_void = ptr::null();
    assert_eq!(
        (record.basic.acquire_suite)(c"No Such Suite".as_ptr(), 1, &mut table),
        SuiteStatus::SuiteNotFound as i32
    );
    assert_eq!(
        (record.basic.acquire_suite)(BUFFER.as_ptr(), 2, &mut table),
        SuiteStatus::SuiteNotFound as i32
    );
    assert!(table.is_null());

    assert_eq!(suitehost_session_exit(handle), 0);
    assert_eq!(suitehost_session_destroy(handle, ptr::null_mut()), 0);
}
