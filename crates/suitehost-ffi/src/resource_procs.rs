//! Resource callback tables.
//!
//! The host publishes two tables with identical shape, one per
//! collection. Resource data crosses the boundary as handles: `add` copies
//! a handle's bytes into the collection and `get` returns a fresh handle
//! holding a copy, which the plugin disposes through the handle table.

use std::convert::Infallible;

use suitehost_core::{HandleId, ResType};
use suitehost_host::{CollectionRole, HandleError};

use crate::scope::{in_session, with_active};
use crate::status::HostStatus;
use crate::types::{OSErr, ResTypeCode, Token};

/// Table version advertised in [`ResourceProcs::version`].
pub const RESOURCE_PROCS_VERSION: i16 = 3;

/// Number of callbacks in [`ResourceProcs`].
pub const RESOURCE_PROCS_COUNT: i16 = 4;

/// Resource callbacks handed to plugins.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ResourceProcs {
    /// Table version.
    pub version: i16,
    /// Number of callbacks that follow.
    pub count: i16,
    /// Number of entries of `kind`.
    pub count_resources: extern "C" fn(kind: ResTypeCode) -> i16,
    /// A new handle holding a copy of entry `index` (1-based), or 0.
    pub get_resource: extern "C" fn(kind: ResTypeCode, index: i16) -> Token,
    /// Remove entry `index`; later entries of `kind` move down by one.
    pub delete_resource: extern "C" fn(kind: ResTypeCode, index: i16),
    /// Append a copy of a handle's bytes as the last entry of `kind`.
    pub add_resource: extern "C" fn(kind: ResTypeCode, data: Token) -> OSErr,
}

// Compile-time layout assertions for ABI stability.
// 2×i16 + 4 bytes padding + 4 function pointers = 40 bytes, align 8.
const _: () = assert!(std::mem::size_of::<ResourceProcs>() == 40);
const _: () = assert!(std::mem::align_of::<ResourceProcs>() == 8);

const fn role(pseudo: bool) -> CollectionRole {
    if pseudo {
        CollectionRole::Pseudo
    } else {
        CollectionRole::Primary
    }
}

const fn table<const PSEUDO: bool>() -> ResourceProcs {
    ResourceProcs {
        version: RESOURCE_PROCS_VERSION,
        count: RESOURCE_PROCS_COUNT,
        count_resources: count_resources::<PSEUDO>,
        get_resource: get_resource::<PSEUDO>,
        delete_resource: delete_resource::<PSEUDO>,
        add_resource: add_resource::<PSEUDO>,
    }
}

static RESOURCE_PROCS: ResourceProcs = table::<false>();
static PSEUDO_RESOURCE_PROCS: ResourceProcs = table::<true>();

/// The table serving the primary resource collection.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_resource_procs() -> *const ResourceProcs {
    &RESOURCE_PROCS
}

/// The table serving the pseudo-resource collection.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn suitehost_pseudo_resource_procs() -> *const ResourceProcs {
    &PSEUDO_RESOURCE_PROCS
}

extern "C" fn count_resources<const PSEUDO: bool>(kind: ResTypeCode) -> i16 {
    ffi_guard_or!(0, {
        in_session(|s| {
            s.resources(role(PSEUDO), |r| {
                Ok::<_, Infallible>(r.count(ResType(kind)))
            })
        })
        .map_or(0, |n| i16::try_from(n).unwrap_or(i16::MAX))
    })
}

extern "C" fn get_resource<const PSEUDO: bool>(kind: ResTypeCode, index: i16) -> Token {
    ffi_guard_or!(0, {
        let kind = ResType(kind);
        let handle = with_active(|s| {
            let data = s
                .resources(role(PSEUDO), |r| r.get(kind, index))
                .map_err(|e| HostStatus::from(&e))?;
            s.handles(|h| h.from_bytes(&data))
                .map_err(|e| HostStatus::from(&e))
        });
        match handle {
            Some(Ok(id)) => id.to_raw(),
            Some(Err(status)) => {
                tracing::debug!(%kind, index, ?status, "resource get failed");
                0
            }
            None => 0,
        }
    })
}

extern "C" fn delete_resource<const PSEUDO: bool>(kind: ResTypeCode, index: i16) {
    ffi_guard_or!((), {
        let kind = ResType(kind);
        if let Err(e) = in_session(|s| s.resources(role(PSEUDO), |r| r.delete(kind, index))) {
            tracing::debug!(%kind, index, error = %e, "resource delete failed");
        }
    })
}

extern "C" fn add_resource<const PSEUDO: bool>(kind: ResTypeCode, data: Token) -> OSErr {
    ffi_guard!(HostStatus, {
        let Some(id) = HandleId::from_raw(data) else {
            return HostStatus::NilHandleErr as i16;
        };
        let kind = ResType(kind);
        let added = with_active(|s| {
            s.handles(|h| {
                let bytes = h.bytes(id).ok_or(HandleError::NotFound { id })?;
                Ok::<_, HandleError>(s.resources(role(PSEUDO), |r| r.add(kind, bytes)))
            })
            .map_err(|e| HostStatus::from(&e))?
            .map_err(|e| HostStatus::from(&e))
        });
        match added {
            Some(Ok(_)) => HostStatus::NoErr as i16,
            Some(Err(status)) => status as i16,
            None => HostStatus::Aborted as i16,
        }
    })
}
