//! The set of suites this host publishes.
//!
//! The host crate knows which suites exist and owns their state; the
//! function tables themselves are supplied by whoever renders the ABI,
//! through [`SuiteCatalog`].

use suitehost_core::SuiteKey;

use crate::registry::{BrokerError, SuitePtr, SuiteRegistry};

/// A suite the host can publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SuiteKind {
    /// Suite acquisition and raw block allocation.
    Basic,
    /// Pointer-addressed scratch buffers.
    Buffer,
    /// Reference-counted strings.
    ZString,
    /// Colour objects.
    ColorSpace,
    /// Host window and identity hooks.
    UiHooks,
    /// Plugin error reporting.
    Error,
}

impl SuiteKind {
    /// Every published suite.
    pub const ALL: [SuiteKind; 6] = [
        Self::Basic,
        Self::Buffer,
        Self::ZString,
        Self::ColorSpace,
        Self::UiHooks,
        Self::Error,
    ];

    /// Advertised suite name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "SP Basic Suite",
            Self::Buffer => "Photoshop Buffer Suite for Plug-ins",
            Self::ZString => "AS ZString Suite",
            Self::ColorSpace => "Photoshop ColorSpace Suite for Plug-ins",
            Self::UiHooks => "Photoshop UIHooks Suite for Plug-ins",
            Self::Error => "Photoshop Error Suite for Plug-ins",
        }
    }

    /// Interface version the host implements. All suites are version 1.
    pub const fn version(self) -> i32 {
        1
    }

    /// Registry key for this suite.
    pub fn key(self) -> SuiteKey {
        SuiteKey::new(self.name(), self.version())
    }

    /// Which suite, if any, a requested key names. Both name and version
    /// must match exactly.
    pub fn resolve(key: &SuiteKey) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().as_bytes() == key.name() && kind.version() == key.version())
    }

    /// Whether the suite has per-session state built by the facade.
    pub fn has_state(self) -> bool {
        matches!(
            self,
            Self::Buffer | Self::ZString | Self::ColorSpace | Self::UiHooks
        )
    }
}

/// Supplies the function table for each published suite.
pub trait SuiteCatalog {
    /// Copy the table for `kind` into `registry` under `key`.
    ///
    /// Implementations call [`SuiteRegistry::allocate_suite`] with their
    /// concrete table type.
    fn publish(
        &self,
        kind: SuiteKind,
        key: SuiteKey,
        registry: &mut SuiteRegistry,
    ) -> Result<SuitePtr, BrokerError>;
}
