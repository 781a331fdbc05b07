//! Lazily constructed state for the higher-level suites.
//!
//! Nothing is built until a plugin first acquires the suite. The facade
//! owns everything it builds and releases it all at teardown.

use std::rc::Rc;

use suitehost_arena::{ArenaError, MemoryArena};

use crate::buffer_suite::BufferSuite;
use crate::catalog::SuiteKind;
use crate::colorspace::ColorSpaceTable;
use crate::uihooks::UiHooks;
use crate::zstring::ZStringTable;

/// Owner of per-session suite state.
pub struct SuiteFacade {
    arena: Rc<MemoryArena>,
    main_window: usize,
    plugin_name: String,
    buffers: Option<BufferSuite>,
    zstrings: Option<ZStringTable>,
    colors: Option<ColorSpaceTable>,
    ui: Option<UiHooks>,
}

impl SuiteFacade {
    /// Create a facade with nothing constructed yet.
    pub fn new(arena: Rc<MemoryArena>, main_window: usize, plugin_name: impl Into<String>) -> Self {
        Self {
            arena,
            main_window,
            plugin_name: plugin_name.into(),
            buffers: None,
            zstrings: None,
            colors: None,
            ui: None,
        }
    }

    /// Build the state behind `kind` if it is not built yet.
    pub fn prepare(&mut self, kind: SuiteKind) {
        match kind {
            SuiteKind::Buffer => {
                self.buffer_suite();
            }
            SuiteKind::ZString => {
                self.zstrings();
            }
            SuiteKind::ColorSpace => {
                self.colors();
            }
            SuiteKind::UiHooks => {
                self.ui_hooks();
            }
            SuiteKind::Basic | SuiteKind::Error => {}
        }
    }

    /// Whether the state behind `kind` has been built.
    pub fn is_constructed(&self, kind: SuiteKind) -> bool {
        match kind {
            SuiteKind::Buffer => self.buffers.is_some(),
            SuiteKind::ZString => self.zstrings.is_some(),
            SuiteKind::ColorSpace => self.colors.is_some(),
            SuiteKind::UiHooks => self.ui.is_some(),
            SuiteKind::Basic | SuiteKind::Error => false,
        }
    }

    /// The buffer suite, built on first use.
    pub fn buffer_suite(&mut self) -> &mut BufferSuite {
        let arena = &self.arena;
        self.buffers
            .get_or_insert_with(|| BufferSuite::new(Rc::clone(arena)))
    }

    /// The string table, built on first use.
    pub fn zstrings(&mut self) -> &mut ZStringTable {
        self.zstrings.get_or_insert_with(ZStringTable::new)
    }

    /// The string table if it has been built.
    pub fn zstrings_if_built(&self) -> Option<&ZStringTable> {
        self.zstrings.as_ref()
    }

    /// The colour table, built on first use.
    pub fn colors(&mut self) -> &mut ColorSpaceTable {
        self.colors.get_or_insert_with(ColorSpaceTable::new)
    }

    /// The UI hooks, built on first use.
    pub fn ui_hooks(&mut self) -> &mut UiHooks {
        let (window, name) = (self.main_window, &self.plugin_name);
        self.ui
            .get_or_insert_with(|| UiHooks::new(window, name.as_str()))
    }

    /// Drop everything built so far. Returns the number of buffer suite
    /// blocks that were still outstanding.
    pub fn teardown(&mut self) -> Result<usize, ArenaError> {
        let released = match self.buffers.take() {
            Some(mut buffers) => {
                let n = buffers.len();
                if n > 0 {
                    tracing::warn!(blocks = n, "releasing suite buffers still held at teardown");
                }
                buffers.release_all()?
            }
            None => 0,
        };
        self.zstrings = None;
        self.colors = None;
        self.ui = None;
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suitehost_test_utils::TrackingHeap;

    #[test]
    fn nothing_built_until_prepared() {
        let heap = TrackingHeap::new();
        let mut facade = SuiteFacade::new(heap.arena(), 0, "p");
        for kind in SuiteKind::ALL {
            assert!(!facade.is_constructed(kind));
        }
        facade.prepare(SuiteKind::ColorSpace);
        assert!(facade.is_constructed(SuiteKind::ColorSpace));
        assert!(!facade.is_constructed(SuiteKind::Buffer));
    }

    #[test]
    fn built_state_persists_across_requests() {
        let heap = TrackingHeap::new();
        let mut facade = SuiteFacade::new(heap.arena(), 0, "p");
        let r = facade.zstrings().make_from_str("kept");
        assert!(facade.zstrings_if_built().is_some());
        assert_eq!(facade.zstrings().len(), 1);
        assert!(facade.zstrings().units(r).is_some());
    }

    #[test]
    fn ui_hooks_carry_session_identity() {
        let heap = TrackingHeap::new();
        let mut facade = SuiteFacade::new(heap.arena(), 42, "Twirl");
        assert_eq!(facade.ui_hooks().main_app_window(), 42);
        assert_eq!(facade.ui_hooks().plugin_name(), "Twirl");
    }

    #[test]
    fn teardown_releases_suite_buffers() {
        let heap = TrackingHeap::new();
        let mut facade = SuiteFacade::new(heap.arena(), 0, "p");
        facade.buffer_suite().new_block(64, 64).unwrap();
        facade.prepare(SuiteKind::ZString);
        assert_eq!(facade.teardown(), Ok(1));
        assert_eq!(heap.live_blocks(), 0);
        assert!(!facade.is_constructed(SuiteKind::ZString));
    }
}
