//! Host identity hooks behind the UIHooks suite.

use std::time::Instant;

/// Ticks per second reported by [`UiHooks::tick_count`].
pub const TICKS_PER_SECOND: u64 = 60;

/// Host window token, plugin name and a session clock.
#[derive(Debug)]
pub struct UiHooks {
    main_window: usize,
    plugin_name: String,
    started: Instant,
}

impl UiHooks {
    /// Create hooks reporting `main_window` and `plugin_name`. The tick
    /// clock starts now.
    pub fn new(main_window: usize, plugin_name: impl Into<String>) -> Self {
        Self {
            main_window,
            plugin_name: plugin_name.into(),
            started: Instant::now(),
        }
    }

    /// The host's main window token.
    pub fn main_app_window(&self) -> usize {
        self.main_window
    }

    /// The running plugin's display name.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Sixtieths of a second since the hooks were created. Wraps.
    pub fn tick_count(&self) -> u32 {
        let millis = self.started.elapsed().as_millis();
        (millis * u128::from(TICKS_PER_SECOND) / 1000) as u32
    }
}
