//! Session configuration, validation, and error types.
//!
//! [`SessionConfig`] is the input for constructing a
//! [`HostSession`](crate::HostSession). [`validate()`](SessionConfig::validate)
//! checks every field up front so a misconfigured host fails at startup
//! rather than on the first plugin call.

use std::error::Error;
use std::fmt;

use suitehost_arena::ArenaConfig;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SessionConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Buffer space ceiling is zero.
    ZeroBufferCeiling,
    /// Plugin name is empty.
    EmptyPluginName,
    /// Plugin name contains a NUL byte and cannot cross the boundary.
    PluginNameContainsNul {
        /// Byte offset of the first NUL.
        position: usize,
    },
    /// Per-entry resource size cap is zero.
    ZeroResourceCap,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBufferCeiling => write!(f, "buffer_ceiling must be greater than zero"),
            Self::EmptyPluginName => write!(f, "plugin_name must not be empty"),
            Self::PluginNameContainsNul { position } => {
                write!(f, "plugin_name contains NUL at byte {position}")
            }
            Self::ZeroResourceCap => write!(f, "max_resource_bytes must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}

// ── SessionConfig ──────────────────────────────────────────────────

/// Complete configuration for one plugin host session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on the buffer space reported to plugins. Default: 1 GiB.
    pub buffer_ceiling: u64,
    /// Name handed to the plugin by the UI hooks suite.
    pub plugin_name: String,
    /// Host main-window token returned by the UI hooks suite. Default: 0.
    pub main_window: usize,
    /// Largest single resource blob a plugin may store. Default: 64 MiB.
    pub max_resource_bytes: usize,
}

impl SessionConfig {
    /// Default per-entry resource cap: 64 MiB.
    pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 64 << 20;

    /// Check all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_ceiling == 0 {
            return Err(ConfigError::ZeroBufferCeiling);
        }
        if self.plugin_name.is_empty() {
            return Err(ConfigError::EmptyPluginName);
        }
        if let Some(position) = self.plugin_name.bytes().position(|b| b == 0) {
            return Err(ConfigError::PluginNameContainsNul { position });
        }
        if self.max_resource_bytes == 0 {
            return Err(ConfigError::ZeroResourceCap);
        }
        Ok(())
    }

    /// Arena parameters derived from this config.
    pub fn arena_config(&self) -> ArenaConfig {
        ArenaConfig::with_buffer_ceiling(self.buffer_ceiling)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_ceiling: ArenaConfig::DEFAULT_BUFFER_CEILING,
            plugin_name: String::from("suitehost"),
            main_window: 0,
            max_resource_bytes: Self::DEFAULT_MAX_RESOURCE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.arena_config().buffer_ceiling, 1 << 30);
    }

    #[test]
    fn zero_ceiling_rejected() {
        let config = SessionConfig {
            buffer_ceiling: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBufferCeiling));
    }

    #[test]
    fn plugin_name_checks() {
        let mut config = SessionConfig {
            plugin_name: String::new(),
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPluginName));
        config.plugin_name = "Blur\0More".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::PluginNameContainsNul { position: 4 })
        );
    }

    #[test]
    fn zero_resource_cap_rejected() {
        let config = SessionConfig {
            max_resource_bytes: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroResourceCap));
    }
}
