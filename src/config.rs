//! Registry configuration (SPEC_FULL.md "Configuration").
//!
//! Spec.md §6 "Defaults" leaves the default per-fd timeout
//! implementation-defined ("e.g. several seconds"); this is the one knob,
//! expressed as a small value type in the teacher's `Interests`/`PollOpt`
//! style rather than a config-file loader.

use std::time::Duration;

use crate::record::Timeout;

#[derive(Clone, Copy, Debug)]
pub struct RegistryConfig {
    /// Per-fd readiness deadline applied to newly created records.
    /// `listen()` always overrides this to `None` (infinite) regardless of
    /// this setting (spec.md §4.D "listen").
    pub default_timeout: Timeout,
}

impl RegistryConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(default_timeout: Timeout) -> RegistryConfig {
        RegistryConfig { default_timeout }
    }
}

impl Default for RegistryConfig {
    fn default() -> RegistryConfig {
        RegistryConfig {
            default_timeout: Some(RegistryConfig::DEFAULT_TIMEOUT),
        }
    }
}
