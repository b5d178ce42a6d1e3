//! `configure()` options (§6 "Configuration options").

use lanes_copy::ConvertFallback;
use lanes_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `allocator`: `"protected"` wraps every alloc/free from any state in the
/// Universe behind a mutex, for allocators that are not thread-safe. This
/// port always uses the (thread-safe) global Rust allocator, so `Protected`
/// is accepted for API compatibility but has no observable effect beyond
/// being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllocatorMode {
    #[default]
    Default,
    Protected,
}

/// `internal_allocator`: source for bookkeeping allocations internal to
/// the runtime itself, as opposed to scripting-level allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InternalAllocator {
    #[default]
    Libc,
    Allocator,
}

/// `on_state_create`: invoked on every new lane or keeper immediately
/// after setup. Represented as a bare `fn` pointer rather than a closure:
/// a `fn` pointer cannot capture its environment, which is how this port
/// enforces "must not have upvalues" (§6) structurally instead of at
/// runtime.
pub type OnStateCreate = fn();

/// The full `configure()` option set (§6), a plain `Deserialize`-able
/// struct so it can be loaded from a config file rather than built by
/// hand. `on_state_create` and `convert_fallback` are not representable in
/// a serialized config (a function pointer and a possibly-closure-backed
/// hook) and are skipped, defaulting to `None`/[`ConvertFallback::default`]
/// on load; set them in code after deserializing if needed.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    pub allocator: AllocatorMode,
    pub internal_allocator: InternalAllocator,
    pub keepers_gc_threshold: i64,
    pub nb_user_keepers: i64,
    #[serde(skip)]
    pub on_state_create: Option<OnStateCreate>,
    pub shutdown_timeout: Duration,
    pub strip_functions: bool,
    pub track_lanes: bool,
    pub verbose_errors: bool,
    pub with_timers: bool,
    #[serde(skip)]
    pub convert_fallback: ConvertFallback,
    pub convert_max_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allocator: AllocatorMode::default(),
            internal_allocator: InternalAllocator::default(),
            keepers_gc_threshold: 0,
            nb_user_keepers: 0,
            on_state_create: None,
            shutdown_timeout: lanes_core::shutdown::DEFAULT_SHUTDOWN_TIMEOUT,
            strip_functions: true,
            track_lanes: false,
            verbose_errors: false,
            with_timers: true,
            convert_fallback: ConvertFallback::default(),
            convert_max_attempts: 1,
        }
    }
}

impl Settings {
    /// Validate the option set, eagerly, per §6: "Unknown keys, wrong
    /// types, out-of-range numbers: fatal at configure time." Unknown
    /// keys and wrong types cannot occur in this port (they are Rust
    /// struct fields with static types); only range checks remain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=100).contains(&self.nb_user_keepers) {
            return Err(ConfigError::out_of_range(
                "nb_user_keepers",
                self.nb_user_keepers,
                "0..=100",
            ));
        }
        if self.keepers_gc_threshold < 0 {
            return Err(ConfigError::out_of_range(
                "keepers_gc_threshold",
                self.keepers_gc_threshold,
                "0..",
            ));
        }
        if self.convert_max_attempts < 1 {
            return Err(ConfigError::out_of_range(
                "convert_max_attempts",
                self.convert_max_attempts as i64,
                "1..",
            ));
        }
        let shutdown_secs = self.shutdown_timeout.as_secs() as i64;
        if !(0..=3600).contains(&shutdown_secs) {
            return Err(ConfigError::out_of_range(
                "shutdown_timeout",
                shutdown_secs,
                "0..=3600",
            ));
        }
        Ok(())
    }

    /// Total keeper count: the default keeper plus configured user keepers
    /// (§3 "Fixed-size array of Keepers, sized at initialization (1
    /// default + configured user count, 0..100)").
    pub fn total_keepers(&self) -> usize {
        1 + self.nb_user_keepers as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_nb_user_keepers_is_rejected() {
        let mut settings = Settings::default();
        settings.nb_user_keepers = 101;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn total_keepers_includes_the_default() {
        let mut settings = Settings::default();
        settings.nb_user_keepers = 3;
        assert_eq!(settings.total_keepers(), 4);
    }
}
