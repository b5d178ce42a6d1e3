//! Universe teardown sequencing.
//!
//! When the last reference to a Universe is dropped, every lane still on
//! the self-destruct list (§4.4 of the design: a handle was collected while
//! its lane was still running) is sent a hard cancel and given
//! `shutdown_timeout` to terminate before teardown proceeds regardless.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while tearing down a Universe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// At least one lane did not reach a terminal status within the timeout.
    #[error("{count} lane(s) still running after {timeout_ms}ms shutdown timeout")]
    Timeout {
        /// Number of lanes still running.
        count: usize,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Shutdown was already in progress on another thread.
    #[error("Universe shutdown already in progress")]
    AlreadyInProgress,
}

/// Stages of the Universe teardown sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    /// Mark the Universe as shutting down; refuse new lane/linda creation.
    Begin,
    /// Hard-cancel every lane on the self-destruct list.
    CancelDanglingLanes,
    /// Wait up to `shutdown_timeout` for cancelled lanes to reach a terminal status.
    AwaitTermination,
    /// Destroy keeper states (idempotent; tombstone flag guards re-entry).
    DestroyKeepers,
    /// Release the allocator and drop the Universe singleton.
    Release,
    /// Teardown finished (lanes that did not terminate in time are flagged dangling, not awaited further).
    Complete,
}

impl std::fmt::Display for ShutdownStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::CancelDanglingLanes => "cancel_dangling_lanes",
            Self::AwaitTermination => "await_termination",
            Self::DestroyKeepers => "destroy_keepers",
            Self::Release => "release",
            Self::Complete => "complete",
        };
        write!(f, "{name}")
    }
}

/// Default `shutdown_timeout`, used when `Settings::shutdown_timeout` is unset.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for dangling lanes to terminate.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_names() {
        assert_eq!(ShutdownStage::Begin.to_string(), "begin");
        assert_eq!(ShutdownStage::Complete.to_string(), "complete");
    }

    #[test]
    fn timeout_error_message() {
        let err = ShutdownError::Timeout {
            count: 3,
            timeout_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "3 lane(s) still running after 5000ms shutdown timeout"
        );
    }
}
