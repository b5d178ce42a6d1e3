//! Cancellation axes (§4.4 "Cancellation").

use std::sync::atomic::{AtomicU8, Ordering};

/// How forcefully a cancel request should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Sets the request flag so cooperative code can poll `cancel_test`.
    Soft,
    /// Additionally unwinds any blocking Linda call the lane is parked in.
    Hard,
}

/// The debug-hook axis. This port has no embedded interpreter to install a
/// real debug hook into, so these variants are data only: a host embedding
/// this crate behind a real scripting language can drive its own hook off
/// `Lane::cancel_request`. Kept for API parity with the original surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugHook {
    #[default]
    None,
    Call,
    Return,
    Line,
    Count,
    All,
}

/// One `cancel()` call's full parameters (§6: `cancel(mode,
/// [hook-count|timeout], [wake])`).
#[derive(Debug, Clone, Copy)]
pub struct CancelOp {
    pub mode: CancelMode,
    pub hook: DebugHook,
    pub hook_count: u32,
    pub deadline: Option<std::time::Duration>,
    pub wake_lane: bool,
}

impl CancelOp {
    /// A hard cancel with no deadline (wait indefinitely for the lane to
    /// reach a terminal state) and no debug hook.
    pub fn hard() -> Self {
        Self {
            mode: CancelMode::Hard,
            hook: DebugHook::None,
            hook_count: 0,
            deadline: None,
            wake_lane: true,
        }
    }

    /// A soft cancel with no deadline.
    pub fn soft() -> Self {
        Self {
            mode: CancelMode::Soft,
            hook: DebugHook::None,
            hook_count: 0,
            deadline: None,
            wake_lane: false,
        }
    }
}

/// Result of a `cancel()` call: whether the lane reached a terminal state
/// within the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    Timeout,
}

const NONE: u8 = 0;
const SOFT: u8 = 1;
const HARD: u8 = 2;

/// The atomic cancel-request flag read by `cancel_test` and by the body's
/// cooperative checks.
#[derive(Debug, Default)]
pub struct CancelRequest(AtomicU8);

impl CancelRequest {
    pub fn new() -> Self {
        Self(AtomicU8::new(NONE))
    }

    pub fn set(&self, mode: CancelMode) {
        let value = match mode {
            CancelMode::Soft => SOFT,
            CancelMode::Hard => HARD,
        };
        self.0.store(value, Ordering::Release);
    }

    pub fn mode(&self) -> Option<CancelMode> {
        match self.0.load(Ordering::Acquire) {
            SOFT => Some(CancelMode::Soft),
            HARD => Some(CancelMode::Hard),
            _ => None,
        }
    }

    pub fn is_hard(&self) -> bool {
        self.mode() == Some(CancelMode::Hard)
    }

    pub fn is_requested(&self) -> bool {
        self.mode().is_some()
    }
}
