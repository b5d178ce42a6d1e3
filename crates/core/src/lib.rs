//! Shared building blocks for the lanes runtime: error types, reserved
//! registry keys, and the Universe teardown sequence.
//!
//! The `configure()` option set itself (`Settings`) lives in
//! `lanes_universe::config`, since it is a Universe-owned field (§3) and
//! its `convert_fallback` option needs `lanes_value::Value` to express a
//! custom conversion closure — a dependency this crate deliberately stays
//! free of so it can sit at the bottom of the workspace graph.

pub mod error;
pub mod ids;
pub mod shutdown;

pub use error::{CancelError, ConfigError, TransferError};
pub use ids::UniqueKey;
pub use shutdown::{ShutdownError, ShutdownStage};
