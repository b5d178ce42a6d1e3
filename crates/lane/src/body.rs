//! The lane body contract.
//!
//! There is no embedded scripting language behind this port: a lane body
//! is a plain Rust closure. It plays the role the original's dumped
//! function + copied arguments play, already resolved on this side of the
//! inter-copy boundary by the caller.

use crate::context::LaneContext;
use crate::error::LaneError;
use lanes_value::Value;

/// A lane body: takes its lane-scoped context and its (already copied)
/// arguments, returns its (to-be-copied-back) results or an error.
pub type LaneBody = Box<dyn FnOnce(&LaneContext, Vec<Value>) -> Result<Vec<Value>, LaneError> + Send>;
