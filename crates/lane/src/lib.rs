//! OS thread + interpreter-state analogue + status FSM + cancellation +
//! coroutine mode + finalizer chain + result storage (§4.4 "Lane").

pub mod body;
pub mod cancel;
pub mod context;
pub mod error;
pub mod finalizer;
mod lane;
pub mod status;
pub mod trace;

pub use body::LaneBody;
pub use cancel::{CancelMode, CancelOp, CancelOutcome, CancelRequest, DebugHook};
pub use context::LaneContext;
pub use error::{Failure, LaneError};
pub use finalizer::{Finalizer, FinalizerChain};
pub use lane::{Lane, LaneConfig};
pub use status::LaneStatus;
pub use trace::{ErrorTrace, ErrorTraceLevel, StackFrame};
