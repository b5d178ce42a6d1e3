//! The user-facing channel (§4.3 "Linda"): routes operations to its
//! assigned Keeper and carries the condition variables blocking
//! send/receive wait on.

pub mod error;
pub mod state;

pub use error::LindaError;
pub use state::{Deadline, Direction, Linda};
