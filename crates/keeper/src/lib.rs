//! The mutex-guarded per-key FIFO store that backs every Linda in a
//! keeper group (§4.2 "Keeper"). A keeper owns no Linda identity of its
//! own; callers address it by a Linda's (obfuscated) id plus a user key.

pub mod error;
pub mod state;

pub use error::{KeeperError, OpFamily};
pub use state::{CapacityStatus, CountResult, Keeper, Restrict, SendOutcome};
