//! The process-wide singleton (§3 "Universe"): configuration, the
//! keepers array, the lane tracker, the self-destruct chain, and shutdown
//! sequencing.

pub mod config;
pub mod error;
mod universe;

pub use config::{AllocatorMode, InternalAllocator, OnStateCreate, Settings};
pub use error::UniverseError;
pub use universe::Universe;
