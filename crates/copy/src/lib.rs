//! The recursive inter-state value copier (§4.1): cycle-safe, preserves
//! reference identity and metatable identity within one top-level copy,
//! and implements the full userdata strategy chain (clonable, deep,
//! convert-fallback, lookup).

pub mod clonable;
pub mod context;
pub mod convert;
pub mod engine;
pub mod metatable;
pub mod sentinel;

pub use clonable::{ClonableRegistry, CloneHook};
pub use context::{CopyContext, Direction};
pub use convert::{apply_convert, has_converter, ConvertFallback, ConvertFn, ConvertHint, ConvertRegistry};
pub use engine::copy_value;
pub use metatable::MetatableRegistry;
pub use sentinel::{as_sentinel, make_sentinel, SentinelKind};
