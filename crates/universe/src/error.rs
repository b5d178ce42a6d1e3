//! Errors surfaced by the Universe itself.

use lanes_core::{ConfigError, ShutdownError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UniverseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// A keeper group index outside `0..total_keepers()`.
    #[error("keeper group {index} out of range (0..{total})")]
    KeeperOutOfRange { index: usize, total: usize },
}
