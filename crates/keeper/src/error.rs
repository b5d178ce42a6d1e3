//! Errors raised by keeper operations.

use thiserror::Error;

/// The access-restriction family an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFamily {
    /// `set` / `get`.
    SetGet,
    /// `send` / `receive`.
    SendReceive,
}

impl std::fmt::Display for OpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetGet => write!(f, "set/get"),
            Self::SendReceive => write!(f, "send/receive"),
        }
    }
}

/// Errors raised by a keeper operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    /// The operation's family conflicts with the key's `restrict` mode.
    #[error("operation family {attempted} is restricted on this key")]
    Restricted {
        /// The family the caller attempted to use.
        attempted: OpFamily,
    },

    /// The keeper has been destructed and can no longer be used.
    #[error("keeper is tombstoned")]
    Tombstoned,
}
