//! Errors raised by Linda operations.

use lanes_core::TransferError;
use lanes_keeper::KeeperError;
use thiserror::Error;

/// Errors a Linda operation can raise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LindaError {
    /// The blocking operation exceeded its deadline.
    #[error("linda operation timed out")]
    Timeout,

    /// The Linda (in the relevant direction) is cancelled.
    #[error("linda is cancelled")]
    Cancelled,

    /// A key of an unsupported type was used (only boolean, number, string,
    /// light-userdata and deep-userdata keys are valid, §4.3 step 1).
    #[error("unsupported key type: {type_name}")]
    InvalidKey {
        /// The `Value::type_name()` of the offending key.
        type_name: &'static str,
    },

    /// The keeper rejected the operation (e.g. a `restrict` violation).
    #[error(transparent)]
    Keeper(#[from] KeeperError),

    /// Copying a value through the inter-copy engine failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}
