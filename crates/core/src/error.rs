//! Error types shared across the lanes runtime.
//!
//! Each crate in the workspace owns an error enum scoped to its own
//! concerns; this module holds the ones that cross crate boundaries or
//! are part of the public surface (configuration and transfer errors),
//! plus the cancellation sentinel.

use thiserror::Error;

/// Raised synchronously while building a `Universe` from a `Settings` value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An option name that is not recognized.
    #[error("unknown configuration key: {key}")]
    UnknownKey {
        /// The offending key.
        key: String,
    },

    /// A value with the wrong shape for its key.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// A numeric option outside its documented range.
    #[error("{key} out of range: {value} (expected {expected})")]
    OutOfRange {
        /// The offending key.
        key: String,
        /// The value that was supplied.
        value: i64,
        /// The valid range, as free text (e.g. "0..=100").
        expected: String,
    },

    /// An `on_state_create` hook that captures state is not permitted.
    #[error("on_state_create must not capture any upvalues")]
    HookHasUpvalues,
}

impl ConfigError {
    /// Build an [`ConfigError::UnknownKey`].
    pub fn unknown_key<S: Into<String>>(key: S) -> Self {
        let key = key.into();
        tracing::warn!(key = %key, "rejected unknown configuration key");
        Self::UnknownKey { key }
    }

    /// Build an [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(key: S, message: S) -> Self {
        let key = key.into();
        let message = message.into();
        tracing::warn!(key = %key, %message, "rejected invalid configuration value");
        Self::InvalidValue { key, message }
    }

    /// Build an [`ConfigError::OutOfRange`].
    pub fn out_of_range<S: Into<String>>(key: S, value: i64, expected: S) -> Self {
        let key = key.into();
        let expected = expected.into();
        tracing::warn!(key = %key, value, expected = %expected, "rejected out-of-range configuration value");
        Self::OutOfRange { key, value, expected }
    }
}

/// Raised when a value cannot cross a state boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The value's type has no copy strategy at all (e.g. a raw thread handle).
    #[error("value of type {type_name} is not transferable")]
    NotTransferable {
        /// The Rust type name of the offending value, for diagnostics.
        type_name: String,
    },

    /// A lookup-by-name resolution failed on the destination side.
    #[error("lookup failed for '{name}': not registered in destination state")]
    LookupFailed {
        /// The fully-qualified name that could not be resolved.
        name: String,
    },

    /// A `__lanesconvert`-equivalent conversion exceeded `convert_max_attempts`.
    #[error("conversion did not converge after {attempts} attempt(s)")]
    ConversionLoop {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// A deep-object factory could not be resolved across the boundary.
    #[error("deep object factory '{factory}' not registered in destination state")]
    UnknownDeepFactory {
        /// The factory's declared module name.
        factory: String,
    },

    /// A key could not be copied into a key-position (tables reject it silently
    /// per the inter-copy contract; this variant is for non-key contexts).
    #[error("unsupported key type: {type_name}")]
    UnsupportedKey {
        /// The Rust type name of the offending key.
        type_name: String,
    },
}

impl TransferError {
    /// Build a [`TransferError::NotTransferable`].
    pub fn not_transferable<S: Into<String>>(type_name: S) -> Self {
        let type_name = type_name.into();
        tracing::debug!(%type_name, "value has no copy strategy");
        Self::NotTransferable { type_name }
    }

    /// Build a [`TransferError::LookupFailed`].
    pub fn lookup_failed<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        tracing::debug!(%name, "lookup-by-name failed on the destination state");
        Self::LookupFailed { name }
    }
}

/// The cancel-error sentinel (see `lanes_core::ids::CANCEL_ERROR`).
///
/// Identity, not message, is its whole contract: a lane body or a blocking
/// Linda call that observes a hard cancel request propagates this value
/// rather than a descriptive error, exactly as the scripting-level
/// `lanes.cancel_error` sentinel is compared by identity rather than by
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancelError;

impl std::fmt::Display for CancelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lane cancelled")
    }
}

impl std::error::Error for CancelError {}
