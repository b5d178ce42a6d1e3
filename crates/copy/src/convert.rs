//! The `__lanesconvert` fallback (§4.1 "`__lanesconvert` values", §4.1 step
//! 3 of the userdata chain, "Convert fallback").
//!
//! A value with no other transfer strategy can still cross if either its
//! own metatable declares a converter, or the Universe has a non-default
//! `convert_fallback` policy. The conversion is retried (capped by
//! `convert_max_attempts`) until it produces a non-userdata value, which is
//! then re-submitted to the ordinary copy engine.

use lanes_core::error::TransferError;
use lanes_value::{LightUserdata, Table, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Which side of a transfer is invoking the converter, mirroring the
/// original's `"keeper"` / `"regular"` hint string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertHint {
    /// The conversion runs while copying into or out of a keeper state.
    Keeper,
    /// The conversion runs on an ordinary lane-to-lane transfer.
    Regular,
}

/// A `__lanesconvert`-equivalent hook: takes the value being converted and
/// the invocation hint, returns its replacement.
pub type ConvertFn = Arc<dyn Fn(&Value, ConvertHint) -> Result<Value, TransferError> + Send + Sync>;

/// The Universe-wide default behaviour applied when a value has no
/// per-metatable converter of its own.
#[derive(Clone)]
pub enum ConvertFallback {
    /// Leave the value alone; the transfer fails if nothing else can copy it.
    DoNothing,
    /// Replace the value with nil.
    Nil,
    /// Replace the value with a light-userdata carrying its original identity.
    Decay,
    /// Call a user-supplied conversion function.
    Custom(ConvertFn),
}

impl std::fmt::Debug for ConvertFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DoNothing => write!(f, "DoNothing"),
            Self::Nil => write!(f, "Nil"),
            Self::Decay => write!(f, "Decay"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Default for ConvertFallback {
    fn default() -> Self {
        Self::DoNothing
    }
}

/// Per-metatable `__lanesconvert` hooks, scoped to one Universe.
#[derive(Default)]
pub struct ConvertRegistry {
    by_metatable: Mutex<HashMap<usize, ConvertFn>>,
}

impl ConvertRegistry {
    /// A fresh, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for every userdata carrying this metatable.
    pub fn register(&self, metatable: &Arc<Table>, hook: ConvertFn) {
        self.by_metatable.lock().insert(metatable.identity(), hook);
    }

    /// The converter registered for `metatable`, if any.
    pub fn hook_for(&self, metatable: &Arc<Table>) -> Option<ConvertFn> {
        self.by_metatable.lock().get(&metatable.identity()).cloned()
    }
}

/// Apply one conversion attempt to `value`, preferring a per-metatable hook
/// over the Universe-wide fallback.
pub fn apply_convert(
    value: &Value,
    hint: ConvertHint,
    registry: &ConvertRegistry,
    fallback: &ConvertFallback,
) -> Result<Value, TransferError> {
    if let Value::UserData(ud) = value {
        if let Some(mt) = ud.metatable.read().clone() {
            if let Some(hook) = registry.hook_for(&mt) {
                return hook(value, hint);
            }
        }
    }
    match fallback {
        ConvertFallback::DoNothing => Err(TransferError::not_transferable(value.type_name())),
        ConvertFallback::Nil => Ok(Value::Nil),
        ConvertFallback::Decay => {
            let token = value.identity().unwrap_or(0) as u64;
            Ok(Value::Light(LightUserdata(token)))
        }
        ConvertFallback::Custom(f) => f(value, hint),
    }
}

/// Whether any conversion strategy (per-metatable or Universe-wide) applies
/// to `value` at all.
pub fn has_converter(value: &Value, registry: &ConvertRegistry, fallback: &ConvertFallback) -> bool {
    if let Value::UserData(ud) = value {
        if let Some(mt) = ud.metatable.read().clone() {
            if registry.hook_for(&mt).is_some() {
                return true;
            }
        }
    }
    !matches!(fallback, ConvertFallback::DoNothing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_fallback_replaces_with_nil() {
        let registry = ConvertRegistry::new();
        let value = Value::Boolean(true);
        let result = apply_convert(&value, ConvertHint::Regular, &registry, &ConvertFallback::Nil).unwrap();
        assert_eq!(result, Value::Nil);
    }

    #[test]
    fn do_nothing_fails_without_a_hook() {
        let registry = ConvertRegistry::new();
        let value = Value::Boolean(true);
        let err = apply_convert(&value, ConvertHint::Regular, &registry, &ConvertFallback::DoNothing)
            .unwrap_err();
        assert!(matches!(err, TransferError::NotTransferable { .. }));
    }
}
