//! Lookup sentinels used for the keeper-direction asymmetry (§4.1
//! "Keeper-direction asymmetries"): values that are not copied into a
//! keeper state (because the keeper has no libraries and cannot hold a
//! real function/table by name) are instead rewritten as a sentinel
//! carrying their fully-qualified lookup name, and reverse-resolved on the
//! way back out.

use lanes_value::{Table, UserData, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// Which original value kind a sentinel stands in for, so the reverse copy
/// (out of a keeper) knows what to reconstruct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    /// Stood in for a `Value::Function`.
    Function,
    /// Stood in for a `Value::Table`.
    Table,
    /// Stood in for a `Value::UserData` that used the Clonable strategy.
    UserDataClone,
    /// Stood in for a `Value::UserData` resolved via the Lookup strategy.
    UserDataLookup,
}

impl SentinelKind {
    fn tag(self) -> u8 {
        match self {
            SentinelKind::Function => 0,
            SentinelKind::Table => 1,
            SentinelKind::UserDataClone => 2,
            SentinelKind::UserDataLookup => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SentinelKind::Function),
            1 => Some(SentinelKind::Table),
            2 => Some(SentinelKind::UserDataClone),
            3 => Some(SentinelKind::UserDataLookup),
            _ => None,
        }
    }
}

/// A process-wide marker metatable. Its pointer identity — not its
/// contents — is what makes a `Value::UserData` recognizable as a lookup
/// sentinel rather than a real userdata value.
static SENTINEL_MARKER: Lazy<Arc<Table>> = Lazy::new(Table::new);

/// Build a lookup sentinel for a value registered under `name`.
pub fn make_sentinel(kind: SentinelKind, name: Arc<str>) -> Value {
    Value::UserData(Arc::new(UserData {
        bytes: RwLock::new(vec![kind.tag()]),
        uservalues: RwLock::new(Vec::new()),
        metatable: RwLock::new(Some(SENTINEL_MARKER.clone())),
        registered_name: Some(name),
    }))
}

/// Recognize `value` as a lookup sentinel, returning its kind and name.
pub fn as_sentinel(value: &Value) -> Option<(SentinelKind, Arc<str>)> {
    let Value::UserData(ud) = value else {
        return None;
    };
    let mt = ud.metatable.read();
    let is_marker = mt
        .as_ref()
        .map(|m| Arc::ptr_eq(m, &SENTINEL_MARKER))
        .unwrap_or(false);
    if !is_marker {
        return None;
    }
    drop(mt);
    let tag = *ud.bytes.read().first()?;
    let kind = SentinelKind::from_tag(tag)?;
    let name = ud.registered_name.clone()?;
    Some((kind, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_round_trips() {
        let name: Arc<str> = Arc::from("io.open");
        let sentinel = make_sentinel(SentinelKind::Function, name.clone());
        let (kind, resolved_name) = as_sentinel(&sentinel).expect("should recognize sentinel");
        assert_eq!(kind, SentinelKind::Function);
        assert_eq!(resolved_name, name);
    }

    #[test]
    fn ordinary_userdata_is_not_a_sentinel() {
        let ud = Value::UserData(Arc::new(UserData {
            bytes: RwLock::new(vec![1, 2, 3]),
            uservalues: RwLock::new(Vec::new()),
            metatable: RwLock::new(None),
            registered_name: None,
        }));
        assert!(as_sentinel(&ud).is_none());
    }
}
