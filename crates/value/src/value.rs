//! The value representation carried across a lane boundary.
//!
//! This plays the role the original's Lua stack values play: it is the one
//! type the inter-copy engine (`lanes_copy`), the Keeper, and Linda
//! operations are all generic over. There is no interpreter behind it —
//! lane bodies are Rust closures — so "function" values exist only to
//! satisfy the transfer contract (§4.1) for hosts that choose to carry
//! opaque callable payloads across lanes.

use crate::deep::DeepHandle;
use crate::error::ValueError;
use num_bigint::BigInt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A light userdata value: an opaque 64-bit token with no owned payload.
///
/// Used for the two reserved sentinels (§6) and for "decayed" values
/// produced by the convert-fallback (§4.1, `__lanesconvert` → `"decay"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LightUserdata(pub u64);

/// A table: an ordered map plus an optional metatable.
///
/// Ordering is insertion order for iteration determinism in tests; lookups
/// go through a `BTreeMap` keyed by value rather than a hash map so `Value`
/// does not need `Hash` for floats.
#[derive(Debug, Default)]
pub struct Table {
    entries: RwLock<BTreeMap<Value, Value>>,
    metatable: RwLock<Option<Arc<Table>>>,
}

impl Table {
    /// An empty table with no metatable.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a key/value pair, returning the previous value if any.
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        self.entries.write().insert(key, value)
    }

    /// Look up a value by key.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Snapshot of all key/value pairs, in key order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The table's metatable, if any.
    pub fn metatable(&self) -> Option<Arc<Table>> {
        self.metatable.read().clone()
    }

    /// Set the table's metatable.
    pub fn set_metatable(&self, mt: Option<Arc<Table>>) {
        *self.metatable.write() = mt;
    }

    /// Stable pointer identity, used as the copy-cache key (§4.1).
    pub fn identity(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }
}

/// A transferable function value (§4.1 "Functions").
///
/// `Native` and `Fast` functions (in the original's terms) are never
/// serialized; they cross a boundary only by lookup-name, matching "Native
/// and Fast are transferred by lookup-name only". `Bytecode` functions
/// carry an opaque payload plus a recursively-copyable upvalue list,
/// standing in for "dumped to a byte string, loaded in the destination ...
/// upvalues are walked and copied recursively".
#[derive(Debug)]
pub enum Function {
    /// A function resolvable only by its fully-qualified name in both
    /// states' lookup databases.
    Native {
        /// The name this function is registered under.
        name: Arc<str>,
    },
    /// An opaque payload with a recursively-copied upvalue list.
    Bytecode {
        /// Opaque function payload (what the original dumps via `string.dump`).
        code: Arc<[u8]>,
        /// Captured values, copied recursively on transfer.
        upvalues: RwLock<Vec<Value>>,
        /// Marks the slot (if any) that should rebind to the destination's
        /// global environment rather than being copied, per §4.1's
        /// "global-environment upvalue is rebound ... rather than copied".
        global_env_upvalue: Option<usize>,
    },
}

impl Function {
    /// Stable pointer identity for a `Bytecode` function (used by the copy
    /// cache); `Native` functions have no useful pointer identity since they
    /// are never cached — they resolve by name on every copy.
    pub fn identity(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    /// Build a `Bytecode` function, validating that `global_env_upvalue` (if
    /// set) actually addresses one of `upvalues`' slots.
    pub fn bytecode(code: Arc<[u8]>, upvalues: Vec<Value>, global_env_upvalue: Option<usize>) -> Result<Self, ValueError> {
        if let Some(index) = global_env_upvalue {
            if index >= upvalues.len() {
                return Err(ValueError::GlobalEnvUpvalueOutOfRange { index, len: upvalues.len() });
            }
        }
        Ok(Self::Bytecode {
            code,
            upvalues: RwLock::new(upvalues),
            global_env_upvalue,
        })
    }
}

/// A full userdata value: an opaque byte payload plus uservalue slots and
/// an optional metatable, used by the Clonable strategy (§4.1 step 1).
#[derive(Debug)]
pub struct UserData {
    /// Opaque bytes, copied verbatim by the `__lanesclone` equivalent.
    pub bytes: RwLock<Vec<u8>>,
    /// Additional uservalue slots transferred alongside the raw bytes.
    pub uservalues: RwLock<Vec<Value>>,
    /// Optional metatable; its presence of a clone hook is what selects
    /// the Clonable transfer strategy.
    pub metatable: RwLock<Option<Arc<Table>>>,
    /// Fully-qualified name, if this userdata is also registered in a
    /// lookup database (selects the Lookup fallback, §4.1 step 4).
    pub registered_name: Option<Arc<str>>,
}

impl UserData {
    /// Stable pointer identity, used as the copy-cache key.
    pub fn identity(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }
}

/// The value type carried across a lane boundary.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absence of a value. Distinguished inside a keeper from "no entry
    /// at all" by the nil-sentinel light userdata (§4.1, "Keeper-direction
    /// asymmetries").
    Nil,
    /// A boolean.
    Boolean(bool),
    /// An arbitrary-precision integer, preserving the "integer subtype"
    /// the original keeps distinct from floating numbers.
    Integer(BigInt),
    /// A floating-point number.
    Number(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// An opaque 64-bit token (sentinels, decayed handles).
    Light(LightUserdata),
    /// A table, shared by reference within one copy operation.
    Table(Arc<Table>),
    /// A function, shared by reference within one copy operation.
    Function(Arc<Function>),
    /// A full userdata value.
    UserData(Arc<UserData>),
    /// A reference-counted shared object that bypasses value copying
    /// entirely (§4.5).
    Deep(DeepHandle),
}

impl Value {
    /// True for [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// A human-readable type name, used in diagnostics and transfer errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Light(_) => "light-userdata",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::UserData(_) => "userdata",
            Value::Deep(_) => "deep-userdata",
        }
    }

    /// Whether this value is one that the inter-copy engine treats as
    /// reference-identity-bearing and therefore cache-able (tables,
    /// functions, userdata). Primitives are copied by value and never
    /// consulted against the copy cache.
    pub fn has_reference_identity(&self) -> bool {
        matches!(
            self,
            Value::Table(_) | Value::Function(_) | Value::UserData(_)
        )
    }

    /// Pointer identity for cache-able values; `None` for primitives and
    /// for `Deep` (which is keyed by its own handle, not a copy-cache entry).
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Table(t) => Some(t.identity()),
            Value::Function(f) => Some(f.identity()),
            Value::UserData(u) => Some(u.identity()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Light(a), Value::Light(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::UserData(a), Value::UserData(b)) => Arc::ptr_eq(a, b),
            (Value::Deep(a), Value::Deep(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}
impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    /// Total order used only so `Value` can key a `BTreeMap` inside
    /// [`Table`]; the ranking across variants is arbitrary but stable.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Nil => 0,
                Value::Boolean(_) => 1,
                Value::Integer(_) => 2,
                Value::Number(_) => 3,
                Value::Str(_) => 4,
                Value::Light(_) => 5,
                Value::Table(_) => 6,
                Value::Function(_) => 7,
                Value::UserData(_) => 8,
                Value::Deep(_) => 9,
            }
        }
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Light(a), Value::Light(b)) => a.cmp(b),
            (Value::Table(a), Value::Table(b)) => a.identity().cmp(&b.identity()),
            (Value::Function(a), Value::Function(b)) => a.identity().cmp(&b.identity()),
            (Value::UserData(a), Value::UserData(b)) => a.identity().cmp(&b.identity()),
            (Value::Deep(a), Value::Deep(b)) => a.identity().cmp(&b.identity()),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_nil() {
        assert!(Value::Nil.is_nil());
        assert!(!Value::Boolean(false).is_nil());
    }

    #[test]
    fn table_identity_is_stable_across_clones() {
        let t = Table::new();
        let v1 = Value::Table(t.clone());
        let v2 = Value::Table(t.clone());
        assert_eq!(v1, v2);
    }

    #[test]
    fn distinct_tables_are_not_equal() {
        let v1 = Value::Table(Table::new());
        let v2 = Value::Table(Table::new());
        assert_ne!(v1, v2);
    }

    #[test]
    fn table_roundtrips_entries() {
        let t = Table::new();
        t.insert(Value::Str("k".into()), Value::Integer(BigInt::from(1)));
        assert_eq!(
            t.get(&Value::Str("k".into())),
            Some(Value::Integer(BigInt::from(1)))
        );
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn bytecode_validates_global_env_upvalue_index() {
        let code: Arc<[u8]> = Arc::from(&[0u8][..]);
        assert!(Function::bytecode(code.clone(), vec![Value::Nil, Value::Nil], Some(1)).is_ok());
        assert_eq!(
            Function::bytecode(code, vec![Value::Nil], Some(1)).unwrap_err(),
            crate::error::ValueError::GlobalEnvUpvalueOutOfRange { index: 1, len: 1 }
        );
    }
}
