//! The per-state name-lookup database (§3 "Name-lookup database").
//!
//! A two-way mapping between fully-qualified names and values that cannot
//! be copied by reference across a lane boundary (native functions,
//! preloaded library tables, userdata registered by a host module). Each
//! simulated "state" in this port — each `Lane`, each `Keeper` — owns one.

use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A per-state bidirectional map between names and non-copyable values.
#[derive(Default)]
pub struct LookupDatabase {
    by_name: RwLock<HashMap<Arc<str>, Value>>,
    by_identity: RwLock<HashMap<usize, Arc<str>>>,
}

impl LookupDatabase {
    /// A fresh, empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name` in both directions.
    ///
    /// Re-registering a name already in use replaces the previous binding,
    /// mirroring the source's `require`-driven registration, which is
    /// idempotent by name.
    pub fn register(&self, name: impl Into<Arc<str>>, value: Value) {
        let name = name.into();
        if let Some(identity) = value.identity() {
            self.by_identity.write().insert(identity, name.clone());
        }
        if self.by_name.write().insert(name.clone(), value).is_some() {
            tracing::debug!(%name, "name-lookup registration replaced an existing binding");
        }
    }

    /// Resolve a fully-qualified name to its registered value, if any.
    pub fn resolve_by_name(&self, name: &str) -> Option<Value> {
        self.by_name.read().get(name).cloned()
    }

    /// Resolve a value's registered fully-qualified name, if any.
    ///
    /// Used by the inter-copy engine's step 1 (§4.1 "Tables"): "If the
    /// value has a registered fully-qualified name in the source's lookup
    /// database, resolve it in the destination's lookup database."
    pub fn name_of(&self, value: &Value) -> Option<Arc<str>> {
        let identity = value.identity()?;
        self.by_identity.read().get(&identity).cloned()
    }

    /// Number of registered names, for diagnostics and tests.
    pub fn len(&self) -> usize {
        self.by_name.read().len()
    }

    /// Whether the database has no registrations.
    pub fn is_empty(&self) -> bool {
        self.by_name.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Table;

    #[test]
    fn round_trips_name_and_identity() {
        let db = LookupDatabase::new();
        let t = Value::Table(Table::new());
        db.register("io", t.clone());

        assert_eq!(db.resolve_by_name("io"), Some(t.clone()));
        assert_eq!(db.name_of(&t), Some(Arc::from("io")));
    }

    #[test]
    fn unregistered_name_misses() {
        let db = LookupDatabase::new();
        assert_eq!(db.resolve_by_name("io"), None);
    }

    #[test]
    fn unregistered_value_has_no_name() {
        let db = LookupDatabase::new();
        let t = Value::Table(Table::new());
        assert_eq!(db.name_of(&t), None);
    }
}
