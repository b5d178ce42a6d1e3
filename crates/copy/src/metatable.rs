//! Metatable interning (§4.1: "Metatable identity across copy operations
//! within one Universe: a metatable copied once is interned by a monotonic
//! 64-bit id so that subsequent copies reuse it").
//!
//! Scoped to one Universe and shared by every copy operation that Universe
//! performs. The first time a given source metatable is seen, it is copied
//! and the result cached under a freshly assigned id; every later copy
//! involving the same source metatable reuses the cached destination
//! object instead of producing a fresh one.

use lanes_value::Table;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A Universe-scoped cache mapping a source metatable's identity to its
/// interned destination-side counterpart.
#[derive(Default)]
pub struct MetatableRegistry {
    next_id: AtomicU64,
    by_source: Mutex<HashMap<usize, (u64, Arc<Table>)>>,
}

impl MetatableRegistry {
    /// A fresh, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the interned destination-side metatable for `source`, if
    /// one has already been produced, without copying anything.
    pub fn lookup(&self, source: &Arc<Table>) -> Option<Arc<Table>> {
        self.by_source
            .lock()
            .get(&source.identity())
            .map(|(_, dest)| dest.clone())
    }

    /// Record that `source` now interns to `dest`, assigning it the next
    /// monotonic id. Returns the id assigned.
    ///
    /// Callers must have already checked [`lookup`](Self::lookup) returns
    /// `None` for `source`; calling this twice for the same source
    /// re-assigns a new id and loses the old mapping, which would break
    /// the identity guarantee, so the copy engine always checks first.
    pub fn intern(&self, source: &Arc<Table>, dest: Arc<Table>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.by_source.lock().insert(source.identity(), (id, dest));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_lookup_misses_then_intern_is_reused() {
        let registry = MetatableRegistry::new();
        let source = Table::new();
        assert!(registry.lookup(&source).is_none());

        let dest = Table::new();
        let id1 = registry.intern(&source, dest.clone());
        let cached = registry.lookup(&source).unwrap();
        assert!(Arc::ptr_eq(&cached, &dest));

        // a second distinct source gets its own id
        let other_source = Table::new();
        let id2 = registry.intern(&other_source, Table::new());
        assert_ne!(id1, id2);
    }
}
