//! The Clonable userdata strategy (§4.1 step 1: "if the source's metatable
//! has a `__lanesclone` field ... invoke `__lanesclone(dest_ptr, src_ptr,
//! size)` ... to perform the memory-level copy").
//!
//! There is no foreign memory boundary in this port, so the hook operates
//! directly on a [`UserData`]'s bytes and uservalue slots rather than on
//! raw pointers, but it keeps the same purpose: let the author of a
//! non-trivially-copyable userdata type supply its own byte-level copy
//! logic instead of relying on the generic structural copier.

use lanes_value::{Table, UserData};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A `__lanesclone`-equivalent hook: given the source userdata, produce the
/// raw bytes and uservalue slots for its destination-side copy (uservalues
/// are still copied recursively by the engine afterwards).
pub type CloneHook = Arc<dyn Fn(&UserData) -> (Vec<u8>, Vec<lanes_value::Value>) + Send + Sync>;

/// Per-metatable clone hooks, scoped to one Universe.
#[derive(Default)]
pub struct ClonableRegistry {
    by_metatable: Mutex<HashMap<usize, CloneHook>>,
}

impl ClonableRegistry {
    /// A fresh, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clone hook for every userdata carrying this metatable.
    pub fn register(&self, metatable: &Arc<Table>, hook: CloneHook) {
        self.by_metatable.lock().insert(metatable.identity(), hook);
    }

    /// The clone hook registered for `metatable`, if any.
    pub fn hook_for(&self, metatable: &Arc<Table>) -> Option<CloneHook> {
        self.by_metatable.lock().get(&metatable.identity()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanes_value::Value;
    use parking_lot::RwLock;

    #[test]
    fn registered_hook_is_found_by_metatable_identity() {
        let registry = ClonableRegistry::new();
        let mt = Table::new();
        registry.register(
            &mt,
            Arc::new(|ud: &UserData| (ud.bytes.read().clone(), Vec::new())),
        );
        assert!(registry.hook_for(&mt).is_some());

        let other_mt = Table::new();
        assert!(registry.hook_for(&other_mt).is_none());
    }

    #[test]
    fn hook_copies_bytes() {
        let registry = ClonableRegistry::new();
        let mt = Table::new();
        registry.register(
            &mt,
            Arc::new(|ud: &UserData| (ud.bytes.read().clone(), ud.uservalues.read().clone())),
        );
        let ud = UserData {
            bytes: RwLock::new(vec![1, 2, 3]),
            uservalues: RwLock::new(vec![Value::Boolean(true)]),
            metatable: RwLock::new(Some(mt.clone())),
            registered_name: None,
        };
        let hook = registry.hook_for(&mt).unwrap();
        let (bytes, uvs) = hook(&ud);
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(uvs, vec![Value::Boolean(true)]);
    }
}
