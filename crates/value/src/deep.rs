//! Deep userdata: reference-counted objects shared across lane boundaries
//! without being copied (§3 "Deep object", §4.5 "Deep factory").
//!
//! The original tracks refcount with a manual atomic counter bumped on
//! proxy creation and inter-copy, decremented on proxy `__gc`, with the
//! factory's `deleteDeepObjectInternal` invoked by whichever decrement
//! reaches zero. This port collapses that bookkeeping onto `Arc`'s own
//! strong count: a [`DeepHandle`] clone *is* a new proxy, dropping a clone
//! *is* running `__gc` on one, and `Drop for DeepInner` *is*
//! `deleteDeepObjectInternal`, guaranteed to run exactly once because Rust
//! already guarantees that for the last `Arc` owner. Compare with
//! `lanes_core`'s grounding note in DESIGN.md for why the manual
//! HashMap-based counter the teacher uses elsewhere was not reproduced
//! here.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Per-module hooks for a shared, reference-counted deep object type.
///
/// Mirrors the four-hook factory contract: `createMetatable`,
/// `newDeepObjectInternal`, `deleteDeepObjectInternal`, and a stable
/// `moduleName` used to re-register the type's lookup entry in every
/// state it travels through.
pub trait DeepFactory: Send + Sync + fmt::Debug {
    /// Stable name used to re-resolve this factory after a value has
    /// travelled through a keeper state.
    fn module_name(&self) -> &'static str;

    /// Allocate a new object body.
    fn new_deep_object(&self) -> Box<dyn Any + Send + Sync>;

    /// Run when the last proxy referencing an object of this factory's
    /// type is dropped.
    fn delete_deep_object(&self, body: Box<dyn Any + Send + Sync>);
}

struct DeepInner {
    factory: Arc<dyn DeepFactory>,
    body: parking_lot::Mutex<Option<Box<dyn Any + Send + Sync>>>,
}

impl Drop for DeepInner {
    fn drop(&mut self) {
        if let Some(body) = self.body.lock().take() {
            tracing::debug!(module = self.factory.module_name(), "last proxy dropped, deleting deep object");
            self.factory.delete_deep_object(body);
        }
    }
}

/// A proxy handle to a shared deep object.
///
/// Cloning a `DeepHandle` is the Rust analogue of creating a new proxy
/// userdata bound to the same underlying object and bumping its refcount;
/// dropping one is the analogue of that proxy's `__gc` firing.
#[derive(Clone)]
pub struct DeepHandle(Arc<DeepInner>);

impl fmt::Debug for DeepHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepHandle")
            .field("module", &self.0.factory.module_name())
            .field("refcount", &self.refcount())
            .finish()
    }
}

impl DeepHandle {
    /// Create a brand-new deep object from a factory.
    pub fn new(factory: Arc<dyn DeepFactory>) -> Self {
        let body = factory.new_deep_object();
        Self(Arc::new(DeepInner {
            factory,
            body: parking_lot::Mutex::new(Some(body)),
        }))
    }

    /// The factory's module name, used to re-resolve this object's type
    /// across a keeper boundary.
    pub fn module_name(&self) -> &'static str {
        self.0.factory.module_name()
    }

    /// Run `f` against the object's body, if it has not already been
    /// deleted (it always has a body while any handle is alive).
    pub fn with_body<R>(&self, f: impl FnOnce(&(dyn Any + Send + Sync)) -> R) -> R {
        let guard = self.0.body.lock();
        f(guard.as_ref().expect("deep object body present while any handle is alive").as_ref())
    }

    /// Number of live proxies referencing this object, equivalent to the
    /// original's atomic refcount (invariant 3, §8): `count of live
    /// proxies equals d.refcount at any quiescent point`.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Stable identity, used by [`Value::identity`](crate::Value::identity)
    /// and as a copy-cache/lookup key.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CounterFactory {
        deletions: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl DeepFactory for CounterFactory {
        fn module_name(&self) -> &'static str {
            "test.counter"
        }
        fn new_deep_object(&self) -> Box<dyn Any + Send + Sync> {
            Box::new(0i64)
        }
        fn delete_deep_object(&self, _body: Box<dyn Any + Send + Sync>) {
            self.deletions
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn refcount_tracks_live_proxies() {
        let deletions = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let factory = Arc::new(CounterFactory {
            deletions: deletions.clone(),
        });
        let handle = DeepHandle::new(factory);
        assert_eq!(handle.refcount(), 1);

        let second = handle.clone();
        assert_eq!(handle.refcount(), 2);
        assert_eq!(second.refcount(), 2);

        drop(second);
        assert_eq!(handle.refcount(), 1);
        assert_eq!(deletions.load(std::sync::atomic::Ordering::SeqCst), 0);

        drop(handle);
        assert_eq!(deletions.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_runs_exactly_once() {
        let deletions = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let factory = Arc::new(CounterFactory {
            deletions: deletions.clone(),
        });
        let handle = DeepHandle::new(factory);
        let clones: Vec<_> = (0..5).map(|_| handle.clone()).collect();
        drop(handle);
        drop(clones);
        assert_eq!(deletions.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
