//! The state threaded through one top-level copy call (§4.1 "Copy cache":
//! "a single destination-side table allocated for the duration of one
//! top-level copy call").

use crate::clonable::ClonableRegistry;
use crate::convert::{ConvertFallback, ConvertRegistry};
use crate::metatable::MetatableRegistry;
use lanes_value::{LookupDatabase, Value};
use std::cell::RefCell;
use std::collections::HashMap;

/// Which kind of boundary a copy operation is crossing.
///
/// Keeper-bound and keeper-sourced copies apply the lookup-sentinel
/// rewriting described in §4.1 ("Keeper-direction asymmetries"); ordinary
/// lane-to-lane copies do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// An ordinary copy between two lane (or lane and driver) states.
    LaneToLane,
    /// A copy into a keeper state (e.g. `linda:send`).
    ToKeeper,
    /// A copy out of a keeper state (e.g. `linda:receive`).
    FromKeeper,
}

/// Everything one `copy_value` call tree needs: the cycle/identity cache,
/// the two states' lookup databases, and the Universe-scoped registries
/// for metatable interning, clonable hooks and convert-fallback hooks.
pub struct CopyContext<'a> {
    /// Which boundary is being crossed.
    pub direction: Direction,
    /// The source state's name-lookup database.
    pub source_lookup: &'a LookupDatabase,
    /// The destination state's name-lookup database.
    pub dest_lookup: &'a LookupDatabase,
    /// The destination's global-environment table, if this copy should
    /// rebind global-upvalue slots to it (§4.1 "Functions").
    pub dest_global_env: Option<Value>,
    /// Universe-scoped metatable interning cache.
    pub metatables: &'a MetatableRegistry,
    /// Universe-scoped `__lanesclone` hooks.
    pub clonables: &'a ClonableRegistry,
    /// Universe-scoped `__lanesconvert` hooks.
    pub convert_registry: &'a ConvertRegistry,
    /// The Universe's default convert-fallback policy.
    pub convert_fallback: &'a ConvertFallback,
    /// Anti-loop cap on repeated conversion attempts.
    pub convert_max_attempts: u32,
    /// Whether to build full path strings into transfer-error diagnostics.
    pub verbose_errors: bool,
    cache: RefCell<HashMap<usize, Value>>,
}

impl<'a> CopyContext<'a> {
    /// Build a fresh context for one top-level copy call.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: Direction,
        source_lookup: &'a LookupDatabase,
        dest_lookup: &'a LookupDatabase,
        dest_global_env: Option<Value>,
        metatables: &'a MetatableRegistry,
        clonables: &'a ClonableRegistry,
        convert_registry: &'a ConvertRegistry,
        convert_fallback: &'a ConvertFallback,
        convert_max_attempts: u32,
        verbose_errors: bool,
    ) -> Self {
        Self {
            direction,
            source_lookup,
            dest_lookup,
            dest_global_env,
            metatables,
            clonables,
            convert_registry,
            convert_fallback,
            convert_max_attempts,
            verbose_errors,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Look up `identity` in the copy cache.
    pub(crate) fn cache_get(&self, identity: usize) -> Option<Value> {
        self.cache.borrow().get(&identity).cloned()
    }

    /// Record `value` under `identity` in the copy cache, before recursing
    /// into its contents, so cyclic structures terminate.
    pub(crate) fn cache_insert(&self, identity: usize, value: Value) {
        self.cache.borrow_mut().insert(identity, value);
    }
}
