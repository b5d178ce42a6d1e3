//! Reserved registry keys.
//!
//! The original embedding stores these as light-userdata values inside the
//! host interpreter's registry, masked to 47 significant bits so they can
//! never collide with a real pointer on a LuaJIT-flavoured 64-bit host. This
//! port has no such host and no real light-userdata concept, but the
//! masking convention is preserved anyway: every [`UniqueKey`] is still a
//! fixed, documented, non-colliding 64-bit token, which is the property
//! that matters if this crate is ever embedded behind a real foreign-value
//! boundary.

/// A statically-assigned, non-colliding 64-bit token.
///
/// Two `UniqueKey`s are equal iff their `storage` fields are equal; the
/// debug name is documentation only and is never used in comparisons.
#[derive(Debug, Clone, Copy)]
pub struct UniqueKey {
    storage: u64,
    debug_name: &'static str,
}

impl UniqueKey {
    /// Build a new reserved key, masking to the 47 bits a LuaJIT-flavoured
    /// light-userdata value would have available.
    pub const fn new(val: u64, debug_name: &'static str) -> Self {
        Self {
            storage: val & 0x7FFF_FFFF_FFFF,
            debug_name,
        }
    }

    /// The raw 64-bit token, already masked.
    pub const fn token(&self) -> u64 {
        self.storage
    }

    /// The human-readable name this key was declared with.
    pub const fn debug_name(&self) -> &'static str {
        self.debug_name
    }
}

impl PartialEq for UniqueKey {
    fn eq(&self, other: &Self) -> bool {
        self.storage == other.storage
    }
}
impl Eq for UniqueKey {}

impl PartialOrd for UniqueKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for UniqueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.storage.cmp(&other.storage)
    }
}

impl std::hash::Hash for UniqueKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.storage.hash(state);
    }
}

/// The process-wide Universe handle, installed in every lane/keeper state.
pub const UNIVERSE: UniqueKey = UniqueKey::new(0x48BB_E9CE_AB0B_A04F, "lanes.universe");

/// Per-state bidirectional name/object lookup table.
pub const LOOKUP_DB: UniqueKey = UniqueKey::new(0x1F2E_3D4C_5B6A_7988, "lanes.lookup_db");

/// Per-lane finalizer chain (LIFO list of registered callbacks).
pub const FINALIZER_LIST: UniqueKey = UniqueKey::new(0x7A6B_5C4D_3E2F_1001, "lanes.finalizers");

/// Flag toggling the Extended error-trace-level stack-frame record shape.
pub const EXTENDED_STACK_TRACE: UniqueKey =
    UniqueKey::new(0x0912_3456_789A_BCDE, "lanes.extended_trace");

/// Slot holding the lane's debug name, interned so it outlives the lane state.
pub const LANE_NAME: UniqueKey = UniqueKey::new(0x55AA_33CC_11EE_7788, "lanes.lane_name");

/// Slot holding the back-pointer to the owning `Lane`, for O(1) `cancel_test`.
pub const LANE_PTR: UniqueKey = UniqueKey::new(0x9E8D_7C6B_5A49_3827, "lanes.lane_ptr");

/// Scratch slot used while assembling a stack trace.
pub const STACK_TRACE_TMP: UniqueKey = UniqueKey::new(0x3344_5566_7788_99AA, "lanes.trace_tmp");

/// Monotonic metatable-id interning table, scoped to one Universe.
pub const METATABLE_ID_TABLE: UniqueKey =
    UniqueKey::new(0x6655_4433_2211_00FF, "lanes.metatable_ids");

/// The cancel-error sentinel, compared by identity.
pub const CANCEL_ERROR: UniqueKey = UniqueKey::new(0x0630_345F_EF91_2746, "lanes.cancel_error");

/// The nil-sentinel, distinguishing "absent" from "a copied nil" inside a keeper.
pub const NIL_SENTINEL: UniqueKey = UniqueKey::new(0xC457_D4ED_DB05_B5E4, "lanes.null");

/// XOR mask applied to a Linda's identity before it is used as a keeper-side
/// table key, so that keeper-state tokens can never be mistaken for a real
/// pointer handed in from outside.
pub const LINDA_OBFUSCATOR: u64 = 0x7B8A_A1F9_9A3B_D782;

/// Obfuscate a raw Linda identity for use as a keeper-internal key.
pub const fn obfuscate_linda_id(raw_id: u64) -> u64 {
    raw_id ^ LINDA_OBFUSCATOR
}
