//! `lanes`: an in-process multi-worker execution substrate. Spawn
//! isolated lanes (OS-thread-backed workers) and exchange values between
//! them through lindas (multi-key mailbox channels), with every value
//! crossing a lane boundary deep-copied by the inter-copy engine — except
//! explicitly shared "deep" objects, which cross by reference.
//!
//! This crate is the facade over the workspace's component crates; see
//! each for the detailed contract:
//! - [`lanes_core`] — shared errors, reserved registry keys, shutdown staging.
//! - [`lanes_value`] — the `Value` representation, deep objects, the lookup database.
//! - [`lanes_copy`] — the recursive inter-state value copier.
//! - [`lanes_keeper`] — the mutex-guarded per-key FIFO store behind every linda group.
//! - [`lanes_linda`] — the user-facing channel.
//! - [`lanes_lane`] — the lane runtime: thread, status FSM, cancellation, finalizers.
//! - [`lanes_universe`] — the process-wide singleton and configuration.

pub use lanes_copy::{ClonableRegistry, ConvertFallback, ConvertRegistry, CopyContext, Direction as CopyDirection, MetatableRegistry};
pub use lanes_core::{CancelError, ConfigError, TransferError, UniqueKey};
pub use lanes_keeper::{CapacityStatus, CountResult, Keeper, KeeperError, Restrict};
pub use lanes_lane::{
    CancelMode, CancelOp, CancelOutcome, ErrorTrace, ErrorTraceLevel, Lane, LaneBody, LaneConfig, LaneContext,
    LaneError, LaneStatus,
};
pub use lanes_linda::{Deadline, Direction as LindaDirection, Linda, LindaError};
pub use lanes_universe::{Settings, Universe, UniverseError};
pub use lanes_value::{DeepFactory, DeepHandle, Function, LightUserdata, LookupDatabase, Table, UserData, Value};

use std::sync::Arc;

/// Run a blocking Linda operation (`send`/`receive`) from inside a lane
/// body, wiring hard cancellation through to it. Registers `linda`'s
/// cancel (§4.3 "Wake semantics", both axes) as this lane's canceller
/// before calling `op`, clears it once `op` returns, and converts an
/// interrupted [`LindaError::Cancelled`] into [`LaneError::Cancelled`] so
/// it propagates as the lane's outcome exactly as a hard cancel of any
/// other blocking call would (spec.md:227: "hard cancel causes one
/// pending Linda call to throw the cancel-error at its next wake-up").
/// Other `LindaError`s pass through as a plain [`LaneError::BodyError`].
pub fn linda_call<T>(
    ctx: &LaneContext,
    linda: &Arc<Linda>,
    op: impl FnOnce() -> Result<T, LindaError>,
) -> Result<T, LaneError> {
    let wake = Arc::clone(linda);
    ctx.set_canceller(Some(Arc::new(move || wake.cancel(LindaDirection::BOTH))));
    let result = op();
    ctx.set_canceller(None);
    result.map_err(|err| match err {
        LindaError::Cancelled => LaneError::Cancelled(CancelError),
        other => LaneError::body(other.to_string()),
    })
}

/// `lanes.null`: the nil-sentinel light userdata (§6 "Sentinels as part
/// of the public surface"). Compared by identity: two calls return
/// values that compare equal to each other and to nothing else.
pub fn null() -> Value {
    Value::Light(LightUserdata(lanes_core::ids::NIL_SENTINEL.token()))
}

/// `lanes.cancel_error`: the cancel-error light userdata, raised when a
/// hard-cancelled lane unwinds a blocking linda call.
pub fn cancel_error_sentinel() -> Value {
    Value::Light(LightUserdata(lanes_core::ids::CANCEL_ERROR.token()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinel_is_stable_and_distinct() {
        assert_eq!(null(), null());
        assert_ne!(null(), cancel_error_sentinel());
    }

    #[test]
    fn universe_configures_with_defaults() {
        let universe = Universe::configure(Settings::default()).unwrap();
        assert!(universe.keeper(0).is_ok());
    }

    fn receive_ctx<'a>(lookup: &'a LookupDatabase, metatables: &'a MetatableRegistry, clonables: &'a ClonableRegistry, convert_registry: &'a ConvertRegistry, fallback: &'a ConvertFallback) -> CopyContext<'a> {
        CopyContext::new(
            CopyDirection::FromKeeper,
            lookup,
            lookup,
            None,
            metatables,
            clonables,
            convert_registry,
            fallback,
            1,
            false,
        )
    }

    /// spec.md:227/S5: a hard cancel unwinds a lane blocked in a Linda
    /// `receive`, and the blocked call raises the cancel-error sentinel,
    /// which the body propagates as the lane's outcome.
    #[test]
    fn hard_cancel_unwinds_a_lane_blocked_in_linda_receive() {
        let universe = Universe::configure(Settings::default()).unwrap();
        let linda = universe.new_linda("test", 0).unwrap();
        let linda_for_body = Arc::clone(&linda);

        let lane = Lane::spawn(
            LaneConfig::default(),
            Box::new(move |ctx, _args| {
                let lookup = LookupDatabase::new();
                let metatables = MetatableRegistry::new();
                let clonables = ClonableRegistry::new();
                let convert_registry = ConvertRegistry::new();
                let fallback = ConvertFallback::default();
                let copy_ctx = receive_ctx(&lookup, &metatables, &clonables, &convert_registry, &fallback);

                linda_call(ctx, &linda_for_body, || {
                    linda_for_body.receive(&copy_ctx, vec![Value::Str("k".into())], 1, Deadline::Forever)
                })?;
                Ok(vec![])
            }),
            vec![],
        );

        // Give the body a moment to enter the blocking receive and
        // register its canceller before we hard-cancel it.
        std::thread::sleep(std::time::Duration::from_millis(50));
        let outcome = lane.cancel(CancelOp::hard());
        assert_eq!(outcome, CancelOutcome::Cancelled);

        let err = lane.join(Some(std::time::Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, LaneError::Cancelled(_)));
        assert_eq!(lane.status(), LaneStatus::Cancelled);
    }
}
