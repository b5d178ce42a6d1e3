//! The handle a lane body runs with (§4.4 step 1: "install lane-scoped
//! helpers `cancel_test`, `set_finalizer`, `lane_threadname`").

use crate::cancel::CancelMode;
use crate::error::LaneError;
use crate::finalizer::Finalizer;
use crate::lane::Inner;
use lanes_value::Value;
use std::sync::Arc;

/// The channel a coroutine-mode body waits on between yields.
/// `to_body` delivers the arguments of the next `resume`. The reverse
/// direction (the values passed to `yield_values`, and the lane's final
/// result) travels through `Inner::results` plus the status condvar
/// instead of a second channel — `resume` and `join` both wait on the
/// same condvar for the lane to reach `Suspended` or a terminal status,
/// exactly as they would for a plain (non-coroutine) lane. A second
/// rendezvous channel paired with this one would deadlock: each side's
/// send would block on a receive that is sequenced after the other
/// side's own blocking send.
pub(crate) struct CoroutineChannels {
    pub(crate) to_body: crossbeam::channel::Receiver<Vec<Value>>,
}

/// Passed to the lane body closure. Exposes exactly the lane-scoped
/// helpers the original installs as globals in the new state.
pub struct LaneContext {
    pub(crate) inner: Arc<Inner>,
}

impl LaneContext {
    /// `cancel_test()`: is a cancellation pending, and how hard.
    pub fn cancel_test(&self) -> Option<CancelMode> {
        self.inner.cancel_request.mode()
    }

    /// `set_finalizer(f)`: register a finalizer, run LIFO after the body
    /// returns or errors.
    pub fn set_finalizer(&self, finalizer: Finalizer) {
        self.inner.finalizers.push(finalizer);
    }

    /// `lane_threadname()`: this lane's debug name.
    pub fn thread_name(&self) -> Arc<str> {
        self.inner.name.lock().clone()
    }

    /// Register the callback a hard cancel should invoke to force-wake
    /// whatever blocking call this lane's body is currently parked in
    /// (typically a Linda wait, §5 "Suspension points"). A body should set
    /// this immediately before a blocking call and clear it (`None`)
    /// immediately after, mirroring [`crate::Lane::set_canceller`].
    pub fn set_canceller(&self, canceller: Option<Arc<dyn Fn() + Send + Sync>>) {
        self.inner.set_canceller(canceller);
    }

    /// Coroutine-mode only: suspend, handing `values` to the joiner's
    /// `resume` call (or its first `join`), and block until the next
    /// `resume` delivers new arguments. Errors if called on a normal-mode
    /// lane.
    pub fn yield_values(&self, values: Vec<Value>) -> Result<Vec<Value>, LaneError> {
        let channels = self
            .inner
            .coroutine
            .as_ref()
            .ok_or_else(|| LaneError::body("yield called on a non-coroutine lane"))?;

        self.inner.store_yield(values);
        self.inner.transition_to(crate::status::LaneStatus::Suspended);
        let resumed = channels
            .to_body
            .recv()
            .map_err(|_| LaneError::body("resume side of the coroutine channel was dropped"))?;
        self.inner.transition_to(crate::status::LaneStatus::Running);
        Ok(resumed)
    }
}
