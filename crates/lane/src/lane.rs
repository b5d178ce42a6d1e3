//! The lane handle: OS thread + status FSM + cancellation + coroutine
//! mode + finalizer chain + result storage (§4.4).

use crate::body::LaneBody;
use crate::cancel::{CancelMode, CancelOp, CancelOutcome, CancelRequest};
use crate::context::{CoroutineChannels, LaneContext};
use crate::error::{Failure, LaneError};
use crate::finalizer::FinalizerChain;
use crate::status::LaneStatus;
use crate::trace::{ErrorTrace, ErrorTraceLevel};
use lanes_value::Value;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Creation-time configuration (§4.4 "Creation": "a config subset").
#[derive(Debug, Clone, Default)]
pub struct LaneConfig {
    pub name: Option<String>,
    pub error_trace_level: ErrorTraceLevel,
    pub coroutine_mode: bool,
}

pub(crate) struct Inner {
    pub(crate) name: Mutex<Arc<str>>,
    status: Mutex<LaneStatus>,
    done_cv: Condvar,
    pub(crate) cancel_request: Arc<CancelRequest>,
    error_trace_level: ErrorTraceLevel,
    pub(crate) finalizers: Arc<FinalizerChain>,
    /// The lane's last recorded outcome: either the most recent yield (for
    /// a coroutine-mode lane currently `Suspended`) or the final result
    /// once terminal. `join` and `resume` both read this after waiting on
    /// `done_cv` for the status to reach `Suspended` or a terminal state.
    results: Mutex<Option<Result<Vec<Value>, Failure>>>,
    self_destructed: AtomicBool,
    pub(crate) coroutine: Option<CoroutineChannels>,
    resume_tx: Mutex<Option<crossbeam::channel::Sender<Vec<Value>>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
    /// Forces the lane to notice a hard cancel while blocked in something
    /// external to this crate (typically a Linda wait). Analogous to the
    /// original's `waiting_on` pointer, generalized to an arbitrary wake
    /// callback rather than a specific condition-variable pointer.
    canceller: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl Inner {
    pub(crate) fn transition_to(&self, next: LaneStatus) {
        let mut status = self.status.lock();
        if !status.can_transition_to(next) {
            tracing::error!(from = ?*status, to = ?next, "illegal lane status transition");
            debug_assert!(false, "illegal lane status transition {:?} -> {:?}", *status, next);
        }
        *status = next;
        self.done_cv.notify_all();
    }

    /// Record a coroutine yield (or the final outcome) so a concurrent
    /// `join`/`resume` can read it as soon as it observes the matching
    /// status transition.
    pub(crate) fn store_yield(&self, values: Vec<Value>) {
        *self.results.lock() = Some(Ok(values));
    }

    pub(crate) fn set_canceller(&self, canceller: Option<Arc<dyn Fn() + Send + Sync>>) {
        *self.canceller.lock() = canceller;
    }

    /// Block until this lane is `Suspended` or has reached a terminal
    /// status, or until `deadline` elapses. Returns `false` on timeout.
    fn wait_for_yield_or_terminal(&self, deadline: Option<Duration>) -> bool {
        let start = Instant::now();
        let mut status = self.status.lock();
        loop {
            if status.is_terminal() || *status == LaneStatus::Suspended {
                return true;
            }
            match deadline {
                None => self.done_cv.wait(&mut status),
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return false;
                    }
                    self.done_cv.wait_for(&mut status, remaining);
                }
            }
        }
    }

    fn stored_result(&self) -> Result<Vec<Value>, LaneError> {
        match self.results.lock().clone() {
            Some(Ok(values)) => Ok(values),
            Some(Err(failure)) => Err(failure.error),
            None => Err(LaneError::body("lane finished with no recorded outcome")),
        }
    }
}

/// The lane handle. Cheap to clone; every clone addresses the same
/// underlying thread and status.
#[derive(Clone)]
pub struct Lane {
    inner: Arc<Inner>,
}

impl Lane {
    /// Build and start a new lane (§4.4 "Creation" + "Thread body").
    pub fn spawn(config: LaneConfig, body: LaneBody, args: Vec<Value>) -> Self {
        let name: Arc<str> = config.name.clone().unwrap_or_else(|| "lane".to_string()).into();

        let (coroutine_for_body, resume_tx) = if config.coroutine_mode {
            let (resume_tx, resume_rx) = crossbeam::channel::bounded::<Vec<Value>>(0);
            (Some(CoroutineChannels { to_body: resume_rx }), Some(resume_tx))
        } else {
            (None, None)
        };

        let inner = Arc::new(Inner {
            name: Mutex::new(name),
            status: Mutex::new(LaneStatus::Pending),
            done_cv: Condvar::new(),
            cancel_request: Arc::new(CancelRequest::new()),
            error_trace_level: config.error_trace_level,
            finalizers: Arc::new(FinalizerChain::new()),
            results: Mutex::new(None),
            self_destructed: AtomicBool::new(false),
            coroutine: coroutine_for_body,
            resume_tx: Mutex::new(resume_tx),
            join_handle: Mutex::new(None),
            canceller: Mutex::new(None),
        });

        let thread_inner = Arc::clone(&inner);
        let thread_name = thread_inner.name.lock().to_string();
        let builder = std::thread::Builder::new().name(thread_name);
        let handle = builder
            .spawn(move || run_body(thread_inner, body, args))
            .expect("failed to spawn OS thread for lane");

        *inner.join_handle.lock() = Some(handle);
        Self { inner }
    }

    pub fn status(&self) -> LaneStatus {
        *self.inner.status.lock()
    }

    pub fn name(&self) -> Arc<str> {
        self.inner.name.lock().clone()
    }

    /// Register the callback a hard cancel should invoke to force-wake
    /// whatever this lane is currently blocked in (typically a Linda).
    /// Cleared automatically once the blocking call returns.
    pub fn set_canceller(&self, canceller: Option<Arc<dyn Fn() + Send + Sync>>) {
        self.inner.set_canceller(canceller);
    }

    /// §4.4 "Cancellation".
    pub fn cancel(&self, op: CancelOp) -> CancelOutcome {
        self.inner.cancel_request.set(op.mode);
        if op.mode == CancelMode::Hard || op.wake_lane {
            if let Some(canceller) = self.inner.canceller.lock().clone() {
                canceller();
            }
        }

        let start = Instant::now();
        let mut status = self.inner.status.lock();
        loop {
            if status.is_terminal() {
                return CancelOutcome::Cancelled;
            }
            match op.deadline {
                None => self.inner.done_cv.wait(&mut status),
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return CancelOutcome::Timeout;
                    }
                    self.inner.done_cv.wait_for(&mut status, remaining);
                }
            }
        }
    }

    /// Coroutine-mode `resume(...)`: hand new arguments to a suspended
    /// body and wait for its next yield or terminal outcome. If the body
    /// has already finished (e.g. the first yield was already consumed by
    /// `join`, and a later `resume` follows the lane to completion with no
    /// further yield), returns the stored terminal result without sending
    /// anything.
    pub fn resume(&self, args: Vec<Value>) -> Result<Vec<Value>, LaneError> {
        let resume_tx = self
            .inner
            .resume_tx
            .lock()
            .clone()
            .ok_or_else(|| LaneError::body("resume called on a non-coroutine lane"))?;

        self.inner.wait_for_yield_or_terminal(None);
        if self.status().is_terminal() {
            return self.inner.stored_result();
        }

        self.inner.transition_to(LaneStatus::Resuming);
        resume_tx
            .send(args)
            .map_err(|_| LaneError::body("lane thread is gone"))?;

        self.inner.wait_for_yield_or_terminal(None);
        self.inner.stored_result()
    }

    /// §4.4 "Join". Returns on `Done`/`Suspended` with the stored results
    /// (the most recent yield, if the lane is mid-coroutine), on
    /// `Error`/`Cancelled` with the stored failure, per spec.md:201.
    pub fn join(&self, deadline: Option<Duration>) -> Result<Vec<Value>, LaneError> {
        if !self.inner.wait_for_yield_or_terminal(deadline) {
            return Err(LaneError::body("timeout"));
        }
        self.inner.stored_result()
    }

    /// Fetch the Nth (1-based) result without blocking, assuming the lane
    /// has already reached a terminal state.
    pub fn result_at(&self, index: usize) -> Option<Value> {
        match &*self.inner.results.lock() {
            Some(Ok(values)) => values.get(index.checked_sub(1)?).cloned(),
            _ => None,
        }
    }

    pub fn error_trace(&self) -> Option<ErrorTrace> {
        match &*self.inner.results.lock() {
            Some(Err(failure)) => Some(failure.trace.clone()),
            _ => None,
        }
    }

    /// §4.4 "Self-destruct": mark this lane as abandoned so its thread
    /// closes its own state on completion instead of waiting for a join.
    pub fn mark_self_destructed(&self) {
        self.inner.self_destructed.store(true, Ordering::Release);
    }

    pub fn is_self_destructed(&self) -> bool {
        self.inner.self_destructed.load(Ordering::Acquire)
    }
}

fn run_body(inner: Arc<Inner>, body: LaneBody, args: Vec<Value>) {
    inner.transition_to(LaneStatus::Running);

    let ctx = LaneContext { inner: Arc::clone(&inner) };
    let outcome = catch_unwind(AssertUnwindSafe(|| body(&ctx, args)));

    let (results, failure) = match outcome {
        Ok(Ok(values)) => (Some(Ok(values)), None),
        Ok(Err(error)) => {
            let mut trace = ErrorTrace::for_level(inner.error_trace_level);
            if !matches!(trace, ErrorTrace::None) {
                trace.push_frame(ctx.thread_name().as_ref(), 0);
            }
            let failure = Failure { error, trace };
            (None, Some(failure))
        }
        Err(panic) => {
            let message = panic_message(panic);
            let failure = Failure {
                error: LaneError::panicked(message),
                trace: ErrorTrace::for_level(inner.error_trace_level),
            };
            (None, Some(failure))
        }
    };

    let finalizer_arg = failure.as_ref().map(|f| (f.error.clone(), f.trace.clone()));
    let replacement = inner.finalizers.run(finalizer_arg.as_ref().map(|(e, t)| (e, t)));

    let (final_results, final_failure, terminal) = match replacement {
        Some(replacement_error) => (
            None,
            Some(Failure {
                error: replacement_error,
                trace: ErrorTrace::for_level(inner.error_trace_level),
            }),
            LaneStatus::Error,
        ),
        None => match (results, failure) {
            (Some(values), None) => (Some(values), None, LaneStatus::Done),
            (None, Some(f)) => {
                let status = if matches!(f.error, LaneError::Cancelled(_)) {
                    LaneStatus::Cancelled
                } else {
                    LaneStatus::Error
                };
                (None, Some(f), status)
            }
            _ => unreachable!("body outcome is exactly one of Ok/Err"),
        },
    };

    *inner.results.lock() = Some(match (final_results, final_failure) {
        (Some(values), None) => Ok(values),
        (None, Some(failure)) => Err(failure),
        _ => unreachable!(),
    });

    inner.transition_to(terminal);

    if inner.self_destructed.load(Ordering::Acquire) {
        tracing::debug!(lane = %inner.name.lock(), "self-destructed lane closing its own state");
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "lane body panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_lane_runs_to_done_and_returns_results() {
        let lane = Lane::spawn(
            LaneConfig::default(),
            Box::new(|_ctx, args| Ok(args)),
            vec![Value::Boolean(true)],
        );
        let results = lane.join(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(results, vec![Value::Boolean(true)]);
        assert_eq!(lane.status(), LaneStatus::Done);
    }

    #[test]
    fn body_error_yields_error_status() {
        let lane = Lane::spawn(
            LaneConfig::default(),
            Box::new(|_ctx, _args| Err(LaneError::body("boom"))),
            vec![],
        );
        let err = lane.join(Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, LaneError::BodyError { .. }));
        assert_eq!(lane.status(), LaneStatus::Error);
    }

    #[test]
    fn panicking_body_is_caught_as_an_error() {
        let lane = Lane::spawn(
            LaneConfig::default(),
            Box::new(|_ctx, _args| panic!("kaboom")),
            vec![],
        );
        let err = lane.join(Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, LaneError::Panicked { .. }));
    }

    #[test]
    fn finalizer_runs_after_success() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = Arc::clone(&ran);
        let lane = Lane::spawn(
            LaneConfig::default(),
            Box::new(move |ctx, _args| {
                ctx.set_finalizer(Box::new(move |outcome| {
                    assert!(outcome.is_none());
                    ran2.store(true, Ordering::SeqCst);
                    Ok(())
                }));
                Ok(vec![])
            }),
            vec![],
        );
        lane.join(Some(Duration::from_secs(5))).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn coroutine_lane_yields_and_resumes() {
        use num_bigint::BigInt;

        // spec.md S6: a coroutine-mode lane that yields 1, then yields 2,
        // then returns 3. The parent's first `join` returns 1; `resume()`
        // yields 2; a final `resume()` returns 3 with status Done.
        let lane = Lane::spawn(
            LaneConfig {
                coroutine_mode: true,
                ..Default::default()
            },
            Box::new(|ctx, _args| {
                ctx.yield_values(vec![Value::Integer(BigInt::from(1))])?;
                ctx.yield_values(vec![Value::Integer(BigInt::from(2))])?;
                Ok(vec![Value::Integer(BigInt::from(3))])
            }),
            vec![],
        );

        let first = lane.join(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(first, vec![Value::Integer(BigInt::from(1))]);
        assert_eq!(lane.status(), LaneStatus::Suspended);

        let second = lane.resume(vec![]).unwrap();
        assert_eq!(second, vec![Value::Integer(BigInt::from(2))]);

        let third = lane.resume(vec![]).unwrap();
        assert_eq!(third, vec![Value::Integer(BigInt::from(3))]);
        assert_eq!(lane.status(), LaneStatus::Done);
    }

    #[test]
    fn hard_cancel_invokes_registered_canceller() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let invoked = Arc::new(AtomicBool::new(false));
        let invoked2 = Arc::clone(&invoked);

        let lane = Lane::spawn(
            LaneConfig::default(),
            Box::new(|_ctx, _args| Ok(vec![])),
            vec![],
        );
        lane.set_canceller(Some(Arc::new(move || {
            invoked2.store(true, Ordering::SeqCst);
        })));
        lane.join(Some(Duration::from_secs(5))).unwrap();
        lane.cancel(CancelOp::hard());
        assert!(invoked.load(Ordering::SeqCst));
    }
}
