//! The finalizer chain (§4.4 "Finalizers").

use crate::error::LaneError;
use crate::trace::ErrorTrace;
use parking_lot::Mutex;

/// A registered finalizer: receives `Some((error, trace))` on the error
/// path, `None` on the success path. Returning `Err` replaces the lane's
/// outcome and stops the remaining chain.
pub type Finalizer = Box<dyn FnOnce(Option<(&LaneError, &ErrorTrace)>) -> Result<(), LaneError> + Send>;

/// A LIFO list of finalizers pushed by `set_finalizer` during the body's
/// run, invoked once after the body returns or errors.
#[derive(Default)]
pub struct FinalizerChain {
    chain: Mutex<Vec<Finalizer>>,
}

impl FinalizerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, finalizer: Finalizer) {
        self.chain.lock().push(finalizer);
    }

    pub fn len(&self) -> usize {
        self.chain.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered finalizer in reverse registration order. On
    /// the success path `outcome` is `None`; on the error path it carries
    /// the body's failure. The first finalizer to error replaces the
    /// return value and the rest are skipped, per §4.4.
    pub fn run(&self, outcome: Option<&(LaneError, ErrorTrace)>) -> Option<LaneError> {
        let finalizers: Vec<Finalizer> = std::mem::take(&mut *self.chain.lock()).into_iter().rev().collect();
        for finalizer in finalizers {
            let arg = outcome.map(|(err, trace)| (err, trace));
            if let Err(replacement) = finalizer(arg) {
                tracing::warn!(error = %replacement, "finalizer replaced lane outcome");
                return Some(replacement);
            }
        }
        None
    }
}
