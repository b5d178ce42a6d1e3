//! The process-wide singleton (§3 "Universe").

use crate::config::Settings;
use crate::error::UniverseError;
use lanes_copy::{ClonableRegistry, ConvertRegistry, MetatableRegistry};
use lanes_core::shutdown::{ShutdownError, ShutdownStage, SHUTDOWN_POLL_INTERVAL};
use lanes_keeper::Keeper;
use lanes_lane::{CancelOp, Lane};
use lanes_linda::Linda;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The process-wide Universe singleton. Owns the keepers array, the
/// Universe-scoped copy-engine registries, the lane tracker, and the
/// self-destruct chain.
pub struct Universe {
    settings: Settings,
    keepers: Vec<Arc<Keeper>>,
    timer_linda: Option<Arc<Linda>>,
    metatables: MetatableRegistry,
    clonables: ClonableRegistry,
    convert_registry: ConvertRegistry,
    /// Recursive, per §5: "wraps `require` calls in lanes to prevent
    /// concurrent module loading in shared global state." This port has
    /// no `require`; kept for a host built on top of it to serialize its
    /// own module-loading equivalent.
    require_mutex: ReentrantMutex<()>,
    tracker: Mutex<Vec<Lane>>,
    self_destruct: Mutex<Vec<Lane>>,
    self_destruct_in_progress: AtomicUsize,
    next_linda_id: AtomicUsize,
    shutting_down: AtomicBool,
}

impl Universe {
    /// `configure()`: validate `settings` and build a fresh Universe.
    pub fn configure(settings: Settings) -> Result<Arc<Self>, UniverseError> {
        settings.validate()?;

        let keepers: Vec<Arc<Keeper>> = (0..settings.total_keepers()).map(|_| Arc::new(Keeper::new())).collect();
        let next_linda_id = AtomicUsize::new(1);

        let timer_linda = if settings.with_timers {
            let id = next_linda_id.fetch_add(1, Ordering::Relaxed) as u64;
            Some(Arc::new(Linda::new(
                Arc::clone(&keepers[0]),
                id,
                "lanes.timer",
                0,
                Duration::from_millis(100),
            )))
        } else {
            None
        };

        Ok(Arc::new(Self {
            keepers,
            timer_linda,
            metatables: MetatableRegistry::new(),
            clonables: ClonableRegistry::new(),
            convert_registry: ConvertRegistry::new(),
            require_mutex: ReentrantMutex::new(()),
            tracker: Mutex::new(Vec::new()),
            self_destruct: Mutex::new(Vec::new()),
            self_destruct_in_progress: AtomicUsize::new(0),
            next_linda_id,
            shutting_down: AtomicBool::new(false),
            settings,
        }))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metatables(&self) -> &MetatableRegistry {
        &self.metatables
    }

    pub fn clonables(&self) -> &ClonableRegistry {
        &self.clonables
    }

    pub fn convert_registry(&self) -> &ConvertRegistry {
        &self.convert_registry
    }

    pub fn require_mutex(&self) -> &ReentrantMutex<()> {
        &self.require_mutex
    }

    pub fn timer_linda(&self) -> Option<&Arc<Linda>> {
        self.timer_linda.as_ref()
    }

    /// The Keeper owning group `index`.
    pub fn keeper(&self, index: usize) -> Result<Arc<Keeper>, UniverseError> {
        self.keepers.get(index).cloned().ok_or(UniverseError::KeeperOutOfRange {
            index,
            total: self.keepers.len(),
        })
    }

    /// Build a new user Linda bound to keeper group `group`.
    pub fn new_linda(&self, name: impl Into<Arc<str>>, group: usize) -> Result<Arc<Linda>, UniverseError> {
        let keeper = self.keeper(group)?;
        let id = self.next_linda_id.fetch_add(1, Ordering::Relaxed) as u64;
        Ok(Arc::new(Linda::new(keeper, id, name, group, Duration::from_millis(100))))
    }

    /// Register a lane in the tracker, if `track_lanes` is enabled (§3
    /// "Lane tracker: intrusive singly-linked list under a mutex;
    /// activation flag").
    pub fn track(&self, lane: Lane) {
        if self.settings.track_lanes {
            self.tracker.lock().push(lane);
        }
    }

    pub fn tracked_lanes(&self) -> Vec<Lane> {
        self.tracker.lock().clone()
    }

    /// Move an abandoned-but-still-running lane onto the self-destruct
    /// list (§4.4 "Self-destruct").
    pub fn self_destruct(&self, lane: Lane) {
        lane.mark_self_destructed();
        self.self_destruct_in_progress.fetch_add(1, Ordering::AcqRel);
        self.self_destruct.lock().push(lane);
    }

    /// Count of self-destructed lanes not yet known to have terminated.
    pub fn self_destruct_in_progress(&self) -> usize {
        self.self_destruct_in_progress.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// §3 "Universe lifetime" teardown sequence, staged per
    /// [`ShutdownStage`]. Hard-cancels every still-running self-destructed
    /// lane and waits up to `shutdown_timeout`; lanes still alive past
    /// that point are left running (documented as the user's fault, per
    /// §4.4).
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return Err(ShutdownError::AlreadyInProgress);
        }
        tracing::debug!(stage = %ShutdownStage::Begin, "universe shutdown starting");

        tracing::debug!(stage = %ShutdownStage::CancelDanglingLanes, "hard-cancelling dangling lanes");
        let dangling: Vec<Lane> = self.self_destruct.lock().clone();
        for lane in &dangling {
            lane.cancel(CancelOp {
                mode: lanes_lane::CancelMode::Hard,
                hook: lanes_lane::DebugHook::None,
                hook_count: 0,
                deadline: Some(Duration::ZERO),
                wake_lane: true,
            });
        }

        tracing::debug!(stage = %ShutdownStage::AwaitTermination, "awaiting dangling lane termination");
        let deadline = Instant::now() + self.settings.shutdown_timeout;
        let mut still_running = dangling.len();
        while Instant::now() < deadline {
            still_running = dangling.iter().filter(|l| !l.status().is_terminal()).count();
            if still_running == 0 {
                break;
            }
            std::thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }

        tracing::debug!(stage = %ShutdownStage::DestroyKeepers, "tombstoning keepers");
        for keeper in &self.keepers {
            keeper.tombstone();
        }

        tracing::debug!(stage = %ShutdownStage::Release, "releasing universe resources");
        let terminated = dangling.len().saturating_sub(still_running);
        self.self_destruct_in_progress.fetch_sub(terminated, Ordering::AcqRel);
        self.self_destruct.lock().clear();

        if still_running > 0 {
            tracing::warn!(count = still_running, "lanes still running after shutdown timeout");
            tracing::debug!(stage = %ShutdownStage::Complete, "shutdown complete (with dangling lanes)");
            return Err(ShutdownError::Timeout {
                count: still_running,
                timeout_ms: self.settings.shutdown_timeout.as_millis() as u64,
            });
        }

        tracing::debug!(stage = %ShutdownStage::Complete, "shutdown complete");
        Ok(())
    }
}
