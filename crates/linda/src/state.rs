//! The user-facing channel (§4.3 "Linda"). A Linda routes every operation
//! to its assigned Keeper and carries the two condition variables blocking
//! send/receive wait on.

use crate::error::LindaError;
use bitflags::bitflags;
use lanes_copy::{copy_value, CopyContext};
use lanes_keeper::{CapacityStatus, CountResult, Keeper, Restrict};
use lanes_value::Value;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a blocking call is willing to wait.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    /// Wait indefinitely (subject to cancellation).
    Forever,
    /// Wait at most this long from the call's start.
    After(Duration),
}

impl Deadline {
    fn expiry(self, start: Instant) -> Option<Instant> {
        match self {
            Deadline::Forever => None,
            Deadline::After(d) => Some(start + d),
        }
    }
}

bitflags! {
    /// Which direction(s) a `cancel`/`wake` call addresses (§4.3 "Wake
    /// semantics", §6 "Linda handle operations": `cancel(read|write|both|none)`,
    /// `wake(read|write|both)`). `BOTH` is the union of `READ` and `WRITE`;
    /// `NONE` is the empty set, valid only for `cancel` (clears any
    /// cancellation).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Direction: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
        const BOTH = Self::READ.bits() | Self::WRITE.bits();
        const NONE = 0;
    }
}

fn validate_key(key: &Value) -> Result<(), LindaError> {
    match key {
        Value::Boolean(_) | Value::Integer(_) | Value::Number(_) | Value::Str(_) => Ok(()),
        Value::Light(_) | Value::Deep(_) => Ok(()),
        other => Err(LindaError::InvalidKey {
            type_name: other.type_name(),
        }),
    }
}

/// The user-facing channel. Cheap to clone (`Arc`-backed); every clone
/// addresses the same underlying Keeper-owned state.
pub struct Linda {
    keeper: Arc<Keeper>,
    id: u64,
    name: Arc<str>,
    group: usize,
    wake_gate: Mutex<()>,
    read_happened: Condvar,
    write_happened: Condvar,
    wake_period: Duration,
    read_cancelled: AtomicBool,
    write_cancelled: AtomicBool,
    in_flight: AtomicI64,
}

impl Linda {
    /// Build a new Linda bound to `keeper`, identified by `id` (typically
    /// the address of this Linda's own allocation, per §3 "Linda: Immutable
    /// group id = index into the Universe's Keepers array" plus a distinct
    /// per-Linda identity obfuscated on the Keeper side).
    pub fn new(keeper: Arc<Keeper>, id: u64, name: impl Into<Arc<str>>, group: usize, wake_period: Duration) -> Self {
        Self {
            keeper,
            id,
            name: name.into(),
            group,
            wake_gate: Mutex::new(()),
            read_happened: Condvar::new(),
            write_happened: Condvar::new(),
            wake_period,
            read_cancelled: AtomicBool::new(false),
            write_cancelled: AtomicBool::new(false),
            in_flight: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn group(&self) -> usize {
        self.group
    }

    /// Number of operations currently in flight against this Linda; used
    /// by the owning handle to refuse destruction while non-zero (§4.3
    /// "Invariants").
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Acquire)
    }

    fn is_cancelled(&self, dir: Direction) -> bool {
        (dir.contains(Direction::READ) && self.read_cancelled.load(Ordering::Acquire))
            || (dir.contains(Direction::WRITE) && self.write_cancelled.load(Ordering::Acquire))
    }

    /// Set or clear cancellation on one or both axes. Unlike `wake`, this
    /// sticks: subsequent blocking calls on a cancelled axis return
    /// `Cancelled` immediately until cleared with `Direction::NONE`.
    pub fn cancel(&self, dir: Direction) {
        if dir == Direction::NONE {
            self.read_cancelled.store(false, Ordering::Release);
            self.write_cancelled.store(false, Ordering::Release);
        } else {
            if dir.contains(Direction::READ) {
                self.read_cancelled.store(true, Ordering::Release);
            }
            if dir.contains(Direction::WRITE) {
                self.write_cancelled.store(true, Ordering::Release);
            }
        }
        tracing::debug!(linda = %self.name, ?dir, "linda cancel axis updated");
        let _guard = self.wake_gate.lock();
        self.read_happened.notify_all();
        self.write_happened.notify_all();
    }

    /// Broadcast the chosen condition variable(s) without touching cancel
    /// status (§4.3 "Wake semantics").
    pub fn wake(&self, dir: Direction) {
        let _guard = self.wake_gate.lock();
        if dir.contains(Direction::READ) {
            self.read_happened.notify_all();
        }
        if dir.contains(Direction::WRITE) {
            self.write_happened.notify_all();
        }
    }

    /// Block on `cv` for at most `min(remaining deadline, wake_period)`,
    /// per §5 ("wake-up granularity ≤ min(user timeout, Universe
    /// `wakePeriod`)"). Returns `Ok(())` when the caller should re-check
    /// keeper state, or `Err` once cancelled or past the deadline.
    fn wait_one_tick(&self, cv: &Condvar, dir: Direction, deadline: Option<Instant>) -> Result<(), LindaError> {
        if self.is_cancelled(dir) {
            tracing::debug!(linda = %self.name, ?dir, "blocking call unwound by cancellation");
            return Err(LindaError::Cancelled);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                tracing::trace!(linda = %self.name, ?dir, "blocking call timed out");
                return Err(LindaError::Timeout);
            }
        }
        let tick = match deadline {
            None => self.wake_period,
            Some(deadline) => self.wake_period.min(deadline.saturating_duration_since(Instant::now())),
        };
        let mut guard = self.wake_gate.lock();
        cv.wait_for(&mut guard, tick);
        Ok(())
    }

    /// §4.3 "Blocking algorithm (send)".
    pub fn send(
        &self,
        ctx: &CopyContext<'_>,
        key: Value,
        values: Vec<Value>,
        deadline: Deadline,
    ) -> Result<CapacityStatus, LindaError> {
        validate_key(&key)?;
        if self.is_cancelled(Direction::WRITE) {
            return Err(LindaError::Cancelled);
        }

        let copied_key = copy_value(ctx, &key)?;
        let copied_values = values
            .iter()
            .map(|v| copy_value(ctx, v))
            .collect::<Result<Vec<_>, _>>()?;

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = self.send_loop(&copied_key, copied_values, Instant::now(), deadline);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        result
    }

    fn send_loop(
        &self,
        key: &Value,
        values: Vec<Value>,
        start: Instant,
        deadline: Deadline,
    ) -> Result<CapacityStatus, LindaError> {
        let expiry = deadline.expiry(start);
        loop {
            match self.keeper.send(self.id, key, values.clone())? {
                lanes_keeper::SendOutcome::Sent(status) => {
                    self.wake(Direction::WRITE);
                    return Ok(status);
                }
                lanes_keeper::SendOutcome::WouldBlock => {
                    self.wait_one_tick(&self.read_happened, Direction::WRITE, expiry)?;
                }
            }
        }
    }

    /// §4.3 "Blocking algorithm (receive)". `keys` are scanned in argument
    /// order; the first with data wins.
    pub fn receive(
        &self,
        ctx: &CopyContext<'_>,
        keys: Vec<Value>,
        n: usize,
        deadline: Deadline,
    ) -> Result<(Value, Vec<Value>), LindaError> {
        for key in &keys {
            validate_key(key)?;
        }
        if self.is_cancelled(Direction::READ) {
            return Err(LindaError::Cancelled);
        }

        let copied_keys = keys
            .iter()
            .map(|k| copy_value(ctx, k))
            .collect::<Result<Vec<_>, _>>()?;

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = self.receive_loop(ctx, &copied_keys, n, Instant::now(), deadline);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        result
    }

    fn receive_loop(
        &self,
        ctx: &CopyContext<'_>,
        keys: &[Value],
        n: usize,
        start: Instant,
        deadline: Deadline,
    ) -> Result<(Value, Vec<Value>), LindaError> {
        let expiry = deadline.expiry(start);
        loop {
            if let Some((key, values)) = self.keeper.receive(self.id, keys, n)? {
                let key = copy_value(ctx, &key)?;
                let values = values
                    .iter()
                    .map(|v| copy_value(ctx, v))
                    .collect::<Result<Vec<_>, _>>()?;
                self.wake(Direction::READ);
                return Ok((key, values));
            }
            self.wait_one_tick(&self.write_happened, Direction::READ, expiry)?;
        }
    }

    /// Non-blocking `set(key, v…)`.
    pub fn set(&self, ctx: &CopyContext<'_>, key: Value, values: Vec<Value>) -> Result<(bool, CapacityStatus), LindaError> {
        validate_key(&key)?;
        let key = copy_value(ctx, &key)?;
        let values = values
            .iter()
            .map(|v| copy_value(ctx, v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.keeper.set(self.id, &key, values)?)
    }

    /// Non-blocking `get(key, n?)`.
    pub fn get(&self, ctx: &CopyContext<'_>, key: Value, n: Option<usize>) -> Result<Vec<Value>, LindaError> {
        validate_key(&key)?;
        let key = copy_value(ctx, &key)?;
        let values = self.keeper.get(self.id, &key, n)?;
        Ok(values
            .iter()
            .map(|v| copy_value(ctx, v))
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub fn limit(&self, key: Value, n: Option<i64>) -> Result<(Option<i64>, CapacityStatus), LindaError> {
        validate_key(&key)?;
        Ok(self.keeper.limit(self.id, &key, n)?)
    }

    pub fn restrict(&self, key: Value, mode: Option<Restrict>) -> Result<Restrict, LindaError> {
        validate_key(&key)?;
        Ok(self.keeper.restrict(self.id, &key, mode)?)
    }

    pub fn count(&self, keys: &[Value]) -> CountResult {
        self.keeper.count(self.id, keys)
    }
}

impl Drop for Linda {
    fn drop(&mut self) {
        self.keeper.destruct(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanes_copy::{ClonableRegistry, ConvertFallback, ConvertRegistry, Direction as CopyDirection, MetatableRegistry};
    use lanes_value::LookupDatabase;
    use num_bigint::BigInt;
    use std::thread;

    fn test_ctx<'a>(
        lookup_a: &'a LookupDatabase,
        lookup_b: &'a LookupDatabase,
        metatables: &'a MetatableRegistry,
        clonables: &'a ClonableRegistry,
        convert_registry: &'a ConvertRegistry,
        fallback: &'a ConvertFallback,
        dir: CopyDirection,
    ) -> CopyContext<'a> {
        CopyContext::new(
            dir,
            lookup_a,
            lookup_b,
            None,
            metatables,
            clonables,
            convert_registry,
            fallback,
            1,
            false,
        )
    }

    fn v(i: i64) -> Value {
        Value::Integer(BigInt::from(i))
    }

    #[test]
    fn set_then_get_round_trips() {
        let keeper = Arc::new(Keeper::new());
        let linda = Linda::new(keeper, 1, "l", 0, Duration::from_millis(20));

        let lookup_a = LookupDatabase::new();
        let lookup_b = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::default();

        let ctx = test_ctx(
            &lookup_a,
            &lookup_b,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
            CopyDirection::ToKeeper,
        );
        linda.set(&ctx, Value::Str("k".into()), vec![v(1), v(2)]).unwrap();

        let ctx = test_ctx(
            &lookup_b,
            &lookup_a,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
            CopyDirection::FromKeeper,
        );
        let got = linda.get(&ctx, Value::Str("k".into()), Some(2)).unwrap();
        assert_eq!(got, vec![v(1), v(2)]);
    }

    #[test]
    fn send_blocks_until_capacity_frees_then_succeeds() {
        let keeper = Arc::new(Keeper::new());
        let linda = Arc::new(Linda::new(keeper, 1, "l", 0, Duration::from_millis(10)));
        linda.limit(Value::Str("k".into()), Some(1)).unwrap();

        let lookup_a = LookupDatabase::new();
        let lookup_b = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::default();

        let ctx = test_ctx(
            &lookup_a,
            &lookup_b,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
            CopyDirection::ToKeeper,
        );
        linda.send(&ctx, Value::Str("k".into()), vec![v(1)], Deadline::Forever).unwrap();

        let linda2 = Arc::clone(&linda);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            linda2.receive(
                &CopyContext::new(
                    CopyDirection::FromKeeper,
                    &LookupDatabase::new(),
                    &LookupDatabase::new(),
                    None,
                    &MetatableRegistry::new(),
                    &ClonableRegistry::new(),
                    &ConvertRegistry::new(),
                    &ConvertFallback::default(),
                    1,
                    false,
                ),
                vec![Value::Str("k".into())],
                1,
                Deadline::After(Duration::from_millis(200)),
            )
        });

        let ctx = test_ctx(
            &lookup_a,
            &lookup_b,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
            CopyDirection::ToKeeper,
        );
        let status = linda
            .send(&ctx, Value::Str("k".into()), vec![v(2)], Deadline::After(Duration::from_millis(500)))
            .unwrap();
        assert_eq!(status, CapacityStatus::Exact);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn cancelled_write_axis_fails_fast() {
        let keeper = Arc::new(Keeper::new());
        let linda = Linda::new(keeper, 1, "l", 0, Duration::from_millis(10));
        linda.cancel(Direction::WRITE);

        let lookup_a = LookupDatabase::new();
        let lookup_b = LookupDatabase::new();
        let metatables = MetatableRegistry::new();
        let clonables = ClonableRegistry::new();
        let convert_registry = ConvertRegistry::new();
        let fallback = ConvertFallback::default();
        let ctx = test_ctx(
            &lookup_a,
            &lookup_b,
            &metatables,
            &clonables,
            &convert_registry,
            &fallback,
            CopyDirection::ToKeeper,
        );

        let err = linda
            .send(&ctx, Value::Str("k".into()), vec![v(1)], Deadline::Forever)
            .unwrap_err();
        assert_eq!(err, LindaError::Cancelled);
    }

    #[test]
    fn invalid_key_type_is_rejected() {
        let keeper = Arc::new(Keeper::new());
        let linda = Linda::new(keeper, 1, "l", 0, Duration::from_millis(10));
        let table = lanes_value::Table::new();
        assert!(matches!(
            linda.limit(Value::Table(table), None),
            Err(LindaError::InvalidKey { .. })
        ));
    }
}
