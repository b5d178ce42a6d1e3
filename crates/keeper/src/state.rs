//! Per-key FIFO state and the keeper mutex (§4.2 "Keeper").

use crate::error::{KeeperError, OpFamily};
use lanes_core::ids::obfuscate_linda_id;
use lanes_value::Value;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fill level after an operation, relative to the key's capacity limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityStatus {
    /// Strictly below the limit (or unlimited).
    Under,
    /// Exactly at the limit.
    Exact,
    /// Above the limit (only reachable via `set` or a lowered `limit`).
    Over,
}

/// Access restriction applied to one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Restrict {
    /// No restriction; any operation family is allowed.
    #[default]
    None,
    /// Only `set`/`get` are allowed.
    SetGet,
    /// Only `send`/`receive` are allowed.
    SendReceive,
}

/// Outcome of a `send` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The values were appended.
    Sent(CapacityStatus),
    /// The key is at or over capacity; the caller must wait on `readHappened`.
    WouldBlock,
}

/// Every key's table state, whether or not it currently holds values
/// (capacity limits are sticky, per §4.2: "Capacity is sticky: exists
/// independently of whether any value is stored").
#[derive(Debug, Default)]
struct KeyState {
    queue: VecDeque<Value>,
    limit: Option<i64>,
    restrict: Restrict,
}

impl KeyState {
    fn capacity_status(&self) -> CapacityStatus {
        match self.limit {
            None => CapacityStatus::Under,
            Some(limit) => {
                let len = self.queue.len() as i64;
                if len < limit {
                    CapacityStatus::Under
                } else if len == limit {
                    CapacityStatus::Exact
                } else {
                    CapacityStatus::Over
                }
            }
        }
    }

    fn is_dormant(&self) -> bool {
        self.queue.is_empty() && self.limit.is_none() && self.restrict == Restrict::None
    }

    fn check(&self, attempted: OpFamily) -> Result<(), KeeperError> {
        match (self.restrict, attempted) {
            (Restrict::SetGet, OpFamily::SendReceive) => {
                Err(KeeperError::Restricted { attempted })
            }
            (Restrict::SendReceive, OpFamily::SetGet) => {
                Err(KeeperError::Restricted { attempted })
            }
            _ => Ok(()),
        }
    }
}

type KeyId = (u64, Value);

#[derive(Default)]
struct KeeperInner {
    tables: BTreeMap<KeyId, KeyState>,
}

impl KeeperInner {
    fn entry(&mut self, linda_id: u64, key: &Value) -> &mut KeyState {
        self.tables
            .entry((linda_id, key.clone()))
            .or_insert_with(KeyState::default)
    }

    fn prune_if_dormant(&mut self, linda_id: u64, key: &Value) {
        let id = (linda_id, key.clone());
        if self.tables.get(&id).map(|s| s.is_dormant()).unwrap_or(false) {
            self.tables.remove(&id);
        }
    }
}

/// The result of a `count` query with zero, one, or several keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountResult {
    /// No key supplied: total number of keys with any state.
    Total(usize),
    /// One key supplied: its queue length.
    PerKey(usize),
    /// Several keys supplied: each key's queue length.
    Table(BTreeMap<Value, usize>),
}

/// A minimal interpreter state plus the mutex guarding it (§4.2).
///
/// All per-key FIFO state for every Linda in this keeper's group lives
/// here, keyed by the Linda's obfuscated identity plus the user key, and
/// every access is serialized under `state`.
pub struct Keeper {
    state: Mutex<KeeperInner>,
    tombstoned: AtomicBool,
}

impl Default for Keeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Keeper {
    /// A fresh, empty keeper.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KeeperInner::default()),
            tombstoned: AtomicBool::new(false),
        }
    }

    fn linda_id(raw_id: u64) -> u64 {
        obfuscate_linda_id(raw_id)
    }

    fn check_not_tombstoned(&self) -> Result<(), KeeperError> {
        if self.tombstoned.load(Ordering::Acquire) {
            Err(KeeperError::Tombstoned)
        } else {
            Ok(())
        }
    }

    /// `set(key, v…)`: replace the key's FIFO with the given sequence.
    /// Returns whether anything was displaced and the resulting capacity status.
    pub fn set(
        &self,
        raw_linda_id: u64,
        key: &Value,
        values: Vec<Value>,
    ) -> Result<(bool, CapacityStatus), KeeperError> {
        self.check_not_tombstoned()?;
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        let entry = guard.entry(id, key);
        entry.check(OpFamily::SetGet)?;

        let displaced = !entry.queue.is_empty();
        entry.queue.clear();
        entry.queue.extend(values);
        let status = entry.capacity_status();

        if values_is_empty_and_no_limit(entry) {
            guard.prune_if_dormant(id, key);
        }
        Ok((displaced, status))
    }

    /// `get(key, n?)`: read up to `n` front elements non-destructively.
    pub fn get(
        &self,
        raw_linda_id: u64,
        key: &Value,
        n: Option<usize>,
    ) -> Result<Vec<Value>, KeeperError> {
        self.check_not_tombstoned()?;
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        let entry = guard.entry(id, key);
        entry.check(OpFamily::SetGet)?;
        let count = n.unwrap_or(1).min(entry.queue.len());
        Ok(entry.queue.iter().take(count).cloned().collect())
    }

    /// `send(key, v…)`: append if under limit, else signal the caller to block.
    pub fn send(
        &self,
        raw_linda_id: u64,
        key: &Value,
        values: Vec<Value>,
    ) -> Result<SendOutcome, KeeperError> {
        self.check_not_tombstoned()?;
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        let entry = guard.entry(id, key);
        entry.check(OpFamily::SendReceive)?;

        let would_be_len = entry.queue.len() + values.len();
        let exceeds = matches!(entry.limit, Some(limit) if would_be_len as i64 > limit);
        if exceeds {
            return Ok(SendOutcome::WouldBlock);
        }
        entry.queue.extend(values);
        Ok(SendOutcome::Sent(entry.capacity_status()))
    }

    /// `receive(keys…, n?)`: remove and return up to `n` values from the
    /// first non-empty key, scanning in argument order.
    pub fn receive(
        &self,
        raw_linda_id: u64,
        keys: &[Value],
        n: usize,
    ) -> Result<Option<(Value, Vec<Value>)>, KeeperError> {
        self.check_not_tombstoned()?;
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        for key in keys {
            let entry = guard.entry(id, key);
            entry.check(OpFamily::SendReceive)?;
            if entry.queue.is_empty() {
                continue;
            }
            let count = n.min(entry.queue.len());
            let values: Vec<Value> = entry.queue.drain(..count).collect();
            guard.prune_if_dormant(id, key);
            return Ok(Some((key.clone(), values)));
        }
        Ok(None)
    }

    /// `limit(key, n?)`: read or set the capacity limit.
    pub fn limit(
        &self,
        raw_linda_id: u64,
        key: &Value,
        n: Option<i64>,
    ) -> Result<(Option<i64>, CapacityStatus), KeeperError> {
        self.check_not_tombstoned()?;
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        let entry = guard.entry(id, key);
        let previous = entry.limit;
        if let Some(n) = n {
            entry.limit = Some(n);
        }
        let status = entry.capacity_status();
        Ok((previous, status))
    }

    /// `restrict(key, mode?)`: read or set the access restriction.
    pub fn restrict(
        &self,
        raw_linda_id: u64,
        key: &Value,
        mode: Option<Restrict>,
    ) -> Result<Restrict, KeeperError> {
        self.check_not_tombstoned()?;
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        let entry = guard.entry(id, key);
        let previous = entry.restrict;
        if let Some(mode) = mode {
            entry.restrict = mode;
        }
        Ok(previous)
    }

    /// `count(key?)`.
    pub fn count(&self, raw_linda_id: u64, keys: &[Value]) -> CountResult {
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        match keys {
            [] => {
                let count = guard
                    .tables
                    .keys()
                    .filter(|(lid, _)| *lid == id)
                    .count();
                CountResult::Total(count)
            }
            [single] => {
                let len = guard
                    .tables
                    .get(&(id, single.clone()))
                    .map(|s| s.queue.len())
                    .unwrap_or(0);
                CountResult::PerKey(len)
            }
            many => {
                let mut table = BTreeMap::new();
                for key in many {
                    let len = guard
                        .tables
                        .get(&(id, key.clone()))
                        .map(|s| s.queue.len())
                        .unwrap_or(0);
                    table.insert(key.clone(), len);
                }
                CountResult::Table(table)
            }
        }
    }

    /// `destruct(linda)`: delete all keys belonging to this linda.
    pub fn destruct(&self, raw_linda_id: u64) {
        let id = Self::linda_id(raw_linda_id);
        let mut guard = self.state.lock();
        guard.tables.retain(|(lid, _), _| *lid != id);
    }

    /// `collectgarbage()`. This port has no interpreter GC to drive; kept
    /// as a no-op entry point so callers written against the original
    /// eight-operation surface still have somewhere to call.
    pub fn collect_garbage(&self) {
        tracing::debug!("keeper collectgarbage: no-op in this port");
    }

    /// Mark this keeper as destructed. Idempotent, per §3 ("a tombstone
    /// flag so destruction is idempotent during Universe shutdown").
    pub fn tombstone(&self) {
        self.tombstoned.store(true, Ordering::Release);
    }

    /// Whether this keeper has been tombstoned.
    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned.load(Ordering::Acquire)
    }
}

fn values_is_empty_and_no_limit(entry: &KeyState) -> bool {
    entry.queue.is_empty() && entry.limit.is_none()
}
