use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use memstore_backend::{
    CasToken, FaultKind, Payload, Stats, Transport, TransportError, TransportResult, Versioned,
};
use memstore_core::{Clock, SystemClock, TransportLabel, WireKey};

use crate::TransportOp;

#[derive(Debug, Clone)]
struct Item {
    payload: Payload,
    token: CasToken,
    ttl: Option<Duration>,
    expires_at: Option<DateTime<Utc>>,
}

impl Item {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: [AtomicUsize; TransportOp::COUNT],
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// In-memory transport with memcached semantics.
///
/// Clones share the same data, counters and fault table.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    items: Arc<DashMap<WireKey, Item>>,
    counters: Arc<Counters>,
    faults: Arc<DashMap<TransportOp, FaultKind>>,
    next_token: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates an empty transport on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Evaluates TTLs against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            faults: Arc::new(DashMap::new()),
            next_token: Arc::new(AtomicU64::new(1)),
            clock,
        }
    }

    /// Makes every following `op` call fail with `kind` until healed.
    pub fn fail(&self, op: TransportOp, kind: FaultKind) {
        self.faults.insert(op, kind);
    }

    /// Makes every operation fail with `kind`.
    pub fn fail_all(&self, kind: FaultKind) {
        for op in TransportOp::ALL {
            self.fail(op, kind);
        }
    }

    /// Stops injecting faults into `op`.
    pub fn heal(&self, op: TransportOp) {
        self.faults.remove(&op);
    }

    /// Stops injecting faults.
    pub fn heal_all(&self) {
        self.faults.clear();
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: TransportOp) -> usize {
        self.counters.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Number of calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.counters
            .calls
            .iter()
            .map(|calls| calls.load(Ordering::SeqCst))
            .sum()
    }

    /// Number of write calls (`set`, `add`, `cas`, `append`, `prepend`,
    /// `incr`, `decr`, `delete`, `flush`).
    pub fn write_calls(&self) -> usize {
        TransportOp::ALL
            .into_iter()
            .filter(|op| op.is_write())
            .map(|op| self.calls(op))
            .sum()
    }

    /// Keys found by reads.
    pub fn hit_count(&self) -> usize {
        self.counters.hits.load(Ordering::SeqCst)
    }

    /// Keys missed by reads.
    pub fn miss_count(&self) -> usize {
        self.counters.misses.load(Ordering::SeqCst)
    }

    /// Zeroes all counters.
    pub fn reset_counters(&self) {
        for calls in &self.counters.calls {
            calls.store(0, Ordering::SeqCst);
        }
        self.counters.hits.store(0, Ordering::SeqCst);
        self.counters.misses.store(0, Ordering::SeqCst);
    }

    /// Returns the live payload stored under `key` without counting a call.
    pub fn peek(&self, key: &str) -> Option<Payload> {
        let now = self.clock.now();
        self.items
            .get(key)
            .filter(|item| item.is_live(now))
            .map(|item| item.payload.clone())
    }

    /// TTL the live item under `key` was last stored with.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.items
            .get(key)
            .filter(|item| item.is_live(now))
            .and_then(|item| item.ttl)
    }

    /// Stores a payload directly, bypassing counters and faults.
    pub fn insert(&self, key: WireKey, payload: Payload, ttl: Option<Duration>) {
        let item = self.item(payload, ttl);
        self.items.insert(key, item);
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.items.iter().filter(|item| item.is_live(now)).count()
    }

    /// Returns `true` if no live item is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of live items, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .items
            .iter()
            .filter(|item| item.is_live(now))
            .map(|item| item.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    fn call(&self, op: TransportOp) -> TransportResult<()> {
        self.counters.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        match self.faults.get(&op).map(|kind| *kind) {
            Some(kind) => {
                tracing::trace!(op = op.as_str(), kind = kind.as_str(), "injected transport fault");
                Err(TransportError::from_kind(kind))
            }
            None => Ok(()),
        }
    }

    fn token(&self) -> CasToken {
        CasToken(self.next_token.fetch_add(1, Ordering::SeqCst))
    }

    fn item(&self, payload: Payload, ttl: Option<Duration>) -> Item {
        let ttl = ttl.filter(|ttl| !ttl.is_zero());
        let expires_at = ttl.map(|ttl| {
            TimeDelta::from_std(ttl)
                .ok()
                .and_then(|delta| self.clock.now().checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        Item {
            payload,
            token: self.token(),
            ttl,
            expires_at,
        }
    }

    fn live(&self, key: &WireKey) -> Option<Item> {
        let now = self.clock.now();
        let item = self.items.get(key).map(|item| item.clone());
        match item {
            Some(item) if item.is_live(now) => Some(item),
            Some(_) => {
                self.items.remove_if(key, |_, item| !item.is_live(now));
                None
            }
            None => None,
        }
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.counters.hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.misses.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Applies `f` to the live item under `key`, keeping its TTL.
    fn update<R>(
        &self,
        key: &WireKey,
        missing: TransportError,
        f: impl FnOnce(&mut Item) -> TransportResult<R>,
    ) -> TransportResult<R> {
        let now = self.clock.now();
        match self.items.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let result = f(occupied.get_mut())?;
                occupied.get_mut().token = self.token();
                Ok(result)
            }
            MapEntry::Occupied(occupied) => {
                occupied.remove();
                Err(missing)
            }
            MapEntry::Vacant(_) => Err(missing),
        }
    }

    fn counter(&self, key: &WireKey, apply: impl FnOnce(u64) -> u64) -> TransportResult<u64> {
        self.update(key, TransportError::NotFound, |item| {
            let current = std::str::from_utf8(&item.payload.data)
                .ok()
                .and_then(|text| text.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    TransportError::ClientError(
                        "cannot increment or decrement non-numeric value".to_owned(),
                    )
                })?;
            let next = apply(current);
            item.payload.data = Bytes::from(next.to_string());
            Ok(next)
        })
    }

    fn concat(&self, key: &WireKey, data: &[u8], front: bool) -> TransportResult<()> {
        self.update(key, TransportError::NotStored, |item| {
            let mut buf = BytesMut::with_capacity(item.payload.data.len() + data.len());
            if front {
                buf.extend_from_slice(data);
                buf.extend_from_slice(&item.payload.data);
            } else {
                buf.extend_from_slice(&item.payload.data);
                buf.extend_from_slice(data);
            }
            item.payload.data = buf.freeze();
            Ok(())
        })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, key: &WireKey) -> TransportResult<Option<Payload>> {
        self.call(TransportOp::Get)?;
        let payload = self.live(key).map(|item| item.payload);
        self.record_lookup(payload.is_some());
        Ok(payload)
    }

    async fn get_multi(&self, keys: &[WireKey]) -> TransportResult<HashMap<WireKey, Payload>> {
        self.call(TransportOp::GetMulti)?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let item = self.live(key);
            self.record_lookup(item.is_some());
            if let Some(item) = item {
                found.insert(key.clone(), item.payload);
            }
        }
        Ok(found)
    }

    async fn gets(&self, key: &WireKey) -> TransportResult<Option<Versioned>> {
        self.call(TransportOp::Gets)?;
        let versioned = self.live(key).map(|item| Versioned {
            payload: item.payload,
            token: item.token,
        });
        self.record_lookup(versioned.is_some());
        Ok(versioned)
    }

    async fn gets_multi(
        &self,
        keys: &[WireKey],
    ) -> TransportResult<HashMap<WireKey, Versioned>> {
        self.call(TransportOp::GetsMulti)?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let item = self.live(key);
            self.record_lookup(item.is_some());
            if let Some(item) = item {
                found.insert(
                    key.clone(),
                    Versioned {
                        payload: item.payload,
                        token: item.token,
                    },
                );
            }
        }
        Ok(found)
    }

    async fn set(
        &self,
        key: &WireKey,
        payload: Payload,
        ttl: Option<Duration>,
    ) -> TransportResult<()> {
        self.call(TransportOp::Set)?;
        let item = self.item(payload, ttl);
        self.items.insert(key.clone(), item);
        Ok(())
    }

    async fn add(
        &self,
        key: &WireKey,
        payload: Payload,
        ttl: Option<Duration>,
    ) -> TransportResult<()> {
        self.call(TransportOp::Add)?;
        let now = self.clock.now();
        match self.items.entry(key.clone()) {
            MapEntry::Occupied(occupied) if occupied.get().is_live(now) => {
                Err(TransportError::NotStored)
            }
            MapEntry::Occupied(mut occupied) => {
                occupied.insert(self.item(payload, ttl));
                Ok(())
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(self.item(payload, ttl));
                Ok(())
            }
        }
    }

    async fn cas(
        &self,
        key: &WireKey,
        payload: Payload,
        ttl: Option<Duration>,
        token: CasToken,
    ) -> TransportResult<()> {
        self.call(TransportOp::Cas)?;
        let now = self.clock.now();
        match self.items.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                if occupied.get().token != token {
                    return Err(TransportError::Exists);
                }
                occupied.insert(self.item(payload, ttl));
                Ok(())
            }
            MapEntry::Occupied(occupied) => {
                occupied.remove();
                Err(TransportError::NotFound)
            }
            MapEntry::Vacant(_) => Err(TransportError::NotFound),
        }
    }

    async fn delete(&self, key: &WireKey) -> TransportResult<()> {
        self.call(TransportOp::Delete)?;
        let now = self.clock.now();
        match self.items.remove(key) {
            Some((_, item)) if item.is_live(now) => Ok(()),
            _ => Err(TransportError::NotFound),
        }
    }

    async fn incr(&self, key: &WireKey, by: u64) -> TransportResult<u64> {
        self.call(TransportOp::Incr)?;
        self.counter(key, |current| current.wrapping_add(by))
    }

    async fn decr(&self, key: &WireKey, by: u64) -> TransportResult<u64> {
        self.call(TransportOp::Decr)?;
        self.counter(key, |current| current.saturating_sub(by))
    }

    async fn append(&self, key: &WireKey, data: &[u8]) -> TransportResult<()> {
        self.call(TransportOp::Append)?;
        self.concat(key, data, false)
    }

    async fn prepend(&self, key: &WireKey, data: &[u8]) -> TransportResult<()> {
        self.call(TransportOp::Prepend)?;
        self.concat(key, data, true)
    }

    async fn flush(&self) -> TransportResult<()> {
        self.call(TransportOp::Flush)?;
        self.items.clear();
        Ok(())
    }

    async fn stats(&self) -> TransportResult<Stats> {
        self.call(TransportOp::Stats)?;
        let stats = HashMap::from([
            ("curr_items".to_owned(), self.len().to_string()),
            ("get_hits".to_owned(), self.hit_count().to_string()),
            ("get_misses".to_owned(), self.miss_count().to_string()),
            ("total_calls".to_owned(), self.total_calls().to_string()),
        ]);
        Ok(HashMap::from([("memory".to_owned(), stats)]))
    }

    async fn reset(&self) -> TransportResult<()> {
        self.call(TransportOp::Reset)?;
        Ok(())
    }

    fn label(&self) -> TransportLabel {
        TransportLabel::new_static("memory")
    }
}
