//! The cache store engine.
//!
//! [`CacheStore`] owns a transport handle, a [`Codec`] and the store-wide
//! settings. Every public operation:
//!
//! 1. merges the call's [`Options`] over the store defaults,
//! 2. normalizes the logical key into a [`WireKey`],
//! 3. runs its transport calls through the fault guard,
//! 4. decodes payloads into [`Entry`]s and judges their expiration,
//! 5. emits one [`CacheEvent`] to the instrument and the metrics facade.
//!
//! ## Expiration
//!
//! Entries carry their logical lifetime (`expires_in`). memcached is asked to
//! keep serialized entries somewhat longer, `expires_in` plus the larger of
//! the store's race-condition grace and the call's `race_condition_ttl`, so
//! `fetch` can still find an expired entry and serve it while it is being
//! recomputed. Raw writes use `expires_in` as is.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use memstore_backend::{CasToken, Codec, Format, JsonFormat, Payload, Stats, Transport};
use memstore_core::{CacheKey, Clock, Entry, EntryMeta, KeyNormalizer, Options, TransportLabel, WireKey};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::builder::CacheStoreBuilder;
use crate::cas::{CasMulti, CasStatus};
use crate::classify::{Fault, FaultClassifier};
use crate::error::{CacheError, CacheResult};
use crate::guard::{Guard, Rejected};
use crate::instrument::{CacheEvent, Instrument, Operation, Outcome};
use crate::local;
use crate::logger::Logger;
use crate::metrics;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_store_id() -> u64 {
    NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a store call hands to the instrumentation step.
struct Report<T> {
    value: T,
    outcome: Outcome,
    hits: usize,
}

impl<T> Report<T> {
    fn new(value: T, outcome: Outcome) -> Self {
        Report {
            value,
            outcome,
            hits: usize::from(outcome == Outcome::Hit),
        }
    }

    fn with_hits(mut self, hits: usize) -> Self {
        self.hits = hits;
        self
    }
}

enum Lookup<T> {
    Hit(Entry<T>),
    Expired(Entry<T>),
    Miss,
    Failed(Rejected),
}

enum FetchError<E> {
    Cache(CacheError),
    Compute(E),
}

impl<E> From<CacheError> for FetchError<E> {
    fn from(error: CacheError) -> Self {
        FetchError::Cache(error)
    }
}

/// A memcached-style cache store.
///
/// Built with [`CacheStore::builder`]. The store is `Send + Sync` and meant
/// to be shared, e.g. behind an `Arc`. Its configuration is fixed at build
/// time except for the `read_only` and `swallow_exceptions` switches, which
/// are read once at the start of every call.
///
/// # Example
///
/// ```
/// use memstore::{CacheStore, Options};
/// use memstore_memory::MemoryTransport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), memstore::CacheError> {
/// let cache = CacheStore::new(MemoryTransport::new());
///
/// assert_eq!(cache.increment("hits", 1, &Options::new()).await?, None);
/// cache.write("hits", &0u64, &Options::new().raw()).await?;
/// assert_eq!(cache.increment("hits", 1, &Options::new()).await?, Some(1));
/// # Ok(())
/// # }
/// ```
pub struct CacheStore<F: Format = JsonFormat> {
    pub(crate) id: u64,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) codec: Codec<F>,
    pub(crate) defaults: Options,
    pub(crate) race_condition_grace: Duration,
    pub(crate) value_size_limit: Option<usize>,
    pub(crate) read_only: AtomicBool,
    pub(crate) swallow_exceptions: AtomicBool,
    pub(crate) classifier: FaultClassifier,
    pub(crate) logger: Logger,
    pub(crate) instrument: Option<Arc<dyn Instrument>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl CacheStore<JsonFormat> {
    /// Starts building a store on top of `transport`.
    pub fn builder<T>(transport: T) -> CacheStoreBuilder
    where
        T: Transport + 'static,
    {
        CacheStoreBuilder::new(Arc::new(transport))
    }

    /// A store with default settings: JSON values, no compression, 5 minute
    /// race-condition grace, transient faults swallowed.
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self::builder(transport).build()
    }
}

impl<F: Format> CacheStore<F> {
    /// Reads a value.
    ///
    /// Absent, undecodable and logically expired entries are all `None`. An
    /// expired entry is left in place.
    pub async fn read<T>(&self, key: impl Into<CacheKey>, options: &Options) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        Ok(self.read_entry(key, options).await?.map(Entry::into_value))
    }

    /// Reads a value together with its creation time and lifetime.
    pub async fn read_entry<T>(
        &self,
        key: impl Into<CacheKey>,
        options: &Options,
    ) -> CacheResult<Option<Entry<T>>>
    where
        T: DeserializeOwned,
    {
        let key = key.into();
        let options = self.merged(options);
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Read, vec![key], async {
            let guard = self.guard(Operation::Read, Some(&wire), swallow);
            Ok(match self.lookup::<T>(&guard, &wire).await? {
                Lookup::Hit(entry) => Report::new(Some(entry), Outcome::Hit),
                Lookup::Expired(_) | Lookup::Miss => Report::new(None, Outcome::Miss),
                Lookup::Failed(rejected) => Report::new(None, rejected.outcome()),
            })
        })
        .await
    }

    /// Reads several values in one transport round trip.
    ///
    /// Keys without a live value are left out of the result. A swallowed
    /// fault on the batch yields an empty map.
    pub async fn read_multi<K, T>(&self, keys: &[K], options: &Options) -> CacheResult<HashMap<K, T>>
    where
        K: Clone + Eq + Hash + Into<CacheKey>,
        T: DeserializeOwned,
    {
        let options = self.merged(options);
        let swallow = self.swallow_exceptions();
        let named: Vec<(K, WireKey, CacheKey)> = keys
            .iter()
            .map(|name| {
                let key: CacheKey = name.clone().into();
                (name.clone(), self.wire_key(&key, &options), key)
            })
            .collect();
        let logical = named.iter().map(|(_, _, key)| key.clone()).collect();

        self.observe(Operation::ReadMulti, logical, async {
            let mut found = HashMap::with_capacity(named.len());
            let mut pending = Vec::new();
            for (name, wire, _) in &named {
                match local::lookup(self.id, wire) {
                    Some(payload) => {
                        if let Lookup::Hit(entry) = self.resolve::<T>(wire, payload) {
                            found.insert(name.clone(), entry.into_value());
                        }
                    }
                    None => pending.push((name, wire)),
                }
            }

            if !pending.is_empty() {
                let wires: Vec<WireKey> = pending.iter().map(|(_, wire)| (*wire).clone()).collect();
                let guard = self.guard(Operation::ReadMulti, None, swallow);
                let payloads = match guard.run(self.transport.get_multi(&wires)).await? {
                    Ok(payloads) => payloads,
                    Err(rejected) if rejected.is_miss() => HashMap::new(),
                    Err(rejected) => return Ok(Report::new(HashMap::new(), rejected.outcome())),
                };
                for (name, wire) in pending {
                    let payload = payloads.get(wire).cloned();
                    local::record(self.id, wire, payload.clone());
                    if let Lookup::Hit(entry) = self.resolve::<T>(wire, payload) {
                        found.insert(name.clone(), entry.into_value());
                    }
                }
            }

            let hits = found.len();
            let outcome = if hits > 0 { Outcome::Hit } else { Outcome::Miss };
            Ok(Report::new(found, outcome).with_hits(hits))
        })
        .await
    }

    /// Writes a value.
    ///
    /// Returns `false` when the transport did not store it: `unless_exist`
    /// on a present key, a payload over the value size limit or a swallowed
    /// fault. In read-only mode nothing is written and `true` is returned.
    ///
    /// When raw values are compressed, `unless_exist` is rejected with
    /// [`CacheError::Unsupported`].
    pub async fn write<T>(&self, key: impl Into<CacheKey>, value: &T, options: &Options) -> CacheResult<bool>
    where
        T: Serialize + ?Sized,
    {
        let options = self.merged(options);
        self.check_supported(Operation::Write, &options)?;
        if self.read_only() {
            return Ok(true);
        }
        let key = key.into();
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Write, vec![key], async {
            let guard = self.guard(Operation::Write, Some(&wire), swallow);
            self.write_value(&guard, &wire, value, &options).await
        })
        .await
    }

    /// Deletes a value. An absent key counts as deleted.
    pub async fn delete(&self, key: impl Into<CacheKey>, options: &Options) -> CacheResult<bool> {
        if self.read_only() {
            return Ok(true);
        }
        let key = key.into();
        let options = self.merged(options);
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Delete, vec![key], async {
            let guard = self.guard(Operation::Delete, Some(&wire), swallow);
            self.delete_wire(&guard, &wire).await
        })
        .await
    }

    /// Returns `true` if a live entry exists. Stored `None` and `false`
    /// values count.
    ///
    /// Only the entry's metadata is decoded, so the value type need not be
    /// known.
    pub async fn exist(&self, key: impl Into<CacheKey>, options: &Options) -> CacheResult<bool> {
        let key = key.into();
        let options = self.merged(options);
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Exist, vec![key], async {
            let guard = self.guard(Operation::Exist, Some(&wire), swallow);
            let payload = match self.lookup_payload(&guard, &wire).await? {
                Ok(payload) => payload,
                Err(rejected) => return Ok(Report::new(false, rejected.outcome())),
            };
            let live = payload
                .and_then(|payload| self.decode_meta(&wire, &payload))
                .is_some_and(|meta| !meta.is_expired(self.clock.now(), Duration::ZERO));
            Ok(if live {
                Report::new(true, Outcome::Hit)
            } else {
                Report::new(false, Outcome::Miss)
            })
        })
        .await
    }

    /// Reads a value, computing and writing it on a miss.
    ///
    /// With `force` the read is skipped. When the cached entry has expired
    /// but is still within `race_condition_ttl` of its deadline, it is first
    /// written back with a deadline of now plus `race_condition_ttl`, so
    /// concurrent readers keep getting the stale value while this caller
    /// recomputes. If `compute` fails its error is returned and the stale
    /// value stays readable for that window. An entry expired beyond the
    /// window is deleted before recomputing.
    ///
    /// In read-only mode the value is computed and returned but nothing is
    /// written or deleted.
    pub async fn fetch<T, E, C, Fut>(
        &self,
        key: impl Into<CacheKey>,
        options: &Options,
        compute: C,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        C: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CacheError>,
    {
        let key = key.into();
        let options = self.merged(options);
        self.check_supported(Operation::Fetch, &options)?;
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();
        let read_only = self.read_only();
        let started = Instant::now();

        let guard = self.guard(Operation::Fetch, Some(&wire), swallow);
        let result = self
            .fetch_value(&guard, &wire, &options, read_only, compute)
            .await;

        let (outcome, hits) = match &result {
            Ok(report) => (report.outcome, report.hits),
            Err(FetchError::Cache(error)) => (Outcome::Error(error.fault_kind()), 0),
            Err(FetchError::Compute(_)) => (Outcome::Miss, 0),
        };
        self.emit(Operation::Fetch, vec![key], outcome, hits, started.elapsed());

        match result {
            Ok(report) => Ok(report.value),
            Err(FetchError::Cache(error)) => Err(error.into()),
            Err(FetchError::Compute(error)) => Err(error),
        }
    }

    /// Increments a raw counter. `None` if the key is absent.
    ///
    /// Fails with [`CacheError::Unsupported`] when raw values are
    /// compressed.
    pub async fn increment(
        &self,
        key: impl Into<CacheKey>,
        amount: u64,
        options: &Options,
    ) -> CacheResult<Option<u64>> {
        self.count(Operation::Increment, key.into(), amount, options)
            .await
    }

    /// Decrements a raw counter. `None` if the key is absent.
    ///
    /// memcached counters do not go below zero.
    pub async fn decrement(
        &self,
        key: impl Into<CacheKey>,
        amount: u64,
        options: &Options,
    ) -> CacheResult<Option<u64>> {
        self.count(Operation::Decrement, key.into(), amount, options)
            .await
    }

    /// Appends bytes to a raw value. `false` if the key is absent.
    ///
    /// Like the counters, unsupported when raw values are compressed.
    pub async fn append(
        &self,
        key: impl Into<CacheKey>,
        value: impl AsRef<[u8]>,
        options: &Options,
    ) -> CacheResult<bool> {
        self.concat(Operation::Append, key.into(), value.as_ref(), options)
            .await
    }

    /// Prepends bytes to a raw value. `false` if the key is absent.
    pub async fn prepend(
        &self,
        key: impl Into<CacheKey>,
        value: impl AsRef<[u8]>,
        options: &Options,
    ) -> CacheResult<bool> {
        self.concat(Operation::Prepend, key.into(), value.as_ref(), options)
            .await
    }

    /// Compare-and-swap on one key.
    ///
    /// Reads the value with its CAS token, passes it to `update` and writes
    /// the result back only if nobody wrote the key in between. Returns
    /// `false` without calling `update` when the key is absent, expired or
    /// undecodable, and `false` when the conditioned write loses to another
    /// writer. There is no retry.
    ///
    /// A logically expired entry that memcached still holds counts as
    /// absent, as in [`cas_multi`](Self::cas_multi). ActiveSupport's
    /// memcached store hands such a value to the block instead.
    ///
    /// In read-only mode `update` runs but its result is not written, and
    /// the call returns `true`.
    pub async fn cas<T, U>(&self, key: impl Into<CacheKey>, options: &Options, update: U) -> CacheResult<bool>
    where
        T: Serialize + DeserializeOwned,
        U: FnOnce(T) -> T,
    {
        let key = key.into();
        let options = self.merged(options);
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();
        let read_only = self.read_only();

        self.observe(Operation::Cas, vec![key], async {
            let guard = self.guard(Operation::Cas, Some(&wire), swallow);
            let versioned = match guard.run(self.transport.gets(&wire)).await? {
                Ok(Some(versioned)) => versioned,
                Ok(None) => return Ok(Report::new(false, Outcome::Miss)),
                Err(rejected) => return Ok(Report::new(false, rejected.outcome())),
            };
            let Lookup::Hit(entry) = self.resolve::<T>(&wire, Some(versioned.payload)) else {
                return Ok(Report::new(false, Outcome::Miss));
            };

            let value = update(entry.into_value());
            if read_only {
                return Ok(Report::new(true, Outcome::Done));
            }

            Ok(
                match self.swap(&guard, &wire, &value, &options, versioned.token).await? {
                    Ok(()) => Report::new(true, Outcome::Stored),
                    Err(rejected) => Report::new(false, rejected.outcome()),
                },
            )
        })
        .await
    }

    /// Compare-and-swap on several keys.
    ///
    /// One versioned batch read, then `update` gets the live values (absent
    /// and expired keys are left out). Every key it returns that was read is
    /// written back with its own token; the rest are reported as
    /// [`CasStatus::Missing`]. Keys are independent: a conflict on one does
    /// not undo the others.
    ///
    /// An empty key list returns [`CasMulti::Empty`] without touching the
    /// transport. In read-only mode `update` runs and every returned key is
    /// [`CasStatus::Skipped`].
    pub async fn cas_multi<K, T, U>(&self, keys: &[K], options: &Options, update: U) -> CacheResult<CasMulti<K>>
    where
        K: Clone + Eq + Hash + Into<CacheKey>,
        T: Serialize + DeserializeOwned,
        U: FnOnce(HashMap<K, T>) -> HashMap<K, T>,
    {
        if keys.is_empty() {
            return Ok(CasMulti::Empty);
        }
        let options = self.merged(options);
        let swallow = self.swallow_exceptions();
        let read_only = self.read_only();
        let named: Vec<(K, WireKey, CacheKey)> = keys
            .iter()
            .map(|name| {
                let key: CacheKey = name.clone().into();
                (name.clone(), self.wire_key(&key, &options), key)
            })
            .collect();
        let logical = named.iter().map(|(_, _, key)| key.clone()).collect();

        self.observe(Operation::CasMulti, logical, async {
            let wires: Vec<WireKey> = named.iter().map(|(_, wire, _)| wire.clone()).collect();
            let guard = self.guard(Operation::CasMulti, None, swallow);
            let mut versioned = match guard.run(self.transport.gets_multi(&wires)).await? {
                Ok(versioned) => versioned,
                Err(rejected) if rejected.is_miss() => HashMap::new(),
                Err(rejected) => return Ok(Report::new(CasMulti::Aborted, rejected.outcome())),
            };

            let mut values = HashMap::with_capacity(versioned.len());
            let mut tokens: HashMap<K, (&WireKey, CasToken)> = HashMap::with_capacity(versioned.len());
            for (name, wire, _) in &named {
                let Some(found) = versioned.remove(wire) else {
                    continue;
                };
                if let Lookup::Hit(entry) = self.resolve::<T>(wire, Some(found.payload)) {
                    values.insert(name.clone(), entry.into_value());
                    tokens.insert(name.clone(), (wire, found.token));
                }
            }
            let hits = values.len();

            let updated = update(values);
            let mut statuses = HashMap::with_capacity(updated.len());
            for (name, value) in updated {
                let status = match tokens.get(&name) {
                    None => CasStatus::Missing,
                    Some(_) if read_only => CasStatus::Skipped,
                    Some((wire, token)) => {
                        let guard = guard.for_key(wire);
                        match self.swap(&guard, wire, &value, &options, *token).await? {
                            Ok(()) => CasStatus::Stored,
                            Err(rejected) => cas_status(rejected),
                        }
                    }
                };
                statuses.insert(name, status);
            }

            Ok(Report::new(CasMulti::Completed(statuses), Outcome::Done).with_hits(hits))
        })
        .await
    }

    /// Flushes every server. A no-op returning `true` in read-only mode.
    pub async fn clear(&self) -> CacheResult<bool> {
        if self.read_only() {
            return Ok(true);
        }
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Clear, Vec::new(), async {
            let guard = self.guard(Operation::Clear, None, swallow);
            let flushed = guard.run(self.transport.flush()).await?;
            local::clear(self.id);
            Ok(match flushed {
                Ok(()) => Report::new(true, Outcome::Done),
                Err(rejected) => Report::new(false, rejected.outcome()),
            })
        })
        .await
    }

    /// Server statistics. Empty when the fault was swallowed.
    pub async fn stats(&self) -> CacheResult<Stats> {
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Stats, Vec::new(), async {
            let guard = self.guard(Operation::Stats, None, swallow);
            Ok(match guard.run(self.transport.stats()).await? {
                Ok(stats) => Report::new(stats, Outcome::Done),
                Err(rejected) => Report::new(Stats::new(), rejected.outcome()),
            })
        })
        .await
    }

    /// Resets the transport's connections.
    pub async fn reset(&self) -> CacheResult<bool> {
        let swallow = self.swallow_exceptions();

        self.observe(Operation::Reset, Vec::new(), async {
            let guard = self.guard(Operation::Reset, None, swallow);
            Ok(match guard.run(self.transport.reset()).await? {
                Ok(()) => Report::new(true, Outcome::Done),
                Err(rejected) => Report::new(false, rejected.outcome()),
            })
        })
        .await
    }

    /// Runs `future` with a local overlay for this store.
    ///
    /// Inside the bracket the store remembers what it read and wrote, so
    /// repeated reads of a key (hits and misses alike) skip the transport.
    /// Counter and append operations and CAS conflicts forget their key;
    /// `clear` forgets everything. The overlay is dropped when the future
    /// completes, fails, panics or is cancelled. A nested bracket starts
    /// with a fresh overlay and the outer one is back on exit.
    pub async fn with_local_cache<Fut: Future>(&self, future: Fut) -> Fut::Output {
        local::scope(self.id, future).await
    }

    /// Returns `true` inside [`with_local_cache`](Self::with_local_cache).
    pub fn local_cache_active(&self) -> bool {
        local::is_active(self.id)
    }

    /// The logger faults are reported to.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Returns `true` if writes are suppressed.
    pub fn read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Switches read-only mode. Calls already running are not affected.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    /// Returns `true` if transient faults are swallowed.
    pub fn swallow_exceptions(&self) -> bool {
        self.swallow_exceptions.load(Ordering::Acquire)
    }

    /// Switches swallowing of transient faults.
    pub fn set_swallow_exceptions(&self, swallow: bool) {
        self.swallow_exceptions.store(swallow, Ordering::Release);
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Store-wide default options.
    pub fn options(&self) -> &Options {
        &self.defaults
    }

    /// The value codec.
    pub fn codec(&self) -> &Codec<F> {
        &self.codec
    }

    /// The fault classifier.
    pub fn classifier(&self) -> &FaultClassifier {
        &self.classifier
    }

    /// How much longer than `expires_in` memcached keeps serialized entries.
    pub fn race_condition_grace(&self) -> Duration {
        self.race_condition_grace
    }

    /// Largest payload, in bytes, the store writes.
    pub fn value_size_limit(&self) -> Option<usize> {
        self.value_size_limit
    }

    /// Label of the underlying transport.
    pub fn label(&self) -> TransportLabel {
        self.transport.label()
    }

    /// The wire key `key` is stored under with `options` over the defaults.
    pub fn normalize_key(&self, key: impl Into<CacheKey>, options: &Options) -> WireKey {
        self.wire_key(&key.into(), &self.merged(options))
    }

    fn merged(&self, options: &Options) -> Options {
        options.merge(&self.defaults)
    }

    fn wire_key(&self, key: &CacheKey, options: &Options) -> WireKey {
        KeyNormalizer::normalize(key, options.namespace.as_deref())
    }

    fn guard<'a>(&'a self, operation: Operation, key: Option<&'a WireKey>, swallow: bool) -> Guard<'a> {
        Guard {
            classifier: &self.classifier,
            logger: &self.logger,
            operation,
            key,
            swallow,
        }
    }

    /// memcached TTL for a write.
    fn wire_ttl(&self, options: &Options) -> Option<Duration> {
        let expires_in = options.expires_in.filter(|expires_in| !expires_in.is_zero())?;
        if options.raw {
            return Some(expires_in);
        }
        let grace = self
            .race_condition_grace
            .max(options.race_condition_window());
        Some(expires_in.saturating_add(grace))
    }

    /// Encodes a value, `None` if it is over the size limit.
    fn encode<T>(&self, value: &T, options: &Options) -> CacheResult<Option<Payload>>
    where
        T: Serialize + ?Sized,
    {
        let payload = if options.raw {
            self.codec.encode_raw(value)?
        } else {
            let entry = Entry::new(value, self.clock.now(), options.expires_in);
            self.codec.encode_entry(&entry, options)?
        };

        if let Some(limit) = self.value_size_limit
            && payload.len() > limit
        {
            let size = payload.len();
            self.logger.emit(|| {
                tracing::debug!(size, limit, "value over size limit, not stored");
            });
            return Ok(None);
        }
        Ok(Some(payload))
    }

    fn decode<T>(&self, key: &WireKey, payload: &Payload) -> Option<Entry<T>>
    where
        T: DeserializeOwned,
    {
        match self.codec.decode_entry(payload) {
            Ok(entry) => Some(entry),
            Err(error) => {
                self.logger.emit(|| {
                    tracing::debug!(key = key.as_str(), error = %error, "undecodable payload, treated as a miss");
                });
                None
            }
        }
    }

    fn decode_meta(&self, key: &WireKey, payload: &Payload) -> Option<EntryMeta> {
        match self.codec.decode_meta(payload) {
            Ok(meta) => Some(meta),
            Err(error) => {
                self.logger.emit(|| {
                    tracing::debug!(key = key.as_str(), error = %error, "undecodable payload, treated as a miss");
                });
                None
            }
        }
    }

    /// memcached cannot do arithmetic on, concatenate or `add` compressed
    /// raw values.
    fn check_supported(&self, operation: Operation, options: &Options) -> CacheResult<()> {
        if !self.codec.compress_raw() {
            return Ok(());
        }
        let unsupported = match operation {
            Operation::Increment | Operation::Decrement | Operation::Append | Operation::Prepend => true,
            Operation::Write | Operation::Fetch => options.unless_exist,
            _ => false,
        };
        if unsupported {
            return Err(CacheError::Unsupported { operation });
        }
        Ok(())
    }

    fn resolve<T>(&self, key: &WireKey, payload: Option<Payload>) -> Lookup<T>
    where
        T: DeserializeOwned,
    {
        match payload.and_then(|payload| self.decode(key, &payload)) {
            Some(entry) if entry.is_expired(self.clock.now(), Duration::ZERO) => Lookup::Expired(entry),
            Some(entry) => Lookup::Hit(entry),
            None => Lookup::Miss,
        }
    }

    /// Reads through the overlay, then the transport.
    async fn lookup<T>(&self, guard: &Guard<'_>, key: &WireKey) -> CacheResult<Lookup<T>>
    where
        T: DeserializeOwned,
    {
        Ok(match self.lookup_payload(guard, key).await? {
            Ok(payload) => self.resolve(key, payload),
            Err(rejected) => Lookup::Failed(rejected),
        })
    }

    async fn lookup_payload(
        &self,
        guard: &Guard<'_>,
        key: &WireKey,
    ) -> CacheResult<Result<Option<Payload>, Rejected>> {
        if let Some(payload) = local::lookup(self.id, key) {
            return Ok(Ok(payload));
        }
        Ok(match guard.run(self.transport.get(key)).await? {
            Ok(payload) => {
                local::record(self.id, key, payload.clone());
                Ok(payload)
            }
            Err(rejected) if rejected.is_miss() => {
                local::record(self.id, key, None);
                Ok(None)
            }
            Err(rejected) => Err(rejected),
        })
    }

    async fn write_value<T>(
        &self,
        guard: &Guard<'_>,
        key: &WireKey,
        value: &T,
        options: &Options,
    ) -> CacheResult<Report<bool>>
    where
        T: Serialize + ?Sized,
    {
        let Some(payload) = self.encode(value, options)? else {
            local::invalidate(self.id, key);
            return Ok(Report::new(false, Outcome::NotStored));
        };
        let ttl = self.wire_ttl(options);
        self.store(guard, key, payload, ttl, options.unless_exist)
            .await
    }

    async fn store(
        &self,
        guard: &Guard<'_>,
        key: &WireKey,
        payload: Payload,
        ttl: Option<Duration>,
        unless_exist: bool,
    ) -> CacheResult<Report<bool>> {
        let written = if unless_exist {
            guard
                .run(self.transport.add(key, payload.clone(), ttl))
                .await?
        } else {
            guard
                .run(self.transport.set(key, payload.clone(), ttl))
                .await?
        };

        Ok(match written {
            Ok(()) => {
                local::record(self.id, key, Some(payload));
                Report::new(true, Outcome::Stored)
            }
            Err(rejected) => {
                local::invalidate(self.id, key);
                Report::new(false, rejected.outcome())
            }
        })
    }

    async fn delete_wire(&self, guard: &Guard<'_>, key: &WireKey) -> CacheResult<Report<bool>> {
        Ok(match guard.run(self.transport.delete(key)).await? {
            Ok(()) => {
                local::record(self.id, key, None);
                Report::new(true, Outcome::Done)
            }
            Err(rejected) if rejected.is_miss() => {
                local::record(self.id, key, None);
                Report::new(true, Outcome::Miss)
            }
            Err(rejected) => {
                local::invalidate(self.id, key);
                Report::new(false, rejected.outcome())
            }
        })
    }

    /// Conditioned write with `token`.
    async fn swap<T>(
        &self,
        guard: &Guard<'_>,
        key: &WireKey,
        value: &T,
        options: &Options,
        token: CasToken,
    ) -> CacheResult<Result<(), Rejected>>
    where
        T: Serialize,
    {
        let Some(payload) = self.encode(value, options)? else {
            local::invalidate(self.id, key);
            return Ok(Err(Rejected::not_stored()));
        };
        let ttl = self.wire_ttl(options);
        let swapped = guard
            .run(self.transport.cas(key, payload.clone(), ttl, token))
            .await?;

        match swapped {
            Ok(()) => local::record(self.id, key, Some(payload)),
            Err(_) => local::invalidate(self.id, key),
        }
        Ok(swapped)
    }

    async fn fetch_value<T, E, C, Fut>(
        &self,
        guard: &Guard<'_>,
        key: &WireKey,
        options: &Options,
        read_only: bool,
        compute: C,
    ) -> Result<Report<T>, FetchError<E>>
    where
        T: Serialize + DeserializeOwned,
        C: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cached = if options.force {
            Lookup::Miss
        } else {
            self.lookup::<T>(guard, key).await?
        };

        match cached {
            Lookup::Hit(entry) => return Ok(Report::new(entry.into_value(), Outcome::Hit)),
            Lookup::Expired(entry) if !read_only => {
                self.handle_expired(guard, key, entry, options).await?;
            }
            Lookup::Expired(_) | Lookup::Miss | Lookup::Failed(_) => {}
        }

        let value = compute().await.map_err(FetchError::Compute)?;
        if !read_only {
            self.write_value(guard, key, &value, options).await?;
        }
        Ok(Report::new(value, Outcome::Miss))
    }

    /// Serves a just-expired entry for another `race_condition_ttl`, or
    /// deletes it.
    async fn handle_expired<T>(
        &self,
        guard: &Guard<'_>,
        key: &WireKey,
        entry: Entry<T>,
        options: &Options,
    ) -> CacheResult<()>
    where
        T: Serialize,
    {
        let now = self.clock.now();
        let race = options.race_condition_window();
        if race.is_zero() || entry.is_expired(now, race) {
            self.delete_wire(guard, key).await?;
            return Ok(());
        }

        let stale = entry.with_expires_at(add_duration(now, race));
        let payload = self.codec.encode_entry(&stale, options)?;
        self.store(guard, key, payload, Some(race.saturating_mul(2)), false)
            .await?;
        Ok(())
    }

    async fn count(
        &self,
        operation: Operation,
        key: CacheKey,
        amount: u64,
        options: &Options,
    ) -> CacheResult<Option<u64>> {
        let options = self.merged(options);
        self.check_supported(operation, &options)?;
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();

        self.observe(operation, vec![key], async {
            let guard = self.guard(operation, Some(&wire), swallow);
            local::invalidate(self.id, &wire);
            let counted = if operation == Operation::Decrement {
                guard.run(self.transport.decr(&wire, amount)).await?
            } else {
                guard.run(self.transport.incr(&wire, amount)).await?
            };
            Ok(match counted {
                Ok(value) => Report::new(Some(value), Outcome::Done),
                Err(rejected) => Report::new(None, rejected.outcome()),
            })
        })
        .await
    }

    async fn concat(
        &self,
        operation: Operation,
        key: CacheKey,
        value: &[u8],
        options: &Options,
    ) -> CacheResult<bool> {
        let options = self.merged(options);
        self.check_supported(operation, &options)?;
        if self.read_only() {
            return Ok(true);
        }
        let wire = self.wire_key(&key, &options);
        let swallow = self.swallow_exceptions();

        self.observe(operation, vec![key], async {
            let guard = self.guard(operation, Some(&wire), swallow);
            local::invalidate(self.id, &wire);
            let written = if operation == Operation::Prepend {
                guard.run(self.transport.prepend(&wire, value)).await?
            } else {
                guard.run(self.transport.append(&wire, value)).await?
            };
            Ok(match written {
                Ok(()) => Report::new(true, Outcome::Stored),
                Err(rejected) => Report::new(false, rejected.outcome()),
            })
        })
        .await
    }

    /// Awaits `call` and emits its event.
    async fn observe<T>(
        &self,
        operation: Operation,
        keys: Vec<CacheKey>,
        call: impl Future<Output = CacheResult<Report<T>>>,
    ) -> CacheResult<T> {
        let started = Instant::now();
        let result = call.await;
        let (outcome, hits) = match &result {
            Ok(report) => (report.outcome, report.hits),
            Err(error) => (Outcome::Error(error.fault_kind()), 0),
        };
        self.emit(operation, keys, outcome, hits, started.elapsed());
        result.map(|report| report.value)
    }

    fn emit(&self, operation: Operation, keys: Vec<CacheKey>, outcome: Outcome, hits: usize, elapsed: Duration) {
        let event = CacheEvent {
            operation,
            keys,
            outcome,
            hits,
            elapsed,
            transport: self.transport.label(),
        };
        if let Some(instrument) = &self.instrument {
            instrument.record(&event);
        }
        metrics::record_event(&event);
    }
}

fn cas_status(rejected: Rejected) -> CasStatus {
    match rejected.fault {
        Fault::Conflict => CasStatus::Conflict,
        Fault::Miss => CasStatus::Missing,
        _ => CasStatus::Failed(rejected.kind),
    }
}

fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl<F: Format> fmt::Debug for CacheStore<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("transport", &self.transport.label())
            .field("codec", &self.codec)
            .field("defaults", &self.defaults)
            .field("race_condition_grace", &self.race_condition_grace)
            .field("value_size_limit", &self.value_size_limit)
            .field("read_only", &self.read_only())
            .field("swallow_exceptions", &self.swallow_exceptions())
            .field("classifier", &self.classifier)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}
