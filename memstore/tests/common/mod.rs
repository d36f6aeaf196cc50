#![allow(dead_code)]

pub mod logs;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use memstore::{CacheStore, CacheStoreBuilder, EventLog, Operation, Options};
use memstore_core::ManualClock;
use memstore_memory::MemoryTransport;

pub struct Harness {
    pub transport: MemoryTransport,
    pub clock: ManualClock,
    pub events: EventLog,
    pub cache: CacheStore,
}

impl Harness {
    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.events.operations()
    }

    /// Wire key of `key` under the store defaults.
    pub fn wire(&self, key: &str) -> String {
        self.cache.normalize_key(key, &Options::new()).into_string()
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2008, 4, 24, 0, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with(|builder| builder)
}

pub fn harness_with(configure: impl FnOnce(CacheStoreBuilder) -> CacheStoreBuilder) -> Harness {
    let clock = ManualClock::new(start());
    let transport = MemoryTransport::with_clock(Arc::new(clock.clone()));
    let events = EventLog::new();
    let builder = CacheStore::builder(transport.clone())
        .clock(clock.clone())
        .instrument(events.clone());
    let cache = configure(builder).build();
    Harness {
        transport,
        clock,
        events,
        cache,
    }
}

pub fn opts() -> Options {
    Options::new()
}
