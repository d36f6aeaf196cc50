//! Task-local overlay.
//!
//! Inside [`CacheStore::with_local_cache`](crate::CacheStore::with_local_cache)
//! the store mirrors what it reads and writes into an overlay that lives as
//! long as the bracket. Repeated reads of the same key are then answered
//! without a transport round trip, including remembered misses.
//!
//! Overlays are kept per store instance in a tokio task-local, as a stack so
//! nested brackets start fresh and give the outer overlay back on exit. The
//! overlay holds encoded payloads; reads decode them again like transport
//! bytes.

use std::cell::RefCell;
use std::collections::HashMap;

use memstore_backend::Payload;
use memstore_core::WireKey;

/// `None` remembers that the key is absent.
type Overlay = HashMap<WireKey, Option<Payload>>;

tokio::task_local! {
    static OVERLAYS: RefCell<HashMap<u64, Vec<Overlay>>>;
}

/// Runs `future` with a fresh overlay for store `store`.
pub(crate) async fn scope<Fut: Future>(store: u64, future: Fut) -> Fut::Output {
    let nested = OVERLAYS
        .try_with(|overlays| {
            overlays
                .borrow_mut()
                .entry(store)
                .or_default()
                .push(Overlay::new());
        })
        .is_ok();

    if nested {
        let _pop = PopOnDrop { store };
        future.await
    } else {
        let overlays = HashMap::from([(store, vec![Overlay::new()])]);
        OVERLAYS.scope(RefCell::new(overlays), future).await
    }
}

/// Pops a nested overlay however the bracket ends.
struct PopOnDrop {
    store: u64,
}

impl Drop for PopOnDrop {
    fn drop(&mut self) {
        let _ = OVERLAYS.try_with(|overlays| {
            let mut overlays = overlays.borrow_mut();
            if let Some(stack) = overlays.get_mut(&self.store) {
                stack.pop();
                if stack.is_empty() {
                    overlays.remove(&self.store);
                }
            }
        });
    }
}

fn with_overlay<R>(store: u64, f: impl FnOnce(&mut Overlay) -> R) -> Option<R> {
    OVERLAYS
        .try_with(|overlays| {
            overlays
                .borrow_mut()
                .get_mut(&store)
                .and_then(|stack| stack.last_mut())
                .map(f)
        })
        .ok()
        .flatten()
}

/// Returns `true` inside a bracket for `store`.
pub(crate) fn is_active(store: u64) -> bool {
    with_overlay(store, |_| ()).is_some()
}

/// What the overlay knows about `key`.
///
/// `None` when there is no bracket or the key was never seen,
/// `Some(None)` for a remembered miss.
pub(crate) fn lookup(store: u64, key: &WireKey) -> Option<Option<Payload>> {
    with_overlay(store, |overlay| overlay.get(key).cloned()).flatten()
}

/// Remembers `payload` (or absence) for `key`.
pub(crate) fn record(store: u64, key: &WireKey, payload: Option<Payload>) {
    with_overlay(store, |overlay| {
        overlay.insert(key.clone(), payload);
    });
}

/// Forgets `key`, so the next read goes to the transport.
pub(crate) fn invalidate(store: u64, key: &WireKey) {
    with_overlay(store, |overlay| {
        overlay.remove(key);
    });
}

/// Forgets everything.
pub(crate) fn clear(store: u64) {
    with_overlay(store, Overlay::clear);
}
