use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use memstore_core::{TransportLabel, WireKey};

use crate::{Payload, TransportError};

pub type TransportResult<T> = Result<T, TransportError>;

/// Server statistics keyed by server, then by stat name.
pub type Stats = HashMap<String, HashMap<String, String>>;

/// Opaque version token returned by versioned reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CasToken(pub u64);

/// A payload together with the token it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub payload: Payload,
    pub token: CasToken,
}

/// A memcached-style key-value transport.
///
/// Keys are already normalized; payloads are opaque bytes plus flags. `ttl`
/// of `None` means the item never expires. Missing keys are `Ok(None)` for
/// reads and `Err(TransportError::NotFound)` for operations that require the
/// key to exist.
#[async_trait]
pub trait Transport: Sync + Send {
    async fn get(&self, key: &WireKey) -> TransportResult<Option<Payload>>;

    /// Reads many keys in one round trip. Absent keys are left out.
    async fn get_multi(&self, keys: &[WireKey]) -> TransportResult<HashMap<WireKey, Payload>>;

    async fn gets(&self, key: &WireKey) -> TransportResult<Option<Versioned>>;

    async fn gets_multi(&self, keys: &[WireKey])
    -> TransportResult<HashMap<WireKey, Versioned>>;

    async fn set(&self, key: &WireKey, payload: Payload, ttl: Option<Duration>)
    -> TransportResult<()>;

    /// Stores only if the key is absent; `NotStored` otherwise.
    async fn add(&self, key: &WireKey, payload: Payload, ttl: Option<Duration>)
    -> TransportResult<()>;

    /// Stores only if the item is still at `token`.
    ///
    /// `Exists` on token mismatch, `NotFound` if the item is gone.
    async fn cas(
        &self,
        key: &WireKey,
        payload: Payload,
        ttl: Option<Duration>,
        token: CasToken,
    ) -> TransportResult<()>;

    async fn delete(&self, key: &WireKey) -> TransportResult<()>;

    /// Increments a decimal counter, returning the new value.
    async fn incr(&self, key: &WireKey, by: u64) -> TransportResult<u64>;

    /// Decrements a decimal counter, returning the new value.
    async fn decr(&self, key: &WireKey, by: u64) -> TransportResult<u64>;

    async fn append(&self, key: &WireKey, data: &[u8]) -> TransportResult<()>;

    async fn prepend(&self, key: &WireKey, data: &[u8]) -> TransportResult<()>;

    /// Invalidates every item.
    async fn flush(&self) -> TransportResult<()>;

    async fn stats(&self) -> TransportResult<Stats>;

    /// Drops and reopens connections.
    async fn reset(&self) -> TransportResult<()>;

    /// Returns the label of this transport for logs and metrics.
    fn label(&self) -> TransportLabel {
        TransportLabel::new_static("transport")
    }
}

macro_rules! forward_transport {
    ([$($generics:tt)*] $ty:ty) => {
        #[async_trait]
        impl<$($generics)*> Transport for $ty {
            async fn get(&self, key: &WireKey) -> TransportResult<Option<Payload>> {
                (**self).get(key).await
            }

            async fn get_multi(
                &self,
                keys: &[WireKey],
            ) -> TransportResult<HashMap<WireKey, Payload>> {
                (**self).get_multi(keys).await
            }

            async fn gets(&self, key: &WireKey) -> TransportResult<Option<Versioned>> {
                (**self).gets(key).await
            }

            async fn gets_multi(
                &self,
                keys: &[WireKey],
            ) -> TransportResult<HashMap<WireKey, Versioned>> {
                (**self).gets_multi(keys).await
            }

            async fn set(
                &self,
                key: &WireKey,
                payload: Payload,
                ttl: Option<Duration>,
            ) -> TransportResult<()> {
                (**self).set(key, payload, ttl).await
            }

            async fn add(
                &self,
                key: &WireKey,
                payload: Payload,
                ttl: Option<Duration>,
            ) -> TransportResult<()> {
                (**self).add(key, payload, ttl).await
            }

            async fn cas(
                &self,
                key: &WireKey,
                payload: Payload,
                ttl: Option<Duration>,
                token: CasToken,
            ) -> TransportResult<()> {
                (**self).cas(key, payload, ttl, token).await
            }

            async fn delete(&self, key: &WireKey) -> TransportResult<()> {
                (**self).delete(key).await
            }

            async fn incr(&self, key: &WireKey, by: u64) -> TransportResult<u64> {
                (**self).incr(key, by).await
            }

            async fn decr(&self, key: &WireKey, by: u64) -> TransportResult<u64> {
                (**self).decr(key, by).await
            }

            async fn append(&self, key: &WireKey, data: &[u8]) -> TransportResult<()> {
                (**self).append(key, data).await
            }

            async fn prepend(&self, key: &WireKey, data: &[u8]) -> TransportResult<()> {
                (**self).prepend(key, data).await
            }

            async fn flush(&self) -> TransportResult<()> {
                (**self).flush().await
            }

            async fn stats(&self) -> TransportResult<Stats> {
                (**self).stats().await
            }

            async fn reset(&self) -> TransportResult<()> {
                (**self).reset().await
            }

            fn label(&self) -> TransportLabel {
                (**self).label()
            }
        }
    };
}

forward_transport!(['a, T: Transport + ?Sized] &'a T);
forward_transport!([T: Transport + ?Sized] Box<T>);
forward_transport!([T: Transport + ?Sized] Arc<T>);
