//! Per-key call coalescing: concurrent callers for the same key share one
//! in-flight resolution instead of issuing redundant upstream queries.
//! Grounded on the teacher's `resolve_with_deduplication` (the in-flight
//! `DashMap` + `tokio::sync::broadcast` pattern in the old `src/resolver.rs`),
//! generalized to an arbitrary outcome type so both the foreground resolve
//! path and the background refresh path can share one instance keyed by
//! `CacheKey`.

use std::future::Future;
use std::hash::Hash;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

/// One pending resolution: the leader holds `tx`, followers subscribe to it.
struct InFlight<V> {
    tx: broadcast::Sender<V>,
}

pub struct SingleFlight<K, V> {
    inflight: DashMap<K, InFlight<V>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        SingleFlight { inflight: DashMap::new() }
    }

    /// Runs `f` for the first caller to observe `key` with no in-flight
    /// entry (the leader); every caller that arrives while that entry is
    /// still present instead waits for its broadcast outcome. Returns the
    /// outcome and whether this particular call coalesced onto another.
    ///
    /// The entry is looked up and, if occupied, subscribed to within the
    /// same `DashMap` shard lock acquisition as the leader's removal, so a
    /// follower that observes the entry can never miss the leader's
    /// broadcast: the two operations cannot interleave within one shard.
    pub async fn call<F, Fut>(&self, key: K, f: F) -> (V, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let (rx, is_leader) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(o) => (Some(o.get().tx.subscribe()), false),
            Entry::Vacant(v) => {
                let (tx, _rx) = broadcast::channel(1);
                v.insert(InFlight { tx });
                (None, true)
            }
        };

        if is_leader {
            let outcome = f().await;
            // Remove before publishing: any caller arriving after this point
            // sees no entry and starts a fresh call rather than subscribing
            // to a sender about to have no more receivers.
            if let Some((_, in_flight)) = self.inflight.remove(&key) {
                let _ = in_flight.tx.send(outcome.clone());
            }
            (outcome, false)
        } else {
            match rx.expect("follower path always has a receiver").recv().await {
                Ok(outcome) => (outcome, true),
                // The leader's sender was dropped without publishing
                // (panicked) or this receiver lagged past the single
                // buffered slot; either way, run the call ourselves rather
                // than propagate an internal channel error to the caller.
                Err(_) => (f().await, false),
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }
}
