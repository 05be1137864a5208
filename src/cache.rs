//! The TTL-aware reply cache: bounded, concurrent, with negative caching,
//! a stale window for serve-stale/SWR, and two-phase eviction. Grounded on
//! the teacher's `cache::DnsCache` (`src/cache/mod.rs`) — `DashMap` for the
//! concurrent map, atomics for `CacheStats` — simplified to a single flat
//! map (no layered local/remote backend, no on-disk persistence: both are
//! explicit Non-goals here).

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::metrics::Metrics;
use crate::wire::{CacheKey, DNSMessage, RcodeClass};

/// Hit counter ceiling (2^31) mentioned in the data model as a sanity cap;
/// `hits` saturates here instead of wrapping.
const HITS_CEILING: u64 = 1 << 31;

#[derive(Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub message: DNSMessage,
    pub rcode_class: RcodeClass,
    pub inserted_ms: u64,
    pub ttl_seconds: u32,
    pub stale_until_ms: u64,
    hits: AtomicU64,
    last_hit_ms: AtomicU64,
    /// Sequence number of the most recent recency-queue push for this
    /// entry; lets eviction tell a current queue marker from a stale one
    /// left behind by an earlier touch of the same key.
    recency_seq: AtomicU64,
}

impl CacheEntry {
    fn new(
        key: CacheKey,
        message: DNSMessage,
        rcode_class: RcodeClass,
        ttl_seconds: u32,
        now_ms: u64,
        serve_stale_max_ms: u64,
    ) -> Self {
        CacheEntry {
            key,
            message,
            rcode_class,
            inserted_ms: now_ms,
            ttl_seconds,
            stale_until_ms: now_ms + (ttl_seconds as u64 * 1000) + serve_stale_max_ms,
            hits: AtomicU64::new(0),
            last_hit_ms: AtomicU64::new(now_ms),
            recency_seq: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn last_hit_ms(&self) -> u64 {
        self.last_hit_ms.load(Ordering::Relaxed)
    }

    fn record_hit(&self, now_ms: u64) {
        let prev = self.hits.fetch_add(1, Ordering::Relaxed);
        if prev >= HITS_CEILING {
            self.hits.store(HITS_CEILING, Ordering::Relaxed);
        }
        self.last_hit_ms.store(now_ms, Ordering::Relaxed);
    }

    fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.inserted_ms)
    }

    pub fn remaining_ttl_seconds(&self, now_ms: u64) -> u32 {
        let age_s = (self.age_ms(now_ms) / 1000) as u32;
        self.ttl_seconds.saturating_sub(age_s)
    }

    fn is_fresh(&self, now_ms: u64) -> bool {
        self.remaining_ttl_seconds(now_ms) > 0
    }

    fn is_stale(&self, now_ms: u64) -> bool {
        !self.is_fresh(now_ms) && now_ms < self.stale_until_ms
    }

    fn mark_touched(&self, seq: u64) {
        self.recency_seq.store(seq, Ordering::Relaxed);
    }

    fn recency_seq(&self) -> u64 {
        self.recency_seq.load(Ordering::Relaxed)
    }
}

/// A point-in-time view of a cache entry, cloned out from under the
/// `DashMap` shard lock so callers can hold it across an `.await`.
#[derive(Debug, Clone)]
pub struct CacheEntrySnapshot {
    pub key: CacheKey,
    pub message: DNSMessage,
    pub rcode_class: RcodeClass,
    pub age_seconds: u32,
    pub ttl_seconds: u32,
    pub hits: u64,
}

impl CacheEntrySnapshot {
    pub fn remaining_ttl_seconds(&self) -> u32 {
        self.ttl_seconds.saturating_sub(self.age_seconds)
    }
}

impl PartialEq for CacheEntrySnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.age_seconds == other.age_seconds && self.hits == other.hits
    }
}
impl Eq for CacheEntrySnapshot {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Fresh(CacheEntrySnapshot),
    Stale(CacheEntrySnapshot),
    Miss,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits_fresh: AtomicU64,
    pub hits_stale: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub clears: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStatsSnapshot {
    pub hits_fresh: u64,
    pub hits_stale: u64,
    pub misses: u64,
    pub evictions: u64,
    pub clears: u64,
    pub entries: usize,
}

pub struct DnsCache {
    epoch: Instant,
    entries: DashMap<CacheKey, CacheEntry>,
    recency: Mutex<VecDeque<(u64, CacheKey)>>,
    recency_seq: AtomicU64,
    max_entries: usize,
    serve_stale_max_ms: u64,
    stats: CacheStats,
    metrics: Arc<Metrics>,
}

impl DnsCache {
    pub fn new(max_entries: usize, serve_stale_max_secs: u32, metrics: Arc<Metrics>) -> Self {
        DnsCache {
            epoch: Instant::now(),
            entries: DashMap::new(),
            recency: Mutex::new(VecDeque::new()),
            recency_seq: AtomicU64::new(0),
            max_entries,
            serve_stale_max_ms: serve_stale_max_secs as u64 * 1000,
            stats: CacheStats::default(),
            metrics,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Records `key` as just touched and marks its entry with the new
    /// sequence number, so a stale duplicate left in the recency queue by
    /// an earlier touch can be told apart from the current one at
    /// eviction time.
    fn touch_recency(&self, key: &CacheKey, entry: &CacheEntry) {
        let seq = self.recency_seq.fetch_add(1, Ordering::Relaxed) + 1;
        entry.mark_touched(seq);
        self.recency.lock().push_back((seq, key.clone()));
    }

    pub fn get(&self, key: &CacheKey) -> Lookup {
        let now_ms = self.now_ms();
        let Some(entry) = self.entries.get(key) else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return Lookup::Miss;
        };

        if entry.is_fresh(now_ms) {
            entry.record_hit(now_ms);
            self.stats.hits_fresh.fetch_add(1, Ordering::Relaxed);
            let snapshot = snapshot_of(&entry, now_ms);
            self.touch_recency(key, &entry);
            Lookup::Fresh(snapshot)
        } else if entry.is_stale(now_ms) {
            entry.record_hit(now_ms);
            self.stats.hits_stale.fetch_add(1, Ordering::Relaxed);
            let snapshot = snapshot_of(&entry, now_ms);
            self.touch_recency(key, &entry);
            Lookup::Stale(snapshot)
        } else {
            drop(entry);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            Lookup::Miss
        }
    }

    /// Inserts or replaces the entry for `key`, then runs eviction while
    /// over capacity: expired-first (by `stale_until_ms`), then LRU.
    pub fn put(&self, key: CacheKey, message: DNSMessage, rcode_class: RcodeClass, ttl_seconds: u32) {
        let now_ms = self.now_ms();
        let entry = CacheEntry::new(key.clone(), message, rcode_class, ttl_seconds, now_ms, self.serve_stale_max_ms);
        self.entries.insert(key.clone(), entry);
        if let Some(entry) = self.entries.get(&key) {
            self.touch_recency(&key, &entry);
        }
        self.evict_if_over_capacity(now_ms);
        self.metrics.cache_entries.set(self.entries.len() as i64);
    }

    fn evict_if_over_capacity(&self, now_ms: u64) {
        if self.max_entries == 0 {
            return;
        }

        // Phase 1: expired-first, in stable (iteration) order.
        if self.entries.len() > self.max_entries {
            let expired: Vec<CacheKey> = self
                .entries
                .iter()
                .filter(|e| now_ms >= e.stale_until_ms)
                .map(|e| e.key.clone())
                .collect();
            for key in expired {
                if self.entries.len() <= self.max_entries {
                    break;
                }
                if self.entries.remove(&key).is_some() {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    self.metrics.evictions_total.inc();
                    trace!(?key, "evicted expired entry");
                }
            }
        }

        // Phase 2: LRU, draining the recency queue front-to-back. A
        // dequeued marker whose sequence number no longer matches the
        // entry's current `recency_seq` reflects an earlier, superseded
        // touch and is skipped without counting as an eviction.
        while self.entries.len() > self.max_entries {
            let Some((seq, candidate)) = self.recency.lock().pop_front() else {
                break;
            };
            if let Some(entry) = self.entries.get(&candidate) {
                let current = entry.recency_seq();
                drop(entry);
                if current == seq && self.entries.remove(&candidate).is_some() {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    self.metrics.evictions_total.inc();
                    debug!(key = ?candidate, "evicted LRU entry");
                }
            }
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.recency.lock().clear();
        self.stats.clears.fetch_add(1, Ordering::Relaxed);
        self.metrics.cache_clears_total.inc();
        self.metrics.cache_entries.set(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits_fresh: self.stats.hits_fresh.load(Ordering::Relaxed),
            hits_stale: self.stats.hits_stale.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            clears: self.stats.clears.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Keys eligible for a popularity-gated background refresh: within
    /// `refresh_ahead_secs` of expiry but not yet expired, having accrued
    /// at least `popularity_threshold` hits since last insert, and (if
    /// `popularity_decay_secs > 0`) last hit within that decay window.
    pub fn refresh_candidates(
        &self,
        refresh_ahead_secs: u32,
        popularity_threshold: u64,
        popularity_decay_secs: u32,
    ) -> Vec<CacheKey> {
        let now_ms = self.now_ms();
        self.entries
            .iter()
            .filter(|e| {
                let remaining = e.remaining_ttl_seconds(now_ms);
                let within_decay = popularity_decay_secs == 0
                    || now_ms.saturating_sub(e.last_hit_ms()) <= popularity_decay_secs as u64 * 1000;
                remaining <= refresh_ahead_secs
                    && remaining > 0
                    && now_ms < e.stale_until_ms
                    && e.hits() >= popularity_threshold
                    && within_decay
            })
            .map(|e| e.key.clone())
            .collect()
    }
}

fn snapshot_of(entry: &CacheEntry, now_ms: u64) -> CacheEntrySnapshot {
    CacheEntrySnapshot {
        key: entry.key.clone(),
        message: entry.message.clone(),
        rcode_class: entry.rcode_class,
        age_seconds: (entry.age_ms(now_ms) / 1000) as u32,
        ttl_seconds: entry.ttl_seconds,
        hits: entry.hits(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{DNSHeader, DNSQuestion, DNSResourceClass, DNSResourceType};

    fn test_cache(max_entries: usize, serve_stale_max_secs: u32) -> DnsCache {
        DnsCache::new(max_entries, serve_stale_max_secs, Arc::new(Metrics::new().unwrap()))
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name, DNSResourceType::A, DNSResourceClass::IN)
    }

    fn message_for(name: &str, ttl: u32) -> DNSMessage {
        let header = DNSHeader {
            id: 1,
            rd: true,
            qdcount: 1,
            ancount: 1,
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let q = DNSQuestion {
            qname: name.to_string(),
            qtype: DNSResourceType::A,
            qclass: DNSResourceClass::IN,
        };
        q.write(&mut buf);
        buf.extend_from_slice(&crate::wire::encode_name(name));
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&ttl.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[1, 2, 3, 4]);
        DNSMessage::parse(&buf).unwrap()
    }

    #[test]
    fn fresh_hit_then_miss_after_expiry() {
        let cache = test_cache(100, 300);
        let k = key("example.com");
        cache.put(k.clone(), message_for("example.com", 300), RcodeClass::Positive, 300);
        match cache.get(&k) {
            Lookup::Fresh(snap) => assert_eq!(snap.hits, 1),
            other => panic!("expected fresh, got {other:?}"),
        }
        assert_eq!(cache.stats().hits_fresh, 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = test_cache(100, 300);
        assert_eq!(cache.get(&key("nowhere.test")), Lookup::Miss);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn clear_resets_entries_and_counts_clear() {
        let cache = test_cache(100, 300);
        cache.put(key("a.test"), message_for("a.test", 60), RcodeClass::Positive, 60);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().clears, 1);
    }

    #[test]
    fn eviction_respects_max_entries() {
        let cache = test_cache(2, 300);
        for i in 0..5 {
            let name = format!("host{i}.test");
            cache.put(key(&name), message_for(&name, 300), RcodeClass::Positive, 300);
        }
        assert!(cache.len() <= 2);
        assert!(cache.stats().evictions >= 3);
    }

    #[test]
    fn refresh_candidates_require_popularity() {
        let cache = test_cache(100, 300);
        let k = key("hot.test");
        cache.put(k.clone(), message_for("hot.test", 1), RcodeClass::Positive, 1);
        assert!(cache.refresh_candidates(300, 1, 0).is_empty());
        let _ = cache.get(&k);
        assert_eq!(cache.refresh_candidates(300, 1, 0), vec![k]);
    }

    #[test]
    fn refresh_candidates_respect_decay_window() {
        let cache = test_cache(100, 300);
        let k = key("decayed.test");
        cache.put(k.clone(), message_for("decayed.test", 1), RcodeClass::Positive, 1);
        let _ = cache.get(&k);
        // A decay window of 0 disables the check; a huge one always passes.
        assert_eq!(cache.refresh_candidates(300, 1, 0), vec![k.clone()]);
        assert_eq!(cache.refresh_candidates(300, 1, 3600), vec![k]);
    }
}
