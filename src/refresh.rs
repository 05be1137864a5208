//! The background refresh scheduler (spec.md §4.7): a ticker scans the
//! cache for popularity-gated near-expiry entries, a bounded queue plus a
//! fixed worker pool drains refresh jobs, and an in-flight dedup set
//! guarantees a key is never queued twice concurrently. Stale-while-
//! revalidate hits (`Resolver::handle_query`) and warmup (`warmup.rs`)
//! both enqueue through the same `RefreshHandle`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::resolver::Resolver;
use crate::wire::CacheKey;

/// Producer handle shared by the resolver (stale hits), the ticker (fresh
/// entries crossing the popularity gate), and the warmup loader.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<CacheKey>,
    inflight: Arc<DashMap<CacheKey, ()>>,
    metrics: Arc<Metrics>,
}

impl RefreshHandle {
    /// Enqueues `key` unless it is already queued or being refreshed, or
    /// the queue is full. Both cases are pre-queue `Dropped` terminal
    /// states per spec.md §4.7 and both count as `refresh_skipped_total`.
    pub fn try_enqueue(&self, key: CacheKey) {
        if self.inflight.insert(key.clone(), ()).is_some() {
            trace!(?key, "refresh already queued or in flight, skipping");
            self.metrics.refresh_skipped_total.inc();
            return;
        }
        if self.tx.try_send(key.clone()).is_err() {
            self.inflight.remove(&key);
            self.metrics.refresh_skipped_total.inc();
            debug!(?key, "refresh queue full, dropping job");
        }
    }
}

/// Builds a `RefreshHandle` plus the receiver/dedup-set pair its scheduler
/// will need. Split from `spawn` because `Resolver` holds a `RefreshHandle`
/// and the scheduler holds an `Arc<Resolver>`: the handle must exist before
/// the resolver is constructed and wrapped in `Arc`, while the ticker and
/// worker tasks that consume the receiver can only start afterward.
pub fn new_handle(config: &Config, metrics: Arc<Metrics>) -> (RefreshHandle, mpsc::Receiver<CacheKey>, Arc<DashMap<CacheKey, ()>>) {
    let (tx, rx) = mpsc::channel(config.refresh_queue_max);
    let inflight: Arc<DashMap<CacheKey, ()>> = Arc::new(DashMap::new());
    let handle = RefreshHandle {
        tx,
        inflight: inflight.clone(),
        metrics,
    };
    (handle, rx, inflight)
}

/// Spawns the ticker task and the fixed worker pool against an
/// already-constructed `RefreshHandle`. The scheduler itself is never
/// stopped explicitly; its tasks are detached and end with the process.
pub fn spawn(
    config: Config,
    resolver: Arc<Resolver>,
    handle: RefreshHandle,
    rx: mpsc::Receiver<CacheKey>,
    inflight: Arc<DashMap<CacheKey, ()>>,
    metrics: Arc<Metrics>,
) {
    spawn_ticker(config.clone(), resolver.clone(), handle);
    spawn_workers(config, resolver, rx, inflight, metrics);
}

fn spawn_ticker(config: Config, resolver: Arc<Resolver>, handle: RefreshHandle) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.refresh_tick);
        loop {
            ticker.tick().await;
            let candidates = resolver.cache().refresh_candidates(
                config.refresh_ahead.as_secs() as u32,
                config.refresh_popularity_threshold,
                config.refresh_popularity_decay.as_secs() as u32,
            );
            let batch = candidates.len().min(config.refresh_batch_size);
            if candidates.len() > config.refresh_batch_size {
                trace!(
                    eligible = candidates.len(),
                    batch_size = config.refresh_batch_size,
                    "refresh tick exceeds batch size, remainder waits for the next tick"
                );
            }
            for key in candidates.into_iter().take(batch) {
                handle.try_enqueue(key);
            }
        }
    });
}

fn spawn_workers(
    config: Config,
    resolver: Arc<Resolver>,
    rx: mpsc::Receiver<CacheKey>,
    inflight: Arc<DashMap<CacheKey, ()>>,
    metrics: Arc<Metrics>,
) {
    let rx = Arc::new(Mutex::new(rx));
    for worker_id in 0..config.refresh_concurrency {
        let rx = rx.clone();
        let resolver = resolver.clone();
        let inflight = inflight.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            loop {
                let key = {
                    let mut rx = rx.lock().await;
                    match rx.recv().await {
                        Some(key) => key,
                        None => return, // sender dropped, scheduler shutting down
                    }
                };
                let ok = resolver.refresh_one(key.clone()).await;
                inflight.remove(&key);
                if ok {
                    metrics.refresh_success_total.inc();
                } else {
                    metrics.refresh_fail_total.inc();
                }
                trace!(worker_id, ?key, success = ok, "refresh job complete");
            }
        });
    }
}
