//! The resolver core (spec.md §4.6): parse, cache lookup, admission,
//! single-flighted upstream resolution, cache insert, reply. Replaces the
//! teacher's DNSSEC/zone/blocking/multi-upstream `resolver.rs` entirely —
//! none of that survives here, since zone authority, DNSSEC validation,
//! blocklisting and parallel multi-upstream racing are all explicit
//! non-goals of this forwarder.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{trace, warn};

use crate::admission::Admission;
use crate::cache::{CacheEntrySnapshot, DnsCache, Lookup};
use crate::config::Config;
use crate::error::UpstreamError;
use crate::metrics::Metrics;
use crate::refresh::RefreshHandle;
use crate::single_flight::SingleFlight;
use crate::upstream::UpstreamTransport;
use crate::wire::{CacheKey, DNSHeader, DNSMessage, DNSQuestion, RcodeClass};

type ResolveOutcome = Result<Arc<DNSMessage>, UpstreamError>;

pub struct Resolver {
    config: Config,
    cache: DnsCache,
    admission: Admission,
    upstream: Arc<dyn UpstreamTransport>,
    single_flight: SingleFlight<CacheKey, ResolveOutcome>,
    metrics: Arc<Metrics>,
    refresh: Option<RefreshHandle>,
}

impl Resolver {
    pub fn new(
        config: Config,
        cache: DnsCache,
        admission: Admission,
        upstream: Arc<dyn UpstreamTransport>,
        metrics: Arc<Metrics>,
        refresh: Option<RefreshHandle>,
    ) -> Self {
        Resolver {
            config,
            cache,
            admission,
            upstream,
            single_flight: SingleFlight::new(),
            metrics,
            refresh,
        }
    }

    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn refresh_handle(&self) -> Option<&RefreshHandle> {
        self.refresh.as_ref()
    }

    /// Handles one already-framed client query, returning the wire bytes of
    /// the reply to send back, or `None` if the query was dropped silently
    /// (malformed input gets no reply; spec.md §4.6/§7).
    pub async fn handle_query(&self, raw: &[u8]) -> Option<Vec<u8>> {
        if raw.len() > self.config.max_query_bytes {
            trace!(len = raw.len(), limit = self.config.max_query_bytes, "dropping oversize query");
            self.metrics.dropped_oversize_total.inc();
            return None;
        }
        let message = match DNSMessage::parse(raw) {
            Ok(m) => m,
            Err(e) => {
                trace!(error = %e, "dropping malformed query");
                self.metrics.dropped_malformed_total.inc();
                return None;
            }
        };
        let Some(question) = message.question.clone() else {
            self.metrics.dropped_malformed_total.inc();
            return None;
        };
        let key = CacheKey::from_question(&question);
        let client_id = message.header.id;

        match self.cache.get(&key) {
            Lookup::Fresh(snapshot) => {
                self.metrics.cache_hit_fresh_total.inc();
                self.maybe_trigger_refresh_on_fresh(&key, &snapshot);
                return Some(snapshot.message.serialize_reply(client_id, &question, snapshot.age_seconds));
            }
            Lookup::Stale(snapshot) => {
                self.metrics.cache_hit_stale_total.inc();
                self.metrics.swr_refresh_triggered_total.inc();
                self.trigger_refresh_on_stale(&key);
                return Some(snapshot.message.serialize_reply(client_id, &question, snapshot.age_seconds));
            }
            Lookup::Miss => {
                self.metrics.cache_miss_total.inc();
            }
        }

        let Some(permit) = self.admission.try_acquire() else {
            self.metrics.dropped_max_inflight_total.inc();
            self.metrics.servfail_total.inc();
            return Some(servfail_reply(client_id, &question));
        };

        let deadline = Instant::now() + self.config.upstream_timeout;
        let (outcome, coalesced) = self.resolve_and_cache(&key, raw.to_vec(), deadline).await;
        drop(permit);
        if coalesced {
            self.metrics.singleflight_dedup_total.inc();
        }

        match outcome {
            Ok(message) => Some(message.serialize_reply(client_id, &question, 0)),
            Err(e) => {
                self.record_upstream_error(&e);
                // A concurrent refresh or another waiter's successful
                // single-flighted call may have populated the entry while
                // this one was failing; serve it if so, otherwise SERVFAIL.
                match self.cache.get(&key) {
                    Lookup::Fresh(snapshot) => {
                        self.metrics.cache_hit_fresh_total.inc();
                        Some(snapshot.message.serialize_reply(client_id, &question, snapshot.age_seconds))
                    }
                    Lookup::Stale(snapshot) => {
                        self.metrics.cache_hit_stale_total.inc();
                        Some(snapshot.message.serialize_reply(client_id, &question, snapshot.age_seconds))
                    }
                    Lookup::Miss => {
                        self.metrics.servfail_total.inc();
                        Some(servfail_reply(client_id, &question))
                    }
                }
            }
        }
    }

    /// Runs a background refresh for `key`: synthesizes a fresh query,
    /// resolves it through the same admission + single-flight + upstream
    /// path as a foreground miss, and caches the result. Returns whether
    /// the refresh succeeded.
    pub async fn refresh_one(&self, key: CacheKey) -> bool {
        let Some(permit) = self.admission.try_acquire() else {
            self.metrics.dropped_max_inflight_total.inc();
            return false;
        };
        let query_bytes = synth_query(&key);
        let deadline = Instant::now() + self.config.upstream_timeout;
        let (outcome, coalesced) = self.resolve_and_cache(&key, query_bytes, deadline).await;
        drop(permit);
        if coalesced {
            self.metrics.singleflight_dedup_total.inc();
        }
        if let Err(e) = &outcome {
            self.record_upstream_error(e);
        }
        outcome.is_ok()
    }

    /// Single-flighted upstream resolve + cache insert, shared by the
    /// foreground miss path and the background refresh path so a
    /// foreground miss and a scheduled refresh for the same key coalesce
    /// into one upstream call.
    async fn resolve_and_cache(&self, key: &CacheKey, query_bytes: Vec<u8>, deadline: Instant) -> (ResolveOutcome, bool) {
        let upstream = &self.upstream;
        let cache = &self.cache;
        let config = &self.config;
        let key_for_insert = key.clone();

        self.single_flight
            .call(key.clone(), move || async move {
                match upstream.resolve(&query_bytes, deadline).await {
                    Ok(bytes) => match DNSMessage::parse(&bytes) {
                        Ok(reply) => {
                            let (ttl, rcode_class) = compute_insert_ttl(&reply, &bytes, config);
                            cache.put(key_for_insert, reply.clone(), rcode_class, ttl);
                            Ok(Arc::new(reply))
                        }
                        Err(_) => Err(UpstreamError::TcpProtocol("malformed upstream reply".to_string())),
                    },
                    Err(e) => Err(e),
                }
            })
            .await
    }

    fn maybe_trigger_refresh_on_fresh(&self, key: &CacheKey, snapshot: &CacheEntrySnapshot) {
        let Some(handle) = &self.refresh else { return };
        let remaining = snapshot.remaining_ttl_seconds();
        if remaining > 0
            && remaining <= self.config.refresh_ahead.as_secs() as u32
            && snapshot.hits >= self.config.refresh_popularity_threshold
        {
            handle.try_enqueue(key.clone());
        }
    }

    fn trigger_refresh_on_stale(&self, key: &CacheKey) {
        if let Some(handle) = &self.refresh {
            handle.try_enqueue(key.clone());
        }
    }

    fn record_upstream_error(&self, e: &UpstreamError) {
        match e {
            UpstreamError::UdpTimeout => self.metrics.upstream_udp_timeouts_total.inc(),
            UpstreamError::UdpError(_) => self.metrics.upstream_udp_errors_total.inc(),
            UpstreamError::TcpTimeout => self.metrics.upstream_tcp_timeouts_total.inc(),
            UpstreamError::TcpConnect(_) => self.metrics.upstream_tcp_connect_errors_total.inc(),
            UpstreamError::TcpProtocol(_) => self.metrics.upstream_tcp_protocol_errors_total.inc(),
            UpstreamError::RelayTimeout
            | UpstreamError::RelayUnauthorized
            | UpstreamError::RelayClientError(_)
            | UpstreamError::RelayUpstreamError
            | UpstreamError::RelayProtocolError(_)
            | UpstreamError::RelayTooLarge
            | UpstreamError::RelayRateLimited
            | UpstreamError::RelayInternalError => self.metrics.upstream_relay_errors_total.inc(),
        }
        warn!(error = %e, "upstream resolution failed");
    }
}

/// Clamps/selects the TTL to cache a reply under, per spec.md §4.1: a
/// positive reply uses the minimum answer+authority RR TTL clamped to
/// `[min_ttl, max_ttl]`; a negative reply uses the RFC 2308 SOA minimum
/// clamped by `negative_ttl`, falling back to `negative_ttl` itself if no
/// SOA is present.
fn compute_insert_ttl(message: &DNSMessage, raw: &[u8], config: &Config) -> (u32, RcodeClass) {
    let rcode_class = message.rcode_class();
    match rcode_class {
        RcodeClass::Positive => {
            let ttl = message.min_answer_authority_ttl().unwrap_or(config.min_ttl);
            (ttl.clamp(config.min_ttl, config.max_ttl), rcode_class)
        }
        RcodeClass::Negative => {
            let soa_min = message.soa_minimum_ttl(raw).unwrap_or(config.negative_ttl);
            (soa_min.min(config.negative_ttl).max(1), rcode_class)
        }
    }
}

/// Builds a minimal outgoing query for a cache key with no originating
/// client query (i.e. a background refresh), matching the shape of a
/// normal client query (`rd=true`, single question, no records).
fn synth_query(key: &CacheKey) -> Vec<u8> {
    let header = DNSHeader {
        id: 0,
        rd: true,
        qdcount: 1,
        ..Default::default()
    };
    let mut buf = Vec::new();
    header.write(&mut buf).expect("writing to a Vec never fails");
    let question = DNSQuestion {
        qname: key.qname.clone(),
        qtype: key.qtype,
        qclass: key.qclass,
    };
    question.write(&mut buf);
    buf
}

fn servfail_reply(client_id: u16, question: &DNSQuestion) -> Vec<u8> {
    let header = DNSHeader {
        id: client_id,
        qr: true,
        rd: true,
        ra: true,
        rcode: 2, // SERVFAIL
        qdcount: 1,
        ..Default::default()
    };
    let mut buf = Vec::new();
    header.write(&mut buf).expect("writing to a Vec never fails");
    question.write(&mut buf);
    buf
}
