//! Prometheus counters/gauge exposed read-only to the external metrics
//! collaborator (spec.md §1/§7): a `prometheus::Registry`-backed struct
//! matching the teacher's `DnsMetrics` shape (`src/metrics.rs`), scoped to
//! exactly the names spec.md enumerates. No HTTP exporter is bound inside
//! this crate — `gather()` returns the Prometheus text exposition format
//! for an external endpoint to serve.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder, opts};

pub struct Metrics {
    registry: Registry,

    pub cache_hit_fresh_total: IntCounter,
    pub cache_hit_stale_total: IntCounter,
    pub cache_miss_total: IntCounter,
    pub evictions_total: IntCounter,
    pub cache_clears_total: IntCounter,
    pub cache_entries: IntGauge,

    pub singleflight_dedup_total: IntCounter,

    pub dropped_max_inflight_total: IntCounter,
    pub dropped_malformed_total: IntCounter,
    pub dropped_oversize_total: IntCounter,

    pub upstream_udp_timeouts_total: IntCounter,
    pub upstream_udp_errors_total: IntCounter,
    pub upstream_tcp_timeouts_total: IntCounter,
    pub upstream_tcp_connect_errors_total: IntCounter,
    pub upstream_tcp_protocol_errors_total: IntCounter,
    pub upstream_tcp_reuses_total: IntCounter,
    pub upstream_relay_errors_total: IntCounter,

    pub swr_refresh_triggered_total: IntCounter,
    pub refresh_success_total: IntCounter,
    pub refresh_fail_total: IntCounter,
    pub refresh_skipped_total: IntCounter,

    pub servfail_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = IntCounter::with_opts(opts!($name, $help))?;
                registry.register(Box::new(c.clone()))?;
                c
            }};
        }
        macro_rules! gauge {
            ($name:literal, $help:literal) => {{
                let g = IntGauge::with_opts(opts!($name, $help))?;
                registry.register(Box::new(g.clone()))?;
                g
            }};
        }

        Ok(Metrics {
            cache_hit_fresh_total: counter!("resilientdns_cache_hit_fresh_total", "Fresh cache hits"),
            cache_hit_stale_total: counter!("resilientdns_cache_hit_stale_total", "Stale cache hits (serve-stale/SWR)"),
            cache_miss_total: counter!("resilientdns_cache_miss_total", "Cache misses"),
            evictions_total: counter!("resilientdns_evictions_total", "Cache entries evicted"),
            cache_clears_total: counter!("resilientdns_cache_clears_total", "Explicit cache clears"),
            cache_entries: gauge!("resilientdns_cache_entries", "Current number of cache entries"),

            singleflight_dedup_total: counter!(
                "resilientdns_singleflight_dedup_total",
                "Queries coalesced onto an in-flight SingleFlight call"
            ),

            dropped_max_inflight_total: counter!(
                "resilientdns_dropped_max_inflight_total",
                "Queries dropped because admission was saturated"
            ),
            dropped_malformed_total: counter!(
                "resilientdns_dropped_malformed_total",
                "Queries dropped for failing to parse"
            ),
            dropped_oversize_total: counter!(
                "resilientdns_dropped_oversize_total",
                "Messages dropped for exceeding a size guard"
            ),

            upstream_udp_timeouts_total: counter!("resilientdns_upstream_udp_timeouts_total", "UDP upstream timeouts"),
            upstream_udp_errors_total: counter!("resilientdns_upstream_udp_errors_total", "UDP upstream I/O errors"),
            upstream_tcp_timeouts_total: counter!("resilientdns_upstream_tcp_timeouts_total", "TCP upstream timeouts"),
            upstream_tcp_connect_errors_total: counter!(
                "resilientdns_upstream_tcp_connect_errors_total",
                "TCP upstream connect failures"
            ),
            upstream_tcp_protocol_errors_total: counter!(
                "resilientdns_upstream_tcp_protocol_errors_total",
                "TCP upstream framing/protocol errors"
            ),
            upstream_tcp_reuses_total: counter!(
                "resilientdns_upstream_tcp_reuses_total",
                "TCP upstream connections served from the pool"
            ),
            upstream_relay_errors_total: counter!(
                "resilientdns_upstream_relay_errors_total",
                "Relay upstream errors of any kind"
            ),

            swr_refresh_triggered_total: counter!(
                "resilientdns_swr_refresh_triggered_total",
                "Stale-while-revalidate refreshes triggered by a foreground hit"
            ),
            refresh_success_total: counter!("resilientdns_refresh_success_total", "Background refresh successes"),
            refresh_fail_total: counter!("resilientdns_refresh_fail_total", "Background refresh failures"),
            refresh_skipped_total: counter!(
                "resilientdns_refresh_skipped_total",
                "Refresh jobs dropped before attempt (queue full or already in-flight)"
            ),

            servfail_total: counter!("resilientdns_servfail_total", "Client-visible SERVFAIL responses"),
        })
    }

    /// Prometheus text exposition format, for an external HTTP endpoint to
    /// serve; this crate does not bind one itself.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
