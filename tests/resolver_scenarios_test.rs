//! Black-box scenarios from spec.md §8 (S1-S4), exercised through a real
//! `Resolver` talking to a loopback fake upstream over the actual
//! `UdpTransport`, not a stub `UpstreamTransport` impl.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use resilientdns::admission::Admission;
use resilientdns::cache::{DnsCache, Lookup};
use resilientdns::config::Config;
use resilientdns::metrics::Metrics;
use resilientdns::resolver::Resolver;
use resilientdns::upstream::UdpTransport;
use resilientdns::wire::{CacheKey, DNSMessage, DNSResourceClass, DNSResourceType, RcodeClass};
use tokio::net::UdpSocket;

/// Starts a fake upstream UDP nameserver on loopback that always answers
/// the given `qname` with an A record of `ttl` seconds, counting how many
/// queries it has received. Returns its address and the shared counter.
async fn spawn_fake_upstream_a(qname: &'static str, ttl: u32, addr_octets: [u8; 4]) -> (SocketAddr, Arc<AtomicUsize>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (n, src) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            calls2.fetch_add(1, Ordering::SeqCst);
            let reply = common::build_a_reply(&buf[..n], qname, ttl, addr_octets);
            let _ = socket.send_to(&reply, src).await;
        }
    });

    (addr, calls)
}

/// Starts a fake upstream that answers every query with NXDOMAIN plus an
/// authority-section SOA record carrying `soa_minimum` as its MINIMUM
/// field, for RFC 2308 negative-TTL scenarios.
async fn spawn_fake_upstream_nxdomain(soa_minimum: u32) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (n, src) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let query = buf[..n].to_vec();
            let reply = common::build_nxdomain_reply(&query, "gone.example", soa_minimum);
            let _ = socket.send_to(&reply, src).await;
        }
    });
    addr
}

/// A fake upstream that never replies, for timeout scenarios.
async fn spawn_silent_upstream() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            if socket.recv_from(&mut buf).await.is_err() {
                return;
            }
            // never reply
        }
    });
    addr
}

/// A fake upstream that waits for a signal before answering, for the
/// admission fail-fast scenario (S4).
async fn spawn_gated_upstream(qname: &'static str, ttl: u32, gate: Duration) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (n, src) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let query = buf[..n].to_vec();
            tokio::time::sleep(gate).await;
            let reply = common::build_a_reply(&query, qname, ttl, [10, 0, 0, 1]);
            let _ = socket.send_to(&reply, src).await;
        }
    });
    addr
}

fn resolver_with_upstream(upstream_addr: SocketAddr, cfg: impl FnOnce(&mut Config)) -> Resolver {
    let mut config = Config {
        upstream_host: upstream_addr.ip(),
        upstream_port: upstream_addr.port(),
        upstream_timeout: Duration::from_millis(500),
        refresh_enabled: false,
        ..Config::default()
    };
    cfg(&mut config);
    let metrics = Arc::new(Metrics::new().unwrap());
    let cache = DnsCache::new(config.cache_max_entries, config.serve_stale_max.as_secs() as u32, metrics.clone());
    let admission = Admission::new(config.max_inflight);
    let upstream = Arc::new(UdpTransport::new(upstream_addr));
    Resolver::new(config, cache, admission, upstream, metrics, None)
}

#[tokio::test]
async fn s1_fresh_hit_serves_from_cache_without_a_second_upstream_call() {
    let (upstream_addr, calls) = spawn_fake_upstream_a("example.com", 300, [93, 184, 216, 34]).await;
    let resolver = resolver_with_upstream(upstream_addr, |_| {});

    let query = common::build_query(0x1111, "example.com", DNSResourceType::A);
    let reply1 = resolver.handle_query(&query).await.expect("reply");
    let parsed1 = DNSMessage::parse(&reply1).unwrap();
    assert_eq!(parsed1.header.id, 0x1111);
    assert_eq!(parsed1.records[0].ttl, 300);

    let query2 = common::build_query(0x2222, "example.com", DNSResourceType::A);
    let reply2 = resolver.handle_query(&query2).await.expect("reply");
    let parsed2 = DNSMessage::parse(&reply2).unwrap();
    assert_eq!(parsed2.header.id, 0x2222);
    // TTL stays <= 300 and fresh, client id rewritten.
    assert!(parsed2.records[0].ttl <= 300);

    assert_eq!(calls.load(Ordering::SeqCst), 1, "second query must be a cache hit, not a new upstream call");
}

#[tokio::test]
async fn s2_stale_entry_is_served_immediately_past_ttl_expiry() {
    let (upstream_addr, calls) = spawn_fake_upstream_a("stale.example", 1, [1, 2, 3, 4]).await;
    let resolver = resolver_with_upstream(upstream_addr, |c| {
        c.serve_stale_max = Duration::from_secs(30);
    });

    let query = common::build_query(0xAAAA, "stale.example", DNSResourceType::A);
    resolver.handle_query(&query).await.expect("first reply populates cache");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Let the 1s TTL lapse; the entry is now stale but within serve_stale_max.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let key = CacheKey::new("stale.example", DNSResourceType::A, DNSResourceClass::IN);
    match resolver.cache().get(&key) {
        Lookup::Stale(_) => {}
        other => panic!("expected stale lookup, got {other:?}"),
    }

    let query2 = common::build_query(0xBBBB, "stale.example", DNSResourceType::A);
    let reply = resolver.handle_query(&query2).await.expect("stale reply served immediately");
    let parsed = DNSMessage::parse(&reply).unwrap();
    assert_eq!(parsed.header.id, 0xBBBB);
    assert_eq!(parsed.records[0].ttl, 1, "remaining TTL is floored to 1 second");
}

#[tokio::test]
async fn negative_reply_is_cached_with_soa_minimum_ttl_clamped_by_negative_ttl() {
    // soa_minimum (20) is below the configured negative_ttl (50): the
    // cached TTL must take the SOA minimum, not the configured ceiling.
    let upstream_addr = spawn_fake_upstream_nxdomain(20).await;
    let resolver = resolver_with_upstream(upstream_addr, |c| {
        c.negative_ttl = 50;
    });

    let query = common::build_query(0x9001, "gone.example", DNSResourceType::A);
    resolver.handle_query(&query).await.expect("NXDOMAIN is still a reply");

    let key = CacheKey::new("gone.example", DNSResourceType::A, DNSResourceClass::IN);
    match resolver.cache().get(&key) {
        Lookup::Fresh(snapshot) => {
            assert_eq!(snapshot.rcode_class, RcodeClass::Negative);
            assert_eq!(snapshot.ttl_seconds, 20, "cached TTL must be the SOA minimum, below negative_ttl");
        }
        other => panic!("expected a cached negative entry, got {other:?}"),
    }
}

#[tokio::test]
async fn negative_reply_ttl_is_clamped_to_configured_negative_ttl_ceiling() {
    // soa_minimum (500) exceeds the configured negative_ttl (50): the
    // cached TTL must be clamped down to negative_ttl.
    let upstream_addr = spawn_fake_upstream_nxdomain(500).await;
    let resolver = resolver_with_upstream(upstream_addr, |c| {
        c.negative_ttl = 50;
    });

    let query = common::build_query(0x9002, "gone.example", DNSResourceType::A);
    resolver.handle_query(&query).await.expect("NXDOMAIN is still a reply");

    let key = CacheKey::new("gone.example", DNSResourceType::A, DNSResourceClass::IN);
    match resolver.cache().get(&key) {
        Lookup::Fresh(snapshot) => {
            assert_eq!(snapshot.rcode_class, RcodeClass::Negative);
            assert_eq!(snapshot.ttl_seconds, 50, "cached TTL must be clamped down to negative_ttl");
        }
        other => panic!("expected a cached negative entry, got {other:?}"),
    }
}

#[tokio::test]
async fn s3_upstream_timeout_with_no_stale_fallback_yields_servfail() {
    let upstream_addr = spawn_silent_upstream().await;
    let resolver = resolver_with_upstream(upstream_addr, |c| {
        c.upstream_timeout = Duration::from_millis(150);
    });

    let query = common::build_query(0x3333, "new.example", DNSResourceType::A);
    let reply = resolver.handle_query(&query).await.expect("SERVFAIL is still a reply");
    let parsed = DNSMessage::parse(&reply).unwrap();
    assert_eq!(parsed.header.rcode, 2, "SERVFAIL");

    let key = CacheKey::new("new.example", DNSResourceType::A, DNSResourceClass::IN);
    assert_eq!(resolver.cache().get(&key), Lookup::Miss, "a failed upstream call must not populate the cache");
}

#[tokio::test]
async fn s4_admission_saturation_drops_the_overflow_query_fast() {
    let upstream_addr = spawn_gated_upstream("gated.example", 300, Duration::from_millis(400)).await;
    let resolver = Arc::new(resolver_with_upstream(upstream_addr, |c| {
        c.max_inflight = 2;
        c.upstream_timeout = Duration::from_secs(2);
    }));

    let q1 = common::build_query(1, "one.gated.example", DNSResourceType::A);
    let q2 = common::build_query(2, "two.gated.example", DNSResourceType::A);
    let q3 = common::build_query(3, "three.gated.example", DNSResourceType::A);

    let r1 = resolver.clone();
    let r2 = resolver.clone();
    let h1 = tokio::spawn(async move { r1.handle_query(&q1).await });
    let h2 = tokio::spawn(async move { r2.handle_query(&q2).await });

    // Give the first two a moment to acquire their admission permits
    // before firing the third, so it observes a saturated semaphore.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = tokio::time::Instant::now();
    let reply3 = resolver.handle_query(&q3).await.expect("admission-dropped query still gets SERVFAIL");
    let elapsed = start.elapsed();
    let parsed3 = DNSMessage::parse(&reply3).unwrap();
    assert_eq!(parsed3.header.rcode, 2, "SERVFAIL from admission fail-fast");
    assert!(elapsed < Duration::from_millis(200), "admission drop must not wait on upstream, took {elapsed:?}");

    h1.await.unwrap().unwrap();
    h2.await.unwrap().unwrap();
}
