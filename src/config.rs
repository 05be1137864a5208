//! The single configuration struct passed into the resolver core
//! (spec.md §6). `from_env()` overlays `RESILIENTDNS_*` environment
//! variables over sensible defaults, mirroring `DnsConfig::from_env` in
//! the teacher's `src/config.rs`; `validate()` runs at the end of it so a
//! misconfigured process fails fast at startup rather than at first query.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTransportKind {
    Udp,
    Tcp,
    Relay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStartupCheck {
    Require,
    Warn,
    Off,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Listener
    pub listen_host: IpAddr,
    pub listen_port: u16,

    // Upstream selection
    pub upstream_transport: UpstreamTransportKind,
    pub upstream_host: IpAddr,
    pub upstream_port: u16,
    pub upstream_timeout: Duration,

    // Admission
    pub max_inflight: usize,
    pub udp_max_workers: usize,

    /// A client query larger than this is dropped before any parse attempt
    /// (spec.md §7 `DroppedOversize`); EDNS0 messages comfortably fit under
    /// the default, which is well above the classic 512-byte UDP limit.
    pub max_query_bytes: usize,

    // Cache
    pub cache_max_entries: usize,
    pub min_ttl: u32,
    pub max_ttl: u32,
    pub negative_ttl: u32,
    pub serve_stale_max: Duration,

    // Refresh scheduler
    pub refresh_enabled: bool,
    pub refresh_tick: Duration,
    pub refresh_ahead: Duration,
    pub refresh_batch_size: usize,
    pub refresh_queue_max: usize,
    pub refresh_concurrency: usize,
    pub refresh_popularity_threshold: u64,
    pub refresh_popularity_decay: Duration,

    // Warmup
    pub refresh_warmup_enabled: bool,
    pub refresh_warmup_file: Option<String>,
    pub refresh_warmup_limit: usize,

    // TCP upstream pool
    pub tcp_pool_idle_timeout: Duration,
    pub tcp_max_response_bytes: usize,

    // Relay
    pub relay_base_url: String,
    pub relay_api_version: u32,
    pub relay_auth_token: String,
    pub relay_startup_check: RelayStartupCheck,
    pub relay_max_items: usize,
    pub relay_max_request_bytes: usize,
    pub relay_per_item_max_wire_bytes: usize,
    pub relay_max_response_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_host: IpAddr::from([0, 0, 0, 0]),
            listen_port: 53,

            upstream_transport: UpstreamTransportKind::Udp,
            upstream_host: IpAddr::from([1, 1, 1, 1]),
            upstream_port: 53,
            upstream_timeout: Duration::from_millis(2000),

            max_inflight: 512,
            udp_max_workers: 4,
            max_query_bytes: 4096,

            cache_max_entries: 50_000,
            min_ttl: 1,
            max_ttl: 86_400,
            negative_ttl: 300,
            serve_stale_max: Duration::from_secs(300),

            refresh_enabled: true,
            refresh_tick: Duration::from_secs(10),
            refresh_ahead: Duration::from_secs(30),
            refresh_batch_size: 100,
            refresh_queue_max: 1000,
            refresh_concurrency: 4,
            refresh_popularity_threshold: 2,
            refresh_popularity_decay: Duration::from_secs(0),

            refresh_warmup_enabled: false,
            refresh_warmup_file: None,
            refresh_warmup_limit: 1000,

            tcp_pool_idle_timeout: Duration::from_secs(30),
            tcp_max_response_bytes: 65535,

            relay_base_url: String::new(),
            relay_api_version: 1,
            relay_auth_token: String::new(),
            relay_startup_check: RelayStartupCheck::Warn,
            relay_max_items: 1,
            relay_max_request_bytes: 16 * 1024,
            relay_per_item_max_wire_bytes: 4096,
            relay_max_response_bytes: 64 * 1024,
        }
    }
}

fn env_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvParse { name, value: raw }),
        Err(_) => Ok(None),
    }
}

fn env_secs(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_var::<u64>(name)?.map(Duration::from_secs))
}

fn env_millis(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_var::<u64>(name)?.map(Duration::from_millis))
}

impl Config {
    /// Builds a `Config` starting from defaults, overlaying any recognized
    /// `RESILIENTDNS_*` environment variable, then validating the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut c = Config::default();

        if let Some(v) = env_var::<IpAddr>("RESILIENTDNS_LISTEN_HOST")? {
            c.listen_host = v;
        }
        if let Some(v) = env_var::<u16>("RESILIENTDNS_LISTEN_PORT")? {
            c.listen_port = v;
        }

        if let Ok(raw) = env::var("RESILIENTDNS_UPSTREAM_TRANSPORT") {
            c.upstream_transport = match raw.to_ascii_lowercase().as_str() {
                "udp" => UpstreamTransportKind::Udp,
                "tcp" => UpstreamTransportKind::Tcp,
                "relay" => UpstreamTransportKind::Relay,
                _ => return Err(ConfigError::UnknownTransport(raw)),
            };
        }
        if let Some(v) = env_var::<IpAddr>("RESILIENTDNS_UPSTREAM_HOST")? {
            c.upstream_host = v;
        }
        if let Some(v) = env_var::<u16>("RESILIENTDNS_UPSTREAM_PORT")? {
            c.upstream_port = v;
        }
        if let Some(v) = env_millis("RESILIENTDNS_UPSTREAM_TIMEOUT_MS")? {
            c.upstream_timeout = v;
        }

        if let Some(v) = env_var("RESILIENTDNS_MAX_INFLIGHT")? {
            c.max_inflight = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_UDP_MAX_WORKERS")? {
            c.udp_max_workers = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_MAX_QUERY_BYTES")? {
            c.max_query_bytes = v;
        }

        if let Some(v) = env_var("RESILIENTDNS_CACHE_MAX_ENTRIES")? {
            c.cache_max_entries = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_MIN_TTL")? {
            c.min_ttl = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_MAX_TTL")? {
            c.max_ttl = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_NEGATIVE_TTL")? {
            c.negative_ttl = v;
        }
        if let Some(v) = env_secs("RESILIENTDNS_SERVE_STALE_MAX_SECS")? {
            c.serve_stale_max = v;
        }

        if let Some(v) = env_var("RESILIENTDNS_REFRESH_ENABLED")? {
            c.refresh_enabled = v;
        }
        if let Some(v) = env_millis("RESILIENTDNS_REFRESH_TICK_MS")? {
            c.refresh_tick = v;
        }
        if let Some(v) = env_secs("RESILIENTDNS_REFRESH_AHEAD_SECS")? {
            c.refresh_ahead = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_REFRESH_BATCH_SIZE")? {
            c.refresh_batch_size = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_REFRESH_QUEUE_MAX")? {
            c.refresh_queue_max = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_REFRESH_CONCURRENCY")? {
            c.refresh_concurrency = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_REFRESH_POPULARITY_THRESHOLD")? {
            c.refresh_popularity_threshold = v;
        }
        if let Some(v) = env_secs("RESILIENTDNS_REFRESH_POPULARITY_DECAY_SECS")? {
            c.refresh_popularity_decay = v;
        }

        if let Some(v) = env_var("RESILIENTDNS_REFRESH_WARMUP_ENABLED")? {
            c.refresh_warmup_enabled = v;
        }
        if let Ok(v) = env::var("RESILIENTDNS_REFRESH_WARMUP_FILE") {
            c.refresh_warmup_file = Some(v);
        }
        if let Some(v) = env_var("RESILIENTDNS_REFRESH_WARMUP_LIMIT")? {
            c.refresh_warmup_limit = v;
        }

        if let Some(v) = env_secs("RESILIENTDNS_TCP_POOL_IDLE_TIMEOUT_SECS")? {
            c.tcp_pool_idle_timeout = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_TCP_MAX_RESPONSE_BYTES")? {
            c.tcp_max_response_bytes = v;
        }

        if let Ok(v) = env::var("RESILIENTDNS_RELAY_BASE_URL") {
            c.relay_base_url = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_RELAY_API_VERSION")? {
            c.relay_api_version = v;
        }
        if let Ok(v) = env::var("RESILIENTDNS_RELAY_AUTH_TOKEN") {
            c.relay_auth_token = v;
        }
        if let Ok(raw) = env::var("RESILIENTDNS_RELAY_STARTUP_CHECK") {
            c.relay_startup_check = match raw.to_ascii_lowercase().as_str() {
                "require" => RelayStartupCheck::Require,
                "warn" => RelayStartupCheck::Warn,
                "off" => RelayStartupCheck::Off,
                _ => return Err(ConfigError::UnknownStartupCheck(raw)),
            };
        }
        if let Some(v) = env_var("RESILIENTDNS_RELAY_MAX_ITEMS")? {
            c.relay_max_items = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_RELAY_MAX_REQUEST_BYTES")? {
            c.relay_max_request_bytes = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_RELAY_PER_ITEM_MAX_WIRE_BYTES")? {
            c.relay_per_item_max_wire_bytes = v;
        }
        if let Some(v) = env_var("RESILIENTDNS_RELAY_MAX_RESPONSE_BYTES")? {
            c.relay_max_response_bytes = v;
        }

        c.validate()?;
        Ok(c)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_host, self.listen_port)
    }

    pub fn upstream_addr(&self) -> SocketAddr {
        SocketAddr::new(self.upstream_host, self.upstream_port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inflight == 0 {
            return Err(ConfigError::MustBePositive { field: "max_inflight" });
        }
        if self.max_query_bytes == 0 {
            return Err(ConfigError::MustBePositive { field: "max_query_bytes" });
        }
        if self.min_ttl == 0 {
            return Err(ConfigError::MustBePositive { field: "min_ttl" });
        }
        if self.max_ttl < self.min_ttl {
            return Err(ConfigError::MustBePositive { field: "max_ttl" });
        }
        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::MustBePositive { field: "upstream_timeout" });
        }
        if self.refresh_enabled {
            if self.refresh_queue_max == 0 {
                return Err(ConfigError::MustBePositive { field: "refresh_queue_max" });
            }
            if self.refresh_concurrency == 0 {
                return Err(ConfigError::MustBePositive { field: "refresh_concurrency" });
            }
        }
        if self.upstream_transport == UpstreamTransportKind::Relay {
            if self.relay_base_url.is_empty() {
                return Err(ConfigError::InvalidRelayUrl(
                    "relay_base_url is empty".to_string(),
                ));
            }
            if self.relay_startup_check != RelayStartupCheck::Off && self.relay_auth_token.is_empty() {
                return Err(ConfigError::MissingRelayToken);
            }
        }
        Ok(())
    }
}
