//! Error taxonomy. One `thiserror`-derived enum per concern composed into
//! a crate-level `Error` via `#[from]`, matching the teacher's
//! `HeimdallError` composition (`src/heimdall_error.rs`) rather than the
//! hand-rolled `Display` impls this file used to carry.

use thiserror::Error;

use crate::wire::WireError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid listen address: {0}")]
    InvalidListenAddress(String),
    #[error("invalid upstream address: {0}")]
    InvalidUpstreamAddress(String),
    #[error("invalid relay base url: {0}")]
    InvalidRelayUrl(String),
    #[error("relay transport selected but relay_auth_token is empty")]
    MissingRelayToken,
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },
    #[error("unknown upstream_transport value: {0}")]
    UnknownTransport(String),
    #[error("unknown relay_startup_check value: {0}")]
    UnknownStartupCheck(String),
    #[error("failed to parse env var {name}: {value}")]
    EnvParse { name: &'static str, value: String },
}

/// Errors surfaced by an upstream transport's `resolve` call. Each variant
/// is a client-invisible internal kind (spec.md §7): the resolver maps
/// every one of them to either serve-stale or SERVFAIL, never retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("udp upstream timed out")]
    UdpTimeout,
    #[error("udp upstream io error: {0}")]
    UdpError(String),

    #[error("tcp upstream timed out")]
    TcpTimeout,
    #[error("tcp upstream connect failed: {0}")]
    TcpConnect(String),
    #[error("tcp upstream protocol error: {0}")]
    TcpProtocol(String),

    #[error("relay upstream timed out")]
    RelayTimeout,
    #[error("relay upstream rejected credentials")]
    RelayUnauthorized,
    #[error("relay client error: {0}")]
    RelayClientError(String),
    #[error("relay upstream error")]
    RelayUpstreamError,
    #[error("relay protocol error: {0}")]
    RelayProtocolError(String),
    #[error("relay response too large")]
    RelayTooLarge,
    #[error("relay rate limited")]
    RelayRateLimited,
    #[error("relay internal error")]
    RelayInternalError,
}

/// Drop reasons: the query never reaches an upstream transport at all.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    #[error("admission semaphore saturated")]
    MaxInflight,
    #[error("malformed query")]
    Malformed,
    #[error("oversize message")]
    Oversize,
    #[error("dropped by policy")]
    Policy,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("dropped: {0}")]
    Dropped(DropReason),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
