//! Upstream transport adapters. Every adapter implements the same
//! `resolve(wire_query, deadline) -> Result<wire_reply, UpstreamError>`
//! contract so the resolver core is agnostic to which one is configured
//! (spec.md §4.4); only one transport is active in a given process, chosen
//! by `Config::upstream_transport`.

mod relay;
mod tcp;
mod udp;

pub use relay::RelayTransport;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::UpstreamError;

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Resolves one already-encoded DNS query, returning the raw reply
    /// bytes on success. `deadline` bounds the whole attempt; transports
    /// never retry internally, matching spec.md's no-retry invariant.
    async fn resolve(&self, wire_query: &[u8], deadline: Instant) -> Result<Vec<u8>, UpstreamError>;
}
