//! Plain UDP upstream: one ephemeral socket per query, no connection
//! reuse (spec.md §4.4.1 — pooling only applies to the TCP adapter).

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};

use crate::error::UpstreamError;

use super::UpstreamTransport;

pub struct UdpTransport {
    addr: SocketAddr,
}

impl UdpTransport {
    pub fn new(addr: SocketAddr) -> Self {
        UdpTransport { addr }
    }

    async fn resolve_inner(&self, query: &[u8]) -> Result<Vec<u8>, UpstreamError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| UpstreamError::UdpError(e.to_string()))?;
        socket
            .connect(self.addr)
            .await
            .map_err(|e| UpstreamError::UdpError(e.to_string()))?;
        socket.send(query).await.map_err(|e| UpstreamError::UdpError(e.to_string()))?;

        let expected_id = query.get(0..2).ok_or_else(|| UpstreamError::UdpError("query too short".to_string()))?;
        let mut buf = vec![0u8; 65535];
        loop {
            let n = socket.recv(&mut buf).await.map_err(|e| UpstreamError::UdpError(e.to_string()))?;
            // A spoofed or stale datagram with a mismatched transaction id
            // is ignored; the outer timeout still bounds the whole wait.
            if n >= 2 && &buf[0..2] == expected_id {
                buf.truncate(n);
                return Ok(buf);
            }
        }
    }
}

#[async_trait]
impl UpstreamTransport for UdpTransport {
    async fn resolve(&self, wire_query: &[u8], deadline: Instant) -> Result<Vec<u8>, UpstreamError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(UpstreamError::UdpTimeout);
        }
        timeout(remaining, self.resolve_inner(wire_query))
            .await
            .map_err(|_| UpstreamError::UdpTimeout)?
    }
}
