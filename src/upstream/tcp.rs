//! RFC 7766 DNS-over-TCP upstream with connection pooling, grounded on the
//! teacher's `ConnectionManager` (`src/protocol/connection_manager.rs`):
//! a `DashMap`-backed free list plus an idle-reaper task, simplified here
//! to a single upstream address and bare `TcpStream`s instead of a generic
//! connection-state trait.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tracing::{debug, trace};

use crate::error::UpstreamError;
use crate::metrics::Metrics;

use super::UpstreamTransport;

struct PooledConn {
    stream: TcpStream,
    idle_since: Instant,
}

pub struct TcpTransport {
    addr: SocketAddr,
    pool: Arc<DashMap<SocketAddr, Mutex<VecDeque<PooledConn>>>>,
    max_response_bytes: usize,
    metrics: Arc<Metrics>,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr, idle_timeout: Duration, max_response_bytes: usize, metrics: Arc<Metrics>) -> Self {
        let pool: Arc<DashMap<SocketAddr, Mutex<VecDeque<PooledConn>>>> = Arc::new(DashMap::new());

        let reaper_pool = pool.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle_timeout.max(Duration::from_secs(1)));
            loop {
                ticker.tick().await;
                let now = Instant::now();
                for entry in reaper_pool.iter() {
                    let mut conns = entry.value().lock();
                    let before = conns.len();
                    conns.retain(|c| now.duration_since(c.idle_since) < idle_timeout);
                    if conns.len() != before {
                        trace!(reaped = before - conns.len(), "tcp upstream idle connections reaped");
                    }
                }
            }
        });

        TcpTransport {
            addr,
            pool,
            max_response_bytes,
            metrics,
        }
    }

    fn take_conn(&self) -> Option<TcpStream> {
        let list = self.pool.get(&self.addr)?;
        list.lock().pop_back().map(|c| c.stream)
    }

    fn return_conn(&self, stream: TcpStream) {
        let list = self.pool.entry(self.addr).or_insert_with(|| Mutex::new(VecDeque::new()));
        list.lock().push_back(PooledConn {
            stream,
            idle_since: Instant::now(),
        });
    }

    async fn resolve_inner(&self, query: &[u8]) -> Result<Vec<u8>, UpstreamError> {
        let (mut stream, reused) = match self.take_conn() {
            Some(s) => (s, true),
            None => (
                TcpStream::connect(self.addr)
                    .await
                    .map_err(|e| UpstreamError::TcpConnect(e.to_string()))?,
                false,
            ),
        };

        let frame_result: Result<(), std::io::Error> = async {
            let len = u16::try_from(query.len()).map_err(|_| std::io::Error::other("query exceeds 65535 bytes"))?;
            stream.write_all(&len.to_be_bytes()).await?;
            stream.write_all(query).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = frame_result {
            // A reused connection that failed mid-write is not returned to
            // the pool; a fresh connect attempt happens on the next call.
            return Err(UpstreamError::TcpProtocol(e.to_string()));
        }

        let mut len_buf = [0u8; 2];
        if let Err(e) = stream.read_exact(&mut len_buf).await {
            return Err(UpstreamError::TcpProtocol(e.to_string()));
        }
        let resp_len = u16::from_be_bytes(len_buf) as usize;
        if resp_len > self.max_response_bytes {
            return Err(UpstreamError::TcpProtocol("response exceeds tcp_max_response_bytes".to_string()));
        }
        let mut buf = vec![0u8; resp_len];
        if let Err(e) = stream.read_exact(&mut buf).await {
            return Err(UpstreamError::TcpProtocol(e.to_string()));
        }

        if reused {
            self.metrics.upstream_tcp_reuses_total.inc();
        }
        debug!(reused, "tcp upstream round trip complete");
        self.return_conn(stream);
        Ok(buf)
    }
}

#[async_trait]
impl UpstreamTransport for TcpTransport {
    async fn resolve(&self, wire_query: &[u8], deadline: Instant) -> Result<Vec<u8>, UpstreamError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(UpstreamError::TcpTimeout);
        }
        timeout(remaining, self.resolve_inner(wire_query))
            .await
            .map_err(|_| UpstreamError::TcpTimeout)?
    }
}
