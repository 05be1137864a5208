//! UDP listener: one `recv_from` loop, one spawned task per datagram,
//! bounded by `udp_max_workers` so an incoming burst cannot spawn
//! unboundedly many tasks (separate from the resolver's own admission
//! controller, which bounds concurrent upstream resolutions rather than
//! concurrent listener-side processing).

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{Semaphore, broadcast};
use tracing::{error, info, warn};

use crate::resolver::Resolver;

pub async fn serve(
    bind_addr: std::net::SocketAddr,
    resolver: Arc<Resolver>,
    max_workers: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    info!(%bind_addr, "udp listener bound");
    let worker_limiter = Arc::new(Semaphore::new(max_workers.max(1)));

    let mut buf = vec![0u8; 65535];
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("udp listener shutting down");
                return Ok(());
            }
            result = socket.recv_from(&mut buf) => {
                let (n, src) = result?;
                let query = buf[..n].to_vec();
                let permit = match worker_limiter.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        warn!(%src, "udp listener saturated, dropping datagram");
                        continue;
                    }
                };

                let resolver = resolver.clone();
                let socket = socket.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Some(reply) = resolver.handle_query(&query).await {
                        if let Err(e) = socket.send_to(&reply, src).await {
                            error!(%src, error = %e, "failed to send udp reply");
                        }
                    }
                });
            }
        }
    }
}
