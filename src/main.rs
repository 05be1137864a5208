//! Process driver: loads configuration from the environment, wires the
//! cache, admission controller, upstream transport, resolver, and
//! (optionally) the refresh scheduler and warmup loader together, then
//! runs the UDP and TCP listeners until ctrl-c.

use std::sync::Arc;

use resilientdns::admission::Admission;
use resilientdns::cache::DnsCache;
use resilientdns::config::{Config, RelayStartupCheck, UpstreamTransportKind};
use resilientdns::listener;
use resilientdns::metrics::Metrics;
use resilientdns::refresh;
use resilientdns::resolver::Resolver;
use resilientdns::upstream::{RelayTransport, TcpTransport, UdpTransport, UpstreamTransport};
use resilientdns::warmup;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(upstream_transport = ?config.upstream_transport, listen = %config.listen_addr(), "starting resilientdns");

    let metrics = Arc::new(Metrics::new()?);
    let cache = DnsCache::new(config.cache_max_entries, config.serve_stale_max.as_secs() as u32, metrics.clone());
    let admission = Admission::new(config.max_inflight);

    let upstream: Arc<dyn UpstreamTransport> = match config.upstream_transport {
        UpstreamTransportKind::Udp => Arc::new(UdpTransport::new(config.upstream_addr())),
        UpstreamTransportKind::Tcp => Arc::new(TcpTransport::new(
            config.upstream_addr(),
            config.tcp_pool_idle_timeout,
            config.tcp_max_response_bytes,
            metrics.clone(),
        )),
        UpstreamTransportKind::Relay => {
            let relay = Arc::new(RelayTransport::new(
                &config.relay_base_url,
                config.relay_api_version,
                config.relay_auth_token.clone(),
                config.relay_max_request_bytes,
                config.relay_per_item_max_wire_bytes,
                config.relay_max_response_bytes,
            )?);
            match relay.startup_check(config.relay_startup_check).await {
                Ok(()) => {}
                Err(e) if config.relay_startup_check == RelayStartupCheck::Require => {
                    error!(error = %e, "relay startup check failed, relay_startup_check=require");
                    return Err(Box::new(e));
                }
                Err(e) => warn!(error = %e, "relay startup check failed, continuing"),
            }
            relay as Arc<dyn UpstreamTransport>
        }
    };

    let refresh_setup = if config.refresh_enabled {
        Some(refresh::new_handle(&config, metrics.clone()))
    } else {
        None
    };
    let refresh_handle = refresh_setup.as_ref().map(|(handle, _, _)| handle.clone());

    let resolver = Arc::new(Resolver::new(config.clone(), cache, admission, upstream, metrics.clone(), refresh_handle));

    if let Some((handle, rx, inflight)) = refresh_setup {
        refresh::spawn(config.clone(), resolver.clone(), handle.clone(), rx, inflight, metrics.clone());

        if config.refresh_warmup_enabled {
            if let Some(path) = config.refresh_warmup_file.clone() {
                let stats = warmup::load(&path, &handle, config.refresh_warmup_limit).await;
                info!(submitted = stats.submitted, invalid = stats.invalid, "warmup complete");
            } else {
                warn!("refresh_warmup_enabled is set but refresh_warmup_file is empty, skipping warmup");
            }
        }
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let udp_task = tokio::spawn(listener::serve_udp(
        config.listen_addr(),
        resolver.clone(),
        config.udp_max_workers,
        shutdown_tx.subscribe(),
    ));
    let tcp_task = tokio::spawn(listener::serve_tcp(config.listen_addr(), resolver.clone(), shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, shutting down");
    let _ = shutdown_tx.send(());

    let _ = tokio::join!(udp_task, tcp_task);
    info!("resilientdns stopped");
    Ok(())
}
