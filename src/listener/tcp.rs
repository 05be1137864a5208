//! TCP listener: RFC 7766 two-byte length-prefixed framing, one spawned
//! task per accepted connection, queries on a connection handled
//! sequentially (a client may pipeline several queries over one
//! connection; replies are sent in the order queries were read).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::resolver::Resolver;

pub async fn serve(bind_addr: SocketAddr, resolver: Arc<Resolver>, mut shutdown_rx: broadcast::Receiver<()>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "tcp listener bound");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("tcp listener shutting down");
                return Ok(());
            }
            result = listener.accept() => {
                let (stream, peer) = result?;
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, resolver).await {
                        debug!(%peer, error = %e, "tcp connection closed with error");
                    }
                });
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, resolver: Arc<Resolver>) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 2];
        match stream.read_exact(&mut len_buf).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut query = vec![0u8; len];
        stream.read_exact(&mut query).await?;

        let Some(reply) = resolver.handle_query(&query).await else {
            warn!("tcp query dropped, closing connection");
            return Ok(());
        };
        let reply_len = u16::try_from(reply.len())
            .map_err(|_| std::io::Error::other("reply exceeds 65535 bytes"))?;
        stream.write_all(&reply_len.to_be_bytes()).await?;
        stream.write_all(&reply).await?;
        stream.flush().await?;
    }
}
