//! UDP and TCP client-facing listeners, grounded on the teacher's
//! `server.rs` accept/receive loops and its `broadcast::Receiver<()>`
//! graceful shutdown signal.

mod tcp;
mod udp;

pub use tcp::serve as serve_tcp;
pub use udp::serve as serve_udp;
