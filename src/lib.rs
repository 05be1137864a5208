//! ResilientDNS: a LAN-facing DNS cache and forwarder (spec.md). This
//! crate exposes the building blocks `main.rs` wires together; it binds
//! no listeners and spawns no background tasks on its own.

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod refresh;
pub mod resolver;
pub mod single_flight;
pub mod upstream;
pub mod warmup;
pub mod wire;
