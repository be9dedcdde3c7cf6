//! # Sockbroker Core
//!
//! Per-connection MQTT 3.1 / 3.1.1 broker protocol engine.
//!
//! This library turns the raw bytes of one client connection into typed
//! packets, drives the CONNECT / PUBLISH / SUBSCRIBE handshakes, and writes
//! the replies back. It owns no sockets and no timers and has no async
//! runtime dependency; see `sockbroker-tokio` for a Tokio driver.
//!
//! ## Components
//!
//! - **Tokenizer** - reassembles frames from arbitrary chunks
//! - **Codec** - decodes and encodes all fourteen control packets
//! - **Connection engine** - the per-connection state machine and QoS 0/1/2 acks
//! - **Session contract** - the broker-side collaborator, with asynchronous auth
//!
//! ## Out of scope
//!
//! - Routing, retained messages and persistence (the Session's job)
//! - MQTT 5
//! - TLS and WebSocket framing (the transport's job)

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tokenizer;
pub mod topics;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, EngineConfig};
pub use engine::{ConnectionEngine, ConnectionState};
pub use error::ConnectionError;
pub use protocol::packets::Packet;
pub use session::{AuthCallback, AuthWaker, Session, SessionFactory};
pub use tokenizer::Tokenizer;
pub use transport::{ClientLink, PublishSink, Transport};
