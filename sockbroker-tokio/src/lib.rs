//! # sockbroker-tokio
//!
//! Runs `sockbroker-core` connection engines on Tokio.
//!
//! Each accepted stream gets its own task that feeds socket reads into a
//! [`ConnectionEngine`](sockbroker_core::ConnectionEngine), writes its
//! replies, wakes it when an asynchronous auth verdict arrives and enforces
//! the connect and keep-alive timeouts.
//!
//! ## Example
//!
//! ```no_run
//! use sockbroker_tokio::{MqttServer, ServerConfig};
//! # use sockbroker_core::protocol::packets::*;
//! # use sockbroker_core::{AuthCallback, PublishSink, Session};
//! # #[derive(Clone, Default)]
//! # struct MySession;
//! # impl Session for MySession {
//! #     fn handle_connect(&mut self, _: &ConnectPacket, auth: AuthCallback) { auth.accept() }
//! #     fn handle_publish(&mut self, _: &PublishPacket) {}
//! #     fn handle_subscribe(&mut self, _: &SubscribePacket) {}
//! #     fn handle_unsubscribe(&mut self, _: &UnsubscribePacket) {}
//! #     fn handle_disconnect(&mut self, _: &DisconnectPacket) {}
//! #     fn set_publish_sink(&mut self, _: PublishSink) {}
//! #     fn client_info(&self) -> String { "Session".into() }
//! #     fn shutdown(&mut self) {}
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MqttServer::with_config(ServerConfig::default(), MySession::default as fn() -> MySession);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

// Re-export core types for convenience
pub use sockbroker_core::{
    protocol::packets::Packet, AuthCallback, ConnectionEngine, EngineConfig, PublishSink,
    Session, SessionFactory,
};

pub mod handler;
pub mod server;

pub use handler::{handle_connection, HandlerConfig};
pub use server::{MqttServer, ServerConfig, ServerError};

mod io;

#[cfg(test)]
mod test_support;
