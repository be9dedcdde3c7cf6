use log::{debug, error, info};
use sockbroker_core::{ConfigError, EngineConfig, SessionFactory};
use tokio::net::TcpListener;

use crate::handler::{handle_connection, HandlerConfig};

/// Runtime configuration for the MQTT server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (default: 0.0.0.0:1883)
    pub bind_addr: String,
    /// Protocol settings applied to every connection
    pub engine: EngineConfig,
    pub handler: HandlerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:1883".to_string(),
            engine: EngineConfig::default(),
            handler: HandlerConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ServerError {
    Config(ConfigError),
    Io(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Config(e) => write!(f, "Config error: {}", e),
            ServerError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Config(e) => Some(e),
            ServerError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError::Config(e)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Io(e)
    }
}

/// A Tokio-based MQTT server
///
/// Every accepted connection runs its own engine on its own task, with a
/// Session created from a clone of `factory`.
pub struct MqttServer<F> {
    config: ServerConfig,
    factory: F,
}

impl<F> MqttServer<F>
where
    F: SessionFactory + Clone + Send + 'static,
    F::Session: Send + 'static,
{
    /// Create a new server with default configuration
    pub fn new(factory: F) -> Self {
        Self::with_config(ServerConfig::default(), factory)
    }

    /// Create a new server with custom configuration
    pub fn with_config(config: ServerConfig, factory: F) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind to the configured address and serve until an error occurs
    pub async fn run(&self) -> Result<(), ServerError> {
        self.config.engine.validate()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.config.engine.validate()?;
        debug!(
            "Server configuration: protocol_versions={:?}, allow_anonymous={}, max_packet_bytes={}",
            self.config.engine.protocol_versions,
            self.config.engine.allow_anonymous,
            self.config.engine.max_packet_bytes
        );

        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    let peer_addr = addr.to_string();
                    info!("New connection from {}", peer_addr);
                    if let Err(e) = socket.set_nodelay(true) {
                        debug!("{}: set_nodelay failed: {}", peer_addr, e);
                    }

                    let factory = self.factory.clone();
                    let engine_config = self.config.engine.clone();
                    let handler_config = self.config.handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(
                            socket,
                            peer_addr.clone(),
                            engine_config,
                            factory,
                            &handler_config,
                        )
                        .await
                        {
                            error!("{}: client handler error: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
