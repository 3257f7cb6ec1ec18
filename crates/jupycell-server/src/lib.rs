//! jupycell notebook execution server.
//!
//! Serves numbered code cells over HTTP and executes them on kernel
//! processes.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Registry**: Owns live sessions, one per started kernel
//! - **Session**: A kernel plus its cell store, with a per-session execution lock
//! - **Protocol**: Request and response bodies
//! - **Routes**: HTTP handlers

pub mod error;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use jupycell_core::{BridgeConfig, ChannelFactory, KernelCommand, ProcessChannelFactory};

pub use error::{ServerError, ServerResult};
pub use registry::SessionRegistry;
pub use routes::{AppState, create_router};
pub use session::{Session, SessionId};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Timeouts used when talking to kernels.
    pub bridge: BridgeConfig,
    /// Kernel launch command. Discovered from the environment when unset.
    pub kernel: Option<KernelCommand>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            bridge: BridgeConfig::default(),
            kernel: None,
        }
    }
}

impl ServerConfig {
    /// Factory for the configured kernel command.
    pub fn channel_factory(&self) -> Arc<dyn ChannelFactory> {
        match &self.kernel {
            Some(command) => Arc::new(ProcessChannelFactory::new(command.clone())),
            None => Arc::new(ProcessChannelFactory::discover()),
        }
    }
}

/// Start the jupycell server with process-backed kernels.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let factory = config.channel_factory();
    serve_with_factory(config, factory).await
}

/// Start the jupycell server with a custom kernel factory.
pub async fn serve_with_factory(
    config: ServerConfig,
    factory: Arc<dyn ChannelFactory>,
) -> ServerResult<()> {
    let state = Arc::new(AppState {
        registry: SessionRegistry::new(factory, config.bridge),
    });

    let app = create_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| {
            ServerError::Validation(format!("Invalid address: {}:{}", config.host, config.port))
        })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting jupycell server at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal");
            }
        })
        .await?;

    // Kernels are child processes; don't leave them behind
    let open = state.registry.len().await;
    if open > 0 {
        tracing::info!("Closing {} open kernels", open);
    }
    state.registry.close_all().await;

    tracing::info!("Server shutdown complete");

    Ok(())
}
