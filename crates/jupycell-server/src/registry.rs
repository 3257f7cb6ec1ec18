//! Process-wide registry of kernel sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jupycell_core::{BridgeConfig, ChannelFactory, Kernel};
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use crate::error::{ServerError, ServerResult};
use crate::session::{Session, SessionId};

/// Owns every live session and starts new ones.
pub struct SessionRegistry {
    sessions: RwLock<FxHashMap<SessionId, Arc<Session>>>,
    factory: Arc<dyn ChannelFactory>,
    bridge: BridgeConfig,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn ChannelFactory>, bridge: BridgeConfig) -> Self {
        Self {
            sessions: RwLock::new(FxHashMap::default()),
            factory,
            bridge,
            next_id: AtomicU64::new(1),
        }
    }

    /// Start a kernel and register a session for it.
    ///
    /// Nothing is registered if the kernel fails to start.
    pub async fn create(&self) -> ServerResult<SessionId> {
        let factory = self.factory.clone();
        let channel = tokio::task::spawn_blocking(move || factory.start())
            .await
            .map_err(|e| ServerError::Internal(format!("Kernel start task failed: {}", e)))??;

        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session::new(id, Kernel::new(channel, self.bridge)));
        self.sessions.write().await.insert(id, session);

        tracing::info!("Started session {}", id);
        Ok(id)
    }

    /// Find a session.
    pub async fn lookup(&self, id: SessionId) -> ServerResult<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ServerError::KernelNotFound(id))
    }

    /// Remove a session and shut its kernel down.
    pub async fn close(&self, id: SessionId) -> ServerResult<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(ServerError::KernelNotFound(id))?;
        session.close().await
    }

    /// Close every session.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in sessions {
            if let Err(e) = session.close().await {
                tracing::warn!("Failed to close session {}: {}", session.id(), e);
            }
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
