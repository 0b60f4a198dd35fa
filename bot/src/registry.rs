//! Channel to active game mapping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chess::GameSession;
use engine::MoveEngine;
use tokio::sync::RwLock;

use crate::interaction::ChannelId;

/// Builds the engine that a new game in a channel will own.
pub type EngineFactory = Box<dyn Fn(ChannelId) -> Arc<dyn MoveEngine> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("A game is already running in channel {0}")]
    SessionAlreadyActive(ChannelId),
    #[error("No game is running in channel {0}")]
    SessionNotFound(ChannelId),
}

/// A channel's game together with the engine process it exclusively owns.
pub struct ActiveSession {
    channel_id: ChannelId,
    session: Mutex<GameSession>,
    engine: Arc<dyn MoveEngine>,
}

impl ActiveSession {
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Lock the game. Never hold the guard across an await.
    pub fn session(&self) -> MutexGuard<'_, GameSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> GameSession {
        self.session().clone()
    }

    pub fn engine(&self) -> &Arc<dyn MoveEngine> {
        &self.engine
    }
}

/// At most one game per channel. Entries only leave through
/// [`SessionRegistry::end_session`], which stops the engine first.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ChannelId, Arc<ActiveSession>>>,
    engine_factory: EngineFactory,
}

impl SessionRegistry {
    pub fn new(engine_factory: EngineFactory) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine_factory,
        }
    }

    /// Register a fresh game for `channel_id` with its own, not yet
    /// started, engine.
    pub async fn create_session(
        &self,
        channel_id: ChannelId,
    ) -> Result<Arc<ActiveSession>, RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&channel_id) {
            return Err(RegistryError::SessionAlreadyActive(channel_id));
        }

        let entry = Arc::new(ActiveSession {
            channel_id,
            session: Mutex::new(GameSession::new()),
            engine: (self.engine_factory)(channel_id),
        });
        sessions.insert(channel_id, entry.clone());
        tracing::info!(channel = %channel_id, active = sessions.len(), "Session created");
        Ok(entry)
    }

    pub async fn get_session(&self, channel_id: ChannelId) -> Option<Arc<ActiveSession>> {
        self.sessions.read().await.get(&channel_id).cloned()
    }

    /// Terminate the channel's engine, then drop the entry.
    pub async fn end_session(&self, channel_id: ChannelId) -> Result<(), RegistryError> {
        let entry = self
            .get_session(channel_id)
            .await
            .ok_or(RegistryError::SessionNotFound(channel_id))?;

        entry.engine.terminate().await;

        let mut sessions = self.sessions.write().await;
        if let Some(current) = sessions.get(&channel_id) {
            if Arc::ptr_eq(current, &entry) {
                sessions.remove(&channel_id);
            }
        }
        tracing::info!(channel = %channel_id, active = sessions.len(), "Session ended");
        Ok(())
    }

    /// End every game. Returns how many were ended.
    pub async fn end_all(&self) -> usize {
        let channels: Vec<ChannelId> = self.sessions.read().await.keys().copied().collect();
        let mut ended = 0;
        for channel_id in channels {
            if self.end_session(channel_id).await.is_ok() {
                ended += 1;
            }
        }
        ended
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
