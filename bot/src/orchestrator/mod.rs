//! Turns interaction events into game progress and render requests.
//!
//! Every channel with a game in setup or in play is driven by its own actor
//! task. Events for a channel are processed one at a time against the
//! actor's current phase; different channels progress independently.

mod actor;
mod commands;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chess::GameStatus;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use self::actor::ChannelActor;
use self::commands::ChannelCommand;
use crate::interaction::{ChannelId, InteractionEvent};
use crate::registry::SessionRegistry;
use crate::sink::RenderSink;

const CHANNEL_QUEUE: usize = 32;

/// How long an unfinished setup waits for its next choice.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(300);

const NO_GAME: &str = "There is no chess game in this channel. Use /chess to start one.";

/// How a game came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Checkmate, stalemate or a draw on the board.
    GameOver(GameStatus),
    Resigned,
    /// The engine had no move to offer. Scored as a draw.
    EngineNoMove,
    /// The engine could not be started or failed mid-game.
    EngineFailure(String),
}

/// Outcome of one interaction event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The game advanced and was re-rendered.
    Updated,
    /// Not applicable in the current phase; dropped without a reply.
    Ignored,
    /// Refused with a message for the acting user only.
    Rejected(String),
}

#[derive(Clone)]
pub(crate) struct ChannelHandle {
    generation: u64,
    tx: mpsc::Sender<ChannelCommand>,
}

#[derive(Default)]
pub(crate) struct Channels {
    handles: Mutex<HashMap<ChannelId, ChannelHandle>>,
}

impl Channels {
    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the handle of an exiting actor unless a newer one replaced it.
    pub(crate) fn detach(&self, channel_id: ChannelId, generation: u64) {
        let mut handles = self.lock();
        if handles
            .get(&channel_id)
            .is_some_and(|h| h.generation == generation)
        {
            handles.remove(&channel_id);
        }
    }
}

/// Cheap, cloneable entry point for the platform layer.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn RenderSink>,
    channels: Arc<Channels>,
    next_generation: Arc<AtomicU64>,
    think_time: Duration,
    setup_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn RenderSink>,
        think_time: Duration,
    ) -> Self {
        Self {
            registry,
            sink,
            channels: Arc::new(Channels::default()),
            next_generation: Arc::new(AtomicU64::new(1)),
            think_time,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }

    /// Idle limit for channels still choosing difficulty and color.
    pub fn with_setup_timeout(mut self, setup_timeout: Duration) -> Self {
        self.setup_timeout = setup_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Process one interaction event.
    pub async fn handle(&self, event: InteractionEvent) -> Handled {
        let span = tracing::info_span!("channel", id = %event.channel_id);
        self.dispatch(event).instrument(span).await
    }

    async fn dispatch(&self, event: InteractionEvent) -> Handled {
        tracing::debug!(
            command = event.command.name(),
            actor = %event.actor_id,
            "Interaction received"
        );

        match self.deliver(event.clone()).await {
            Some(handled) => handled,
            None => {
                // The actor exited with the event still queued
                tracing::debug!("Channel actor exited, redelivering");
                self.deliver(event).await.unwrap_or(Handled::Ignored)
            }
        }
    }

    /// Hand `event` to its channel's actor. `None` if the actor exited
    /// before answering.
    async fn deliver(&self, event: InteractionEvent) -> Option<Handled> {
        let Some(handle) = self.channel_handle(&event) else {
            return Some(Handled::Rejected(NO_GAME.to_string()));
        };

        let (tx, rx) = oneshot::channel();
        handle
            .tx
            .send(ChannelCommand::Interaction { event, reply: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// The channel's actor, spawning one when the event may open a setup.
    fn channel_handle(&self, event: &InteractionEvent) -> Option<ChannelHandle> {
        let mut handles = self.channels.lock();
        if let Some(handle) = handles.get(&event.channel_id) {
            if !handle.tx.is_closed() {
                return Some(handle.clone());
            }
        }
        if !event.command.opens_setup() {
            return None;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CHANNEL_QUEUE);
        let actor = ChannelActor::new(
            event.channel_id,
            generation,
            self.registry.clone(),
            self.sink.clone(),
            self.channels.clone(),
            self.think_time,
            self.setup_timeout,
        );
        tokio::spawn(actor.run(rx));

        let handle = ChannelHandle { generation, tx };
        handles.insert(event.channel_id, handle.clone());
        Some(handle)
    }

    /// Channels with a game in setup or in play.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Stop every channel actor and end every game. Returns the number of
    /// channels that were stopped.
    pub async fn shutdown(&self) -> usize {
        let handles: Vec<ChannelHandle> = self.channels.lock().drain().map(|(_, h)| h).collect();
        let mut stopped = 0;
        for handle in handles {
            let (done, wait) = oneshot::channel();
            if handle.tx.send(ChannelCommand::Shutdown { done }).await.is_ok() {
                let _ = wait.await;
                stopped += 1;
            }
        }

        let leftover = self.registry.end_all().await;
        if leftover > 0 {
            tracing::warn!("Ended {} sessions without a channel actor", leftover);
        }
        tracing::info!("Stopped {} channels", stopped);
        stopped
    }
}
