use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chess::{AppliedMove, GameSession, PieceColor, SessionError, StrengthLevel};
use cozy_chess::{Move, Square};
use engine::{EngineError, SearchRequest};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;

use super::commands::ChannelCommand;
use super::{Channels, EndReason, Handled};
use crate::interaction::{ChannelId, Command, InteractionEvent, MessageId, UserId};
use crate::registry::{ActiveSession, SessionRegistry};
use crate::render::RenderRequest;
use crate::sink::RenderSink;

type SearchResult = Result<Option<Move>, EngineError>;
type Pending<T> = Pin<Box<dyn Future<Output = T> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    NoSelection,
    PieceSelected(Square),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    AwaitingConfig,
    /// Configured; the engine handshake is in flight.
    StartingEngine,
    AwaitingPlayerMove(Selection),
    AwaitingEngineMove,
    Ended,
}

/// State owned by one channel's actor task.
pub(crate) struct ChannelActor {
    channel_id: ChannelId,
    generation: u64,
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn RenderSink>,
    channels: Arc<Channels>,
    think_time: Duration,
    setup_timeout: Duration,

    phase: Phase,
    setup_deadline: Instant,
    strength: Option<StrengthLevel>,
    color: Option<PieceColor>,
    owner: Option<UserId>,
    entry: Option<Arc<ActiveSession>>,
    message_id: Option<MessageId>,
    starting: Option<Pending<Result<(), EngineError>>>,
    search: Option<Pending<SearchResult>>,
    last_quip: Option<usize>,
}

impl ChannelActor {
    pub(crate) fn new(
        channel_id: ChannelId,
        generation: u64,
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn RenderSink>,
        channels: Arc<Channels>,
        think_time: Duration,
        setup_timeout: Duration,
    ) -> Self {
        Self {
            channel_id,
            generation,
            registry,
            sink,
            channels,
            think_time,
            setup_timeout,
            phase: Phase::AwaitingConfig,
            setup_deadline: Instant::now() + setup_timeout,
            strength: None,
            color: None,
            owner: None,
            entry: None,
            message_id: None,
            starting: None,
            search: None,
            last_quip: None,
        }
    }

    pub(crate) async fn run(self, rx: mpsc::Receiver<ChannelCommand>) {
        let span = tracing::info_span!("channel", id = %self.channel_id);
        self.run_inner(rx).instrument(span).await
    }

    async fn run_inner(mut self, mut rx: mpsc::Receiver<ChannelCommand>) {
        tracing::debug!("Channel actor started");

        loop {
            tokio::select! {
                biased;

                cmd = rx.recv() => {
                    match cmd {
                        Some(ChannelCommand::Interaction { event, reply }) => {
                            let handled = self.on_interaction(event).await;
                            match self.phase {
                                Phase::AwaitingConfig => {
                                    self.setup_deadline = Instant::now() + self.setup_timeout;
                                }
                                Phase::Ended => self.detach(),
                                _ => {}
                            }
                            let _ = reply.send(handled);
                        }
                        Some(ChannelCommand::Shutdown { done }) => {
                            self.stop().await;
                            let _ = done.send(());
                            break;
                        }
                        None => {
                            self.stop().await;
                            break;
                        }
                    }
                }

                result = next_pending(&mut self.starting) => {
                    self.on_engine_started(result).await;
                }

                result = next_pending(&mut self.search) => {
                    self.on_engine_reply(result).await;
                }

                _ = tokio::time::sleep_until(self.setup_deadline), if self.phase == Phase::AwaitingConfig => {
                    self.expire_setup().await;
                }
            }

            if self.phase == Phase::Ended {
                self.detach();
                break;
            }
        }

        tracing::debug!("Channel actor exited");
    }

    async fn on_interaction(&mut self, event: InteractionEvent) -> Handled {
        if let Some(owner) = self.owner {
            if event.actor_id != owner {
                return Handled::Rejected("This game belongs to another player.".to_string());
            }
        }

        match (self.phase, event.command) {
            (Phase::AwaitingConfig, Command::Start) => {
                // A repeated /chess during setup posts a fresh setup message.
                self.message_id = None;
                self.render(RenderRequest::setup(self.strength, self.color))
                    .await;
                Handled::Updated
            }
            (Phase::AwaitingConfig, Command::SelectStrength(strength)) => {
                self.strength = Some(strength);
                self.advance_setup(event.actor_id).await
            }
            (Phase::AwaitingConfig, Command::SelectColor(color)) => {
                self.color = Some(color);
                self.advance_setup(event.actor_id).await
            }
            (Phase::AwaitingConfig, _) => Handled::Ignored,

            (_, Command::Start) => {
                Handled::Rejected("A chess game is already running in this channel.".to_string())
            }
            (_, Command::SelectStrength(_) | Command::SelectColor(_)) => {
                Handled::Rejected("This game has already been set up.".to_string())
            }

            (
                Phase::StartingEngine | Phase::AwaitingPlayerMove(_) | Phase::AwaitingEngineMove,
                Command::Resign,
            ) => {
                if let Some(entry) = &self.entry {
                    entry.session().resign();
                }
                self.finish(EndReason::Resigned).await;
                Handled::Updated
            }
            (Phase::AwaitingPlayerMove(_), Command::SelectPiece(square)) => {
                self.select_piece(square).await
            }
            (Phase::AwaitingPlayerMove(Selection::PieceSelected(_)), Command::Cancel) => {
                self.show_player_turn(Selection::NoSelection, None, None)
                    .await;
                Handled::Updated
            }
            (Phase::AwaitingPlayerMove(_), Command::Move { from, to, promotion }) => {
                self.player_move(from, to, promotion).await
            }

            (phase, command) => {
                tracing::debug!(?phase, command = command.name(), "Ignoring interaction");
                Handled::Ignored
            }
        }
    }

    /// Configure the game once both setup choices are known and begin
    /// starting its engine. The handshake completes in the run loop.
    async fn advance_setup(&mut self, actor: UserId) -> Handled {
        let (Some(strength), Some(color)) = (self.strength, self.color) else {
            self.render(RenderRequest::setup(self.strength, self.color))
                .await;
            return Handled::Updated;
        };

        let entry = match self.registry.create_session(self.channel_id).await {
            Ok(entry) => entry,
            Err(e) => return Handled::Rejected(e.to_string()),
        };
        let configured = entry.session().configure(color, strength);
        if let Err(e) = configured {
            tracing::warn!("Fresh session refused setup: {}", e);
        }
        self.owner = Some(actor);
        self.entry = Some(entry.clone());
        tracing::info!(
            player = %actor,
            color = %color,
            strength = %strength,
            elo = strength.elo(),
            "Game configured"
        );

        let engine = entry.engine().clone();
        self.starting = Some(Box::pin(async move { engine.start().await }));
        self.phase = Phase::StartingEngine;

        let snapshot = entry.snapshot();
        self.render(RenderRequest::starting(&snapshot)).await;
        Handled::Updated
    }

    async fn on_engine_started(&mut self, result: Result<(), EngineError>) {
        if self.phase != Phase::StartingEngine {
            tracing::debug!("Discarding engine start outside of startup");
            return;
        }
        match result {
            Ok(()) => {
                tracing::debug!("Engine ready");
                self.next_turn(None).await;
            }
            Err(e) => {
                tracing::error!("Engine failed to start: {}", e);
                self.finish(EndReason::EngineFailure(e.to_string())).await;
            }
        }
    }

    /// Setup left idle: retire the setup message and let the actor exit.
    async fn expire_setup(&mut self) {
        tracing::info!(timeout = ?self.setup_timeout, "Setup expired");
        self.phase = Phase::Ended;
        if self.message_id.is_some() {
            self.render(RenderRequest::expired()).await;
        }
    }

    async fn select_piece(&mut self, square: Square) -> Handled {
        let Some(snapshot) = self.snapshot() else {
            return Handled::Ignored;
        };
        if snapshot.legal_destinations(square).is_empty() {
            self.show_player_turn(
                Selection::NoSelection,
                Some("That piece has no legal moves.".to_string()),
                None,
            )
            .await;
            return Handled::Updated;
        }
        self.show_player_turn(Selection::PieceSelected(square), None, None)
            .await;
        Handled::Updated
    }

    async fn player_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<chess::PieceKind>,
    ) -> Handled {
        let Some(entry) = self.entry.clone() else {
            return Handled::Ignored;
        };
        let applied = entry.session().apply_move(from, to, promotion);
        match applied {
            Ok(applied) => {
                tracing::info!(san = %applied.san, status = %applied.status, "Player moved");
                self.next_turn(None).await;
            }
            Err(SessionError::IllegalMove(mv)) => {
                tracing::debug!("Rejected move {}", mv);
                self.show_player_turn(
                    Selection::NoSelection,
                    Some(format!("{} is not a legal move here.", mv)),
                    None,
                )
                .await;
            }
            Err(e) => {
                tracing::warn!("Move refused: {}", e);
                self.show_player_turn(Selection::NoSelection, Some(e.to_string()), None)
                    .await;
            }
        }
        Handled::Updated
    }

    /// Hand the move to whoever is next, or end the game.
    async fn next_turn(&mut self, commentary: Option<String>) {
        let Some(snapshot) = self.snapshot() else {
            return;
        };

        if snapshot.is_terminal() {
            self.finish_with(EndReason::GameOver(snapshot.status()), commentary)
                .await;
        } else if snapshot.is_player_turn() {
            self.show_player_turn(Selection::NoSelection, None, commentary)
                .await;
        } else {
            self.begin_engine_turn(&snapshot, commentary).await;
        }
    }

    async fn begin_engine_turn(&mut self, snapshot: &GameSession, commentary: Option<String>) {
        let Some(entry) = &self.entry else {
            return;
        };

        let request = SearchRequest::new(
            snapshot.fen(),
            snapshot.strength().map(StrengthLevel::elo),
            self.think_time,
        );
        tracing::debug!(fen = %request.fen, elo = ?request.elo, "Requesting engine move");

        let engine = entry.engine().clone();
        self.search = Some(Box::pin(async move {
            engine.request_best_move(request).await
        }));
        self.phase = Phase::AwaitingEngineMove;

        self.render(RenderRequest::thinking(snapshot).with_commentary(commentary))
            .await;
    }

    async fn on_engine_reply(&mut self, result: SearchResult) {
        if self.phase != Phase::AwaitingEngineMove {
            tracing::debug!("Discarding engine reply outside the engine turn");
            return;
        }
        let Some(entry) = self.entry.clone() else {
            return;
        };

        match result {
            Ok(Some(mv)) => {
                let applied = entry.session().apply_uci_move(mv);
                match applied {
                    Ok(applied) => {
                        tracing::info!(san = %applied.san, status = %applied.status, "Engine moved");
                        let commentary = self.commentary(&applied);
                        self.next_turn(commentary).await;
                    }
                    Err(e) => {
                        tracing::error!("Engine move {} rejected: {}", chess::format_uci_move(mv), e);
                        self.finish(EndReason::EngineFailure(format!(
                            "it played an illegal move ({})",
                            chess::format_uci_move(mv)
                        )))
                        .await;
                    }
                }
            }
            Ok(None) => {
                tracing::info!("Engine has no move, adjudicating a draw");
                entry.session().adjudicate_draw();
                self.finish(EndReason::EngineNoMove).await;
            }
            Err(e) => {
                tracing::error!("Engine search failed: {}", e);
                self.finish(EndReason::EngineFailure(e.to_string())).await;
            }
        }
    }

    async fn show_player_turn(
        &mut self,
        selection: Selection,
        notice: Option<String>,
        commentary: Option<String>,
    ) {
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        self.phase = Phase::AwaitingPlayerMove(selection);

        let selected = match selection {
            Selection::NoSelection => None,
            Selection::PieceSelected(square) => Some(square),
        };
        let mut request = RenderRequest::player_turn(&snapshot, selected).with_commentary(commentary);
        request.notice = notice;
        self.render(request).await;
    }

    async fn finish(&mut self, reason: EndReason) {
        self.finish_with(reason, None).await;
    }

    /// End the game: stop the engine, drop the registry entry, show the
    /// final board without controls.
    async fn finish_with(&mut self, reason: EndReason, commentary: Option<String>) {
        self.phase = Phase::Ended;
        self.starting = None;
        self.search = None;

        let Some(entry) = self.entry.take() else {
            return;
        };
        if let Err(e) = self.registry.end_session(self.channel_id).await {
            tracing::warn!("Ending session: {}", e);
        }
        tracing::info!(reason = ?reason, "Game ended");

        let snapshot = entry.snapshot();
        self.render(RenderRequest::finished(&snapshot, &reason).with_commentary(commentary))
            .await;
    }

    /// Shutdown path: end the game without rendering.
    async fn stop(&mut self) {
        self.phase = Phase::Ended;
        self.starting = None;
        self.search = None;
        if self.entry.take().is_some() {
            if let Err(e) = self.registry.end_session(self.channel_id).await {
                tracing::warn!("Ending session on shutdown: {}", e);
            }
        }
    }

    fn commentary(&mut self, applied: &AppliedMove) -> Option<String> {
        let personality = self.strength?.personality();
        let quip = personality.pick_quip(self.last_quip, &mut rand::thread_rng());
        self.last_quip = quip;

        let played = format!("{} plays {}.", personality.name, applied.san);
        Some(match quip.and_then(|i| personality.quips.get(i)) {
            Some(line) => format!("{}\n{}: \"{}\"", played, personality.name, line),
            None => played,
        })
    }

    fn snapshot(&self) -> Option<GameSession> {
        self.entry.as_ref().map(|entry| entry.snapshot())
    }

    async fn render(&mut self, request: RenderRequest) {
        match self
            .sink
            .render(self.channel_id, self.message_id, request)
            .await
        {
            Ok(id) => self.message_id = Some(id),
            Err(e) => tracing::warn!("Render failed: {}", e),
        }
    }

    fn detach(&self) {
        self.channels.detach(self.channel_id, self.generation);
    }
}

/// Resolves with the outstanding engine call, or never when idle.
async fn next_pending<T>(slot: &mut Option<Pending<T>>) -> T {
    match slot {
        Some(pending) => {
            let result = pending.as_mut().await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}
