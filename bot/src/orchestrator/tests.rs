use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess::{parse_square, PieceColor, StrengthLevel};
use cozy_chess::Square;
use engine::{EngineState, MoveEngine};

use super::*;
use crate::interaction::{ChannelId, Command, InteractionEvent, UserId};
use crate::render::ButtonAction;
use crate::testing::{EngineScript, RecordingSink, ScriptedEngine, ScriptedReply};

const CHANNEL: ChannelId = ChannelId(100);
const PLAYER: UserId = UserId(7);

struct Harness {
    orchestrator: Orchestrator,
    sink: Arc<RecordingSink>,
    engines: Arc<Mutex<Vec<Arc<ScriptedEngine>>>>,
}

impl Harness {
    fn new(script: EngineScript) -> Self {
        Self::with_scripts(move |_channel| script.clone())
    }

    /// One engine script per channel.
    fn with_scripts(scripts: impl Fn(ChannelId) -> EngineScript + Send + Sync + 'static) -> Self {
        let engines = Arc::new(Mutex::new(Vec::new()));
        let created = engines.clone();
        let registry = Arc::new(SessionRegistry::new(Box::new(move |channel: ChannelId| {
            let engine = Arc::new(ScriptedEngine::new(scripts(channel)));
            created.lock().unwrap().push(engine.clone());
            engine as Arc<dyn MoveEngine>
        })));
        let sink = Arc::new(RecordingSink::new());
        let orchestrator =
            Orchestrator::new(registry, sink.clone(), Duration::from_millis(10));
        Self {
            orchestrator,
            sink,
            engines,
        }
    }

    async fn send(&self, command: Command) -> Handled {
        self.send_as(PLAYER, command).await
    }

    async fn send_as(&self, actor: UserId, command: Command) -> Handled {
        self.orchestrator
            .handle(InteractionEvent::new(CHANNEL, actor, command))
            .await
    }

    fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.orchestrator = self.orchestrator.with_setup_timeout(timeout);
        self
    }

    /// Finish setup without waiting for the engine.
    async fn configure(&self, color: PieceColor, strength: StrengthLevel) {
        assert_eq!(self.send(Command::Start).await, Handled::Updated);
        assert_eq!(self.send(Command::SelectColor(color)).await, Handled::Updated);
        assert_eq!(
            self.send(Command::SelectStrength(strength)).await,
            Handled::Updated
        );
    }

    /// Finish setup and wait for the first render after engine startup.
    async fn setup(&self, color: PieceColor, strength: StrengthLevel) {
        self.configure(color, strength).await;
        self.sink.wait_for(4).await;
    }

    async fn play(&self, from: &str, to: &str) -> Handled {
        self.send(Command::Move {
            from: sq(from),
            to: sq(to),
            promotion: None,
        })
        .await
    }

    fn engine(&self) -> Arc<ScriptedEngine> {
        self.engines.lock().unwrap()[0].clone()
    }

    fn last_text(&self) -> String {
        self.sink.last().unwrap().request.status_text
    }

    async fn has_session(&self) -> bool {
        self.orchestrator
            .registry()
            .get_session(CHANNEL)
            .await
            .is_some()
    }
}

fn sq(s: &str) -> Square {
    parse_square(s).unwrap()
}

#[tokio::test]
async fn test_setup_in_either_order() {
    let harness = Harness::new(EngineScript::default());

    assert_eq!(
        harness
            .send(Command::SelectStrength(StrengthLevel::Expert))
            .await,
        Handled::Updated
    );
    assert!(!harness.has_session().await);
    let partial = harness.sink.last().unwrap().request;
    assert!(partial.board.is_none());
    assert!(partial.status_text.contains("Color: not chosen"));

    assert_eq!(
        harness
            .send(Command::SelectColor(PieceColor::White))
            .await,
        Handled::Updated
    );
    assert!(harness.has_session().await);

    let renders = harness.sink.wait_for(3).await;
    assert_eq!(renders.len(), 3);
    assert_eq!(harness.engine().state(), EngineState::Ready);
    // Later renders edit the setup message
    assert_eq!(renders[1].target, Some(renders[0].message_id));
    assert_eq!(renders[2].target, Some(renders[0].message_id));
    assert!(renders[1].request.status_text.contains("getting ready"));
    let turn = &renders[2].request;
    assert!(turn.status_text.starts_with("Your move as White"));
    assert!(turn
        .buttons()
        .any(|b| b.action == ButtonAction::SelectPiece(sq("e2"))));
}

#[tokio::test]
async fn test_e4_requests_engine_reply() {
    let harness = Harness::new(EngineScript::moves(&["e7e5"]));
    harness
        .setup(PieceColor::White, StrengthLevel::Beginner)
        .await;
    let before = harness.sink.count();

    assert_eq!(harness.play("e2", "e4").await, Handled::Updated);
    let renders = harness.sink.wait_for(before + 2).await;

    let thinking = &renders[before].request;
    assert!(thinking.status_text.contains("Pip the Pawn is thinking"));
    assert!(thinking.buttons().all(|b| b.action == ButtonAction::Resign));

    let requests = harness.engine().requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .fen
        .starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq"));
    assert_eq!(requests[0].elo, Some(1350));
    assert_eq!(requests[0].think_time, Duration::from_millis(10));

    let turn = &renders[before + 1].request;
    assert!(turn.status_text.starts_with("Your move"));
    assert!(turn
        .commentary
        .as_deref()
        .unwrap()
        .starts_with("Pip the Pawn plays e5."));
    assert!(turn.board.as_ref().unwrap().fen.contains("4p3/4P3"));
}

#[tokio::test]
async fn test_checkmate_ends_session() {
    let harness = Harness::new(EngineScript::moves(&["f2f3", "g2g4"]));
    harness
        .setup(PieceColor::Black, StrengthLevel::Casual)
        .await;
    harness.sink.wait_for(5).await;

    assert_eq!(harness.play("e7", "e5").await, Handled::Updated);
    harness.sink.wait_for(7).await;
    assert!(harness.last_text().starts_with("Your move as Black"));

    assert_eq!(harness.play("d8", "h4").await, Handled::Updated);
    let last = harness.sink.last().unwrap().request;
    assert_eq!(last.status_text, "Checkmate! You win.");
    assert!(last.actions.is_empty());

    assert!(!harness.has_session().await);
    assert_eq!(harness.engine().state(), EngineState::Terminated);
    assert_eq!(harness.engine().requests().len(), 2);
    assert!(matches!(
        harness.send(Command::Resign).await,
        Handled::Rejected(_)
    ));
}

#[tokio::test]
async fn test_engine_start_failure_ends_game() {
    let harness = Harness::new(EngineScript::failing_start());
    harness
        .setup(PieceColor::White, StrengthLevel::Master)
        .await;

    let last = harness.sink.last().unwrap().request;
    assert!(last.status_text.contains("engine failed"));
    assert!(last.actions.is_empty());
    assert!(!harness.has_session().await);
    assert_eq!(harness.engine().terminate_calls(), 1);
    assert_eq!(harness.engine().state(), EngineState::Terminated);

    // The channel is free for a new game
    assert_eq!(harness.send(Command::Start).await, Handled::Updated);
}

#[tokio::test]
async fn test_engine_timeout_and_crash_end_game() {
    for reply in [ScriptedReply::Timeout, ScriptedReply::Crash] {
        let harness = Harness::new(EngineScript::replies([reply]));
        harness
            .setup(PieceColor::White, StrengthLevel::Intermediate)
            .await;
        let before = harness.sink.count();

        harness.play("d2", "d4").await;
        harness.sink.wait_for(before + 2).await;

        let last = harness.sink.last().unwrap().request;
        assert!(last.status_text.contains("engine failed"), "{}", last.status_text);
        assert!(last.actions.is_empty());
        assert!(!harness.has_session().await);
        assert_eq!(harness.engine().state(), EngineState::Terminated);
    }
}

#[tokio::test]
async fn test_engine_without_move_is_a_draw() {
    let harness = Harness::new(EngineScript::replies([ScriptedReply::NoMove]));
    harness
        .setup(PieceColor::Black, StrengthLevel::Advanced)
        .await;
    let renders = harness.sink.wait_for(5).await;

    assert!(renders[3].request.status_text.contains("thinking"));
    let last = &renders[4].request;
    assert!(last.status_text.contains("has no move"));
    assert!(last.status_text.contains("draw"));
    assert!(!harness.has_session().await);
}

#[tokio::test]
async fn test_resign_while_engine_thinks() {
    let harness = Harness::new(EngineScript::hanging());
    harness
        .setup(PieceColor::White, StrengthLevel::Expert)
        .await;
    harness.play("e2", "e4").await;
    let before = harness.sink.count();

    // Taps during the engine turn are dropped
    assert_eq!(harness.play("d2", "d4").await, Handled::Ignored);
    assert_eq!(
        harness.send(Command::SelectPiece(sq("d2"))).await,
        Handled::Ignored
    );
    assert_eq!(harness.sink.count(), before);

    assert_eq!(harness.send(Command::Resign).await, Handled::Updated);
    let last = harness.sink.last().unwrap().request;
    assert_eq!(last.status_text, "You resigned. Grandmaster Greta wins.");
    assert!(!harness.has_session().await);
    assert_eq!(harness.engine().state(), EngineState::Terminated);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.sink.count(), before + 1);
}

#[tokio::test]
async fn test_other_users_are_rejected() {
    let harness = Harness::new(EngineScript::default());
    harness
        .setup(PieceColor::White, StrengthLevel::Beginner)
        .await;
    let before = harness.sink.count();

    let handled = harness
        .send_as(UserId(8), Command::SelectPiece(sq("e2")))
        .await;
    assert!(matches!(handled, Handled::Rejected(_)));
    assert!(matches!(
        harness.send_as(UserId(8), Command::Resign).await,
        Handled::Rejected(_)
    ));
    assert_eq!(harness.sink.count(), before);
    assert!(harness.has_session().await);
}

#[tokio::test]
async fn test_select_then_cancel() {
    let harness = Harness::new(EngineScript::default());
    harness
        .setup(PieceColor::White, StrengthLevel::Beginner)
        .await;

    assert_eq!(
        harness.send(Command::SelectPiece(sq("g1"))).await,
        Handled::Updated
    );
    let selected = harness.sink.last().unwrap().request;
    let moves: Vec<ButtonAction> = selected
        .buttons()
        .map(|b| b.action)
        .filter(|a| matches!(a, ButtonAction::Move { .. }))
        .collect();
    assert_eq!(moves.len(), 2);
    assert!(selected.buttons().any(|b| b.action == ButtonAction::Cancel));

    assert_eq!(harness.send(Command::Cancel).await, Handled::Updated);
    let idle = harness.sink.last().unwrap().request;
    assert!(idle
        .buttons()
        .any(|b| b.action == ButtonAction::SelectPiece(sq("g1"))));
    assert!(!idle.buttons().any(|b| b.action == ButtonAction::Cancel));

    // Nothing to cancel any more
    assert_eq!(harness.send(Command::Cancel).await, Handled::Ignored);
}

#[tokio::test]
async fn test_illegal_move_shows_notice() {
    let harness = Harness::new(EngineScript::default());
    harness
        .setup(PieceColor::White, StrengthLevel::Beginner)
        .await;
    harness.send(Command::SelectPiece(sq("e2"))).await;

    assert_eq!(harness.play("e2", "e5").await, Handled::Updated);
    let last = harness.sink.last().unwrap().request;
    assert_eq!(last.notice.as_deref(), Some("e2e5 is not a legal move here."));
    assert!(last
        .buttons()
        .any(|b| b.action == ButtonAction::SelectPiece(sq("e2"))));
    assert!(harness.engine().requests().is_empty());
}

#[tokio::test]
async fn test_setup_commands_after_start_are_rejected() {
    let harness = Harness::new(EngineScript::default());
    harness
        .setup(PieceColor::White, StrengthLevel::Beginner)
        .await;

    assert!(matches!(
        harness.send(Command::Start).await,
        Handled::Rejected(_)
    ));
    assert!(matches!(
        harness
            .send(Command::SelectColor(PieceColor::Black))
            .await,
        Handled::Rejected(_)
    ));
    assert_eq!(harness.engines.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_buttons_without_game_are_rejected() {
    let harness = Harness::new(EngineScript::default());
    assert!(matches!(
        harness.send(Command::SelectPiece(sq("e2"))).await,
        Handled::Rejected(_)
    ));
    assert!(matches!(
        harness.send(Command::Resign).await,
        Handled::Rejected(_)
    ));
    assert_eq!(harness.sink.count(), 0);

    // Moves during setup are ignored
    harness.send(Command::Start).await;
    assert_eq!(harness.play("e2", "e4").await, Handled::Ignored);
}

#[tokio::test]
async fn test_channels_are_independent() {
    let harness = Harness::new(EngineScript::default());
    for channel in [ChannelId(1), ChannelId(2)] {
        for command in [
            Command::SelectColor(PieceColor::White),
            Command::SelectStrength(StrengthLevel::Casual),
        ] {
            let handled = harness
                .orchestrator
                .handle(InteractionEvent::new(channel, PLAYER, command))
                .await;
            assert_eq!(handled, Handled::Updated);
        }
    }

    assert_eq!(harness.orchestrator.registry().len().await, 2);
    harness.sink.wait_for(6).await;
    assert_eq!(harness.sink.renders_for(ChannelId(2)).len(), 3);
}

#[tokio::test]
async fn test_slow_engine_start_does_not_hold_up_other_channels() {
    let harness = Harness::with_scripts(|channel| {
        if channel == CHANNEL {
            EngineScript::stalled_start()
        } else {
            EngineScript::default()
        }
    });
    harness
        .configure(PieceColor::White, StrengthLevel::Expert)
        .await;
    let renders = harness.sink.wait_for(3).await;
    assert!(renders[2].request.status_text.contains("getting ready"));

    let other = ChannelId(200);
    for command in [
        Command::SelectColor(PieceColor::White),
        Command::SelectStrength(StrengthLevel::Casual),
    ] {
        let handled = tokio::time::timeout(
            Duration::from_secs(1),
            harness
                .orchestrator
                .handle(InteractionEvent::new(other, PLAYER, command)),
        )
        .await
        .expect("other channel waited on a stalled engine start");
        assert_eq!(handled, Handled::Updated);
    }

    harness.sink.wait_for(6).await;
    let other_renders = harness.sink.renders_for(other);
    assert_eq!(other_renders.len(), 3);
    assert!(other_renders[2]
        .request
        .status_text
        .starts_with("Your move as White"));

    assert_eq!(harness.engine().state(), EngineState::Starting);

    // The stalled channel only takes a resignation
    assert_eq!(harness.play("e2", "e4").await, Handled::Ignored);
    assert!(matches!(
        harness.send(Command::Start).await,
        Handled::Rejected(_)
    ));
    assert_eq!(harness.sink.renders_for(CHANNEL).len(), 3);
}

#[tokio::test]
async fn test_resign_while_engine_starts() {
    let harness = Harness::new(EngineScript::stalled_start());
    harness
        .configure(PieceColor::Black, StrengthLevel::Master)
        .await;
    harness.sink.wait_for(3).await;

    assert_eq!(harness.send(Command::Resign).await, Handled::Updated);
    let last = harness.sink.last().unwrap().request;
    assert!(last.status_text.starts_with("You resigned."));
    assert!(last.actions.is_empty());
    assert!(!harness.has_session().await);
    assert_eq!(harness.engine().terminate_calls(), 1);
    assert_eq!(harness.engine().state(), EngineState::Terminated);
    assert!(harness.engine().requests().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.sink.count(), 4);
}

#[tokio::test]
async fn test_idle_setup_expires() {
    let harness =
        Harness::new(EngineScript::default()).with_setup_timeout(Duration::from_millis(100));
    assert_eq!(harness.send(Command::Start).await, Handled::Updated);
    assert_eq!(harness.orchestrator.channel_count(), 1);

    let renders = harness.sink.wait_for(2).await;
    let expired = &renders[1];
    assert_eq!(expired.target, Some(renders[0].message_id));
    assert!(expired.request.status_text.contains("expired"));
    assert!(expired.request.actions.is_empty());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.orchestrator.channel_count(), 0);
    assert!(harness.engines.lock().unwrap().is_empty());
    assert!(matches!(
        harness.send(Command::SelectPiece(sq("e2"))).await,
        Handled::Rejected(_)
    ));

    // A menu tap on the old message opens a fresh setup
    assert_eq!(
        harness
            .send(Command::SelectColor(PieceColor::Black))
            .await,
        Handled::Updated
    );
    assert_eq!(harness.orchestrator.channel_count(), 1);
}

#[tokio::test]
async fn test_setup_choices_keep_setup_alive() {
    let harness =
        Harness::new(EngineScript::default()).with_setup_timeout(Duration::from_millis(300));
    harness.send(Command::Start).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness
        .send(Command::SelectColor(PieceColor::White))
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(harness.sink.count(), 2);
    assert_eq!(
        harness
            .send(Command::SelectStrength(StrengthLevel::Beginner))
            .await,
        Handled::Updated
    );
    let renders = harness.sink.wait_for(4).await;
    assert!(renders[3].request.status_text.starts_with("Your move"));
}

#[tokio::test]
async fn test_shutdown_ends_every_game() {
    let harness = Harness::new(EngineScript::hanging());
    harness
        .setup(PieceColor::White, StrengthLevel::Beginner)
        .await;
    harness.play("e2", "e4").await;

    assert_eq!(harness.orchestrator.shutdown().await, 1);
    assert!(harness.orchestrator.registry().is_empty().await);
    assert_eq!(harness.engine().state(), EngineState::Terminated);
}
