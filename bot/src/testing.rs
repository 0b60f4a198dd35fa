//! Scripted engine and recording sink for tests.
//!
//! Only compiled in test mode or with the `mock` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cozy_chess::Move;
use engine::{EngineError, EngineState, MoveEngine, SearchRequest};
use tokio::sync::watch;

use crate::interaction::{ChannelId, MessageId};
use crate::render::RenderRequest;
use crate::sink::{RenderError, RenderSink};

/// What the scripted engine does with the next search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Answer with a move in UCI notation.
    Move(&'static str),
    /// `bestmove (none)`.
    NoMove,
    Timeout,
    Crash,
    /// Never answer; resolves with `Terminated` once the engine is stopped.
    Hang,
}

/// Behavior of a [`ScriptedEngine`]. Searches past the end of the script hang.
#[derive(Debug, Clone, Default)]
pub struct EngineScript {
    pub fail_start: bool,
    /// `start` never completes; resolves with `Terminated` once stopped.
    pub stall_start: bool,
    pub replies: Vec<ScriptedReply>,
}

impl EngineScript {
    pub fn replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Plays the given UCI moves in order.
    pub fn moves(moves: &[&'static str]) -> Self {
        Self::replies(moves.iter().copied().map(ScriptedReply::Move))
    }

    pub fn hanging() -> Self {
        Self::replies([ScriptedReply::Hang])
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn stalled_start() -> Self {
        Self {
            stall_start: true,
            ..Self::default()
        }
    }
}

/// In-memory [`MoveEngine`] following an [`EngineScript`].
pub struct ScriptedEngine {
    fail_start: bool,
    stall_start: bool,
    replies: Mutex<VecDeque<ScriptedReply>>,
    state: Mutex<EngineState>,
    requests: Mutex<Vec<SearchRequest>>,
    terminate_calls: AtomicUsize,
    terminated: watch::Sender<bool>,
}

impl ScriptedEngine {
    pub fn new(script: EngineScript) -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            fail_start: script.fail_start,
            stall_start: script.stall_start,
            replies: Mutex::new(script.replies.into()),
            state: Mutex::new(EngineState::Uninitialized),
            requests: Mutex::new(Vec::new()),
            terminate_calls: AtomicUsize::new(0),
            terminated,
        }
    }

    /// Every search the engine was asked for, in order.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn terminate_calls(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl MoveEngine for ScriptedEngine {
    async fn start(&self) -> Result<(), EngineError> {
        if self.stall_start {
            let mut terminated = self.terminated.subscribe();
            self.set_state(EngineState::Starting);
            let _ = terminated.wait_for(|stopped| *stopped).await;
            return Err(EngineError::Terminated);
        }
        if self.fail_start {
            self.set_state(EngineState::Terminated);
            return Err(EngineError::StartTimeout(Duration::from_secs(10)));
        }
        self.set_state(EngineState::Ready);
        Ok(())
    }

    async fn request_best_move(
        &self,
        request: SearchRequest,
    ) -> Result<Option<Move>, EngineError> {
        let mut terminated = self.terminated.subscribe();
        let reply = {
            let mut state = self.state.lock().unwrap();
            match *state {
                EngineState::Ready => {}
                EngineState::Querying => return Err(EngineError::Busy),
                EngineState::Terminating | EngineState::Terminated => {
                    return Err(EngineError::Terminated)
                }
                other => return Err(EngineError::NotReady(other)),
            }
            *state = EngineState::Querying;
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ScriptedReply::Hang)
        };

        let result = match reply {
            ScriptedReply::Move(uci) => Ok(Some(uci.parse::<Move>().unwrap())),
            ScriptedReply::NoMove => Ok(None),
            ScriptedReply::Timeout => Err(EngineError::QueryTimeout(request.think_time)),
            ScriptedReply::Crash => {
                self.set_state(EngineState::Terminated);
                return Err(EngineError::QuitUnexpectedly);
            }
            ScriptedReply::Hang => {
                let _ = terminated.wait_for(|stopped| *stopped).await;
                return Err(EngineError::Terminated);
            }
        };
        self.set_state(EngineState::Ready);
        result
    }

    async fn terminate(&self) {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        self.set_state(EngineState::Terminated);
        self.terminated.send_replace(true);
    }

    fn state(&self) -> EngineState {
        *self.state.lock().unwrap()
    }
}

/// One render as seen by a [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct RecordedRender {
    pub channel: ChannelId,
    pub target: Option<MessageId>,
    pub message_id: MessageId,
    pub request: RenderRequest,
}

/// [`RenderSink`] that keeps every request. Edits keep their message id,
/// new messages get increasing ids.
pub struct RecordingSink {
    renders: Mutex<Vec<RecordedRender>>,
    next_id: AtomicU64,
    count: watch::Sender<usize>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            renders: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            count,
        }
    }

    pub fn renders(&self) -> Vec<RecordedRender> {
        self.renders.lock().unwrap().clone()
    }

    pub fn renders_for(&self, channel: ChannelId) -> Vec<RecordedRender> {
        self.renders()
            .into_iter()
            .filter(|r| r.channel == channel)
            .collect()
    }

    pub fn last(&self) -> Option<RecordedRender> {
        self.renders.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }

    /// Wait until at least `count` renders were recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<RecordedRender> {
        let mut rx = self.count.subscribe();
        let waited = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count));
        assert!(
            matches!(waited.await, Ok(Ok(_))),
            "timed out waiting for {} renders, saw {}",
            count,
            self.count()
        );
        self.renders()
    }
}

#[async_trait]
impl RenderSink for RecordingSink {
    async fn render(
        &self,
        channel: ChannelId,
        target: Option<MessageId>,
        request: RenderRequest,
    ) -> Result<MessageId, RenderError> {
        let message_id =
            target.unwrap_or_else(|| MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)));
        let total = {
            let mut renders = self.renders.lock().unwrap();
            renders.push(RecordedRender {
                channel,
                target,
                message_id,
                request,
            });
            renders.len()
        };
        self.count.send_replace(total);
        Ok(message_id)
    }
}
