//! Out-of-process UCI engine client, one process per game.

pub mod client;
pub mod discovery;
pub mod uci;

pub use client::{EngineClient, EngineConfig};
pub use discovery::find_engine;
pub use uci::{LineBuffer, UciError, UciMessage};

use std::time::Duration;

use async_trait::async_trait;
use cozy_chess::Move;

/// Lifecycle of an engine client.
///
/// `Uninitialized -> Starting -> Ready <-> Querying -> Terminating -> Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Starting,
    Ready,
    Querying,
    Terminating,
    Terminated,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Querying => "querying",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to launch engine {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine did not become ready within {0:?}")]
    StartTimeout(Duration),
    #[error("Engine did not answer within {0:?}")]
    QueryTimeout(Duration),
    #[error("Engine is already searching")]
    Busy,
    #[error("Engine is not ready (state: {0})")]
    NotReady(EngineState),
    #[error("Engine quit unexpectedly")]
    QuitUnexpectedly,
    #[error("Engine was terminated")]
    Terminated,
    #[error("Engine reported an error: {0}")]
    Reported(String),
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One best-move query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub fen: String,
    /// Strength cap; `None` lets the engine play at full strength.
    pub elo: Option<u16>,
    pub think_time: Duration,
}

impl SearchRequest {
    pub fn new(fen: impl Into<String>, elo: Option<u16>, think_time: Duration) -> Self {
        Self {
            fen: fen.into(),
            elo,
            think_time,
        }
    }

    /// The UCI commands that configure and start this search.
    pub fn commands(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(4);
        match self.elo {
            Some(elo) => {
                lines.push("setoption name UCI_LimitStrength value true".to_string());
                lines.push(format!("setoption name UCI_Elo value {}", elo));
            }
            None => lines.push("setoption name UCI_LimitStrength value false".to_string()),
        }
        lines.push(format!("position fen {}", self.fen));
        lines.push(format!("go movetime {}", self.think_time.as_millis()));
        lines
    }
}

/// Seam between game orchestration and a move-search engine.
#[async_trait]
pub trait MoveEngine: Send + Sync {
    /// Launch and handshake. Resolves once the engine is ready.
    async fn start(&self) -> Result<(), EngineError>;

    /// Ask for a move. `Ok(None)` means the engine has no move to play.
    async fn request_best_move(&self, request: SearchRequest)
        -> Result<Option<Move>, EngineError>;

    /// Stop the engine for good. Safe to call repeatedly.
    async fn terminate(&self);

    fn state(&self) -> EngineState;
}
