//! Runtime configuration for the chess bot.
//!
//! Every value has a compile-time default and can be overridden through an
//! environment variable. The binary applies command-line flags on top.

use std::path::PathBuf;
use std::time::Duration;

use engine::EngineConfig;

/// Default bound on the engine's `uci`/`isready` handshake (in seconds).
const DEFAULT_ENGINE_START_TIMEOUT_SECS: u64 = 10;

/// Default bound on a single best-move query (in seconds).
const DEFAULT_ENGINE_QUERY_TIMEOUT_SECS: u64 = 10;

/// Default engine search budget per move (in milliseconds).
const DEFAULT_THINK_TIME_MS: u64 = 3000;

/// Default idle limit for an unfinished game setup (in seconds).
const DEFAULT_SETUP_TIMEOUT_SECS: u64 = 300;

/// Default directory for rolling log files.
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Explicit engine executable. `None` means discover one.
    pub engine_path: Option<PathBuf>,
    pub engine_start_timeout: Duration,
    pub engine_query_timeout: Duration,
    pub think_time: Duration,
    pub setup_timeout: Duration,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_path: None,
            engine_start_timeout: Duration::from_secs(DEFAULT_ENGINE_START_TIMEOUT_SECS),
            engine_query_timeout: Duration::from_secs(DEFAULT_ENGINE_QUERY_TIMEOUT_SECS),
            think_time: Duration::from_millis(DEFAULT_THINK_TIME_MS),
            setup_timeout: Duration::from_secs(DEFAULT_SETUP_TIMEOUT_SECS),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// - `CHESSBOT_ENGINE_PATH`
    /// - `CHESSBOT_ENGINE_START_TIMEOUT_SECS`
    /// - `CHESSBOT_ENGINE_QUERY_TIMEOUT_SECS`
    /// - `CHESSBOT_THINK_TIME_MS`
    /// - `CHESSBOT_SETUP_TIMEOUT_SECS`
    /// - `CHESSBOT_LOG_DIR`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unparseable numbers fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            engine_path: lookup("CHESSBOT_ENGINE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            engine_start_timeout: secs(
                "CHESSBOT_ENGINE_START_TIMEOUT_SECS",
                defaults.engine_start_timeout,
            ),
            engine_query_timeout: secs(
                "CHESSBOT_ENGINE_QUERY_TIMEOUT_SECS",
                defaults.engine_query_timeout,
            ),
            think_time: lookup("CHESSBOT_THINK_TIME_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.think_time),
            setup_timeout: secs("CHESSBOT_SETUP_TIMEOUT_SECS", defaults.setup_timeout),
            log_dir: lookup("CHESSBOT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }

    /// Engine process settings for the game in `label`'s channel.
    pub fn engine_config(&self, program: impl Into<PathBuf>, label: impl Into<String>) -> EngineConfig {
        let mut config = EngineConfig::new(program).with_label(label);
        config.start_timeout = self.engine_start_timeout;
        config.query_timeout = self.engine_query_timeout;
        config
    }
}
