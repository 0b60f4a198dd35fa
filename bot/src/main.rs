use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chessbot::console::{self, ConsoleSink};
use chessbot::{ChannelId, Orchestrator, SessionRegistry, Settings};
use clap::Parser;
use engine::{EngineClient, MoveEngine};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Play chess against a UCI engine, one game per channel.
///
/// Interaction events are read as JSON lines on stdin and render requests
/// are written as JSON lines on stdout.
#[derive(Parser)]
#[command(name = "chessbot", version)]
struct Cli {
    /// Engine executable. Discovered when omitted.
    #[arg(long, value_name = "PATH")]
    engine_path: Option<PathBuf>,

    /// Seconds allowed for the engine handshake.
    #[arg(long, value_name = "SECS")]
    start_timeout: Option<u64>,

    /// Seconds allowed for one engine move.
    #[arg(long, value_name = "SECS")]
    query_timeout: Option<u64>,

    /// Engine search time per move in milliseconds.
    #[arg(long, value_name = "MS")]
    think_time: Option<u64>,

    /// Directory for log files.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(path) = self.engine_path {
            settings.engine_path = Some(path);
        }
        if let Some(secs) = self.start_timeout {
            settings.engine_start_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(secs) = self.query_timeout {
            settings.engine_query_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(ms) = self.think_time {
            settings.think_time = std::time::Duration::from_millis(ms);
        }
        if let Some(dir) = self.log_dir {
            settings.log_dir = dir;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().apply(Settings::from_env());

    std::fs::create_dir_all(&settings.log_dir)
        .with_context(|| format!("creating log directory {}", settings.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, "chessbot");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Chess bot starting up");

    let program = engine::find_engine(settings.engine_path.as_deref()).unwrap_or_else(|| {
        tracing::warn!("Falling back to `stockfish` on PATH");
        PathBuf::from("stockfish")
    });
    tracing::info!(
        engine = %program.display(),
        think_time = ?settings.think_time,
        "Using engine"
    );

    let engine_settings = settings.clone();
    let registry = Arc::new(SessionRegistry::new(Box::new(move |channel: ChannelId| {
        let config = engine_settings.engine_config(program.clone(), format!("channel-{}", channel));
        Arc::new(EngineClient::new(config)) as Arc<dyn MoveEngine>
    })));

    let sink = Arc::new(ConsoleSink::new(tokio::io::stdout()));
    let orchestrator = Orchestrator::new(registry, sink.clone(), settings.think_time)
        .with_setup_timeout(settings.setup_timeout);

    let input = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console::run(orchestrator.clone(), input, sink) => {
            result.context("reading interaction events")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    let stopped = orchestrator.shutdown().await;
    tracing::info!("Chess bot shut down ({} games stopped)", stopped);
    Ok(())
}
