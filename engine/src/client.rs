//! Asynchronous request/response client for one UCI engine process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use cozy_chess::Move;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::uci::{parse_uci_message, LineBuffer, UciMessage};
use crate::{EngineError, EngineState, MoveEngine, SearchRequest};

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SEARCH_MARGIN: Duration = Duration::from_secs(2);

/// How long a polite `quit` gets before the process is killed.
const QUIT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub start_timeout: Duration,
    pub query_timeout: Duration,
    /// Minimum slack between a search budget and its query timeout.
    pub search_margin: Duration,
    /// Shown in logs, usually the owning channel.
    pub label: String,
}

impl EngineConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            start_timeout: DEFAULT_START_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            search_margin: DEFAULT_SEARCH_MARGIN,
            label: String::from("engine"),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Time allowed for a search of `think_time`: never less than the
    /// configured query timeout, and always at least the margin above it.
    pub fn query_bound(&self, think_time: Duration) -> Duration {
        self.query_timeout.max(think_time + self.search_margin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    UciOk,
    ReadyOk,
}

type SearchReply = Result<Option<Move>, EngineError>;

struct Inner {
    state: EngineState,
    stdin_tx: Option<mpsc::UnboundedSender<String>>,
    handshake: Option<(Handshake, oneshot::Sender<Result<(), EngineError>>)>,
    pending: Option<oneshot::Sender<SearchReply>>,
    /// Searches abandoned with a `stop` whose `bestmove` is still due.
    stale_bestmoves: usize,
    /// Stdout closed while we were not shutting down.
    exited: bool,
    pid: Option<u32>,
    tasks: Vec<JoinHandle<()>>,
}

impl Inner {
    fn send(&self, line: impl Into<String>) -> Result<(), EngineError> {
        let tx = self.stdin_tx.as_ref().ok_or(EngineError::Terminated)?;
        tx.send(line.into())
            .map_err(|_| EngineError::QuitUnexpectedly)
    }

    fn complete_handshake(&mut self, got: Handshake) {
        match self.handshake.take() {
            Some((expected, tx)) if expected == got => {
                let _ = tx.send(Ok(()));
            }
            other => {
                self.handshake = other;
                tracing::debug!("Ignoring {:?} outside of handshake", got);
            }
        }
    }

    fn resolve_search(&mut self, mv: Option<Move>) {
        if self.stale_bestmoves > 0 {
            self.stale_bestmoves -= 1;
            tracing::debug!("Discarding bestmove from an abandoned search");
            return;
        }
        match self.pending.take() {
            Some(tx) => {
                if self.state == EngineState::Querying {
                    self.state = EngineState::Ready;
                }
                let _ = tx.send(Ok(mv));
            }
            None => tracing::warn!("Unsolicited bestmove from engine"),
        }
    }

    fn fail_waiters(&mut self, err: impl Fn() -> EngineError) {
        if let Some((_, tx)) = self.handshake.take() {
            let _ = tx.send(Err(err()));
        }
        if let Some(tx) = self.pending.take() {
            let _ = tx.send(Err(err()));
        }
    }
}

struct Shared {
    config: EngineConfig,
    inner: Mutex<Inner>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        tracing::trace!("UCI << {}", line);

        let message = match parse_uci_message(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::trace!("Ignoring engine output: {}", e);
                return;
            }
        };

        let mut inner = self.lock();
        match message {
            UciMessage::UciOk => inner.complete_handshake(Handshake::UciOk),
            UciMessage::ReadyOk => inner.complete_handshake(Handshake::ReadyOk),
            UciMessage::BestMove { mv, .. } => inner.resolve_search(mv),
            UciMessage::Error(text) => {
                tracing::warn!("Engine error: {}", text);
                if let Some(tx) = inner.pending.take() {
                    // A rejected command starts no search, so no bestmove is due
                    inner.state = EngineState::Ready;
                    let _ = tx.send(Err(EngineError::Reported(text)));
                }
            }
            UciMessage::Id { name, value } => tracing::debug!("Engine id {}: {}", name, value),
            UciMessage::Info(info) => tracing::trace!(?info, "Engine info"),
        }
    }

    fn on_stdout_closed(&self) {
        let mut inner = self.lock();
        if matches!(
            inner.state,
            EngineState::Terminating | EngineState::Terminated
        ) {
            tracing::debug!("Engine output closed during shutdown");
            return;
        }
        tracing::error!(state = %inner.state, "Engine quit unexpectedly");
        inner.exited = true;
        inner.fail_waiters(|| EngineError::QuitUnexpectedly);
    }
}

/// Client for one engine process. Cloning shares the same process.
#[derive(Clone)]
pub struct EngineClient {
    shared: Arc<Shared>,
}

impl EngineClient {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    state: EngineState::Uninitialized,
                    stdin_tx: None,
                    handshake: None,
                    pending: None,
                    stale_bestmoves: 0,
                    exited: false,
                    pid: None,
                    tasks: Vec::new(),
                }),
                child: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn state(&self) -> EngineState {
        self.shared.lock().state
    }

    /// OS process id while the engine is running.
    pub fn pid(&self) -> Option<u32> {
        self.shared.lock().pid
    }

    /// Spawn the engine and complete the `uci`/`isready` handshake.
    ///
    /// Any failure tears the process down before returning.
    #[tracing::instrument(name = "engine_start", skip(self), fields(engine = %self.shared.config.label))]
    pub async fn start(&self) -> Result<(), EngineError> {
        {
            let mut inner = self.shared.lock();
            if inner.state != EngineState::Uninitialized {
                return Err(EngineError::NotReady(inner.state));
            }
            inner.state = EngineState::Starting;
        }

        let bound = self.shared.config.start_timeout;
        let outcome = match tokio::time::timeout(bound, self.launch()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::StartTimeout(bound)),
        };

        if let Err(err) = outcome {
            tracing::error!("Engine failed to start: {}", err);
            self.terminate().await;
            return Err(err);
        }

        let mut inner = self.shared.lock();
        if inner.state != EngineState::Starting {
            return Err(EngineError::Terminated);
        }
        inner.state = EngineState::Ready;
        tracing::info!(pid = ?inner.pid, "Engine ready");
        Ok(())
    }

    async fn launch(&self) -> Result<(), EngineError> {
        let config = &self.shared.config;
        tracing::debug!("Spawning {} {:?}", config.program.display(), config.args);

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: config.program.display().to_string(),
                source,
            })?;
        let pid = child.id();
        tracing::info!(?pid, "Engine process spawned");

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!("engine", label = %config.label, pid = ?pid);
        let tasks = vec![
            tokio::spawn(write_commands(stdin, stdin_rx).instrument(span.clone())),
            tokio::spawn(
                read_messages(stdout, Arc::downgrade(&self.shared)).instrument(span.clone()),
            ),
            tokio::spawn(log_stderr(stderr).instrument(span)),
        ];

        *self.shared.child.lock().await = Some(child);
        {
            let mut inner = self.shared.lock();
            inner.stdin_tx = Some(stdin_tx);
            inner.pid = pid;
            inner.tasks = tasks;
            if inner.state != EngineState::Starting {
                return Err(EngineError::Terminated);
            }
        }

        self.handshake(Handshake::UciOk, "uci").await?;
        self.handshake(Handshake::ReadyOk, "isready").await
    }

    async fn handshake(&self, expect: Handshake, command: &str) -> Result<(), EngineError> {
        let rx = {
            let mut inner = self.shared.lock();
            if inner.exited {
                return Err(EngineError::QuitUnexpectedly);
            }
            let (tx, rx) = oneshot::channel();
            inner.handshake = Some((expect, tx));
            inner.send(command)?;
            rx
        };
        rx.await.map_err(|_| EngineError::Terminated)?
    }

    /// Run one search. Only one may be outstanding; a second caller gets
    /// [`EngineError::Busy`] and the first is unaffected.
    #[tracing::instrument(skip(self, request), fields(engine = %self.shared.config.label))]
    pub async fn request_best_move(&self, request: SearchRequest) -> SearchReply {
        let bound = self.shared.config.query_bound(request.think_time);

        let rx = {
            let mut inner = self.shared.lock();
            match inner.state {
                EngineState::Terminating | EngineState::Terminated => {
                    return Err(EngineError::Terminated)
                }
                _ if inner.exited => return Err(EngineError::QuitUnexpectedly),
                EngineState::Ready => {}
                EngineState::Querying => return Err(EngineError::Busy),
                state => return Err(EngineError::NotReady(state)),
            }

            for line in request.commands() {
                inner.send(line)?;
            }
            let (tx, rx) = oneshot::channel();
            inner.pending = Some(tx);
            inner.state = EngineState::Querying;
            rx
        };
        tracing::debug!(fen = %request.fen, elo = ?request.elo, "Search started");

        match tokio::time::timeout(bound, rx).await {
            Ok(Ok(reply)) => {
                if let Ok(mv) = &reply {
                    tracing::debug!(?mv, "Search finished");
                }
                reply
            }
            Ok(Err(_)) => Err(EngineError::Terminated),
            Err(_) => {
                let mut inner = self.shared.lock();
                if inner.pending.take().is_some() {
                    if inner.state == EngineState::Querying {
                        inner.state = EngineState::Ready;
                    }
                    if inner.send("stop").is_ok() {
                        inner.stale_bestmoves += 1;
                    }
                }
                tracing::warn!(?bound, "Engine search timed out");
                Err(EngineError::QueryTimeout(bound))
            }
        }
    }

    /// Send `quit`, give the process a moment, then kill it.
    ///
    /// Always ends in [`EngineState::Terminated`]. Any outstanding search
    /// resolves with [`EngineError::Terminated`].
    #[tracing::instrument(skip(self), fields(engine = %self.shared.config.label))]
    pub async fn terminate(&self) {
        let stdin_tx = {
            let mut inner = self.shared.lock();
            if inner.state != EngineState::Terminated {
                inner.state = EngineState::Terminating;
            }
            inner.fail_waiters(|| EngineError::Terminated);
            inner.stdin_tx.take()
        };
        if let Some(tx) = stdin_tx {
            let _ = tx.send("quit".to_string());
        }

        // Held across the wait so a concurrent caller only returns once the
        // process is gone.
        let mut slot = self.shared.child.lock().await;
        if let Some(mut child) = slot.take() {
            match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::info!(%status, "Engine exited"),
                Ok(Err(e)) => {
                    tracing::warn!("Failed to wait for engine: {}", e);
                    kill(&mut child).await;
                }
                Err(_) => {
                    tracing::warn!("Engine ignored quit, killing it");
                    kill(&mut child).await;
                }
            }
        }

        let tasks = {
            let mut inner = self.shared.lock();
            inner.state = EngineState::Terminated;
            inner.pid = None;
            std::mem::take(&mut inner.tasks)
        };
        drop(slot);
        for task in tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl MoveEngine for EngineClient {
    async fn start(&self) -> Result<(), EngineError> {
        EngineClient::start(self).await
    }

    async fn request_best_move(&self, request: SearchRequest) -> SearchReply {
        EngineClient::request_best_move(self, request).await
    }

    async fn terminate(&self) {
        EngineClient::terminate(self).await
    }

    fn state(&self) -> EngineState {
        EngineClient::state(self)
    }
}

fn missing_pipe(name: &str) -> EngineError {
    EngineError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("engine {} was not captured", name),
    ))
}

async fn kill(child: &mut Child) {
    match child.kill().await {
        Ok(()) => tracing::info!("Engine killed"),
        Err(e) => tracing::error!("Failed to kill engine: {}", e),
    }
}

async fn write_commands(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        tracing::trace!("UCI >> {}", line);
        let framed = format!("{}\n", line);
        if let Err(e) = stdin.write_all(framed.as_bytes()).await {
            tracing::debug!("Engine stdin closed: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            tracing::debug!("Failed to flush engine stdin: {}", e);
            break;
        }
    }
    tracing::debug!("Engine writer exiting");
}

async fn read_messages(mut stdout: ChildStdout, shared: Weak<Shared>) {
    let mut framer = LineBuffer::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                for line in framer.push(&chunk[..n]) {
                    shared.on_line(&line);
                }
            }
            Err(e) => {
                tracing::error!("Error reading engine stdout: {}", e);
                break;
            }
        }
    }

    if let Some(rest) = framer.take_remainder() {
        tracing::debug!("Dropping unterminated engine output: {:?}", rest);
    }
    if let Some(shared) = shared.upgrade() {
        shared.on_stdout_closed();
    }
    tracing::debug!("Engine reader exiting");
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            tracing::warn!("Engine stderr: {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STARTPOS_AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    /// A `/bin/sh` stand-in that speaks just enough UCI.
    fn script(on_go: &str, on_stop: &str) -> String {
        format!(
            r#"
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name FakeFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    position*) pos="$line" ;;
    go*) {on_go} ;;
    stop) {on_stop} ;;
    quit) exit 0 ;;
  esac
done
"#
        )
    }

    fn fake_engine(dir: &TempDir, body: &str) -> EngineConfig {
        let path = dir.path().join("engine.sh");
        std::fs::write(&path, body).unwrap();
        let mut config = EngineConfig::new("/bin/sh")
            .with_args([path.display().to_string()])
            .with_label("test");
        config.start_timeout = Duration::from_secs(5);
        config.query_timeout = Duration::from_secs(5);
        config.search_margin = Duration::ZERO;
        config
    }

    fn search(think_ms: u64) -> SearchRequest {
        SearchRequest::new(STARTPOS_AFTER_E4, Some(1350), Duration::from_millis(think_ms))
    }

    #[cfg(target_os = "linux")]
    fn process_alive(pid: u32) -> bool {
        std::path::Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[tokio::test]
    async fn test_start_query_terminate() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(
            &dir,
            &script(
                r#"case "$pos" in *4P3*) echo "info depth 1 score cp 20 pv e7e5"; echo "bestmove e7e5" ;; *) echo "bestmove (none)" ;; esac"#,
                ":",
            ),
        ));
        assert_eq!(client.state(), EngineState::Uninitialized);

        client.start().await.unwrap();
        assert_eq!(client.state(), EngineState::Ready);
        assert!(client.pid().is_some());

        let mv = client.request_best_move(search(10)).await.unwrap();
        assert_eq!(mv.map(chess::format_uci_move).as_deref(), Some("e7e5"));
        assert_eq!(client.state(), EngineState::Ready);

        client.terminate().await;
        assert_eq!(client.state(), EngineState::Terminated);
        assert_eq!(client.pid(), None);
    }

    #[tokio::test]
    async fn test_no_move_result() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(&dir, &script(r#"echo "bestmove (none)""#, ":")));
        client.start().await.unwrap();
        assert_eq!(client.request_best_move(search(10)).await.unwrap(), None);
        client.terminate().await;
    }

    #[tokio::test]
    async fn test_split_bestmove_line() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(
            &dir,
            &script(r#"printf 'best'; sleep 0.1; printf 'move d7d'; sleep 0.1; printf '5\n'"#, ":"),
        ));
        client.start().await.unwrap();
        let mv = client.request_best_move(search(10)).await.unwrap();
        assert_eq!(mv.map(chess::format_uci_move).as_deref(), Some("d7d5"));
        client.terminate().await;
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let client = EngineClient::new(EngineConfig::new("/nonexistent/stockfish"));
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
        assert_eq!(client.state(), EngineState::Terminated);
    }

    #[tokio::test]
    async fn test_start_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let mut config = fake_engine(
            &dir,
            &format!(
                "echo $$ > '{}'\ntrap '' TERM\nwhile :; do sleep 1; done\n",
                pid_file.display()
            ),
        );
        config.start_timeout = Duration::from_millis(500);
        let client = EngineClient::new(config);

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, EngineError::StartTimeout(_)));
        assert_eq!(client.state(), EngineState::Terminated);
        assert_eq!(client.pid(), None);

        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        #[cfg(target_os = "linux")]
        assert!(!process_alive(pid));
        let _ = pid;
    }

    #[tokio::test]
    async fn test_query_timeout_discards_late_answer() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fake_engine(
            &dir,
            &script(
                r#"n=$((n+1)); if [ "$n" -gt 1 ]; then echo "bestmove d7d5"; fi"#,
                r#"echo "bestmove e7e5""#,
            ),
        );
        config.query_timeout = Duration::from_millis(300);
        let client = EngineClient::new(config);
        client.start().await.unwrap();

        let err = client.request_best_move(search(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::QueryTimeout(_)));
        assert_eq!(client.state(), EngineState::Ready);

        // The answer to the abandoned search must not leak into this one
        let mv = client.request_best_move(search(10)).await.unwrap();
        assert_eq!(mv.map(chess::format_uci_move).as_deref(), Some("d7d5"));
        client.terminate().await;
    }

    #[tokio::test]
    async fn test_second_request_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(
            &dir,
            &script(r#"sleep 0.3; echo "bestmove e7e5""#, ":"),
        ));
        client.start().await.unwrap();

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.request_best_move(search(10)).await })
        };
        while client.state() != EngineState::Querying {
            tokio::task::yield_now().await;
        }

        let second = client.request_best_move(search(10)).await;
        assert!(matches!(second, Err(EngineError::Busy)));

        let mv = first.await.unwrap().unwrap();
        assert_eq!(mv.map(chess::format_uci_move).as_deref(), Some("e7e5"));
        client.terminate().await;
    }

    #[tokio::test]
    async fn test_terminate_during_query_kills_stuck_engine() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(&dir, &script("exec sleep 30", ":")));
        client.start().await.unwrap();
        let pid = client.pid().unwrap();

        let query = {
            let client = client.clone();
            tokio::spawn(async move { client.request_best_move(search(10)).await })
        };
        while client.state() != EngineState::Querying {
            tokio::task::yield_now().await;
        }

        client.terminate().await;
        assert_eq!(client.state(), EngineState::Terminated);
        assert!(matches!(query.await.unwrap(), Err(EngineError::Terminated)));

        #[cfg(target_os = "linux")]
        assert!(!process_alive(pid));
        let _ = pid;
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(&dir, &script(":", ":")));
        client.start().await.unwrap();

        client.terminate().await;
        client.terminate().await;
        assert_eq!(client.state(), EngineState::Terminated);
        assert!(matches!(
            client.request_best_move(search(10)).await,
            Err(EngineError::Terminated)
        ));

        let never_started = EngineClient::new(EngineConfig::new("/bin/true"));
        never_started.terminate().await;
        assert_eq!(never_started.state(), EngineState::Terminated);
    }

    #[tokio::test]
    async fn test_engine_crash_mid_search() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(&dir, &script("exit 3", ":")));
        client.start().await.unwrap();

        let err = client.request_best_move(search(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::QuitUnexpectedly));
        assert!(matches!(
            client.request_best_move(search(10)).await,
            Err(EngineError::QuitUnexpectedly)
        ));
        client.terminate().await;
        assert_eq!(client.state(), EngineState::Terminated);
    }

    #[tokio::test]
    async fn test_engine_error_line_fails_search() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(
            &dir,
            &script(r#"echo "Unknown command: 'go'"; echo "bestmove a7a6""#, ":"),
        ));
        client.start().await.unwrap();

        let err = client.request_best_move(search(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::Reported(_)));
        assert_eq!(client.state(), EngineState::Ready);
        client.terminate().await;
    }

    #[tokio::test]
    async fn test_error_line_without_bestmove_keeps_next_search() {
        let dir = tempfile::tempdir().unwrap();
        let client = EngineClient::new(fake_engine(
            &dir,
            &script(
                r#"n=$((n+1)); if [ "$n" -eq 1 ]; then echo "Unknown command: 'go'"; else echo "bestmove d7d5"; fi"#,
                ":",
            ),
        ));
        client.start().await.unwrap();

        let err = client.request_best_move(search(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::Reported(_)));

        let mv = client.request_best_move(search(10)).await.unwrap();
        assert_eq!(mv.map(chess::format_uci_move).as_deref(), Some("d7d5"));
        client.terminate().await;
    }

    #[test]
    fn test_query_bound_keeps_margin() {
        let config = EngineConfig::new("stockfish");
        assert_eq!(config.query_bound(Duration::from_millis(3000)), Duration::from_secs(10));
        assert_eq!(config.query_bound(Duration::from_secs(9)), Duration::from_secs(11));
    }
}
