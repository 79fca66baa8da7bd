//! UCI session: the request/response mediator over an engine transport.
//!
//! A session owns one background reader task that consumes the engine's
//! output stream line by line and routes each line to the completion handle
//! waiting for it. Callers issue commands through the public operations;
//! four logical locks keep the full-duplex traffic coherent:
//!
//! - the write lock serializes outbound command lines,
//! - the search lock allows at most one search in flight,
//! - the ready lock pairs each `isready` with its `readyok`,
//! - the accumulator lock guards the evaluation fold against the reader.
//!
//! Waiting operations have `_timeout` variants that cancel at a wall-clock
//! deadline: a timed-out search writes a best-effort `stop` and resolves as
//! cancelled, and the engine's late `bestmove` is silently absorbed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::eval::{EvalAccumulator, EvaluationCollection};
use crate::limit::SearchLimit;
use crate::parse::{normalize_lan, parse_best_move, InfoLine};
use crate::transport::{EngineTransport, TransportError};

/// Errors surfaced by session and pool operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The UCI handshake did not complete.
    #[error("engine initialization failed: {0}")]
    Init(String),
    /// The session or pool has been disposed.
    #[error("session is terminated")]
    Terminated,
    /// A caller-supplied value was unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The engine emitted a malformed `bestmove` line.
    #[error("malformed bestmove line: {0:?}")]
    ProtocolViolation(String),
    /// A search finished without any scored `info` lines.
    #[error("search produced no evaluations")]
    NoEvaluation,
    /// Pool lookup by an unknown engine name.
    #[error("no engine registered under {0:?}")]
    NoSuchEngine(String),
    /// A waiting operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, reader not running.
    New,
    /// Reader running, handshake not yet attempted.
    Starting,
    /// `uci` sent, waiting for `uciok`.
    Handshaking,
    /// Handshake complete, no search in flight.
    Ready,
    /// A search is in flight.
    Searching,
    /// Disposed, or the engine went away. Absorbing.
    Terminated,
}

/// Engine identification captured during the handshake.
#[derive(Debug, Clone, Default)]
pub struct EngineIdentity {
    /// Value of the `id name` line, if the engine sent one.
    pub name: Option<String>,
    /// Value of the `id author` line, if the engine sent one.
    pub author: Option<String>,
}

/// Single-assignment completion handles for in-flight requests.
#[derive(Default)]
struct Pending {
    handshake: Option<oneshot::Sender<()>>,
    ready: Option<oneshot::Sender<()>>,
    best_move: Option<oneshot::Sender<Result<String, EngineError>>>,
    evaluation: Option<oneshot::Sender<Result<EvaluationCollection, EngineError>>>,
}

/// State shared between the public operations and the reader task.
struct Shared {
    state: StdMutex<SessionState>,
    initialized: AtomicBool,
    disposed: AtomicBool,
    pending: StdMutex<Pending>,
    accumulator: StdMutex<EvalAccumulator>,
    identity: StdMutex<EngineIdentity>,
    on_dispose: StdMutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.lock().expect("state lock")
    }

    fn set_terminated(&self) {
        *self.state.lock().expect("state lock") = SessionState::Terminated;
    }

    /// Drops every outstanding completion handle so waiters observe
    /// termination.
    fn fail_pending(&self) {
        let mut pending = self.pending.lock().expect("pending lock");
        pending.handshake = None;
        pending.ready = None;
        pending.best_move = None;
        pending.evaluation = None;
    }
}

/// A live UCI session over an engine transport.
///
/// # Lifecycle
///
/// 1. Construct with [`UciSession::new`], call [`start`](Self::start)
/// 2. [`handshake`](Self::handshake), then [`wait_ready`](Self::wait_ready)
/// 3. Issue position/search/option operations
/// 4. [`dispose`](Self::dispose) (idempotent) tears the engine down
pub struct UciSession {
    transport: Arc<dyn EngineTransport>,
    shared: Arc<Shared>,
    write_lock: Mutex<()>,
    search_lock: Mutex<()>,
    ready_lock: Mutex<()>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl UciSession {
    /// Creates a session over a transport. The reader does not run until
    /// [`start`](Self::start).
    pub fn new<T: EngineTransport>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Creates a session over a shared transport handle.
    pub fn from_arc(transport: Arc<dyn EngineTransport>) -> Self {
        UciSession {
            transport,
            shared: Arc::new(Shared {
                state: StdMutex::new(SessionState::New),
                initialized: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                pending: StdMutex::new(Pending::default()),
                accumulator: StdMutex::new(EvalAccumulator::default()),
                identity: StdMutex::new(EngineIdentity::default()),
                on_dispose: StdMutex::new(None),
            }),
            write_lock: Mutex::new(()),
            search_lock: Mutex::new(()),
            ready_lock: Mutex::new(()),
            reader: StdMutex::new(None),
        }
    }

    /// Takes the transport's line stream and starts the background reader.
    pub fn start(&self) -> Result<(), EngineError> {
        {
            let mut state = self.shared.state.lock().expect("state lock");
            match *state {
                SessionState::New => {}
                SessionState::Terminated => return Err(EngineError::Terminated),
                _ => {
                    return Err(EngineError::Init("session already started".to_string()));
                }
            }
            *state = SessionState::Starting;
        }
        let lines = self.transport.take_lines().ok_or_else(|| {
            EngineError::Init("engine line stream already taken".to_string())
        })?;
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run_reader(shared, lines));
        *self.reader.lock().expect("reader lock") = Some(handle);
        Ok(())
    }

    /// Performs the UCI handshake: sends `uci` and waits for `uciok`.
    pub async fn handshake(&self) -> Result<(), EngineError> {
        self.handshake_with_deadline(None).await
    }

    /// [`handshake`](Self::handshake) cancelled at a wall-clock deadline.
    pub async fn handshake_timeout(&self, deadline: Duration) -> Result<(), EngineError> {
        self.handshake_with_deadline(Some(deadline)).await
    }

    async fn handshake_with_deadline(
        &self,
        deadline: Option<Duration>,
    ) -> Result<(), EngineError> {
        {
            let mut state = self.shared.state.lock().expect("state lock");
            match *state {
                SessionState::New => {
                    return Err(EngineError::Init("session not started".to_string()))
                }
                SessionState::Terminated => return Err(EngineError::Terminated),
                _ => *state = SessionState::Handshaking,
            }
        }
        let rx = {
            let (tx, rx) = oneshot::channel();
            self.shared.pending.lock().expect("pending lock").handshake = Some(tx);
            rx
        };
        if let Err(err) = self.write("uci").await {
            self.shared.pending.lock().expect("pending lock").handshake = None;
            self.exit_handshaking();
            return Err(EngineError::Init(err.to_string()));
        }
        match await_response(rx, deadline).await {
            Ok(()) => {
                self.shared.initialized.store(true, Ordering::SeqCst);
                let mut state = self.shared.state.lock().expect("state lock");
                if *state == SessionState::Handshaking {
                    *state = SessionState::Ready;
                }
                Ok(())
            }
            Err(EngineError::Cancelled) => {
                // The engine's late uciok is harmlessly dropped; the session
                // stays usable for another attempt.
                self.shared.pending.lock().expect("pending lock").handshake = None;
                self.exit_handshaking();
                Err(EngineError::Cancelled)
            }
            Err(err) => Err(EngineError::Init(err.to_string())),
        }
    }

    /// Reverts a failed handshake attempt: no `uci` is waiting for its
    /// `uciok` anymore.
    fn exit_handshaking(&self) {
        let mut state = self.shared.state.lock().expect("state lock");
        if *state == SessionState::Handshaking {
            *state = SessionState::Starting;
        }
    }

    /// Sends `isready` and waits for `readyok`.
    pub async fn wait_ready(&self) -> Result<(), EngineError> {
        self.wait_ready_with_deadline(None).await
    }

    /// [`wait_ready`](Self::wait_ready) cancelled at a wall-clock deadline.
    pub async fn wait_ready_timeout(&self, deadline: Duration) -> Result<(), EngineError> {
        self.wait_ready_with_deadline(Some(deadline)).await
    }

    async fn wait_ready_with_deadline(
        &self,
        deadline: Option<Duration>,
    ) -> Result<(), EngineError> {
        let _ready = self.ready_lock.lock().await;
        self.ensure_initialized()?;
        let rx = {
            let (tx, rx) = oneshot::channel();
            self.shared.pending.lock().expect("pending lock").ready = Some(tx);
            rx
        };
        if let Err(err) = self.write("isready").await {
            self.shared.pending.lock().expect("pending lock").ready = None;
            return Err(err);
        }
        match await_response(rx, deadline).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shared.pending.lock().expect("pending lock").ready = None;
                Err(err)
            }
        }
    }

    /// Sends `ucinewgame`.
    pub async fn new_game(&self) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        self.write("ucinewgame").await
    }

    /// Sends a `position` command.
    ///
    /// With a FEN the command is `position fen <FEN> [moves ...]`, otherwise
    /// `position startpos [moves ...]`. Moves are normalized to the UCI wire
    /// form (`e7e8=Q` becomes `e7e8q`).
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] when `fen` is provided but empty.
    pub async fn set_position(
        &self,
        fen: Option<&str>,
        moves: &[String],
    ) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        let mut command = match fen {
            Some(fen) if fen.trim().is_empty() => {
                return Err(EngineError::InvalidInput("empty FEN".to_string()))
            }
            Some(fen) => format!("position fen {}", fen),
            None => "position startpos".to_string(),
        };
        if !moves.is_empty() {
            command.push_str(" moves");
            for mv in moves {
                command.push(' ');
                command.push_str(&normalize_lan(mv));
            }
        }
        self.write(&command).await
    }

    /// Sends `setoption name <name> value <value>`.
    pub async fn set_option(&self, name: &str, value: &str) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        self.write(&format!("setoption name {} value {}", name, value))
            .await
    }

    /// Sets the engine's MultiPV option.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] when `lines` is zero.
    pub async fn set_multi_pv(&self, lines: u32) -> Result<(), EngineError> {
        if lines < 1 {
            return Err(EngineError::InvalidInput(
                "MultiPV must be at least 1".to_string(),
            ));
        }
        self.set_option("MultiPV", &lines.to_string()).await
    }

    /// Runs a search bounded by `limit` and returns the engine's best move.
    ///
    /// At most one search runs at a time; concurrent calls queue on the
    /// search lock.
    pub async fn get_best_move(&self, limit: SearchLimit) -> Result<String, EngineError> {
        self.get_best_move_with_deadline(limit, None).await
    }

    /// [`get_best_move`](Self::get_best_move) cancelled at a wall-clock
    /// deadline. On expiry a best-effort `stop` is written and the engine's
    /// late `bestmove` is discarded.
    pub async fn get_best_move_timeout(
        &self,
        limit: SearchLimit,
        deadline: Duration,
    ) -> Result<String, EngineError> {
        self.get_best_move_with_deadline(limit, Some(deadline)).await
    }

    async fn get_best_move_with_deadline(
        &self,
        limit: SearchLimit,
        deadline: Option<Duration>,
    ) -> Result<String, EngineError> {
        let _search = self.search_lock.lock().await;
        self.ensure_initialized()?;
        let rx = {
            let (tx, rx) = oneshot::channel();
            self.shared.pending.lock().expect("pending lock").best_move = Some(tx);
            rx
        };
        if let Err(err) = self.begin_search(limit).await {
            self.shared.pending.lock().expect("pending lock").best_move = None;
            return Err(err);
        }
        match await_response(rx, deadline).await {
            Ok(outcome) => outcome,
            Err(EngineError::Cancelled) => {
                self.cancel_search().await;
                Err(EngineError::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    /// Runs a search bounded by `limit`, accumulating every scored `info`
    /// line, and returns the deepest evaluation per multi-PV rank.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoEvaluation`] when the search terminated without a
    /// single scored `info` line.
    pub async fn evaluate(&self, limit: SearchLimit) -> Result<EvaluationCollection, EngineError> {
        self.evaluate_with_deadline(limit, None).await
    }

    /// [`evaluate`](Self::evaluate) cancelled at a wall-clock deadline.
    pub async fn evaluate_timeout(
        &self,
        limit: SearchLimit,
        deadline: Duration,
    ) -> Result<EvaluationCollection, EngineError> {
        self.evaluate_with_deadline(limit, Some(deadline)).await
    }

    async fn evaluate_with_deadline(
        &self,
        limit: SearchLimit,
        deadline: Option<Duration>,
    ) -> Result<EvaluationCollection, EngineError> {
        let _search = self.search_lock.lock().await;
        self.ensure_initialized()?;
        self.shared
            .accumulator
            .lock()
            .expect("accumulator lock")
            .begin();
        let rx = {
            let (tx, rx) = oneshot::channel();
            self.shared.pending.lock().expect("pending lock").evaluation = Some(tx);
            rx
        };
        if let Err(err) = self.begin_search(limit).await {
            self.shared.pending.lock().expect("pending lock").evaluation = None;
            self.shared
                .accumulator
                .lock()
                .expect("accumulator lock")
                .cancel();
            return Err(err);
        }
        match await_response(rx, deadline).await {
            Ok(outcome) => outcome,
            Err(EngineError::Cancelled) => {
                self.cancel_search().await;
                Err(EngineError::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    /// Asks the engine to cut the current search short. The search still
    /// terminates through its `bestmove`, which resolves the waiting caller.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        self.write("stop").await
    }

    /// Tears the session down: fires the dispose notification, fails any
    /// outstanding completion with a terminated error, and terminates the
    /// transport. Idempotent.
    pub async fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        // The notification fires exactly once, before the engine resources
        // are released, so pool permits can be returned race-free.
        let hook = self
            .shared
            .on_dispose
            .lock()
            .expect("dispose hook lock")
            .take();
        if let Some(hook) = hook {
            hook();
        }
        self.shared.set_terminated();
        self.shared.fail_pending();
        self.shared
            .accumulator
            .lock()
            .expect("accumulator lock")
            .cancel();
        let _ = self.transport.write_line("quit").await;
        self.transport.dispose().await;
        if let Some(handle) = self.reader.lock().expect("reader lock").take() {
            handle.abort();
        }
    }

    /// Registers the one-shot disposed notification.
    ///
    /// If the session is already disposed the hook runs immediately.
    pub fn on_dispose<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.shared.on_dispose.lock().expect("dispose hook lock");
        if self.shared.disposed.load(Ordering::SeqCst) {
            drop(slot);
            hook();
        } else {
            *slot = Some(Box::new(hook));
        }
    }

    /// True once the handshake has completed, until dispose.
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
            && self.shared.state() != SessionState::Terminated
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Engine identification captured during the handshake.
    pub fn identity(&self) -> EngineIdentity {
        self.shared.identity.lock().expect("identity lock").clone()
    }

    /// Writes the `go` command and enters the searching state.
    async fn begin_search(&self, limit: SearchLimit) -> Result<(), EngineError> {
        {
            let mut state = self.shared.state.lock().expect("state lock");
            if *state == SessionState::Terminated {
                return Err(EngineError::Terminated);
            }
            *state = SessionState::Searching;
        }
        if let Err(err) = self.write(&limit.to_go_command()).await {
            let mut state = self.shared.state.lock().expect("state lock");
            if *state == SessionState::Searching {
                *state = SessionState::Ready;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Cancels an in-flight search: tears down the completion handles, then
    /// writes a single best-effort `stop` if the engine is still searching.
    /// The searching state exits when the engine's `bestmove` eventually
    /// arrives and is discarded.
    async fn cancel_search(&self) {
        {
            let mut pending = self.shared.pending.lock().expect("pending lock");
            pending.best_move = None;
            pending.evaluation = None;
        }
        self.shared
            .accumulator
            .lock()
            .expect("accumulator lock")
            .cancel();
        if self.shared.state() == SessionState::Searching {
            let _ = self.write("stop").await;
        }
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.shared.state() == SessionState::Terminated {
            return Err(EngineError::Terminated);
        }
        if !self.shared.initialized.load(Ordering::SeqCst) {
            return Err(EngineError::Init(
                "engine handshake has not completed".to_string(),
            ));
        }
        Ok(())
    }

    /// Writes one command line under the write lock.
    async fn write(&self, line: &str) -> Result<(), EngineError> {
        let _write = self.write_lock.lock().await;
        match self.transport.write_line(line).await {
            Ok(()) => Ok(()),
            Err(TransportError::Closed) => {
                // The process is gone; the session is unusable from here on.
                self.shared.set_terminated();
                Err(EngineError::Terminated)
            }
            Err(err) => Err(EngineError::Transport(err)),
        }
    }
}

/// Awaits a completion handle, optionally bounded by a deadline.
async fn await_response<T>(
    rx: oneshot::Receiver<T>,
    deadline: Option<Duration>,
) -> Result<T, EngineError> {
    match deadline {
        None => rx.await.map_err(|_| EngineError::Terminated),
        Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(EngineError::Terminated),
            Err(_) => Err(EngineError::Cancelled),
        },
    }
}

/// Background consumer for the engine's output stream.
async fn run_reader(shared: Arc<Shared>, mut lines: mpsc::Receiver<String>) {
    while let Some(line) = lines.recv().await {
        route_line(&shared, line.trim());
    }
    // The engine's output ended: fail whatever is still waiting.
    shared.set_terminated();
    shared.fail_pending();
}

/// Routes one output line to its completion handle.
fn route_line(shared: &Shared, line: &str) {
    tracing::trace!(response = line, "engine >");
    if line == "uciok" {
        let handle = shared.pending.lock().expect("pending lock").handshake.take();
        if let Some(tx) = handle {
            let _ = tx.send(());
        }
    } else if line == "readyok" {
        let handle = shared.pending.lock().expect("pending lock").ready.take();
        if let Some(tx) = handle {
            let _ = tx.send(());
        }
    } else if line.starts_with("info") {
        if shared.state() == SessionState::Searching {
            if let Some(info) = InfoLine::parse(line) {
                shared
                    .accumulator
                    .lock()
                    .expect("accumulator lock")
                    .fold(&info);
            }
        }
    } else if line.starts_with("bestmove") {
        route_best_move(shared, line);
    } else if let Some(name) = line.strip_prefix("id name ") {
        shared.identity.lock().expect("identity lock").name = Some(name.to_string());
    } else if let Some(author) = line.strip_prefix("id author ") {
        shared.identity.lock().expect("identity lock").author = Some(author.to_string());
    }
    // Anything else is discarded.
}

fn route_best_move(shared: &Shared, line: &str) {
    let (best_tx, eval_tx) = {
        let mut pending = shared.pending.lock().expect("pending lock");
        (pending.best_move.take(), pending.evaluation.take())
    };
    {
        let mut state = shared.state.lock().expect("state lock");
        if *state == SessionState::Searching {
            *state = SessionState::Ready;
        }
    }
    if best_tx.is_none() && eval_tx.is_none() {
        // Stray line, or the search was cancelled: some engines emit these.
        tracing::debug!(response = line, "discarding bestmove with no pending search");
        return;
    }
    match parse_best_move(line) {
        Some(best) => {
            if let Some(tx) = eval_tx {
                let snapshot = shared
                    .accumulator
                    .lock()
                    .expect("accumulator lock")
                    .snapshot();
                let _ = tx.send(snapshot.ok_or(EngineError::NoEvaluation));
            }
            if let Some(tx) = best_tx {
                let _ = tx.send(Ok(best));
            }
        }
        None => {
            if let Some(tx) = eval_tx {
                shared
                    .accumulator
                    .lock()
                    .expect("accumulator lock")
                    .cancel();
                let _ = tx.send(Err(EngineError::ProtocolViolation(line.to_string())));
            }
            if let Some(tx) = best_tx {
                let _ = tx.send(Err(EngineError::ProtocolViolation(line.to_string())));
            }
        }
    }
}
