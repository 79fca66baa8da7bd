//! Engine process transport.
//!
//! A transport owns the line-oriented plumbing to one engine: a writer task
//! that serializes commands onto the engine's stdin and a reader task that
//! pumps decoded stdout lines into a channel. The session layer never touches
//! process handles directly.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Depth of the stdin/stdout line channels.
const CHANNEL_CAPACITY: usize = 100;

/// Errors from the transport layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to spawn the engine process.
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[from] std::io::Error),
    /// The engine process did not expose the expected pipe.
    #[error("engine process did not expose {0}")]
    MissingPipe(&'static str),
    /// The transport has been disposed or the engine process is gone.
    #[error("engine transport is closed")]
    Closed,
}

/// Line-oriented, full-duplex link to an engine process.
///
/// Implementations append the line terminator, flush after every write, and
/// decode output lines without their terminator. After
/// [`dispose`](Self::dispose), writes fail with [`TransportError::Closed`].
#[async_trait]
pub trait EngineTransport: Send + Sync + 'static {
    /// Queues one command line for the engine.
    async fn write_line(&self, line: &str) -> Result<(), TransportError>;

    /// Takes the stream of decoded output lines.
    ///
    /// Yields the receiver once; subsequent calls return `None`. The channel
    /// closes when the engine's output stream ends.
    fn take_lines(&self) -> Option<mpsc::Receiver<String>>;

    /// Terminates the engine process and stops the pump tasks.
    async fn dispose(&self);
}

/// [`EngineTransport`] over a spawned child process.
pub struct ProcessTransport {
    stdin_tx: mpsc::Sender<String>,
    lines_rx: Mutex<Option<mpsc::Receiver<String>>>,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
}

impl ProcessTransport {
    /// Spawns the engine executable with piped standard streams and starts
    /// the background reader and writer tasks.
    pub fn spawn<P: AsRef<Path>>(program: P, args: &[String]) -> Result<Self, TransportError> {
        let mut child = Command::new(program.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                if stdin.write_all(cmd.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        let (lines_tx, lines_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if lines_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        Ok(ProcessTransport {
            stdin_tx,
            lines_rx: Mutex::new(Some(lines_rx)),
            child: Mutex::new(Some(child)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl EngineTransport for ProcessTransport {
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        tracing::trace!(command = line, "engine <");
        self.stdin_tx
            .send(line.to_string())
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn take_lines(&self) -> Option<mpsc::Receiver<String>> {
        self.lines_rx.lock().expect("lines lock").take()
    }

    async fn dispose(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let child = self.child.lock().expect("child lock").take();
        if let Some(mut child) = child {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

impl Drop for ProcessTransport {
    /// Best-effort kill so an undisposed transport does not leak the child.
    fn drop(&mut self) {
        if let Some(child) = self.child.lock().expect("child lock").as_mut() {
            let _ = child.start_kill();
        }
    }
}
