//! Scripted in-memory engine transport for driver tests.
//!
//! No real engine binary is needed: tests script responses per command
//! and/or push lines into the session's reader by hand.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uci_driver::transport::{EngineTransport, TransportError};

/// Transport half handed to the session under test.
pub struct FakeTransport {
    sent: Arc<Mutex<Vec<String>>>,
    scripts: Arc<Mutex<HashMap<String, Vec<String>>>>,
    feed: Mutex<Option<mpsc::Sender<String>>>,
    lines: Mutex<Option<mpsc::Receiver<String>>>,
    closed: AtomicBool,
}

/// Test-side handle: scripts responses, injects lines, inspects writes.
pub struct FakeEngine {
    sent: Arc<Mutex<Vec<String>>>,
    scripts: Arc<Mutex<HashMap<String, Vec<String>>>>,
    feed: mpsc::Sender<String>,
}

impl FakeTransport {
    pub fn new() -> (FakeTransport, FakeEngine) {
        let (feed_tx, feed_rx) = mpsc::channel(256);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let scripts = Arc::new(Mutex::new(HashMap::new()));
        let transport = FakeTransport {
            sent: Arc::clone(&sent),
            scripts: Arc::clone(&scripts),
            feed: Mutex::new(Some(feed_tx.clone())),
            lines: Mutex::new(Some(feed_rx)),
            closed: AtomicBool::new(false),
        };
        let engine = FakeEngine {
            sent,
            scripts,
            feed: feed_tx,
        };
        (transport, engine)
    }
}

#[async_trait]
impl EngineTransport for FakeTransport {
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(line.to_string());
        let responses = self.scripts.lock().unwrap().get(line).cloned();
        if let Some(responses) = responses {
            let feed = self.feed.lock().unwrap().clone();
            if let Some(feed) = feed {
                for response in responses {
                    let _ = feed.send(response).await;
                }
            }
        }
        Ok(())
    }

    fn take_lines(&self) -> Option<mpsc::Receiver<String>> {
        self.lines.lock().unwrap().take()
    }

    async fn dispose(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.feed.lock().unwrap().take();
    }
}

impl FakeEngine {
    /// Scripts response lines for an exact command.
    pub fn respond_to(&self, command: &str, responses: &[&str]) {
        self.scripts.lock().unwrap().insert(
            command.to_string(),
            responses.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Scripts the standard handshake and readiness exchanges.
    pub fn script_handshake(&self) {
        self.respond_to(
            "uci",
            &[
                "id name Fake Engine 1.0",
                "id author The Test Suite",
                "option name Hash type spin default 16 min 1 max 65536",
                "uciok",
            ],
        );
        self.respond_to("isready", &["readyok"]);
    }

    /// Pushes one output line into the session's reader.
    pub async fn emit(&self, line: &str) {
        self.feed
            .send(line.to_string())
            .await
            .expect("session reader is gone");
    }

    /// Snapshot of every command the session has written.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// How many times an exact command was written.
    pub fn count_sent(&self, command: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.as_str() == command)
            .count()
    }
}
