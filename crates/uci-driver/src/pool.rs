//! Bounded pool of named engine factories.
//!
//! A pool hands out ready-to-use sessions by name, never more than
//! `capacity` at a time. Checkout acquires a semaphore permit before any
//! engine is built, and the permit travels with the session: its dispose
//! notification returns the permit exactly once.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::session::{EngineError, UciSession};
use crate::transport::ProcessTransport;

/// Default number of concurrently checked-out engines.
pub const DEFAULT_CAPACITY: usize = 16;

type BoxedSessionFuture = Pin<Box<dyn Future<Output = Result<UciSession, EngineError>> + Send>>;
type EngineFactory = Arc<dyn Fn() -> BoxedSessionFuture + Send + Sync>;

/// How to launch one engine: executable, arguments, and options applied
/// right after the handshake.
#[derive(Debug, Clone)]
pub struct EngineDefinition {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// `setoption` pairs applied after a successful handshake.
    pub options: Vec<(String, String)>,
    /// Deadline for the handshake and readiness wait.
    pub init_timeout: Duration,
}

impl EngineDefinition {
    /// Creates a definition for the given executable with no arguments, no
    /// options, and a 10 second init deadline.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        EngineDefinition {
            path: path.into(),
            args: Vec::new(),
            options: Vec::new(),
            init_timeout: Duration::from_secs(10),
        }
    }

    /// Appends a command-line argument.
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends an option applied after the handshake.
    pub fn option<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    /// Spawns the engine and drives it to the ready state.
    pub async fn launch(&self) -> Result<UciSession, EngineError> {
        let transport = ProcessTransport::spawn(&self.path, &self.args)?;
        let session = UciSession::new(transport);
        session.start()?;
        if let Err(err) = self.initialize(&session).await {
            session.dispose().await;
            return Err(err);
        }
        Ok(session)
    }

    async fn initialize(&self, session: &UciSession) -> Result<(), EngineError> {
        session.handshake_timeout(self.init_timeout).await?;
        session.wait_ready_timeout(self.init_timeout).await?;
        for (name, value) in &self.options {
            session.set_option(name, value).await?;
        }
        Ok(())
    }
}

/// Named-factory registry with bounded concurrent checkout.
pub struct EnginePool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    registry: StdMutex<HashMap<String, EngineFactory>>,
    closed: AtomicBool,
}

impl EnginePool {
    /// Creates a pool that hands out at most `capacity` engines at a time.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be positive");
        EnginePool {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            registry: StdMutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Registers an engine factory under a name. A later registration under
    /// the same name replaces the earlier one.
    pub fn register<S, F, Fut>(&self, name: S, factory: F)
    where
        S: Into<String>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<UciSession, EngineError>> + Send + 'static,
    {
        let factory: EngineFactory = Arc::new(move || Box::pin(factory()));
        self.registry
            .lock()
            .expect("registry lock")
            .insert(name.into(), factory);
    }

    /// Registers a process-spawning factory from an engine definition.
    pub fn register_process<S: Into<String>>(&self, name: S, definition: EngineDefinition) {
        self.register(name, move || {
            let definition = definition.clone();
            async move { definition.launch().await }
        });
    }

    /// Checks an engine out by name, waiting for a permit if the pool is at
    /// capacity.
    ///
    /// The returned session holds one permit; disposing it returns the
    /// permit. A factory failure or unknown name releases the permit before
    /// surfacing the error.
    pub async fn checkout(&self, name: &str) -> Result<UciSession, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Terminated);
        }
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Terminated)?;
        let factory = self
            .registry
            .lock()
            .expect("registry lock")
            .get(name)
            .cloned();
        let Some(factory) = factory else {
            drop(permit);
            return Err(EngineError::NoSuchEngine(name.to_string()));
        };
        let session = factory().await?;
        // The permit now lives with the session; its one-shot dispose
        // notification puts the permit back.
        permit.forget();
        let semaphore = Arc::clone(&self.semaphore);
        session.on_dispose(move || {
            semaphore.add_permits(1);
        });
        Ok(session)
    }

    /// Closes the pool: waiting and future checkouts fail with a terminated
    /// error. Already checked-out engines are unaffected.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.semaphore.close();
        }
    }

    /// Configured maximum of concurrently checked-out engines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for EnginePool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity() {
        let pool = EnginePool::default();
        assert_eq!(pool.capacity(), DEFAULT_CAPACITY);
        assert_eq!(pool.available(), DEFAULT_CAPACITY);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_panics() {
        let _ = EnginePool::new(0);
    }

    #[tokio::test]
    async fn unknown_name_fails_and_releases_permit() {
        let pool = EnginePool::new(1);
        match pool.checkout("missing").await {
            Err(EngineError::NoSuchEngine(name)) => assert_eq!(name, "missing"),
            other => panic!("expected NoSuchEngine, got {:?}", other.err()),
        }
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn factory_failure_releases_permit() {
        let pool = EnginePool::new(1);
        pool.register("broken", || async {
            Err(EngineError::Init("engine exploded".to_string()))
        });
        match pool.checkout("broken").await {
            Err(EngineError::Init(_)) => {}
            other => panic!("expected Init error, got {:?}", other.err()),
        }
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn closed_pool_fails_checkouts() {
        let pool = EnginePool::new(2);
        pool.close();
        assert!(pool.is_closed());
        match pool.checkout("anything").await {
            Err(EngineError::Terminated) => {}
            other => panic!("expected Terminated, got {:?}", other.err()),
        }
    }
}
