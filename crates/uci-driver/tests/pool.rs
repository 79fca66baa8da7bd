//! Pool discipline against scripted fake engines.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeTransport;
use uci_driver::{EngineError, EnginePool, UciSession};

/// Factory body: builds a ready session over a fresh scripted transport.
async fn build_fake_session() -> Result<UciSession, EngineError> {
    let (transport, engine) = FakeTransport::new();
    engine.script_handshake();
    let session = UciSession::new(transport);
    session.start()?;
    session.handshake().await?;
    session.wait_ready().await?;
    Ok(session)
}

fn fake_pool(capacity: usize) -> Arc<EnginePool> {
    let pool = Arc::new(EnginePool::new(capacity));
    pool.register("fake", build_fake_session);
    pool
}

#[tokio::test]
async fn checkout_returns_initialized_engine() {
    let pool = fake_pool(2);
    let session = pool.checkout("fake").await.expect("checkout");
    assert!(session.is_initialized());
    assert_eq!(pool.available(), 1);
    session.dispose().await;
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn capacity_bounds_concurrent_checkouts() {
    let pool = fake_pool(1);
    let first = pool.checkout("fake").await.expect("first checkout");
    assert_eq!(pool.available(), 0);

    let waiting = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.checkout("fake").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiting.is_finished(), "checkout must wait for a permit");

    first.dispose().await;
    let second = waiting
        .await
        .expect("join")
        .expect("checkout after release");
    assert!(second.is_initialized());
    second.dispose().await;
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn double_dispose_releases_the_permit_once() {
    let pool = fake_pool(1);
    let session = pool.checkout("fake").await.expect("checkout");
    session.dispose().await;
    session.dispose().await;
    // A second release would push the count past capacity.
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn unknown_engine_name_fails_fast() {
    let pool = fake_pool(1);
    match pool.checkout("nonexistent").await {
        Err(EngineError::NoSuchEngine(name)) => assert_eq!(name, "nonexistent"),
        other => panic!("expected NoSuchEngine, got {:?}", other.err()),
    }
    // The permit taken for the failed lookup is back.
    assert_eq!(pool.available(), 1);
    let session = pool.checkout("fake").await.expect("checkout still works");
    session.dispose().await;
}

#[tokio::test]
async fn close_fails_waiting_and_future_checkouts() {
    let pool = fake_pool(1);
    let held = pool.checkout("fake").await.expect("checkout");

    let waiting = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.checkout("fake").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.close();

    match waiting.await.expect("join") {
        Err(EngineError::Terminated) => {}
        other => panic!("expected Terminated, got {:?}", other.err()),
    }
    match pool.checkout("fake").await {
        Err(EngineError::Terminated) => {}
        other => panic!("expected Terminated, got {:?}", other.err()),
    }

    // Engines already checked out keep working until disposed.
    assert!(held.is_initialized());
    held.dispose().await;
}

#[tokio::test]
async fn pool_runs_multiple_engines_concurrently() {
    let pool = fake_pool(3);
    let a = pool.checkout("fake").await.expect("a");
    let b = pool.checkout("fake").await.expect("b");
    let c = pool.checkout("fake").await.expect("c");
    assert_eq!(pool.available(), 0);
    for session in [a, b, c] {
        assert!(session.is_initialized());
        session.dispose().await;
    }
    assert_eq!(pool.available(), 3);
}
