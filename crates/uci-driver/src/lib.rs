//! Host-side driver for chess engines speaking the Universal Chess
//! Interface (UCI).
//!
//! The driver spawns an engine as a child process, mediates the line-based
//! request/response protocol, and exposes typed operations for position
//! setup, move search, and multi-line evaluation.
//!
//! # Modules
//!
//! - [`transport`] - process spawning and line-oriented I/O
//! - [`parse`] - `bestmove` and `info` response parsers
//! - [`limit`] - search bounds for the `go` command
//! - [`eval`] - evaluation records and the per-search accumulator
//! - [`session`] - the UCI session state machine
//! - [`pool`] - named engine registry with bounded checkout
//!
//! # Example
//!
//! ```no_run
//! use uci_driver::{EngineDefinition, SearchLimit};
//!
//! # async fn run() -> Result<(), uci_driver::EngineError> {
//! let engine = EngineDefinition::new("/usr/bin/stockfish")
//!     .option("Threads", "1")
//!     .launch()
//!     .await?;
//! engine.new_game().await?;
//! engine.set_position(None, &["e2e4".to_string()]).await?;
//! let best = engine.get_best_move(SearchLimit::Depth(12)).await?;
//! println!("best reply: {}", best);
//! engine.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod eval;
pub mod limit;
pub mod parse;
pub mod pool;
pub mod session;
pub mod transport;

pub use eval::{Evaluation, EvaluationCollection};
pub use limit::SearchLimit;
pub use parse::{normalize_lan, parse_best_move, InfoLine};
pub use pool::{EngineDefinition, EnginePool, DEFAULT_CAPACITY};
pub use session::{EngineError, EngineIdentity, SessionState, UciSession};
pub use transport::{EngineTransport, ProcessTransport, TransportError};
