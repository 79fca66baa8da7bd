//! Search bounds for the `go` command.

use std::fmt;
use std::time::Duration;

/// How far a single search is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Search to a fixed depth in plies.
    Depth(u32),
    /// Search for a fixed wall-clock duration.
    MoveTime(Duration),
    /// Search a fixed number of nodes.
    Nodes(u64),
    /// Search for a mate in at most N moves.
    Mate(u32),
    /// Search until told to stop.
    Infinite,
}

impl SearchLimit {
    /// Renders the `go` command for this limit.
    ///
    /// Durations are rendered as total milliseconds.
    pub fn to_go_command(self) -> String {
        match self {
            SearchLimit::Depth(depth) => format!("go depth {}", depth),
            SearchLimit::MoveTime(time) => format!("go movetime {}", time.as_millis()),
            SearchLimit::Nodes(nodes) => format!("go nodes {}", nodes),
            SearchLimit::Mate(moves) => format!("go mate {}", moves),
            SearchLimit::Infinite => "go infinite".to_string(),
        }
    }
}

impl fmt::Display for SearchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchLimit::Depth(depth) => write!(f, "depth {}", depth),
            SearchLimit::MoveTime(time) => write!(f, "movetime {}ms", time.as_millis()),
            SearchLimit::Nodes(nodes) => write!(f, "nodes {}", nodes),
            SearchLimit::Mate(moves) => write!(f, "mate {}", moves),
            SearchLimit::Infinite => write!(f, "infinite"),
        }
    }
}
