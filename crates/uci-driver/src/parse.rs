//! UCI response line parsers.
//!
//! Engines stream two kinds of interesting lines during a search: `info`
//! lines with progressively deeper evaluations, and a terminating `bestmove`
//! line. Both are parsed here, each parse independent of any other line.

use serde::Serialize;

/// Extracts the best move from a `bestmove` line.
///
/// Accepts `bestmove <move>` with an optional `ponder <move>` tail; the
/// ponder move is discarded. Returns `None` for anything else, including
/// trailing garbage after the recognized form.
///
/// # Example
///
/// ```
/// use uci_driver::parse::parse_best_move;
///
/// assert_eq!(
///     parse_best_move("bestmove e2e4 ponder e7e5").as_deref(),
///     Some("e2e4")
/// );
/// assert_eq!(parse_best_move("bestmove resign"), None);
/// ```
pub fn parse_best_move(line: &str) -> Option<String> {
    if !line.starts_with("bestmove") {
        return None;
    }
    let mut parts = line.split_whitespace();
    if parts.next() != Some("bestmove") {
        return None;
    }
    let best = parts.next()?;
    if !is_lan_move(best) {
        return None;
    }
    match parts.next() {
        None => Some(best.to_string()),
        Some("ponder") => {
            let ponder = parts.next()?;
            if is_lan_move(ponder) && parts.next().is_none() {
                Some(best.to_string())
            } else {
                None
            }
        }
        Some(_) => None,
    }
}

/// Checks the 4-5 character LAN move shape the UCI wire uses
/// (`e2e4`, `e7e8q`).
fn is_lan_move(s: &str) -> bool {
    let b = s.as_bytes();
    let squares_ok = b.len() >= 4
        && (b'a'..=b'h').contains(&b[0])
        && (b'1'..=b'8').contains(&b[1])
        && (b'a'..=b'h').contains(&b[2])
        && (b'1'..=b'8').contains(&b[3]);
    match b.len() {
        4 => squares_ok,
        5 => squares_ok && matches!(b[4], b'q' | b'r' | b'b' | b'n'),
        _ => false,
    }
}

/// Normalizes a LAN move to the UCI wire form.
///
/// The SAN converter emits promotions as `e7e8=Q`; engines expect `e7e8q`.
/// Moves already in wire form pass through unchanged.
pub fn normalize_lan(mv: &str) -> String {
    mv.chars()
        .filter(|&c| c != '=')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Structured view of one `info` line.
///
/// Absent keywords leave their field unset. The parser is single-shot per
/// line and keeps no state between lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfoLine {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Multi-PV rank (1 = best line).
    pub multipv: Option<u32>,
    /// Score in centipawns, from the side to move's perspective.
    pub score_cp: Option<i32>,
    /// Mate in N moves (negative = getting mated).
    pub score_mate: Option<i32>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Tablebase hits.
    pub tbhits: Option<u64>,
    /// Time spent searching in milliseconds.
    pub time_ms: Option<u64>,
    /// Principal variation - the expected best line of play.
    pub pv: Vec<String>,
}

impl InfoLine {
    /// Parses a UCI `info` line.
    ///
    /// Returns `None` for lines that are not `info` lines at all. Keywords
    /// drive a small state machine over whitespace-split tokens: integer
    /// keywords consume the next token, `score` consumes `cp <n>` or
    /// `mate <n>`, and `pv` consumes the rest of the line. Unknown keywords
    /// (and their arguments) are skipped.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line != "info" && !line.starts_with("info ") {
            return None;
        }

        let mut info = InfoLine::default();
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mut i = 1;

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    info.depth = parts.get(i).and_then(|s| s.parse().ok());
                }
                "seldepth" => {
                    i += 1;
                    info.seldepth = parts.get(i).and_then(|s| s.parse().ok());
                }
                "multipv" => {
                    i += 1;
                    info.multipv = parts.get(i).and_then(|s| s.parse().ok());
                }
                "score" => {
                    i += 1;
                    match parts.get(i) {
                        Some(&"cp") => {
                            i += 1;
                            info.score_cp = parts.get(i).and_then(|s| s.parse().ok());
                        }
                        Some(&"mate") => {
                            i += 1;
                            info.score_mate = parts.get(i).and_then(|s| s.parse().ok());
                        }
                        _ => {}
                    }
                }
                "nodes" => {
                    i += 1;
                    info.nodes = parts.get(i).and_then(|s| s.parse().ok());
                }
                "nps" => {
                    i += 1;
                    info.nps = parts.get(i).and_then(|s| s.parse().ok());
                }
                "hashfull" => {
                    i += 1;
                    info.hashfull = parts.get(i).and_then(|s| s.parse().ok());
                }
                "tbhits" => {
                    i += 1;
                    info.tbhits = parts.get(i).and_then(|s| s.parse().ok());
                }
                "time" => {
                    i += 1;
                    info.time_ms = parts.get(i).and_then(|s| s.parse().ok());
                }
                "pv" => {
                    info.pv = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }

    /// Returns the score in the engine's verbatim textual form: the bare
    /// centipawn integer, or `mate N`. `None` when the line carried no score.
    pub fn score(&self) -> Option<String> {
        if let Some(cp) = self.score_cp {
            Some(cp.to_string())
        } else {
            self.score_mate.map(|m| format!("mate {}", m))
        }
    }
}
