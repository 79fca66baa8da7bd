//! Standard Algebraic Notation (SAN) to Long Algebraic Notation (LAN) conversion.
//!
//! SAN is how games are recorded ("Nf3", "exd5", "O-O", "e8=Q"); LAN is the
//! source-destination form UCI engines consume ("g1f3", "e4d5", "e1g1",
//! "e7e8=Q"). Resolving SAN requires board state, so the converter keeps a
//! [`Board`] and replays every converted move onto it.

use crate::square::{file_from_char, rank_from_char};
use crate::{Board, CastleSide, Piece, Square};
use thiserror::Error;

/// Errors produced while converting SAN moves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanError {
    /// The SAN token is empty or whitespace.
    #[error("empty SAN token")]
    Empty,
    /// The SAN token does not have a recognizable move shape.
    #[error("invalid SAN token: {0}")]
    InvalidFormat(String),
    /// No piece of the requested kind can geometrically reach the destination.
    #[error("no matching piece for move: {0}")]
    NoMatchingMove(String),
}

/// Stateful SAN to LAN translator.
///
/// Starts at the standard starting position. Each successful
/// [`convert`](Self::convert) call executes the move on the internal board,
/// so moves must be fed in game order. [`reset`](Self::reset) rewinds to the
/// starting position for the next game.
///
/// # Example
///
/// ```
/// use chess_notation::SanConverter;
///
/// let mut converter = SanConverter::new();
/// assert_eq!(converter.convert("e4").unwrap(), "e2e4");
/// assert_eq!(converter.convert("e5").unwrap(), "e7e5");
/// assert_eq!(converter.convert("Nf3").unwrap(), "g1f3");
/// ```
#[derive(Debug, Clone)]
pub struct SanConverter {
    board: Board,
}

/// The parsed components of one SAN token.
#[derive(Debug)]
struct SanParts {
    piece: Piece,
    dest: Square,
    file_hint: Option<u8>,
    rank_hint: Option<u8>,
    promotion: Option<Piece>,
}

impl SanConverter {
    /// Creates a converter at the starting position, white to move.
    pub fn new() -> Self {
        SanConverter {
            board: Board::new(),
        }
    }

    /// Returns the converter to the starting position, white to move.
    ///
    /// Idempotent: calling it twice is the same as calling it once.
    pub fn reset(&mut self) {
        self.board.reset();
    }

    /// Returns the current board state.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Converts a single SAN token to LAN and executes it on the board.
    ///
    /// Promotions are emitted as `e7e8=Q`; UCI engines expect the lowercase
    /// no-equals form, which the session layer applies when building the
    /// `position` command.
    ///
    /// # Errors
    ///
    /// [`SanError::Empty`] for blank input, [`SanError::InvalidFormat`] for
    /// tokens without a move shape, and [`SanError::NoMatchingMove`] when no
    /// piece of the requested kind can geometrically reach the destination.
    pub fn convert(&mut self, san: &str) -> Result<String, SanError> {
        let token = san.trim();
        if token.is_empty() {
            return Err(SanError::Empty);
        }
        let token = token.trim_end_matches(['+', '#', '!', '?']);

        if let Some(side) = castle_side(token) {
            let rank = self.board.side_to_move().home_rank();
            let king_from = Square::new(4, rank).expect("king square");
            let king_to_file = match side {
                CastleSide::King => 6,
                CastleSide::Queen => 2,
            };
            let king_to = Square::new(king_to_file, rank).expect("king destination");
            self.board.castle(side);
            return Ok(format!("{}{}", king_from, king_to));
        }

        let parts = parse_san(token).ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
        let from = self
            .resolve_source(&parts)
            .ok_or_else(|| SanError::NoMatchingMove(san.to_string()))?;

        let mut lan = format!("{}{}", from, parts.dest);
        if let Some(promo) = parts.promotion {
            lan.push('=');
            lan.push(promo.to_san_char());
        }
        self.board.execute(from, parts.dest, parts.promotion);
        Ok(lan)
    }

    /// Converts a whole SAN move list, in order, to LAN.
    ///
    /// The board is left at the position after the last move; callers
    /// normally [`reset`](Self::reset) between games.
    pub fn convert_all<'a, I>(&mut self, moves: I) -> Result<Vec<String>, SanError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        moves.into_iter().map(|san| self.convert(san)).collect()
    }

    /// Finds the source square for a parsed SAN move.
    ///
    /// Scans rank ascending, file ascending; when disambiguation leaves more
    /// than one geometric candidate, the first in scan order wins.
    fn resolve_source(&self, parts: &SanParts) -> Option<Square> {
        let color = self.board.side_to_move();
        Square::all().find(|&from| {
            self.board.piece_at(from) == Some((parts.piece, color))
                && parts.file_hint.map_or(true, |f| from.file() == f)
                && parts.rank_hint.map_or(true, |r| from.rank() == r)
                && self.board.can_reach(parts.piece, color, from, parts.dest)
        })
    }

    /// Builds a converter over an arbitrary position, for tests.
    #[cfg(test)]
    pub(crate) fn from_board(board: Board) -> Self {
        SanConverter { board }
    }
}

impl Default for SanConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn castle_side(token: &str) -> Option<CastleSide> {
    match token {
        "O-O" | "0-0" => Some(CastleSide::King),
        "O-O-O" | "0-0-0" => Some(CastleSide::Queen),
        _ => None,
    }
}

/// Splits a (suffix-stripped, non-castling) SAN token into its components.
fn parse_san(token: &str) -> Option<SanParts> {
    let mut body = token;

    // Promotion suffix: "=Q" and friends.
    let mut promotion = None;
    if let Some(idx) = body.find('=') {
        let suffix = &body[idx + 1..];
        if suffix.chars().count() != 1 {
            return None;
        }
        let kind = Piece::from_san_char(suffix.chars().next()?)?;
        if !kind.is_promotion_target() {
            return None;
        }
        promotion = Some(kind);
        body = &body[..idx];
    }

    // The capture indicator carries no information LAN needs.
    let body: String = body.chars().filter(|&c| c != 'x').collect();
    let mut chars: Vec<char> = body.chars().collect();
    if chars.is_empty() {
        return None;
    }

    // Leading uppercase letter (other than O) names the piece; pawns have none.
    let piece = match Piece::from_san_char(chars[0]) {
        Some(p) => {
            chars.remove(0);
            p
        }
        None => Piece::Pawn,
    };

    // The last two characters are the destination.
    if chars.len() < 2 {
        return None;
    }
    let rank = rank_from_char(chars.pop()?)?;
    let file = file_from_char(chars.pop()?)?;
    let dest = Square::new(file, rank)?;

    // Whatever remains disambiguates the source: a file, a rank, or both.
    let mut file_hint = None;
    let mut rank_hint = None;
    for c in chars {
        if let Some(f) = file_from_char(c) {
            if file_hint.replace(f).is_some() {
                return None;
            }
        } else if let Some(r) = rank_from_char(c) {
            if rank_hint.replace(r).is_some() {
                return None;
            }
        } else {
            return None;
        }
    }

    Some(SanParts {
        piece,
        dest,
        file_hint,
        rank_hint,
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    #[test]
    fn rejects_empty_input() {
        let mut converter = SanConverter::new();
        assert_eq!(converter.convert(""), Err(SanError::Empty));
        assert_eq!(converter.convert("   "), Err(SanError::Empty));
    }

    #[test]
    fn rejects_garbage_tokens() {
        let mut converter = SanConverter::new();
        assert!(matches!(
            converter.convert("hello"),
            Err(SanError::InvalidFormat(_))
        ));
        assert!(matches!(
            converter.convert("Zf3"),
            Err(SanError::InvalidFormat(_))
        ));
    }

    #[test]
    fn pawn_push() {
        let mut converter = SanConverter::new();
        assert_eq!(converter.convert("e4").unwrap(), "e2e4");
        assert_eq!(converter.convert("e5").unwrap(), "e7e5");
        assert_eq!(converter.convert("e3").unwrap(), "e2e3");
    }

    #[test]
    fn knight_move_with_check_suffix() {
        let mut converter = SanConverter::new();
        assert_eq!(converter.convert("Nf3+").unwrap(), "g1f3");
    }

    #[test]
    fn annotations_are_stripped() {
        let mut converter = SanConverter::new();
        assert_eq!(converter.convert("e4!?").unwrap(), "e2e4");
        assert_eq!(converter.convert("d5!").unwrap(), "d7d5");
        assert_eq!(converter.convert("exd5#").unwrap(), "e4d5");
    }

    #[test]
    fn pawn_capture_uses_file_hint() {
        let mut converter = SanConverter::new();
        converter.convert("e4").unwrap();
        converter.convert("d5").unwrap();
        assert_eq!(converter.convert("exd5").unwrap(), "e4d5");
    }

    #[test]
    fn italian_game() {
        let mut converter = SanConverter::new();
        let sans = ["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "O-O", "Nf6", "d3", "d6"];
        let lans = converter.convert_all(sans).unwrap();
        assert_eq!(
            lans,
            vec![
                "e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "e1g1", "g8f6", "d2d3", "d7d6"
            ]
        );
    }

    #[test]
    fn castling_produces_fixed_squares() {
        let mut white_kingside = SanConverter::new();
        assert_eq!(white_kingside.convert("O-O").unwrap(), "e1g1");

        let mut white_queenside = SanConverter::new();
        assert_eq!(white_queenside.convert("O-O-O").unwrap(), "e1c1");

        let mut black = SanConverter::new();
        black.convert("e4").unwrap();
        assert_eq!(black.convert("O-O").unwrap(), "e8g8");

        let mut black_long = SanConverter::new();
        black_long.convert("e4").unwrap();
        assert_eq!(black_long.convert("0-0-0").unwrap(), "e8c8");
    }

    #[test]
    fn castling_moves_the_rook() {
        let mut converter = SanConverter::new();
        for san in ["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "O-O"] {
            converter.convert(san).unwrap();
        }
        let board = converter.board();
        assert_eq!(board.piece_at(sq("g1")), Some((Piece::King, Color::White)));
        assert_eq!(board.piece_at(sq("f1")), Some((Piece::Rook, Color::White)));
        assert_eq!(board.piece_at(sq("h1")), None);
    }

    #[test]
    fn promotion_emits_equals_suffix() {
        let mut board = Board::new();
        board.clear(sq("e7"));
        board.clear(sq("e8"));
        board.place(sq("e7"), Piece::Pawn, Color::White);
        let mut converter = SanConverter::from_board(board);
        assert_eq!(converter.convert("e8=Q").unwrap(), "e7e8=Q");
        assert_eq!(
            converter.board().piece_at(sq("e8")),
            Some((Piece::Queen, Color::White))
        );
    }

    #[test]
    fn underpromotion_with_capture() {
        let mut board = Board::new();
        board.clear(sq("g7"));
        board.clear(sq("g8"));
        board.place(sq("g7"), Piece::Pawn, Color::White);
        let mut converter = SanConverter::from_board(board);
        assert_eq!(converter.convert("gxh8=N").unwrap(), "g7h8=N");
    }

    #[test]
    fn rejects_promotion_to_king() {
        let mut converter = SanConverter::new();
        assert!(matches!(
            converter.convert("e8=K"),
            Err(SanError::InvalidFormat(_))
        ));
    }

    #[test]
    fn disambiguation_by_file_and_rank() {
        let mut board = Board::new();
        // Two white knights that can both reach d2.
        board.clear(sq("b1"));
        board.clear(sq("g1"));
        board.place(sq("b1"), Piece::Knight, Color::White);
        board.place(sq("f1"), Piece::Knight, Color::White);
        board.clear(sq("d2"));

        let mut converter = SanConverter::from_board(board.clone());
        assert_eq!(converter.convert("Nbd2").unwrap(), "b1d2");

        let mut converter = SanConverter::from_board(board);
        assert_eq!(converter.convert("Nfd2").unwrap(), "f1d2");
    }

    #[test]
    fn ambiguous_move_picks_first_in_scan_order() {
        let mut board = Board::new();
        board.clear(sq("b1"));
        board.clear(sq("g1"));
        board.place(sq("b1"), Piece::Knight, Color::White);
        board.place(sq("f1"), Piece::Knight, Color::White);
        board.clear(sq("d2"));

        // Without disambiguation both knights match; b1 comes first in
        // rank-ascending, file-ascending scan order.
        let mut converter = SanConverter::from_board(board);
        assert_eq!(converter.convert("Nd2").unwrap(), "b1d2");
    }

    #[test]
    fn unreachable_move_is_rejected_and_board_unchanged() {
        let mut converter = SanConverter::new();
        let before = converter.board().clone();
        assert!(matches!(
            converter.convert("Qh5"),
            Err(SanError::NoMatchingMove(_))
        ));
        assert_eq!(converter.board(), &before);
        // The converter is still usable afterwards.
        assert_eq!(converter.convert("e4").unwrap(), "e2e4");
    }

    #[test]
    fn reset_is_idempotent() {
        let mut converter = SanConverter::new();
        converter.convert("e4").unwrap();
        converter.reset();
        assert_eq!(converter.board(), &Board::new());
        converter.reset();
        assert_eq!(converter.board(), &Board::new());
        assert_eq!(converter.convert("e4").unwrap(), "e2e4");
    }

    #[test]
    fn lan_round_trip_reproduces_final_board() {
        let sans = [
            "e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "O-O", "Nf6", "d3", "d6",
        ];
        let mut converter = SanConverter::new();
        let lans = converter.convert_all(sans).unwrap();

        // Replaying the LAN moves through the executor on a fresh board must
        // land on the same final position.
        let mut board = Board::new();
        for lan in &lans {
            let from = Square::from_algebraic(&lan[0..2]).unwrap();
            let to = Square::from_algebraic(&lan[2..4]).unwrap();
            board.execute(from, to, None);
        }
        assert_eq!(&board, converter.board());
    }
}
