//! 8x8 mailbox board for SAN move resolution.
//!
//! The board tracks square occupancy and the side to move, enough to answer
//! "which piece of this kind can geometrically reach that square". It does
//! not enforce chess legality: checks, pins, and en passant are outside its
//! contract.

use crate::{Color, Piece, Square};

/// Which wing a castling move targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastleSide {
    /// O-O: king to the g-file.
    King,
    /// O-O-O: king to the c-file.
    Queen,
}

/// An 8x8 mailbox of square occupants plus the side-to-move flag.
///
/// Created at the FIDE starting position. Mutated only through
/// [`Board::execute`] and [`Board::castle`]; [`Board::reset`] returns it to
/// the starting position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Option<(Piece, Color)>; 64],
    side_to_move: Color,
}

impl Board {
    /// Creates a board at the starting position, white to move.
    pub fn new() -> Self {
        let mut board = Board {
            squares: [None; 64],
            side_to_move: Color::White,
        };
        board.setup();
        board
    }

    /// Returns the board to the starting position, white to move.
    pub fn reset(&mut self) {
        self.squares = [None; 64];
        self.side_to_move = Color::White;
        self.setup();
    }

    fn setup(&mut self) {
        const BACK_RANK: [Piece; 8] = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];
        for file in 0..8u8 {
            self.squares[file as usize] = Some((BACK_RANK[file as usize], Color::White));
            self.squares[8 + file as usize] = Some((Piece::Pawn, Color::White));
            self.squares[48 + file as usize] = Some((Piece::Pawn, Color::Black));
            self.squares[56 + file as usize] = Some((BACK_RANK[file as usize], Color::Black));
        }
    }

    /// Returns the occupant of a square.
    #[inline]
    pub fn piece_at(&self, square: Square) -> Option<(Piece, Color)> {
        self.squares[square.index()]
    }

    /// Returns the side to move.
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// Returns true if a piece of the given kind and color on `from` can
    /// geometrically reach `to`.
    ///
    /// Geometry only: sliding pieces need a clear path, pawns follow their
    /// push/capture shapes, but checks and pins are not considered.
    pub fn can_reach(&self, piece: Piece, color: Color, from: Square, to: Square) -> bool {
        if from == to {
            return false;
        }
        let dfile = to.file() as i8 - from.file() as i8;
        let drank = to.rank() as i8 - from.rank() as i8;
        match piece {
            Piece::Pawn => self.pawn_can_reach(color, from, to, (dfile, drank)),
            Piece::Knight => {
                matches!((dfile.abs(), drank.abs()), (1, 2) | (2, 1))
            }
            Piece::Bishop => dfile.abs() == drank.abs() && self.path_clear(from, to),
            Piece::Rook => (dfile == 0 || drank == 0) && self.path_clear(from, to),
            Piece::Queen => {
                (dfile == 0 || drank == 0 || dfile.abs() == drank.abs())
                    && self.path_clear(from, to)
            }
            Piece::King => dfile.abs() <= 1 && drank.abs() <= 1,
        }
    }

    fn pawn_can_reach(&self, color: Color, from: Square, to: Square, deltas: (i8, i8)) -> bool {
        let (dfile, drank) = deltas;
        let dir = color.forward();
        if dfile == 0 {
            // Pushes need empty squares in front.
            if self.piece_at(to).is_some() {
                return false;
            }
            if drank == dir {
                return true;
            }
            if drank == 2 * dir && from.rank() == color.pawn_rank() {
                let between = Square::new(from.file(), (from.rank() as i8 + dir) as u8)
                    .expect("pawn push stays on the board");
                return self.piece_at(between).is_none();
            }
            false
        } else {
            // Captures are one step forward-diagonal onto an occupied square.
            dfile.abs() == 1 && drank == dir && self.piece_at(to).is_some()
        }
    }

    /// Returns true if every square strictly between `from` and `to` is empty.
    ///
    /// `from` and `to` must share a rank, file, or diagonal.
    fn path_clear(&self, from: Square, to: Square) -> bool {
        let dfile = (to.file() as i8 - from.file() as i8).signum();
        let drank = (to.rank() as i8 - from.rank() as i8).signum();
        let mut file = from.file() as i8 + dfile;
        let mut rank = from.rank() as i8 + drank;
        while (file, rank) != (to.file() as i8, to.rank() as i8) {
            let square = Square::new(file as u8, rank as u8).expect("path stays on the board");
            if self.piece_at(square).is_some() {
                return false;
            }
            file += dfile;
            rank += drank;
        }
        true
    }

    /// Executes a move: the source occupant lands on `to`, the source is
    /// cleared, and the side to move flips.
    ///
    /// A promotion replaces the pawn's kind with `promotion`, preserving
    /// color. A king travelling two files is treated as castling and moves
    /// the rook along the same rank as well.
    pub fn execute(&mut self, from: Square, to: Square, promotion: Option<Piece>) {
        let occupant = self.squares[from.index()].take();
        if let Some((Piece::King, color)) = occupant {
            let dfile = to.file() as i8 - from.file() as i8;
            if dfile.abs() == 2 {
                self.move_castling_rook(color, dfile > 0);
            }
        }
        self.squares[to.index()] = match (occupant, promotion) {
            (Some((_, color)), Some(kind)) => Some((kind, color)),
            (occupant, None) => occupant,
            (None, Some(_)) => None,
        };
        self.side_to_move = self.side_to_move.flip();
    }

    /// Executes castling for the side to move and flips the side to move.
    ///
    /// King and rook move atomically along the back rank. No through-check
    /// verification is performed.
    pub fn castle(&mut self, side: CastleSide) {
        let color = self.side_to_move;
        let rank = color.home_rank();
        let king_from = Square::new(4, rank).expect("king square");
        let king_to_file = match side {
            CastleSide::King => 6,
            CastleSide::Queen => 2,
        };
        let king_to = Square::new(king_to_file, rank).expect("king destination");
        self.execute(king_from, king_to, None);
    }

    fn move_castling_rook(&mut self, color: Color, kingside: bool) {
        let rank = color.home_rank();
        let (rook_from_file, rook_to_file) = if kingside { (7, 5) } else { (0, 3) };
        let rook_from = Square::new(rook_from_file, rank).expect("rook square");
        let rook_to = Square::new(rook_to_file, rank).expect("rook destination");
        let rook = self.squares[rook_from.index()].take();
        self.squares[rook_to.index()] = rook;
    }

    /// Places a piece on a square, for building test positions.
    #[cfg(test)]
    pub(crate) fn place(&mut self, square: Square, piece: Piece, color: Color) {
        self.squares[square.index()] = Some((piece, color));
    }

    /// Clears a square, for building test positions.
    #[cfg(test)]
    pub(crate) fn clear(&mut self, square: Square) {
        self.squares[square.index()] = None;
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
