//! Board model and move representation.
//!
//! The board keeps two disjoint stone sets: `mover` (the side to move) and
//! `other`. Playing a stone puts it into `mover` and then flips the board,
//! so evaluation code always looks at the position from the perspective of
//! the side to move.
//!
//! There is no win detection here. Lines of five are found by pattern
//! matching in [`crate::patterns`].

use std::fmt;
use std::str::FromStr;

use crate::bitboard::Bitboard;
use crate::constants::{FIELDS, N};

/// A field index, `row * 16 + col`.
pub type Field = u8;

/// A protocol move: either a stone on a field or one of the control signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Place a stone for the side to move.
    Field(Field),
    /// The engine moves first.
    Start,
    /// End of game.
    Quit,
    /// The sides swap; no stone is placed.
    Switch,
}

impl Move {
    /// The field of a stone move, `None` for control signals.
    pub fn field(self) -> Option<Field> {
        match self {
            Move::Field(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Field(field) => f.write_str(&str_field(*field)),
            Move::Start => f.write_str("Start"),
            Move::Quit => f.write_str("Quit"),
            Move::Switch => f.write_str("Switch"),
        }
    }
}

/// Error for a token that is neither a field nor a control signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMoveError(pub String);

impl fmt::Display for ParseMoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid move token: {:?}", self.0)
    }
}

impl std::error::Error for ParseMoveError {}

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Start" => Ok(Move::Start),
            "Quit" => Ok(Move::Quit),
            "Switch" => Ok(Move::Switch),
            token => parse_field(token)
                .map(Move::Field)
                .ok_or_else(|| ParseMoveError(token.to_string())),
        }
    }
}

/// Parse a two-letter field name: uppercase row `A`..`P`, lowercase column `a`..`p`.
///
/// Returns `None` for anything else.
pub fn parse_field(s: &str) -> Option<Field> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let (row, col) = (bytes[0], bytes[1]);
    if !(b'A'..b'A' + N as u8).contains(&row) || !(b'a'..b'a' + N as u8).contains(&col) {
        return None;
    }
    Some((row - b'A') * N as u8 + (col - b'a'))
}

/// Format a field index as its two-letter name.
pub fn str_field(field: Field) -> String {
    let row = (b'A' + field / N as u8) as char;
    let col = (b'a' + field % N as u8) as char;
    format!("{row}{col}")
}

/// Board state from the perspective of the side to move.
///
/// Equality and hashing cover every field, so a `Board` can key a cache
/// directly. The two stone sets never overlap; every constructor checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Board {
    /// Stones of the side to move.
    mover: Bitboard,
    /// Stones of the side that just moved.
    other: Bitboard,
    /// Whether the side to move is the player who started the game.
    mover_is_first: bool,
    /// Number of stones placed so far.
    moves: u16,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Empty board, first player to move.
    pub fn new() -> Self {
        Board {
            mover: Bitboard::EMPTY,
            other: Bitboard::EMPTY,
            mover_is_first: true,
            moves: 0,
        }
    }

    /// Board with the given stones, side to move owning `mover`.
    ///
    /// The side to move is taken to be the first player when both sides have
    /// the same number of stones.
    pub fn with_stones(mover: &[Field], other: &[Field]) -> Self {
        let mover_bits = Bitboard::from_fields(mover);
        let other_bits = Bitboard::from_fields(other);
        assert!(
            (mover_bits & other_bits).is_empty(),
            "stone sets overlap: {:?}",
            mover_bits & other_bits
        );
        Board {
            mover: mover_bits,
            other: other_bits,
            mover_is_first: mover_bits.count() == other_bits.count(),
            moves: (mover_bits.count() + other_bits.count()) as u16,
        }
    }

    /// Rebuild a board from its stored parts. `None` if the stone sets overlap.
    pub fn from_parts(
        mover: Bitboard,
        other: Bitboard,
        mover_is_first: bool,
        moves: u16,
    ) -> Option<Self> {
        (mover & other).is_empty().then_some(Board {
            mover,
            other,
            mover_is_first,
            moves,
        })
    }

    /// Stones of the side to move.
    #[inline]
    pub fn mover(&self) -> Bitboard {
        self.mover
    }

    /// Stones of the side that just moved.
    #[inline]
    pub fn other(&self) -> Bitboard {
        self.other
    }

    #[inline]
    pub fn mover_is_first(&self) -> bool {
        self.mover_is_first
    }

    /// Number of stones placed so far.
    #[inline]
    pub fn moves(&self) -> u16 {
        self.moves
    }

    /// Apply a move in place and return `self` for chaining.
    ///
    /// A stone move places the stone for the side to move and passes the
    /// turn. `Switch` only passes the turn. `Start` and `Quit` leave the
    /// board untouched.
    ///
    /// # Panics
    /// If the target field is already occupied.
    pub fn apply(&mut self, mv: Move) -> &mut Self {
        match mv {
            Move::Field(field) => {
                assert!(
                    self.is_empty(field),
                    "move {} targets an occupied field",
                    str_field(field)
                );
                self.mover.set(field);
                self.moves += 1;
                self.flip()
            }
            Move::Switch => self.flip(),
            Move::Start | Move::Quit => self,
        }
    }

    /// Swap the stone sets so the other side is to move.
    #[inline]
    pub fn flip(&mut self) -> &mut Self {
        std::mem::swap(&mut self.mover, &mut self.other);
        self.mover_is_first = !self.mover_is_first;
        self
    }

    /// The color-flipped copy of this board.
    #[inline]
    pub fn flipped(&self) -> Board {
        let mut b = *self;
        b.flip();
        b
    }

    /// A copy of this board with `mv` applied.
    #[inline]
    pub fn after(&self, mv: Move) -> Board {
        let mut b = *self;
        b.apply(mv);
        b
    }

    #[inline]
    pub fn is_empty(&self, field: Field) -> bool {
        !self.stones().contains(field)
    }

    /// All occupied fields.
    #[inline]
    pub fn stones(&self) -> Bitboard {
        self.mover | self.other
    }

    /// All empty fields.
    #[inline]
    pub fn empties(&self) -> Bitboard {
        !self.stones()
    }

    pub fn is_full(&self) -> bool {
        self.stones().count() as usize == FIELDS
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        for col in 0..N as u8 {
            write!(f, "{}", (b'a' + col) as char)?;
        }
        writeln!(f)?;
        for row in 0..N as u8 {
            write!(f, "{} ", (b'A' + row) as char)?;
            for col in 0..N as u8 {
                let field = row * N as u8 + col;
                let ch = if self.mover.contains(field) {
                    'X'
                } else if self.other.contains(field) {
                    'O'
                } else {
                    '.'
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
