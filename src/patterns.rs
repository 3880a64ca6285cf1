//! Line-pattern database for threat detection and scoring.
//!
//! Every pattern lives on one 5-field line window (horizontal, vertical,
//! or either diagonal) and names one empty *target* field in it:
//!
//! ## Immediate patterns
//! The other four fields of the window are all required stones. A match
//! means playing the target completes five in a row, or, when matched
//! against the opponent's stones, is the forced block.
//!
//! ## Tactical patterns
//! Exactly two or three of the other four fields are required stones and
//! the window must be free of opponent stones. These only feed the
//! heuristic score.
//!
//! Matching is a word-wise AND-and-compare per pattern:
//! `(own & relevant) == required`, `(opp & relevant) == 0`, target empty.

use std::sync::OnceLock;

use log::info;

use crate::bitboard::Bitboard;
use crate::board::{Board, Field};
use crate::codec::{CodecError, WordPack};
use crate::constants::{DIRECTIONS, FIELDS, LINE, N, WEIGHT_THREE, WEIGHT_TWO};

/// A template over one line window with a single target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    /// The window's fields other than the target.
    pub relevant: Bitboard,
    /// Subset of `relevant` that must hold own stones.
    pub required: Bitboard,
    /// The field to play.
    pub target: Field,
}

impl Pattern {
    /// Does this pattern match for the side owning `own` against `opp`?
    #[inline]
    pub fn matches(&self, own: Bitboard, opp: Bitboard) -> bool {
        (own & self.relevant) == self.required
            && (opp & self.relevant).is_empty()
            && !own.contains(self.target)
            && !opp.contains(self.target)
    }

    /// Heuristic weight of a tactical match.
    #[inline]
    pub fn weight(&self) -> i32 {
        match self.required.count() {
            3 => WEIGHT_THREE,
            2 => WEIGHT_TWO,
            _ => 0,
        }
    }
}

/// Immutable table of immediate and tactical patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDb {
    immediate: Vec<Pattern>,
    tactical: Vec<Pattern>,
    /// Immediate pattern indices per target field.
    immediate_at: Vec<Vec<u32>>,
    /// Tactical pattern indices per target field.
    tactical_at: Vec<Vec<u32>>,
}

/// Static storage for the pattern database.
static PATTERN_DB: OnceLock<PatternDb> = OnceLock::new();

/// The process-wide pattern database, generated on first use.
pub fn pattern_db() -> &'static PatternDb {
    PATTERN_DB.get_or_init(|| {
        let db = PatternDb::generate();
        info!(
            "pattern database ready: {} immediate, {} tactical",
            db.immediate.len(),
            db.tactical.len()
        );
        db
    })
}

/// Initialize the pattern database ahead of the first search.
pub fn init_patterns() {
    pattern_db();
}

/// Every 5-field line window on the board.
///
/// For each direction the base window sits at the top-left-most valid
/// position and is translated over every valid row shift and column shift.
pub fn line_windows() -> Vec<[Field; LINE]> {
    let mut windows = Vec::new();
    let span = LINE as isize - 1;

    for &(dr, dc) in &DIRECTIONS {
        let start_col = if dc < 0 { span } else { 0 };
        let base: [(isize, isize); LINE] =
            std::array::from_fn(|i| (i as isize * dr, start_col + i as isize * dc));

        let row_shifts = N as isize - span * dr;
        let col_shifts = N as isize - span * dc.abs();

        for row_shift in 0..row_shifts {
            for col_shift in 0..col_shifts {
                windows.push(base.map(|(r, c)| {
                    ((r + row_shift) * N as isize + c + col_shift) as Field
                }));
            }
        }
    }

    windows
}

/// Immediate patterns of one window: one per target cell.
fn immediate_patterns(window: &[Field; LINE]) -> impl Iterator<Item = Pattern> + '_ {
    (0..LINE).map(move |t| {
        let others = Bitboard::from_fields(window) & !Bitboard::from_field(window[t]);
        Pattern {
            relevant: others,
            required: others,
            target: window[t],
        }
    })
}

/// Tactical patterns of one window: every target and every choice of three,
/// then two, required stones among the remaining four cells.
fn tactical_patterns(window: &[Field; LINE]) -> Vec<Pattern> {
    let mut out = Vec::new();
    for t in 0..LINE {
        let others: Vec<Field> = (0..LINE).filter(|&i| i != t).map(|i| window[i]).collect();
        let relevant = Bitboard::from_fields(&others);
        for k in [3u32, 2] {
            for subset in 0u32..(1 << others.len()) {
                if subset.count_ones() != k {
                    continue;
                }
                let required = others
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| subset & (1 << i) != 0)
                    .fold(Bitboard::EMPTY, |acc, (_, &f)| acc | Bitboard::from_field(f));
                out.push(Pattern {
                    relevant,
                    required,
                    target: window[t],
                });
            }
        }
    }
    out
}

fn index_by_target(patterns: &[Pattern]) -> Vec<Vec<u32>> {
    let mut index = vec![Vec::new(); FIELDS];
    for (i, p) in patterns.iter().enumerate() {
        index[p.target as usize].push(i as u32);
    }
    index
}

impl PatternDb {
    /// Build both pattern families from scratch.
    pub fn generate() -> Self {
        let windows = line_windows();
        let immediate: Vec<Pattern> = windows.iter().flat_map(immediate_patterns).collect();
        let tactical: Vec<Pattern> = windows.iter().flat_map(tactical_patterns).collect();
        Self::from_parts(immediate, tactical)
    }

    fn from_parts(immediate: Vec<Pattern>, tactical: Vec<Pattern>) -> Self {
        let immediate_at = index_by_target(&immediate);
        let tactical_at = index_by_target(&tactical);
        PatternDb {
            immediate,
            tactical,
            immediate_at,
            tactical_at,
        }
    }

    pub fn immediate(&self) -> &[Pattern] {
        &self.immediate
    }

    pub fn tactical(&self) -> &[Pattern] {
        &self.tactical
    }

    /// Fields where `own` completes five, ascending by field index.
    pub fn winning_fields(&self, own: Bitboard, opp: Bitboard) -> Vec<Field> {
        self.winning_set(own, opp).iter().collect()
    }

    /// Set of fields where `own` completes five.
    pub fn winning_set(&self, own: Bitboard, opp: Bitboard) -> Bitboard {
        let mut fields = Bitboard::EMPTY;
        for p in &self.immediate {
            if p.matches(own, opp) {
                fields.set(p.target);
            }
        }
        fields
    }

    /// Heuristic score of `board` for the side to move.
    ///
    /// Tactical matches of the mover add their weight, matches of the
    /// opponent subtract it.
    pub fn tactical_score(&self, board: &Board) -> i32 {
        let stones = board.stones();
        let mut score = 0;
        for p in &self.tactical {
            let touched = stones & p.relevant;
            if touched.is_empty() || stones.contains(p.target) {
                continue;
            }
            if touched == p.required {
                if (board.other() & p.relevant).is_empty() {
                    score += p.weight();
                } else if (board.mover() & p.relevant).is_empty() {
                    score -= p.weight();
                }
            }
        }
        score
    }

    /// Move-ordering value of playing `field` on `board`.
    ///
    /// Counts both attacking matches for the mover and blocking value
    /// against the opponent.
    pub fn field_value(&self, board: &Board, field: Field, immediate_weight: i32) -> i32 {
        let (own, opp) = (board.mover(), board.other());
        let mut value = 0;
        for &i in &self.immediate_at[field as usize] {
            let p = &self.immediate[i as usize];
            if p.matches(own, opp) || p.matches(opp, own) {
                value += immediate_weight;
            }
        }
        for &i in &self.tactical_at[field as usize] {
            let p = &self.tactical[i as usize];
            if p.matches(own, opp) {
                value += p.weight() * 2;
            } else if p.matches(opp, own) {
                value += p.weight();
            }
        }
        value
    }

    /// Flat word encoding of both families.
    pub fn to_words(&self) -> WordPack {
        let mut pack = WordPack::new();
        pack.push_u32(self.immediate.len() as u32);
        pack.push_u32(self.tactical.len() as u32);
        for p in self.immediate.iter().chain(&self.tactical) {
            pack.push_bitboard(&p.relevant);
            pack.push_bitboard(&p.required);
            pack.push_u32(p.target as u32);
        }
        pack
    }

    /// Rebuild a database from its word encoding, validating every record.
    pub fn from_words(pack: &WordPack) -> Result<Self, CodecError> {
        let mut reader = pack.reader();
        let n_immediate = reader.next_u32()? as usize;
        let n_tactical = reader.next_u32()? as usize;

        let mut read_family = |count: usize| -> Result<Vec<Pattern>, CodecError> {
            let mut patterns = Vec::with_capacity(count);
            for _ in 0..count {
                let relevant = reader.next_bitboard()?;
                let required = reader.next_bitboard()?;
                let target = reader.next_u32()?;
                if target as usize >= FIELDS {
                    return Err(CodecError::Malformed(format!("target {target} out of range")));
                }
                let target = target as Field;
                if relevant.is_empty()
                    || (required & !relevant) != Bitboard::EMPTY
                    || relevant.contains(target)
                {
                    return Err(CodecError::Malformed(format!(
                        "inconsistent pattern at target {target}"
                    )));
                }
                patterns.push(Pattern {
                    relevant,
                    required,
                    target,
                });
            }
            Ok(patterns)
        };

        let immediate = read_family(n_immediate)?;
        let tactical = read_family(n_tactical)?;
        reader.finish()?;
        Ok(Self::from_parts(immediate, tactical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::parse_field;

    fn fields(names: &[&str]) -> Vec<Field> {
        names.iter().map(|n| parse_field(n).unwrap()).collect()
    }

    #[test]
    fn test_window_count() {
        // 16*12 horizontal + 12*16 vertical + 12*12 per diagonal.
        assert_eq!(line_windows().len(), 192 + 192 + 144 + 144);
    }

    #[test]
    fn test_windows_are_straight_lines() {
        for w in line_windows() {
            let (r0, c0) = (w[0] as isize / 16, w[0] as isize % 16);
            let (r1, c1) = (w[1] as isize / 16, w[1] as isize % 16);
            let (dr, dc) = (r1 - r0, c1 - c0);
            assert!(DIRECTIONS.contains(&(dr, dc)), "bad step in {w:?}");
            for i in 1..LINE {
                let (r, c) = (w[i] as isize / 16, w[i] as isize % 16);
                assert_eq!((r, c), (r0 + dr * i as isize, c0 + dc * i as isize));
            }
        }
    }

    #[test]
    fn test_immediate_invariants() {
        let db = PatternDb::generate();
        assert_eq!(db.immediate().len(), 672 * 5);
        for p in db.immediate() {
            assert_eq!(p.relevant, p.required);
            assert_eq!(p.relevant.count(), 4);
            assert!(!p.relevant.contains(p.target));
        }
    }

    #[test]
    fn test_tactical_invariants() {
        let db = PatternDb::generate();
        assert_eq!(db.tactical().len(), 672 * 5 * (4 + 6));
        for p in db.tactical() {
            assert_eq!(p.required & !p.relevant, Bitboard::EMPTY);
            assert!(matches!(p.required.count(), 2 | 3));
        }
    }

    #[test]
    fn test_winning_fields_open_four() {
        let db = pattern_db();
        let own = Bitboard::from_fields(&fields(&["Cc", "Cd", "Ce", "Cf"]));
        let won = db.winning_fields(own, Bitboard::EMPTY);
        assert_eq!(won, fields(&["Cb", "Cg"]));
    }

    #[test]
    fn test_winning_fields_blocked_end() {
        let db = pattern_db();
        let own = Bitboard::from_fields(&fields(&["Cc", "Cd", "Ce", "Cf"]));
        let opp = Bitboard::from_fields(&fields(&["Cb"]));
        assert_eq!(db.winning_fields(own, opp), fields(&["Cg"]));
    }

    #[test]
    fn test_gap_four_completes_in_middle() {
        let db = pattern_db();
        let own = Bitboard::from_fields(&fields(&["Ea", "Eb", "Ed", "Ee"]));
        assert_eq!(db.winning_fields(own, Bitboard::EMPTY), fields(&["Ec"]));
    }

    #[test]
    fn test_tactical_score_is_antisymmetric() {
        let db = pattern_db();
        let board = Board::with_stones(&fields(&["Hh", "Hi", "Hj"]), &fields(&["Gg", "Ii"]));
        let s = db.tactical_score(&board);
        assert!(s > 0);
        assert_eq!(db.tactical_score(&board.flipped()), -s);
    }

    #[test]
    fn test_word_round_trip() {
        let db = PatternDb::generate();
        let back = PatternDb::from_words(&db.to_words()).unwrap();
        assert_eq!(back, db);
    }

    #[test]
    fn test_from_words_rejects_bad_target() {
        let mut pack = WordPack::new();
        pack.push_u32(1);
        pack.push_u32(0);
        pack.push_bitboard(&Bitboard::from_field(1));
        pack.push_bitboard(&Bitboard::from_field(1));
        pack.push_u32(300);
        assert!(matches!(
            PatternDb::from_words(&pack),
            Err(CodecError::Malformed(_))
        ));
    }
}
