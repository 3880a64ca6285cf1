//! 256-bit board masks.
//!
//! A [`Bitboard`] is a plain value of four 64-bit words. Field `f` lives in
//! word `f / 64` at bit `f % 64`, so field 0 (row A, column a) is the lowest
//! bit of word 0 and moving one column right is a left shift by one.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not};

use crate::constants::{FIELDS, N, WORDS};

/// Per-word mask of the first column (col a).
const COL_FIRST_WORD: u64 = 0x0001_0001_0001_0001;

/// Per-word mask of the last column (col p).
const COL_LAST_WORD: u64 = 0x8000_8000_8000_8000;

/// Set of board fields, one bit per field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bitboard(pub [u64; WORDS]);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard([0; WORDS]);
    pub const FULL: Bitboard = Bitboard([u64::MAX; WORDS]);
    pub const NOT_FIRST_COL: Bitboard = Bitboard([!COL_FIRST_WORD; WORDS]);
    pub const NOT_LAST_COL: Bitboard = Bitboard([!COL_LAST_WORD; WORDS]);

    /// Bitboard with exactly one field set.
    #[inline]
    pub const fn from_field(field: u8) -> Self {
        let mut words = [0; WORDS];
        words[field as usize / 64] = 1u64 << (field as usize % 64);
        Bitboard(words)
    }

    /// Bitboard with every listed field set.
    pub fn from_fields(fields: &[u8]) -> Self {
        fields
            .iter()
            .fold(Self::EMPTY, |acc, &f| acc | Self::from_field(f))
    }

    #[inline]
    pub fn set(&mut self, field: u8) {
        self.0[field as usize / 64] |= 1u64 << (field as usize % 64);
    }

    #[inline]
    pub fn clear(&mut self, field: u8) {
        self.0[field as usize / 64] &= !(1u64 << (field as usize % 64));
    }

    #[inline]
    pub fn contains(&self, field: u8) -> bool {
        (self.0[field as usize / 64] >> (field as usize % 64)) & 1 == 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == [0; WORDS]
    }

    /// Number of set fields.
    #[inline]
    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    /// Lowest set field, if any.
    pub fn first(&self) -> Option<u8> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| (i * 64 + w.trailing_zeros() as usize) as u8)
    }

    /// Shift towards higher field indices by `s` bits (`0 < s < 64`).
    #[inline]
    fn shl(self, s: u32) -> Self {
        let w = self.0;
        Bitboard([
            w[0] << s,
            (w[1] << s) | (w[0] >> (64 - s)),
            (w[2] << s) | (w[1] >> (64 - s)),
            (w[3] << s) | (w[2] >> (64 - s)),
        ])
    }

    /// Shift towards lower field indices by `s` bits (`0 < s < 64`).
    #[inline]
    fn shr(self, s: u32) -> Self {
        let w = self.0;
        Bitboard([
            (w[0] >> s) | (w[1] << (64 - s)),
            (w[1] >> s) | (w[2] << (64 - s)),
            (w[2] >> s) | (w[3] << (64 - s)),
            w[3] >> s,
        ])
    }

    /// All fields at king distance 1 from this set, excluding the set itself.
    ///
    /// Horizontal steps are masked so nothing wraps from one row end to the
    /// next row's start.
    pub fn neighbours(&self) -> Self {
        let row = *self
            | (self.shl(1) & Self::NOT_FIRST_COL)
            | (self.shr(1) & Self::NOT_LAST_COL);
        let n = N as u32;
        let grown = row | row.shl(n) | row.shr(n);
        grown & !*self
    }

    /// Iterate over set fields in ascending order.
    pub fn iter(&self) -> BitboardIter {
        BitboardIter {
            words: self.0,
            word_idx: 0,
        }
    }
}

impl BitAnd for Bitboard {
    type Output = Bitboard;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Bitboard(std::array::from_fn(|i| self.0[i] & rhs.0[i]))
    }
}

impl BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}

impl BitOr for Bitboard {
    type Output = Bitboard;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Bitboard(std::array::from_fn(|i| self.0[i] | rhs.0[i]))
    }
}

impl BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl BitXor for Bitboard {
    type Output = Bitboard;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Bitboard(std::array::from_fn(|i| self.0[i] ^ rhs.0[i]))
    }
}

impl Not for Bitboard {
    type Output = Bitboard;

    #[inline]
    fn not(self) -> Self {
        Bitboard(self.0.map(|w| !w))
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bitboard({:#018x}, {:#018x}, {:#018x}, {:#018x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Iterator over the set fields of a [`Bitboard`].
pub struct BitboardIter {
    words: [u64; WORDS],
    word_idx: usize,
}

impl Iterator for BitboardIter {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.word_idx < WORDS {
            let w = self.words[self.word_idx];
            if w != 0 {
                self.words[self.word_idx] = w & (w - 1);
                let idx = self.word_idx * 64 + w.trailing_zeros() as usize;
                debug_assert!(idx < FIELDS);
                return Some(idx as u8);
            }
            self.word_idx += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear_contains() {
        let mut b = Bitboard::EMPTY;
        b.set(0);
        b.set(130);
        b.set(255);
        assert!(b.contains(0) && b.contains(130) && b.contains(255));
        assert_eq!(b.count(), 3);
        b.clear(130);
        assert!(!b.contains(130));
        assert_eq!(b.iter().collect::<Vec<_>>(), vec![0, 255]);
    }

    #[test]
    fn test_neighbours_center() {
        let b = Bitboard::from_field(5 * 16 + 5);
        let n: Vec<u8> = b.neighbours().iter().collect();
        assert_eq!(n, vec![68, 69, 70, 84, 86, 100, 101, 102]);
    }

    #[test]
    fn test_neighbours_do_not_wrap() {
        // Last column of row B must not leak into the first column of row C.
        let b = Bitboard::from_field(16 + 15);
        let n = b.neighbours();
        assert_eq!(n.count(), 5);
        assert!(!n.contains(32));
        assert!(!n.contains(16));
        assert!(n.contains(14) && n.contains(15) && n.contains(30));
        assert!(n.contains(46) && n.contains(47));
    }

    #[test]
    fn test_neighbours_across_word_boundary() {
        // Field 63 (row D, col p) borders fields in word 1.
        let n = Bitboard::from_field(63).neighbours();
        assert!(n.contains(78) && n.contains(79) && n.contains(46) && n.contains(47));
        assert_eq!(n.count(), 5);
    }

    #[test]
    fn test_first_and_not() {
        assert_eq!(Bitboard::EMPTY.first(), None);
        assert_eq!(Bitboard::from_field(200).first(), Some(200));
        assert_eq!((!Bitboard::EMPTY), Bitboard::FULL);
    }
}
