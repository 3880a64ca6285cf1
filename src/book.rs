//! Opening book: precomputed search results shipped as encoded text.
//!
//! The builder searches every prefix of a fixed opening once for each side,
//! collecting a [`CalcCache`] per side. The second side's cache is then
//! merged into the first under color flip, first-side entries winning ties.
//!
//! Because of the flip merge, a board `B` can be answered by two entries:
//! the first side's entry under `B` and the second side's own result for
//! `B`, stored under `B.flipped()`. [`probe`] reads both as results for `B`
//! and takes the first one searched deep enough.
//!
//! Serialized entries (see [`crate::codec`] for the outer layout):
//! - u64 stream: `mover[4] other[4]` per entry
//! - u32 stream: `entry_count`, then per entry
//!   `flags move_count depth score move_len moves...` (flags bit 0: mover is first)
//!
//! Entries are written in board order so equal books encode identically.

use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;

use crate::board::{Board, Field, Move, parse_field};
use crate::codec::{self, CodecError, WordPack};
use crate::constants::{BOOK_DEPTH, BOOK_MAX_NANOS, BOOK_OPENING, FIELDS};
use crate::patterns::PatternDb;
use crate::search::{CalcCache, CalcResult, SearchConfig, search};

/// Encoded book compiled into the binary, regenerated with
/// `gomoku16 book --out assets/book.txt`.
pub const EMBEDDED_BOOK: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/book.txt"));

/// Which side the book is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    First,
    Second,
}

/// Search budget used when building the book.
pub fn book_config() -> SearchConfig {
    SearchConfig::new(BOOK_MAX_NANOS, BOOK_DEPTH)
}

/// Board after the first `len` moves of the fixed opening.
pub fn opening_board(len: usize) -> Board {
    let mut board = Board::new();
    for name in BOOK_OPENING.iter().take(len) {
        let field = parse_field(name).expect("opening moves are valid field names");
        board.apply(Move::Field(field));
    }
    board
}

/// Search every opening prefix where `role` is to move and collect the caches.
pub fn build_role_cache(role: Role, config: &SearchConfig, db: &PatternDb) -> CalcCache {
    let mut cache = CalcCache::new();
    for len in 0..=BOOK_OPENING.len() {
        let board = opening_board(len);
        if board.mover_is_first() != (role == Role::First) {
            continue;
        }
        let outcome = search(&board, config, db);
        info!(
            "book {role:?} prefix {len}: depth {} score {} entries {}",
            outcome.depth,
            outcome.result.score,
            outcome.cache.len()
        );
        cache.absorb(outcome.cache);
    }
    cache
}

/// Merge `opponent` into `player` under color flip.
///
/// Each opponent entry for board `B` is inserted as `B.flipped()` unless
/// that key is already present. Returns the number of entries added.
pub fn merge(player: &mut CalcCache, opponent: &CalcCache) -> usize {
    let mut added = 0;
    for (board, result) in opponent.iter() {
        if player.insert_if_absent(board.flipped(), result.clone()) {
            added += 1;
        }
    }
    added
}

/// Book result for `board` searched at least `min_depth` plies.
///
/// The exact key is tried first, then the flipped key, which after
/// [`merge`] holds the second side's result for `board` itself. Neither
/// hit is negated. Shallower entries, including static leaves, are skipped.
pub fn probe<'a>(
    book: &'a CalcCache,
    board: &Board,
    min_depth: u32,
) -> Option<&'a CalcResult> {
    [*board, board.flipped()]
        .iter()
        .filter_map(|key| book.get(key))
        .find(|hit| hit.depth >= min_depth && !hit.moves.is_empty())
}

/// Build the complete opening book.
pub fn build_book(config: &SearchConfig, db: &PatternDb) -> CalcCache {
    let mut book = build_role_cache(Role::First, config, db);
    let second = build_role_cache(Role::Second, config, db);
    let before = book.len();
    let added = merge(&mut book, &second);
    info!(
        "book merged: {before} first-side entries, {added} of {} second-side entries added",
        second.len()
    );
    book
}

/// Flat word encoding of a book.
pub fn book_to_words(book: &CalcCache) -> WordPack {
    let mut entries: Vec<(&Board, &CalcResult)> = book.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut pack = WordPack::new();
    pack.push_u32(entries.len() as u32);
    for (board, result) in entries {
        pack.push_bitboard(&board.mover());
        pack.push_bitboard(&board.other());
        pack.push_u32(board.mover_is_first() as u32);
        pack.push_u32(board.moves() as u32);
        pack.push_u32(result.depth);
        pack.push_u32(result.score as u32);
        pack.push_u32(result.moves.len() as u32);
        for &f in &result.moves {
            pack.push_u32(f as u32);
        }
    }
    pack
}

/// Rebuild a book from its word encoding, validating every entry.
pub fn book_from_words(pack: &WordPack) -> Result<CalcCache, CodecError> {
    let mut reader = pack.reader();
    let count = reader.next_u32()?;
    let mut book = CalcCache::new();

    for i in 0..count {
        let mover = reader.next_bitboard()?;
        let other = reader.next_bitboard()?;
        let flags = reader.next_u32()?;
        if flags > 1 {
            return Err(CodecError::Malformed(format!("entry {i}: flags {flags:#x}")));
        }
        let moves = u16::try_from(reader.next_u32()?)
            .map_err(|_| CodecError::Malformed(format!("entry {i}: move counter")))?;
        let depth = reader.next_u32()?;
        let score = reader.next_u32()? as i32;
        let len = reader.next_u32()? as usize;
        if len > FIELDS {
            return Err(CodecError::Malformed(format!("entry {i}: {len} candidates")));
        }
        let mut fields = Vec::with_capacity(len);
        for _ in 0..len {
            let f = reader.next_u32()?;
            if f as usize >= FIELDS {
                return Err(CodecError::Malformed(format!("entry {i}: field {f}")));
            }
            fields.push(f as Field);
        }

        let board = Board::from_parts(mover, other, flags == 1, moves)
            .ok_or_else(|| CodecError::Malformed(format!("entry {i}: stone sets overlap")))?;
        let result = CalcResult {
            score,
            moves: fields,
            depth,
        };
        if !book.insert_if_absent(board, result) {
            return Err(CodecError::Malformed(format!("entry {i}: duplicate board")));
        }
    }

    reader.finish()?;
    Ok(book)
}

/// Encode a book as verified text.
pub fn encode_book(book: &CalcCache) -> Result<String, CodecError> {
    codec::encode_text(&book_to_words(book))
}

/// Decode a book from text produced by [`encode_book`].
pub fn decode_book(text: &str) -> Result<CalcCache, CodecError> {
    book_from_words(&codec::decode_text(text)?)
}

/// Decode the book compiled into the binary.
pub fn embedded_book() -> Result<CalcCache, CodecError> {
    let book = decode_book(EMBEDDED_BOOK)?;
    info!("embedded opening book: {} entries", book.len());
    Ok(book)
}

/// Load an encoded book from a file. Any failure aborts the load.
pub fn load_book(path: &Path) -> anyhow::Result<CalcCache> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading opening book {}", path.display()))?;
    let book = decode_book(&text)
        .with_context(|| format!("decoding opening book {}", path.display()))?;
    info!("opening book loaded: {} entries", book.len());
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::parse_field;

    fn result(score: i32, moves: &[Field], depth: u32) -> CalcResult {
        CalcResult {
            score,
            moves: moves.to_vec(),
            depth,
        }
    }

    #[test]
    fn test_opening_boards_alternate_roles() {
        assert!(opening_board(0).mover_is_first());
        assert!(!opening_board(1).mover_is_first());
        assert!(opening_board(2).mover_is_first());
        let b = opening_board(3);
        assert_eq!(b.moves(), 3);
        assert!(b.other().contains(parse_field("Hh").unwrap()));
        assert!(b.mover().contains(parse_field("Hi").unwrap()));
    }

    #[test]
    fn test_merge_keeps_player_entries() {
        let b1 = Board::with_stones(&[1], &[2]);
        let b2 = Board::with_stones(&[3], &[4]);
        let mut player = CalcCache::new();
        player.insert(b1, result(5, &[10], 1));

        let mut opponent = CalcCache::new();
        // Collides with b1 after flipping.
        opponent.insert(b1.flipped(), result(-9, &[11], 1));
        opponent.insert(b2, result(7, &[12], 1));

        let added = merge(&mut player, &opponent);
        assert_eq!(added, 1);
        assert_eq!(player.len(), 2);
        assert_eq!(player.get(&b1).unwrap().score, 5);
        assert_eq!(player.get(&b2.flipped()).unwrap().moves, vec![12]);
    }

    #[test]
    fn test_words_reject_overlap() {
        let mut pack = WordPack::new();
        pack.push_u32(1);
        let b = crate::bitboard::Bitboard::from_field(9);
        pack.push_bitboard(&b);
        pack.push_bitboard(&b);
        for w in [0, 2, 1, 0, 0] {
            pack.push_u32(w);
        }
        assert!(matches!(book_from_words(&pack), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_book_word_round_trip() {
        let mut book = CalcCache::new();
        book.insert(opening_board(1), result(-300, &[100, 101], 3));
        book.insert(opening_board(2), result(0, &[], 0));
        let back = book_from_words(&book_to_words(&book)).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn test_probe_skips_leaf_for_flipped_searched_entry() {
        let board = opening_board(1);
        let mut player = CalcCache::new();
        player.insert(board, result(0, &[102, 103], 0));
        let mut opponent = CalcCache::new();
        opponent.insert(board, result(40, &[104, 102], 2));
        merge(&mut player, &opponent);

        let hit = probe(&player, &board, 2).unwrap();
        assert_eq!(hit.moves, vec![104, 102]);
        assert_eq!(hit.score, 40);
        assert_eq!(probe(&player, &board, 0).unwrap().moves, vec![102, 103]);
        assert!(probe(&player, &board, 3).is_none());
    }

    #[test]
    fn test_embedded_book_decodes() {
        assert!(embedded_book().is_ok());
    }
}
