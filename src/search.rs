//! Pattern-match move generation.
//!
//! Move selection runs in priority order:
//! 1. Own immediate win (an immediate pattern matches the mover's stones)
//! 2. Forced block (an immediate pattern matches the opponent's stones)
//! 3. Iterative-deepening negamax over candidate fields next to existing
//!    stones, scoring leaves by tactical pattern matches and memoizing every
//!    evaluated board in a [`CalcCache`]
//!
//! The search checks a wall-clock deadline at every node. When it expires
//! the unfinished iteration is dropped and the last completed one answers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::board::{Board, Field, Move, str_field};
use crate::constants::{
    BRANCH_WIDTH, CENTER, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NANOS, DEFAULT_SEED, LEAF_MOVES,
    ORDER_IMMEDIATE, WIN_SCORE, WIN_THRESHOLD,
};
use crate::patterns::{PatternDb, pattern_db};

/// Budget for one move decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Wall-clock budget in nanoseconds, measured from the call's start.
    pub max_nanos: u64,
    /// Maximum search depth in plies.
    pub max_depth: u32,
    /// Seed for the tie-breaking random generator.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_nanos: DEFAULT_MAX_NANOS,
            max_depth: DEFAULT_MAX_DEPTH,
            seed: DEFAULT_SEED,
        }
    }
}

impl SearchConfig {
    pub fn new(max_nanos: u64, max_depth: u32) -> Self {
        Self {
            max_nanos,
            max_depth,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the budget in milliseconds, saturating for huge values.
    pub fn with_time_ms(mut self, ms: u64) -> Self {
        self.max_nanos = ms.saturating_mul(1_000_000);
        self
    }
}

/// Evaluated board: score for the side to move and ranked candidate fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcResult {
    pub score: i32,
    /// Candidate fields, best first.
    pub moves: Vec<Field>,
    /// Plies searched below this board. 0 is a static leaf whose moves are
    /// only the ordering heuristic.
    pub depth: u32,
}

impl CalcResult {
    pub fn best(&self) -> Option<Field> {
        self.moves.first().copied()
    }
}

/// Memo of evaluated boards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalcCache {
    entries: HashMap<Board, CalcResult>,
}

impl CalcCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, board: Board, result: CalcResult) {
        self.entries.insert(board, result);
    }

    /// Insert only if `board` has no entry yet. Returns whether it was added.
    pub fn insert_if_absent(&mut self, board: Board, result: CalcResult) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry(board) {
            Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, board: &Board) -> bool {
        self.entries.contains_key(board)
    }

    /// Exact-key lookup.
    pub fn get(&self, board: &Board) -> Option<&CalcResult> {
        self.entries.get(board)
    }

    /// Lookup that falls back to the color-flipped board.
    ///
    /// A flipped hit was scored for the other side, so its score is negated.
    /// Its candidate list is kept: the opponent's best fields are the fields
    /// the mover has to contest.
    pub fn lookup(&self, board: &Board) -> Option<CalcResult> {
        if let Some(hit) = self.entries.get(board) {
            return Some(hit.clone());
        }
        self.entries.get(&board.flipped()).map(|hit| CalcResult {
            score: -hit.score,
            ..hit.clone()
        })
    }

    /// Add the entries of `other`, replacing an existing entry only when
    /// the incoming one was searched deeper.
    pub fn absorb(&mut self, other: CalcCache) {
        for (board, result) in other.entries {
            match self.entries.get(&board) {
                Some(old) if old.depth >= result.depth => {}
                _ => {
                    self.entries.insert(board, result);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Board, &CalcResult)> {
        self.entries.iter()
    }
}

/// Full result of one search call.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The field to play.
    pub best: Field,
    /// Root evaluation of the last completed iteration.
    pub result: CalcResult,
    /// Depth of the last completed iteration (0 for forced moves).
    pub depth: u32,
    /// Nodes visited over all iterations.
    pub nodes: u64,
    /// Whether the deadline cut the search short.
    pub expired: bool,
    /// Cache of the last completed iteration.
    pub cache: CalcCache,
}

/// Static evaluation for the side to move.
///
/// Antisymmetric: `evaluate(b) == -evaluate(b.flipped())`.
pub fn evaluate(board: &Board, db: &PatternDb) -> i32 {
    db.tactical_score(board)
}

/// Candidate fields for the side to move, best first, at most `width`.
///
/// Only empty fields next to existing stones are considered; an empty board
/// answers the center.
pub fn candidates(board: &Board, db: &PatternDb, width: usize) -> Vec<Field> {
    let stones = board.stones();
    if stones.is_empty() {
        return vec![CENTER];
    }
    let mut near = stones.neighbours() & board.empties();
    if near.is_empty() {
        near = board.empties();
    }
    let mut scored: Vec<(i32, Field)> = near
        .iter()
        .map(|f| (db.field_value(board, f, ORDER_IMMEDIATE), f))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(width);
    scored.into_iter().map(|(_, f)| f).collect()
}

/// Move a propagated win/loss score one ply closer to zero.
#[inline]
fn decay(score: i32) -> i32 {
    if score > WIN_THRESHOLD {
        score - 1
    } else if score < -WIN_THRESHOLD {
        score + 1
    } else {
        score
    }
}

struct Searcher<'a> {
    db: &'a PatternDb,
    cache: CalcCache,
    deadline: Instant,
    nodes: u64,
    expired: bool,
}

impl<'a> Searcher<'a> {
    fn new(db: &'a PatternDb, deadline: Instant) -> Self {
        Self {
            db,
            cache: CalcCache::new(),
            deadline,
            nodes: 0,
            expired: false,
        }
    }

    fn out_of_time(&mut self) -> bool {
        if !self.expired && Instant::now() >= self.deadline {
            self.expired = true;
        }
        self.expired
    }

    /// Evaluate `board` to `depth` plies. `None` means the deadline expired.
    fn calc(&mut self, board: &Board, depth: u32) -> Option<CalcResult> {
        self.nodes += 1;
        if self.out_of_time() {
            return None;
        }

        let wins = self.db.winning_set(board.mover(), board.other());
        if !wins.is_empty() {
            return Some(CalcResult {
                score: WIN_SCORE,
                moves: wins.iter().collect(),
                depth,
            });
        }

        if let Some(hit) = self.cache.lookup(board) {
            return Some(hit);
        }

        let threats = self.db.winning_set(board.other(), board.mover());
        let result = if threats.count() >= 2 {
            CalcResult {
                score: -(WIN_SCORE - 1),
                moves: threats.iter().collect(),
                depth,
            }
        } else if board.is_full() {
            CalcResult {
                score: 0,
                moves: Vec::new(),
                depth,
            }
        } else {
            let moves = match threats.first() {
                Some(block) => vec![block],
                None => candidates(board, self.db, BRANCH_WIDTH),
            };
            if depth == 0 {
                CalcResult {
                    score: evaluate(board, self.db),
                    moves: moves.into_iter().take(LEAF_MOVES).collect(),
                    depth: 0,
                }
            } else {
                let scored = self.expand(board, &moves, depth)?;
                CalcResult {
                    score: scored[0].0,
                    moves: scored.into_iter().map(|(_, f)| f).collect(),
                    depth,
                }
            }
        };

        self.cache.insert(*board, result.clone());
        Some(result)
    }

    /// Score every move by searching the resulting board, best first.
    fn expand(&mut self, board: &Board, moves: &[Field], depth: u32) -> Option<Vec<(i32, Field)>> {
        let mut scored = Vec::with_capacity(moves.len());
        for &f in moves {
            let child = board.after(Move::Field(f));
            let r = self.calc(&child, depth - 1)?;
            scored.push((decay(-r.score), f));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Some(scored)
    }
}

/// Search `board` within `config` using the given pattern database.
///
/// # Panics
/// If the board has no empty field.
pub fn search(board: &Board, config: &SearchConfig, db: &PatternDb) -> SearchOutcome {
    let start = Instant::now();
    let deadline = start + Duration::from_nanos(config.max_nanos);
    assert!(!board.is_full(), "no empty field left to play");

    let forced = |best: Field, score: i32| {
        let result = CalcResult {
            score,
            moves: vec![best],
            depth: 0,
        };
        let mut cache = CalcCache::new();
        cache.insert(*board, result.clone());
        SearchOutcome {
            best,
            result,
            depth: 0,
            nodes: 1,
            expired: false,
            cache,
        }
    };

    if let Some(win) = db.winning_set(board.mover(), board.other()).first() {
        debug!("immediate win at {}", str_field(win));
        return forced(win, WIN_SCORE);
    }
    if let Some(block) = db.winning_set(board.other(), board.mover()).first() {
        debug!("forced block at {}", str_field(block));
        let score = evaluate(&board.after(Move::Field(block)), db);
        return forced(block, -score);
    }

    let mut rng = fastrand::Rng::with_seed(config.seed);
    let root_moves = candidates(board, db, BRANCH_WIDTH);
    let mut best = root_moves[0];
    let mut result = CalcResult {
        score: evaluate(board, db),
        moves: root_moves.clone(),
        depth: 0,
    };
    let mut completed = 0;
    let mut cache = CalcCache::new();
    let mut nodes = 0;
    let mut expired = false;

    for depth in 1..=config.max_depth.max(1) {
        let mut searcher = Searcher::new(db, deadline);
        let scored = searcher.expand(board, &root_moves, depth);
        nodes += searcher.nodes;

        let Some(scored) = scored else {
            debug!(
                "deadline hit during depth {depth} after {:?}, keeping depth {completed}",
                start.elapsed()
            );
            expired = true;
            break;
        };

        let top = scored[0].0;
        let tied = scored.iter().take_while(|(s, _)| *s == top).count();
        best = scored[rng.usize(..tied)].1;
        result = CalcResult {
            score: top,
            moves: scored.iter().map(|&(_, f)| f).collect(),
            depth,
        };
        searcher.cache.insert(*board, result.clone());
        cache = searcher.cache;
        completed = depth;

        debug!(
            "depth {depth}: best {} score {top} nodes {} elapsed {:?}",
            str_field(best),
            searcher.nodes,
            start.elapsed()
        );

        if top.abs() > WIN_THRESHOLD {
            break;
        }
    }

    SearchOutcome {
        best,
        result,
        depth: completed,
        nodes,
        expired,
        cache,
    }
}

/// Pick the next move for the side to move on `board`.
///
/// # Panics
/// If the board is full, or if the chosen field is occupied (a defect in
/// the pattern database or board state).
pub fn generate_move(board: &Board, config: &SearchConfig) -> Move {
    let outcome = search(board, config, pattern_db());
    assert!(
        board.is_empty(outcome.best),
        "generated move {} targets an occupied field",
        str_field(outcome.best)
    );
    Move::Field(outcome.best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::parse_field;

    fn fields(names: &[&str]) -> Vec<Field> {
        names.iter().map(|n| parse_field(n).unwrap()).collect()
    }

    fn quick() -> SearchConfig {
        SearchConfig::new(2_000_000_000, 2)
    }

    #[test]
    fn test_empty_board_plays_center() {
        assert_eq!(generate_move(&Board::new(), &quick()), Move::Field(CENTER));
    }

    #[test]
    fn test_candidates_are_adjacent_and_empty() {
        let board = Board::with_stones(&fields(&["Hh"]), &fields(&["Hi"]));
        let c = candidates(&board, pattern_db(), 64);
        assert!(!c.is_empty());
        let near = board.stones().neighbours();
        for f in c {
            assert!(board.is_empty(f));
            assert!(near.contains(f));
        }
    }

    #[test]
    fn test_win_beats_block() {
        let board = Board::with_stones(
            &fields(&["Ca", "Cb", "Cc", "Cd"]),
            &fields(&["Ka", "Kb", "Kc", "Kd"]),
        );
        assert_eq!(generate_move(&board, &quick()), Move::Field(parse_field("Ce").unwrap()));
    }

    #[test]
    fn test_multiple_threats_block_lowest_field() {
        // Opponent open four: both ends complete five.
        let board = Board::with_stones(
            &fields(&["Aa", "Pp"]),
            &fields(&["Hd", "He", "Hf", "Hg"]),
        );
        assert_eq!(generate_move(&board, &quick()), Move::Field(parse_field("Hc").unwrap()));
    }

    #[test]
    fn test_search_sees_open_four_threat() {
        // Mover can make an open four; depth 3 should find the forced win.
        let board = Board::with_stones(
            &fields(&["Hf", "Hg", "Hh"]),
            &fields(&["Aa", "Ap", "Pa"]),
        );
        let outcome = search(&board, &SearchConfig::new(30_000_000_000, 3), pattern_db());
        assert!(outcome.result.score > WIN_THRESHOLD, "score {}", outcome.result.score);
        assert!(fields(&["He", "Hi"]).contains(&outcome.best));
    }

    #[test]
    fn test_expired_deadline_still_answers() {
        let board = Board::with_stones(&fields(&["Hh", "Hj"]), &fields(&["Hi", "Ii"]));
        let outcome = search(&board, &SearchConfig::new(0, 4), pattern_db());
        assert!(outcome.expired);
        assert_eq!(outcome.depth, 0);
        assert!(board.is_empty(outcome.best));
    }

    #[test]
    fn test_flipped_lookup_negates_score() {
        let board = Board::with_stones(&fields(&["Hh"]), &fields(&["Hi"]));
        let mut cache = CalcCache::new();
        cache.insert(
            board,
            CalcResult {
                score: 42,
                moves: fields(&["Hg"]),
                depth: 2,
            },
        );
        let hit = cache.lookup(&board.flipped()).unwrap();
        assert_eq!(hit.score, -42);
        assert_eq!(hit.moves, fields(&["Hg"]));
        assert_eq!(hit.depth, 2);
        assert!(cache.get(&board.flipped()).is_none());
    }

    #[test]
    fn test_absorb_keeps_deeper_entry() {
        let board = Board::with_stones(&fields(&["Hh"]), &fields(&["Hi"]));
        let leaf = CalcResult {
            score: 5,
            moves: fields(&["Gg"]),
            depth: 0,
        };
        let searched = CalcResult {
            score: 9,
            moves: fields(&["Gi"]),
            depth: 2,
        };

        let mut cache = CalcCache::new();
        cache.insert(board, leaf.clone());
        let mut deeper = CalcCache::new();
        deeper.insert(board, searched.clone());
        cache.absorb(deeper);
        assert_eq!(cache.get(&board), Some(&searched));

        let mut shallower = CalcCache::new();
        shallower.insert(board, leaf);
        cache.absorb(shallower);
        assert_eq!(cache.get(&board), Some(&searched));
    }

    #[test]
    fn test_root_entry_records_completed_depth() {
        let board = Board::with_stones(&fields(&["Hh", "Hj"]), &fields(&["Hi", "Ii"]));
        let outcome = search(&board, &SearchConfig::new(30_000_000_000, 2), pattern_db());
        assert_eq!(outcome.depth, 2);
        assert_eq!(outcome.result.depth, 2);
        assert_eq!(outcome.cache.get(&board), Some(&outcome.result));
        for (b, r) in outcome.cache.iter() {
            if b != &board {
                assert!(r.depth < 2, "child entry deeper than the root");
            }
        }
    }

    #[test]
    fn test_evaluate_is_antisymmetric() {
        let board = Board::with_stones(
            &fields(&["Hh", "Hi", "Gj", "Ff"]),
            &fields(&["Ih", "Ii", "Jj"]),
        );
        let db = pattern_db();
        assert_eq!(evaluate(&board, db), -evaluate(&board.flipped(), db));
    }

    #[test]
    fn test_time_budget_saturates() {
        assert_eq!(SearchConfig::default().with_time_ms(250).max_nanos, 250_000_000);
        assert_eq!(SearchConfig::default().with_time_ms(u64::MAX).max_nanos, u64::MAX);
    }

    #[test]
    fn test_same_seed_same_move() {
        let board = Board::with_stones(&fields(&["Hh"]), &fields(&[]));
        let cfg = quick().with_seed(7);
        assert_eq!(generate_move(&board, &cfg), generate_move(&board, &cfg));
    }
}
