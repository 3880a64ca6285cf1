//! Gomoku16: a pattern-matching engine for five-in-a-row on a 16x16 board.
//!
//! ## Modules
//!
//! - [`constants`] - Board dimensions, search defaults and heuristic weights
//! - [`bitboard`] - 256-bit field sets
//! - [`board`] - Two-color board model, moves and field names
//! - [`patterns`] - Line-pattern database (immediate and tactical families)
//! - [`search`] - Move generator with memoized, deadline-bounded search
//! - [`codec`] - Word packing, double compression and text encoding
//! - [`book`] - Opening book building, merging and loading
//! - [`protocol`] - Line-oriented driver loop
//!
//! ## Example
//!
//! ```
//! use gomoku16::board::{Board, Move, parse_field};
//! use gomoku16::search::{SearchConfig, generate_move};
//!
//! let mut board = Board::new();
//! board.apply(Move::Field(parse_field("Hh").unwrap()));
//!
//! let reply = generate_move(&board, &SearchConfig::new(500_000_000, 1));
//! println!("reply: {reply}");
//! ```

pub mod bitboard;
pub mod board;
pub mod book;
pub mod codec;
pub mod constants;
pub mod patterns;
pub mod protocol;
pub mod search;
