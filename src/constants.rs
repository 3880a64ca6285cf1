//! Constants for board geometry, search defaults, and heuristic weights.
//!
//! The board is a fixed 16x16 grid addressed by a field index
//! `row * N + col`, so every field fits in a `u8` and a whole board side
//! fits in four 64-bit words.

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN).
pub const N: usize = 16;

/// Number of fields on the board.
pub const FIELDS: usize = N * N;

/// Number of 64-bit words in a bitboard.
pub const WORDS: usize = FIELDS / 64;

/// Length of a winning line.
pub const LINE: usize = 5;

/// Field played on an empty board (row H, column h).
pub const CENTER: u8 = (7 * N + 7) as u8;

/// Line directions as (row step, column step):
/// horizontal, vertical, main diagonal, anti-diagonal.
pub const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

// =============================================================================
// Search Defaults
// =============================================================================

/// Default wall-clock budget per move (nanoseconds).
pub const DEFAULT_MAX_NANOS: u64 = 800_000_000;

/// Default maximum search depth in plies.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default seed for the tie-breaking random generator.
pub const DEFAULT_SEED: u64 = 0x5eed_0f_f1e1d;

/// Maximum number of candidate moves expanded per node.
pub const BRANCH_WIDTH: usize = 10;

/// Number of ranked candidates kept in a leaf result.
pub const LEAF_MOVES: usize = 4;

// =============================================================================
// Heuristic Weights
// =============================================================================

/// Score of a position where the side to move completes five.
pub const WIN_SCORE: i32 = 1_000_000;

/// Scores beyond this magnitude are treated as forced wins or losses.
pub const WIN_THRESHOLD: i32 = WIN_SCORE - 1_000;

/// Weight of a tactical match with three stones in a clean window.
pub const WEIGHT_THREE: i32 = 120;

/// Weight of a tactical match with two stones in a clean window.
pub const WEIGHT_TWO: i32 = 12;

/// Move-ordering weight for a field that completes five for either side.
pub const ORDER_IMMEDIATE: i32 = 100_000;

// =============================================================================
// Opening Book and Serialization
// =============================================================================

/// Fixed opening sequence used by the book builder.
pub const BOOK_OPENING: [&str; 3] = ["Hh", "Hi", "Ih"];

/// Deadline for book-building searches (nanoseconds).
pub const BOOK_MAX_NANOS: u64 = 600_000_000_000;

/// Depth for book-building searches.
pub const BOOK_DEPTH: u32 = 3;

/// Upper bound on the inflated size of any embedded blob.
pub const MAX_BLOB_BYTES: u64 = 64 * 1024 * 1024;
