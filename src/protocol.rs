//! Line-oriented move protocol driver.
//!
//! Every input line holds one token:
//!
//! - `Start` - the engine plays first
//! - `Aa`..`Pp` - the opponent's move (uppercase row, lowercase column)
//! - `Switch` - the sides swap; the engine is now to move
//! - `Quit` - end of game
//!
//! After `Start`, `Switch`, or an opponent move the engine writes its own
//! move as a two-letter token on its own line.
//!
//! ## Example
//!
//! ```ignore
//! use gomoku16::protocol::Engine;
//! let mut engine = Engine::new(Default::default());
//! engine.run()?;
//! ```

use std::io::{self, BufRead, Write};

use anyhow::Context;
use log::{debug, warn};

use crate::board::{Board, Move, str_field};
use crate::book;
use crate::search::{CalcCache, SearchConfig, generate_move};

/// Engine state for one game.
pub struct Engine {
    /// Current board, side to move first
    board: Board,
    /// Budget for each decision
    config: SearchConfig,
    /// Read-only opening book
    book: Option<CalcCache>,
}

impl Engine {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            board: Board::new(),
            config,
            book: None,
        }
    }

    pub fn with_book(config: SearchConfig, book: CalcCache) -> Self {
        Self {
            book: Some(book),
            ..Self::new(config)
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Choose and play the engine's own move.
    ///
    /// Book entries are used only when searched at least as deep as a live
    /// search would go.
    fn play_own(&mut self) -> Move {
        let from_book = self
            .book
            .as_ref()
            .and_then(|cache| book::probe(cache, &self.board, self.config.max_depth))
            .and_then(|hit| hit.best())
            .filter(|&f| self.board.is_empty(f));

        let mv = match from_book {
            Some(f) => {
                debug!("book move {}", str_field(f));
                Move::Field(f)
            }
            None => generate_move(&self.board, &self.config),
        };
        self.board.apply(mv);
        mv
    }

    /// Handle one incoming token. Returns the engine's answer, if any.
    pub fn respond(&mut self, mv: Move) -> Option<Move> {
        match mv {
            Move::Quit => None,
            Move::Start => Some(self.play_own()),
            Move::Switch => {
                self.board.apply(Move::Switch);
                Some(self.play_own())
            }
            Move::Field(f) => {
                if !self.board.is_empty(f) {
                    warn!("ignoring move to occupied field {}", str_field(f));
                    return None;
                }
                self.board.apply(mv);
                if self.board.is_full() {
                    return None;
                }
                Some(self.play_own())
            }
        }
    }

    /// Run the protocol loop on stdin/stdout.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with(stdin.lock(), stdout.lock())
    }

    /// Run the protocol loop on arbitrary streams until `Quit` or end of input.
    pub fn run_with<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line.context("reading protocol input")?;
            let token = line.trim();
            if token.is_empty() {
                continue;
            }

            let mv = match token.parse::<Move>() {
                Ok(mv) => mv,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };

            if mv == Move::Quit {
                debug!("quit after {} stones", self.board.moves());
                break;
            }

            if let Some(answer) = self.respond(mv) {
                writeln!(output, "{answer}").context("writing move")?;
                output.flush().context("flushing move")?;
            }
        }
        Ok(())
    }
}
