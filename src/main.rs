//! Gomoku16: a five-in-a-row engine for a 16x16 board.
//!
//! ## Usage
//!
//! - `gomoku16` / `gomoku16 play` - Run the move protocol on stdin/stdout
//! - `gomoku16 book --out FILE` - Build the opening book and write it as text
//! - `gomoku16 patterns --out FILE` - Write the encoded pattern table
//! - `gomoku16 verify FILE` - Check that an encoded blob decodes cleanly

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info};

use gomoku16::book::{self, book_config, build_book, embedded_book, load_book};
use gomoku16::codec;
use gomoku16::patterns::{PatternDb, init_patterns, pattern_db};
use gomoku16::protocol::Engine;
use gomoku16::search::SearchConfig;

/// Gomoku16: a pattern-matching five-in-a-row engine
#[derive(Parser)]
#[command(name = "gomoku16")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one game over the line protocol on stdin/stdout
    Play(PlayArgs),
    /// Build the opening book and write it as encoded text
    Book {
        /// Output file
        #[arg(long)]
        out: PathBuf,
        /// Search depth per book position
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Write the encoded pattern table
    Patterns {
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },
    /// Decode an encoded blob and check its contents
    Verify {
        /// Encoded file
        file: PathBuf,
        /// What the file contains
        #[arg(long, value_enum, default_value_t = BlobKind::Book)]
        kind: BlobKind,
    },
}

#[derive(Args, Default)]
struct PlayArgs {
    /// Time budget per move in milliseconds
    #[arg(long)]
    time_ms: Option<u64>,
    /// Maximum search depth
    #[arg(long)]
    depth: Option<u32>,
    /// Seed for tie-breaking
    #[arg(long)]
    seed: Option<u64>,
    /// Encoded opening book to load instead of the embedded one
    #[arg(long)]
    book: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BlobKind {
    Book,
    Patterns,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command.unwrap_or(Commands::Play(PlayArgs::default())) {
        Commands::Play(args) => play(args),
        Commands::Book { out, depth } => write_book(out, depth),
        Commands::Patterns { out } => write_patterns(out),
        Commands::Verify { file, kind } => verify(file, kind),
    }
}

fn play(args: PlayArgs) -> anyhow::Result<()> {
    let mut config = SearchConfig::default();
    if let Some(ms) = args.time_ms {
        config = config.with_time_ms(ms);
    }
    if let Some(depth) = args.depth {
        config.max_depth = depth;
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    // Tables are loaded before the first token so no turn pays for them.
    init_patterns();
    let book = match args.book {
        Some(path) => load_book(&path)?,
        None => embedded_book().context("decoding embedded opening book")?,
    };
    let mut engine = if book.is_empty() {
        Engine::new(config)
    } else {
        Engine::with_book(config, book)
    };
    engine.run()
}

fn write_book(out: PathBuf, depth: Option<u32>) -> anyhow::Result<()> {
    let mut config = book_config();
    if let Some(depth) = depth {
        config.max_depth = depth;
    }
    let book = build_book(&config, pattern_db());
    let text = book::encode_book(&book).context("encoding opening book")?;
    fs::write(&out, text).with_context(|| format!("writing {}", out.display()))?;
    info!("wrote {} book entries to {}", book.len(), out.display());
    Ok(())
}

fn write_patterns(out: PathBuf) -> anyhow::Result<()> {
    let text = codec::encode_text(&pattern_db().to_words()).context("encoding pattern table")?;
    fs::write(&out, text).with_context(|| format!("writing {}", out.display()))?;
    info!("wrote pattern table to {}", out.display());
    Ok(())
}

fn verify(file: PathBuf, kind: BlobKind) -> anyhow::Result<()> {
    match kind {
        BlobKind::Book => {
            let book = load_book(&file)?;
            println!("book ok: {} entries", book.len());
        }
        BlobKind::Patterns => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let db = PatternDb::from_words(&codec::decode_text(&text)?)?;
            if db != *pattern_db() {
                bail!("pattern table in {} differs from the generator", file.display());
            }
            println!(
                "patterns ok: {} immediate, {} tactical",
                db.immediate().len(),
                db.tactical().len()
            );
        }
    }
    Ok(())
}
