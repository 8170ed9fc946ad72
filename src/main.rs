//! TaskCards Monitor - Binary Entry Point
//!
//! Thin CLI over the library: the network fetch layer is an external
//! collaborator, so snapshot-consuming commands read a board JSON
//! document from a file (or stdin with `-`).

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};

use taskcards_monitor::history_store::{HistoryPoint, HistoryQuery, HistoryStore, StoreConfig};
use taskcards_monitor::monitor::run_check;
use taskcards_monitor::render;
use taskcards_monitor::types::BoardSnapshot;

#[derive(Parser)]
#[command(name = "taskcards-monitor", version, about = "Monitor TaskCards boards for changes")]
struct Cli {
    /// Data directory (default: $TASKCARDS_DATA_DIR or ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a board snapshot for changes and record them
    Check {
        /// Board snapshot JSON file, or '-' for stdin
        input: PathBuf,
        /// Override the board id found in the snapshot
        #[arg(long)]
        board_id: Option<String>,
    },
    /// Show the stored current state of a board
    Show { board_id: String },
    /// List all monitored boards
    List,
    /// Show change history for a board
    History {
        board_id: String,
        /// Limit number of entries to display
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Entries since this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,
        /// Entries until this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        until: Option<String>,
        /// Only entries touching this card id
        #[arg(long)]
        card: Option<String>,
    },
    /// Rebuild the board state as of a past history point
    #[command(group(ArgGroup::new("point").required(true).args(["seq", "at"])))]
    Reconstruct {
        board_id: String,
        /// History sequence number
        #[arg(long)]
        seq: Option<u64>,
        /// Timestamp (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        at: Option<String>,
    },
    /// Parse and display a board snapshot without touching the store
    Inspect {
        /// Board snapshot JSON file, or '-' for stdin
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.data_dir {
        Some(dir) => StoreConfig::new(dir),
        None => StoreConfig::default(),
    };
    let store = HistoryStore::with_config(config);

    match cli.command {
        Command::Check { input, board_id } => {
            let snapshot = load_snapshot(&input, board_id)?;
            let entry = run_check(&store, &snapshot)?;
            render::render_change_set(&entry.change_set, snapshot.card_count());
        }
        Command::Show { board_id } => match store.load_current(&board_id)? {
            Some(snapshot) => render::render_board(&snapshot),
            None => println!(
                "No saved state for board {}. Run 'taskcards-monitor check' first.",
                board_id
            ),
        },
        Command::List => {
            let mut boards = Vec::new();
            for board_id in store.list_boards()? {
                if let Some(snapshot) = store.load_current(&board_id)? {
                    boards.push((board_id, snapshot));
                }
            }
            render::render_board_list(&boards);
        }
        Command::History {
            board_id,
            limit,
            since,
            until,
            card,
        } => {
            let query = HistoryQuery {
                since: since.as_deref().map(parse_timestamp).transpose()?,
                until: until.as_deref().map(parse_timestamp).transpose()?,
                card_id: card,
                limit: Some(limit),
            };
            let entries = store.query(&board_id, &query)?;
            render::render_history(&entries);
        }
        Command::Reconstruct { board_id, seq, at } => {
            let point = match (seq, at) {
                (Some(seq), _) => HistoryPoint::Seq(seq),
                (None, Some(at)) => HistoryPoint::Time(parse_timestamp(&at)?),
                (None, None) => unreachable!("clap enforces the point group"),
            };
            let snapshot = store.reconstruct_at(&board_id, point)?;
            render::render_board(&snapshot);
        }
        Command::Inspect { input } => {
            let snapshot = load_snapshot(&input, None)?;
            render::render_board(&snapshot);
        }
    }

    Ok(())
}

/// Read, parse, normalize, and validate a board snapshot from a file or
/// stdin.
fn load_snapshot(
    input: &PathBuf,
    board_id: Option<String>,
) -> Result<BoardSnapshot, Box<dyn Error>> {
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)?
    };

    let mut snapshot: BoardSnapshot = serde_json::from_str(&raw)?;
    if let Some(board_id) = board_id {
        snapshot.board_id = board_id;
    }
    snapshot.normalize();
    snapshot.validate()?;
    Ok(snapshot)
}

/// Accept `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or RFC 3339.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts.and_utc());
        }
    }
    Err(format!(
        "invalid date '{}': use YYYY-MM-DD, 'YYYY-MM-DD HH:MM:SS', or RFC 3339",
        value
    )
    .into())
}
