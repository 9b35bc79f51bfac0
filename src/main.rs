//! # Exam RAG CLI (`exam`)
//!
//! The `exam` binary answers textbook questions from the terminal and
//! serves the same pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! exam --config ./config/exam.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `exam ask "<question>"` | Answer one question and list its sources |
//! | `exam repl` | Interactive question loop; `exit` stops |
//! | `exam retrieve "<query>"` | Show raw retrieval results |
//! | `exam serve` | Start the HTTP server |
//! | `exam kb stats` | Knowledge base summary |
//! | `exam completions <shell>` | Print a shell completion script |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use exam_rag::context::AppContext;
use exam_rag::{ask, config, server, stats};

/// Exam RAG CLI — answer exam questions strictly from a textbook.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`. See `config/exam.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "exam",
    about = "Exam RAG — answer exam questions strictly from a textbook",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/exam.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question.
    ///
    /// Prints the four-section answer (or a refusal) followed by the
    /// retrieved sources as `source | chunk N | score 0.xxx`.
    Ask {
        /// The question. Ask exactly one.
        question: String,
    },

    /// Interactive question loop. Type `exit` to stop.
    Repl,

    /// Show the passages a query retrieves, without generating an answer.
    Retrieve {
        query: String,

        /// Number of passages to return (defaults to `[policy].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Inspect the knowledge base.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Generate a shell completion script and print it to stdout.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Print chunk count, dimensions, and per-source counts.
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    let command = match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "exam", &mut std::io::stdout());
            return Ok(());
        }
        command => command,
    };

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match command {
        Commands::Ask { question } => {
            let ctx = AppContext::init(cfg).await?;
            ask::run_ask(&ctx, &question).await?;
        }
        Commands::Repl => {
            let ctx = AppContext::init(cfg).await?;
            ask::run_repl(&ctx).await?;
        }
        Commands::Retrieve { query, top_k } => {
            let ctx = AppContext::init(cfg).await?;
            ask::run_retrieve(&ctx, &query, top_k).await?;
        }
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
        Commands::Kb {
            action: KbAction::Stats,
        } => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
