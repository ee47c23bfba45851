//! moneychat - terminal client for the personal-finance advisor

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moneychat::cli;
use moneychat::config::ConfigOverrides;
use moneychat::db::Database;

/// moneychat - Ask your finance advisor 💰
#[derive(Parser, Debug)]
#[command(name = "mchat")]
#[command(version, about, long_about = None)]
struct Args {
    /// Execute a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Advisor chat endpoint URL
    #[arg(long, env = "MONEYCHAT_ENDPOINT")]
    endpoint: Option<String>,

    /// Response language code (zh, en)
    #[arg(long, env = "MONEYCHAT_LANGUAGE")]
    language: Option<String>,

    /// Database file (defaults to the XDG data directory)
    #[arg(long, env = "MONEYCHAT_DB")]
    db: Option<PathBuf>,

    /// Working directory (like git -C)
    #[arg(short = 'C', long, visible_alias = "directory")]
    cwd: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Change working directory if specified (do this early)
    if let Some(cwd) = &args.cwd {
        std::env::set_current_dir(cwd).with_context(|| format!("Cannot change to {}", cwd))?;
    }

    init_tracing(&args);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args))
}

fn init_tracing(args: &Args) {
    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn" // Quiet by default for normal use
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.debug || args.verbose {
        tracing::info!("Debug logging enabled");
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let db = match &args.db {
        Some(path) => Database::open_at(path.clone()),
        None => Database::open(),
    }
    .context("Failed to open database")?;
    db.migrate()?;
    tracing::debug!(path = %db.path().display(), "Database ready");

    let overrides = ConfigOverrides {
        endpoint: args.endpoint,
        language: args.language,
    };

    if let Some(prompt) = args.prompt {
        cli::run_single_prompt(&db, &prompt, overrides).await
    } else {
        cli::run_interactive(&db, overrides).await
    }
}
