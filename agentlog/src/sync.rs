//! agentlog-sync - CLI tool to sync coding-agent session logs to the database
//!
//! Discovers Claude Code and Codex session logs, detects which changed since
//! the last run, and writes parsed sessions into the agentlog database.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/agentlog/sessions.db (~/.local/share/agentlog/sessions.db)
//! - Logs: $XDG_STATE_HOME/agentlog/agentlog.log.<date> (~/.local/state/agentlog/)
//! - Config: $XDG_CONFIG_HOME/agentlog/config.toml (~/.config/agentlog/config.toml)

use agentlog_core::{AgentKind, Config, Database, SyncEngine, SyncStats};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "agentlog-sync")]
#[command(about = "Sync Claude Code and Codex session logs to the database")]
#[command(version)]
struct Args {
    /// Verbose output (-v per-file)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Dry run - discover files but don't sync
    #[arg(long)]
    dry_run: bool,

    /// Force a resync of one session (Claude ID, `codex:<uuid>` or bare UUID)
    #[arg(long, value_name = "ID")]
    session: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        agentlog_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("agentlog-sync starting");

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    println!("Database: {}", db_path.display());

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after the current file...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let engine = SyncEngine::new(db, config.sources).with_cancel_flag(cancel);

    if let Some(session_id) = args.session.as_deref() {
        return run_single_session(&engine, session_id);
    }

    print_sources(&engine);

    if args.dry_run {
        println!("\nDry run - no sync performed");
        tracing::info!("Dry run complete");
        return Ok(());
    }

    run_full_sync(&engine, args.verbose)
}

/// Print discovered file counts per agent
fn print_sources(engine: &SyncEngine) {
    let files = engine.discover();
    let sources = engine.sources();

    println!("Discovered {} session file(s):", files.len());
    for (agent, root) in [
        (AgentKind::Claude, sources.claude_root()),
        (AgentKind::Codex, sources.codex_root()),
    ] {
        let count = files.iter().filter(|f| f.agent == agent).count();
        println!(
            "  - {}: {} file(s) at {}",
            agent.display_name(),
            count,
            shorten_path(&root)
        );
    }
}

/// Run one full pass with a progress bar
fn run_full_sync(engine: &SyncEngine, verbose: u8) -> Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut last_synced = 0;
    let stats = engine.sync_all_with_progress(|progress, path| {
        pb.set_length(progress.files_total as u64);
        pb.set_position(progress.files_scanned as u64);
        pb.set_message(
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("...")
                .to_string(),
        );

        // -v: Show each file that was (re)written
        if verbose >= 1 && progress.sessions_synced > last_synced {
            pb.println(format!("  synced {}", shorten_path(path)));
        }
        last_synced = progress.sessions_synced;
    });

    pb.finish_and_clear();

    print_sync_stats(&stats);

    tracing::info!(
        synced = stats.synced,
        skipped = stats.skipped,
        failed = stats.failed,
        "agentlog-sync complete"
    );

    Ok(())
}

/// Force-resync a single session
fn run_single_session(engine: &SyncEngine, session_id: &str) -> Result<()> {
    let session = engine
        .sync_single_session(session_id)
        .with_context(|| format!("failed to sync session {}", session_id))?;

    println!("\nSession synced:");
    println!("  ID:       {}", session.id);
    println!("  Agent:    {}", session.agent.display_name());
    println!("  Project:  {}", session.project);
    println!(
        "  Messages: {} ({} from user)",
        session.message_count, session.user_message_count
    );
    println!("  Tokens:   {}", session.token_totals.total());
    if let Some(parent) = &session.parent_session_id {
        println!("  Parent:   {}", parent);
    }

    tracing::info!(session_id = %session.id, "agentlog-sync single session complete");
    Ok(())
}

/// Print sync result summary
fn print_sync_stats(stats: &SyncStats) {
    println!("\nSync complete:");
    println!("  Sessions synced:  {}", stats.synced);
    println!("  Files unchanged:  {}", stats.skipped);
    println!("  Files failed:     {}", stats.failed);

    if stats.cancelled {
        println!("  (cancelled before all files were checked)");
    }

    if !stats.errors.is_empty() {
        println!("\nErrors ({}):", stats.errors.len());
        for (path, err) in &stats.errors {
            println!("  {}: {}", shorten_path(path), err);
        }
    }
}

/// Shorten a path for display by abbreviating the home directory
fn shorten_path(path: &Path) -> String {
    if let Ok(home) = std::env::var("HOME") {
        if let Ok(suffix) = path.strip_prefix(&home) {
            return format!("~/{}", suffix.display());
        }
    }
    path.display().to_string()
}
