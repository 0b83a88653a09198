//! repohound - Find every git repository under a directory tree.
//!
//! Usage:
//!   repohound                 Scan the configured directory and print a summary
//!   repohound --force-scan    Rescan even if stored results cover the directory
//!   repohound status <ID>     Porcelain status of a stored repository
//!   repohound pull <ID>       Fast-forward a stored repository, streaming progress
//!   repohound show <ID>       Stored record merged with fresh git details
//!   repohound --help          Show help

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use futures::StreamExt;
use itertools::Itertools;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use repohound_core::{RepoId, ScanReport, ScanWarning, Settings, WarningKind};
use repohound_git::Git2Collaborator;
use repohound_session::{
    EventDetail, EventKind, JsonResultStore, OperationHub, OperationKind, ResultStore, SseStatus,
    StartOutcome, payload_stream, sse_frame,
};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "REPOHOUND_LOG";

const CRATE_TARGETS: &[&str] = &[
    "repohound",
    "repohound_core",
    "repohound_scan",
    "repohound_git",
    "repohound_session",
];

#[derive(Parser)]
#[command(
    name = "repohound",
    version,
    about = "Find every git repository under a directory tree",
    long_about = "repohound walks the configured scan directory, records every git \
                  repository it finds along with its branch, remotes and recent \
                  commits, and saves the results as JSON.\n\n\
                  Run without a subcommand to scan, or use subcommands to inspect \
                  and update repositories from the stored results."
)]
struct Cli {
    /// Rescan even when stored results cover the scan directory
    #[arg(long)]
    force_scan: bool,

    /// Print debug logs and result tables
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the working tree status of a stored repository
    Status {
        /// Repository id from the results file
        id: String,
    },

    /// Fast-forward a stored repository from its first remote
    Pull {
        /// Repository id from the results file
        id: String,
    },

    /// Show a stored repository with fresh git details as JSON
    Show {
        /// Repository id from the results file
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(Settings::config_path)
        .ok_or_else(|| eyre!("Could not determine the configuration directory"))?;
    let settings = Settings::load_or_init(&config_path);
    let verbose = cli.verbose || settings.verbose;
    init_tracing(verbose);

    let store = Arc::new(JsonResultStore::new(settings.results_path()));
    let hub = Arc::new(OperationHub::new(
        settings.scan_config(),
        Arc::new(Git2Collaborator::new()),
        Arc::clone(&store) as Arc<dyn ResultStore>,
    ));

    match cli.command {
        None => {
            run_scan(&hub, &store, &settings, cli.force_scan, verbose).await;
            Ok(())
        }
        Some(Command::Status { id }) => run_status(&hub, &RepoId::new(id)),
        Some(Command::Pull { id }) => run_pull(&hub, &RepoId::new(id)).await,
        Some(Command::Show { id }) => run_show(&hub, &RepoId::new(id)),
    }
}

fn init_tracing(verbose: bool) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
            EnvFilter::new(CRATE_TARGETS.iter().map(|target| format!("{target}={level}")).join(","))
        });

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

/// Scan (or reuse stored results) and print the summary.
///
/// Failures are reported on stderr and in the results file, never returned.
async fn run_scan(
    hub: &Arc<OperationHub>,
    store: &JsonResultStore,
    settings: &Settings,
    force_scan: bool,
    verbose: bool,
) {
    let root = settings
        .scan_directory
        .canonicalize()
        .unwrap_or_else(|_| settings.scan_directory.clone());

    let stored = if force_scan {
        None
    } else {
        store.load().filter(|report| report.covers(&root))
    };

    let (report, elapsed) = match stored {
        Some(report) => {
            eprintln!(
                "Using stored results from {} (pass --force-scan to rescan)",
                format_time(Some(report.scan_time))
            );
            let elapsed = Duration::from_secs_f64(report.scan_duration_seconds);
            (report, elapsed)
        }
        None => {
            let started = Instant::now();
            let report = scan_with_progress(hub, store, &root, verbose).await;
            (report, started.elapsed())
        }
    };

    print_summary(&report, elapsed, store.path());

    if verbose {
        print_table(
            "Git Repositories",
            report
                .git_repositories
                .iter()
                .map(|r| (r.name.as_str(), r.path.as_path(), r.last_modified)),
        );
        print_table(
            "Non-Git Directories (Top-Level)",
            report
                .non_git_directories
                .iter()
                .map(|d| (d.name.as_str(), d.path.as_path(), d.last_modified)),
        );
    }
}

async fn scan_with_progress(
    hub: &Arc<OperationHub>,
    store: &JsonResultStore,
    root: &Path,
    verbose: bool,
) -> ScanReport {
    let mut subscription = hub.subscribe(OperationKind::Scan);

    let worker = match hub.start_scan(Some(root.to_path_buf()), None) {
        StartOutcome::Started { worker, .. } => worker,
        StartOutcome::AlreadyRunning(snapshot) => {
            let message = format!("A scan is already running: {}", snapshot.message);
            return failed_report(store, hub, root, message);
        }
        StartOutcome::UnknownRepository(id) => {
            let message = format!("Unexpected repository lookup for {id}");
            return failed_report(store, hub, root, message);
        }
    };

    let mut found = 0;
    let mut failure = None;
    loop {
        let event = match subscription.recv().await {
            Ok(event) => event,
            Err(err) => {
                failure = Some(format!("Progress stream ended: {err}"));
                break;
            }
        };

        let newly_found = event.snapshot.found_count > found;
        found = event.snapshot.found_count;
        match event.kind {
            EventKind::Progress if verbose || newly_found => eprintln!("{}", event.message),
            EventKind::Progress | EventKind::Heartbeat => {}
            EventKind::Started | EventKind::Completed | EventKind::Error => {
                eprintln!("{}", event.message)
            }
        }

        if event.is_terminal() {
            if event.kind == EventKind::Error {
                failure = Some(event.message);
            }
            break;
        }
    }

    if let Err(err) = worker.await {
        tracing::error!(error = %err, "scan worker did not finish cleanly");
    }

    match failure {
        None => match store.load() {
            Some(report) => report,
            None => failed_report(store, hub, root, "Scan results could not be read back".to_string()),
        },
        Some(message) => failed_report(store, hub, root, message),
    }
}

/// Persist an empty report recording why the scan produced nothing.
fn failed_report(store: &JsonResultStore, hub: &OperationHub, root: &Path, message: String) -> ScanReport {
    let config = hub.config().clone();
    let report = ScanReport::new(
        root.to_path_buf(),
        Vec::new(),
        Vec::new(),
        vec![ScanWarning::new(root, message, WarningKind::ReadError)],
        Duration::ZERO,
        config,
    );
    if let Err(err) = store.save(&report) {
        eprintln!("Could not save results: {err}");
    }
    report
}

fn print_summary(report: &ScanReport, elapsed: Duration, results_path: &Path) {
    let summary = report.summary();

    println!();
    println!("--- Scan Summary ---");
    println!("Scan Directory: {}", report.scan_directory.display());
    println!("Scan Duration: {:.2} seconds", elapsed.as_secs_f64());
    println!("Found {} Git-tracked repositories", summary.repositories);
    println!("Found {} top-level non-Git directories", summary.directories);
    if report.has_warnings() {
        println!("{} warnings (see results file)", summary.warnings);
        for warning in report.warnings.iter().take(5) {
            println!("  {}: {}", warning.path.display(), warning.message);
        }
    }
    println!("Results saved to: {}", results_path.display());
}

fn print_table<'a>(title: &str, rows: impl Iterator<Item = (&'a str, &'a Path, Option<DateTime<Utc>>)>) {
    let rows: Vec<_> = rows
        .map(|(name, path, modified)| (name.to_string(), path.display().to_string(), format_time(modified)))
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .collect();

    println!();
    if rows.is_empty() {
        println!("No {title} found.");
        return;
    }

    let name_width = rows.iter().map(|r| r.0.chars().count()).max().unwrap_or(0).max(4);
    let path_width = rows.iter().map(|r| r.1.chars().count()).max().unwrap_or(0).max(4);
    let rule = "─".repeat(name_width + path_width + 19 + 4);

    println!("{title}");
    println!("{rule}");
    println!("{:<name_width$}  {:<path_width$}  Last Modified", "Name", "Path");
    println!("{rule}");
    for (name, path, modified) in &rows {
        println!("{name:<name_width$}  {path:<path_width$}  {modified}");
    }
    println!("{rule}");
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn run_status(hub: &OperationHub, id: &RepoId) -> Result<()> {
    let status = hub
        .repository_status(id)
        .wrap_err_with(|| format!("Failed to read status of {id}"))?;
    println!("{status}");
    Ok(())
}

fn run_show(hub: &OperationHub, id: &RepoId) -> Result<()> {
    let record = hub
        .repository_details(id)
        .wrap_err_with(|| format!("Failed to load repository {id}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Run a pull through the hub, writing its progress as SSE frames to stdout.
async fn run_pull(hub: &Arc<OperationHub>, id: &RepoId) -> Result<()> {
    // Subscribe before starting so no event is missed.
    let mut payloads = Box::pin(payload_stream(Arc::clone(hub), OperationKind::Pull));

    let worker = match hub.start_pull(id) {
        StartOutcome::Started { worker, .. } => worker,
        StartOutcome::AlreadyRunning(snapshot) => {
            return Err(eyre!("A pull is already running: {}", snapshot.message));
        }
        StartOutcome::UnknownRepository(id) => {
            return Err(eyre!("Repository not found: {id}"));
        }
    };

    let mut succeeded = false;
    while let Some(payload) = payloads.next().await {
        print!("{}", sse_frame(&payload));
        let finished = match payload.status {
            SseStatus::Completed => {
                succeeded = matches!(
                    &payload.update,
                    Some(EventDetail::PullResult(outcome)) if outcome.success
                );
                true
            }
            SseStatus::Error => payload.update.is_none(),
            _ => false,
        };
        if finished {
            break;
        }
    }

    worker.await.wrap_err("Pull worker did not finish cleanly")?;

    if succeeded {
        Ok(())
    } else {
        Err(eyre!("Pull of {id} failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "N/A");

        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let formatted = format_time(Some(time));
        assert_eq!(formatted.len(), "2024-03-01 12:30:05".len());
        assert!(formatted.starts_with("2024-03-0"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["repohound", "--force-scan", "-v", "pull", "abc123"]);
        assert!(cli.force_scan);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Command::Pull { id }) if id == "abc123"));

        let cli = Cli::parse_from(["repohound", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(cli.command.is_none());
    }
}
