mod args;
mod profiles;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use vulnscan_core::{Dispatcher, InitialStatus, ReplayExecutor, SessionStore, StoreSnapshot};
use vulnscan_types::ScanConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args using get_matches() so we can access ArgMatches for profile merging
    let matches = Args::command().get_matches();
    let mut args = Args::from_arg_matches(&matches).map_err(|e| anyhow::anyhow!(e))?;

    // Handle --list-profiles: show available profiles and exit (before tracing init)
    if args.list_profiles {
        profiles::show_profiles();
        return Ok(());
    }

    // Handle --save-profile: save current args as a profile and exit
    if let Some(ref name) = args.save_profile {
        let profile = profiles::args_to_profile(&args);
        let path = profiles::save_profile(name, &profile)?;
        println!("Profile '{name}' saved to {}.", path.display());
        return Ok(());
    }

    if let Some(ref profile_name) = args.profile.clone() {
        let profile = profiles::load_profile(profile_name)
            .with_context(|| format!("failed to load profile '{profile_name}'"))?;
        profiles::apply_profile_with_matches(&profile, &mut args, &matches);
    }

    // Initialize tracing based on verbosity
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    if let Some(ref profile) = args.profile {
        info!(profile = %profile, "applied scan profile");
    }

    let history_path = args.history_file.clone().unwrap_or_else(default_history_path);
    let initial = if args.queued {
        InitialStatus::Queued
    } else {
        InitialStatus::Running
    };

    // Handle --history: list session history and exit
    if args.history {
        let store = load_history(&history_path, initial)?;
        print!("{}", report::render_history(&store.summaries()));
        return Ok(());
    }

    // Handle --api: start REST API server and block
    if args.api {
        return serve_api(&args, &history_path, initial).await;
    }

    let request = args
        .to_request()
        .context("a scan target is required")?;
    let config = request.into_config().context("invalid scan configuration")?;

    match args.replay {
        Some(ref log) => {
            let executor = load_replay(log, args.replay_delay_ms)?;
            run_replay(config, executor, &history_path, initial).await
        }
        None => {
            // No executor attached: show what would be handed to one.
            println!("{}", config.engine_args().join(" "));
            Ok(())
        }
    }
}

/// Per-user state directory.
pub(crate) fn vulnscan_home() -> PathBuf {
    if cfg!(windows) {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("vulnscan")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".vulnscan")
    }
}

fn default_history_path() -> PathBuf {
    vulnscan_home().join("history.json")
}

/// Restore the session store from the history file, or start empty.
fn load_history(path: &Path, initial: InitialStatus) -> Result<SessionStore> {
    if !path.exists() {
        return Ok(SessionStore::with_initial_status(initial));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    let mut snapshot: StoreSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse history file {}", path.display()))?;
    snapshot.initial_status = initial;
    Ok(SessionStore::from_snapshot(snapshot))
}

fn save_history(path: &Path, store: &SessionStore) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&store.snapshot())
        .context("failed to serialize session history")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write history file {}", path.display()))?;
    info!(path = %path.display(), sessions = store.len(), "session history saved");
    Ok(())
}

fn load_replay(path: &Path, delay_ms: u64) -> Result<ReplayExecutor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read replay log {}", path.display()))?;
    let executor = ReplayExecutor::from_json(&content)
        .with_context(|| format!("failed to parse replay log {}", path.display()))?;
    Ok(executor.with_delay(Duration::from_millis(delay_ms)))
}

/// Run one session against a recorded event log and print its report.
/// Ctrl+C cancels the session.
async fn run_replay(
    config: ScanConfig,
    executor: ReplayExecutor,
    history_path: &Path,
    initial: InitialStatus,
) -> Result<()> {
    let store = Arc::new(load_history(history_path, initial)?);
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(executor));

    let handle = dispatcher.submit(config).await;
    let id = handle.id().clone();
    tokio::select! {
        _ = handle.finished() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!(scan_id = %id, "interrupted, cancelling scan");
            if let Err(e) = dispatcher.cancel(&id).await {
                warn!(scan_id = %id, error = %e, "cancel failed");
            }
        }
    }

    let session = store.get(&id)?;
    print!("{}", report::render_session(&session));
    save_history(history_path, &store)
}

async fn serve_api(args: &Args, history_path: &Path, initial: InitialStatus) -> Result<()> {
    let listen_addr: std::net::SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid --listen address: {}", args.listen))?;
    let config = vulnscan_api::ApiConfig { listen_addr };

    let store = Arc::new(load_history(history_path, initial)?);
    let state = match args.replay {
        Some(ref log) => {
            let executor = load_replay(log, args.replay_delay_ms)?;
            vulnscan_api::state::AppState::with_dispatcher(Dispatcher::new(
                store.clone(),
                Arc::new(executor),
            ))
        }
        None => vulnscan_api::state::AppState::new(store.clone()),
    };

    eprintln!("vulnscan API server listening on http://{listen_addr}");
    vulnscan_api::start_server(config, state).await?;
    save_history(history_path, &store)
}
