pub mod commands;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod remote;
pub mod state;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ClientConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe, HealthProbe};
use crate::db::SqliteRepository;
use crate::remote::{HttpRemote, RemoteService};
use crate::state::AppState;
use crate::sync::SyncScheduler;
use edurural_shell::config::ShellConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::warn!(dir = %config.data_dir.display(), error = %e, "could not create data directory");
    }

    tracing::info!("Opening local store...");
    let (repository, storage_mode) = SqliteRepository::open_or_degrade(config.db_path())?;

    let remote: Arc<dyn RemoteService> =
        Arc::new(HttpRemote::new(&config.backend_url, config.remote_timeout));
    let probe = Arc::new(HealthProbe::new(&config.backend_url, PROBE_TIMEOUT));
    let connectivity = ConnectivityMonitor::new(probe.check().await);
    tracing::info!(online = connectivity.is_online(), backend = %config.backend_url, "connectivity checked");

    let (state, intent_rx) = AppState::new(
        repository,
        storage_mode,
        remote,
        connectivity,
        config.sync_options(),
    );

    let scheduler = SyncScheduler::new(state.sync.clone(), config.sync_interval)
        .with_probe(probe)
        .spawn(intent_rx);

    let mut shell_config = ShellConfig::from_env();
    if shell_config.cache_db.is_none() {
        shell_config.cache_db = Some(config.data_dir.join("shell-cache.db"));
    }
    let shell = tokio::spawn(edurural_shell::serve(shell_config, state.intents.clone()));

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        res = shell => match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "shell proxy stopped"),
            Err(e) => tracing::error!(error = %e, "shell proxy task failed"),
        },
    }

    tracing::info!("Shutting down...");
    scheduler.shutdown().await;

    Ok(())
}
