//! Process bootstrap for the two roles.
//!
//! Wires together configuration, the signing key, the storage-node client,
//! the state manager, and the router, then serves until SIGINT/SIGTERM.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::{self, AppState};
use crate::config::{self, Config};
use crate::crypto::PublicKey32;
use crate::dns::DohVerifier;
use crate::infra::{
    shutdown_signal, LogError, RemoteLog, Replica, ShutdownCoordinator, ShutdownSignal,
    StorageClient, TreeBackend,
};
use crate::metrics::MetricsRegistry;
use crate::state::{PrimaryState, ReplicationState, StateSource};

/// Default DNS-over-HTTPS resolver for domain-hint checks.
pub const DEFAULT_DOH_URL: &str = "https://cloudflare-dns.com/dns-query";

/// Options for the primary role.
#[derive(Debug, Clone)]
pub struct PrimaryOptions {
    pub listen_addr: SocketAddr,
    pub backend_url: String,
    pub key_file: PathBuf,
    pub state_file: Option<PathBuf>,
    pub witness_file: Option<PathBuf>,
    pub secondary_url: Option<String>,
    /// Hex-encoded public key the secondary signs its tree heads with.
    pub secondary_key: Option<String>,
    pub doh_url: String,
    pub tree_id: i64,
    pub prefix: String,
    pub interval: Duration,
    pub deadline: Duration,
    pub max_range: u64,
    pub shard_start: u64,
}

/// Options for the secondary role.
#[derive(Debug, Clone)]
pub struct SecondaryOptions {
    pub listen_addr: SocketAddr,
    pub backend_url: String,
    pub key_file: PathBuf,
    pub primary_url: String,
    /// Hex-encoded public key the primary signs its tree heads with.
    pub primary_key: String,
    pub tree_id: i64,
    pub prefix: String,
    pub interval: Duration,
    pub deadline: Duration,
    pub max_range: u64,
}

/// Run a primary node until shutdown.
pub async fn run_primary(options: PrimaryOptions) -> anyhow::Result<()> {
    init_tracing();
    info!("starting lantern-log primary v{}", env!("CARGO_PKG_VERSION"));

    let signer = Arc::new(config::load_signing_key(&options.key_file)?);
    let witnesses = match &options.witness_file {
        Some(path) => config::parse_witness_file(&std::fs::read_to_string(path)?)?,
        None => HashMap::new(),
    };
    let config = Config::new(
        &signer.public_key_bytes(),
        options.tree_id,
        options.prefix.clone(),
        options.max_range,
        options.deadline,
        options.interval,
        options.shard_start,
        witnesses,
    )?;
    info!("log id: {}", config.log_id);
    info!("  tree id: {}", config.tree_id);
    info!("  interval: {:?}, deadline: {:?}", config.interval, config.deadline);
    info!("  witnesses: {}", config.witnesses.len());

    let backend: Arc<dyn TreeBackend> = Arc::new(StorageClient::new(
        &options.backend_url,
        options.tree_id,
        options.deadline,
    )?);

    let replica: Option<Arc<dyn Replica>> = match (&options.secondary_url, &options.secondary_key)
    {
        (Some(url), Some(key_hex)) => {
            let public_key = parse_public_key(key_hex)?;
            info!("  secondary: {url}");
            Some(Arc::new(RemoteLog::new(
                url,
                &options.prefix,
                public_key,
                options.deadline,
            )?))
        }
        (Some(_), None) => {
            anyhow::bail!("--secondary-url requires --secondary-key");
        }
        _ => {
            info!("  secondary: none (standalone mode)");
            None
        }
    };

    let dns = Arc::new(DohVerifier::new(&options.doh_url, options.deadline)?);
    let metrics = Arc::new(MetricsRegistry::new());

    let state = Arc::new(PrimaryState::new(
        backend.clone(),
        signer,
        replica,
        options.interval,
        options.deadline,
        options.state_file.clone(),
        metrics.clone(),
    )?);
    state.startup_rotate().await;

    let app_state = AppState {
        config: Arc::new(config),
        backend,
        dns,
        state: state.clone() as Arc<dyn StateSource>,
        metrics,
    };
    let app = api::router(app_state, api::primary_handlers());

    let rotation = state.clone();
    serve(app, options.listen_addr, move |signal| rotation.run(signal)).await
}

/// Run a secondary node until shutdown.
pub async fn run_secondary(options: SecondaryOptions) -> anyhow::Result<()> {
    init_tracing();
    info!(
        "starting lantern-log secondary v{}",
        env!("CARGO_PKG_VERSION")
    );

    let signer = Arc::new(config::load_signing_key(&options.key_file)?);
    let config = Config::new(
        &signer.public_key_bytes(),
        options.tree_id,
        options.prefix.clone(),
        options.max_range,
        options.deadline,
        options.interval,
        0,
        HashMap::new(),
    )?;
    info!("log id: {}", config.log_id);
    info!("  replicating from: {}", options.primary_url);

    let backend: Arc<dyn TreeBackend> = Arc::new(StorageClient::new(
        &options.backend_url,
        options.tree_id,
        options.deadline,
    )?);
    let primary = Arc::new(RemoteLog::new(
        &options.primary_url,
        &options.prefix,
        parse_public_key(&options.primary_key)?,
        options.deadline,
    )?);
    let metrics = Arc::new(MetricsRegistry::new());

    let state = Arc::new(ReplicationState::new(
        backend.clone(),
        primary,
        signer,
        options.interval,
        options.deadline,
        options.max_range,
    )?);

    let app_state = AppState {
        config: Arc::new(config),
        backend,
        dns: Arc::new(DohVerifier::new(DEFAULT_DOH_URL, options.deadline)?),
        state: state.clone() as Arc<dyn StateSource>,
        metrics,
    };
    let app = api::router(app_state, api::secondary_handlers());

    let replication = state.clone();
    serve(app, options.listen_addr, move |signal| {
        replication.run(signal)
    })
    .await
}

async fn serve<F, Fut>(app: Router, listen_addr: SocketAddr, spawn_loop: F) -> anyhow::Result<()>
where
    F: FnOnce(ShutdownSignal) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let state_task = tokio::spawn(spawn_loop(coordinator.signal()));

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("listening on {listen_addr}");

    let on_shutdown = coordinator.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            on_shutdown.shutdown();
        })
        .await?;

    // Covers error exits from the serve loop as well.
    coordinator.shutdown();
    state_task.await.ok();
    info!("shutdown complete");
    Ok(())
}

fn parse_public_key(hex_str: &str) -> Result<PublicKey32, LogError> {
    hex::decode(hex_str.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| LogError::Config("expected a hex-encoded 32-byte public key".to_string()))
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
