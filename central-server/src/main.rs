//! Central Server
//!
//! Event distribution hub: ingests webhooks, fans events out to subscribers
//! and publishes CI results back to GitHub.

mod api;
mod config;
mod log_events;
mod server;
mod shutdown;
mod state;

use central_core::credentials::CredentialCache;
use central_core::dispatch::Dispatcher;
use central_core::github::GitHubApp;
use central_core::processors::{
    BuildFailureNotifier, BuildTrigger, CommitStatusPublisher, EventHistory, PullRequestBuilder,
    spawn_pull_request_builds,
};
use central_core::utils::spawn_periodic_task;
use central_sdk::client::{BuildbotClient, GitHubClient};
use central_sdk::jwt::AppKey;
use clap::Parser;
use config::ConfigLoader;
use log_events::EventLogLayer;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Central - event distribution hub for CI and code review automation
#[derive(Parser, Debug)]
#[command(name = "central-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./central.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log records are dispatched as events, so the dispatcher comes first
    let dispatcher = Arc::new(Dispatcher::new());
    init_tracing(&dispatcher);

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting central-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // GitHub App credentials
    let pem = std::fs::read_to_string(&config.github.private_key_path).map_err(|e| {
        tracing::error!(
            "Failed to read GitHub App private key {:?}: {}",
            config.github.private_key_path,
            e
        );
        e
    })?;
    let key = AppKey::from_pem(&pem).map_err(|e| {
        tracing::error!("Invalid GitHub App private key: {}", e);
        e
    })?;
    let github = GitHubClient::new(config.github.api_url.clone());
    let app = GitHubApp::new(config.github.app_id.clone(), key, github.clone());
    let credentials = Arc::new(
        CredentialCache::new(app).with_refresh_margin(config.pipeline.token_refresh_margin),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let history = Arc::new(EventHistory::new(config.pipeline.history_len));
    let mut tasks = Vec::new();

    // Register subscribers
    let (status_publisher, handle) =
        CommitStatusPublisher::spawn(credentials.clone(), github.clone(), shutdown_rx.clone());
    dispatcher.register(Arc::new(status_publisher));
    tasks.push(handle);

    match &config.buildbot {
        Some(buildbot) => {
            let client = BuildbotClient::new(
                &buildbot.url,
                &buildbot.change_hook_username,
                &buildbot.change_hook_password,
            )?;
            let (trigger, handle) = BuildTrigger::spawn(client.clone(), shutdown_rx.clone());
            dispatcher.register(Arc::new(trigger));
            tasks.push(handle);

            let pull_requests = Arc::new(config.pull_requests.clone());
            let builder = PullRequestBuilder::new(
                credentials.clone(),
                github.clone(),
                client,
                buildbot.url.clone(),
                pull_requests.builders.clone(),
                dispatcher.handle(),
            );
            let (listeners, handle) =
                spawn_pull_request_builds(builder, pull_requests, shutdown_rx.clone())?;
            for listener in listeners {
                dispatcher.register(listener);
            }
            tasks.push(handle);
        }
        None => tracing::info!("No [buildbot] section, build triggering disabled"),
    }

    let (notifier, handle) = BuildFailureNotifier::spawn(
        config.pipeline.settle_timeout,
        dispatcher.handle(),
        shutdown_rx.clone(),
    );
    dispatcher.register(Arc::new(notifier));
    tasks.push(handle);

    dispatcher.register(history.clone());
    tracing::info!("Registered {} event targets", dispatcher.target_count());

    // Periodic maintenance
    let directory_credentials = credentials.clone();
    tasks.push(spawn_periodic_task(
        "installation_directory",
        config.github.directory_refresh,
        shutdown_rx.clone(),
        move || {
            let credentials = directory_credentials.clone();
            async move { credentials.rebuild_directory().await.map(|_| ()) }
        },
    ));
    let audit_credentials = credentials.clone();
    tasks.push(spawn_periodic_task(
        "app_config_check",
        config.github.config_check,
        shutdown_rx.clone(),
        move || {
            let credentials = audit_credentials.clone();
            async move { credentials.check_app_configuration().await.map(|_| ()) }
        },
    ));

    // Spawn config reload handler (listens for SIGHUP)
    tasks.push(spawn_config_reload_handler(
        dispatcher.clone(),
        config_loader,
        shutdown_rx,
    ));

    // Build the router
    let router = build_router(AppState::new(dispatcher, history));

    // Run the server
    tracing::info!("Starting HTTP server on {}", config.server.listen);
    let result = run_server(router, config.server.listen).await;

    // Stop background workers
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Background task failed: {}", e);
        }
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Records that pass the filter are also dispatched as `internal_log` events.
fn init_tracing(dispatcher: &Arc<Dispatcher>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(EventLogLayer::new(dispatcher.handle()))
        .init();
}
