//! Relay server for long-lived conversations with a remote agent.
//!
//! Run with: cargo run -p a2a-relay-server
//!
//! Configuration is read from the environment (and `.env`); see `config`.

mod config;

use std::sync::Arc;

use a2a_relay_client::A2aClient;
use a2a_relay_core::CallStats;
use a2a_relay_session::{SessionManager, storage::JsonFileStore};
use a2a_relay_transport::{AppState, router};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let store = JsonFileStore::under(&config.data_dir)
        .await
        .context("opening conversation store")?;
    tracing::info!(path = %store.root().display(), "Conversation store ready");

    let client = A2aClient::new(config.agent_url.clone())
        .context("building agent client")?
        .with_request_timeout(config.request_timeout);
    if client.probe().await {
        tracing::info!(agent = %client.endpoint(), "Remote agent reachable");
    } else {
        tracing::warn!(agent = %client.endpoint(), "Remote agent not reachable, continuing");
    }

    let stats = Arc::new(CallStats::new());
    let manager = Arc::new(SessionManager::new(store, client, stats.clone()));
    let app = router(AppState::new(manager, stats));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!("Server listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
