//! Boardsync Player - headless composition root.
//!
//! Connects to one game, follows it, and logs every delivered state.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boardsync_player::config::{load_dotenv_from_repo_root, ClientConfig};
use boardsync_player::infrastructure::{
    ReqwestGameApi, TokioScheduler, TracingRenderer, TungstenitePushTransport,
};
use boardsync_player::{SessionDeps, SessionHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardsync_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Boardsync Player");

    let config = ClientConfig::from_env().context("loading configuration")?;
    let base_url = config.game_base_url()?;
    tracing::info!(
        game = %config.game_name,
        id = %config.game_id,
        api = %base_url,
        socket = %config.socket_url,
        "Configuration loaded"
    );

    let deps = SessionDeps {
        api: Arc::new(ReqwestGameApi::new(base_url)),
        push: Arc::new(TungstenitePushTransport),
        scheduler: Arc::new(TokioScheduler::new(config.frame_interval)),
        renderer: Arc::new(TracingRenderer),
    };
    let session = SessionHandle::spawn(config.session_settings(), deps);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutting down");

    if let Some(snapshot) = session.snapshot().await {
        tracing::info!(
            current = snapshot.versions.current,
            target = snapshot.versions.target,
            queued = snapshot.queued,
            "Final session state"
        );
    }
    session.deactivate().await;
    Ok(())
}
