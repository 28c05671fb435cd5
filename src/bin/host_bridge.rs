//! Headless relay host binary.
//!
//! Starts the surface WebSocket listener and the switchboard, then serves the
//! app facade as newline-delimited JSON on stdin/stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use autobridge::BridgeConfig;
use autobridge::facade::AppFacade;
use autobridge::facade::stdio::{AppSession, run_stdio_bridge};
use autobridge::relay::relay_channel;
use autobridge::surface::remote::SurfaceHub;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing to stderr only (stdout is reserved for the JSON
    // protocol).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = BridgeConfig::default_config_path();
    let config = BridgeConfig::load_or_default(&config_path)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", config_path.display()))?;

    tracing::info!(
        config = %config_path.display(),
        store = ?config.store.backend,
        listen = %config.surfaces.listen_addr,
        "autobridge-host starting"
    );

    let store = autobridge::store::open(&config.store);
    let hub = Arc::new(SurfaceHub::new(&config.surfaces));
    let (addr, listener) = hub.listen(&config.surfaces.listen_addr).await?;
    tracing::info!(%addr, "waiting for surface agents");

    let (relay, switchboard) = relay_channel(&config, store, hub);
    let switchboard_handle = tokio::spawn(switchboard.run());

    let facade = AppFacade::new(relay, &config).with_locale(config.relay.default_locale);
    let session = AppSession::new(facade, &config.app);

    let result = run_stdio_bridge(session).await;

    listener.abort();
    let _ = switchboard_handle.await;

    result.map_err(|e| {
        tracing::error!(error = %e, "autobridge-host exited with error");
        anyhow::anyhow!("autobridge-host failed: {e}")
    })?;

    tracing::info!("autobridge-host shut down cleanly");
    Ok(())
}
