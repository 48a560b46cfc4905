//! Pinzo Server - bookmark server with live change relay.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pinzo_server::{
    auth::{JwtAuthenticator, SharedAuthService},
    config::{Args, ServerConfig},
    create_router,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let log_filter = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pinzo_server={},tower_http=info", log_filter).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        protocol_version = pinzo_proto::PROTOCOL_VERSION,
        "starting Pinzo server"
    );

    // Session verification
    let mut authenticator = JwtAuthenticator::from_env()?;
    if let Some(issuer) = args.jwt_issuer.clone() {
        authenticator = authenticator.with_issuer(issuer);
    }
    if let Some(audience) = args.jwt_audience.clone() {
        authenticator = authenticator.with_audience(audience);
    }
    let auth: SharedAuthService = Arc::new(authenticator);

    let config: ServerConfig = args.into();
    tracing::info!(
        listen = %config.listen_addr,
        public_url = %config.public_url,
        protected_prefix = %config.protected_prefix,
        subscriber_buffer = config.subscriber_buffer,
        "configuration loaded"
    );

    // Store, relay and CDC processor
    let listen_addr = config.listen_addr.clone();
    let (state, cdc_task) = AppState::new(config, auth);

    let app = create_router(state);
    let listener = TcpListener::bind(&listen_addr).await?;

    tracing::info!("Pinzo listening on {}", listener.local_addr()?);
    tracing::info!("Change feed at ws://{}/ws/changes", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cdc_task.abort();
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
