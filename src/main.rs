//! part-relay server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use part_relay::config::{Cli, Config};
use part_relay::metrics::RelayMetrics;
use part_relay::producer::{LanguageModel, ScriptedModel, SharedModel, StubSearch};
use part_relay::relay::UuidIds;
use part_relay::server::api::{build_router, AppState};
use part_relay::workflows::Models;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "part_relay=debug,tower_http=debug"
    } else {
        "part_relay=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("part-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    config.validate()?;
    let config = Arc::new(config);

    info!(
        buffer_size = config.relay.buffer_size,
        session_timeout_secs = config.relay.session_timeout_secs,
        max_concurrent_requests = config.server.max_concurrent_requests,
        "Configuration loaded"
    );

    // Build the producers.
    let delay = config.models.chunk_delay();
    let basic: SharedModel = Arc::new(
        ScriptedModel::new(config.models.basic_model.clone())
            .with_chunking(config.models.chunk_chars, delay),
    );
    let advanced: SharedModel = Arc::new(
        ScriptedModel::new(config.models.advanced_model.clone())
            .with_chunking(config.models.chunk_chars, delay),
    );
    info!(
        basic = basic.id(),
        advanced = advanced.id(),
        "Models ready"
    );

    let search = Arc::new(
        StubSearch::new().with_default_delay(Duration::from_millis(config.search.result_delay_ms)),
    );

    // Build application state.
    let state = Arc::new(AppState::new(
        config.clone(),
        Models::new(basic, advanced),
        search,
        Arc::new(UuidIds),
        Arc::new(RelayMetrics::new()?),
    ));

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
