use std::sync::Arc;
use tokio::net::TcpListener;

use pulse_relay::config::{generate_config_template, Config};
use pulse_relay::db;
use pulse_relay::db::lookup::SqliteProfileStore;
use pulse_relay::routes;
use pulse_relay::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pulse_relay=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    tracing::info!("Pulse relay v{} starting", env!("CARGO_PKG_VERSION"));

    // Profile/post lookups for notification enrichment
    let db = db::init_db(&config.data_dir)?;
    let store = Arc::new(SqliteProfileStore::new(db));

    let app_state = AppState::new(store, config.enrichment_timeout(), config.heartbeat());
    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
