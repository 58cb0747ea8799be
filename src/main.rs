use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use portrait_pipeline::{api, config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    config::Config::dotenv_load();
    let config = config::Config::new().expect("Failed to load configuration");
    config::Config::print_env_vars();

    let state = match api::routes::AppState::from_config(&config) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            tracing::error!(error = %err, "failed to build HTTP client");
            std::process::exit(1);
        }
    };
    let app = api::routes::build_router(state);

    let socket_address = config.socket_address();
    tracing::info!("listening on {}", socket_address);
    if let Err(err) = axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await
    {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
