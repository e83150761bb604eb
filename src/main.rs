mod api;
mod blockchain;
mod bootstrap;
mod config;
mod error;
mod ledger;
mod reconciliation;
mod server;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Args, Config, Env};

// Initialize logging and tracing
fn init_tracing(env: Env, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("{},tower_http=debug", level)));

    let registry = tracing_subscriber::registry().with(filter);
    match env {
        Env::Dev => registry.with(tracing_subscriber::fmt::layer()).init(),
        Env::Prod => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    dotenv::dotenv().ok();
    let config = Config::load(&args)?;

    init_tracing(args.env, &config.logger.level);
    info!("🚀 Starting ETH transfer reconciler ({})", args.env.as_str());

    let application = bootstrap::initialize_app(&config).await?;

    let handle = application.reconciler.start();

    // Create HTTP server
    let app = server::create_app(application.state).await;

    // Run the Server
    let served = server::run_server(app, &config.server.bind_address).await;

    handle.abort();
    application.store.close().await;
    info!("👋 Server stopped");

    served
}
