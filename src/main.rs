use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;

use novac_gateway::config::Config;
use novac_gateway::gateway::PaymentGateway;
use novac_gateway::novac::NovacClient;
use novac_gateway::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let client = NovacClient::new(
        config.novac_api_url.clone(),
        config.novac_public_key.clone(),
        config.novac_secret_key.clone(),
    );
    tracing::info!(
        mode = ?config.mode,
        api_url = %config.novac_api_url,
        "Novac client initialized"
    );

    let gateway = PaymentGateway::new(pool.clone(), client, config.public_base_url.clone());

    let app_state = AppState {
        db: pool,
        gateway,
        config: config.clone(),
    };
    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    // ConnectInfo feeds the webhook IP filter when no proxy headers exist.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
