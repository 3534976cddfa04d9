//! Souq Storefront - watch and perfume shop API

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use souq_storefront::auth::bootstrap_admin;
use souq_storefront::services::{EventPublisher, TelegramNotifier};
use souq_storefront::storage::{create_pool, Storage};
use souq_storefront::{router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let pool = create_pool(&config.database_url, config.database_max_connections).await.context("connecting to database")?;
    let storage = Storage::new(pool);
    storage.migrate().await.context("running migrations")?;

    bootstrap_admin(&storage, &config.auth).await.context("bootstrapping admin account")?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                tracing::info!(%url, "connected to NATS");
                Some(client)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, domain events will not be published");
                None
            }
        },
        None => None,
    };

    let telegram = match &config.telegram {
        Some(telegram) => Some(TelegramNotifier::new(telegram).context("building Telegram client")?),
        None => {
            tracing::info!("Telegram notifications disabled");
            None
        }
    };

    let events = EventPublisher::new(nats, telegram, config.currency.clone());
    let addr = config.socket_addr();
    let app = router(AppState::new(config, storage, events));

    tracing::info!("🚀 Souq storefront listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
