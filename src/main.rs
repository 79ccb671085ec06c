//! Entry point: load config, wire the feed, and run the server.

use std::future::IntoFuture;

use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use fleetwatch::config::Config;
use fleetwatch::middleware::HEADER_APP_KEY;
use fleetwatch::services::{spawn_simulators, FeedService};
use fleetwatch::{create_app, AppState};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let feed = FeedService::new(config.feed_capacity);
    let simulators = if config.simulate {
        spawn_simulators(
            feed.clone(),
            config.reading_interval,
            config.notification_interval,
        )
    } else {
        Vec::new()
    };

    let state = AppState::new(config.app_key.clone(), feed);

    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("config: invalid ALLOWED_ORIGIN: {}", e))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_APP_KEY)]);

    let app = create_app(state).layer(cors);

    tracing::info!(addr = %config.server_addr, simulate = config.simulate, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    // Open SSE streams never finish on their own, so stop without draining them.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = shutdown_signal() => {}
    }

    for handle in simulators {
        handle.abort();
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
