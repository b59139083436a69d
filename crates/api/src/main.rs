use anyhow::Context;
use tracing::info;

use kardex_api::app;
use kardex_api::config::Config;
use kardex_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    kardex_observability::init_with(&config.log.filter, LogFormat::parse(&config.log.format));

    let services = app::build_services(&config.store)
        .await
        .context("building services")?;
    let router = app::build_app(services, &config.cors, config.is_development());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %listener.local_addr()?, environment = %config.environment, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
