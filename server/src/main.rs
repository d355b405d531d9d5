mod api;
mod state;

use std::net::Ipv4Addr;

use anyhow::Context;
use docintel::logging::init_tracing;
use docintel::Settings;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env().context("reading configuration")?;
    init_tracing(settings.log_format);

    let service = state::build(&settings)?;
    let app = api::create_router(service.state.clone());

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, settings.server_port))
        .await
        .with_context(|| format!("binding port {}", settings.server_port))?;
    tracing::info!(
        "Listening on http://0.0.0.0:{} with {} workers",
        settings.server_port,
        service.pool.worker_count()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    service.pool.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
