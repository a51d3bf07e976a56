use agri_predictor::{routes, Config, InferenceContext};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("agri_predictor=info".parse()?))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        timeout_s = config.request_timeout.as_secs(),
        log_features = config.log_features,
        "configuration loaded"
    );

    let ctx = InferenceContext::load(&config);
    if !ctx.is_ready() {
        tracing::warn!("running without all models; affected predictions will fail");
    }

    let app = routes::router(Arc::new(ctx), config.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
