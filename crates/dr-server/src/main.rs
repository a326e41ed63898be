use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dr_engine::synthetic::SyntheticLoader;
use dr_server::{Config, Studio, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    tracing::info!(?config, "starting darkroom");

    // Placeholder backend; the step delay paces iterations so progress is
    // observable while polling.
    let loader = Arc::new(SyntheticLoader::new().with_step_delay(Duration::from_millis(50)));
    let studio =
        Arc::new(Studio::new(&config, loader).context("failed to initialize service")?);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, routes::router(studio)).await?;
    Ok(())
}
