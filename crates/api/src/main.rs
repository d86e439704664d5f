use anyhow::Context;

use smsgate_infra::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    smsgate_observability::init();

    let config = PipelineConfig::from_env().context("invalid configuration")?;
    let parts = smsgate_api::server::parts_from_config(&config).await?;
    let server = smsgate_api::server::build(&config, parts)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.http_port))?;

    tracing::info!(addr = %listener.local_addr()?, source = %config.event_source, "listening");

    axum::serve(listener, server.app).await?;
    Ok(())
}
