use advice_service::config::AdviceConfig;
use advice_service::services::init_metrics;
use advice_service::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_metrics();

    let config = AdviceConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("advice-service", "info", config.otlp_endpoint.as_deref());

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
