use convoy_core::telemetry::init_tracing;
use convoy_core::GatewayConfig;
use convoy_gateway::setup;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = GatewayConfig::from_env()?;
    init_tracing(config.base.log_format, "convoy_gateway");

    let (_state, router) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router).await?;

    Ok(())
}
