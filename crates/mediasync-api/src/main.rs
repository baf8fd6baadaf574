use mediasync_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Initialize the application (repositories, gateway, plugin, routes)
    let (state, router) = mediasync_api::setup::initialize_app(config.clone()).await?;

    mediasync_api::setup::server::start_server(&config, router).await?;

    state.task_queue.shutdown().await;

    Ok(())
}
