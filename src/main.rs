use anyhow::Result;
use pricewatch::config::Config;
use pricewatch::host::ready_channel;
use pricewatch::logging::{get_logger, init_logging};
use pricewatch::poller::PricePoller;
use pricewatch::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    let logger = get_logger("main");
    logger.info(&format!(
        "Pricewatch {} starting; accessory '{}' using {} source",
        pricewatch::APP_VERSION,
        config.accessory.name,
        config.source.kind.as_str()
    ));

    let poller = PricePoller::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create poller: {}", e))?;
    let handle = poller.handle();
    let (ready, listener) = ready_channel();
    let startup = poller.startup(Some(listener));
    let poller_task = poller.spawn(startup);

    let web_task = if config.web.enabled {
        let state = AppState::new(handle.clone(), &config);
        let host = config.web.host.clone();
        let port = config.web.port;
        let web_logger = logger.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = web::serve(state, &host, port, Some(ready)).await {
                web_logger.error(&format!("Web server error: {}", e));
            }
        }))
    } else {
        ready.notify();
        None
    };

    tokio::signal::ctrl_c().await?;
    logger.info("Shutdown requested");

    if let Err(e) = handle.shutdown() {
        logger.warn(&format!("Poller already stopped: {}", e));
    }
    match poller_task.await {
        Ok(stats) => logger.info(&format!(
            "Poller stopped after {} cycles ({} failures)",
            stats.cycles, stats.failures
        )),
        Err(e) => logger.error(&format!("Poller task failed: {}", e)),
    }
    if let Some(task) = web_task {
        task.abort();
    }
    Ok(())
}
