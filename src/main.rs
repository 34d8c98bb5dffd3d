use std::time::Duration;

use anyhow::Result;
use feed_guard::{
    app::FeedGuardApp,
    config,
    infrastructure::{directories, logging, shutdown},
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    // A blocking stdin read cannot be cancelled, so the runtime is shut down
    // with a deadline instead of waiting for the host to send one more line.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async move {
        let shutdown = shutdown::Shutdown::new();
        shutdown::install_signal_handlers(shutdown.clone());

        let app = FeedGuardApp::initialize(config, paths, shutdown.clone()).await?;
        app.run().await
    });
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
