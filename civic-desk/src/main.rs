//! Civic Desk - Main entry point.

use anyhow::Result;
use civic_common::config::Config;
use civic_common::config_loader::check_config_files;
use civic_common::logging::init_logging;
use civic_desk::start_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; refuses to start without WhatsApp credentials
    let config = Config::load_and_validate()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Civic Desk v{}", env!("CARGO_PKG_VERSION"));
    for (file, found) in check_config_files(None) {
        tracing::debug!(file = %file, found, "Config layer");
    }

    start_server(&config).await
}
