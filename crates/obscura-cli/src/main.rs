use clap::Parser;
use obscura_cli::commands;
use obscura_cli::config::{Cli, ObscuraConfig};
use obscura_logging::ObscuraSubscriberBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ObscuraConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Set up logging
    let _guard = ObscuraSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init();

    commands::run(cli.command, config).await
}
