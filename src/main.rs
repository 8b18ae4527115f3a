use anyhow::Result;
use clap::Parser;

use taxchat::{
    app::{load_config_with, AppState},
    cli::{handle_command, Cli, Commands},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logger(cli.verbose);

    // Load configuration, letting --api-url win over every file and env layer
    let mut config = load_config_with(cli.config.as_deref())?;
    if let Some(api_url) = &cli.api_url {
        config.api.base_url = api_url.clone();
    }

    let state = AppState::new(config)?;
    let command = cli.command.unwrap_or(Commands::Chat { id: None });
    handle_command(&command, &state, cli.output_format).await
}
