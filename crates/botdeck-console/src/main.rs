use anyhow::Context;
use botdeck_client::RestClient;
use botdeck_console::cli::{Cli, Command};
use botdeck_console::table::TokenDisplay;
use botdeck_console::{commands, console, logging, ConsoleConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConsoleConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    let command = cli.command();
    if command == Command::Console {
        match config.log_path() {
            Some(path) => logging::init_file(&config.log_level, &path)?,
            None => logging::init_stderr(&config.log_level)?,
        }
        return console::run_console(&config).await;
    }

    logging::init_stderr(&config.log_level)?;
    let rest = RestClient::new(&config.server_url, config.request_timeout())?;
    let tokens = if config.mask_tokens {
        TokenDisplay::Masked
    } else {
        TokenDisplay::Plain
    };
    let mut stdout = std::io::stdout().lock();
    commands::run(&command, &rest, tokens, &mut stdout).await
}
