use anyhow::Result;
use clap::Parser;

mod actions;
mod catalog;
mod cli;
mod config;
mod error;
mod flatpak;
mod gui;
mod info;
mod logging;
mod session;
mod utils;

use cli::Cli;
use config::{Config, Installation};
use session::Session;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = logging::init(cli.verbose)?;
    log::debug!("arguments: {:?}", std::env::args().collect::<Vec<String>>());

    let mut config = Config::load().unwrap_or_else(|e| {
        log::warn!("could not load config, using defaults: {}", e);
        Config::default()
    });
    if cli.user {
        config.installation = Installation::User;
    }

    let session = Session::connect(config)?;

    match (cli.command, cli.file) {
        (Some(command), _) => command.run(&session),
        (None, Some(file)) => {
            log::info!("opening install window for {}", file.display());
            gui::install_dialog::InstallDialog::run_separate_window(session, &file)?;
            Ok(())
        }
        (None, None) => {
            gui::run(session)?;
            log::debug!("catalog window closed");
            Ok(())
        }
    }
}
