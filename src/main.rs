mod cli;
mod config;
mod error;
mod logging;
mod monitor;
mod probe;
mod report;
mod session;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::{ConfigManager, Settings};
use session::Session;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    if let Err(e) = run(args).await {
        eprintln!("ping-monitor: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = ConfigManager::load(args.config.as_deref())?;
    let settings = Settings::resolve(&args, &config.config)?;
    logging::init(settings.verbose);
    if let Some(path) = config.path().filter(|p| p.exists()) {
        debug!(path = %path.display(), "loaded config file");
    }

    let session = Session::start(settings).await?;
    session.run().await
}
