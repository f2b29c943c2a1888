mod app;
mod cache;
mod catalog;
mod cli;
mod config;
mod event;
mod logging;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use cli::Command;
use logging::LogTarget;

#[derive(Parser, Debug)]
#[command(name = "ronin")]
#[command(about = "A terminal client for the ronin product catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ronin/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Product collection URL, overriding the config file and RONIN_API_URL
  #[arg(long)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override the store URL if specified on command line
  if let Some(url) = args.api_url {
    config.api.base_url = url;
    config.validate()?;
  }

  match args.command.unwrap_or(Command::Browse) {
    Command::Browse => {
      // The terminal belongs to the UI, so logs go to a file
      let _guard = logging::init(&config.log, LogTarget::File)?;
      let mut app = app::App::new(&config)?;
      app.run().await?;
    }
    command => {
      let _guard = logging::init(&config.log, LogTarget::Stderr)?;
      cli::run(command, &config).await?;
    }
  }

  Ok(())
}
