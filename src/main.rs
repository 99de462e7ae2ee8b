//! Tracesmith CLI entry point.

use clap::Parser;

use tracesmith::cli::commands::{blob, init, trace, worker};
use tracesmith::cli::context::load_config;
use tracesmith::cli::{handle_error, AppContext, Cli, Commands};
use tracesmith::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    match cli.command {
        Commands::Init(args) => init::execute(args, cli.json).await,
        Commands::Trace(args) => trace::execute(args, &AppContext::open(config).await?, cli.json).await,
        Commands::Blob(args) => blob::execute(args, &AppContext::open(config).await?, cli.json).await,
        Commands::Worker(args) => worker::execute(args, &AppContext::open(config).await?, cli.json).await,
    }
}
