use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use grump::cli::{self, Cli, Commands};
use grump::config::Config;
use grump::status;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(&args);

    match args.command {
        Commands::Analyze { message } => cli::handle_analyze(message).await,
        Commands::Time { at } => cli::handle_time(at).await,
        Commands::Eggs { at, message } => cli::handle_eggs(at, message).await,
        Commands::Simulate {
            seconds,
            seed,
            at,
            message,
        } => cli::handle_simulate(args.data_dir, seconds, seed, at, message).await,
        Commands::Chat => cli::handle_chat(args.data_dir).await,
        Commands::Status => status::handle_status(args.data_dir).await,
        Commands::Reset => cli::handle_reset(args.data_dir).await,
    }
}

fn init_logging(args: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let fallback = Config::new(args.data_dir.clone())
            .map(|config| config.log_filter)
            .unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(fallback)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
