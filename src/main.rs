#![warn(clippy::pedantic)]

use anyhow::Result;
use clap::Parser;

mod changes;
mod cli;
mod constants;
mod event;
#[cfg(test)]
mod fixtures;
mod gitlab;
mod handler;
mod server;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_tracing(cli.log_level);

    match cli.command {
        cli::Commands::Serve(args) => {
            server::serve(args).await?;
        }
        cli::Commands::Replay(args) => {
            if let Some(review) = server::replay(args).await? {
                println!("{review}");
            } else {
                tracing::info!("Nothing to review");
            }
        }
    }
    Ok(())
}
