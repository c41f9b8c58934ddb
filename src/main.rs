//! Unified taosocks CLI.
//!
//! - `taosocks client` - Run the local SOCKS4/SOCKS5/HTTP proxy client

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// taosocks unified CLI.
#[derive(Parser)]
#[command(
    name = "taosocks",
    version,
    about = "Rule-driven SOCKS/HTTP proxy that tunnels blocked hosts over TLS",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the local proxy client.
    #[command(name = "client", alias = "local")]
    Client(Box<taosocks_client::ClientArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Client(args) => taosocks_client::cli::run(*args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
