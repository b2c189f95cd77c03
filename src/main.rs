// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "hlgcam")]
#[command(about = "Compress a captured frame into an HDR video container")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image file into a one-frame video
    ///
    /// For HLG and PQ output the input is converted from its own transfer
    /// function and primaries (sRGB for 8-bit files) into BT.2020. SDR
    /// inputs keep their brightness range.
    Compress(cli::CompressArgs),

    /// Show the effective configuration
    Config {
        /// Write it to the configuration file, filling in missing fields
        #[arg(long)]
        write: bool,
    },

    /// List detected video encoders
    Encoders,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=hlgcam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compress(args) => cli::compress(args),
        Commands::Config { write } => cli::config(write),
        Commands::Encoders => cli::list_encoders(),
    }
}
