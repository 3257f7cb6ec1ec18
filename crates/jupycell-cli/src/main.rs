//! jupycell CLI - notebook-style code execution over HTTP.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jupycell")]
#[command(about = "Notebook-style code execution server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Python interpreter for kernels (default: $JUPYCELL_PYTHON, then python3 on PATH)
        #[arg(long)]
        python: Option<PathBuf>,

        /// Seconds to wait for leftover kernel messages before each execution
        #[arg(long, default_value = "1")]
        drain_timeout: f64,

        /// Seconds to wait for each message while collecting outputs
        #[arg(long, default_value = "30")]
        collect_timeout: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            python,
            drain_timeout,
            collect_timeout,
        } => {
            serve::execute(serve::ServeArgs {
                host,
                port,
                python,
                drain_timeout,
                collect_timeout,
            })
            .await?;
        }
    }

    Ok(())
}
