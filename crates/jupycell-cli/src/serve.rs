//! Serve command implementation for jupycell CLI.

use std::path::PathBuf;
use std::time::Duration;

use jupycell_core::{BridgeConfig, KernelCommand};
use jupycell_server::ServerConfig;

/// Options of the `serve` command.
pub struct ServeArgs {
    pub host: String,
    pub port: u16,
    pub python: Option<PathBuf>,
    pub drain_timeout: f64,
    pub collect_timeout: f64,
}

/// Start the HTTP server.
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let kernel = match args.python {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Python interpreter not found: {}", path.display());
            }
            Some(KernelCommand::python(path))
        }
        // Resolve now so a missing interpreter is reported before serving
        None => Some(KernelCommand::discover()?),
    };

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        bridge: BridgeConfig {
            drain_timeout: seconds(args.drain_timeout, "--drain-timeout")?,
            collect_timeout: seconds(args.collect_timeout, "--collect-timeout")?,
        },
        kernel,
    };

    println!("jupycell server - http://{}:{}", config.host, config.port);
    if let Some(kernel) = &config.kernel {
        println!("  kernel: {}", kernel.program.display());
    }
    println!("Press Ctrl+C to stop");

    jupycell_server::serve(config).await?;

    Ok(())
}

fn seconds(value: f64, flag: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow::anyhow!("{} must be a non-negative number of seconds", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(1.5, "--x").unwrap(), Duration::from_millis(1500));
        assert!(seconds(-1.0, "--x").is_err());
        assert!(seconds(f64::NAN, "--x").is_err());
    }
}
