//! sockfwd: transparent byte-level socket forwarder
//!
//! Entry point: parses the CLI, loads configuration, initializes logging,
//! then runs the forwarder until SIGINT or SIGTERM.
//!
//! Shutdown is a hard stop. The listener is closed and the runtime is torn
//! down without waiting for relays that are still in flight.

use anyhow::{Context, Result};
use clap::Parser;
use sockfwd::{cli::Cli, config::ConfigLoader, shutdown::ShutdownController};
use tracing::debug;

fn main() -> Result<()> {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    debug!("Parsed CLI arguments: {:?}", cli);

    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;

    debug!("Loaded configuration: {:?}", config);

    // Resolves the endpoint kind from the source address, once.
    let forwarder = config.forwarder().context("Invalid configuration")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let result = rt.block_on(async {
        let controller =
            ShutdownController::install().context("Failed to install signal handlers")?;
        let shutdown_rx = controller.subscribe();
        tokio::spawn(controller.wait());

        forwarder.run(shutdown_rx).await.context("Forwarder failed")
    });

    // Abandon in-flight relays.
    rt.shutdown_background();
    result
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG` if set, otherwise info
/// - 1 (-v): Debug level
/// - 2+ (-vv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
