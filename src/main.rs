// src/main.rs

//! The main entry point for the sessiond server application.

use anyhow::Result;
use sessiond::cli::{USAGE, parse_args};
use sessiond::config::{Config, DispatchStrategy};
use sessiond::server;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("SESSIOND_BUILD_VERSION");

    let args: Vec<String> = env::args().skip(1).collect();

    // Handle the --version flag.
    if args.iter().any(|arg| arg == "--version") {
        println!("sessiond version {VERSION}");
        return Ok(());
    }

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    let mut config = match Config::load(cli.config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };
    config.port = cli.port;
    if let Some(dispatch) = cli.dispatch {
        config.dispatch = dispatch;
    }

    // Get initial log level from env var or config.
    let initial_log_level =
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(initial_log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    // Validated once, after the command line has been applied.
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e:#}");
        std::process::exit(1);
    }

    // The poll dispatcher is a single control thread; workers get the multi-threaded runtime.
    let runtime = match config.dispatch {
        DispatchStrategy::Poll => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?,
        DispatchStrategy::Worker => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?,
    };

    info!("Starting sessiond {VERSION}...");
    if let Err(e) = runtime.block_on(server::run(config)) {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
