//! Switchboard CLI

mod host;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use switchboard_config::{load_config, validate_config, HostConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Switchboard module host", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the host (load modules and run until interrupted)
    Serve {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
        config: Option<PathBuf>,

        /// Override the modules directory
        #[arg(short, long)]
        modules_dir: Option<PathBuf>,

        /// Override the log level (trace, debug, info, warn, error)
        #[arg(short, long)]
        log_level: Option<String>,

        /// Watch the modules directory and hot-reload changed modules
        #[arg(long)]
        hot_reload: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "switchboard.yaml")]
        config: PathBuf,
    },

    /// List modules in the modules directory, or on running hosts
    Modules {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
        config: Option<PathBuf>,

        /// Override the modules directory
        #[arg(short, long)]
        modules_dir: Option<PathBuf>,

        /// Ask running hosts over the relay instead of reading the directory
        #[arg(long)]
        remote: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            modules_dir,
            log_level,
            hot_reload,
        } => {
            let mut config = load(config.as_deref())?;
            if let Some(dir) = modules_dir {
                config.modules.directory = dir;
            }
            if let Some(level) = log_level {
                config.logging.level = level;
            }
            config.hot_reload.enabled |= hot_reload;
            validate_config(&config)?;

            init_tracing(&config.logging.level, config.logging.is_json());

            tracing::info!(
                modules_dir = %config.modules.directory.display(),
                hot_reload = config.hot_reload.enabled,
                relay = config.event_bus.active_relay().is_some(),
                "Starting Switchboard host"
            );

            host::serve(config).await
        }

        Commands::Validate { config } => {
            init_tracing("info", false);

            tracing::info!("Validating configuration: {}", config.display());

            match load_config(&config) {
                Ok(cfg) => {
                    tracing::info!("✓ Configuration is valid");
                    tracing::info!("  Modules: {}", cfg.modules.directory.display());
                    tracing::info!("  Entry point: {}", cfg.modules.entry_point);
                    tracing::info!(
                        "  Relay: {}",
                        if cfg.event_bus.active_relay().is_some() {
                            "enabled"
                        } else {
                            "local-only"
                        }
                    );
                    tracing::info!("  Hot reload: {}", cfg.hot_reload.enabled);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Modules {
            config,
            modules_dir,
            remote,
        } => {
            let mut config = load(config.as_deref())?;
            if let Some(dir) = modules_dir {
                config.modules.directory = dir;
            }
            init_tracing("warn", false);

            if remote {
                let listing = host::remote_listing(&config.event_bus).await?;
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }

            let summaries = host::inspect_modules(&config.modules).await?;
            if summaries.is_empty() {
                println!("No modules in {}", config.modules.directory.display());
            }
            for summary in summaries {
                let factory = summary.factory.as_deref().unwrap_or("-");
                let status = summary.problem.as_deref().unwrap_or("ok");
                println!("{:<24} {:<16} {}", summary.name, factory, status);
                if !summary.dependencies.is_empty() {
                    println!("{:<24} depends on {}", "", summary.dependencies.join(", "));
                }
                tracing::debug!(module = %summary.name, path = %summary.path.display(), "Inspected");
            }
            Ok(())
        }

        Commands::Version => {
            println!("Switchboard module host");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn load(path: Option<&Path>) -> Result<HostConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(HostConfig::default()),
    }
}

fn init_tracing(level: &str, json: bool) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_level(true))
            .init();
    }
}
