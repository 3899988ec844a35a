//! scancache - drive the card scanner's offline proxy from a terminal.
//!
//! Runs the proxy's lifecycle events against a disk-backed cache and the
//! real network: precache a version, rotate generations, route single
//! requests, and inspect what is stored.
//!
//! There is no `sync` command: a one-shot process has no application
//! instances connected, so the broadcast would never reach anyone.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scancache_core::{
    CacheStorage, ChannelClients, DiskStorage, FetchDecision, HttpNetwork, Method, Network,
    OfflineWorker, ProxyConfig, Request, RequestMode, Response,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "scancache", version, about = "Offline caching proxy for the card scanner app")]
struct Cli {
    /// Config file (defaults to ~/.config/scancache/config.json)
    #[arg(long, global = true, env = "SCANCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Precache the asset manifest and remote libraries for this version
    Install,
    /// Delete caches of other versions
    Activate,
    /// Route one request through the proxy
    Fetch {
        /// Absolute URL, or a path on the configured origin
        url: String,
        /// Treat as a top-level page navigation
        #[arg(long)]
        navigate: bool,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Write the body here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List cache stores and their entries
    Stores,
    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Print the config file path
    Path,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // RUST_LOG wins over the verbosity flag
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<(ProxyConfig, PathBuf)> {
    let (config, path) = match path {
        Some(p) => (ProxyConfig::load_from(p)?, p.clone()),
        None => (ProxyConfig::load()?, ProxyConfig::config_path()?),
    };
    Ok((config.with_env_overrides(), path))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, config_path) = load_config(cli.config.as_ref())?;

    let cache_dir = config.cache_dir()?;
    info!(cache_dir = %cache_dir.display(), cache = %config.cache_name(), "scancache starting");

    let storage: Arc<dyn CacheStorage> = Arc::new(DiskStorage::new(cache_dir));
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new()?);
    // No app instances live in this process; activate claims none
    let clients = Arc::new(ChannelClients::new());
    let worker = OfflineWorker::new(config, storage.clone(), network.clone(), clients);

    match cli.command {
        Command::Install => {
            let report = worker.install().await;
            println!("Installed {}", report.cache_name);
            println!(
                "  static assets: {}",
                if report.assets_cached { "cached" } else { "FAILED" }
            );
            for url in &report.remote_cached {
                println!("  cached  {}", url);
            }
            for url in &report.remote_failed {
                println!("  failed  {}", url);
            }
        }
        Command::Activate => {
            let report = worker.activate().await;
            if report.deleted.is_empty() {
                println!("No stale caches");
            }
            for name in &report.deleted {
                println!("Deleted {}", name);
            }
            for name in &report.failed {
                println!("Could not delete {} (will retry next activation)", name);
            }
        }
        Command::Fetch {
            url,
            navigate,
            method,
            output,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid method: {}", method))?;
            let mut request = Request::new(method, worker.config().resolve(&url)?);
            if navigate {
                request = request.with_mode(RequestMode::Navigate);
            }

            let response = match worker.fetch(&request).await {
                FetchDecision::Respond(response) => response,
                FetchDecision::Passthrough => {
                    eprintln!("(not intercepted, sent to network)");
                    network.fetch(&request).await?
                }
            };
            write_response(response, output)?;
        }
        Command::Stores => {
            let current = worker.config().cache_name();
            let names = storage.keys().await?;
            if names.is_empty() {
                println!("No cache stores");
            }
            for name in names {
                let marker = if name == current { " (current)" } else { "" };
                println!("{}{}", name, marker);
                for entry in storage.entries(&name).await? {
                    println!(
                        "  {:>3} {:>9}  {:<10} {}",
                        entry.data.status,
                        entry.data.size,
                        entry.age_display(),
                        entry.data.key
                    );
                }
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(worker.config())?),
            ConfigAction::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}

fn write_response(response: Response, output: Option<PathBuf>) -> Result<()> {
    eprintln!("{} {}", response.status(), response.status_text());
    let body = response.into_body();
    match output {
        Some(path) => std::fs::write(&path, &body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => io::stdout().write_all(&body)?,
    }
    Ok(())
}
