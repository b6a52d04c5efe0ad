//! # Tally Node
//!
//! Entry point of the `tally` binary: configuration scaffolding, key
//! generation and an in-process dBFT devnet.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tally_config::Config;
use tally_crypto::PrivateKey;
use tally_node::{Devnet, RunOutcome, DEFAULT_CONFIG_FILE, VERSION};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tally bookkeeper node and tools
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version)]
#[command(about = "Tally bookkeeper node - dBFT consensus over an ordered bookkeeper set")]
struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: text, json, or compact (defaults to the config's [logging] format)
    #[arg(long)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
    Compact,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Write a default configuration with freshly generated bookkeeper keys
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Number of genesis bookkeepers
        #[arg(long, default_value = "4")]
        bookkeepers: usize,
    },

    /// Print fresh secp256k1 key pairs
    Keygen {
        /// Number of key pairs
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Run an in-process network of bookkeepers
    Devnet {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Number of bookkeepers
        #[arg(long, default_value = "4")]
        nodes: usize,

        /// Stop once every ledger reaches this height
        #[arg(long, default_value = "10")]
        blocks: u32,

        /// Submit a load transaction every this many milliseconds (0 disables)
        #[arg(long, default_value = "1000")]
        tx_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            output,
            bookkeepers,
        } => {
            init_tracing(cli.verbose, cli.log_format, None)?;
            handle_init(&output, bookkeepers)
        }
        Commands::Keygen { count } => handle_keygen(count),
        Commands::Devnet {
            config,
            nodes,
            blocks,
            tx_interval_ms,
        } => {
            let config = Config::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            init_tracing(cli.verbose, cli.log_format, Some(&config))?;
            info!(version = VERSION, "Starting Tally devnet");
            handle_devnet(&config, nodes, blocks, tx_interval_ms).await
        }
    }
}

/// Initialize tracing from `-v` flags, falling back to the config's `[logging]` level.
fn init_tracing(verbose: u8, format: Option<LogFormat>, config: Option<&Config>) -> Result<()> {
    let filter = match verbose {
        0 => config
            .map(|c| c.logging.level.to_lowercase())
            .unwrap_or_else(|| "info".to_string()),
        1 => "info,tally=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let format = format.unwrap_or_else(|| {
        match config.map(|c| c.logging.format.to_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Text,
        }
    });

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(env_filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(env_filter)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(fmt::layer().compact())
                .with(env_filter)
                .init();
        }
    }

    Ok(())
}

/// Handle the `init` command
fn handle_init(output: &Path, bookkeepers: usize) -> Result<()> {
    anyhow::ensure!(bookkeepers > 0, "at least one bookkeeper is required");
    std::fs::create_dir_all(output)
        .with_context(|| format!("creating {}", output.display()))?;

    let keys: Vec<PrivateKey> = (0..bookkeepers).map(|_| PrivateKey::random()).collect();
    for (i, key) in keys.iter().enumerate() {
        let path = output.join(format!("bookkeeper_{}.key", i));
        std::fs::write(&path, key.to_hex())
            .with_context(|| format!("writing {}", path.display()))?;
        info!(key = %path.display(), index = i, "Generated bookkeeper key");
    }

    let mut config = Config::default();
    config.genesis.timestamp = unix_now();
    let public: Vec<_> = keys.iter().map(PrivateKey::public_key).collect();
    config.genesis.set_bookkeepers(&public);
    config.validate()?;

    let config_path = output.join(DEFAULT_CONFIG_FILE);
    config.save(&config_path)?;
    info!(path = %config_path.display(), "Wrote configuration");

    println!("Chain initialized successfully!");
    println!("  Output directory: {}", output.display());
    println!("  Chain ID: {}", config.chain.chain_id);
    println!("  Bookkeepers: {}", bookkeepers);
    Ok(())
}

/// Handle the `keygen` command
fn handle_keygen(count: usize) -> Result<()> {
    for _ in 0..count {
        let key = PrivateKey::random();
        println!("private: {}", key.to_hex());
        println!("public:  {}", key.public_key().to_hex());
        println!();
    }
    Ok(())
}

/// Handle the `devnet` command
async fn handle_devnet(
    config: &Config,
    nodes: usize,
    blocks: u32,
    tx_interval_ms: u64,
) -> Result<()> {
    let mut devnet = Devnet::build(config, nodes)?;
    if tx_interval_ms > 0 {
        devnet.spawn_load(Duration::from_millis(tx_interval_ms));
    }
    devnet.start().await?;

    let outcome = devnet.run_until(blocks, Duration::from_millis(250)).await?;
    let heights = devnet.heights();
    devnet.shutdown().await?;

    match outcome {
        RunOutcome::Reached => println!("Reached height {} on all bookkeepers", blocks),
        RunOutcome::Interrupted => println!("Interrupted at heights {:?}", heights),
    }
    Ok(())
}

fn unix_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}
