// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # E-Cash Reference Mint
//!
//! Entry point for the `ecash-mint` binary. Parses CLI arguments, sets up
//! logging and metrics, opens the mint, and serves the mint API.
//!
//! Subcommands:
//!
//! - `init`    create the data directory and a key seed
//! - `run`     start the mint
//! - `status`  query a running mint's `/info`
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

use ecash_protocol::crypto::keys::SEED_LENGTH;
use ecash_protocol::crypto::MintKeyset;
use ecash_protocol::mint::wire::MintInfo;
use ecash_protocol::mint::Mint;

use cli::{Commands, MintCli};
use logging::LogFormat;
use metrics::MintMetrics;

/// Seed file inside the data directory.
const SEED_FILE: &str = "mint.key";

/// Spent-set database directory inside the data directory.
const DB_DIR: &str = "db";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MintCli::parse();

    match cli.command {
        Commands::Init(args) => init_mint(args),
        Commands::Run(args) => run_mint(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the mint: API server plus metrics endpoint.
async fn run_mint(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let seed = match &args.mint_key {
        Some(hex_seed) => parse_seed(hex_seed).context("invalid ECASH_MINT_KEY")?,
        None => read_seed(&args.data_dir.join(SEED_FILE))?,
    };

    let db_path = args.data_dir.join(DB_DIR);
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let mint = Arc::new(
        Mint::open(&db_path, &seed)
            .with_context(|| format!("failed to open mint database at {}", db_path.display()))?
            .with_name(args.name.clone()),
    );

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        keyset = %mint.keys().id,
        spent = mint.spent_count(),
        "starting ecash-mint"
    );

    let node_metrics = Arc::new(MintMetrics::new().context("failed to create metrics registry")?);
    let app_state = api::AppState {
        mint: Arc::clone(&mint),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("mint API listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    mint.flush().context("failed to flush mint database")?;
    tracing::info!("ecash-mint stopped");
    Ok(())
}

/// Creates the data directory and a fresh seed file.
fn init_mint(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("ecash_mint=info", LogFormat::Pretty);

    let (key_path, keyset) = write_seed(&args.data_dir, args.force)?;
    tracing::info!(
        keyset = %keyset.id(),
        key_path = %key_path.display(),
        "mint seed generated"
    );

    println!("Mint initialized.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Seed file      : {}", key_path.display());
    println!("  Keyset id      : {}", keyset.id());

    Ok(())
}

/// Writes a new hex seed to `data_dir/mint.key`, created with mode 0600.
fn write_seed(data_dir: &Path, force: bool) -> Result<(PathBuf, MintKeyset)> {
    let key_path = data_dir.join(SEED_FILE);
    if key_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to replace it",
            key_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    if force {
        match std::fs::remove_file(&key_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to remove {}", key_path.display()))
            }
        }
    }

    let keyset = MintKeyset::generate();
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&key_path)
        .with_context(|| format!("failed to create {}", key_path.display()))?;
    file.write_all(keyset.seed_hex().as_bytes())
        .with_context(|| format!("failed to write seed to {}", key_path.display()))?;

    Ok((key_path, keyset))
}

/// Fetches `/info` from a running mint and prints it.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/info", args.url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {}", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?;
    let info: MintInfo = response
        .json()
        .await
        .context("unexpected /info response body")?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn read_seed(path: &Path) -> Result<[u8; SEED_LENGTH]> {
    let contents = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read seed from {} (run `ecash-mint init` first)",
            path.display()
        )
    })?;
    parse_seed(&contents).with_context(|| format!("invalid seed in {}", path.display()))
}

fn parse_seed(hex_seed: &str) -> Result<[u8; SEED_LENGTH]> {
    let bytes = hex::decode(hex_seed.trim()).context("seed is not hex")?;
    let seed: [u8; SEED_LENGTH] = bytes
        .as_slice()
        .try_into()
        .with_context(|| format!("seed must be {} bytes, got {}", SEED_LENGTH, bytes.len()))?;
    Ok(seed)
}

fn print_version() {
    println!("ecash-mint {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", ecash_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seed_accepts_trimmed_hex() {
        let hex_seed = format!("{}\n", "ab".repeat(SEED_LENGTH));
        assert_eq!(parse_seed(&hex_seed).unwrap(), [0xab; SEED_LENGTH]);
    }

    #[test]
    fn parse_seed_rejects_wrong_length() {
        assert!(parse_seed("abcd").is_err());
        assert!(parse_seed("not hex").is_err());
    }

    #[test]
    fn write_seed_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("mint");

        let (key_path, keyset) = write_seed(&data_dir, false).unwrap();
        let seed = read_seed(&key_path).unwrap();
        let mint = Mint::temporary(&seed).unwrap();
        assert_eq!(mint.keys().id, keyset.id());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn write_seed_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let (_, first) = write_seed(dir.path(), false).unwrap();
        assert!(write_seed(dir.path(), false).is_err());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let loose = std::fs::Permissions::from_mode(0o644);
            std::fs::set_permissions(dir.path().join(SEED_FILE), loose).unwrap();
        }

        let (key_path, second) = write_seed(dir.path(), true).unwrap();
        assert_ne!(first.id(), second.id());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        assert_eq!(
            read_seed(&key_path).unwrap(),
            parse_seed(&second.seed_hex()).unwrap()
        );
    }
}
