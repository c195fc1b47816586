//! # CLI Interface
//!
//! Command-line structure for `ecash-mint`, via `clap` derive. Four
//! subcommands: `init`, `run`, `status` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ecash_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_MINT_PORT};

/// Reference e-cash mint.
///
/// Signs blinded messages, redeems proofs against a persistent spent-set,
/// and serves the mint API over HTTP with Prometheus metrics on a
/// separate port.
#[derive(Parser, Debug)]
#[command(
    name = "ecash-mint",
    about = "Reference blind-signature e-cash mint",
    version,
    propagate_version = true
)]
pub struct MintCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a fresh mint key seed.
    Init(InitArgs),
    /// Start the mint.
    Run(RunArgs),
    /// Query a running mint's `/info` endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory holding the seed file and the spent-set database.
    #[arg(long, short = 'd', env = "ECASH_DATA_DIR", default_value = ".ecash-mint")]
    pub data_dir: PathBuf,

    /// Port for the mint API.
    #[arg(long, short = 'p', env = "ECASH_PORT", default_value_t = DEFAULT_MINT_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ECASH_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Hex-encoded 32-byte key seed. Overrides the seed file in the data
    /// directory. Prefer the file outside of development.
    #[arg(long, env = "ECASH_MINT_KEY", hide_env_values = true)]
    pub mint_key: Option<String>,

    /// Display name reported by `/info`.
    #[arg(long, env = "ECASH_MINT_NAME", default_value = "ecash-mint")]
    pub name: String,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "ECASH_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to initialize.
    #[arg(long, short = 'd', env = "ECASH_DATA_DIR", default_value = ".ecash-mint")]
    pub data_dir: PathBuf,

    /// Replace an existing seed file. Every token issued under the old seed
    /// becomes unredeemable.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running mint.
    #[arg(long, default_value = "http://127.0.0.1:3338")]
    pub url: String,
}
