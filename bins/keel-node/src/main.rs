//! Keel node binary.
//!
//! Opens (or creates) the chain under the data directory, replays it, and
//! runs one maintenance command against it.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keel_core::types::Hash256;
use keel_node_lib::{Blockchain, NodeConfig, RocksStore};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "keel-node", version, about = "Keel ledger node")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the chain if needed and print its tip
    Init,
    /// Print tip, chain id and unspent output count
    Status,
    /// Print the balance of an address (hex pubkey hash)
    Balance { address: String },
    /// Mint and commit a block paying the block reward to an address
    Mint {
        /// Beneficiary address (hex pubkey hash)
        #[arg(long)]
        to: String,
        /// Memo embedded in the coinbase
        #[arg(long, default_value = "")]
        memo: String,
    },
    /// Write blocks START..=END to the archive file
    Archive {
        start: u32,
        end: u32,
        /// Archive file (defaults to <data-dir>/blocks.dat)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Read one block back from the archive file
    ReadArchived {
        height: u32,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Check height and hash linkage of every stored block
    Verify,
}

impl Cli {
    /// Load the configuration file and apply command-line overrides.
    fn load_config(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    };

    init_logging(&config.log_level, &config.log_format);
    info!("Keel node v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command, &config) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run(command: Command, config: &NodeConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    info!(data_dir = %config.data_dir.display(), chain_id = config.chain_id, "opening chain");

    let store = RocksStore::open(config.db_path()).context("opening block store")?;
    let owner = config.genesis_owner().context("parsing genesis_address")?;
    let chain = Blockchain::create_or_open(store, config.chain_id, owner, config.total_supply)
        .context("replaying chain")?;

    match command {
        Command::Init | Command::Status => {
            println!("chain_id: {}", chain.chain_id());
            println!("height:   {}", chain.tip_height());
            println!("tip:      {}", chain.tip_hash());
            println!("utxos:    {}", chain.utxo_count());
        }
        Command::Balance { address } => {
            let address = parse_address(&address)?;
            println!("{}", chain.balance_of(&address));
        }
        Command::Mint { to, memo } => {
            let beneficiary = parse_address(&to)?;
            let block = chain.mint(Vec::new(), beneficiary, config.block_reward, memo.as_bytes())?;
            let hash = chain.commit_validated(&block)?;
            println!("{} {}", block.height(), hash);
        }
        Command::Archive { start, end, out } => {
            let path = out.unwrap_or_else(|| config.archive_path());
            let index = chain.store_blocks(&path, start, end)?;
            println!(
                "archived {}..={} ({} bytes) to {}",
                index.start,
                index.end,
                index.offsets.last().copied().unwrap_or(0),
                path.display()
            );
        }
        Command::ReadArchived { height, file } => {
            let path = file.unwrap_or_else(|| config.archive_path());
            let block = chain.read_archived_block(&path, height)?;
            println!("height: {}", block.height());
            println!("hash:   {}", block.hash());
            println!("prev:   {}", block.header.prev_hash);
            println!("txs:    {}", block.transactions.len());
        }
        Command::Verify => {
            let count = chain.verify_chain()?;
            println!("verified {count} blocks");
        }
    }

    chain.close()?;
    Ok(())
}

fn parse_address(s: &str) -> Result<Hash256> {
    Hash256::from_hex(s).with_context(|| format!("invalid address {s:?}"))
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `format = "json"` selects structured JSON output; anything else is text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["keel-node", "--data-dir", "/tmp/k", "archive", "1", "5"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/k")));
        assert!(matches!(cli.command, Command::Archive { start: 1, end: 5, out: None }));
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from(["keel-node", "status", "--log-level", "debug"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn address_must_be_32_byte_hex() {
        assert!(parse_address(&"00".repeat(32)).is_ok());
        assert!(parse_address("abcd").is_err());
    }
}
