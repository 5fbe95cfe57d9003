#![forbid(unsafe_code)]
//! Offline inspection of a ledger snapshot file

use clap::{Parser, Subcommand};
use colored::*;
use coinledger::blockchain::{audit_proofs, validate_chain, Block, BlockStatus};
use coinledger::crypto::Token;
use coinledger::snapshot::Snapshot;
use coinledger::transaction::Payload;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Checks hash linkage of every block
    Validate {
        /// Snapshot file to read
        snapshot: PathBuf,
    },
    /// Prints chain length, wallet count and per-kind transaction totals
    Summary { snapshot: PathBuf },
    /// Prints the balance and NFTs held by a wallet
    Balance {
        snapshot: PathBuf,
        /// Public token of the wallet
        #[arg(long)]
        public: String,
    },
    /// Re-checks every proof-of-work at the given difficulty
    Audit {
        snapshot: PathBuf,
        #[arg(long, default_value_t = 4)]
        difficulty: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Validate { snapshot } => validate(snapshot),
        Commands::Summary { snapshot } => summary(snapshot),
        Commands::Balance { snapshot, public } => balance(snapshot, public),
        Commands::Audit {
            snapshot,
            difficulty,
        } => audit(snapshot, *difficulty),
    }
}

fn load(path: &Path) -> Result<(Vec<Block>, Snapshot), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    let snapshot = Snapshot::from_json(&bytes)?;
    Ok((snapshot.blocks(), snapshot))
}

fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (blocks, _) = load(path)?;
    match validate_chain(&blocks) {
        Ok(()) => {
            println!("{} {} blocks", "✅ Chain is valid:".bright_green().bold(), blocks.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "❌".red(), e.to_string().red());
            Err(e.into())
        }
    }
}

fn summary(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (blocks, snapshot) = load(path)?;

    let mut kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
    for tx in blocks.iter().flat_map(|b| b.transactions.iter()) {
        *kinds.entry(tx.input.kind()).or_default() += 1;
    }
    let pending_blocks = blocks.iter().filter(|b| b.status == BlockStatus::Pending).count();
    let minted: usize = blocks.iter().map(|b| b.nft.len()).sum();

    println!("{}", "Ledger summary".bright_cyan().bold());
    println!("  blocks:          {}", blocks.len());
    println!("  wallets:         {}", snapshot.wallet.len());
    println!("  pending txs:     {}", snapshot.pending.len());
    println!("  unapplied blocks {}", pending_blocks);
    println!("  nfts minted:     {}", minted);
    if let Some(last) = blocks.last() {
        println!("  tip:             {}", last.hash_str().yellow());
    }
    println!("{}", "Transactions by kind".bright_cyan().bold());
    for (kind, count) in &kinds {
        println!("  {:<15}  {}", kind, count);
    }
    Ok(())
}

fn balance(path: &Path, public: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_, snapshot) = load(path)?;
    let public = Token::from(public);
    let record = snapshot
        .wallet
        .iter()
        .find(|r| r.public() == &public)
        .ok_or_else(|| format!("No wallet with public token {}", public))?;

    println!("{} {}", "Balance:".bright_green().bold(), record.balance());
    for nft in record.nfts() {
        println!("  {} {} ({})", "NFT".magenta(), nft.name, nft.id);
    }

    let credits = snapshot
        .coin
        .iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|tx| matches!(&tx.input, Payload::Credit(c) if c.to == public))
        .count();
    println!("  credits received: {}", credits);
    Ok(())
}

fn audit(path: &Path, difficulty: u32) -> Result<(), Box<dyn std::error::Error>> {
    let (blocks, _) = load(path)?;
    validate_chain(&blocks)?;
    audit_proofs(&blocks, difficulty)?;
    println!(
        "{} every proof satisfies difficulty {}",
        "✅".bright_green(),
        difficulty
    );
    Ok(())
}
