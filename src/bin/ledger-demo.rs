#![forbid(unsafe_code)]
//! Scripted walk through the ledger: genesis, one signed transfer, one mined
//! block, final balances.

use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utxo_ledger::config::load_config;
use utxo_ledger::crypto::KeyPair;
use utxo_ledger::miner::CancelToken;
use utxo_ledger::node::Node;
use utxo_ledger::transaction::{Amount, InputRef, Output, Transaction};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the proof-of-work difficulty
    #[arg(long)]
    difficulty: Option<u32>,
    /// Amount sent from the genesis owner to a fresh address
    #[arg(long, default_value_t = 100.0)]
    amount: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(difficulty) = cli.difficulty {
        config.ledger.difficulty = difficulty;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let started = Instant::now();
    let node = Node::from_config(&config)?;
    let genesis = node.tip();
    let owner = config.genesis.address.clone();
    info!(hash = %genesis.hash, "genesis ready in {:.2?}", started.elapsed());

    let signer = KeyPair::generate();
    let recipient = KeyPair::generate().address();
    let send = Amount::new(cli.amount);
    if !(send.is_finite() && send > Amount::ZERO) {
        return Err(format!("amount must be a positive number, got {}", cli.amount).into());
    }

    let coinbase = genesis
        .transactions
        .first()
        .ok_or("genesis block has no transactions")?;
    let available = node.balance_of(&owner)?;
    let inputs = vec![InputRef::new(coinbase.id.clone(), 0)];
    if send > available {
        return Err(format!("cannot send {} out of {}", send, available).into());
    }

    let mut outputs = vec![Output::new(recipient.clone(), send)];
    if available > send {
        let change = available
            .checked_sub(send)
            .ok_or("change amount is out of range")?;
        outputs.push(Output::new(owner.clone(), change));
    }

    let mut transfer = Transaction::new(inputs, outputs, chrono::Utc::now().timestamp())?;
    let signature = signer.sign(&transfer.signable_message()?)?;
    transfer.sign(signature.to_vec(), signer.public_key_bytes().to_vec());

    let tx_id = node.submit_transaction(transfer)?;
    println!("submitted  {}", tx_id);

    let started = Instant::now();
    let block = node.mine_pending(&CancelToken::new())?;
    println!(
        "mined      block {} ({}) nonce {} in {:.2?}",
        block.index,
        block.hash,
        block.nonce,
        started.elapsed()
    );

    println!("height     {}", node.height());
    println!("{:<10} {}", "genesis", node.balance_of(&owner)?);
    println!("{:<10} {}", "recipient", node.balance_of(&recipient)?);

    Ok(())
}
