//! clarke - command line front end for a Clarke node.
//!
//! Builds one `NodeClient` and one `Wallet` at startup and hands them to the
//! command being run.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clarke_client::config::{default_wallet_path, NodeConfig};
use clarke_client::models::{block_intervals, Block};
use clarke_client::node::NodeClient;
use clarke_client::payments::Payments;
use clarke_client::wallet::Wallet;

const USAGE: &str = "\
Usage: clarke <command> [args]

Commands:
  blocks                      List blocks, newest first, with seconds between them
  block <hash>                Show one block
  tx <hash>                   Show one transaction
  balance [address|@file]     Balance of an address (default: this wallet)
  address                     Print this wallet's address
  echo <json>                 Send a payload to the node and print the reply
  pay <address|@file> <amount>
                              Pay via make_payment (the node signs)
  sign-payment <address|@file> <amount>
                              Fetch an unsigned transaction and sign it locally

Environment:
  CLARKE_NODE_HOST, CLARKE_NODE_PORT, CLARKE_CONNECT_TIMEOUT_SECS,
  CLARKE_READ_TIMEOUT_SECS, CLARKE_WALLET_PATH, RUST_LOG";

/// Everything a command needs, built once in `main`.
struct Services {
    client: NodeClient,
    wallet: Wallet,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "clarke=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    if command == "-h" || command == "--help" || command == "help" {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = NodeConfig::from_env();
    tracing::info!("Using node at {}", config.address());

    let wallet_path = default_wallet_path();
    let ctx = Services {
        client: NodeClient::new(config),
        wallet: Wallet::load_or_generate(&wallet_path)
            .with_context(|| format!("Failed to open wallet at {}", wallet_path.display()))?,
    };

    run(&ctx, command, &args[1..]).await
}

async fn run(ctx: &Services, command: &str, args: &[String]) -> Result<()> {
    match command {
        "blocks" => {
            let payload = ctx.client.get_blocks().await?;
            let blocks = Block::list_newest_first(payload)?;
            let intervals = block_intervals(&blocks);

            for (i, block) in blocks.iter().enumerate() {
                let time = block
                    .header
                    .time()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| block.header.timestamp.to_string());
                let gap = intervals
                    .get(i)
                    .map(|s| format!("+{}s", s))
                    .unwrap_or_default();
                println!(
                    "{}  {}  {} txns  {}",
                    block.hash.as_deref().unwrap_or("-"),
                    time,
                    block.transactions.len(),
                    gap
                );
            }
        }
        "block" => print_json(&ctx.client.get_block(arg(args, 0, "hash")?).await?)?,
        "tx" => print_json(&ctx.client.get_transaction(arg(args, 0, "hash")?).await?)?,
        "balance" => {
            let address = match args.first() {
                Some(a) => read_address(a)?,
                None => ctx.wallet.address().to_string(),
            };
            print_json(&ctx.client.get_balance(&address).await?)?;
        }
        "address" => print!("{}", ctx.wallet.address()),
        "echo" => {
            let raw = arg(args, 0, "json")?;
            let payload: Value = serde_json::from_str(raw).context("echo payload is not JSON")?;
            print_json(&ctx.client.echo(payload).await?)?;
        }
        "pay" => {
            let (receiver, amount) = payment_args(args)?;
            let payments = Payments::new(&ctx.client, &ctx.wallet);
            print_json(&payments.pay_with_key(&receiver, amount).await?)?;
        }
        "sign-payment" => {
            let (receiver, amount) = payment_args(args)?;
            let payments = Payments::new(&ctx.client, &ctx.wallet);
            let signed = payments.prepare(&receiver, amount).await?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }

    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing <{}>\n\n{}", name, USAGE))
}

/// Addresses are multi-line PEM blocks; `@path` reads one from a file.
fn read_address(raw: &str) -> Result<String> {
    match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read address from {}", path)),
        None => Ok(raw.to_string()),
    }
}

fn payment_args(args: &[String]) -> Result<(String, i64)> {
    let receiver = read_address(arg(args, 0, "address")?)?;
    let amount_raw = arg(args, 1, "amount")?;
    let amount = amount_raw
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Amount '{}' is not an integer", amount_raw))?;
    Ok((receiver, amount))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
