//! paychan CLI
//!
//! Runs a paychan peer: a receiver that answers data and accepts payments,
//! a one-shot sender, or both in one process.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paychan_core::types::{parse_amount, Account};
use paychan_ledger::{MemoryLedgerFactory, StaticChainClient};
use paychan_plugin::{HandlerError, PaychanPlugin, PluginConfig, TeardownReport};

/// paychan - peer-to-peer data with payment-channel micropayments
#[derive(Parser)]
#[command(name = "paychan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for a peer and accept its data and payments
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Local account (defaults to the provider's first account)
        #[arg(short, long)]
        account: Option<String>,
        /// Ethereum RPC URL
        #[arg(long, env = "PAYCHAN_PROVIDER")]
        provider: Option<String>,
        /// Channel-state file
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Connect to a peer, send data and/or money, then disconnect
    Send {
        /// Peer base URL
        #[arg(short, long)]
        server: String,
        /// Payload to send (hex)
        #[arg(short, long)]
        data: Option<String>,
        /// Amount to pay, in base units
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Run a receiver and a sender against each other in one process
    Demo {
        /// Port for the receiver (0 picks a free one)
        #[arg(short, long, default_value = "0")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "paychan=debug,info"
    } else {
        "paychan=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            port,
            account,
            provider,
            db,
        } => cmd_serve(port, account.as_deref(), provider, db).await,
        Commands::Send { server, data, amount } => {
            cmd_send(&server, data.as_deref(), amount.as_deref()).await
        }
        Commands::Demo { port } => cmd_demo(port).await,
    }
}

fn parse_account(raw: &str) -> Result<Account> {
    raw.parse::<Account>()
        .map_err(|e| anyhow::anyhow!("invalid account '{}': {}", raw, e))
}

/// Data handler answering every payload with the same number of 0xFF bytes.
fn register_ff_handler(plugin: &PaychanPlugin) {
    plugin.register_data_handler(|data: Bytes| async move {
        Ok::<_, HandlerError>(Bytes::from(vec![0xffu8; data.len()]))
    });
}

fn print_report(report: Option<TeardownReport>) {
    let Some(report) = report else {
        return;
    };
    if report.failed() == 0 {
        println!("   {} {} channel(s) closed", "✓".green(), report.closed());
    } else {
        println!(
            "   {} {} of {} channel(s) failed to close",
            "❌".red(),
            report.failed(),
            report.attempted()
        );
        for outcome in &report.outcomes {
            if let Err(e) = &outcome.result {
                println!("      {}", e.to_string().dimmed());
            }
        }
    }
}

/// Run a receiver until Ctrl+C
async fn cmd_serve(
    port: u16,
    account: Option<&str>,
    provider: Option<String>,
    db: Option<PathBuf>,
) -> Result<()> {
    println!("{}", "🚀 Starting paychan receiver...".cyan().bold());

    let mut config = PluginConfig::from_env()?.with_port(port);
    if let Some(account) = account {
        config = config.with_account(parse_account(account)?);
    }
    if let Some(provider) = provider {
        config = config.with_provider(provider);
    }
    if let Some(db) = db {
        config = config.with_db(db);
    }

    let plugin = PaychanPlugin::from_config(config)?;
    register_ff_handler(&plugin);
    plugin.register_money_handler(|amount| async move {
        println!("   {} {}", "💰 Received:".green(), amount);
        Ok::<_, HandlerError>(())
    });

    plugin.connect().await.context("Failed to connect")?;

    if let Some(account) = plugin.account().await {
        println!("   {} {:?}", "Account:".dimmed(), account);
    }
    if let Some(addr) = plugin.local_addr().await {
        println!("   {} http://{}", "Listening on:".green(), addr);
    }
    println!("\n   Press Ctrl+C to stop.\n");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{}", "Shutting down...".yellow());
    print_report(plugin.disconnect().await?);
    Ok(())
}

/// Send data and/or money to a peer
async fn cmd_send(server: &str, data: Option<&str>, amount: Option<&str>) -> Result<()> {
    if data.is_none() && amount.is_none() {
        bail!("nothing to send: pass --data and/or --amount");
    }

    println!("{} {}", "📡 Connecting to:".cyan().bold(), server);

    let config = PluginConfig::from_env()?.with_server(server);
    let plugin = PaychanPlugin::from_config(config)?;
    plugin.connect().await.context("Failed to connect")?;

    if let Some(peer) = plugin.peer_account().await {
        println!("   {} {:?}", "Peer account:".dimmed(), peer);
    }

    let outcome = send_all(&plugin, data, amount).await;
    print_report(plugin.disconnect().await?);
    outcome
}

async fn send_all(plugin: &PaychanPlugin, data: Option<&str>, amount: Option<&str>) -> Result<()> {
    if let Some(data) = data {
        let payload = hex::decode(data.trim_start_matches("0x")).context("Invalid hex data")?;
        let response = plugin.send_data(Bytes::from(payload)).await?;
        println!("   {} {}", "Response:".green(), hex::encode(&response));
    }

    if let Some(amount) = amount {
        let amount = parse_amount(amount)?;
        let receipt = plugin.send_money(amount).await?;
        println!("   {} {}", "✅ Paid:".green(), amount);
        println!("   {} {:?}", "Channel:".dimmed(), receipt.channel_id);
        println!("   {} {}", "Token:".dimmed(), receipt.token);
    }

    Ok(())
}

/// Run the two-peer scenario locally
async fn cmd_demo(port: u16) -> Result<()> {
    println!("{}", "🧪 Running paychan demo...".cyan().bold());

    let local = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let ledgers = Arc::new(MemoryLedgerFactory::new());

    println!("\n{}", "1. Starting receiver...".dimmed());
    let receiver = PaychanPlugin::new(
        PluginConfig::default()
            .with_port(port)
            .with_listen_host(local)
            .with_db(""),
        Arc::new(StaticChainClient::new(vec![Account::repeat_byte(0xbb)])),
        ledgers.clone(),
    );
    register_ff_handler(&receiver);
    receiver.register_money_handler(|amount| async move {
        println!("   ✓ Receiver got {}", amount);
        Ok::<_, HandlerError>(())
    });
    receiver.connect().await?;

    let addr = receiver
        .local_addr()
        .await
        .context("Receiver is not listening")?;
    println!("   ✓ Listening on http://{}", addr);

    println!("\n{}", "2. Connecting sender...".dimmed());
    let sender = PaychanPlugin::new(
        PluginConfig::default()
            .with_server(format!("http://{}", addr))
            .with_db(""),
        Arc::new(StaticChainClient::new(vec![Account::repeat_byte(0xaa)])),
        ledgers,
    );
    sender.connect().await?;
    println!("   ✓ Channel warm");

    println!("\n{}", "3. Sending 32 zero bytes...".dimmed());
    let response = sender.send_data(Bytes::from(vec![0u8; 32])).await?;
    println!("   ✓ Response: {}", hex::encode(&response));

    println!("\n{}", "4. Sending 1 unit...".dimmed());
    let receipt = sender.send_money(1u64.into()).await?;
    println!("   ✓ Token: {}", receipt.token);

    println!("\n{}", "5. Disconnecting...".dimmed());
    print_report(sender.disconnect().await?);
    print_report(receiver.disconnect().await?);

    if response.len() == 32 && response.iter().all(|&b| b == 0xff) {
        println!("\n   {} Demo completed", "✅".green());
    } else {
        println!("\n   {} Unexpected response", "❌".red());
    }
    Ok(())
}
