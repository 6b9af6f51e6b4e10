//! Wallet example binary
//!
//! Loads the account card from in-memory providers, sends ether once and
//! prints what the screen would show along the way.

use anyhow::Context as _;
use automata_runtime::EngineConfig;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wallet::{DisplayModel, TransferStatus, WalletCommand, WalletConfig, WalletEnvironment};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet=debug,automata_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    automata_runtime::metrics::describe_metrics();

    println!("=== Wallet Example: account card and transfers on the automata engine ===\n");

    let config = WalletConfig::from_env()?;
    tracing::info!(config = %serde_json::to_string(&config)?, "Loaded wallet configuration");
    let engine_config = EngineConfig::from_env()?;

    let (environment, chain) = WalletEnvironment::in_memory(&config)?;
    let engine = wallet::wallet(&environment, engine_config)?;
    let mut display = engine.subscribe();

    println!(">>> Loading the account card");
    wait_for(&mut display, |model| {
        matches!(model.transfer, Some(TransferStatus::Ready)) && !model.account.value.starts_with('-')
    })
    .await?;

    println!("\n>>> Sending {} ETH to {}", environment.amount.to_eth(), environment.recipient);
    engine.handle(WalletCommand::SendEth)?;
    wait_for(&mut display, |model| matches!(model.transfer, Some(TransferStatus::Sent { .. }))).await?;

    let sender = config.wallet()?;
    println!("\nSender balance:    {} ETH", chain.balance_of(sender.address).to_eth());
    println!("Recipient balance: {} ETH", chain.balance_of(environment.recipient).to_eth());

    engine.shutdown();

    println!("\n=== Wallet Example Complete ===");
    Ok(())
}

async fn wait_for<S, F>(display: &mut S, done: F) -> anyhow::Result<()>
where
    S: Stream<Item = DisplayModel> + Unpin,
    F: Fn(&DisplayModel) -> bool,
{
    loop {
        let model = tokio::time::timeout(WAIT, display.next())
            .await
            .context("timed out waiting for the engine")?
            .context("engine stopped")?;
        println!(
            "Card: {} | {} | {} | transfer: {:?}",
            model.account.name, model.account.balance, model.account.value, model.transfer
        );
        if done(&model) {
            return Ok(());
        }
    }
}
