//! # Wallet Example
//!
//! An account card and a transfer panel sharing one automata engine.
//!
//! This example showcases:
//! - A context accumulator merging concurrent results (`AccountContext`)
//! - Middleware fanning one event out into parallel provider calls
//! - Sub-machines embedded in a composite, with their pipelines lifted
//! - Requests guarded so a transfer is submitted once per send
//! - Provider traits with in-memory implementations and retries
//!
//! ## Flow
//!
//! ```text
//! Initial ─► request: fetch wallet ─► FetchedWallet ─► middleware ─┬─► FetchedBalance
//!                                                                  └─► FetchedPrice
//! Loading(ctx) ─► ... ─► Loaded(ctx)          transfers: Initial ─► Ready ─► Sending ─► Sent
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use automata_runtime::EngineConfig;
//! use futures::StreamExt;
//! use wallet::{WalletConfig, WalletEnvironment};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (environment, _chain) = WalletEnvironment::in_memory(&WalletConfig::default())?;
//! let engine = wallet::wallet(&environment, EngineConfig::default())?;
//! let mut display = engine.subscribe();
//!
//! while let Some(model) = display.next().await {
//!     println!("{} / {}", model.account.balance, model.account.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod config;
pub mod providers;
pub mod transfers;
pub mod types;
pub mod wallet;

pub use account::{AccountContext, AccountEvent, AccountMachine, AccountState};
pub use config::{ConfigError, WalletConfig, WalletEnvironment};
pub use providers::{BalanceProvider, FixedPriceFeed, InMemoryChain, PriceFeed, StaticWallet, TokenTransfer, WalletProvider};
pub use transfers::{FAILED_HASH, TransferStatus, TransfersCommand, TransfersEvent, TransfersMachine, TransfersState};
pub use types::{Address, TransferInputs, Wallet, Wei};
pub use wallet::{
    AccountCardModel, DisplayModel, WalletCommand, WalletEngine, WalletEvent, WalletMachine, WalletProjector, WalletState,
    wallet,
};
