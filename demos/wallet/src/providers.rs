//! Effect providers the wallet pipelines call
//!
//! Each provider exposes one asynchronous call and reports failure through
//! [`EffectError`], so middleware can tell a zero balance from an outage.
//! The in-memory implementations stand in for the keystore, the chain client
//! and the price API.
//!
//! # Dyn Compatibility
//!
//! The traits return `Pin<Box<dyn Future>>` instead of using `async fn` so
//! the environment can hold them as `Arc<dyn Provider>`.

use crate::types::{Address, ETH_TOKEN, TransferInputs, Wallet, Wei};
use automata_core::EffectError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Boxed provider future
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EffectError>> + Send + 'a>>;

/// Loads the wallet held by the keystore
pub trait WalletProvider: Send + Sync {
    /// Fetch the wallet
    fn fetch(&self) -> ProviderFuture<'_, Wallet>;
}

/// Reads account balances
pub trait BalanceProvider: Send + Sync {
    /// Balance of `address`
    fn fetch(&self, address: Address) -> ProviderFuture<'_, Wei>;
}

/// Quotes the ether price
pub trait PriceFeed: Send + Sync {
    /// USD per ether
    fn fetch(&self) -> ProviderFuture<'_, f64>;
}

/// Submits signed token transfers
pub trait TokenTransfer: Send + Sync {
    /// Submit `transfer` signed by `wallet`, returning the transaction hash
    fn execute(&self, transfer: TransferInputs, wallet: Wallet) -> ProviderFuture<'_, String>;
}

/// Keystore holding a single wallet
#[derive(Debug, Clone, Copy)]
pub struct StaticWallet(pub Wallet);

impl WalletProvider for StaticWallet {
    fn fetch(&self) -> ProviderFuture<'_, Wallet> {
        let wallet = self.0;
        Box::pin(async move { Ok(wallet) })
    }
}

/// Price feed quoting a constant price
#[derive(Debug, Clone, Copy)]
pub struct FixedPriceFeed {
    price: f64,
    latency: Duration,
}

impl FixedPriceFeed {
    /// Feed quoting `price` USD per ether
    #[must_use]
    pub const fn new(price: f64) -> Self {
        Self {
            price,
            latency: Duration::ZERO,
        }
    }

    /// Delay every quote
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl PriceFeed for FixedPriceFeed {
    fn fetch(&self) -> ProviderFuture<'_, f64> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            Ok(self.price)
        })
    }
}

/// Ledger of ether balances that accepts ether transfers
#[derive(Debug, Default)]
pub struct InMemoryChain {
    balances: Mutex<HashMap<Address, u128>>,
    transactions: AtomicU64,
    latency: Duration,
}

impl InMemoryChain {
    /// Empty chain answering immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Credit `amount` to `address`
    pub fn fund(&self, address: Address, amount: Wei) {
        let mut balances = self.balances.lock().unwrap_or_else(PoisonError::into_inner);
        let balance = balances.entry(address).or_default();
        *balance = balance.saturating_add(amount.0);
    }

    /// Current balance of `address`
    #[must_use]
    pub fn balance_of(&self, address: Address) -> Wei {
        let balances = self.balances.lock().unwrap_or_else(PoisonError::into_inner);
        Wei(balances.get(&address).copied().unwrap_or_default())
    }

    /// Transactions accepted so far
    #[must_use]
    pub fn transaction_count(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }

    fn apply(&self, transfer: TransferInputs, wallet: Wallet) -> Result<String, EffectError> {
        if transfer.wallet != wallet.address {
            return Err(EffectError::Rejected(format!(
                "transfer from {} signed by {}",
                transfer.wallet, wallet.address
            )));
        }
        if transfer.token != ETH_TOKEN {
            return Err(EffectError::Rejected(format!("unsupported token {}", transfer.token)));
        }

        let mut balances = self.balances.lock().unwrap_or_else(PoisonError::into_inner);
        let available = balances.get(&transfer.wallet).copied().unwrap_or_default();
        let remaining = available.checked_sub(transfer.amount.0).ok_or_else(|| {
            EffectError::Rejected(format!("insufficient funds: {available} < {}", transfer.amount.0))
        })?;
        balances.insert(transfer.wallet, remaining);
        let credited = balances.entry(transfer.to).or_default();
        *credited = credited.saturating_add(transfer.amount.0);
        drop(balances);

        let sequence = self.transactions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("0x{sequence:064x}"))
    }
}

impl BalanceProvider for InMemoryChain {
    fn fetch(&self, address: Address) -> ProviderFuture<'_, Wei> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            Ok(self.balance_of(address))
        })
    }
}

impl TokenTransfer for InMemoryChain {
    fn execute(&self, transfer: TransferInputs, wallet: Wallet) -> ProviderFuture<'_, String> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            let hash = self.apply(transfer, wallet)?;
            tracing::debug!(%hash, to = %transfer.to, amount = transfer.amount.0, "Transfer accepted");
            Ok(hash)
        })
    }
}
