//! Configuration and provider wiring for the wallet screen.
//!
//! [`WalletConfig`] loads from environment variables with defaults.
//! [`WalletEnvironment`] holds one provider per effect the pipelines call;
//! the builder refuses to finish while any of them is missing.

use crate::providers::{BalanceProvider, FixedPriceFeed, InMemoryChain, PriceFeed, StaticWallet, TokenTransfer, WalletProvider};
use crate::types::{Address, DEFAULT_RECIPIENT, DEFAULT_TRANSFER_AMOUNT, WEI_PER_ETH, Wallet, Wei};
use automata_runtime::EngineError;
use automata_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the wallet address
pub const ADDRESS_VAR: &str = "WALLET_ADDRESS";

/// Environment variable holding the in-memory chain's opening balance, in wei
pub const INITIAL_BALANCE_VAR: &str = "WALLET_INITIAL_BALANCE_WEI";

/// Environment variable holding the quoted ether price
pub const ETH_PRICE_VAR: &str = "WALLET_ETH_PRICE_USD";

/// Environment variable holding the transfer recipient
pub const RECIPIENT_VAR: &str = "WALLET_RECIPIENT";

/// Environment variable holding the transfer amount, in wei
pub const TRANSFER_AMOUNT_VAR: &str = "WALLET_TRANSFER_AMOUNT_WEI";

/// Environment variable holding the simulated provider latency
pub const PROVIDER_LATENCY_VAR: &str = "WALLET_PROVIDER_LATENCY_MS";

/// Environment variable holding the provider retry count
pub const PROVIDER_RETRIES_VAR: &str = "WALLET_PROVIDER_RETRIES";

/// Errors raised while assembling the wallet screen
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required effect provider was never supplied
    #[error("Missing provider: {0}")]
    MissingProvider(&'static str),

    /// A configuration value could not be used
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// Offending value
        value: String,
    },

    /// The engine refused to start
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Wallet settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// The keystore's wallet address
    pub address: String,
    /// Opening balance credited on the in-memory chain
    pub initial_balance_wei: u128,
    /// Quoted USD per ether
    pub eth_price_usd: f64,
    /// Who the send button pays
    pub recipient: String,
    /// How much the send button pays
    pub transfer_amount_wei: u128,
    /// Delay added to every in-memory provider call
    pub provider_latency_ms: u64,
    /// Retries for transient provider failures
    pub provider_retries: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            address: "0x000000000000000000000000000000000000a11c".to_string(),
            initial_balance_wei: WEI_PER_ETH + WEI_PER_ETH / 2,
            eth_price_usd: 2000.0,
            recipient: DEFAULT_RECIPIENT.to_string(),
            transfer_amount_wei: DEFAULT_TRANSFER_AMOUNT.0,
            provider_latency_ms: 0,
            provider_retries: 2,
        }
    }
}

impl WalletConfig {
    /// Load from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparsable or inconsistent values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load from any variable lookup; unset variables keep their defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparsable or inconsistent values.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            address: lookup(ADDRESS_VAR).unwrap_or(defaults.address),
            initial_balance_wei: parse_or(&lookup, INITIAL_BALANCE_VAR, defaults.initial_balance_wei)?,
            eth_price_usd: parse_or(&lookup, ETH_PRICE_VAR, defaults.eth_price_usd)?,
            recipient: lookup(RECIPIENT_VAR).unwrap_or(defaults.recipient),
            transfer_amount_wei: parse_or(&lookup, TRANSFER_AMOUNT_VAR, defaults.transfer_amount_wei)?,
            provider_latency_ms: parse_or(&lookup, PROVIDER_LATENCY_VAR, defaults.provider_latency_ms)?,
            provider_retries: parse_or(&lookup, PROVIDER_RETRIES_VAR, defaults.provider_retries)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed address or a
    /// negative or non-finite price.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wallet()?;
        self.recipient_address()?;
        if !self.eth_price_usd.is_finite() || self.eth_price_usd < 0.0 {
            return Err(ConfigError::Invalid {
                name: ETH_PRICE_VAR,
                value: self.eth_price_usd.to_string(),
            });
        }
        Ok(())
    }

    /// The configured wallet
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address is malformed.
    pub fn wallet(&self) -> Result<Wallet, ConfigError> {
        parse_address(ADDRESS_VAR, &self.address).map(Wallet::new)
    }

    /// The configured recipient
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address is malformed.
    pub fn recipient_address(&self) -> Result<Address, ConfigError> {
        parse_address(RECIPIENT_VAR, &self.recipient)
    }

    /// Simulated provider latency
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.provider_latency_ms)
    }

    /// Retry schedule for the providers
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.provider_retries)
            .with_initial_delay(Duration::from_millis(100))
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_hex(value).ok_or_else(|| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

/// Providers and settings the wallet's pipelines use
#[derive(Clone)]
pub struct WalletEnvironment {
    /// Keystore
    pub wallets: Arc<dyn WalletProvider>,
    /// Chain balance reader
    pub balances: Arc<dyn BalanceProvider>,
    /// Ether price quotes
    pub prices: Arc<dyn PriceFeed>,
    /// Transfer submission
    pub transfers: Arc<dyn TokenTransfer>,
    /// Who the send button pays
    pub recipient: Address,
    /// How much the send button pays
    pub amount: Wei,
    /// Retry schedule for the account providers
    pub retry: RetryPolicy,
}

impl WalletEnvironment {
    /// Start wiring an environment
    #[must_use]
    pub fn builder() -> WalletEnvironmentBuilder {
        WalletEnvironmentBuilder::default()
    }

    /// Environment backed by in-memory providers, with the chain returned for
    /// inspection
    ///
    /// The chain credits the configured wallet with its opening balance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the config is unusable.
    pub fn in_memory(config: &WalletConfig) -> Result<(Self, Arc<InMemoryChain>), ConfigError> {
        let wallet = config.wallet()?;
        let chain = Arc::new(InMemoryChain::new().with_latency(config.latency()));
        chain.fund(wallet.address, Wei(config.initial_balance_wei));

        let environment = Self::builder()
            .wallets(Arc::new(StaticWallet(wallet)))
            .balances(chain.clone())
            .prices(Arc::new(FixedPriceFeed::new(config.eth_price_usd).with_latency(config.latency())))
            .transfers(chain.clone())
            .recipient(config.recipient_address()?)
            .amount(Wei(config.transfer_amount_wei))
            .retry(config.retry_policy())
            .build()?;

        Ok((environment, chain))
    }
}

impl std::fmt::Debug for WalletEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletEnvironment")
            .field("recipient", &self.recipient)
            .field("amount", &self.amount)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WalletEnvironment`]
#[derive(Default)]
pub struct WalletEnvironmentBuilder {
    wallets: Option<Arc<dyn WalletProvider>>,
    balances: Option<Arc<dyn BalanceProvider>>,
    prices: Option<Arc<dyn PriceFeed>>,
    transfers: Option<Arc<dyn TokenTransfer>>,
    recipient: Option<Address>,
    amount: Option<Wei>,
    retry: Option<RetryPolicy>,
}

impl WalletEnvironmentBuilder {
    /// Supply the keystore
    #[must_use]
    pub fn wallets(mut self, wallets: Arc<dyn WalletProvider>) -> Self {
        self.wallets = Some(wallets);
        self
    }

    /// Supply the balance reader
    #[must_use]
    pub fn balances(mut self, balances: Arc<dyn BalanceProvider>) -> Self {
        self.balances = Some(balances);
        self
    }

    /// Supply the price feed
    #[must_use]
    pub fn prices(mut self, prices: Arc<dyn PriceFeed>) -> Self {
        self.prices = Some(prices);
        self
    }

    /// Supply the transfer submitter
    #[must_use]
    pub fn transfers(mut self, transfers: Arc<dyn TokenTransfer>) -> Self {
        self.transfers = Some(transfers);
        self
    }

    /// Override the recipient
    #[must_use]
    pub const fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Override the amount
    #[must_use]
    pub const fn amount(mut self, amount: Wei) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Override the retry schedule
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Finish wiring
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingProvider`] naming the first provider
    /// that was not supplied.
    pub fn build(self) -> Result<WalletEnvironment, ConfigError> {
        Ok(WalletEnvironment {
            wallets: self.wallets.ok_or(ConfigError::MissingProvider("WalletProvider"))?,
            balances: self.balances.ok_or(ConfigError::MissingProvider("BalanceProvider"))?,
            prices: self.prices.ok_or(ConfigError::MissingProvider("PriceFeed"))?,
            transfers: self.transfers.ok_or(ConfigError::MissingProvider("TokenTransfer"))?,
            recipient: self.recipient.unwrap_or(DEFAULT_RECIPIENT),
            amount: self.amount.unwrap_or(DEFAULT_TRANSFER_AMOUNT),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = WalletConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, WalletConfig::default());
        assert_eq!(config.recipient_address().unwrap(), DEFAULT_RECIPIENT);
    }

    #[test]
    fn test_reads_variables() {
        let config = WalletConfig::from_vars(vars(&[
            (ADDRESS_VAR, "0x1111111111111111111111111111111111111111"),
            (ETH_PRICE_VAR, "1234.5"),
            (PROVIDER_LATENCY_VAR, "25"),
            (PROVIDER_RETRIES_VAR, "0"),
        ]))
        .unwrap();

        assert_eq!(config.wallet().unwrap(), Wallet::new(Address([0x11; 20])));
        assert!((config.eth_price_usd - 1234.5).abs() < f64::EPSILON);
        assert_eq!(config.latency(), Duration::from_millis(25));
        assert_eq!(config.retry_policy().max_retries, 0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            WalletConfig::from_vars(vars(&[(ADDRESS_VAR, "0xnope")])),
            Err(ConfigError::Invalid { name: ADDRESS_VAR, .. })
        ));
        assert!(matches!(
            WalletConfig::from_vars(vars(&[(INITIAL_BALANCE_VAR, "-1")])),
            Err(ConfigError::Invalid {
                name: INITIAL_BALANCE_VAR,
                ..
            })
        ));
        assert!(matches!(
            WalletConfig::from_vars(vars(&[(ETH_PRICE_VAR, "NaN")])),
            Err(ConfigError::Invalid { name: ETH_PRICE_VAR, .. })
        ));
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&WalletConfig::default()).unwrap();
        let back: WalletConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WalletConfig::default());
    }

    #[test]
    fn test_each_provider_is_required() {
        let chain = Arc::new(InMemoryChain::new());

        let missing_wallets = WalletEnvironment::builder().build();
        let missing_prices = WalletEnvironment::builder()
            .wallets(Arc::new(StaticWallet(Wallet::new(Address([1; 20])))))
            .balances(chain.clone())
            .transfers(chain)
            .build();

        assert!(matches!(missing_wallets, Err(ConfigError::MissingProvider("WalletProvider"))));
        assert!(matches!(missing_prices, Err(ConfigError::MissingProvider("PriceFeed"))));
    }

    #[test]
    fn test_in_memory_funds_the_wallet() {
        let config = WalletConfig::default();
        let (environment, chain) = WalletEnvironment::in_memory(&config).unwrap();

        assert_eq!(chain.balance_of(config.wallet().unwrap().address), Wei(config.initial_balance_wei));
        assert_eq!(environment.amount, DEFAULT_TRANSFER_AMOUNT);
        assert_eq!(environment.retry.max_retries, 2);
    }
}
