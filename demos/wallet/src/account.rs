//! The account card machine
//!
//! Loads the wallet, then fetches its balance and the ether price
//! concurrently. Both results are merged into an [`AccountContext`] in
//! whatever order they settle; the card is `Loaded` once all three are in.

use crate::providers::{BalanceProvider, PriceFeed, WalletProvider};
use crate::types::{Address, Wallet, Wei};
use automata_core::{EventStream, Middleware, Request, StateMachine};
use automata_macros::Context;
use automata_runtime::retry::{self, RetryPolicy};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Partial results gathered while the card loads
#[derive(Clone, Debug, Default, PartialEq, Context)]
pub struct AccountContext {
    /// The keystore's wallet
    pub wallet: Option<Wallet>,
    /// Its ether balance
    pub balance: Option<Wei>,
    /// USD per ether
    pub price: Option<f64>,
}

/// Account card state
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AccountState {
    /// Nothing requested yet
    #[default]
    Initial,
    /// Some results are still outstanding
    Loading(AccountContext),
    /// Every result is in
    Loaded(AccountContext),
}

impl AccountState {
    /// The gathered results, if loading has started
    #[must_use]
    pub const fn context(&self) -> Option<&AccountContext> {
        match self {
            Self::Initial => None,
            Self::Loading(context) | Self::Loaded(context) => Some(context),
        }
    }
}

/// Account card events
#[derive(Clone, Debug, PartialEq)]
pub enum AccountEvent {
    /// The keystore answered
    FetchedWallet(Wallet),
    /// The chain answered
    FetchedBalance(Wei),
    /// The price feed answered
    FetchedPrice(f64),
}

/// Account card transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountMachine;

impl AccountMachine {
    fn settle(context: AccountContext) -> AccountState {
        if context.is_complete() {
            AccountState::Loaded(context)
        } else {
            AccountState::Loading(context)
        }
    }
}

impl StateMachine for AccountMachine {
    type State = AccountState;
    type Event = AccountEvent;

    fn initial_state(&self) -> AccountState {
        AccountState::Initial
    }

    fn reduce(&self, state: AccountState, event: AccountEvent) -> AccountState {
        match (state, event) {
            (AccountState::Initial, AccountEvent::FetchedWallet(wallet)) => {
                Self::settle(AccountContext::default().with_wallet(wallet))
            },
            (AccountState::Loading(context), AccountEvent::FetchedBalance(balance)) => {
                Self::settle(context.with_balance(balance))
            },
            (AccountState::Loading(context), AccountEvent::FetchedPrice(price)) => {
                Self::settle(context.with_price(price))
            },
            (state, _) => state,
        }
    }
}

/// Fans a fetched wallet out into balance and price fetches
///
/// The wallet event itself passes through alongside the fetches. Provider
/// failures that survive the retries fall back to zero values, so the card
/// still finishes loading.
#[must_use]
pub fn account_middleware(
    balances: Arc<dyn BalanceProvider>,
    prices: Arc<dyn PriceFeed>,
    policy: RetryPolicy,
) -> Middleware<AccountEvent> {
    let fetches = Middleware::from_fn(move |event: AccountEvent| match event {
        AccountEvent::FetchedWallet(wallet) => fetch_balance_and_price(
            Arc::clone(&balances),
            Arc::clone(&prices),
            policy.clone(),
            wallet.address,
        ),
        _ => automata_core::effect::empty(),
    });

    Middleware::parallel([Middleware::passthrough(), fetches])
}

fn fetch_balance_and_price(
    balances: Arc<dyn BalanceProvider>,
    prices: Arc<dyn PriceFeed>,
    policy: RetryPolicy,
    address: Address,
) -> EventStream<AccountEvent> {
    let balance_policy = policy.clone();
    let balance = stream::once(async move {
        let balance = retry::retry(&balance_policy, || balances.fetch(address))
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(%address, error = %error, "Balance unavailable, showing zero");
                Wei::ZERO
            });
        AccountEvent::FetchedBalance(balance)
    });

    let price = stream::once(async move {
        let price = retry::retry(&policy, || prices.fetch()).await.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Price unavailable, showing zero");
            0.0
        });
        AccountEvent::FetchedPrice(price)
    });

    stream::select(balance, price).boxed()
}

/// Loads the wallet while the card is still `Initial`
#[must_use]
pub fn account_request(wallets: Arc<dyn WalletProvider>, policy: RetryPolicy) -> Request<AccountState, AccountEvent> {
    Request::parallel([Request::when(|state: &AccountState| {
        matches!(state, AccountState::Initial).then_some(())
    })
    .then_try(move |()| {
        let wallets = Arc::clone(&wallets);
        let policy = policy.clone();
        async move {
            retry::retry(&policy, || wallets.fetch())
                .await
                .map(AccountEvent::FetchedWallet)
        }
    })])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::providers::{FixedPriceFeed, InMemoryChain, StaticWallet};
    use automata_testing::MachineTest;

    const WALLET: Wallet = Wallet::new(Address([7; 20]));

    #[test]
    fn test_wallet_starts_loading() {
        MachineTest::new(AccountMachine)
            .when_event(AccountEvent::FetchedWallet(WALLET))
            .then_state_eq(AccountState::Loading(AccountContext::default().with_wallet(WALLET)))
            .run();
    }

    #[test]
    fn test_results_merge_in_any_order() {
        let loaded = AccountState::Loaded(AccountContext {
            wallet: Some(WALLET),
            balance: Some(Wei(5)),
            price: Some(2.5),
        });

        MachineTest::new(AccountMachine)
            .when_events([
                AccountEvent::FetchedWallet(WALLET),
                AccountEvent::FetchedPrice(2.5),
                AccountEvent::FetchedBalance(Wei(5)),
            ])
            .then_state_eq(loaded.clone())
            .run();

        MachineTest::new(AccountMachine)
            .when_events([
                AccountEvent::FetchedWallet(WALLET),
                AccountEvent::FetchedBalance(Wei(5)),
                AccountEvent::FetchedPrice(2.5),
            ])
            .then_state_eq(loaded)
            .run();
    }

    #[test]
    fn test_results_before_the_wallet_are_ignored() {
        MachineTest::new(AccountMachine)
            .when_events([AccountEvent::FetchedBalance(Wei(1)), AccountEvent::FetchedPrice(1.0)])
            .then_state_eq(AccountState::Initial)
            .run();
    }

    #[test]
    fn test_loaded_is_final() {
        let loaded = AccountState::Loaded(AccountContext {
            wallet: Some(WALLET),
            balance: Some(Wei(5)),
            price: Some(2.5),
        });

        MachineTest::new(AccountMachine)
            .given_state(loaded.clone())
            .when_event(AccountEvent::FetchedBalance(Wei(9)))
            .then_state_eq(loaded)
            .run();
    }

    #[tokio::test]
    async fn test_middleware_fans_out_and_passes_through() {
        let chain = Arc::new(InMemoryChain::new());
        chain.fund(WALLET.address, Wei(42));
        let middleware = account_middleware(chain, Arc::new(FixedPriceFeed::new(3.0)), RetryPolicy::none());

        let mut events: Vec<_> = middleware
            .call(AccountEvent::FetchedWallet(WALLET))
            .collect()
            .await;
        events.sort_by_key(|event| format!("{event:?}"));

        assert_eq!(
            events,
            vec![
                AccountEvent::FetchedBalance(Wei(42)),
                AccountEvent::FetchedPrice(3.0),
                AccountEvent::FetchedWallet(WALLET),
            ]
        );
    }

    #[tokio::test]
    async fn test_middleware_forwards_other_events_once() {
        let middleware = account_middleware(
            Arc::new(InMemoryChain::new()),
            Arc::new(FixedPriceFeed::new(3.0)),
            RetryPolicy::none(),
        );

        let events: Vec<_> = middleware.call(AccountEvent::FetchedPrice(1.0)).collect().await;
        assert_eq!(events, vec![AccountEvent::FetchedPrice(1.0)]);
    }

    #[tokio::test]
    async fn test_request_only_in_initial() {
        let request = account_request(Arc::new(StaticWallet(WALLET)), RetryPolicy::none());

        let initial: Vec<_> = request.call(&AccountState::Initial).collect().await;
        let loading: Vec<_> = request
            .call(&AccountState::Loading(AccountContext::default()))
            .collect()
            .await;

        assert_eq!(initial, vec![AccountEvent::FetchedWallet(WALLET)]);
        assert!(loading.is_empty());
    }
}
