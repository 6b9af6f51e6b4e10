//! The wallet screen: account card and transfer panel on one engine
//!
//! [`WalletMachine`] embeds the account and transfer machines and routes each
//! event to its own sub-machine. Their pipelines are lifted into the composite
//! so providers keep seeing sub-states and sub-events only.

use crate::account::{AccountEvent, AccountMachine, AccountState, account_middleware, account_request};
use crate::config::{ConfigError, WalletEnvironment};
use crate::transfers::{
    TransferStatus, TransferStatusProjector, TransfersEvent, TransfersMachine, TransfersState, transfers_request,
};
use crate::types::Wei;
use automata_core::{ActionProjector, Command, Middleware, Request, StateMachine, effect};
use automata_runtime::{Engine, EngineConfig};
use futures::StreamExt;
use std::sync::{Mutex, PoisonError};

/// Account card and transfer panel states
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WalletState {
    /// The account card
    pub account: AccountState,
    /// The transfer panel
    pub transfers: TransfersState,
}

/// Events addressed to one of the embedded machines
#[derive(Clone, Debug, PartialEq)]
pub enum WalletEvent {
    /// For the account card
    Account(AccountEvent),
    /// For the transfer panel
    Transfers(TransfersEvent),
}

/// User input on the wallet screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletCommand {
    /// The send button was tapped
    SendEth,
}

impl Command for WalletCommand {
    type Event = WalletEvent;

    fn interpret(self) -> WalletEvent {
        match self {
            Self::SendEth => WalletEvent::Transfers(TransfersEvent::SendEth),
        }
    }
}

/// Delegates to the account and transfer machines
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletMachine {
    account: AccountMachine,
    transfers: TransfersMachine,
}

impl WalletMachine {
    /// Composite over `transfers`
    #[must_use]
    pub const fn new(transfers: TransfersMachine) -> Self {
        Self {
            account: AccountMachine,
            transfers,
        }
    }
}

impl StateMachine for WalletMachine {
    type State = WalletState;
    type Event = WalletEvent;

    fn initial_state(&self) -> WalletState {
        WalletState {
            account: self.account.initial_state(),
            transfers: self.transfers.initial_state(),
        }
    }

    fn reduce(&self, state: WalletState, event: WalletEvent) -> WalletState {
        match event {
            WalletEvent::Account(event) => WalletState {
                account: self.account.reduce(state.account, event),
                ..state
            },
            WalletEvent::Transfers(event) => WalletState {
                transfers: self.transfers.reduce(state.transfers, event),
                ..state
            },
        }
    }
}

/// Runs the account middleware on account events; transfer events pass
#[must_use]
pub fn wallet_middleware(account: Middleware<AccountEvent>) -> Middleware<WalletEvent> {
    Middleware::when(|event: &WalletEvent| match event {
        WalletEvent::Account(event) => Some(event.clone()),
        WalletEvent::Transfers(_) => None,
    })
    .then(move |event| account.call(event).map(WalletEvent::Account).boxed())
}

/// The composite request
///
/// Each sub-request runs only when its own sub-state changed, so a balance
/// arriving mid-transfer cannot submit the transfer a second time. A third
/// branch enables the transfer panel once the account knows its wallet.
#[must_use]
pub fn wallet_request(
    account: Request<AccountState, AccountEvent>,
    transfers: Request<TransfersState, TransfersEvent>,
) -> Request<WalletState, WalletEvent> {
    let enable = Request::when(|state: &WalletState| match state.transfers {
        TransfersState::Initial => state.account.context().and_then(|context| context.wallet),
        _ => None,
    })
    .then_map(|wallet| WalletEvent::Transfers(TransfersEvent::Enable(wallet)));

    Request::parallel([
        on_change(account, |state| &state.account, WalletEvent::Account),
        on_change(transfers, |state| &state.transfers, WalletEvent::Transfers),
        enable,
    ])
}

/// Lift `request` into the composite, skipping states whose selected part
/// equals the one it last saw
fn on_change<T, E>(
    request: Request<T, E>,
    select: fn(&WalletState) -> &T,
    wrap: fn(E) -> WalletEvent,
) -> Request<WalletState, WalletEvent>
where
    T: Clone + PartialEq + Send + 'static,
    E: Send + 'static,
{
    let last_seen: Mutex<Option<T>> = Mutex::new(None);

    Request::from_fn(move |state: &WalletState| {
        let current = select(state);
        {
            let mut last = last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref() == Some(current) {
                return effect::empty();
            }
            *last = Some(current.clone());
        }
        request.call(current).map(wrap).boxed()
    })
}

/// The account card as shown
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountCardModel {
    /// Seed for the identicon; empty until the wallet is known
    pub image_seed: String,
    /// Wallet address, or `-`
    pub name: String,
    /// Balance as `1.23 ETH`, or `- ETH`
    pub balance: String,
    /// Balance value as `2460.00 USD`, or `- USD`
    pub value: String,
}

impl AccountCardModel {
    fn from_state(state: &AccountState) -> Option<Self> {
        let context = state.context()?;
        let address = context.wallet.map(|wallet| wallet.address.to_string());
        let ether = context.balance.map(Wei::to_eth);

        Some(Self {
            image_seed: address.clone().unwrap_or_default(),
            name: address.unwrap_or_else(|| "-".to_string()),
            balance: format_amount(ether, Some(1.0), "ETH"),
            value: format_amount(ether, context.price, "USD"),
        })
    }
}

fn format_amount(value: Option<f64>, rate: Option<f64>, symbol: &str) -> String {
    match (value, rate) {
        (Some(value), Some(rate)) => format!("{:.2} {symbol}", value * rate),
        _ => format!("- {symbol}"),
    }
}

/// What the wallet screen shows
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayModel {
    /// The account card
    pub account: AccountCardModel,
    /// The transfer panel, once enabled
    pub transfer: Option<TransferStatus>,
}

/// Projects the wallet onto its screen; nothing until loading starts
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletProjector;

impl ActionProjector<WalletState> for WalletProjector {
    type Action = DisplayModel;

    fn transform(&self, state: &WalletState) -> Option<DisplayModel> {
        Some(DisplayModel {
            account: AccountCardModel::from_state(&state.account)?,
            transfer: TransferStatusProjector.transform(&state.transfers),
        })
    }
}

/// Engine driving the wallet screen
pub type WalletEngine = Engine<WalletMachine, WalletProjector, WalletCommand>;

/// Wire the wallet screen to `environment`'s providers and start it
///
/// # Errors
///
/// Returns [`ConfigError::Engine`] when the engine cannot start.
pub fn wallet(environment: &WalletEnvironment, config: EngineConfig) -> Result<WalletEngine, ConfigError> {
    let machine = WalletMachine::new(TransfersMachine::new(environment.recipient, environment.amount));
    let middleware = wallet_middleware(account_middleware(
        environment.balances.clone(),
        environment.prices.clone(),
        environment.retry.clone(),
    ));
    let request = wallet_request(
        account_request(environment.wallets.clone(), environment.retry.clone()),
        transfers_request(environment.transfers.clone()),
    );

    let engine = WalletEngine::builder(machine, WalletProjector)
        .middleware(middleware)
        .request(request)
        .config(config.with_name("wallet"))
        .build()?;
    Ok(engine)
}
