//! The ether transfer machine
//!
//! `SendEth` prepares a transfer; the request submits it while the machine
//! is `Sending` and reports the hash back. A failed submission is recorded
//! as the [`FAILED_HASH`] placeholder so the machine always leaves `Sending`.

use crate::providers::TokenTransfer;
use crate::types::{Address, DEFAULT_RECIPIENT, DEFAULT_TRANSFER_AMOUNT, ETH_TOKEN, TransferInputs, Wallet, Wei};
use automata_core::{ActionProjector, Request, StateMachine};
use automata_macros::{Command, Context};
use std::sync::Arc;

/// Hash recorded when the chain rejected a transfer
pub const FAILED_HASH: &str = "ERR";

/// Wallet, pending transfer and history
#[derive(Clone, Debug, PartialEq, Eq, Context)]
pub struct TransfersContext {
    /// The paying wallet
    pub wallet: Wallet,
    /// The transfer being submitted
    #[context(optional)]
    pub pending: Option<TransferInputs>,
    /// Hashes of submitted transfers, oldest first
    pub hashes: Vec<String>,
}

impl TransfersContext {
    /// Fresh context for `wallet`
    #[must_use]
    pub const fn new(wallet: Wallet) -> Self {
        Self {
            wallet,
            pending: None,
            hashes: Vec::new(),
        }
    }

    /// Append a transaction hash
    #[must_use]
    pub fn with_new_hash(mut self, hash: String) -> Self {
        self.hashes.push(hash);
        self
    }
}

/// Transfer state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TransfersState {
    /// No wallet yet
    #[default]
    Initial,
    /// Ready to send
    Ready(TransfersContext),
    /// A transfer is being submitted
    Sending(TransfersContext),
    /// The last transfer was submitted
    Sent(TransfersContext),
}

/// Transfer events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransfersEvent {
    /// A wallet became available
    Enable(Wallet),
    /// Send the configured amount of ether
    SendEth,
    /// The chain answered a submission
    TransactionSent {
        /// Transaction hash, or [`FAILED_HASH`]
        hash: String,
    },
}

/// User input on the transfer panel
#[derive(Clone, Debug, PartialEq, Eq, Command)]
#[command(event = TransfersEvent)]
pub enum TransfersCommand {
    /// Make the panel usable with `wallet`
    Enable(Wallet),
    /// The send button was tapped
    #[command(rename = SendEth)]
    TappedSend,
}

/// Transfer transitions; every send pays `amount` to `recipient`
#[derive(Debug, Clone, Copy)]
pub struct TransfersMachine {
    recipient: Address,
    amount: Wei,
}

impl TransfersMachine {
    /// Machine paying `amount` to `recipient` on each send
    #[must_use]
    pub const fn new(recipient: Address, amount: Wei) -> Self {
        Self { recipient, amount }
    }

    const fn transfer_from(&self, wallet: &Wallet) -> TransferInputs {
        TransferInputs {
            wallet: wallet.address,
            token: ETH_TOKEN,
            to: self.recipient,
            amount: self.amount,
        }
    }
}

impl Default for TransfersMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RECIPIENT, DEFAULT_TRANSFER_AMOUNT)
    }
}

impl StateMachine for TransfersMachine {
    type State = TransfersState;
    type Event = TransfersEvent;

    fn initial_state(&self) -> TransfersState {
        TransfersState::Initial
    }

    fn reduce(&self, state: TransfersState, event: TransfersEvent) -> TransfersState {
        match (state, event) {
            (TransfersState::Initial, TransfersEvent::Enable(wallet)) => {
                TransfersState::Ready(TransfersContext::new(wallet))
            },
            (TransfersState::Ready(context) | TransfersState::Sent(context), TransfersEvent::SendEth) => {
                let pending = self.transfer_from(&context.wallet);
                TransfersState::Sending(context.with_pending(pending))
            },
            (TransfersState::Sending(context), TransfersEvent::TransactionSent { hash }) => {
                TransfersState::Sent(context.with_new_hash(hash))
            },
            (state, _) => state,
        }
    }
}

/// Submits the pending transfer while `Sending`
#[must_use]
pub fn transfers_request(chain: Arc<dyn TokenTransfer>) -> Request<TransfersState, TransfersEvent> {
    Request::when(|state: &TransfersState| match state {
        TransfersState::Sending(context) => context.pending.map(|pending| (pending, context.wallet)),
        _ => None,
    })
    .then_async(move |(pending, wallet)| {
        let chain = Arc::clone(&chain);
        async move {
            let hash = chain.execute(pending, wallet).await.unwrap_or_else(|error| {
                tracing::warn!(error = %error, to = %pending.to, "Transfer failed");
                FAILED_HASH.to_string()
            });
            Some(TransfersEvent::TransactionSent { hash })
        }
    })
}

/// What the transfer panel shows
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    /// The send button is enabled
    Ready,
    /// A transfer is in flight
    Sending {
        /// Amount being sent
        amount: Wei,
    },
    /// The last transfer went out
    Sent {
        /// Its hash, or [`FAILED_HASH`]
        hash: String,
        /// Transfers submitted so far
        total: usize,
    },
}

/// Projects transfer states onto the panel; nothing before a wallet exists
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferStatusProjector;

impl ActionProjector<TransfersState> for TransferStatusProjector {
    type Action = TransferStatus;

    fn transform(&self, state: &TransfersState) -> Option<TransferStatus> {
        match state {
            TransfersState::Initial => None,
            TransfersState::Ready(_) => Some(TransferStatus::Ready),
            TransfersState::Sending(context) => Some(TransferStatus::Sending {
                amount: context.pending.map_or(Wei::ZERO, |pending| pending.amount),
            }),
            TransfersState::Sent(context) => Some(TransferStatus::Sent {
                hash: context.hashes.last().cloned().unwrap_or_default(),
                total: context.hashes.len(),
            }),
        }
    }
}
