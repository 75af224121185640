//! State machine for the single in-flight transaction.
//!
//! ```text
//!   none ──► pending ──► success
//!     ▲         │    └─► failure
//!     │         ▼            │
//!     └──── (reset) ◄────────┘
//! ```
//!
//! Terminal states may also go straight back to `pending` when a confirmation
//! push for another transaction arrives.

use crate::error::LifecycleError;
use crate::registry::ChainInfo;
use crate::transactions::intent::TransactionIntent;
use astra_core::TxState;
use tokio::sync::watch;

/// Observable lifecycle snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub state: TxState,
    pub raw_data: Option<TransactionIntent>,
    pub tx_hash: Option<String>,
}

fn is_allowed(from: TxState, to: TxState) -> bool {
    use TxState::*;
    matches!(
        (from, to),
        (None, Pending)
            | (Pending, Pending)
            | (Pending, Success)
            | (Pending, Failure)
            | (Success, Pending)
            | (Failure, Pending)
            | (_, None)
    )
}

pub struct TransactionLifecycleStore {
    state: watch::Sender<LifecycleSnapshot>,
}

impl Default for TransactionLifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLifecycleStore {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(LifecycleSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> TxState {
        self.state.borrow().state
    }

    pub fn raw_data(&self) -> Option<TransactionIntent> {
        self.state.borrow().raw_data.clone()
    }

    pub fn tx_hash(&self) -> Option<String> {
        self.state.borrow().tx_hash.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.state.subscribe()
    }

    /// Stage a new intent. Rejected while another transaction is pending.
    pub fn update_raw_data(&self, intent: TransactionIntent) -> Result<(), LifecycleError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| {
            if !s.state.accepts_new_intent() {
                result = Err(LifecycleError::Busy);
                return false;
            }
            tracing::debug!("Staged {} intent", intent.kind().label());
            *s = LifecycleSnapshot {
                state: TxState::None,
                raw_data: Some(intent),
                tx_hash: None,
            };
            true
        });
        result
    }

    /// Explicit transition, from the send flow or from a confirmation push.
    pub fn update_tx_state(&self, next: TxState) -> Result<(), LifecycleError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| {
            if !is_allowed(s.state, next) {
                result = Err(LifecycleError::InvalidTransition {
                    from: s.state,
                    to: next,
                });
                return false;
            }
            if s.state == next {
                return false;
            }
            tracing::info!("Transaction {} -> {}", s.state.label(), next.label());
            if s.state.is_terminal() && next == TxState::Pending {
                s.tx_hash = None;
            }
            s.state = next;
            true
        });
        result
    }

    pub fn update_tx_hash(&self, hash: &str) {
        let hash = hash.to_string();
        self.state.send_modify(|s| s.tx_hash = Some(hash));
    }

    /// Mark the staged `intent` as pending.
    pub fn begin(&self, intent: &TransactionIntent) -> Result<(), LifecycleError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| {
            match &s.raw_data {
                None => result = Err(LifecycleError::NothingStaged),
                Some(staged) if staged != intent => result = Err(LifecycleError::Superseded),
                Some(_) if s.state != TxState::None => {
                    result = Err(LifecycleError::InvalidTransition {
                        from: s.state,
                        to: TxState::Pending,
                    })
                }
                Some(_) => {}
            }
            if result.is_err() {
                return false;
            }
            tracing::info!("Transaction {} -> {}", s.state.label(), TxState::Pending.label());
            s.state = TxState::Pending;
            s.tx_hash = None;
            true
        });
        result
    }

    fn owned_by(s: &LifecycleSnapshot, intent: &TransactionIntent) -> bool {
        s.state == TxState::Pending && s.raw_data.as_ref() == Some(intent)
    }

    /// Attach the broadcast hash if `intent` is still the pending transaction.
    pub fn attach_tx_hash(&self, intent: &TransactionIntent, hash: &str) -> bool {
        self.state.send_if_modified(|s| {
            if !Self::owned_by(s, intent) {
                tracing::debug!("Hash {} arrived for an abandoned transaction", hash);
                return false;
            }
            s.tx_hash = Some(hash.to_string());
            true
        })
    }

    /// Move the pending `intent` to a terminal state.
    ///
    /// A no-op once the transaction was abandoned or replaced; the send
    /// itself still completes.
    pub fn settle(&self, intent: &TransactionIntent, outcome: TxState) -> bool {
        debug_assert!(outcome.is_terminal());
        self.state.send_if_modified(|s| {
            if !Self::owned_by(s, intent) {
                tracing::debug!(
                    "Ignoring late {} for an abandoned transaction",
                    outcome.label()
                );
                return false;
            }
            tracing::info!("Transaction {} -> {}", s.state.label(), outcome.label());
            s.state = outcome;
            true
        })
    }

    /// Drop `intent` if it is still staged or pending. Leaves a newer intent
    /// or a terminal result alone.
    pub fn discard(&self, intent: &TransactionIntent) -> bool {
        self.state.send_if_modified(|s| {
            if s.state.is_terminal() || s.raw_data.as_ref() != Some(intent) {
                return false;
            }
            *s = LifecycleSnapshot::default();
            true
        })
    }

    /// The consuming screen went away before a terminal state.
    ///
    /// Returns whether anything was discarded. Terminal states are kept so the
    /// result can still be shown.
    pub fn reject_transaction(&self) -> bool {
        self.state.send_if_modified(|s| {
            if s.state.is_terminal() || (s.state == TxState::None && s.raw_data.is_none()) {
                return false;
            }
            tracing::debug!("Transaction abandoned in state {}", s.state.label());
            *s = LifecycleSnapshot::default();
            true
        })
    }

    /// Back to idle, dropping intent and hash.
    pub fn reset(&self) {
        self.state.send_if_modified(|s| {
            let changed = *s != LifecycleSnapshot::default();
            *s = LifecycleSnapshot::default();
            changed
        });
    }

    /// Block-explorer link for the attached hash.
    pub fn explorer_url(&self, chain: &ChainInfo) -> Option<String> {
        self.tx_hash().map(|hash| chain.explorer_tx_url(&hash))
    }
}
