//! Per-action driver: build → sign → submit, tracked as a small state machine.
//!
//! The state lives only for one call; nothing is persisted. The invoice's
//! own lifecycle is the contract's business, so a `Confirmed` action means
//! the node accepted the transaction, not that the invoice changed.

use std::future::Future;

use billr_core::ContractError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::InvoiceClient;
use crate::error::{ChainError, Result};
use crate::rpc::LedgerRpc;
use crate::submit::submit;
use crate::transaction::PendingTransaction;
use crate::wallet::{WalletBridge, sign_pending};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a user action is in its build/sign/submit chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Idle,
    Building,
    Simulated,
    Signing,
    Submitting,
    Confirmed,
    Failed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Forward-only transitions; any live state may fail.
    pub fn can_transition_to(&self, next: ActionState) -> bool {
        use ActionState::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Simulated)
                | (Simulated, Signing)
                | (Signing, Submitting)
                | (Submitting, Confirmed)
                | (Building | Simulated | Signing | Submitting, Failed)
        )
    }
}

/// Final report of one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub id: String,
    pub action: String,
    pub state: ActionState,
    /// Every state visited, starting at `Idle`.
    pub history: Vec<ActionState>,
    /// Locally computed hash once simulated; the node's hash once submitted.
    pub hash: Option<String>,
    pub error: Option<ContractError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn is_confirmed(&self) -> bool {
        self.state == ActionState::Confirmed
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

struct ActionTracker {
    id: String,
    action: String,
    state: ActionState,
    history: Vec<ActionState>,
    hash: Option<String>,
    started_at: DateTime<Utc>,
}

impl ActionTracker {
    fn new(action: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            state: ActionState::Idle,
            history: vec![ActionState::Idle],
            hash: None,
            started_at: Utc::now(),
        }
    }

    fn advance(&mut self, next: ActionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {next:?}",
            self.state
        );
        debug!(id = %self.id, action = %self.action, from = ?self.state, to = ?next, "Action state");
        self.state = next;
        self.history.push(next);
    }

    fn finish(mut self, error: Option<ChainError>) -> ActionOutcome {
        let error = error.map(|e| {
            self.advance(ActionState::Failed);
            let normalized = e.to_contract_error(&self.action);
            warn!(id = %self.id, action = %self.action, code = normalized.code, error = %e, "Action failed");
            normalized
        });
        if error.is_none() {
            self.advance(ActionState::Confirmed);
            info!(id = %self.id, action = %self.action, hash = ?self.hash, "Action confirmed");
        }
        ActionOutcome {
            id: self.id,
            action: self.action,
            state: self.state,
            history: self.history,
            hash: self.hash,
            error,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Drive one user action to completion.
///
/// `build` is the (not yet polled) future producing the assembled
/// transaction, e.g. `client.send_invoice(creator, id)`. It is signed by
/// `wallet` for `wallet_address` and submitted with the client's retry
/// policy. Failures at any step end in [`ActionState::Failed`] with a
/// user-facing error labelled by `action` (e.g. `"send invoice"`).
pub async fn execute_action<R, F>(
    client: &InvoiceClient<R>,
    wallet: &dyn WalletBridge,
    wallet_address: &str,
    action: &str,
    build: F,
) -> ActionOutcome
where
    R: LedgerRpc,
    F: Future<Output = Result<PendingTransaction>>,
{
    let mut tracker = ActionTracker::new(action);
    let result = run(&mut tracker, client, wallet, wallet_address, build).await;
    tracker.finish(result.err())
}

async fn run<R, F>(
    tracker: &mut ActionTracker,
    client: &InvoiceClient<R>,
    wallet: &dyn WalletBridge,
    wallet_address: &str,
    build: F,
) -> Result<()>
where
    R: LedgerRpc,
    F: Future<Output = Result<PendingTransaction>>,
{
    tracker.advance(ActionState::Building);
    let pending = build.await?;
    tracker.hash = Some(pending.hash.clone());
    tracker.advance(ActionState::Simulated);

    tracker.advance(ActionState::Signing);
    let signed = sign_pending(wallet, &pending, wallet_address, client.network_passphrase()).await?;

    tracker.advance(ActionState::Submitting);
    let receipt = submit(client.rpc(), &signed, client.retry_policy()).await?;
    tracker.hash = Some(receipt.hash);
    Ok(())
}
