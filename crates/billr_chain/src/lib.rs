//! Contract client for on-chain invoicing: wire codec, node RPC, the typed
//! contract surface, wallet signing and submission.

pub mod amount;
pub mod client;
pub mod contract_value;
pub mod error;
pub mod invoice;
pub mod normalize;
pub mod retry;
pub mod rpc;
pub mod strkey;
pub mod submit;
pub mod transaction;
pub mod wallet;
pub mod workflow;
pub mod xdr;

#[cfg(test)]
mod test_support;

// Re-export primary types for convenient access.
pub use amount::{USDC_DECIMALS, from_smallest_unit, to_smallest_unit};
pub use client::{InvoiceClient, PaymentCapability};
pub use contract_value::ContractValue;
pub use error::{ChainError, Result};
pub use invoice::{Invoice, InvoiceMap, InvoiceStatus, PendingInvoices};
pub use retry::{Exhausted, RetryPolicy, retry};
pub use rpc::{AccountInfo, LedgerRpc, RpcClient, SendTransactionResponse, SimulationResult};
pub use submit::{SubmitReceipt, submit};
pub use transaction::{ContractCall, PendingTransaction, TransactionDraft};
pub use wallet::{
    SignOptions, WalletBridge, WalletError, connect_wallet, disconnect_wallet, restore_session,
    sign_pending,
};
pub use workflow::{ActionOutcome, ActionState, execute_action};
