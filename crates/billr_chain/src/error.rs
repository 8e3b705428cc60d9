//! Chain client error types.

use billr_core::{ContractError, classify_contract_error};

/// Errors produced while building, signing, submitting or reading contract
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Local validation failed; nothing was sent to the network.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An amount could not be converted to the smallest unit.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The node's dry run of the transaction reported an error.
    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    /// The simulation asked for a ledger restore step this client does not run.
    #[error("Contract state restoration required")]
    RestorationRequired,

    /// The wallet refused to sign or could not be reached.
    #[error("Transaction signing failed: {0}")]
    SigningFailed(String),

    /// Submission kept failing after every retry.
    #[error("Transaction submission failed after {attempts} attempts: {last_error}")]
    SubmissionFailed { attempts: u32, last_error: String },

    /// Payer balance is below the invoice amount (both in smallest units).
    #[error(
        "Insufficient USDC. Need {}, have {}",
        crate::amount::from_smallest_unit(.required),
        crate::amount::from_smallest_unit(.available)
    )]
    InsufficientFunds { required: String, available: String },

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// HTTP or connection failure talking to the node.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Wire data could not be encoded or decoded.
    #[error("XDR error: {0}")]
    Xdr(String),

    /// The persisted wallet session could not be read or written.
    #[error("Session storage error: {0}")]
    Session(String),
}

impl ChainError {
    /// Numeric code reported when the failure does not match a known
    /// contract error.
    pub fn fallback_code(&self) -> u32 {
        match self {
            Self::InvalidInput(_) | Self::InvalidAmount(_) => 400,
            Self::InvoiceNotFound(_) => 404,
            Self::InsufficientFunds { .. } => 402,
            Self::SigningFailed(_) => 401,
            Self::RestorationRequired => 409,
            Self::SimulationFailed(_) => 422,
            Self::SubmissionFailed { .. } | Self::Rpc(_) | Self::Transport(_) => 503,
            Self::Xdr(_) | Self::Session(_) => 500,
        }
    }

    /// Normalize into the user-facing [`ContractError`] for `operation`
    /// (e.g. `"create invoice"`).
    pub fn to_contract_error(&self, operation: &str) -> ContractError {
        match self {
            // The local messages are already user-readable.
            Self::InvalidInput(_)
            | Self::InvalidAmount(_)
            | Self::InsufficientFunds { .. }
            | Self::RestorationRequired => ContractError {
                code: self.fallback_code(),
                message: self.to_string(),
                details: None,
            },
            other => classify_contract_error(operation, &other.to_string(), other.fallback_code()),
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Transport(err.to_string())
    }
}

pub type Result<T, E = ChainError> = std::result::Result<T, E>;
