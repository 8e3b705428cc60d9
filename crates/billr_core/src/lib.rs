pub mod config;
pub mod error_handler;
pub mod logging;
pub mod session;

pub use config::{BillrConfig, Network, validate_url};
pub use error_handler::{
    ContractError, KnownContractError, classify_contract_error, match_contract_error,
};
pub use session::{SessionStore, WalletSession};
