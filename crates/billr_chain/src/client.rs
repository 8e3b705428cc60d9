//! Typed client for the invoicing contract and its payment token.
//!
//! Writes validate locally, then build, simulate and assemble a transaction
//! that is returned unsigned. Reads simulate a call and normalize whatever
//! the contract returned.

use std::collections::HashMap;
use std::time::Duration;

use billr_core::BillrConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::amount::{parse_units, require_units, to_smallest_unit};
use crate::contract_value::ContractValue;
use crate::error::{ChainError, Result};
use crate::invoice::{Invoice, InvoiceMap, PendingInvoices};
use crate::normalize::{
    normalize_amount, normalize_invoice, normalize_invoice_list, normalize_invoice_map,
    normalize_optional_string, normalize_pending_invoices, normalize_string_list,
};
use crate::retry::RetryPolicy;
use crate::rpc::{LedgerRpc, RpcClient};
use crate::strkey;
use crate::transaction::{ContractCall, PendingTransaction, TransactionDraft};

/// Ledgers a token allowance stays valid for.
const APPROVAL_LEDGER_WINDOW: u32 = 100;

/// Whether a payer holds enough of the token for an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCapability {
    pub can_pay: bool,
    /// Smallest-unit strings.
    pub balance: String,
    pub required: String,
}

/// Contract client over any [`LedgerRpc`].
pub struct InvoiceClient<R> {
    rpc: R,
    contract_id: String,
    usdc_token_id: String,
    read_account: String,
    network_passphrase: String,
    write_fee: u32,
    read_fee: u32,
    tx_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl InvoiceClient<RpcClient> {
    /// Client talking HTTP JSON-RPC to the configured node.
    pub fn from_config(config: &BillrConfig) -> Result<Self> {
        Self::new(RpcClient::from_config(config)?, config)
    }
}

impl<R: LedgerRpc> InvoiceClient<R> {
    pub fn new(rpc: R, config: &BillrConfig) -> Result<Self> {
        if !strkey::is_valid_contract_id(&config.contract_id) {
            return Err(ChainError::InvalidInput(format!(
                "invalid invoice contract id: {}",
                config.contract_id
            )));
        }
        if !strkey::is_valid_contract_id(&config.usdc_token_id) {
            return Err(ChainError::InvalidInput(format!(
                "invalid token contract id: {}",
                config.usdc_token_id
            )));
        }
        if !strkey::is_valid_address(&config.read_account) {
            return Err(ChainError::InvalidInput(format!(
                "invalid read account: {}",
                config.read_account
            )));
        }

        Ok(Self {
            rpc,
            contract_id: config.contract_id.clone(),
            usdc_token_id: config.usdc_token_id.clone(),
            read_account: config.read_account.clone(),
            network_passphrase: config.network_passphrase().to_string(),
            write_fee: config.write_fee,
            read_fee: config.read_fee,
            tx_timeout: Duration::from_secs(config.tx_timeout_secs),
            retry_policy: RetryPolicy::from_config(config),
        })
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn usdc_token_id(&self) -> &str {
        &self.usdc_token_id
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    fn invoice_call(&self, function: &str, args: Vec<ContractValue>) -> ContractCall {
        ContractCall::new(&self.contract_id, function, args)
    }

    fn token_call(&self, function: &str, args: Vec<ContractValue>) -> ContractCall {
        ContractCall::new(&self.usdc_token_id, function, args)
    }

    fn max_time(&self) -> u64 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        now.saturating_add(self.tx_timeout.as_secs())
    }

    // -- Building -------------------------------------------------------------

    /// Build, simulate and assemble a single invoice-contract call.
    pub async fn build_and_simulate(
        &self,
        function: &str,
        args: Vec<ContractValue>,
        source: &str,
    ) -> Result<PendingTransaction> {
        self.build_and_simulate_calls(vec![self.invoice_call(function, args)], source)
            .await
    }

    /// Build one transaction carrying `calls` in order, simulate it and
    /// assemble it for signing.
    pub async fn build_and_simulate_calls(
        &self,
        calls: Vec<ContractCall>,
        source: &str,
    ) -> Result<PendingTransaction> {
        require_account("source", source)?;
        let functions: Vec<String> = calls.iter().map(|c| c.function.clone()).collect();

        let account = self.rpc.get_account(source).await?;
        let draft = calls.into_iter().fold(
            TransactionDraft::new(source, account.sequence, self.write_fee, self.max_time())?,
            TransactionDraft::with_call,
        );

        let envelope = draft.to_envelope_xdr()?;
        debug!(?functions, sequence = draft.sequence(), "Simulating transaction");
        let simulation = self.rpc.simulate_transaction(&envelope).await?;

        let assembled = draft.assemble(&simulation).inspect_err(|e| {
            warn!(?functions, error = %e, "Simulation rejected transaction");
        })?;
        let pending = PendingTransaction {
            envelope_xdr: assembled.to_envelope_xdr()?,
            hash: assembled.hash(&self.network_passphrase)?,
            simulation,
        };
        info!(
            ?functions,
            hash = %pending.hash,
            fee = assembled.fee(),
            "Transaction assembled"
        );
        Ok(pending)
    }

    /// Simulate a read-only call and return its tagged return value.
    async fn simulate_read(&self, call: ContractCall, viewer: Option<&str>) -> Result<Value> {
        let source = viewer
            .filter(|v| strkey::is_valid_address(v))
            .unwrap_or(self.read_account.as_str());
        let function = call.function.clone();

        // Reads are never submitted, so the sequence number is irrelevant.
        let draft = TransactionDraft::new(source, 0, self.read_fee, self.max_time())?.with_call(call);
        let simulation = self
            .rpc
            .simulate_transaction(&draft.to_envelope_xdr()?)
            .await?;
        if let Some(error) = simulation.error {
            debug!(function = %function, error = %error, "Read simulation failed");
            return Err(ChainError::SimulationFailed(error));
        }

        let value = simulation
            .results
            .first()
            .and_then(|r| match r.return_value() {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(function = %function, error = %e, "Undecodable return value");
                    None
                }
            })
            .and_then(|v| serde_json::to_value(v).ok())
            .unwrap_or(Value::Null);
        Ok(value)
    }

    // -- Invoice writes -------------------------------------------------------

    pub async fn initialize(&self, admin: &str, usdc_token: &str) -> Result<PendingTransaction> {
        let args = vec![require_account("admin", admin)?, require_contract("token", usdc_token)?];
        self.build_and_simulate("initialize", args, admin).await
    }

    pub async fn create_invoice(
        &self,
        creator: &str,
        invoice_id: &str,
        recipient: &str,
        amount_decimal: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PendingTransaction> {
        let args = vec![
            require_account("creator", creator)?,
            require_invoice_id(invoice_id)?,
            require_account("recipient", recipient)?,
            ContractValue::U64(amount_units(amount_decimal)?),
            ContractValue::string_map(metadata.clone()),
        ];
        info!(invoice_id, creator, recipient, "Creating invoice");
        self.build_and_simulate("create_invoice", args, creator).await
    }

    /// Creator moves a draft to Sent.
    pub async fn send_invoice(&self, creator: &str, invoice_id: &str) -> Result<PendingTransaction> {
        let args = vec![require_account("creator", creator)?, require_invoice_id(invoice_id)?];
        self.build_and_simulate("send_invoice", args, creator).await
    }

    /// Recipient acknowledges a sent invoice, optionally with a note.
    pub async fn acknowledge_invoice(
        &self,
        recipient: &str,
        invoice_id: &str,
        note: Option<&str>,
    ) -> Result<PendingTransaction> {
        let note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ContractValue::string);
        let args = vec![
            require_account("recipient", recipient)?,
            require_invoice_id(invoice_id)?,
            ContractValue::option(note),
        ];
        self.build_and_simulate("acknowledge_invoice", args, recipient)
            .await
    }

    /// Contract-side payment (the contract moves the funds itself).
    pub async fn pay_invoice(&self, recipient: &str, invoice_id: &str) -> Result<PendingTransaction> {
        let args = vec![require_account("recipient", recipient)?, require_invoice_id(invoice_id)?];
        self.build_and_simulate("pay_invoice", args, recipient).await
    }

    pub async fn cancel_invoice(&self, creator: &str, invoice_id: &str) -> Result<PendingTransaction> {
        let args = vec![require_account("creator", creator)?, require_invoice_id(invoice_id)?];
        self.build_and_simulate("cancel_invoice", args, creator).await
    }

    pub async fn update_metadata(
        &self,
        creator: &str,
        invoice_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PendingTransaction> {
        let args = vec![
            require_account("creator", creator)?,
            require_invoice_id(invoice_id)?,
            ContractValue::string_map(metadata.clone()),
        ];
        self.build_and_simulate("update_metadata", args, creator).await
    }

    /// Edit a draft. `None` leaves a field unchanged.
    pub async fn edit_invoice(
        &self,
        creator: &str,
        invoice_id: &str,
        recipient: Option<&str>,
        amount_decimal: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<PendingTransaction> {
        let recipient = recipient
            .map(|r| require_account("recipient", r))
            .transpose()?;
        let amount = amount_decimal
            .map(|a| amount_units(a).map(ContractValue::U64))
            .transpose()?;
        let metadata = metadata.map(|m| ContractValue::string_map(m.clone()));

        let args = vec![
            require_account("creator", creator)?,
            require_invoice_id(invoice_id)?,
            ContractValue::option(recipient),
            ContractValue::option(amount),
            ContractValue::option(metadata),
        ];
        self.build_and_simulate("edit_invoice", args, creator).await
    }

    pub async fn update_usdc_token(&self, admin: &str, new_token: &str) -> Result<PendingTransaction> {
        let args = vec![require_account("admin", admin)?, require_contract("token", new_token)?];
        self.build_and_simulate("update_usdc_token", args, admin).await
    }

    // -- Token writes ---------------------------------------------------------

    /// Allow the invoice contract to spend `amount_smallest` of the owner's
    /// tokens for the next 100 ledgers.
    pub async fn approve_usdc_spending(
        &self,
        owner: &str,
        amount_smallest: &str,
    ) -> Result<PendingTransaction> {
        let owner_value = require_account("owner", owner)?;
        let amount: i128 = amount_smallest
            .trim()
            .parse()
            .ok()
            .filter(|a| *a > 0)
            .ok_or_else(|| {
                ChainError::InvalidAmount(format!("amount must be greater than 0: {amount_smallest:?}"))
            })?;

        let expiration = self
            .rpc
            .get_latest_ledger()
            .await?
            .saturating_add(APPROVAL_LEDGER_WINDOW);
        let call = self.token_call(
            "approve",
            vec![
                owner_value,
                ContractValue::address(&self.contract_id)?,
                ContractValue::I128(amount),
                ContractValue::U32(expiration),
            ],
        );
        self.build_and_simulate_calls(vec![call], owner).await
    }

    // -- Reads ----------------------------------------------------------------

    pub async fn get_invoice(&self, invoice_id: &str, viewer: Option<&str>) -> Result<Option<Invoice>> {
        let call = self.invoice_call("get_invoice", vec![require_invoice_id(invoice_id)?]);
        let raw = self.simulate_read(call, viewer).await?;
        Ok(normalize_invoice(&raw))
    }

    /// Post-submit probe: does the contract know `invoice_id`? Failures read
    /// as `false`.
    pub async fn invoice_exists(&self, invoice_id: &str, viewer: Option<&str>) -> bool {
        match self.get_invoice(invoice_id, viewer).await {
            Ok(invoice) => invoice.is_some(),
            Err(e) => {
                debug!(invoice_id, error = %e, "Invoice existence check failed");
                false
            }
        }
    }

    pub async fn list_by_creator(&self, creator: &str) -> Result<Vec<String>> {
        let call = self.invoice_call("list_by_creator", vec![require_account("creator", creator)?]);
        Ok(normalize_string_list(&self.simulate_read(call, Some(creator)).await?))
    }

    pub async fn list_by_recipient(&self, recipient: &str) -> Result<Vec<String>> {
        let call = self.invoice_call("list_by_recipient", vec![require_account("recipient", recipient)?]);
        Ok(normalize_string_list(&self.simulate_read(call, Some(recipient)).await?))
    }

    pub async fn get_invoices_by_creator(&self, creator: &str) -> Result<Vec<Invoice>> {
        let call = self.invoice_call("get_invoices_by_creator", vec![require_account("creator", creator)?]);
        Ok(normalize_invoice_list(&self.simulate_read(call, Some(creator)).await?))
    }

    pub async fn get_invoices_by_recipient(&self, recipient: &str) -> Result<Vec<Invoice>> {
        let call = self.invoice_call(
            "get_invoices_by_recipient",
            vec![require_account("recipient", recipient)?],
        );
        Ok(normalize_invoice_list(&self.simulate_read(call, Some(recipient)).await?))
    }

    pub async fn get_all_invoices_for_address(&self, address: &str) -> Result<InvoiceMap> {
        let call = self.invoice_call(
            "get_all_invoices_for_address",
            vec![require_account("address", address)?],
        );
        Ok(normalize_invoice_map(&self.simulate_read(call, Some(address)).await?))
    }

    pub async fn get_pending_invoices(&self, address: &str) -> Result<PendingInvoices> {
        let call = self.invoice_call("get_pending_invoices", vec![require_account("address", address)?]);
        Ok(normalize_pending_invoices(&self.simulate_read(call, Some(address)).await?))
    }

    pub async fn get_usdc_token(&self, viewer: Option<&str>) -> Result<Option<String>> {
        let call = self.invoice_call("get_usdc_token", vec![]);
        Ok(normalize_optional_string(&self.simulate_read(call, viewer).await?))
    }

    /// Token balance of `address` in the smallest unit, `"0"` when absent.
    pub async fn usdc_balance(&self, address: &str) -> Result<String> {
        let call = self.token_call("balance", vec![require_account("address", address)?]);
        Ok(normalize_amount(&self.simulate_read(call, Some(address)).await?))
    }

    pub async fn check_payment_capability(
        &self,
        payer: &str,
        amount_decimal: &str,
    ) -> Result<PaymentCapability> {
        let required = to_smallest_unit(amount_decimal)?;
        let balance = self.usdc_balance(payer).await?;
        Ok(PaymentCapability {
            can_pay: parse_units(&balance) >= parse_units(&required),
            balance,
            required,
        })
    }

    // -- Composite ------------------------------------------------------------

    /// Transfer the invoice amount to its creator and mark it paid, in one
    /// transaction. The amount must be a positive smallest-unit integer and
    /// the balance must cover it before anything is built.
    pub async fn pay_invoice_with_transfer(
        &self,
        payer: &str,
        invoice_id: &str,
        known_invoice: Option<Invoice>,
    ) -> Result<PendingTransaction> {
        let payer_value = require_account("payer", payer)?;
        let id_value = require_invoice_id(invoice_id)?;

        let invoice = match known_invoice {
            Some(invoice) => invoice,
            None => self
                .get_invoice(invoice_id, Some(payer))
                .await?
                .ok_or_else(|| ChainError::InvoiceNotFound(invoice_id.to_string()))?,
        };

        let required = require_units(&invoice.amount)?;
        let balance = self.usdc_balance(payer).await?;
        if parse_units(&balance) < required {
            warn!(invoice_id, payer, %balance, required = %invoice.amount, "Insufficient balance for payment");
            return Err(ChainError::InsufficientFunds {
                required: required.to_string(),
                available: balance,
            });
        }
        let creator = require_account("creator", &invoice.creator)?;

        let calls = vec![
            self.token_call(
                "transfer",
                vec![payer_value.clone(), creator, ContractValue::I128(required)],
            ),
            self.invoice_call("pay_invoice", vec![payer_value, id_value]),
        ];
        info!(invoice_id, payer, amount = %invoice.amount, "Building payment with transfer");
        self.build_and_simulate_calls(calls, payer).await
    }
}

fn require_account(label: &str, address: &str) -> Result<ContractValue> {
    if strkey::is_valid_address(address) {
        Ok(ContractValue::Address(address.to_string()))
    } else {
        Err(ChainError::InvalidInput(format!("Invalid {label} address: {address}")))
    }
}

fn require_contract(label: &str, contract_id: &str) -> Result<ContractValue> {
    if strkey::is_valid_contract_id(contract_id) {
        Ok(ContractValue::Address(contract_id.to_string()))
    } else {
        Err(ChainError::InvalidInput(format!("Invalid {label} contract id: {contract_id}")))
    }
}

fn require_invoice_id(invoice_id: &str) -> Result<ContractValue> {
    if strkey::is_valid_invoice_id(invoice_id) {
        Ok(ContractValue::string(invoice_id))
    } else {
        Err(ChainError::InvalidInput(format!(
            "Invoice ID must be 1-{} characters",
            strkey::MAX_INVOICE_ID_LEN
        )))
    }
}

fn amount_units(amount_decimal: &str) -> Result<u64> {
    to_smallest_unit(amount_decimal)?
        .parse()
        .map_err(|_| ChainError::InvalidAmount(format!("amount too large: {amount_decimal:?}")))
}
