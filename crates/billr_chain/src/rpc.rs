//! JSON-RPC access to the ledger node.
//!
//! [`LedgerRpc`] is the seam the contract client talks through; [`RpcClient`]
//! is the HTTP implementation. Tests substitute their own implementations.

use std::time::Duration;

use async_trait::async_trait;
use billr_core::BillrConfig;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::contract_value::ContractValue;
use crate::error::{ChainError, Result};
use crate::strkey;
use crate::xdr::{XdrReader, XdrWriter, from_base64, to_base64};

/// Identifies this client to the node operator.
pub const CLIENT_NAME_HEADER: &str = "X-Client-Name";
pub const CLIENT_NAME: &str = "billr-invoice-app";

const LEDGER_ENTRY_ACCOUNT: u32 = 0;
const KEY_TYPE_ED25519: u32 = 0;

/// Sequence and native balance of a ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub sequence: i64,
    pub balance: i64,
}

/// One simulated host-function invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedCall {
    /// Base64 XDR of the return value.
    pub xdr: String,
    /// Base64 XDR authorization entries the invocation needs.
    pub auth: Vec<String>,
}

impl SimulatedCall {
    pub fn return_value(&self) -> Result<ContractValue> {
        ContractValue::from_xdr_base64(&self.xdr)
    }
}

/// Result of `simulateTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationResult {
    pub error: Option<String>,
    /// Present when archived ledger state must be restored first.
    pub restore_preamble: Option<Value>,
    pub results: Vec<SimulatedCall>,
    pub transaction_data: Option<String>,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    pub min_resource_fee: u64,
    pub latest_ledger: u32,
}

/// Result of `sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub hash: String,
    /// `PENDING`, `DUPLICATE`, `TRY_AGAIN_LATER` or `ERROR`.
    pub status: String,
    pub error_result_xdr: Option<String>,
}

impl SendTransactionResponse {
    /// The node took the transaction (or already had it).
    pub fn is_accepted(&self) -> bool {
        matches!(self.status.as_str(), "PENDING" | "DUPLICATE" | "SUCCESS")
    }
}

/// The node answers fee fields as decimal strings.
fn u64_from_string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().ok_or_else(|| de::Error::custom("expected unsigned integer")),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        Value::Null => Ok(0),
        other => Err(de::Error::custom(format!("unexpected value {other}"))),
    }
}

/// Node operations the invoice client depends on.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Current sequence number and balance of `address`.
    async fn get_account(&self, address: &str) -> Result<AccountInfo>;

    /// Dry-run a base64 transaction envelope.
    async fn simulate_transaction(&self, envelope_xdr: &str) -> Result<SimulationResult>;

    /// Submit a signed base64 envelope. One attempt; retry lives in the caller.
    async fn send_transaction(&self, signed_envelope_xdr: &str) -> Result<SendTransactionResponse>;

    /// Sequence number of the most recent closed ledger.
    async fn get_latest_ledger(&self) -> Result<u32>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct LedgerEntriesResult {
    #[serde(default)]
    entries: Vec<LedgerEntryResult>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntryResult {
    xdr: String,
}

#[derive(Debug, Deserialize)]
struct LatestLedgerResult {
    sequence: u32,
}

/// HTTP JSON-RPC client for a ledger node.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Client for the configured network or custom endpoint.
    pub fn from_config(config: &BillrConfig) -> Result<Self> {
        Self::new(config.rpc_url(), Duration::from_secs(config.http_timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        };
        debug!(method, url = %self.url, "JSON-RPC request");

        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(CLIENT_NAME_HEADER, CLIENT_NAME)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChainError::Transport(format!("HTTP {status}: {text}")));
        }

        let body: JsonRpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("invalid {method} response: {e}")))?;

        if let Some(err) = body.error {
            return Err(ChainError::Rpc(format!("{} (code {})", err.message, err.code)));
        }
        body.result
            .ok_or_else(|| ChainError::Rpc(format!("{method} returned no result")))
    }
}

/// Base64 `LedgerKey` for an account.
fn account_ledger_key(address: &str) -> Result<String> {
    let key = strkey::decode_account(address)
        .ok_or_else(|| ChainError::InvalidInput(format!("invalid account address: {address}")))?;
    let mut w = XdrWriter::new();
    w.u32(LEDGER_ENTRY_ACCOUNT).u32(KEY_TYPE_ED25519).fixed(&key);
    Ok(to_base64(&w.into_bytes()))
}

/// Leading fields of an account `LedgerEntryData`.
fn parse_account_entry(xdr: &str) -> Result<AccountInfo> {
    let bytes = from_base64(xdr)?;
    let mut r = XdrReader::new(&bytes);
    let entry_type = r.u32()?;
    if entry_type != LEDGER_ENTRY_ACCOUNT {
        return Err(ChainError::Xdr(format!("expected account entry, got type {entry_type}")));
    }
    let key_type = r.u32()?;
    if key_type != KEY_TYPE_ED25519 {
        return Err(ChainError::Xdr(format!("unsupported key type {key_type}")));
    }
    let account_id = strkey::encode_account(&r.fixed::<32>()?);
    let balance = r.i64()?;
    let sequence = r.i64()?;
    Ok(AccountInfo {
        account_id,
        sequence,
        balance,
    })
}

#[async_trait]
impl LedgerRpc for RpcClient {
    async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        let key = account_ledger_key(address)?;
        let result: LedgerEntriesResult = self.call("getLedgerEntries", json!({ "keys": [key] })).await?;
        let entry = result
            .entries
            .first()
            .ok_or_else(|| ChainError::Rpc(format!("Account not found: {address}")))?;
        parse_account_entry(&entry.xdr)
    }

    async fn simulate_transaction(&self, envelope_xdr: &str) -> Result<SimulationResult> {
        self.call("simulateTransaction", json!({ "transaction": envelope_xdr }))
            .await
    }

    async fn send_transaction(&self, signed_envelope_xdr: &str) -> Result<SendTransactionResponse> {
        self.call("sendTransaction", json!({ "transaction": signed_envelope_xdr }))
            .await
    }

    async fn get_latest_ledger(&self) -> Result<u32> {
        let result: LatestLedgerResult = self.call("getLatestLedger", json!({})).await?;
        Ok(result.sequence)
    }
}
