//! In-memory ledger node for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::contract_value::ContractValue;
use crate::error::{ChainError, Result};
use crate::rpc::{AccountInfo, LedgerRpc, SendTransactionResponse, SimulatedCall, SimulationResult};
use crate::xdr::{XdrReader, from_base64, to_base64};

pub(crate) const PAYER: &str = "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ";
pub(crate) const CREATOR: &str = "GAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB7JZX";

/// One invocation seen in a simulated envelope.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SeenCall {
    pub contract_id: String,
    pub function: String,
    pub args: Vec<ContractValue>,
}

/// Node double: simulations are answered per function name, submissions
/// from a script, and every call is recorded.
pub(crate) struct FakeLedger {
    pub sequence: i64,
    pub latest_ledger: u32,
    pub simulations: Mutex<HashMap<String, SimulationResult>>,
    pub send_script: Mutex<VecDeque<Result<SendTransactionResponse>>>,
    pub simulated: Mutex<Vec<Vec<SeenCall>>>,
    pub sent: Mutex<Vec<String>>,
    pub account_lookups: Mutex<Vec<String>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            sequence: 100,
            latest_ledger: 5_000,
            simulations: Mutex::default(),
            send_script: Mutex::default(),
            simulated: Mutex::default(),
            sent: Mutex::default(),
            account_lookups: Mutex::default(),
        }
    }
}

impl FakeLedger {
    /// Successful simulation of `function` returning `value`.
    pub fn returns(self, function: &str, value: ContractValue) -> Self {
        let simulation = SimulationResult {
            results: vec![SimulatedCall {
                xdr: to_base64(&value.to_xdr().unwrap()),
                auth: vec![],
            }],
            transaction_data: Some(to_base64(&[0u8; 4])),
            min_resource_fee: 1_000,
            latest_ledger: self.latest_ledger,
            ..Default::default()
        };
        self.simulation(function, simulation)
    }

    pub fn simulation(self, function: &str, simulation: SimulationResult) -> Self {
        self.simulations
            .lock()
            .unwrap()
            .insert(function.to_string(), simulation);
        self
    }

    pub fn send_results(self, results: Vec<Result<SendTransactionResponse>>) -> Self {
        *self.send_script.lock().unwrap() = results.into();
        self
    }

    /// Function names of every simulated envelope, operations joined by `+`.
    pub fn simulated_functions(&self) -> Vec<String> {
        self.simulated
            .lock()
            .unwrap()
            .iter()
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| c.function.as_str())
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect()
    }
}

pub(crate) fn accepted(hash: &str) -> SendTransactionResponse {
    SendTransactionResponse {
        hash: hash.to_string(),
        status: "PENDING".to_string(),
        error_result_xdr: None,
    }
}

/// Pull the contract calls out of an unassembled envelope.
fn decode_calls(envelope_xdr: &str) -> Result<Vec<SeenCall>> {
    let bytes = from_base64(envelope_xdr)?;
    let mut r = XdrReader::new(&bytes);
    r.u32()?; // envelope type
    r.u32()?;
    r.fixed::<32>()?;
    r.u32()?; // fee
    r.i64()?;
    r.u32()?; // preconditions
    r.u64()?;
    r.u64()?;
    r.u32()?; // memo
    let op_count = r.u32()?;
    let mut calls = Vec::new();
    for _ in 0..op_count {
        r.bool()?;
        r.u32()?;
        r.u32()?;
        let contract_id = match r.u32()? {
            0 => {
                r.u32()?;
                crate::strkey::encode_account(&r.fixed::<32>()?)
            }
            _ => crate::strkey::encode_contract(&r.fixed::<32>()?),
        };
        let function = r.string()?;
        let arg_count = r.u32()?;
        let mut args = Vec::new();
        for _ in 0..arg_count {
            args.push(ContractValue::read_from(&mut r)?);
        }
        let auth_count = r.u32()?;
        if auth_count != 0 {
            return Err(ChainError::Xdr("fake ledger only reads unassembled envelopes".into()));
        }
        calls.push(SeenCall {
            contract_id,
            function,
            args,
        });
    }
    Ok(calls)
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        self.account_lookups.lock().unwrap().push(address.to_string());
        Ok(AccountInfo {
            account_id: address.to_string(),
            sequence: self.sequence,
            balance: 0,
        })
    }

    async fn simulate_transaction(&self, envelope_xdr: &str) -> Result<SimulationResult> {
        let calls = decode_calls(envelope_xdr)?;
        let key = calls
            .iter()
            .map(|c| c.function.as_str())
            .collect::<Vec<_>>()
            .join("+");
        self.simulated.lock().unwrap().push(calls);
        self.simulations
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ChainError::Rpc(format!("no simulation scripted for {key}")))
    }

    async fn send_transaction(&self, signed_envelope_xdr: &str) -> Result<SendTransactionResponse> {
        self.sent.lock().unwrap().push(signed_envelope_xdr.to_string());
        self.send_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(accepted("fakehash")))
    }

    async fn get_latest_ledger(&self) -> Result<u32> {
        Ok(self.latest_ledger)
    }
}
