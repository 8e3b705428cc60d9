//! Contract-invocation transactions: build, assemble from a simulation,
//! hash, and encode as a base64 envelope.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contract_value::{ContractValue, write_address};
use crate::error::{ChainError, Result};
use crate::rpc::SimulationResult;
use crate::strkey;
use crate::xdr::{XdrWriter, from_base64, to_base64};

const KEY_TYPE_ED25519: u32 = 0;
const PRECOND_TIME: u32 = 1;
const MEMO_NONE: u32 = 0;
const OP_INVOKE_HOST_FUNCTION: u32 = 24;
const HOST_FUNCTION_INVOKE_CONTRACT: u32 = 0;
const ENVELOPE_TYPE_TX: u32 = 2;

/// One contract function call with positional, type-tagged arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract_id: String,
    pub function: String,
    pub args: Vec<ContractValue>,
}

impl ContractCall {
    pub fn new(contract_id: impl Into<String>, function: impl Into<String>, args: Vec<ContractValue>) -> Self {
        Self {
            contract_id: contract_id.into(),
            function: function.into(),
            args,
        }
    }
}

#[derive(Debug, Clone)]
struct Operation {
    call: ContractCall,
    /// Encoded authorization entries from the simulation.
    auth: Vec<Vec<u8>>,
}

/// Unsigned transaction under construction.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    source_key: [u8; 32],
    fee: u32,
    sequence: i64,
    min_time: u64,
    max_time: u64,
    operations: Vec<Operation>,
    soroban_data: Option<Vec<u8>>,
}

impl TransactionDraft {
    /// Start a transaction for `source`, whose current sequence number is
    /// `account_sequence`. Valid until `max_time` (unix seconds).
    pub fn new(source: &str, account_sequence: i64, fee: u32, max_time: u64) -> Result<Self> {
        let source_key = strkey::decode_account(source)
            .ok_or_else(|| ChainError::InvalidInput(format!("invalid source account: {source}")))?;
        let sequence = account_sequence
            .checked_add(1)
            .ok_or_else(|| ChainError::InvalidInput("account sequence overflow".into()))?;
        Ok(Self {
            source_key,
            fee,
            sequence,
            min_time: 0,
            max_time,
            operations: Vec::new(),
            soroban_data: None,
        })
    }

    pub fn with_call(mut self, call: ContractCall) -> Self {
        self.operations.push(Operation {
            call,
            auth: Vec::new(),
        });
        self
    }

    pub fn fee(&self) -> u32 {
        self.fee
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Apply a successful simulation: raise the fee by the resource fee,
    /// attach the resource footprint and each operation's auth entries.
    pub fn assemble(mut self, simulation: &SimulationResult) -> Result<Self> {
        if let Some(error) = &simulation.error {
            return Err(ChainError::SimulationFailed(error.clone()));
        }
        if simulation.restore_preamble.is_some() {
            return Err(ChainError::RestorationRequired);
        }

        let resource_fee = u32::try_from(simulation.min_resource_fee)
            .map_err(|_| ChainError::SimulationFailed("resource fee out of range".into()))?;
        self.fee = self
            .fee
            .checked_add(resource_fee)
            .ok_or_else(|| ChainError::SimulationFailed("total fee out of range".into()))?;

        let data = simulation
            .transaction_data
            .as_deref()
            .ok_or_else(|| ChainError::SimulationFailed("missing transaction data".into()))?;
        self.soroban_data = Some(from_base64(data)?);

        for (op, result) in self.operations.iter_mut().zip(&simulation.results) {
            op.auth = result
                .auth
                .iter()
                .map(|entry| from_base64(entry))
                .collect::<Result<_>>()?;
        }
        Ok(self)
    }

    fn write_transaction(&self, w: &mut XdrWriter) -> Result<()> {
        w.u32(KEY_TYPE_ED25519).fixed(&self.source_key);
        w.u32(self.fee).i64(self.sequence);
        w.u32(PRECOND_TIME).u64(self.min_time).u64(self.max_time);
        w.u32(MEMO_NONE);

        w.u32(self.operations.len() as u32);
        for op in &self.operations {
            // No per-operation source account.
            w.bool(false);
            w.u32(OP_INVOKE_HOST_FUNCTION);
            w.u32(HOST_FUNCTION_INVOKE_CONTRACT);
            write_address(w, &op.call.contract_id)?;
            w.string(&op.call.function);
            w.u32(op.call.args.len() as u32);
            for arg in &op.call.args {
                arg.write_xdr(w)?;
            }
            w.u32(op.auth.len() as u32);
            for entry in &op.auth {
                w.raw(entry);
            }
        }

        match &self.soroban_data {
            Some(data) => {
                w.u32(1).raw(data);
            }
            None => {
                w.u32(0);
            }
        }
        Ok(())
    }

    /// Base64 `TransactionEnvelope` with no signatures.
    pub fn to_envelope_xdr(&self) -> Result<String> {
        let mut w = XdrWriter::new();
        w.u32(ENVELOPE_TYPE_TX);
        self.write_transaction(&mut w)?;
        w.u32(0);
        Ok(to_base64(&w.into_bytes()))
    }

    /// Hex transaction hash as the network computes it for `passphrase`.
    pub fn hash(&self, passphrase: &str) -> Result<String> {
        let mut w = XdrWriter::new();
        w.fixed(&Sha256::digest(passphrase.as_bytes()));
        w.u32(ENVELOPE_TYPE_TX);
        self.write_transaction(&mut w)?;
        Ok(hex::encode(Sha256::digest(w.into_bytes())))
    }
}

/// An assembled, unsigned transaction waiting for the wallet.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub envelope_xdr: String,
    pub hash: String,
    pub simulation: SimulationResult,
}

impl PendingTransaction {
    /// Return value of the first simulated call, as a tagged JSON value.
    /// `Null` when the simulation carried no decodable result.
    pub fn return_value(&self) -> serde_json::Value {
        self.simulation
            .results
            .first()
            .and_then(|r| r.return_value().ok())
            .and_then(|v| serde_json::to_value(v).ok())
            .unwrap_or(serde_json::Value::Null)
    }
}
