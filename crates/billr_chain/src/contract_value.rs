use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::error::{ChainError, Result};
use crate::strkey;
use crate::xdr::{XdrReader, XdrWriter, from_base64};

// ScVal discriminants.
const SCV_BOOL: u32 = 0;
const SCV_VOID: u32 = 1;
const SCV_ERROR: u32 = 2;
const SCV_U32: u32 = 3;
const SCV_I32: u32 = 4;
const SCV_U64: u32 = 5;
const SCV_I64: u32 = 6;
const SCV_TIMEPOINT: u32 = 7;
const SCV_DURATION: u32 = 8;
const SCV_U128: u32 = 9;
const SCV_I128: u32 = 10;
const SCV_BYTES: u32 = 13;
const SCV_STRING: u32 = 14;
const SCV_SYMBOL: u32 = 15;
const SCV_VEC: u32 = 16;
const SCV_MAP: u32 = 17;
const SCV_ADDRESS: u32 = 18;

const SC_ADDRESS_ACCOUNT: u32 = 0;
const SC_ADDRESS_CONTRACT: u32 = 1;
const PUBLIC_KEY_ED25519: u32 = 0;

/// Nested values deeper than this are rejected on decode.
const MAX_DEPTH: usize = 32;

/// A contract argument or return value.
///
/// Serializes as a tagged wrapper, `{"type": "u64", "value": 5}`; the
/// `type` field is the discriminant the response normalizer matches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContractValue {
    Bool(bool),
    Void,
    Error { kind: u32, code: u32 },
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Timepoint(u64),
    Duration(u64),
    U128(#[serde(with = "decimal_string")] u128),
    I128(#[serde(with = "decimal_string")] i128),
    Bytes(Vec<u8>),
    String(String),
    Symbol(String),
    Vec(Vec<ContractValue>),
    Map(Vec<(ContractValue, ContractValue)>),
    Address(String),
    /// Any discriminant this client does not model.
    #[serde(other)]
    Unknown,
}

/// 128-bit integers travel as decimal strings in JSON.
mod decimal_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(d)?;
        text.parse().map_err(de::Error::custom)
    }
}

impl ContractValue {
    // -- Argument constructors ---------------------------------------------

    /// Account (`G…`) or contract (`C…`) address.
    pub fn address(address: &str) -> Result<Self> {
        if strkey::is_valid_address(address) || strkey::is_valid_contract_id(address) {
            Ok(Self::Address(address.to_string()))
        } else {
            Err(ChainError::InvalidInput(format!("invalid address: {address}")))
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn symbol(value: impl Into<String>) -> Self {
        Self::Symbol(value.into())
    }

    /// `Option<T>` arguments: `None` is encoded as void.
    pub fn option(value: Option<ContractValue>) -> Self {
        value.unwrap_or(Self::Void)
    }

    /// `Map<String, String>` with keys in the sorted order the host requires.
    pub fn string_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::Map(
            sorted
                .into_iter()
                .map(|(k, v)| (Self::String(k), Self::String(v)))
                .collect(),
        )
    }

    // -- XDR ----------------------------------------------------------------

    pub fn to_xdr(&self) -> Result<Vec<u8>> {
        let mut w = XdrWriter::new();
        self.write_xdr(&mut w)?;
        Ok(w.into_bytes())
    }

    pub fn write_xdr(&self, w: &mut XdrWriter) -> Result<()> {
        match self {
            Self::Bool(b) => {
                w.u32(SCV_BOOL).bool(*b);
            }
            Self::Void => {
                w.u32(SCV_VOID);
            }
            Self::Error { kind, code } => {
                w.u32(SCV_ERROR).u32(*kind).u32(*code);
            }
            Self::U32(v) => {
                w.u32(SCV_U32).u32(*v);
            }
            Self::I32(v) => {
                w.u32(SCV_I32).i32(*v);
            }
            Self::U64(v) => {
                w.u32(SCV_U64).u64(*v);
            }
            Self::I64(v) => {
                w.u32(SCV_I64).i64(*v);
            }
            Self::Timepoint(v) => {
                w.u32(SCV_TIMEPOINT).u64(*v);
            }
            Self::Duration(v) => {
                w.u32(SCV_DURATION).u64(*v);
            }
            Self::U128(v) => {
                w.u32(SCV_U128).u64((*v >> 64) as u64).u64(*v as u64);
            }
            Self::I128(v) => {
                w.u32(SCV_I128).i64((*v >> 64) as i64).u64(*v as u64);
            }
            Self::Bytes(bytes) => {
                w.u32(SCV_BYTES).var_opaque(bytes);
            }
            Self::String(s) => {
                w.u32(SCV_STRING).string(s);
            }
            Self::Symbol(s) => {
                w.u32(SCV_SYMBOL).string(s);
            }
            Self::Vec(items) => {
                w.u32(SCV_VEC).bool(true).u32(items.len() as u32);
                for item in items {
                    item.write_xdr(w)?;
                }
            }
            Self::Map(entries) => {
                w.u32(SCV_MAP).bool(true).u32(entries.len() as u32);
                for (k, v) in entries {
                    k.write_xdr(w)?;
                    v.write_xdr(w)?;
                }
            }
            Self::Address(address) => {
                w.u32(SCV_ADDRESS);
                write_sc_address(w, address)?;
            }
            Self::Unknown => {
                return Err(ChainError::Xdr("cannot encode an unknown value".into()));
            }
        }
        Ok(())
    }

    pub fn from_xdr(bytes: &[u8]) -> Result<Self> {
        let mut r = XdrReader::new(bytes);
        let value = Self::read_xdr(&mut r, 0)?;
        if !r.is_exhausted() {
            return Err(ChainError::Xdr(format!(
                "{} trailing bytes after value",
                r.remaining()
            )));
        }
        Ok(value)
    }

    pub fn from_xdr_base64(text: &str) -> Result<Self> {
        Self::from_xdr(&from_base64(text)?)
    }

    /// Decode one value from the middle of a larger structure.
    pub fn read_from(r: &mut XdrReader<'_>) -> Result<Self> {
        Self::read_xdr(r, 0)
    }

    fn read_xdr(r: &mut XdrReader<'_>, depth: usize) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(ChainError::Xdr("value nested too deeply".into()));
        }
        let value = match r.u32()? {
            SCV_BOOL => Self::Bool(r.bool()?),
            SCV_VOID => Self::Void,
            SCV_ERROR => {
                let kind = r.u32()?;
                let code = r.u32()?;
                Self::Error { kind, code }
            }
            SCV_U32 => Self::U32(r.u32()?),
            SCV_I32 => Self::I32(r.i32()?),
            SCV_U64 => Self::U64(r.u64()?),
            SCV_I64 => Self::I64(r.i64()?),
            SCV_TIMEPOINT => Self::Timepoint(r.u64()?),
            SCV_DURATION => Self::Duration(r.u64()?),
            SCV_U128 => {
                let hi = r.u64()? as u128;
                let lo = r.u64()? as u128;
                Self::U128((hi << 64) | lo)
            }
            SCV_I128 => {
                let hi = r.i64()? as i128;
                let lo = r.u64()? as i128;
                Self::I128((hi << 64) | lo)
            }
            SCV_BYTES => Self::Bytes(r.var_opaque()?),
            SCV_STRING => Self::String(r.string()?),
            SCV_SYMBOL => Self::Symbol(r.string()?),
            SCV_VEC => {
                if !r.bool()? {
                    return Ok(Self::Void);
                }
                let len = r.array_len()?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(Self::read_xdr(r, depth + 1)?);
                }
                Self::Vec(items)
            }
            SCV_MAP => {
                if !r.bool()? {
                    return Ok(Self::Void);
                }
                let len = r.array_len()?;
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    let k = Self::read_xdr(r, depth + 1)?;
                    let v = Self::read_xdr(r, depth + 1)?;
                    entries.push((k, v));
                }
                Self::Map(entries)
            }
            SCV_ADDRESS => Self::Address(read_sc_address(r)?),
            other => {
                return Err(ChainError::Xdr(format!("unsupported value type {other}")));
            }
        };
        Ok(value)
    }

    // -- Native projection --------------------------------------------------

    /// Plain JSON view of the value: maps keyed by strings/symbols become
    /// objects, 128-bit integers become decimal strings, void becomes null.
    pub fn to_native(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Void | Self::Unknown => Value::Null,
            Self::Error { kind, code } => serde_json::json!({ "error": { "kind": kind, "code": code } }),
            Self::U32(v) => Value::from(*v),
            Self::I32(v) => Value::from(*v),
            Self::U64(v) | Self::Timepoint(v) | Self::Duration(v) => Value::from(*v),
            Self::I64(v) => Value::from(*v),
            Self::U128(v) => Value::String(v.to_string()),
            Self::I128(v) => Value::String(v.to_string()),
            Self::Bytes(bytes) => Value::String(hex::encode(bytes)),
            Self::String(s) | Self::Symbol(s) | Self::Address(s) => Value::String(s.clone()),
            Self::Vec(items) => Value::Array(items.iter().map(Self::to_native).collect()),
            Self::Map(entries) => {
                let keyed: Option<JsonMap<String, Value>> = entries
                    .iter()
                    .map(|(k, v)| k.as_key().map(|key| (key.to_string(), v.to_native())))
                    .collect();
                match keyed {
                    Some(object) => Value::Object(object),
                    None => Value::Array(
                        entries
                            .iter()
                            .map(|(k, v)| Value::Array(vec![k.to_native(), v.to_native()]))
                            .collect(),
                    ),
                }
            }
        }
    }

    fn as_key(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

fn write_sc_address(w: &mut XdrWriter, address: &str) -> Result<()> {
    if let Some(key) = strkey::decode_account(address) {
        w.u32(SC_ADDRESS_ACCOUNT).u32(PUBLIC_KEY_ED25519).fixed(&key);
    } else if let Some(hash) = strkey::decode_contract(address) {
        w.u32(SC_ADDRESS_CONTRACT).fixed(&hash);
    } else {
        return Err(ChainError::InvalidInput(format!("invalid address: {address}")));
    }
    Ok(())
}

fn read_sc_address(r: &mut XdrReader<'_>) -> Result<String> {
    match r.u32()? {
        SC_ADDRESS_ACCOUNT => {
            let key_type = r.u32()?;
            if key_type != PUBLIC_KEY_ED25519 {
                return Err(ChainError::Xdr(format!("unsupported key type {key_type}")));
            }
            Ok(strkey::encode_account(&r.fixed::<32>()?))
        }
        SC_ADDRESS_CONTRACT => Ok(strkey::encode_contract(&r.fixed::<32>()?)),
        other => Err(ChainError::Xdr(format!("unsupported address type {other}"))),
    }
}

/// Write the address as an `SCAddress` (used for the invoked contract).
pub(crate) fn write_address(w: &mut XdrWriter, address: &str) -> Result<()> {
    write_sc_address(w, address)
}
