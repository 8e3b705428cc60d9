//! Minimal XDR (RFC 4506) encoding for the ledger's wire types.
//!
//! Only the subset this client produces or reads is covered: transaction
//! envelopes carrying contract invocations, account ledger keys and entries,
//! and contract values. Opaque blobs the node hands back (soroban resource
//! data, authorization entries) are spliced in verbatim.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{ChainError, Result};

/// Big-endian XDR writer.
#[derive(Debug, Default)]
pub struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u32(value as u32)
    }

    /// Fixed-length opaque; callers only pass multiples of four here.
    pub fn fixed(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self.pad(bytes.len());
        self
    }

    /// Variable-length opaque or string: length prefix, data, zero padding.
    pub fn var_opaque(&mut self, bytes: &[u8]) -> &mut Self {
        self.u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self.pad(bytes.len());
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.var_opaque(value.as_bytes())
    }

    /// Append already-encoded XDR.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn pad(&mut self, len: usize) {
        let padding = (4 - len % 4) % 4;
        self.buf.extend(std::iter::repeat_n(0u8, padding));
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Big-endian XDR reader over a borrowed buffer.
#[derive(Debug)]
pub struct XdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                ChainError::Xdr(format!(
                    "unexpected end of input: need {n} bytes at offset {}",
                    self.pos
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ChainError::Xdr(format!("invalid bool discriminant {other}"))),
        }
    }

    pub fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let out = self.array::<N>()?;
        self.skip_padding(N)?;
        Ok(out)
    }

    pub fn var_opaque(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        if len > self.remaining() {
            return Err(ChainError::Xdr(format!(
                "length {len} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        let data = self.take(len)?.to_vec();
        self.skip_padding(len)?;
        Ok(data)
    }

    pub fn string(&mut self) -> Result<String> {
        let bytes = self.var_opaque()?;
        String::from_utf8(bytes).map_err(|e| ChainError::Xdr(format!("invalid utf-8: {e}")))
    }

    /// Element count of a variable-length array, bounded by what could
    /// possibly fit in the remaining input.
    pub fn array_len(&mut self) -> Result<usize> {
        let len = self.u32()? as usize;
        if len > self.remaining() / 4 {
            return Err(ChainError::Xdr(format!("array length {len} is implausible")));
        }
        Ok(len)
    }

    fn skip_padding(&mut self, len: usize) -> Result<()> {
        let padding = (4 - len % 4) % 4;
        self.take(padding)?;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn from_base64(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|e| ChainError::Xdr(format!("invalid base64: {e}")))
}
