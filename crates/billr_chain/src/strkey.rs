//! Strkey addresses: base32 text form of ledger account keys (`G…`) and
//! contract ids (`C…`).
//!
//! Layout: `version_byte || 32-byte payload || crc16-xmodem (little endian)`,
//! base32 encoded without padding into 56 characters.

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

const VERSION_ACCOUNT: u8 = 6 << 3;
const VERSION_CONTRACT: u8 = 2 << 3;

const PAYLOAD_LEN: usize = 32;
const RAW_LEN: usize = 1 + PAYLOAD_LEN + 2;
const ENCODED_LEN: usize = 56;

/// Maximum invoice id length accepted by the contract.
pub const MAX_INVOICE_ID_LEN: usize = 64;

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in input.bytes() {
        let value = ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    // Leftover bits must be zero padding.
    if bits > 0 && buffer & ((1 << bits) - 1) != 0 {
        return None;
    }
    Some(out)
}

fn encode(version: u8, payload: &[u8; PAYLOAD_LEN]) -> String {
    let mut raw = Vec::with_capacity(RAW_LEN);
    raw.push(version);
    raw.extend_from_slice(payload);
    let crc = crc16_xmodem(&raw);
    raw.extend_from_slice(&crc.to_le_bytes());
    base32_encode(&raw)
}

fn decode(version: u8, text: &str) -> Option<[u8; PAYLOAD_LEN]> {
    if text.len() != ENCODED_LEN {
        return None;
    }
    let raw = base32_decode(text)?;
    if raw.len() != RAW_LEN || raw[0] != version {
        return None;
    }
    let (body, checksum) = raw.split_at(1 + PAYLOAD_LEN);
    let expected = crc16_xmodem(body).to_le_bytes();
    if checksum != expected {
        return None;
    }
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&body[1..]);
    Some(payload)
}

/// Ed25519 public key bytes behind a `G…` account address.
pub fn decode_account(address: &str) -> Option<[u8; PAYLOAD_LEN]> {
    decode(VERSION_ACCOUNT, address)
}

/// Contract hash behind a `C…` contract id.
pub fn decode_contract(contract_id: &str) -> Option<[u8; PAYLOAD_LEN]> {
    decode(VERSION_CONTRACT, contract_id)
}

pub fn encode_account(key: &[u8; PAYLOAD_LEN]) -> String {
    encode(VERSION_ACCOUNT, key)
}

pub fn encode_contract(hash: &[u8; PAYLOAD_LEN]) -> String {
    encode(VERSION_CONTRACT, hash)
}

/// Structural validation of an account address. Never panics, never touches
/// the network.
pub fn is_valid_address(address: &str) -> bool {
    decode_account(address).is_some()
}

pub fn is_valid_contract_id(contract_id: &str) -> bool {
    decode_contract(contract_id).is_some()
}

/// Invoice ids must be non-blank and at most 64 characters.
pub fn is_valid_invoice_id(invoice_id: &str) -> bool {
    !invoice_id.trim().is_empty() && invoice_id.chars().count() <= MAX_INVOICE_ID_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";
    const SAMPLE_ACCOUNT: &str = "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ";
    const SAMPLE_CONTRACT: &str = "CCAV5ZYL3LI6MB254CHHVB6B5JBLJ6RUBMYZT5RCBVS46MHS3L4CLIWD";

    #[test]
    fn zero_key_encodes_to_known_address() {
        assert_eq!(encode_account(&[0u8; 32]), ZERO_ACCOUNT);
    }

    #[test]
    fn sequential_key_encodes_to_known_address() {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(
            encode_account(&key),
            "GAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB7JZX"
        );
    }

    #[test]
    fn accepts_valid_accounts() {
        assert!(is_valid_address(ZERO_ACCOUNT));
        assert!(is_valid_address(SAMPLE_ACCOUNT));
    }

    #[test]
    fn decodes_account_payload() {
        let key = decode_account(SAMPLE_ACCOUNT).unwrap();
        assert_eq!(
            hex::encode(key),
            "3f0c34bf93ad0d9971d04ccc90f705511c838aad9734a4a2fb0d7a03fc7fe89a"
        );
        assert_eq!(encode_account(&key), SAMPLE_ACCOUNT);
    }

    #[test]
    fn contract_ids_are_not_accounts() {
        assert!(is_valid_contract_id(SAMPLE_CONTRACT));
        assert!(!is_valid_address(SAMPLE_CONTRACT));
        assert!(!is_valid_contract_id(SAMPLE_ACCOUNT));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut tampered = SAMPLE_ACCOUNT.to_string();
        tampered.replace_range(10..11, "A");
        assert_ne!(tampered, SAMPLE_ACCOUNT);
        assert!(!is_valid_address(&tampered));
    }

    #[test]
    fn rejects_malformed_input() {
        let lower = SAMPLE_ACCOUNT.to_lowercase();
        let too_long = format!("{SAMPLE_ACCOUNT}A");
        for input in [
            "",
            "G",
            "not an address",
            lower.as_str(),
            &SAMPLE_ACCOUNT[..55],
            too_long.as_str(),
            "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWH1",
            "ÄAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWH",
        ] {
            assert!(!is_valid_address(input), "accepted {input:?}");
        }
    }

    #[test]
    fn invoice_id_rules() {
        assert!(is_valid_invoice_id("INV-001"));
        assert!(is_valid_invoice_id(&"x".repeat(64)));
        assert!(!is_valid_invoice_id(&"x".repeat(65)));
        assert!(!is_valid_invoice_id(""));
        assert!(!is_valid_invoice_id("   "));
    }

    #[test]
    fn invoice_id_length_counts_characters() {
        assert!(is_valid_invoice_id(&"é".repeat(40)));
        assert!(is_valid_invoice_id(&"é".repeat(64)));
        assert!(!is_valid_invoice_id(&"é".repeat(65)));
    }
}
