use serde::{Deserialize, Serialize};

/// Error variants the invoicing contract can return, with their on-chain codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownContractError {
    InvoiceNotFound,
    InvoiceAlreadyExists,
    Unauthorized,
    InvalidStatus,
    InvoiceAlreadyPaid,
    PaymentFailed,
    InvalidAmount,
    InvalidToken,
}

impl KnownContractError {
    pub const ALL: [KnownContractError; 8] = [
        Self::InvoiceNotFound,
        Self::InvoiceAlreadyExists,
        Self::Unauthorized,
        Self::InvalidStatus,
        Self::InvoiceAlreadyPaid,
        Self::PaymentFailed,
        Self::InvalidAmount,
        Self::InvalidToken,
    ];

    /// Numeric code the contract reports as `Error(Contract, #N)`.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvoiceNotFound => 1,
            Self::InvoiceAlreadyExists => 2,
            Self::Unauthorized => 3,
            Self::InvalidStatus => 4,
            Self::InvoiceAlreadyPaid => 5,
            Self::PaymentFailed => 6,
            Self::InvalidAmount => 7,
            Self::InvalidToken => 8,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InvoiceNotFound => "InvoiceNotFound",
            Self::InvoiceAlreadyExists => "InvoiceAlreadyExists",
            Self::Unauthorized => "Unauthorized",
            Self::InvalidStatus => "InvalidStatus",
            Self::InvoiceAlreadyPaid => "InvoiceAlreadyPaid",
            Self::PaymentFailed => "PaymentFailed",
            Self::InvalidAmount => "InvalidAmount",
            Self::InvalidToken => "InvalidToken",
        }
    }

    /// Message suitable for an alert or inline banner.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvoiceNotFound => "Invoice not found.",
            Self::InvoiceAlreadyExists => {
                "An invoice with this ID already exists. Please use a different Invoice ID."
            }
            Self::Unauthorized => {
                "Authorization failed. Please make sure your wallet is connected properly."
            }
            Self::InvalidStatus => "Invalid invoice status for this operation.",
            Self::InvoiceAlreadyPaid => "This invoice has already been paid.",
            Self::PaymentFailed => "Payment failed. Please check your balance and try again.",
            Self::InvalidAmount => "Invalid amount. Amount must be greater than 0.",
            Self::InvalidToken => "The configured payment token is not valid.",
        }
    }
}

/// Find a known contract error in free-form error text, either by variant
/// name or by the host's `Error(Contract, #N)` rendering.
pub fn match_contract_error(text: &str) -> Option<KnownContractError> {
    // Longer names first so "InvoiceAlreadyPaid" is not shadowed.
    let mut by_name = KnownContractError::ALL;
    by_name.sort_by_key(|e| std::cmp::Reverse(e.name().len()));
    if let Some(found) = by_name.into_iter().find(|e| text.contains(e.name())) {
        return Some(found);
    }

    let marker = "Error(Contract, #";
    let start = text.find(marker)? + marker.len();
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().and_then(KnownContractError::from_code)
}

/// Normalized failure surfaced to the user for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractError {
    pub code: u32,
    pub message: String,
    pub details: Option<String>,
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Build a [`ContractError`] for `operation` from the underlying error text.
///
/// Known contract errors get their fixed message and code; anything else
/// falls back to `"Failed to {operation}: {detail}"` with `fallback_code`.
pub fn classify_contract_error(operation: &str, detail: &str, fallback_code: u32) -> ContractError {
    match match_contract_error(detail) {
        Some(known) => ContractError {
            code: known.code(),
            message: known.user_message().to_string(),
            details: Some(detail.to_string()),
        },
        None => ContractError {
            code: fallback_code,
            message: if detail.is_empty() {
                format!("Failed to {operation}")
            } else {
                format!("Failed to {operation}: {detail}")
            },
            details: (!detail.is_empty()).then(|| detail.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for known in KnownContractError::ALL {
            assert_eq!(KnownContractError::from_code(known.code()), Some(known));
        }
        assert_eq!(KnownContractError::from_code(0), None);
        assert_eq!(KnownContractError::from_code(99), None);
    }

    #[test]
    fn match_by_name() {
        assert_eq!(
            match_contract_error("HostError: InvoiceAlreadyExists"),
            Some(KnownContractError::InvoiceAlreadyExists)
        );
        assert_eq!(
            match_contract_error("simulation: InvoiceAlreadyPaid"),
            Some(KnownContractError::InvoiceAlreadyPaid)
        );
    }

    #[test]
    fn match_by_host_code() {
        let text = "HostError: Error(Contract, #4)\n\nEvent log (newest first): ...";
        assert_eq!(
            match_contract_error(text),
            Some(KnownContractError::InvalidStatus)
        );
    }

    #[test]
    fn unknown_text_does_not_match() {
        assert_eq!(match_contract_error("connection reset by peer"), None);
        assert_eq!(match_contract_error("Error(Contract, #)"), None);
        assert_eq!(match_contract_error("Error(Contract, #42)"), None);
    }

    #[test]
    fn classify_known_error_uses_fixed_message() {
        let err = classify_contract_error("create invoice", "Simulation failed: InvalidAmount", 0);
        assert_eq!(err.code, 7);
        assert_eq!(err.message, "Invalid amount. Amount must be greater than 0.");
        assert_eq!(
            err.details.as_deref(),
            Some("Simulation failed: InvalidAmount")
        );
    }

    #[test]
    fn classify_unknown_error_uses_template() {
        let err = classify_contract_error("send invoice", "timeout", 500);
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "Failed to send invoice: timeout");
    }

    #[test]
    fn classify_empty_detail() {
        let err = classify_contract_error("pay invoice", "", 0);
        assert_eq!(err.message, "Failed to pay invoice");
        assert!(err.details.is_none());
    }

    #[test]
    fn contract_error_serializes() {
        let err = classify_contract_error("get invoice", "Unauthorized", 0);
        let json = serde_json::to_string(&err).unwrap();
        let parsed: ContractError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
        assert_eq!(parsed.to_string(), KnownContractError::Unauthorized.user_message());
    }
}
