use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::amount::from_smallest_unit;

/// Lifecycle state as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Acknowledged,
    Paid,
    Cancelled,
    /// Missing or unrecognized in the contract response.
    #[default]
    Unknown,
}

impl InvoiceStatus {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Draft" => Self::Draft,
            "Sent" => Self::Sent,
            "Acknowledged" => Self::Acknowledged,
            "Paid" => Self::Paid,
            "Cancelled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Sent => "Sent",
            Self::Acknowledged => "Acknowledged",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }

    /// Awaiting payment from the recipient.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Sent | Self::Acknowledged)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot of an invoice. The contract owns every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub creator: String,
    pub recipient: String,
    /// Smallest-unit integer string.
    pub amount: String,
    pub metadata: HashMap<String, String>,
    pub status: InvoiceStatus,
    pub created_at: u64,
    pub last_updated: u64,
    pub paid_at: Option<u64>,
    pub acknowledgment_note: Option<String>,
}

impl Invoice {
    /// Amount rendered with two decimals.
    pub fn display_amount(&self) -> String {
        from_smallest_unit(&self.amount)
    }

    // The checks below mirror the contract's transition rules so callers can
    // hide actions that would fail simulation. The contract stays the
    // authority.

    pub fn can_send(&self, caller: &str) -> bool {
        self.creator == caller && self.status == InvoiceStatus::Draft
    }

    pub fn can_acknowledge(&self, caller: &str) -> bool {
        self.recipient == caller && self.status == InvoiceStatus::Sent
    }

    pub fn can_pay(&self, caller: &str) -> bool {
        self.recipient == caller && self.status.is_payable()
    }

    pub fn can_cancel(&self, caller: &str) -> bool {
        self.creator == caller
            && !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    pub fn can_edit(&self, caller: &str) -> bool {
        self.creator == caller && self.status == InvoiceStatus::Draft
    }
}

/// Invoices an address created and received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMap {
    pub created: Vec<Invoice>,
    pub received: Vec<Invoice>,
}

/// Invoices still waiting on someone: the creator's unpaid invoices and the
/// recipient's invoices that need action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInvoices {
    pub awaiting_payment: Vec<Invoice>,
    pub pending_action: Vec<Invoice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(status: InvoiceStatus) -> Invoice {
        Invoice {
            invoice_id: "INV-1".into(),
            creator: "CREATOR".into(),
            recipient: "RECIPIENT".into(),
            amount: "125000000".into(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn status_names() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Acknowledged,
            InvoiceStatus::Paid,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(InvoiceStatus::from_name(status.as_str()), status);
        }
        assert_eq!(InvoiceStatus::from_name("Archived"), InvoiceStatus::Unknown);
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Unknown);
    }

    #[test]
    fn display_amount_uses_two_decimals() {
        assert_eq!(invoice(InvoiceStatus::Draft).display_amount(), "12.50");
    }

    #[test]
    fn creator_actions_follow_status() {
        let draft = invoice(InvoiceStatus::Draft);
        assert!(draft.can_send("CREATOR"));
        assert!(draft.can_edit("CREATOR"));
        assert!(!draft.can_send("RECIPIENT"));

        let paid = invoice(InvoiceStatus::Paid);
        assert!(!paid.can_cancel("CREATOR"));
        assert!(invoice(InvoiceStatus::Sent).can_cancel("CREATOR"));
    }

    #[test]
    fn recipient_actions_follow_status() {
        let sent = invoice(InvoiceStatus::Sent);
        assert!(sent.can_acknowledge("RECIPIENT"));
        assert!(sent.can_pay("RECIPIENT"));
        assert!(!sent.can_pay("CREATOR"));

        let acknowledged = invoice(InvoiceStatus::Acknowledged);
        assert!(!acknowledged.can_acknowledge("RECIPIENT"));
        assert!(acknowledged.can_pay("RECIPIENT"));
        assert!(!invoice(InvoiceStatus::Draft).can_pay("RECIPIENT"));
    }
}
