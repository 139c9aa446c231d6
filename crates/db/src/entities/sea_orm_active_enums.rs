//! Enum domains persisted as constrained string columns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::DalError;

/// Adds `FromStr`, `Display` and domain listing on top of `ActiveEnum`.
///
/// Parsing is case-insensitive and fails with `DalError::Validation`.
macro_rules! string_domain {
    ($name:ident, $label:expr) => {
        impl $name {
            /// Every persisted value of this domain.
            #[must_use]
            pub fn domain() -> Vec<String> {
                <Self as sea_orm::Iterable>::iter()
                    .map(|variant| variant.to_value())
                    .collect()
            }
        }

        impl std::str::FromStr for $name {
            type Err = DalError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_uppercase();
                <Self as sea_orm::Iterable>::iter()
                    .find(|variant| variant.to_value() == wanted)
                    .ok_or_else(|| {
                        DalError::Validation(format!(
                            "'{s}' is not a valid {}; expected one of {}",
                            $label,
                            Self::domain().join(", ")
                        ))
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_value())
            }
        }
    };
}

/// Lifecycle status of an invoice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Being prepared.
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    /// Sent, awaiting payment.
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Fully paid.
    #[sea_orm(string_value = "PAID")]
    Paid,
    /// Partially paid.
    #[sea_orm(string_value = "PARTIAL")]
    Partial,
    /// Past due.
    #[sea_orm(string_value = "OVERDUE")]
    Overdue,
    /// Voided.
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

string_domain!(InvoiceStatus, "invoice status");

impl From<invoicely_core::invoice::InvoiceStatus> for InvoiceStatus {
    fn from(status: invoicely_core::invoice::InvoiceStatus) -> Self {
        use invoicely_core::invoice::InvoiceStatus as Domain;
        match status {
            Domain::Draft => Self::Draft,
            Domain::Pending => Self::Pending,
            Domain::Paid => Self::Paid,
            Domain::Partial => Self::Partial,
            Domain::Overdue => Self::Overdue,
            Domain::Cancelled => Self::Cancelled,
        }
    }
}

impl From<InvoiceStatus> for invoicely_core::invoice::InvoiceStatus {
    fn from(status: InvoiceStatus) -> Self {
        match status {
            InvoiceStatus::Draft => Self::Draft,
            InvoiceStatus::Pending => Self::Pending,
            InvoiceStatus::Paid => Self::Paid,
            InvoiceStatus::Partial => Self::Partial,
            InvoiceStatus::Overdue => Self::Overdue,
            InvoiceStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// How a payment was made.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash.
    #[sea_orm(string_value = "CASH")]
    Cash,
    /// Transfer to one of the profile's bank accounts.
    #[sea_orm(string_value = "BANK_TRANSFER")]
    BankTransfer,
    /// Payment to one of the profile's e-wallets.
    #[sea_orm(string_value = "E_WALLET")]
    EWallet,
    /// Anything else.
    #[sea_orm(string_value = "OTHER")]
    Other,
}

string_domain!(PaymentMethod, "payment method");

/// How often a recurring invoice materializes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringPattern {
    /// Every week.
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    /// Every two weeks.
    #[sea_orm(string_value = "BIWEEKLY")]
    Biweekly,
    /// Every month.
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    /// Every three months.
    #[sea_orm(string_value = "QUARTERLY")]
    Quarterly,
    /// Every six months.
    #[sea_orm(string_value = "SEMIANNUALLY")]
    Semiannually,
    /// Every year.
    #[sea_orm(string_value = "ANNUALLY")]
    Annually,
}

string_domain!(RecurringPattern, "recurring pattern");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_domains() {
        assert_eq!(
            InvoiceStatus::domain(),
            ["DRAFT", "PENDING", "PAID", "PARTIAL", "OVERDUE", "CANCELLED"]
        );
        assert_eq!(
            PaymentMethod::domain(),
            ["CASH", "BANK_TRANSFER", "E_WALLET", "OTHER"]
        );
        assert_eq!(RecurringPattern::domain().len(), 6);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            PaymentMethod::from_str("bank_transfer").unwrap(),
            PaymentMethod::BankTransfer
        );
        assert_eq!(
            RecurringPattern::from_str(" Monthly ").unwrap(),
            RecurringPattern::Monthly
        );
    }

    #[test]
    fn test_parse_rejects_values_outside_domain() {
        let err = InvoiceStatus::from_str("REFUNDED").unwrap_err();
        assert!(matches!(err, DalError::Validation(_)));
        assert!(err.to_string().contains("DRAFT, PENDING"));

        assert!(matches!(
            RecurringPattern::from_str("DAILY"),
            Err(DalError::Validation(_))
        ));
    }

    #[test]
    fn test_display_uses_persisted_value() {
        assert_eq!(PaymentMethod::EWallet.to_string(), "E_WALLET");
        assert_eq!(InvoiceStatus::Overdue.to_string(), "OVERDUE");
    }

    #[test]
    fn test_status_conversion_round_trip() {
        for status in invoicely_core::invoice::InvoiceStatus::ALL {
            let stored = InvoiceStatus::from(status);
            assert_eq!(stored.to_string(), status.as_str());
            assert_eq!(invoicely_core::invoice::InvoiceStatus::from(stored), status);
        }
    }
}
