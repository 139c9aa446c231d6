//! Invoice status domain.
//!
//! Invoices move through these states:
//!
//! ```text
//! DRAFT ──► PENDING ──► PAID
//!   │          │  ▲       ▲
//!   │          ▼  │       │
//!   │       PARTIAL ◄──► OVERDUE
//!   ▼          │            │
//! CANCELLED ◄──┴────────────┘
//! ```
//!
//! PAID and CANCELLED are terminal. When a status is applied (for example
//! when an invoice becomes overdue) is decided by the calling application.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Being prepared; not yet sent.
    Draft,
    /// Sent and awaiting payment.
    Pending,
    /// Fully paid.
    Paid,
    /// Partially paid.
    Partial,
    /// Past its due date without full payment.
    Overdue,
    /// Voided.
    Cancelled,
}

/// A string outside the invoice status domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown invoice status '{0}'")]
pub struct UnknownInvoiceStatus(pub String);

/// A transition not allowed by the status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invoice status cannot change from {from} to {to}")]
pub struct StatusTransitionError {
    /// Current status.
    pub from: InvoiceStatus,
    /// Requested status.
    pub to: InvoiceStatus,
}

impl InvoiceStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::Pending,
        Self::Paid,
        Self::Partial,
        Self::Overdue,
        Self::Cancelled,
    ];

    /// Returns the persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Partial => "PARTIAL",
            Self::Overdue => "OVERDUE",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Statuses reachable in one step.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Pending, Self::Cancelled],
            Self::Pending => &[Self::Paid, Self::Partial, Self::Overdue, Self::Cancelled],
            Self::Partial => &[Self::Paid, Self::Overdue, Self::Cancelled],
            Self::Overdue => &[Self::Paid, Self::Partial, Self::Cancelled],
            Self::Paid | Self::Cancelled => &[],
        }
    }

    /// Returns true if `next` is reachable from `self` (or equal to it).
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || self.allowed_transitions().contains(&next)
    }

    /// Validates a transition, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns `StatusTransitionError` if the transition is not allowed.
    pub fn transition_to(self, next: Self) -> Result<Self, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Returns true if line items may still be added, changed or removed.
    #[must_use]
    pub const fn accepts_item_changes(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = UnknownInvoiceStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownInvoiceStatus(s.to_string()))
    }
}
