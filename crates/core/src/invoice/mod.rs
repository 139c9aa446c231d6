//! Invoice domain rules.
//!
//! - `totals` derives line amounts and invoice totals from their inputs
//! - `status` is the closed invoice status domain and its transition table

pub mod status;
pub mod totals;

#[cfg(test)]
mod totals_props;

pub use status::{InvoiceStatus, StatusTransitionError, UnknownInvoiceStatus};
pub use totals::{InvoiceTotals, LineAmounts, TotalsError, line_amount, round_money};
