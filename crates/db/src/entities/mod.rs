//! `SeaORM` entity definitions for the invoicing schema.
//!
//! One module per table. Primary keys are UUIDs assigned by the repositories;
//! money columns are `DECIMAL(12,2)`.

pub mod prelude;

pub mod bank_accounts;
pub mod clients;
pub mod e_wallets;
pub mod invoice_items;
pub mod invoices;
pub mod payments;
pub mod products;
pub mod profiles;
pub mod recurring_invoice_items;
pub mod recurring_invoices;
pub mod sea_orm_active_enums;
pub mod users;
