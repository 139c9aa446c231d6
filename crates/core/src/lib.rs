//! Core domain rules for Invoicely.
//!
//! This crate contains pure logic with ZERO web or database dependencies.
//! The data layer calls into it before anything reaches the store.
//!
//! # Modules
//!
//! - `invoice` - Derived monetary totals and the invoice status machine
//! - `validation` - Field-level input rules shared by every entity

pub mod invoice;
pub mod validation;

pub use validation::FieldError;
