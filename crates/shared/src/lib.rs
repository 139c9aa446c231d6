//! Shared types, errors, and configuration for Invoicely.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Pagination types for list queries
//! - Application-wide error types
//! - Configuration management
//! - Tracing subscriber setup for the binaries

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, LoggingConfig};
pub use error::{AppError, AppResult};
