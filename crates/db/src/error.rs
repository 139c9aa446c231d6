//! Error type returned by every data-access operation.

use invoicely_core::FieldError;
use invoicely_core::invoice::{StatusTransitionError, TotalsError, UnknownInvoiceStatus};
use invoicely_shared::AppError;
use sea_orm::{DbErr, SqlErr};

/// Result alias for data-access operations.
pub type DalResult<T> = Result<T, DalError>;

/// Error types for data-access operations.
///
/// Nothing is retried here; callers decide whether an error is worth
/// retrying.
#[derive(Debug, thiserror::Error)]
pub enum DalError {
    /// Input rejected before reaching the store (bad shape or enum value).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique lookup, update or delete target does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// Key that was looked up.
        key: String,
    },

    /// Uniqueness or foreign-key constraint reported by the store.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Beginning or committing an atomic block failed; it was rolled back.
    #[error("Transaction failed and was rolled back: {0}")]
    Transaction(String),

    /// Any other store error, surfaced unchanged.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl DalError {
    /// Builds a `NotFound` error.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Wraps a failure of the transaction machinery itself.
    pub(crate) fn transaction(err: DbErr) -> Self {
        Self::Transaction(err.to_string())
    }

    /// Returns true for `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for `ConstraintViolation`.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

impl From<DbErr> for DalError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                return Self::ConstraintViolation(format!("unique constraint: {detail}"));
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                return Self::ConstraintViolation(format!("foreign key constraint: {detail}"));
            }
            _ => {}
        }

        match err {
            DbErr::RecordNotFound(key) => Self::NotFound {
                entity: "record",
                key,
            },
            other => Self::Database(other),
        }
    }
}

impl From<FieldError> for DalError {
    fn from(err: FieldError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<TotalsError> for DalError {
    fn from(err: TotalsError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StatusTransitionError> for DalError {
    fn from(err: StatusTransitionError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<UnknownInvoiceStatus> for DalError {
    fn from(err: UnknownInvoiceStatus) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<DalError> for AppError {
    fn from(err: DalError) -> Self {
        match err {
            DalError::Validation(msg) => Self::Validation(msg),
            err @ DalError::NotFound { .. } => Self::NotFound(err.to_string()),
            DalError::ConstraintViolation(msg) => Self::Conflict(msg),
            DalError::Transaction(msg) => Self::Database(msg),
            DalError::Database(err) => Self::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoicely_core::invoice::InvoiceStatus;
    use rust_decimal::Decimal;

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let err: DalError = DbErr::RecordNotFound("invoice 42".into()).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_db_errors_surface_unchanged() {
        let err: DalError = DbErr::Custom("timeout".into()).into();
        assert!(matches!(err, DalError::Database(DbErr::Custom(_))));
    }

    #[test]
    fn test_domain_errors_become_validation() {
        let err: DalError = TotalsError::NegativeDiscount(Decimal::NEGATIVE_ONE).into();
        assert!(matches!(err, DalError::Validation(_)));

        let err: DalError = InvoiceStatus::Paid
            .transition_to(InvoiceStatus::Draft)
            .unwrap_err()
            .into();
        assert!(matches!(err, DalError::Validation(_)));
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = DalError::not_found("invoice", "abc").into();
        assert_eq!(app.status_code(), 404);
        assert_eq!(app.to_string(), "Not found: invoice not found: abc");

        let app: AppError = DalError::ConstraintViolation("email".into()).into();
        assert_eq!(app.error_code(), "CONFLICT");

        let app: AppError = DalError::Validation("bad".into()).into();
        assert_eq!(app.status_code(), 400);
    }
}
