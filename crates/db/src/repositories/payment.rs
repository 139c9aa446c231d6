//! Payment repository.
//!
//! Recording, changing or removing a payment also touches the paid
//! invoice's `updated_at`, in the same transaction.

use chrono::NaiveDate;
use invoicely_core::FieldError;
use invoicely_core::invoice::round_money;
use invoicely_core::validation::require_positive;
use invoicely_shared::types::PaymentId;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::sea_orm_active_enums::PaymentMethod;
use crate::entities::{invoices, payments};
use crate::error::{DalError, DalResult};
use crate::query::FindManyArgs;
use crate::store::Store;

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct CreatePaymentInput {
    /// Paid invoice.
    pub invoice_id: Uuid,
    /// Amount received (> 0).
    pub amount: Decimal,
    /// Date the money arrived.
    pub payment_date: NaiveDate,
    /// Payment method.
    pub method: PaymentMethod,
    /// E-wallet used; required for `E_WALLET`.
    pub e_wallet_id: Option<Uuid>,
    /// Bank account used; required for `BANK_TRANSFER`.
    pub bank_account_id: Option<Uuid>,
    /// External reference, e.g. a transfer ID.
    pub reference: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Input for updating a payment.
#[derive(Debug, Clone, Default)]
pub struct UpdatePaymentInput {
    /// Amount received.
    pub amount: Option<Decimal>,
    /// Date the money arrived.
    pub payment_date: Option<NaiveDate>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// E-wallet used.
    pub e_wallet_id: Option<Option<Uuid>>,
    /// Bank account used.
    pub bank_account_id: Option<Option<Uuid>>,
    /// External reference.
    pub reference: Option<Option<String>>,
    /// Free-form notes.
    pub notes: Option<Option<String>>,
}

/// Payment repository.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    store: Store,
    crud: Crud<payments::Entity>,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Records a payment against an invoice.
    ///
    /// The payment insert and the invoice touch run in one transaction; if
    /// either fails neither is visible.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `Validation` for a non-positive amount or an account reference that
    ///   does not match the method
    /// - `ConstraintViolation` if the invoice or account does not exist
    /// - `NotFound` if the invoice was deleted
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id, method = %input.method))]
    pub async fn create(&self, input: CreatePaymentInput) -> DalResult<payments::Model> {
        let amount = round_money(require_positive("amount", input.amount)?);
        check_method(input.method, input.e_wallet_id, input.bank_account_id)
            .inspect_err(|err| warn!(%err, "Rejected payment"))?;

        let txn = self.store.begin().await?;
        let now = now();
        let payment = payments::ActiveModel {
            payment_id: Set(PaymentId::new().into_inner()),
            invoice_id: Set(input.invoice_id),
            amount: Set(amount),
            payment_date: Set(input.payment_date),
            method: Set(input.method),
            e_wallet_id: Set(input.e_wallet_id),
            bank_account_id: Set(input.bank_account_id),
            reference: Set(input.reference),
            notes: Set(input.notes),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;
        touch_invoice(&txn, payment.invoice_id).await?;
        Store::commit(txn).await?;

        debug!(payment_id = %payment.payment_id, amount = %payment.amount, "Recorded payment");
        Ok(payment)
    }

    /// Finds a payment by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the payment does not exist.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<payments::Model> {
        self.crud.find_unique(id).await
    }

    /// Lists payments matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters, including unknown methods.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<payments::Entity>,
    ) -> DalResult<Vec<payments::Model>> {
        self.crud.find_many(args).await
    }

    /// Counts payments matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<payments::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Lists the payments of an invoice by payment date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_invoice(&self, invoice_id: Uuid) -> DalResult<Vec<payments::Model>> {
        Ok(payments::Entity::find()
            .filter(payments::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(payments::Column::PaymentDate)
            .order_by_asc(payments::Column::PaymentId)
            .all(self.store.connection())
            .await?)
    }

    /// Sums the payments recorded against an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn total_paid(&self, invoice_id: Uuid) -> DalResult<Decimal> {
        let total: Decimal = self
            .list_by_invoice(invoice_id)
            .await?
            .into_iter()
            .map(|payment| round_money(payment.amount))
            .sum();
        Ok(total)
    }

    /// Updates a payment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the payment does not exist and `Validation` if
    /// the result would break the amount or method rules.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdatePaymentInput) -> DalResult<payments::Model> {
        let amount = input
            .amount
            .map(|amount| require_positive("amount", amount).map(round_money))
            .transpose()?;

        let txn = self.store.begin().await?;
        let payment = Crud::<payments::Entity>::fetch_existing(&txn, id).await?;

        let method = input.method.unwrap_or(payment.method);
        let e_wallet_id = input.e_wallet_id.unwrap_or(payment.e_wallet_id);
        let bank_account_id = input.bank_account_id.unwrap_or(payment.bank_account_id);
        check_method(method, e_wallet_id, bank_account_id)?;
        let invoice_id = payment.invoice_id;

        let mut active: payments::ActiveModel = payment.into();
        if let Some(amount) = amount {
            active.amount = Set(amount);
        }
        if let Some(payment_date) = input.payment_date {
            active.payment_date = Set(payment_date);
        }
        if let Some(reference) = input.reference {
            active.reference = Set(reference);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(notes);
        }
        active.method = Set(method);
        active.e_wallet_id = Set(e_wallet_id);
        active.bank_account_id = Set(bank_account_id);
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        touch_invoice(&txn, invoice_id).await?;
        Store::commit(txn).await?;

        debug!(payment_id = %id, "Updated payment");
        Ok(updated)
    }

    /// Deletes a payment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the payment does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> DalResult<()> {
        let txn = self.store.begin().await?;
        let payment = Crud::<payments::Entity>::fetch_existing(&txn, id).await?;
        let invoice_id = payment.invoice_id;
        payment.delete(&txn).await?;
        touch_invoice(&txn, invoice_id).await?;
        Store::commit(txn).await?;

        debug!(payment_id = %id, "Deleted payment");
        Ok(())
    }
}

/// Checks that the account references match the payment method.
///
/// # Errors
///
/// Returns `Validation` if a required reference is missing or an unrelated
/// one is present.
pub fn check_method(
    method: PaymentMethod,
    e_wallet_id: Option<Uuid>,
    bank_account_id: Option<Uuid>,
) -> DalResult<()> {
    let error = match (method, e_wallet_id, bank_account_id) {
        (PaymentMethod::EWallet, Some(_), None)
        | (PaymentMethod::BankTransfer, None, Some(_))
        | (PaymentMethod::Cash | PaymentMethod::Other, None, None) => return Ok(()),
        (PaymentMethod::EWallet, None, _) => {
            FieldError::new("e_wallet_id", "is required for E_WALLET payments")
        }
        (PaymentMethod::BankTransfer, _, None) => {
            FieldError::new("bank_account_id", "is required for BANK_TRANSFER payments")
        }
        (PaymentMethod::EWallet, Some(_), Some(_)) => {
            FieldError::new("bank_account_id", "must be empty for E_WALLET payments")
        }
        (_, Some(_), _) => FieldError::new(
            "e_wallet_id",
            format!("must be empty for {method} payments"),
        ),
        (_, None, Some(_)) => FieldError::new(
            "bank_account_id",
            format!("must be empty for {method} payments"),
        ),
    };
    Err(error.into())
}

/// Bumps `updated_at` of a live invoice.
async fn touch_invoice<C: ConnectionTrait>(conn: &C, invoice_id: Uuid) -> DalResult<()> {
    let result = invoices::Entity::update_many()
        .col_expr(invoices::Column::UpdatedAt, Expr::value(now()))
        .filter(invoices::Column::InvoiceId.eq(invoice_id))
        .filter(invoices::Column::DeletedAt.is_null())
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(DalError::not_found("invoice", invoice_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PaymentMethod::Cash, false, false, true)]
    #[case(PaymentMethod::Other, false, false, true)]
    #[case(PaymentMethod::EWallet, true, false, true)]
    #[case(PaymentMethod::BankTransfer, false, true, true)]
    #[case(PaymentMethod::EWallet, false, false, false)]
    #[case(PaymentMethod::EWallet, true, true, false)]
    #[case(PaymentMethod::BankTransfer, false, false, false)]
    #[case(PaymentMethod::BankTransfer, true, true, false)]
    #[case(PaymentMethod::Cash, true, false, false)]
    #[case(PaymentMethod::Other, false, true, false)]
    fn test_check_method(
        #[case] method: PaymentMethod,
        #[case] with_wallet: bool,
        #[case] with_bank: bool,
        #[case] ok: bool,
    ) {
        let wallet = with_wallet.then(Uuid::now_v7);
        let bank = with_bank.then(Uuid::now_v7);
        let result = check_method(method, wallet, bank);
        assert_eq!(result.is_ok(), ok, "{method} wallet={with_wallet} bank={with_bank}");
        if !ok {
            assert!(matches!(result, Err(DalError::Validation(_))));
        }
    }

    #[test]
    fn test_check_method_message_names_field() {
        let err = check_method(PaymentMethod::BankTransfer, None, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: bank_account_id: is required for BANK_TRANSFER payments"
        );
    }
}
