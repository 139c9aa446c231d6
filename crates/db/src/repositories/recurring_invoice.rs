//! Recurring invoice templates.
//!
//! A template stores the client, pattern, header amounts and lines that an
//! external job copies into concrete invoices. Deciding when a template
//! fires and advancing `next_invoice_date` is left to that job.

use chrono::NaiveDate;
use invoicely_core::FieldError;
use invoicely_core::invoice::{InvoiceTotals, round_money};
use invoicely_core::validation::normalize_currency;
use invoicely_shared::types::{RecurringInvoiceId, RecurringInvoiceItemId};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::sea_orm_active_enums::RecurringPattern;
use crate::entities::{clients, recurring_invoice_items, recurring_invoices, users};
use crate::error::DalResult;
use crate::query::FindManyArgs;
use crate::repositories::invoice::{LineItemInput, check_product};
use crate::store::Store;

/// Input for creating a recurring invoice template.
#[derive(Debug, Clone)]
pub struct CreateRecurringInvoiceInput {
    /// Issuing user.
    pub user_id: Uuid,
    /// Billed client; must belong to the same user.
    pub client_id: Uuid,
    /// How often the template fires.
    pub pattern: RecurringPattern,
    /// First date the template applies.
    pub start_date: NaiveDate,
    /// Last date the template applies.
    pub end_date: Option<NaiveDate>,
    /// Next issue date; the start date when absent.
    pub next_invoice_date: Option<NaiveDate>,
    /// Header-level tax copied into generated invoices.
    pub tax_amount: Decimal,
    /// Header-level discount copied into generated invoices.
    pub discount_amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Notes copied into generated invoices.
    pub notes: Option<String>,
    /// Terms copied into generated invoices.
    pub terms: Option<String>,
    /// Template lines.
    pub items: Vec<LineItemInput>,
}

/// Input for updating a template header.
#[derive(Debug, Clone, Default)]
pub struct UpdateRecurringInvoiceInput {
    /// Pattern.
    pub pattern: Option<RecurringPattern>,
    /// End date.
    pub end_date: Option<Option<NaiveDate>>,
    /// Next issue date.
    pub next_invoice_date: Option<NaiveDate>,
    /// Active flag.
    pub is_active: Option<bool>,
    /// Header-level tax.
    pub tax_amount: Option<Decimal>,
    /// Header-level discount.
    pub discount_amount: Option<Decimal>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// Notes.
    pub notes: Option<Option<String>>,
    /// Terms.
    pub terms: Option<Option<String>>,
}

/// Template with its lines.
#[derive(Debug, Clone)]
pub struct RecurringInvoiceWithItems {
    /// The template record.
    pub template: recurring_invoices::Model,
    /// Lines, oldest first.
    pub items: Vec<recurring_invoice_items::Model>,
}

/// Recurring invoice repository.
#[derive(Debug, Clone)]
pub struct RecurringInvoiceRepository {
    store: Store,
    crud: Crud<recurring_invoices::Entity>,
}

impl RecurringInvoiceRepository {
    /// Creates a new recurring invoice repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates a template and its lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed fields, dates or lines and
    /// `NotFound` if the user, client or a product is missing.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, pattern = %input.pattern))]
    pub async fn create(
        &self,
        input: CreateRecurringInvoiceInput,
    ) -> DalResult<recurring_invoices::Model> {
        let currency = normalize_currency(&input.currency)?;
        let next_invoice_date = input.next_invoice_date.unwrap_or(input.start_date);
        check_schedule(input.start_date, input.end_date, next_invoice_date)?;

        let lines = input
            .items
            .iter()
            .map(LineItemInput::validate)
            .collect::<DalResult<Vec<_>>>()?;
        let totals = InvoiceTotals::derive(
            lines.iter().map(|(_, amounts)| amounts.amount),
            input.tax_amount,
            input.discount_amount,
        )?;

        let txn = self.store.begin().await?;
        Crud::<users::Entity>::fetch_existing(&txn, input.user_id).await?;
        let client = Crud::<clients::Entity>::fetch_existing(&txn, input.client_id).await?;
        if client.user_id != input.user_id {
            return Err(FieldError::new("client_id", "belongs to another user").into());
        }

        let now = now();
        let template = recurring_invoices::ActiveModel {
            id: Set(RecurringInvoiceId::new().into_inner()),
            user_id: Set(input.user_id),
            client_id: Set(input.client_id),
            pattern: Set(input.pattern),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            next_invoice_date: Set(next_invoice_date),
            is_active: Set(true),
            tax_amount: Set(totals.tax_amount),
            discount_amount: Set(totals.discount_amount),
            currency: Set(currency),
            notes: Set(input.notes),
            terms: Set(input.terms),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        for ((description, amounts), line) in lines.into_iter().zip(&input.items) {
            if let Some(product_id) = line.product_id {
                check_product(&txn, product_id, input.user_id).await?;
            }
            recurring_invoice_items::ActiveModel {
                id: Set(RecurringInvoiceItemId::new().into_inner()),
                recurring_invoice_id: Set(template.id),
                product_id: Set(line.product_id),
                description: Set(description),
                quantity: Set(amounts.quantity),
                unit_price: Set(amounts.unit_price),
                tax_amount: Set(amounts.tax_amount),
                amount: Set(amounts.amount),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
            }
            .insert(&txn)
            .await?;
        }
        Store::commit(txn).await?;

        debug!(recurring_invoice_id = %template.id, "Created recurring invoice");
        Ok(template)
    }

    /// Finds a template by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the template does not exist.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<recurring_invoices::Model> {
        self.crud.find_unique(id).await
    }

    /// Lists templates matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters, including unknown patterns.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<recurring_invoices::Entity>,
    ) -> DalResult<Vec<recurring_invoices::Model>> {
        self.crud.find_many(args).await
    }

    /// Counts templates matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<recurring_invoices::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Loads a template with its lines.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the template does not exist.
    pub async fn find_with_items(&self, id: Uuid) -> DalResult<RecurringInvoiceWithItems> {
        let template = self.crud.find_unique(id).await?;
        let items = template
            .find_related(recurring_invoice_items::Entity)
            .order_by_asc(recurring_invoice_items::Column::CreatedAt)
            .order_by_asc(recurring_invoice_items::Column::Id)
            .all(self.store.connection())
            .await?;
        Ok(RecurringInvoiceWithItems { template, items })
    }

    /// Lists active templates due on or before `as_of`.
    ///
    /// A template whose end date precedes its next invoice date has run out
    /// and is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self))]
    pub async fn list_due(&self, as_of: NaiveDate) -> DalResult<Vec<recurring_invoices::Model>> {
        use recurring_invoices::Column;

        Ok(recurring_invoices::Entity::find()
            .filter(Column::IsActive.eq(true))
            .filter(Column::NextInvoiceDate.lte(as_of))
            .filter(
                Condition::any()
                    .add(Column::EndDate.is_null())
                    .add(Expr::col(Column::EndDate).gte(Expr::col(Column::NextInvoiceDate))),
            )
            .order_by_asc(Column::NextInvoiceDate)
            .order_by_asc(Column::Id)
            .all(self.store.connection())
            .await?)
    }

    /// Updates a template header.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the template does not exist and `Validation`
    /// for inconsistent dates or amounts.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateRecurringInvoiceInput,
    ) -> DalResult<recurring_invoices::Model> {
        let currency = input.currency.as_deref().map(normalize_currency).transpose()?;

        let txn = self.store.begin().await?;
        let template = Crud::<recurring_invoices::Entity>::lock_existing(&txn, id).await?;

        check_schedule(
            template.start_date,
            input.end_date.unwrap_or(template.end_date),
            input.next_invoice_date.unwrap_or(template.next_invoice_date),
        )?;
        let totals = template_totals(
            &txn,
            id,
            input.tax_amount.unwrap_or(template.tax_amount),
            input.discount_amount.unwrap_or(template.discount_amount),
        )
        .await?;

        let mut active: recurring_invoices::ActiveModel = template.into();
        if let Some(pattern) = input.pattern {
            active.pattern = Set(pattern);
        }
        if let Some(end_date) = input.end_date {
            active.end_date = Set(end_date);
        }
        if let Some(next_invoice_date) = input.next_invoice_date {
            active.next_invoice_date = Set(next_invoice_date);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(currency) = currency {
            active.currency = Set(currency);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(notes);
        }
        if let Some(terms) = input.terms {
            active.terms = Set(terms);
        }
        active.tax_amount = Set(totals.tax_amount);
        active.discount_amount = Set(totals.discount_amount);
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(recurring_invoice_id = %id, "Updated recurring invoice");
        Ok(updated)
    }

    /// Stops a template from firing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the template does not exist.
    pub async fn deactivate(&self, id: Uuid) -> DalResult<recurring_invoices::Model> {
        self.update(
            id,
            UpdateRecurringInvoiceInput {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Adds a line to a template.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the template or product does not exist and
    /// `Validation` for a malformed line or a product of another user.
    #[instrument(skip(self, input))]
    pub async fn add_item(
        &self,
        template_id: Uuid,
        input: LineItemInput,
    ) -> DalResult<recurring_invoice_items::Model> {
        let (description, amounts) = input.validate()?;

        let txn = self.store.begin().await?;
        let template = Crud::<recurring_invoices::Entity>::lock_existing(&txn, template_id).await?;
        if let Some(product_id) = input.product_id {
            check_product(&txn, product_id, template.user_id).await?;
        }

        let now = now();
        let item = recurring_invoice_items::ActiveModel {
            id: Set(RecurringInvoiceItemId::new().into_inner()),
            recurring_invoice_id: Set(template_id),
            product_id: Set(input.product_id),
            description: Set(description),
            quantity: Set(amounts.quantity),
            unit_price: Set(amounts.unit_price),
            tax_amount: Set(amounts.tax_amount),
            amount: Set(amounts.amount),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;
        Store::commit(txn).await?;

        debug!(%template_id, item_id = %item.id, "Added recurring invoice item");
        Ok(item)
    }

    /// Removes a line from a template.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not exist and `Validation` if the
    /// template discount would exceed the remaining amount.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: Uuid) -> DalResult<()> {
        let txn = self.store.begin().await?;
        let item = Crud::<recurring_invoice_items::Entity>::fetch_existing(&txn, item_id).await?;
        let template =
            Crud::<recurring_invoices::Entity>::lock_existing(&txn, item.recurring_invoice_id)
                .await?;
        let item = Crud::<recurring_invoice_items::Entity>::fetch_existing(&txn, item_id).await?;

        item.delete(&txn).await?;
        template_totals(&txn, template.id, template.tax_amount, template.discount_amount).await?;
        Store::commit(txn).await?;

        debug!(%item_id, "Removed recurring invoice item");
        Ok(())
    }

    /// Deletes a template and its lines.
    ///
    /// Invoices generated from it keep their data with the back-reference
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the template does not exist.
    pub async fn delete(&self, id: Uuid) -> DalResult<()> {
        self.crud.hard_delete(id).await
    }
}

fn check_schedule(
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    next_invoice_date: NaiveDate,
) -> DalResult<()> {
    if let Some(end_date) = end_date
        && end_date < start_date
    {
        return Err(FieldError::new("end_date", "must not be before start_date").into());
    }
    if next_invoice_date < start_date {
        return Err(
            FieldError::new("next_invoice_date", "must not be before start_date").into(),
        );
    }
    Ok(())
}

/// Checks the template header amounts against its stored lines.
async fn template_totals<C: ConnectionTrait>(
    conn: &C,
    template_id: Uuid,
    tax_amount: Decimal,
    discount_amount: Decimal,
) -> DalResult<InvoiceTotals> {
    let items = recurring_invoice_items::Entity::find()
        .filter(recurring_invoice_items::Column::RecurringInvoiceId.eq(template_id))
        .all(conn)
        .await?;
    Ok(InvoiceTotals::derive(
        items.into_iter().map(|item| round_money(item.amount)),
        tax_amount,
        discount_amount,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DalError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_schedule_rules() {
        let start = date(2026, 1, 1);
        assert!(check_schedule(start, None, start).is_ok());
        assert!(check_schedule(start, Some(date(2026, 12, 31)), date(2026, 2, 1)).is_ok());
        assert!(matches!(
            check_schedule(start, Some(date(2025, 12, 31)), start),
            Err(DalError::Validation(_))
        ));
        assert!(matches!(
            check_schedule(start, None, date(2025, 12, 1)),
            Err(DalError::Validation(_))
        ));
    }
}
