//! Invoice repository.
//!
//! Owns invoices and their line items. Monetary fields are never taken from
//! the caller: line amounts and invoice totals are derived with
//! `invoicely_core::invoice` and rewritten in the same transaction as any
//! change to their inputs. Caller-supplied totals are only checked against
//! the derived values.

use chrono::NaiveDate;
use invoicely_core::FieldError;
use invoicely_core::invoice::{InvoiceTotals, LineAmounts, line_amount, round_money};
use invoicely_core::validation::{normalize_currency, require_non_empty};
use invoicely_shared::types::{InvoiceId, InvoiceItemId, PageRequest, PageResponse};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, LoaderTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::sea_orm_active_enums::InvoiceStatus;
use crate::entities::{
    clients, invoice_items, invoices, payments, products, recurring_invoices, users,
};
use crate::error::{DalError, DalResult};
use crate::query::FindManyArgs;
use crate::store::Store;

/// One line of an invoice or recurring template.
#[derive(Debug, Clone)]
pub struct LineItemInput {
    /// Catalogue product the line was taken from.
    pub product_id: Option<Uuid>,
    /// Line description.
    pub description: String,
    /// Quantity (> 0).
    pub quantity: Decimal,
    /// Price per unit (>= 0).
    pub unit_price: Decimal,
    /// Line tax (>= 0).
    pub tax_amount: Decimal,
}

impl LineItemInput {
    /// Creates an untaxed line without a product reference.
    #[must_use]
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            product_id: None,
            description: description.into(),
            quantity,
            unit_price,
            tax_amount: Decimal::ZERO,
        }
    }

    /// Sets the line tax.
    #[must_use]
    pub fn with_tax(mut self, tax_amount: Decimal) -> Self {
        self.tax_amount = tax_amount;
        self
    }

    /// Links the line to a product.
    #[must_use]
    pub fn with_product(mut self, product_id: Uuid) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Validates the line and derives its amount.
    pub(crate) fn validate(&self) -> DalResult<(String, LineAmounts)> {
        let description = require_non_empty("description", &self.description)?;
        let amounts = line_amount(self.quantity, self.unit_price, self.tax_amount)?;
        Ok((description, amounts))
    }
}

/// Input for creating an invoice with its lines.
#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    /// Issuing user.
    pub user_id: Uuid,
    /// Billed client; must belong to the same user.
    pub client_id: Uuid,
    /// Recurring template this invoice was generated from.
    pub source_recurring_id: Option<Uuid>,
    /// Invoice number, unique per user.
    pub invoice_number: String,
    /// Issue date.
    pub invoice_date: NaiveDate,
    /// Due date (not before the issue date).
    pub due_date: NaiveDate,
    /// Initial status; DRAFT when absent.
    pub status: Option<InvoiceStatus>,
    /// Header-level tax.
    pub tax_amount: Decimal,
    /// Header-level discount.
    pub discount_amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Notes printed on the invoice.
    pub notes: Option<String>,
    /// Payment terms.
    pub terms: Option<String>,
    /// Lines, stored in order.
    pub items: Vec<LineItemInput>,
    /// Subtotal the caller expects; checked, never stored as given.
    pub claimed_subtotal: Option<Decimal>,
    /// Total the caller expects; checked, never stored as given.
    pub claimed_total: Option<Decimal>,
}

/// Input for updating an invoice header.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoiceInput {
    /// Invoice number.
    pub invoice_number: Option<String>,
    /// Issue date.
    pub invoice_date: Option<NaiveDate>,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// New status, subject to the transition table.
    pub status: Option<InvoiceStatus>,
    /// Header-level tax.
    pub tax_amount: Option<Decimal>,
    /// Header-level discount.
    pub discount_amount: Option<Decimal>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// Notes.
    pub notes: Option<Option<String>>,
    /// Payment terms.
    pub terms: Option<Option<String>>,
    /// Total the caller expects after the update.
    pub claimed_total: Option<Decimal>,
}

/// Input for updating a line item.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoiceItemInput {
    /// Product reference.
    pub product_id: Option<Option<Uuid>>,
    /// Line description.
    pub description: Option<String>,
    /// Quantity.
    pub quantity: Option<Decimal>,
    /// Price per unit.
    pub unit_price: Option<Decimal>,
    /// Line tax.
    pub tax_amount: Option<Decimal>,
}

/// Relations to load together with invoices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceInclude {
    /// Load line items.
    pub items: bool,
    /// Load payments.
    pub payments: bool,
    /// Load the billed client, even if it was soft-deleted since.
    pub client: bool,
}

impl InvoiceInclude {
    /// Loads every relation.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            items: true,
            payments: true,
            client: true,
        }
    }

    /// Loads line items only.
    #[must_use]
    pub const fn items() -> Self {
        Self {
            items: true,
            payments: false,
            client: false,
        }
    }
}

/// Invoice with the relations requested through [`InvoiceInclude`].
///
/// A relation that was not requested is `None`.
#[derive(Debug, Clone)]
pub struct InvoiceWithRelations {
    /// The invoice record.
    pub invoice: invoices::Model,
    /// Line items, oldest first.
    pub items: Option<Vec<invoice_items::Model>>,
    /// Payments, by payment date.
    pub payments: Option<Vec<payments::Model>>,
    /// Billed client.
    pub client: Option<clients::Model>,
}

/// Invoice repository.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    store: Store,
    crud: Crud<invoices::Entity>,
}

impl InvoiceRepository {
    /// Creates a new invoice repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates an invoice and its lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `Validation` for malformed fields, lines or totals, a claimed total
    ///   that does not match, or a client owned by another user
    /// - `NotFound` if the user, client, product or template is missing
    /// - `ConstraintViolation` if the invoice number is already used
    #[instrument(
        skip(self, input),
        fields(user_id = %input.user_id, number = %input.invoice_number)
    )]
    pub async fn create(&self, input: CreateInvoiceInput) -> DalResult<invoices::Model> {
        let invoice_number = require_non_empty("invoice_number", &input.invoice_number)?;
        let currency = normalize_currency(&input.currency)?;
        check_dates(input.invoice_date, input.due_date)?;

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
        totals
            .verify_claims(input.claimed_subtotal, input.claimed_total)
            .inspect_err(|err| warn!(%err, "Rejected invoice totals"))?;

        let txn = self.store.begin().await?;
        Crud::<users::Entity>::fetch_existing(&txn, input.user_id).await?;
        let client = Crud::<clients::Entity>::fetch_existing(&txn, input.client_id).await?;
        if client.user_id != input.user_id {
            return Err(FieldError::new("client_id", "belongs to another user").into());
        }
        if let Some(template_id) = input.source_recurring_id {
            Crud::<recurring_invoices::Entity>::fetch_existing(&txn, template_id).await?;
        }

        let now = now();
        let invoice = invoices::ActiveModel {
            invoice_id: Set(InvoiceId::new().into_inner()),
            user_id: Set(input.user_id),
            client_id: Set(input.client_id),
            source_recurring_id: Set(input.source_recurring_id),
            invoice_number: Set(invoice_number),
            invoice_date: Set(input.invoice_date),
            due_date: Set(input.due_date),
            status: Set(input.status.unwrap_or(InvoiceStatus::Draft)),
            subtotal: Set(totals.subtotal),
            tax_amount: Set(totals.tax_amount),
            discount_amount: Set(totals.discount_amount),
            total_amount: Set(totals.total_amount),
            currency: Set(currency),
            notes: Set(input.notes),
            terms: Set(input.terms),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for ((description, amounts), line) in lines.into_iter().zip(&input.items) {
            insert_item(&txn, &invoice, line.product_id, description, amounts).await?;
        }
        Store::commit(txn).await?;

        debug!(invoice_id = %invoice.invoice_id, total = %invoice.total_amount, "Created invoice");
        Ok(invoice)
    }

    /// Finds a live invoice by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the invoice does not exist or was deleted.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<invoices::Model> {
        self.crud.find_unique(id).await
    }

    /// Finds an invoice by ID, optionally including deleted invoices.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_optional(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> DalResult<Option<invoices::Model>> {
        self.crud.find_optional(id, include_deleted).await
    }

    /// Finds a live invoice by its number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_number(
        &self,
        user_id: Uuid,
        invoice_number: &str,
    ) -> DalResult<Option<invoices::Model>> {
        Ok(invoices::Entity::find()
            .filter(invoices::Column::UserId.eq(user_id))
            .filter(invoices::Column::InvoiceNumber.eq(invoice_number.trim()))
            .filter(invoices::Column::DeletedAt.is_null())
            .one(self.store.connection())
            .await?)
    }

    /// Lists invoices matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<invoices::Entity>,
    ) -> DalResult<Vec<invoices::Model>> {
        self.crud.find_many(args).await
    }

    /// Returns one page of invoices matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_page(
        &self,
        args: &FindManyArgs<invoices::Entity>,
        page: PageRequest,
    ) -> DalResult<PageResponse<invoices::Model>> {
        self.crud.find_page(args, page).await
    }

    /// Counts invoices matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<invoices::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Loads a live invoice with the requested relations.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the invoice does not exist or was deleted.
    pub async fn find_with(
        &self,
        id: Uuid,
        include: InvoiceInclude,
    ) -> DalResult<InvoiceWithRelations> {
        let db = self.store.connection();
        let invoice = self.crud.find_unique(id).await?;

        let items = if include.items {
            Some(
                invoice
                    .find_related(invoice_items::Entity)
                    .order_by_asc(invoice_items::Column::CreatedAt)
                    .order_by_asc(invoice_items::Column::ItemId)
                    .all(db)
                    .await?,
            )
        } else {
            None
        };
        let payments = if include.payments {
            Some(
                invoice
                    .find_related(payments::Entity)
                    .order_by_asc(payments::Column::PaymentDate)
                    .order_by_asc(payments::Column::PaymentId)
                    .all(db)
                    .await?,
            )
        } else {
            None
        };
        let client = if include.client {
            invoice.find_related(clients::Entity).one(db).await?
        } else {
            None
        };

        Ok(InvoiceWithRelations {
            invoice,
            items,
            payments,
            client,
        })
    }

    /// Lists invoices matching `args` with the requested relations.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many_with(
        &self,
        args: &FindManyArgs<invoices::Entity>,
        include: InvoiceInclude,
    ) -> DalResult<Vec<InvoiceWithRelations>> {
        let db = self.store.connection();
        let invoices = self.crud.find_many(args).await?;

        let mut items = if include.items {
            let select = invoice_items::Entity::find()
                .order_by_asc(invoice_items::Column::CreatedAt)
                .order_by_asc(invoice_items::Column::ItemId);
            Some(invoices.load_many(select, db).await?.into_iter())
        } else {
            None
        };
        let mut payments = if include.payments {
            let select = payments::Entity::find()
                .order_by_asc(payments::Column::PaymentDate)
                .order_by_asc(payments::Column::PaymentId);
            Some(invoices.load_many(select, db).await?.into_iter())
        } else {
            None
        };
        let mut clients = if include.client {
            Some(invoices.load_one(clients::Entity, db).await?.into_iter())
        } else {
            None
        };

        Ok(invoices
            .into_iter()
            .map(|invoice| InvoiceWithRelations {
                items: items.as_mut().and_then(Iterator::next),
                payments: payments.as_mut().and_then(Iterator::next),
                client: clients.as_mut().and_then(Iterator::next).flatten(),
                invoice,
            })
            .collect())
    }

    /// Lists the line items of an invoice, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn items(&self, invoice_id: Uuid) -> DalResult<Vec<invoice_items::Model>> {
        Ok(invoice_items::Entity::find()
            .filter(invoice_items::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_items::Column::CreatedAt)
            .order_by_asc(invoice_items::Column::ItemId)
            .all(self.store.connection())
            .await?)
    }

    /// Updates an invoice header and re-derives its totals.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `NotFound` if the invoice does not exist or was deleted
    /// - `Validation` for a disallowed status change, amounts changed on a
    ///   paid or cancelled invoice, or a claimed total that does not match
    /// - `ConstraintViolation` if the new invoice number is already used
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateInvoiceInput) -> DalResult<invoices::Model> {
        let invoice_number = input
            .invoice_number
            .as_deref()
            .map(|number| require_non_empty("invoice_number", number))
            .transpose()?;
        let currency = input.currency.as_deref().map(normalize_currency).transpose()?;

        let txn = self.store.begin().await?;
        let invoice = Crud::<invoices::Entity>::lock_existing(&txn, id).await?;

        let current = invoicely_core::invoice::InvoiceStatus::from(invoice.status);
        let status = match input.status {
            Some(next) => InvoiceStatus::from(current.transition_to(next.into())?),
            None => invoice.status,
        };
        let amounts_changed = input.tax_amount.is_some() || input.discount_amount.is_some();
        if amounts_changed && !current.accepts_item_changes() {
            warn!(invoice_id = %id, status = %current, "Rejected amount change");
            return Err(DalError::Validation(format!(
                "amounts of a {current} invoice cannot change"
            )));
        }
        check_dates(
            input.invoice_date.unwrap_or(invoice.invoice_date),
            input.due_date.unwrap_or(invoice.due_date),
        )?;

        let totals = derive_totals(
            &txn,
            id,
            input.tax_amount.unwrap_or(invoice.tax_amount),
            input.discount_amount.unwrap_or(invoice.discount_amount),
        )
        .await?;
        totals.verify_claims(None, input.claimed_total)?;

        let mut active: invoices::ActiveModel = invoice.into();
        if let Some(invoice_number) = invoice_number {
            active.invoice_number = Set(invoice_number);
        }
        if let Some(invoice_date) = input.invoice_date {
            active.invoice_date = Set(invoice_date);
        }
        if let Some(due_date) = input.due_date {
            active.due_date = Set(due_date);
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
        active.status = Set(status);
        apply_totals(&mut active, &totals);
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(invoice_id = %id, status = %updated.status, "Updated invoice");
        Ok(updated)
    }

    /// Moves an invoice to another status.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the transition is not allowed.
    pub async fn set_status(&self, id: Uuid, status: InvoiceStatus) -> DalResult<invoices::Model> {
        self.update(
            id,
            UpdateInvoiceInput {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Adds a line to an invoice and re-derives its totals.
    ///
    /// Returns the new line and the updated invoice.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed line, a product of another user
    /// or an invoice that is paid or cancelled, and `NotFound` for a missing
    /// invoice or product.
    #[instrument(skip(self, input))]
    pub async fn add_item(
        &self,
        invoice_id: Uuid,
        input: LineItemInput,
    ) -> DalResult<(invoice_items::Model, invoices::Model)> {
        let (description, amounts) = input.validate()?;

        let txn = self.store.begin().await?;
        let invoice = editable_invoice(&txn, invoice_id).await?;
        let item = insert_item(&txn, &invoice, input.product_id, description, amounts).await?;
        let invoice = refresh_totals(&txn, invoice).await?;
        Store::commit(txn).await?;

        debug!(
            %invoice_id,
            item_id = %item.item_id,
            total = %invoice.total_amount,
            "Added invoice item"
        );
        Ok((item, invoice))
    }

    /// Updates a line and re-derives the invoice totals.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not exist and `Validation` for a
    /// malformed line, a product of another user or an invoice that is paid
    /// or cancelled.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateInvoiceItemInput,
    ) -> DalResult<(invoice_items::Model, invoices::Model)> {
        let txn = self.store.begin().await?;
        let (item, invoice) = locked_item(&txn, item_id).await?;

        let line = LineItemInput {
            product_id: input.product_id.unwrap_or(item.product_id),
            description: input.description.unwrap_or_else(|| item.description.clone()),
            quantity: input.quantity.unwrap_or(item.quantity),
            unit_price: input.unit_price.unwrap_or(item.unit_price),
            tax_amount: input.tax_amount.unwrap_or(item.tax_amount),
        };
        let (description, amounts) = line.validate()?;
        if let Some(product_id) = line.product_id
            && Some(product_id) != item.product_id
        {
            check_product(&txn, product_id, invoice.user_id).await?;
        }

        let mut active: invoice_items::ActiveModel = item.into();
        active.product_id = Set(line.product_id);
        active.description = Set(description);
        active.quantity = Set(amounts.quantity);
        active.unit_price = Set(amounts.unit_price);
        active.tax_amount = Set(amounts.tax_amount);
        active.amount = Set(amounts.amount);
        active.updated_at = Set(Some(now()));
        let item = active.update(&txn).await?;

        let invoice = refresh_totals(&txn, invoice).await?;
        Store::commit(txn).await?;

        debug!(%item_id, total = %invoice.total_amount, "Updated invoice item");
        Ok((item, invoice))
    }

    /// Removes a line and re-derives the invoice totals.
    ///
    /// Returns the updated invoice.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not exist and `Validation` if the
    /// invoice is paid or cancelled or its discount would exceed the
    /// remaining amount.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: Uuid) -> DalResult<invoices::Model> {
        let txn = self.store.begin().await?;
        let (item, invoice) = locked_item(&txn, item_id).await?;

        item.delete(&txn).await?;
        let invoice = refresh_totals(&txn, invoice).await?;
        Store::commit(txn).await?;

        debug!(%item_id, total = %invoice.total_amount, "Removed invoice item");
        Ok(invoice)
    }

    /// Soft-deletes an invoice. Lines and payments are kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live invoice has this ID.
    pub async fn soft_delete(&self, id: Uuid) -> DalResult<invoices::Model> {
        self.crud.soft_delete(id).await
    }

    /// Restores a soft-deleted invoice.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no deleted invoice has this ID.
    pub async fn restore(&self, id: Uuid) -> DalResult<invoices::Model> {
        self.crud.restore(id).await
    }
}

fn check_dates(invoice_date: NaiveDate, due_date: NaiveDate) -> DalResult<()> {
    if due_date < invoice_date {
        return Err(FieldError::new("due_date", "must not be before invoice_date").into());
    }
    Ok(())
}

/// Locks a live invoice whose lines may still change.
///
/// Every line mutation takes this lock before touching `invoice_items`, so
/// the totals it re-derives always see the other writers' lines.
async fn editable_invoice<C: ConnectionTrait>(
    conn: &C,
    invoice_id: Uuid,
) -> DalResult<invoices::Model> {
    let invoice = Crud::<invoices::Entity>::lock_existing(conn, invoice_id).await?;
    let status = invoicely_core::invoice::InvoiceStatus::from(invoice.status);
    if !status.accepts_item_changes() {
        warn!(%invoice_id, %status, "Rejected item change");
        return Err(DalError::Validation(format!(
            "items of a {status} invoice cannot change"
        )));
    }
    Ok(invoice)
}

/// Locks the invoice of a line, then reloads the line under that lock.
async fn locked_item<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> DalResult<(invoice_items::Model, invoices::Model)> {
    let item = Crud::<invoice_items::Entity>::fetch_existing(conn, item_id).await?;
    let invoice = editable_invoice(conn, item.invoice_id).await?;
    let item = Crud::<invoice_items::Entity>::fetch_existing(conn, item_id).await?;
    Ok((item, invoice))
}

/// Checks that a product is live and in the catalogue of `user_id`.
pub(crate) async fn check_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    user_id: Uuid,
) -> DalResult<()> {
    let product = Crud::<products::Entity>::fetch_existing(conn, product_id).await?;
    if product.user_id != user_id {
        return Err(FieldError::new("product_id", "belongs to another user").into());
    }
    Ok(())
}

async fn insert_item<C: ConnectionTrait>(
    conn: &C,
    invoice: &invoices::Model,
    product_id: Option<Uuid>,
    description: String,
    amounts: LineAmounts,
) -> DalResult<invoice_items::Model> {
    if let Some(product_id) = product_id {
        check_product(conn, product_id, invoice.user_id).await?;
    }

    let now = now();
    Ok(invoice_items::ActiveModel {
        item_id: Set(InvoiceItemId::new().into_inner()),
        invoice_id: Set(invoice.invoice_id),
        product_id: Set(product_id),
        description: Set(description),
        quantity: Set(amounts.quantity),
        unit_price: Set(amounts.unit_price),
        tax_amount: Set(amounts.tax_amount),
        amount: Set(amounts.amount),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
    }
    .insert(conn)
    .await?)
}

/// Derives invoice totals from the stored lines.
async fn derive_totals<C: ConnectionTrait>(
    conn: &C,
    invoice_id: Uuid,
    tax_amount: Decimal,
    discount_amount: Decimal,
) -> DalResult<InvoiceTotals> {
    let items = invoice_items::Entity::find()
        .filter(invoice_items::Column::InvoiceId.eq(invoice_id))
        .all(conn)
        .await?;
    Ok(InvoiceTotals::derive(
        items.into_iter().map(|item| round_money(item.amount)),
        tax_amount,
        discount_amount,
    )?)
}

/// Rewrites the totals of an invoice from its stored lines.
async fn refresh_totals<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
) -> DalResult<invoices::Model> {
    let totals = derive_totals(
        conn,
        invoice.invoice_id,
        invoice.tax_amount,
        invoice.discount_amount,
    )
    .await?;

    let mut active: invoices::ActiveModel = invoice.into();
    apply_totals(&mut active, &totals);
    active.updated_at = Set(Some(now()));
    Ok(active.update(conn).await?)
}

fn apply_totals(active: &mut invoices::ActiveModel, totals: &InvoiceTotals) {
    active.subtotal = Set(totals.subtotal);
    active.tax_amount = Set(totals.tax_amount);
    active.discount_amount = Set(totals.discount_amount);
    active.total_amount = Set(totals.total_amount);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_validation() {
        let (description, amounts) = LineItemInput::new("  Design work ", dec!(2), dec!(150.00))
            .with_tax(dec!(30.00))
            .validate()
            .unwrap();
        assert_eq!(description, "Design work");
        assert_eq!(amounts.amount, dec!(330.00));
    }

    #[test]
    fn test_line_validation_rejects_bad_input() {
        let blank = LineItemInput::new("   ", dec!(1), dec!(1));
        assert!(matches!(blank.validate(), Err(DalError::Validation(_))));

        let zero_quantity = LineItemInput::new("Hosting", dec!(0), dec!(10));
        assert!(matches!(zero_quantity.validate(), Err(DalError::Validation(_))));
    }

    #[test]
    fn test_due_date_not_before_invoice_date() {
        let issued = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let before = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert!(check_dates(issued, issued).is_ok());
        assert!(matches!(check_dates(issued, before), Err(DalError::Validation(_))));
    }

    #[test]
    fn test_include_presets() {
        let none = InvoiceInclude::default();
        assert!(!none.items && !none.payments && !none.client);
        assert!(InvoiceInclude::all().client);
        assert!(!InvoiceInclude::items().payments);
    }
}
