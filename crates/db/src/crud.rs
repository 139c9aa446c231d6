//! Generic record operations shared by every entity.
//!
//! `DalEntity` describes what the generic layer needs to know about a table:
//! its display name, primary key column, optional soft-delete and
//! modification columns, and the enum domains of constrained columns.
//! `Crud<E>` builds unique lookups, filtered listing, counting, paging and
//! deletion on top of it.

use std::marker::PhantomData;

use chrono::Utc;
use invoicely_shared::types::{PageRequest, PageResponse};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Select,
    Value,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::{
    bank_accounts, clients, e_wallets, invoice_items, invoices, payments, products, profiles,
    recurring_invoice_items, recurring_invoices, sea_orm_active_enums, users,
};
use crate::error::{DalError, DalResult};
use crate::query::FindManyArgs;
use crate::store::Store;

/// Table metadata used by the generic operations.
pub trait DalEntity: EntityTrait {
    /// Name used in errors and logs.
    const NAME: &'static str;

    /// Primary key column.
    fn primary_column() -> Self::Column;

    /// `deleted_at` column for soft-deletable tables.
    fn deleted_at_column() -> Option<Self::Column> {
        None
    }

    /// `updated_at` column, bumped by generic writes.
    fn updated_at_column() -> Option<Self::Column> {
        None
    }

    /// Allowed values of an enum-constrained column.
    fn enum_domain(_column: Self::Column) -> Option<Vec<String>> {
        None
    }
}

/// Current time in the offset stored by the timestamp columns.
pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// Generic operations over one entity.
pub struct Crud<E> {
    store: Store,
    _entity: PhantomData<E>,
}

impl<E> Clone for Crud<E> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<E> std::fmt::Debug for Crud<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crud").field("store", &self.store).finish()
    }
}

impl<E> Crud<E> {
    /// Creates the generic operations for one entity.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }
}

impl<E> Crud<E>
where
    E: DalEntity,
    E::Model: Sync,
{
    /// Loads a row by key on any connection, honouring soft deletes.
    pub(crate) async fn fetch<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        include_deleted: bool,
    ) -> DalResult<Option<E::Model>> {
        Ok(Self::by_id(id, include_deleted).one(conn).await?)
    }

    fn by_id(id: Uuid, include_deleted: bool) -> Select<E> {
        let mut select = E::find().filter(E::primary_column().eq(id));
        if !include_deleted && let Some(deleted_at) = E::deleted_at_column() {
            select = select.filter(deleted_at.is_null());
        }
        select
    }

    /// Loads a row by key on any connection, failing if it is absent.
    pub(crate) async fn fetch_existing<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> DalResult<E::Model> {
        Self::fetch(conn, id, false)
            .await?
            .ok_or_else(|| DalError::not_found(E::NAME, id))
    }

    /// Loads a live row with `SELECT ... FOR UPDATE`, failing if it is absent.
    ///
    /// The lock is held until `conn`'s transaction ends, so writers that
    /// re-derive state from a parent row take turns. SQLite has no row locks
    /// and serialises writers already.
    pub(crate) async fn lock_existing<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> DalResult<E::Model> {
        Self::by_id(id, false)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| DalError::not_found(E::NAME, id))
    }

    /// Finds a live row by primary key.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live row has this key.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn find_unique(&self, id: Uuid) -> DalResult<E::Model> {
        Self::fetch_existing(self.store.connection(), id).await
    }

    /// Finds a row by primary key, returning `None` if absent.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn find_optional(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> DalResult<Option<E::Model>> {
        Self::fetch(self.store.connection(), id, include_deleted).await
    }

    /// Returns every row matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for operands outside an enum domain.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn find_many(&self, args: &FindManyArgs<E>) -> DalResult<Vec<E::Model>> {
        Ok(args.select()?.all(self.store.connection()).await?)
    }

    /// Returns the first row matching `args`.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn find_first(&self, args: &FindManyArgs<E>) -> DalResult<Option<E::Model>> {
        Ok(args.select()?.one(self.store.connection()).await?)
    }

    /// Counts rows matching the filters of `args`.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn count(&self, args: &FindManyArgs<E>) -> DalResult<u64> {
        Ok(E::find()
            .filter(args.condition()?)
            .count(self.store.connection())
            .await?)
    }

    /// Returns one page of rows matching `args` plus the total count.
    ///
    /// The page replaces any skip/take already set on `args`.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn find_page(
        &self,
        args: &FindManyArgs<E>,
        page: PageRequest,
    ) -> DalResult<PageResponse<E::Model>> {
        let total = self.count(args).await?;
        let data = args
            .select_unpaged()?
            .offset(page.offset())
            .limit(page.limit())
            .all(self.store.connection())
            .await?;
        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Returns true if a live row has this key.
    pub async fn exists(&self, id: Uuid) -> DalResult<bool> {
        Ok(Self::fetch(self.store.connection(), id, false)
            .await?
            .is_some())
    }

    /// Marks a live row deleted.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the table has no `deleted_at` column and
    /// `NotFound` if no live row has this key.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn soft_delete(&self, id: Uuid) -> DalResult<E::Model> {
        let deleted_at = E::deleted_at_column().ok_or_else(|| {
            DalError::Validation(format!("{} does not support soft delete", E::NAME))
        })?;

        let txn = self.store.begin().await?;
        let stamp = now();
        let mut update = E::update_many()
            .col_expr(deleted_at, SimpleExpr::Value(Value::from(stamp)))
            .filter(E::primary_column().eq(id))
            .filter(deleted_at.is_null());
        if let Some(updated_at) = E::updated_at_column() {
            update = update.col_expr(updated_at, SimpleExpr::Value(Value::from(stamp)));
        }
        let result = update.exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(DalError::not_found(E::NAME, id));
        }

        let model = Self::fetch(&txn, id, true)
            .await?
            .ok_or_else(|| DalError::not_found(E::NAME, id))?;
        Store::commit(txn).await?;

        debug!(%id, "Soft-deleted {}", E::NAME);
        Ok(model)
    }

    /// Clears `deleted_at` on a soft-deleted row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no soft-deleted row has this key.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn restore(&self, id: Uuid) -> DalResult<E::Model> {
        let deleted_at = E::deleted_at_column().ok_or_else(|| {
            DalError::Validation(format!("{} does not support soft delete", E::NAME))
        })?;

        let txn = self.store.begin().await?;
        let mut update = E::update_many()
            .col_expr(
                deleted_at,
                SimpleExpr::Value(Option::<DateTimeWithTimeZone>::None.into()),
            )
            .filter(E::primary_column().eq(id))
            .filter(deleted_at.is_not_null());
        if let Some(updated_at) = E::updated_at_column() {
            update = update.col_expr(updated_at, SimpleExpr::Value(Value::from(now())));
        }
        let result = update.exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(DalError::not_found(E::NAME, id));
        }

        let model = Self::fetch_existing(&txn, id).await?;
        Store::commit(txn).await?;

        debug!(%id, "Restored {}", E::NAME);
        Ok(model)
    }

    /// Permanently removes a row, soft-deleted or not.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row has this key and `ConstraintViolation`
    /// if other rows still reference it.
    #[instrument(skip(self), fields(entity = E::NAME))]
    pub async fn hard_delete(&self, id: Uuid) -> DalResult<()> {
        let result = E::delete_many()
            .filter(E::primary_column().eq(id))
            .exec(self.store.connection())
            .await?;
        if result.rows_affected == 0 {
            return Err(DalError::not_found(E::NAME, id));
        }
        debug!(%id, "Deleted {}", E::NAME);
        Ok(())
    }

    /// Soft-deletes where supported, otherwise removes the row.
    pub async fn delete(&self, id: Uuid) -> DalResult<()> {
        if E::deleted_at_column().is_some() {
            self.soft_delete(id).await.map(|_| ())
        } else {
            self.hard_delete(id).await
        }
    }
}

impl DalEntity for users::Entity {
    const NAME: &'static str = "user";

    fn primary_column() -> Self::Column {
        users::Column::UserId
    }

    fn deleted_at_column() -> Option<Self::Column> {
        Some(users::Column::DeletedAt)
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(users::Column::UpdatedAt)
    }
}

impl DalEntity for profiles::Entity {
    const NAME: &'static str = "profile";

    fn primary_column() -> Self::Column {
        profiles::Column::ProfileId
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(profiles::Column::UpdatedAt)
    }
}

impl DalEntity for bank_accounts::Entity {
    const NAME: &'static str = "bank account";

    fn primary_column() -> Self::Column {
        bank_accounts::Column::BankAccountId
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(bank_accounts::Column::UpdatedAt)
    }
}

impl DalEntity for e_wallets::Entity {
    const NAME: &'static str = "e-wallet";

    fn primary_column() -> Self::Column {
        e_wallets::Column::EWalletId
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(e_wallets::Column::UpdatedAt)
    }
}

impl DalEntity for clients::Entity {
    const NAME: &'static str = "client";

    fn primary_column() -> Self::Column {
        clients::Column::ClientId
    }

    fn deleted_at_column() -> Option<Self::Column> {
        Some(clients::Column::DeletedAt)
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(clients::Column::UpdatedAt)
    }
}

impl DalEntity for products::Entity {
    const NAME: &'static str = "product";

    fn primary_column() -> Self::Column {
        products::Column::ProductId
    }

    fn deleted_at_column() -> Option<Self::Column> {
        Some(products::Column::DeletedAt)
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(products::Column::UpdatedAt)
    }
}

impl DalEntity for invoices::Entity {
    const NAME: &'static str = "invoice";

    fn primary_column() -> Self::Column {
        invoices::Column::InvoiceId
    }

    fn deleted_at_column() -> Option<Self::Column> {
        Some(invoices::Column::DeletedAt)
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(invoices::Column::UpdatedAt)
    }

    fn enum_domain(column: Self::Column) -> Option<Vec<String>> {
        matches!(column, invoices::Column::Status)
            .then(sea_orm_active_enums::InvoiceStatus::domain)
    }
}

impl DalEntity for invoice_items::Entity {
    const NAME: &'static str = "invoice item";

    fn primary_column() -> Self::Column {
        invoice_items::Column::ItemId
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(invoice_items::Column::UpdatedAt)
    }
}

impl DalEntity for payments::Entity {
    const NAME: &'static str = "payment";

    fn primary_column() -> Self::Column {
        payments::Column::PaymentId
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(payments::Column::UpdatedAt)
    }

    fn enum_domain(column: Self::Column) -> Option<Vec<String>> {
        matches!(column, payments::Column::Method)
            .then(sea_orm_active_enums::PaymentMethod::domain)
    }
}

impl DalEntity for recurring_invoices::Entity {
    const NAME: &'static str = "recurring invoice";

    fn primary_column() -> Self::Column {
        recurring_invoices::Column::Id
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(recurring_invoices::Column::UpdatedAt)
    }

    fn enum_domain(column: Self::Column) -> Option<Vec<String>> {
        matches!(column, recurring_invoices::Column::Pattern)
            .then(sea_orm_active_enums::RecurringPattern::domain)
    }
}

impl DalEntity for recurring_invoice_items::Entity {
    const NAME: &'static str = "recurring invoice item";

    fn primary_column() -> Self::Column {
        recurring_invoice_items::Column::Id
    }

    fn updated_at_column() -> Option<Self::Column> {
        Some(recurring_invoice_items::Column::UpdatedAt)
    }
}
