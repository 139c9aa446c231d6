//! Initial invoicing schema.
//!
//! Tables are generated from the entity definitions so the same migration
//! runs on PostgreSQL and SQLite. Enum and amount CHECK constraints are only
//! added on PostgreSQL; other backends rely on the data layer's validation.

use sea_orm::{DbBackend, EntityTrait, Schema};
use sea_orm_migration::prelude::*;

use crate::entities::sea_orm_active_enums::{InvoiceStatus, PaymentMethod, RecurringPattern};
use crate::entities::{
    bank_accounts, clients, e_wallets, invoice_items, invoices, payments, products, profiles,
    recurring_invoice_items, recurring_invoices, users,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // ============================================================
        // PART 1: USERS & PROFILES
        // ============================================================
        create(manager, &schema, users::Entity).await?;
        create(manager, &schema, profiles::Entity).await?;
        create(manager, &schema, bank_accounts::Entity).await?;
        create(manager, &schema, e_wallets::Entity).await?;

        // ============================================================
        // PART 2: CATALOGUE
        // ============================================================
        create(manager, &schema, clients::Entity).await?;
        create(manager, &schema, products::Entity).await?;

        // ============================================================
        // PART 3: RECURRING TEMPLATES
        // ============================================================
        create(manager, &schema, recurring_invoices::Entity).await?;
        create(manager, &schema, recurring_invoice_items::Entity).await?;

        // ============================================================
        // PART 4: INVOICES & PAYMENTS
        // ============================================================
        create(manager, &schema, invoices::Entity).await?;
        create(manager, &schema, invoice_items::Entity).await?;
        create(manager, &schema, payments::Entity).await?;

        // ============================================================
        // PART 5: INDEXES
        // ============================================================
        manager
            .create_index(
                Index::create()
                    .name("uq_invoices_user_number")
                    .table(invoices::Entity)
                    .col(invoices::Column::UserId)
                    .col(invoices::Column::InvoiceNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;
        index(
            manager,
            "idx_bank_accounts_profile",
            bank_accounts::Entity,
            bank_accounts::Column::ProfileId,
        )
        .await?;
        index(
            manager,
            "idx_e_wallets_profile",
            e_wallets::Entity,
            e_wallets::Column::ProfileId,
        )
        .await?;
        index(
            manager,
            "idx_clients_user",
            clients::Entity,
            clients::Column::UserId,
        )
        .await?;
        index(
            manager,
            "idx_products_user",
            products::Entity,
            products::Column::UserId,
        )
        .await?;
        index(
            manager,
            "idx_invoices_client",
            invoices::Entity,
            invoices::Column::ClientId,
        )
        .await?;
        index(
            manager,
            "idx_invoices_status",
            invoices::Entity,
            invoices::Column::Status,
        )
        .await?;
        index(
            manager,
            "idx_invoice_items_invoice",
            invoice_items::Entity,
            invoice_items::Column::InvoiceId,
        )
        .await?;
        index(
            manager,
            "idx_payments_invoice",
            payments::Entity,
            payments::Column::InvoiceId,
        )
        .await?;
        index(
            manager,
            "idx_recurring_invoices_next_date",
            recurring_invoices::Entity,
            recurring_invoices::Column::NextInvoiceDate,
        )
        .await?;
        index(
            manager,
            "idx_recurring_invoice_items_template",
            recurring_invoice_items::Entity,
            recurring_invoice_items::Column::RecurringInvoiceId,
        )
        .await?;

        // ============================================================
        // PART 6: CHECK CONSTRAINTS (PostgreSQL)
        // ============================================================
        if matches!(backend, DbBackend::Postgres) {
            let db = manager.get_connection();
            db.execute_unprepared(&check_in("invoices", "status", &InvoiceStatus::domain()))
                .await?;
            db.execute_unprepared(&check_in("payments", "method", &PaymentMethod::domain()))
                .await?;
            db.execute_unprepared(&check_in(
                "recurring_invoices",
                "pattern",
                &RecurringPattern::domain(),
            ))
            .await?;
            db.execute_unprepared(AMOUNT_CHECKS_SQL).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, payments::Entity).await?;
        drop_table(manager, invoice_items::Entity).await?;
        drop_table(manager, invoices::Entity).await?;
        drop_table(manager, recurring_invoice_items::Entity).await?;
        drop_table(manager, recurring_invoices::Entity).await?;
        drop_table(manager, products::Entity).await?;
        drop_table(manager, clients::Entity).await?;
        drop_table(manager, e_wallets::Entity).await?;
        drop_table(manager, bank_accounts::Entity).await?;
        drop_table(manager, profiles::Entity).await?;
        drop_table(manager, users::Entity).await?;
        Ok(())
    }
}

async fn create<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .create_table(schema.create_table_from_entity(entity).if_not_exists().to_owned())
        .await
}

async fn drop_table<E: EntityTrait>(manager: &SchemaManager<'_>, entity: E) -> Result<(), DbErr> {
    manager
        .drop_table(Table::drop().table(entity).if_exists().to_owned())
        .await
}

async fn index<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    name: &str,
    entity: E,
    column: E::Column,
) -> Result<(), DbErr> {
    manager
        .create_index(
            Index::create()
                .name(name)
                .table(entity)
                .col(column)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

fn check_in(table: &str, column: &str, domain: &[String]) -> String {
    let values = domain
        .iter()
        .map(|value| format!("'{value}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "ALTER TABLE {table} ADD CONSTRAINT chk_{table}_{column} CHECK ({column} IN ({values}));"
    )
}

const AMOUNT_CHECKS_SQL: &str = r"
ALTER TABLE products
    ADD CONSTRAINT chk_products_unit_price CHECK (unit_price >= 0);

ALTER TABLE invoices
    ADD CONSTRAINT chk_invoices_amounts CHECK (
        subtotal >= 0 AND tax_amount >= 0 AND discount_amount >= 0 AND total_amount >= 0
    );

ALTER TABLE invoice_items
    ADD CONSTRAINT chk_invoice_items_quantity CHECK (quantity > 0),
    ADD CONSTRAINT chk_invoice_items_amounts CHECK (unit_price >= 0 AND tax_amount >= 0);

ALTER TABLE payments
    ADD CONSTRAINT chk_payments_amount CHECK (amount > 0);

ALTER TABLE recurring_invoice_items
    ADD CONSTRAINT chk_recurring_invoice_items_quantity CHECK (quantity > 0);
";
