//! Shared fixtures for the integration tests.
//!
//! Every test gets its own in-memory SQLite database with the full schema
//! migrated, so tests never see each other's rows.

#![allow(dead_code)]

use chrono::NaiveDate;
use invoicely_db::entities::{clients, invoices, profiles, users};
use invoicely_db::migration::{Migrator, MigratorTrait};
use invoicely_db::repositories::{
    CreateClientInput, CreateInvoiceInput, CreateProfileInput, CreateUserInput, LineItemInput,
};
use invoicely_db::{Dal, connect_url};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Opens a fresh migrated database.
pub async fn setup() -> Dal {
    let store = connect_url("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(store.connection(), None)
        .await
        .expect("Failed to run migrations");
    Dal::new(store)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub async fn seed_user(dal: &Dal, name: &str) -> users::Model {
    dal.users
        .create(CreateUserInput {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            password_hash: "$argon2id$test_hash".to_string(),
        })
        .await
        .expect("Failed to create user")
}

pub async fn seed_profile(dal: &Dal, user_id: Uuid) -> profiles::Model {
    dal.profiles
        .create(CreateProfileInput {
            user_id,
            full_name: "Test Owner".to_string(),
            business_name: Some("Test Studio".to_string()),
            phone: None,
            address: None,
            tax_id: None,
            logo_url: None,
        })
        .await
        .expect("Failed to create profile")
}

pub async fn seed_client(dal: &Dal, user_id: Uuid, name: &str) -> clients::Model {
    dal.clients
        .create(CreateClientInput {
            user_id,
            name: name.to_string(),
            email: Some(format!("billing@{}.test", name.to_lowercase().replace(' ', "-"))),
            phone: None,
            address: None,
            company: Some(name.to_string()),
            notes: None,
        })
        .await
        .expect("Failed to create client")
}

/// Invoice input with no lines and no header amounts.
pub fn invoice_input(user_id: Uuid, client_id: Uuid, number: &str) -> CreateInvoiceInput {
    CreateInvoiceInput {
        user_id,
        client_id,
        source_recurring_id: None,
        invoice_number: number.to_string(),
        invoice_date: date(2026, 3, 1),
        due_date: date(2026, 3, 31),
        status: None,
        tax_amount: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        currency: "usd".to_string(),
        notes: None,
        terms: None,
        items: Vec::new(),
        claimed_subtotal: None,
        claimed_total: None,
    }
}

pub async fn seed_invoice(
    dal: &Dal,
    user_id: Uuid,
    client_id: Uuid,
    number: &str,
    items: Vec<LineItemInput>,
) -> invoices::Model {
    let mut input = invoice_input(user_id, client_id, number);
    input.items = items;
    dal.invoices
        .create(input)
        .await
        .expect("Failed to create invoice")
}
