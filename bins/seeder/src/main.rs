//! Database seeder for Invoicely development and testing.
//!
//! Seeds a demo user with a profile, payout accounts, a client, a product,
//! an invoice with a partial payment and a monthly recurring template.
//! Running it twice is a no-op.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{Days, NaiveDate, Utc};
use invoicely_db::entities::sea_orm_active_enums::{InvoiceStatus, PaymentMethod, RecurringPattern};
use invoicely_db::migration::{Migrator, MigratorTrait};
use invoicely_db::repositories::{
    CreateBankAccountInput, CreateClientInput, CreateEWalletInput, CreateInvoiceInput,
    CreatePaymentInput, CreateProductInput, CreateProfileInput, CreateRecurringInvoiceInput,
    CreateUserInput, LineItemInput,
};
use invoicely_db::{Dal, connect};
use invoicely_shared::{AppConfig, logging};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

const DEMO_EMAIL: &str = "demo@invoicely.dev";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging);

    let store = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    Migrator::up(store.connection(), None)
        .await
        .context("Failed to run migrations")?;
    let dal = Dal::new(store);

    if dal.users.email_exists(DEMO_EMAIL).await? {
        info!(email = DEMO_EMAIL, "Demo data already present, skipping");
        return Ok(());
    }

    seed_demo(&dal).await?;
    info!("Seeding complete");
    Ok(())
}

async fn seed_demo(dal: &Dal) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();

    let user = dal
        .users
        .create(CreateUserInput {
            email: DEMO_EMAIL.to_string(),
            username: "demo".to_string(),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$demo_hash".to_string(),
        })
        .await?;
    info!(user_id = %user.user_id, "Created demo user");

    let profile = dal
        .profiles
        .create(CreateProfileInput {
            user_id: user.user_id,
            full_name: "Demo Freelancer".to_string(),
            business_name: Some("Demo Studio".to_string()),
            phone: Some("+15550100".to_string()),
            address: Some("1 Market Street".to_string()),
            tax_id: None,
            logo_url: None,
        })
        .await?;

    let bank_account = dal
        .bank_accounts
        .create(CreateBankAccountInput {
            profile_id: profile.profile_id,
            bank_name: "First Demo Bank".to_string(),
            account_number: "0011223344".to_string(),
            account_holder: "Demo Freelancer".to_string(),
            is_primary: true,
        })
        .await?;
    dal.e_wallets
        .create(CreateEWalletInput {
            profile_id: profile.profile_id,
            provider: "PayPal".to_string(),
            account_number: DEMO_EMAIL.to_string(),
            account_holder: "Demo Freelancer".to_string(),
            is_primary: true,
        })
        .await?;

    let client = dal
        .clients
        .create(CreateClientInput {
            user_id: user.user_id,
            name: "Acme Corp".to_string(),
            email: Some("billing@acme.test".to_string()),
            phone: None,
            address: Some("42 Industrial Way".to_string()),
            company: Some("Acme Corp".to_string()),
            notes: None,
        })
        .await?;

    let product = dal
        .products
        .create(CreateProductInput {
            user_id: user.user_id,
            name: "Consulting".to_string(),
            description: Some("Hourly consulting".to_string()),
            unit_price: dec!(90.00),
            unit: Some("hour".to_string()),
        })
        .await?;

    let invoice = dal
        .invoices
        .create(CreateInvoiceInput {
            user_id: user.user_id,
            client_id: client.client_id,
            source_recurring_id: None,
            invoice_number: "INV-0001".to_string(),
            invoice_date: today,
            due_date: days_after(today, 30),
            status: Some(InvoiceStatus::Pending),
            tax_amount: dec!(36.00),
            discount_amount: Decimal::ZERO,
            currency: "USD".to_string(),
            notes: Some("Thank you for your business.".to_string()),
            terms: Some("Net 30".to_string()),
            items: vec![
                LineItemInput::new("Consulting", dec!(4), product.unit_price)
                    .with_product(product.product_id),
                LineItemInput::new("Travel", dec!(1), dec!(60.00)),
            ],
            claimed_subtotal: None,
            claimed_total: None,
        })
        .await?;
    info!(invoice_id = %invoice.invoice_id, total = %invoice.total_amount, "Created demo invoice");

    dal.payments
        .create(CreatePaymentInput {
            invoice_id: invoice.invoice_id,
            amount: dec!(200.00),
            payment_date: today,
            method: PaymentMethod::BankTransfer,
            e_wallet_id: None,
            bank_account_id: Some(bank_account.bank_account_id),
            reference: Some("TRX-0001".to_string()),
            notes: None,
        })
        .await?;
    dal.invoices
        .set_status(invoice.invoice_id, InvoiceStatus::Partial)
        .await?;

    dal.recurring_invoices
        .create(CreateRecurringInvoiceInput {
            user_id: user.user_id,
            client_id: client.client_id,
            pattern: RecurringPattern::Monthly,
            start_date: today,
            end_date: None,
            next_invoice_date: Some(days_after(today, 30)),
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            currency: "USD".to_string(),
            notes: None,
            terms: Some("Net 15".to_string()),
            items: vec![LineItemInput::new("Monthly retainer", dec!(1), dec!(500.00))],
        })
        .await?;

    Ok(())
}

fn days_after(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}
