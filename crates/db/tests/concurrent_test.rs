//! Concurrent writers on shared parent rows.
//!
//! Every scenario runs on in-memory SQLite. Set `INVOICELY_TEST_DATABASE_URL`
//! (or `DATABASE_URL`) to a Postgres database to also run it under READ
//! COMMITTED, where the row locks on profiles and invoices are what keep the
//! primary flag exclusive and the totals complete.

mod common;

use std::env;
use std::sync::Arc;

use futures::future::join_all;
use invoicely_db::migration::{Migrator, MigratorTrait};
use invoicely_db::repositories::{
    CreateBankAccountInput, CreateClientInput, CreateEWalletInput, CreateUserInput, LineItemInput,
};
use invoicely_db::{Dal, connect_url};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;
use uuid::Uuid;

const WRITERS: usize = 16;

fn postgres_url() -> Option<String> {
    env::var("INVOICELY_TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
        .filter(|url| url.starts_with("postgres"))
}

/// The in-memory database, plus Postgres when one is configured.
async fn databases() -> Vec<Dal> {
    let mut dals = vec![common::setup().await];
    if let Some(url) = postgres_url() {
        match connect_url(&url).await {
            Ok(store) => {
                Migrator::up(store.connection(), None)
                    .await
                    .expect("Failed to run migrations");
                dals.push(Dal::new(store));
            }
            Err(e) => eprintln!("Skipping Postgres - database not available: {e}"),
        }
    }
    dals
}

/// Creates a user with a name unique across runs on a shared database.
async fn unique_user(dal: &Dal) -> Uuid {
    let tag = Uuid::new_v4().simple().to_string();
    let name = format!("w{}", &tag[..12]);
    dal.users
        .create(CreateUserInput {
            email: format!("{name}@example.com"),
            username: name,
            password_hash: "$argon2id$test_hash".to_string(),
        })
        .await
        .expect("Failed to create user")
        .user_id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_promotions_leave_one_primary_account() {
    for dal in databases().await {
        let user_id = unique_user(&dal).await;
        let profile = common::seed_profile(&dal, user_id).await;

        let mut accounts = Vec::with_capacity(WRITERS);
        for i in 0..WRITERS {
            let account = dal
                .bank_accounts
                .create(CreateBankAccountInput {
                    profile_id: profile.profile_id,
                    bank_name: format!("Bank {i}"),
                    account_number: format!("{i:010}"),
                    account_holder: "Test Owner".to_string(),
                    is_primary: false,
                })
                .await
                .unwrap();
            accounts.push(account.bank_account_id);
        }

        let dal = Arc::new(dal);
        let barrier = Arc::new(Barrier::new(WRITERS));
        let handles = accounts.into_iter().map(|id| {
            let dal = Arc::clone(&dal);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                dal.bank_accounts.set_primary(id).await
            })
        });

        for result in join_all(handles).await {
            result.expect("task panicked").expect("promotion failed");
        }

        let primaries = dal
            .bank_accounts
            .list_by_profile(profile.profile_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|account| account.is_primary)
            .count();
        assert_eq!(primaries, 1, "backend {:?}", dal.store().backend());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_primary_wallets_stay_exclusive() {
    for dal in databases().await {
        let user_id = unique_user(&dal).await;
        let profile = common::seed_profile(&dal, user_id).await;

        let dal = Arc::new(dal);
        let barrier = Arc::new(Barrier::new(WRITERS));
        let handles = (0..WRITERS).map(|i| {
            let dal = Arc::clone(&dal);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                dal.e_wallets
                    .create(CreateEWalletInput {
                        profile_id: profile.profile_id,
                        provider: format!("Wallet {i}"),
                        account_number: format!("08{i:09}"),
                        account_holder: "Test Owner".to_string(),
                        is_primary: true,
                    })
                    .await
            })
        });

        for result in join_all(handles).await {
            result.expect("task panicked").expect("wallet insert failed");
        }

        let wallets = dal.e_wallets.list_by_profile(profile.profile_id).await.unwrap();
        assert_eq!(wallets.len(), WRITERS);
        assert_eq!(
            wallets.iter().filter(|wallet| wallet.is_primary).count(),
            1,
            "backend {:?}",
            dal.store().backend()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_item_additions_keep_totals_complete() {
    for dal in databases().await {
        let user_id = unique_user(&dal).await;
        let client = dal
            .clients
            .create(CreateClientInput {
                user_id,
                name: "Acme".to_string(),
                email: None,
                phone: None,
                address: None,
                company: None,
                notes: None,
            })
            .await
            .unwrap();
        let invoice = common::seed_invoice(
            &dal,
            user_id,
            client.client_id,
            "INV-CONCURRENT",
            Vec::new(),
        )
        .await;

        let dal = Arc::new(dal);
        let barrier = Arc::new(Barrier::new(WRITERS));
        let handles = (0..WRITERS).map(|i| {
            let dal = Arc::clone(&dal);
            let barrier = Arc::clone(&barrier);
            let invoice_id = invoice.invoice_id;
            tokio::spawn(async move {
                barrier.wait().await;
                dal.invoices
                    .add_item(
                        invoice_id,
                        LineItemInput::new(format!("Line {i}"), dec!(1), dec!(12.50)),
                    )
                    .await
            })
        });

        for result in join_all(handles).await {
            result.expect("task panicked").expect("item insert failed");
        }

        let stored = dal.invoices.find_unique(invoice.invoice_id).await.unwrap();
        let items = dal.invoices.items(invoice.invoice_id).await.unwrap();
        let expected = dec!(12.50) * Decimal::from(WRITERS);
        assert_eq!(items.len(), WRITERS);
        assert_eq!(stored.subtotal, expected, "backend {:?}", dal.store().backend());
        assert_eq!(stored.total_amount, expected);
    }
}
