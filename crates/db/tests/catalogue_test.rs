//! Integration tests for clients and products.

mod common;

use common::{seed_client, seed_invoice, seed_user, setup};
use invoicely_db::entities::{clients, products};
use invoicely_db::repositories::{
    CreateClientInput, CreateProductInput, InvoiceInclude, UpdateClientInput, UpdateProductInput,
};
use invoicely_db::{DalError, FieldFilter, FindManyArgs, NullsOrder, QueryMode, SortOrder};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn product_input(user_id: Uuid, name: &str) -> CreateProductInput {
    CreateProductInput {
        user_id,
        name: name.to_string(),
        description: None,
        unit_price: dec!(45.00),
        unit: Some("hour".to_string()),
    }
}

#[tokio::test]
async fn test_client_email_is_normalized() {
    let dal = setup().await;
    let user = seed_user(&dal, "ana").await;

    let client = dal
        .clients
        .create(CreateClientInput {
            user_id: user.user_id,
            name: "  Acme  ".to_string(),
            email: Some(" Billing@ACME.test".to_string()),
            phone: None,
            address: None,
            company: None,
            notes: None,
        })
        .await
        .unwrap();

    assert_eq!(client.name, "Acme");
    assert_eq!(client.email.as_deref(), Some("billing@acme.test"));

    let updated = dal
        .clients
        .update(
            client.client_id,
            UpdateClientInput {
                email: Some(None),
                phone: Some(Some("+15550100".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.email.is_none());
    assert_eq!(updated.phone.as_deref(), Some("+15550100"));
}

#[tokio::test]
async fn test_client_for_missing_user_is_not_found() {
    let dal = setup().await;

    let err = dal
        .clients
        .create(CreateClientInput {
            user_id: Uuid::now_v7(),
            name: "Acme".to_string(),
            email: None,
            phone: None,
            address: None,
            company: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn test_list_clients_by_user() {
    let dal = setup().await;
    let ana = seed_user(&dal, "ana").await;
    let bob = seed_user(&dal, "bob").await;
    seed_client(&dal, ana.user_id, "Globex").await;
    seed_client(&dal, ana.user_id, "Acme").await;
    seed_client(&dal, bob.user_id, "Initech").await;

    let names: Vec<_> = dal
        .clients
        .list_by_user(ana.user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Acme", "Globex"]);

    let args = FindManyArgs::<clients::Entity>::new().filter(
        clients::Column::Name,
        FieldFilter::starts_with("ini", QueryMode::Insensitive),
    );
    assert_eq!(dal.clients.count(&args).await.unwrap(), 1);
}

#[tokio::test]
async fn test_deleted_client_still_loads_through_invoice() {
    let dal = setup().await;
    let user = seed_user(&dal, "ana").await;
    let client = seed_client(&dal, user.user_id, "Acme").await;
    let invoice = seed_invoice(&dal, user.user_id, client.client_id, "INV-001", Vec::new()).await;

    dal.clients.soft_delete(client.client_id).await.unwrap();
    assert!(dal.clients.find_unique(client.client_id).await.unwrap_err().is_not_found());
    assert!(dal.clients.list_by_user(user.user_id).await.unwrap().is_empty());

    let loaded = dal
        .invoices
        .find_with(invoice.invoice_id, InvoiceInclude::all())
        .await
        .unwrap();
    let billed = loaded.client.expect("client should load");
    assert!(billed.deleted_at.is_some());

    // New invoices cannot bill a deleted client.
    let err = dal
        .invoices
        .create(common::invoice_input(user.user_id, client.client_id, "INV-002"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");

    dal.clients.restore(client.client_id).await.unwrap();
    assert_eq!(dal.clients.list_by_user(user.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_product_price_rules() {
    let dal = setup().await;
    let user = seed_user(&dal, "ana").await;

    let mut negative = product_input(user.user_id, "Consulting");
    negative.unit_price = dec!(-1.00);
    let err = dal.products.create(negative).await.unwrap_err();
    assert!(matches!(err, DalError::Validation(_)), "{err}");

    let mut free = product_input(user.user_id, "Intro call");
    free.unit_price = dec!(0);
    let free = dal.products.create(free).await.unwrap();
    assert!(free.unit_price.is_zero());

    let product = dal
        .products
        .create(product_input(user.user_id, "Consulting"))
        .await
        .unwrap();
    let updated = dal
        .products
        .update(
            product.product_id,
            UpdateProductInput {
                unit_price: Some(dec!(50.00)),
                unit: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.unit_price, dec!(50.00));
    assert!(updated.unit.is_none());

    let err = dal
        .products
        .update(
            product.product_id,
            UpdateProductInput {
                unit_price: Some(dec!(-3.00)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DalError::Validation(_)), "{err}");
}

#[tokio::test]
async fn test_products_sorted_with_null_descriptions_first() {
    let dal = setup().await;
    let user = seed_user(&dal, "ana").await;

    let mut described = product_input(user.user_id, "Audit");
    described.description = Some("Yearly audit".to_string());
    dal.products.create(described).await.unwrap();
    dal.products
        .create(product_input(user.user_id, "Hosting"))
        .await
        .unwrap();

    let args = FindManyArgs::<products::Entity>::new().order_by_nulls(
        products::Column::Description,
        SortOrder::Asc,
        NullsOrder::First,
    );
    let names: Vec<_> = dal
        .products
        .find_many(&args)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["Hosting", "Audit"]);

    let args = FindManyArgs::<products::Entity>::new().order_by_nulls(
        products::Column::Description,
        SortOrder::Asc,
        NullsOrder::Last,
    );
    let first = dal.products.find_many(&args).await.unwrap();
    assert_eq!(first[0].name, "Audit");
}
