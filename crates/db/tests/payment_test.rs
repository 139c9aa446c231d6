//! Integration tests for payments.

mod common;

use common::{date, seed_client, seed_invoice, seed_profile, seed_user, setup};
use invoicely_db::entities::payments;
use invoicely_db::entities::sea_orm_active_enums::PaymentMethod;
use invoicely_db::repositories::{
    CreateBankAccountInput, CreatePaymentInput, LineItemInput, UpdatePaymentInput,
};
use invoicely_db::{Dal, DalError, FieldFilter, FindManyArgs};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn cash(invoice_id: Uuid, amount: Decimal) -> CreatePaymentInput {
    CreatePaymentInput {
        invoice_id,
        amount,
        payment_date: date(2026, 3, 10),
        method: PaymentMethod::Cash,
        e_wallet_id: None,
        bank_account_id: None,
        reference: None,
        notes: None,
    }
}

async fn invoice_fixture(dal: &Dal) -> Uuid {
    let user = seed_user(dal, "ana").await;
    let client = seed_client(dal, user.user_id, "Acme").await;
    seed_invoice(
        dal,
        user.user_id,
        client.client_id,
        "INV-001",
        vec![LineItemInput::new("Design", dec!(1), dec!(300.00))],
    )
    .await
    .invoice_id
}

#[tokio::test]
async fn test_record_payments_and_total() {
    let dal = setup().await;
    let invoice_id = invoice_fixture(&dal).await;
    let before = dal.invoices.find_unique(invoice_id).await.unwrap();

    dal.payments.create(cash(invoice_id, dec!(100.00))).await.unwrap();
    let mut second = cash(invoice_id, dec!(50.25));
    second.payment_date = date(2026, 3, 12);
    second.reference = Some("receipt-7".to_string());
    dal.payments.create(second).await.unwrap();

    let listed = dal.payments.list_by_invoice(invoice_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].reference.as_deref(), Some("receipt-7"));
    assert_eq!(dal.payments.total_paid(invoice_id).await.unwrap(), dec!(150.25));

    let after = dal.invoices.find_unique(invoice_id).await.unwrap();
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_payment_for_missing_invoice_is_constraint_violation() {
    let dal = setup().await;
    invoice_fixture(&dal).await;
    let invoices_before = dal.invoices.count(&FindManyArgs::new()).await.unwrap();

    let err = dal
        .payments
        .create(cash(Uuid::now_v7(), dec!(10.00)))
        .await
        .unwrap_err();

    assert!(err.is_constraint_violation(), "{err}");
    assert_eq!(dal.payments.count(&FindManyArgs::new()).await.unwrap(), 0);
    assert_eq!(
        dal.invoices.count(&FindManyArgs::new()).await.unwrap(),
        invoices_before
    );
}

#[tokio::test]
async fn test_payment_for_deleted_invoice_rolls_back() {
    let dal = setup().await;
    let invoice_id = invoice_fixture(&dal).await;
    dal.invoices.soft_delete(invoice_id).await.unwrap();

    let err = dal
        .payments
        .create(cash(invoice_id, dec!(10.00)))
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "{err}");
    assert_eq!(dal.payments.count(&FindManyArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payment_amount_must_be_positive() {
    let dal = setup().await;
    let invoice_id = invoice_fixture(&dal).await;

    for amount in [Decimal::ZERO, dec!(-5.00)] {
        let err = dal.payments.create(cash(invoice_id, amount)).await.unwrap_err();
        assert!(matches!(err, DalError::Validation(_)), "{err}");
    }
    assert_eq!(dal.payments.count(&FindManyArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_bank_transfer_requires_account() {
    let dal = setup().await;
    let invoice_id = invoice_fixture(&dal).await;

    let mut transfer = cash(invoice_id, dec!(100.00));
    transfer.method = PaymentMethod::BankTransfer;
    let err = dal.payments.create(transfer.clone()).await.unwrap_err();
    assert!(matches!(err, DalError::Validation(_)), "{err}");

    let user = dal.users.find_by_username("ana").await.unwrap().unwrap();
    let profile = seed_profile(&dal, user.user_id).await;
    let account = dal
        .bank_accounts
        .create(CreateBankAccountInput {
            profile_id: profile.profile_id,
            bank_name: "First Bank".to_string(),
            account_number: "0011223344".to_string(),
            account_holder: "Ana".to_string(),
            is_primary: true,
        })
        .await
        .unwrap();

    transfer.bank_account_id = Some(account.bank_account_id);
    let payment = dal.payments.create(transfer).await.unwrap();
    assert_eq!(payment.bank_account_id, Some(account.bank_account_id));

    // Removing the account keeps the payment with the reference cleared.
    dal.bank_accounts.delete(account.bank_account_id).await.unwrap();
    let kept = dal.payments.find_unique(payment.payment_id).await.unwrap();
    assert!(kept.bank_account_id.is_none());
}

#[tokio::test]
async fn test_method_filter_validates_domain() {
    let dal = setup().await;
    let invoice_id = invoice_fixture(&dal).await;
    dal.payments.create(cash(invoice_id, dec!(10.00))).await.unwrap();

    let args = FindManyArgs::<payments::Entity>::new()
        .filter(payments::Column::Method, FieldFilter::equals(PaymentMethod::Cash));
    assert_eq!(dal.payments.count(&args).await.unwrap(), 1);

    let args = FindManyArgs::<payments::Entity>::new()
        .where_field("method", FieldFilter::equals("CHEQUE"))
        .unwrap();
    let err = dal.payments.find_many(&args).await.unwrap_err();
    assert!(matches!(err, DalError::Validation(_)), "{err}");
}

#[tokio::test]
async fn test_update_and_delete_payment() {
    let dal = setup().await;
    let invoice_id = invoice_fixture(&dal).await;
    let payment = dal.payments.create(cash(invoice_id, dec!(10.00))).await.unwrap();

    let updated = dal
        .payments
        .update(
            payment.payment_id,
            UpdatePaymentInput {
                amount: Some(dec!(12.50)),
                notes: Some(Some("corrected".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("corrected"));
    assert_eq!(dal.payments.total_paid(invoice_id).await.unwrap(), dec!(12.50));

    let err = dal
        .payments
        .update(
            payment.payment_id,
            UpdatePaymentInput {
                method: Some(PaymentMethod::EWallet),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DalError::Validation(_)), "{err}");

    dal.payments.delete(payment.payment_id).await.unwrap();
    assert!(dal.payments.find_unique(payment.payment_id).await.unwrap_err().is_not_found());
    assert_eq!(dal.payments.total_paid(invoice_id).await.unwrap(), Decimal::ZERO);
}
