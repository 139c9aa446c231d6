//! Repository abstractions for data access.
//!
//! One repository per table. Each wraps a [`Store`](crate::Store) and hides
//! the `SeaORM` details from callers; multi-step writes run in a single
//! transaction.

pub mod bank_account;
pub mod client;
pub mod e_wallet;
pub mod invoice;
pub mod payment;
pub mod product;
pub mod profile;
pub mod recurring_invoice;
pub mod user;

pub use bank_account::{BankAccountRepository, CreateBankAccountInput, UpdateBankAccountInput};
pub use client::{ClientRepository, CreateClientInput, UpdateClientInput};
pub use e_wallet::{CreateEWalletInput, EWalletRepository, UpdateEWalletInput};
pub use invoice::{
    CreateInvoiceInput, InvoiceInclude, InvoiceRepository, InvoiceWithRelations, LineItemInput,
    UpdateInvoiceInput, UpdateInvoiceItemInput,
};
pub use payment::{CreatePaymentInput, PaymentRepository, UpdatePaymentInput, check_method};
pub use product::{CreateProductInput, ProductRepository, UpdateProductInput};
pub use profile::{CreateProfileInput, ProfileRepository, ProfileWithAccounts, UpdateProfileInput};
pub use recurring_invoice::{
    CreateRecurringInvoiceInput, RecurringInvoiceRepository, RecurringInvoiceWithItems,
    UpdateRecurringInvoiceInput,
};
pub use user::{CreateUserInput, UpdateUserInput, UserRepository, UserWithProfile};
