//! Data-access layer for the invoicing backend.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the eleven invoicing tables
//! - A generic CRUD core with soft deletes, filtering, sorting and paging
//! - One repository per table, bundled in [`Dal`]
//! - Database migrations

pub mod crud;
pub mod entities;
pub mod error;
pub mod migration;
pub mod query;
pub mod repositories;
pub mod store;

pub use crud::{Crud, DalEntity};
pub use error::{DalError, DalResult};
pub use query::{FieldFilter, FindManyArgs, NullsOrder, OrderBy, QueryMode, SortOrder};
pub use repositories::{
    BankAccountRepository, ClientRepository, EWalletRepository, InvoiceRepository,
    PaymentRepository, ProductRepository, ProfileRepository, RecurringInvoiceRepository,
    UserRepository,
};
pub use store::{Store, connect, connect_url};

/// Every repository over one shared store.
#[derive(Debug, Clone)]
pub struct Dal {
    /// Users.
    pub users: UserRepository,
    /// Profiles.
    pub profiles: ProfileRepository,
    /// Bank accounts.
    pub bank_accounts: BankAccountRepository,
    /// E-wallets.
    pub e_wallets: EWalletRepository,
    /// Clients.
    pub clients: ClientRepository,
    /// Products.
    pub products: ProductRepository,
    /// Invoices and their lines.
    pub invoices: InvoiceRepository,
    /// Payments.
    pub payments: PaymentRepository,
    /// Recurring invoice templates and their lines.
    pub recurring_invoices: RecurringInvoiceRepository,
    store: Store,
}

impl Dal {
    /// Builds every repository over `store`.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            users: UserRepository::new(store.clone()),
            profiles: ProfileRepository::new(store.clone()),
            bank_accounts: BankAccountRepository::new(store.clone()),
            e_wallets: EWalletRepository::new(store.clone()),
            clients: ClientRepository::new(store.clone()),
            products: ProductRepository::new(store.clone()),
            invoices: InvoiceRepository::new(store.clone()),
            payments: PaymentRepository::new(store.clone()),
            recurring_invoices: RecurringInvoiceRepository::new(store.clone()),
            store,
        }
    }

    /// Returns the shared store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }
}
