//! Entity type aliases.

pub use super::bank_accounts::Entity as BankAccounts;
pub use super::clients::Entity as Clients;
pub use super::e_wallets::Entity as EWallets;
pub use super::invoice_items::Entity as InvoiceItems;
pub use super::invoices::Entity as Invoices;
pub use super::payments::Entity as Payments;
pub use super::products::Entity as Products;
pub use super::profiles::Entity as Profiles;
pub use super::recurring_invoice_items::Entity as RecurringInvoiceItems;
pub use super::recurring_invoices::Entity as RecurringInvoices;
pub use super::users::Entity as Users;
