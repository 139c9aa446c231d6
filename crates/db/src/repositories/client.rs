//! Client repository.

use invoicely_core::validation::{normalize_email, require_non_empty};
use invoicely_shared::types::{ClientId, PageRequest, PageResponse};
use sea_orm::{ActiveModelTrait, Set};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::{clients, users};
use crate::error::DalResult;
use crate::query::{FieldFilter, FindManyArgs, SortOrder};
use crate::store::Store;

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct CreateClientInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Client name.
    pub name: String,
    /// Billing email.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// Company name.
    pub company: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Input for updating a client.
#[derive(Debug, Clone, Default)]
pub struct UpdateClientInput {
    /// Client name.
    pub name: Option<String>,
    /// Billing email.
    pub email: Option<Option<String>>,
    /// Phone number.
    pub phone: Option<Option<String>>,
    /// Postal address.
    pub address: Option<Option<String>>,
    /// Company name.
    pub company: Option<Option<String>>,
    /// Free-form notes.
    pub notes: Option<Option<String>>,
}

/// Client repository.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    store: Store,
    crud: Crud<clients::Entity>,
}

impl ClientRepository {
    /// Creates a new client repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates a client for a live user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name or malformed email and
    /// `NotFound` if the user does not exist or was deleted.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create(&self, input: CreateClientInput) -> DalResult<clients::Model> {
        let name = require_non_empty("name", &input.name)?;
        let email = input.email.as_deref().map(normalize_email).transpose()?;

        let txn = self.store.begin().await?;
        Crud::<users::Entity>::fetch_existing(&txn, input.user_id).await?;

        let now = now();
        let client = clients::ActiveModel {
            client_id: Set(ClientId::new().into_inner()),
            user_id: Set(input.user_id),
            name: Set(name),
            email: Set(email),
            phone: Set(input.phone),
            address: Set(input.address),
            company: Set(input.company),
            notes: Set(input.notes),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;
        Store::commit(txn).await?;

        debug!(client_id = %client.client_id, "Created client");
        Ok(client)
    }

    /// Finds a live client by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client does not exist or was deleted.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<clients::Model> {
        self.crud.find_unique(id).await
    }

    /// Lists clients matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<clients::Entity>,
    ) -> DalResult<Vec<clients::Model>> {
        self.crud.find_many(args).await
    }

    /// Returns one page of clients matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_page(
        &self,
        args: &FindManyArgs<clients::Entity>,
        page: PageRequest,
    ) -> DalResult<PageResponse<clients::Model>> {
        self.crud.find_page(args, page).await
    }

    /// Counts clients matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<clients::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Lists the live clients of a user by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_user(&self, user_id: Uuid) -> DalResult<Vec<clients::Model>> {
        let args = FindManyArgs::new()
            .filter(clients::Column::UserId, FieldFilter::equals(user_id))
            .order_by(clients::Column::Name, SortOrder::Asc);
        self.crud.find_many(&args).await
    }

    /// Updates a live client.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client does not exist or was deleted.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateClientInput) -> DalResult<clients::Model> {
        let name = input
            .name
            .as_deref()
            .map(|name| require_non_empty("name", name))
            .transpose()?;
        let email = match input.email {
            Some(Some(email)) => Some(Some(normalize_email(&email)?)),
            other => other,
        };

        let txn = self.store.begin().await?;
        let client = Crud::<clients::Entity>::fetch_existing(&txn, id).await?;

        let mut active: clients::ActiveModel = client.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(address) = input.address {
            active.address = Set(address);
        }
        if let Some(company) = input.company {
            active.company = Set(company);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(notes);
        }
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(client_id = %id, "Updated client");
        Ok(updated)
    }

    /// Soft-deletes a client. Its invoices are kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live client has this ID.
    pub async fn soft_delete(&self, id: Uuid) -> DalResult<clients::Model> {
        self.crud.soft_delete(id).await
    }

    /// Restores a soft-deleted client.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no deleted client has this ID.
    pub async fn restore(&self, id: Uuid) -> DalResult<clients::Model> {
        self.crud.restore(id).await
    }
}
