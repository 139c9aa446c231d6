//! Profile repository.
//!
//! A profile holds the business details of a user; each user has at most one.

use invoicely_core::validation::require_non_empty;
use invoicely_shared::types::ProfileId;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::{bank_accounts, e_wallets, profiles, users};
use crate::error::DalResult;
use crate::query::FindManyArgs;
use crate::store::Store;

/// Input for creating a profile.
#[derive(Debug, Clone)]
pub struct CreateProfileInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Full name of the person.
    pub full_name: String,
    /// Business name printed on invoices.
    pub business_name: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// Tax identification number.
    pub tax_id: Option<String>,
    /// Logo location.
    pub logo_url: Option<String>,
}

/// Input for updating a profile.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    /// Full name.
    pub full_name: Option<String>,
    /// Business name.
    pub business_name: Option<Option<String>>,
    /// Phone number.
    pub phone: Option<Option<String>>,
    /// Postal address.
    pub address: Option<Option<String>>,
    /// Tax identification number.
    pub tax_id: Option<Option<String>>,
    /// Logo location.
    pub logo_url: Option<Option<String>>,
}

/// Profile with its payment accounts.
#[derive(Debug, Clone)]
pub struct ProfileWithAccounts {
    /// The profile record.
    pub profile: profiles::Model,
    /// Bank accounts, oldest first.
    pub bank_accounts: Vec<bank_accounts::Model>,
    /// E-wallets, oldest first.
    pub e_wallets: Vec<e_wallets::Model>,
}

/// Profile repository.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    store: Store,
    crud: Crud<profiles::Entity>,
}

impl ProfileRepository {
    /// Creates a new profile repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates the profile of a live user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist or was deleted and
    /// `ConstraintViolation` if the user already has a profile.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create(&self, input: CreateProfileInput) -> DalResult<profiles::Model> {
        let full_name = require_non_empty("full_name", &input.full_name)?;

        let txn = self.store.begin().await?;
        Crud::<users::Entity>::fetch_existing(&txn, input.user_id).await?;

        let now = now();
        let profile = profiles::ActiveModel {
            profile_id: Set(ProfileId::new().into_inner()),
            user_id: Set(input.user_id),
            full_name: Set(full_name),
            business_name: Set(input.business_name),
            phone: Set(input.phone),
            address: Set(input.address),
            tax_id: Set(input.tax_id),
            logo_url: Set(input.logo_url),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;
        Store::commit(txn).await?;

        debug!(profile_id = %profile.profile_id, "Created profile");
        Ok(profile)
    }

    /// Finds a profile by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<profiles::Model> {
        self.crud.find_unique(id).await
    }

    /// Finds the profile of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_user(&self, user_id: Uuid) -> DalResult<Option<profiles::Model>> {
        Ok(profiles::Entity::find()
            .filter(profiles::Column::UserId.eq(user_id))
            .one(self.store.connection())
            .await?)
    }

    /// Lists profiles matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<profiles::Entity>,
    ) -> DalResult<Vec<profiles::Model>> {
        self.crud.find_many(args).await
    }

    /// Counts profiles matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<profiles::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Loads a profile with its bank accounts and e-wallets.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn find_with_accounts(&self, id: Uuid) -> DalResult<ProfileWithAccounts> {
        let db = self.store.connection();
        let profile = self.crud.find_unique(id).await?;
        let bank_accounts = profile
            .find_related(bank_accounts::Entity)
            .order_by_asc(bank_accounts::Column::CreatedAt)
            .all(db)
            .await?;
        let e_wallets = profile
            .find_related(e_wallets::Entity)
            .order_by_asc(e_wallets::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(ProfileWithAccounts {
            profile,
            bank_accounts,
            e_wallets,
        })
    }

    /// Updates a profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateProfileInput) -> DalResult<profiles::Model> {
        let full_name = input
            .full_name
            .as_deref()
            .map(|name| require_non_empty("full_name", name))
            .transpose()?;

        let txn = self.store.begin().await?;
        let profile = Crud::<profiles::Entity>::fetch_existing(&txn, id).await?;

        let mut active: profiles::ActiveModel = profile.into();
        if let Some(full_name) = full_name {
            active.full_name = Set(full_name);
        }
        if let Some(business_name) = input.business_name {
            active.business_name = Set(business_name);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(address) = input.address {
            active.address = Set(address);
        }
        if let Some(tax_id) = input.tax_id {
            active.tax_id = Set(tax_id);
        }
        if let Some(logo_url) = input.logo_url {
            active.logo_url = Set(logo_url);
        }
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(profile_id = %id, "Updated profile");
        Ok(updated)
    }

    /// Deletes a profile together with its accounts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the profile does not exist.
    pub async fn delete(&self, id: Uuid) -> DalResult<()> {
        self.crud.hard_delete(id).await
    }
}
