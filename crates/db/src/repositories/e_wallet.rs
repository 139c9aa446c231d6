//! E-wallet repository.
//!
//! Mirrors the e-wallet rules: at most one primary e-wallet per profile.

use invoicely_core::validation::require_non_empty;
use invoicely_shared::types::EWalletId;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::{e_wallets, profiles};
use crate::error::DalResult;
use crate::query::FindManyArgs;
use crate::store::Store;

/// Input for creating an e-wallet.
#[derive(Debug, Clone)]
pub struct CreateEWalletInput {
    /// Owning profile.
    pub profile_id: Uuid,
    /// Wallet provider.
    pub provider: String,
    /// Wallet account number or phone.
    pub account_number: String,
    /// Name on the account.
    pub account_holder: String,
    /// Whether this becomes the profile's primary e-wallet.
    pub is_primary: bool,
}

/// Input for updating an e-wallet.
#[derive(Debug, Clone, Default)]
pub struct UpdateEWalletInput {
    /// Wallet provider.
    pub provider: Option<String>,
    /// Wallet account number or phone.
    pub account_number: Option<String>,
    /// Name on the account.
    pub account_holder: Option<String>,
    /// Primary flag.
    pub is_primary: Option<bool>,
}

/// E-wallet repository.
#[derive(Debug, Clone)]
pub struct EWalletRepository {
    store: Store,
    crud: Crud<e_wallets::Entity>,
}

impl EWalletRepository {
    /// Creates a new e-wallet repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates an e-wallet, demoting the current primary if needed.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank fields and `NotFound` if the profile
    /// does not exist.
    #[instrument(skip(self, input), fields(profile_id = %input.profile_id))]
    pub async fn create(&self, input: CreateEWalletInput) -> DalResult<e_wallets::Model> {
        let provider = require_non_empty("provider", &input.provider)?;
        let account_number = require_non_empty("account_number", &input.account_number)?;
        let account_holder = require_non_empty("account_holder", &input.account_holder)?;

        let txn = self.store.begin().await?;
        Crud::<profiles::Entity>::fetch_existing(&txn, input.profile_id).await?;

        let id = EWalletId::new().into_inner();
        if input.is_primary {
            clear_primary(&txn, input.profile_id, id).await?;
        }

        let now = now();
        let wallet = e_wallets::ActiveModel {
            e_wallet_id: Set(id),
            profile_id: Set(input.profile_id),
            provider: Set(provider),
            account_number: Set(account_number),
            account_holder: Set(account_holder),
            is_primary: Set(input.is_primary),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;
        Store::commit(txn).await?;

        debug!(e_wallet_id = %id, is_primary = wallet.is_primary, "Created e-wallet");
        Ok(wallet)
    }

    /// Finds an e-wallet by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the e-wallet does not exist.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<e_wallets::Model> {
        self.crud.find_unique(id).await
    }

    /// Lists e-wallets matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<e_wallets::Entity>,
    ) -> DalResult<Vec<e_wallets::Model>> {
        self.crud.find_many(args).await
    }

    /// Counts e-wallets matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<e_wallets::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Lists the e-wallets of a profile, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_profile(&self, profile_id: Uuid) -> DalResult<Vec<e_wallets::Model>> {
        Ok(e_wallets::Entity::find()
            .filter(e_wallets::Column::ProfileId.eq(profile_id))
            .order_by_asc(e_wallets::Column::CreatedAt)
            .order_by_asc(e_wallets::Column::EWalletId)
            .all(self.store.connection())
            .await?)
    }

    /// Returns the primary e-wallet of a profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_primary(&self, profile_id: Uuid) -> DalResult<Option<e_wallets::Model>> {
        Ok(e_wallets::Entity::find()
            .filter(e_wallets::Column::ProfileId.eq(profile_id))
            .filter(e_wallets::Column::IsPrimary.eq(true))
            .one(self.store.connection())
            .await?)
    }

    /// Updates an e-wallet.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the e-wallet does not exist.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateEWalletInput,
    ) -> DalResult<e_wallets::Model> {
        let provider = input
            .provider
            .as_deref()
            .map(|v| require_non_empty("provider", v))
            .transpose()?;
        let account_number = input
            .account_number
            .as_deref()
            .map(|v| require_non_empty("account_number", v))
            .transpose()?;
        let account_holder = input
            .account_holder
            .as_deref()
            .map(|v| require_non_empty("account_holder", v))
            .transpose()?;

        let txn = self.store.begin().await?;
        let wallet = Crud::<e_wallets::Entity>::fetch_existing(&txn, id).await?;
        if input.is_primary == Some(true) {
            clear_primary(&txn, wallet.profile_id, id).await?;
        }

        let mut active: e_wallets::ActiveModel = wallet.into();
        if let Some(provider) = provider {
            active.provider = Set(provider);
        }
        if let Some(account_number) = account_number {
            active.account_number = Set(account_number);
        }
        if let Some(account_holder) = account_holder {
            active.account_holder = Set(account_holder);
        }
        if let Some(is_primary) = input.is_primary {
            active.is_primary = Set(is_primary);
        }
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(e_wallet_id = %id, "Updated e-wallet");
        Ok(updated)
    }

    /// Makes an e-wallet the primary one of its profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the e-wallet does not exist.
    pub async fn set_primary(&self, id: Uuid) -> DalResult<e_wallets::Model> {
        self.update(
            id,
            UpdateEWalletInput {
                is_primary: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes an e-wallet.
    ///
    /// Payments that referenced it keep their record with the reference
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the e-wallet does not exist.
    pub async fn delete(&self, id: Uuid) -> DalResult<()> {
        self.crud.hard_delete(id).await
    }
}

/// Clears `is_primary` on every e-wallet of the profile except `keep`.
///
/// Locks the profile row first, so two promotions on the same profile take
/// turns and the second one sees the first one's primary.
async fn clear_primary<C: ConnectionTrait>(
    conn: &C,
    profile_id: Uuid,
    keep: Uuid,
) -> DalResult<()> {
    Crud::<profiles::Entity>::lock_existing(conn, profile_id).await?;
    let result = e_wallets::Entity::update_many()
        .col_expr(e_wallets::Column::IsPrimary, Expr::value(false))
        .col_expr(e_wallets::Column::UpdatedAt, Expr::value(now()))
        .filter(e_wallets::Column::ProfileId.eq(profile_id))
        .filter(e_wallets::Column::EWalletId.ne(keep))
        .filter(e_wallets::Column::IsPrimary.eq(true))
        .exec(conn)
        .await?;
    if result.rows_affected > 0 {
        debug!(%profile_id, demoted = result.rows_affected, "Cleared previous primary e-wallet");
    }
    Ok(())
}
