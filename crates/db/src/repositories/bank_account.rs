//! Bank account repository.
//!
//! A profile may own several bank accounts but at most one is primary. Every
//! write that sets `is_primary` clears the flag on the profile's other
//! accounts in the same transaction.

use invoicely_core::validation::require_non_empty;
use invoicely_shared::types::BankAccountId;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::{bank_accounts, profiles};
use crate::error::DalResult;
use crate::query::FindManyArgs;
use crate::store::Store;

/// Input for creating a bank account.
#[derive(Debug, Clone)]
pub struct CreateBankAccountInput {
    /// Owning profile.
    pub profile_id: Uuid,
    /// Name of the bank.
    pub bank_name: String,
    /// Account number.
    pub account_number: String,
    /// Name on the account.
    pub account_holder: String,
    /// Whether this becomes the profile's primary account.
    pub is_primary: bool,
}

/// Input for updating a bank account.
#[derive(Debug, Clone, Default)]
pub struct UpdateBankAccountInput {
    /// Name of the bank.
    pub bank_name: Option<String>,
    /// Account number.
    pub account_number: Option<String>,
    /// Name on the account.
    pub account_holder: Option<String>,
    /// Primary flag.
    pub is_primary: Option<bool>,
}

/// Bank account repository.
#[derive(Debug, Clone)]
pub struct BankAccountRepository {
    store: Store,
    crud: Crud<bank_accounts::Entity>,
}

impl BankAccountRepository {
    /// Creates a new bank account repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates a bank account, demoting the current primary if needed.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank fields and `NotFound` if the profile
    /// does not exist.
    #[instrument(skip(self, input), fields(profile_id = %input.profile_id))]
    pub async fn create(&self, input: CreateBankAccountInput) -> DalResult<bank_accounts::Model> {
        let bank_name = require_non_empty("bank_name", &input.bank_name)?;
        let account_number = require_non_empty("account_number", &input.account_number)?;
        let account_holder = require_non_empty("account_holder", &input.account_holder)?;

        let txn = self.store.begin().await?;
        Crud::<profiles::Entity>::fetch_existing(&txn, input.profile_id).await?;

        let id = BankAccountId::new().into_inner();
        if input.is_primary {
            clear_primary(&txn, input.profile_id, id).await?;
        }

        let now = now();
        let account = bank_accounts::ActiveModel {
            bank_account_id: Set(id),
            profile_id: Set(input.profile_id),
            bank_name: Set(bank_name),
            account_number: Set(account_number),
            account_holder: Set(account_holder),
            is_primary: Set(input.is_primary),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;
        Store::commit(txn).await?;

        debug!(bank_account_id = %id, is_primary = account.is_primary, "Created bank account");
        Ok(account)
    }

    /// Finds a bank account by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<bank_accounts::Model> {
        self.crud.find_unique(id).await
    }

    /// Lists bank accounts matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<bank_accounts::Entity>,
    ) -> DalResult<Vec<bank_accounts::Model>> {
        self.crud.find_many(args).await
    }

    /// Counts bank accounts matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<bank_accounts::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Lists the bank accounts of a profile, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_profile(&self, profile_id: Uuid) -> DalResult<Vec<bank_accounts::Model>> {
        Ok(bank_accounts::Entity::find()
            .filter(bank_accounts::Column::ProfileId.eq(profile_id))
            .order_by_asc(bank_accounts::Column::CreatedAt)
            .order_by_asc(bank_accounts::Column::BankAccountId)
            .all(self.store.connection())
            .await?)
    }

    /// Returns the primary bank account of a profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_primary(&self, profile_id: Uuid) -> DalResult<Option<bank_accounts::Model>> {
        Ok(bank_accounts::Entity::find()
            .filter(bank_accounts::Column::ProfileId.eq(profile_id))
            .filter(bank_accounts::Column::IsPrimary.eq(true))
            .one(self.store.connection())
            .await?)
    }

    /// Updates a bank account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateBankAccountInput,
    ) -> DalResult<bank_accounts::Model> {
        let bank_name = input
            .bank_name
            .as_deref()
            .map(|v| require_non_empty("bank_name", v))
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
        let account = Crud::<bank_accounts::Entity>::fetch_existing(&txn, id).await?;
        if input.is_primary == Some(true) {
            clear_primary(&txn, account.profile_id, id).await?;
        }

        let mut active: bank_accounts::ActiveModel = account.into();
        if let Some(bank_name) = bank_name {
            active.bank_name = Set(bank_name);
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

        debug!(bank_account_id = %id, "Updated bank account");
        Ok(updated)
    }

    /// Makes a bank account the primary one of its profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn set_primary(&self, id: Uuid) -> DalResult<bank_accounts::Model> {
        self.update(
            id,
            UpdateBankAccountInput {
                is_primary: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes a bank account.
    ///
    /// Payments that referenced it keep their record with the reference
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn delete(&self, id: Uuid) -> DalResult<()> {
        self.crud.hard_delete(id).await
    }
}

/// Clears `is_primary` on every account of the profile except `keep`.
///
/// Locks the profile row first, so two promotions on the same profile take
/// turns and the second one sees the first one's primary.
async fn clear_primary<C: ConnectionTrait>(
    conn: &C,
    profile_id: Uuid,
    keep: Uuid,
) -> DalResult<()> {
    Crud::<profiles::Entity>::lock_existing(conn, profile_id).await?;
    let result = bank_accounts::Entity::update_many()
        .col_expr(bank_accounts::Column::IsPrimary, Expr::value(false))
        .col_expr(bank_accounts::Column::UpdatedAt, Expr::value(now()))
        .filter(bank_accounts::Column::ProfileId.eq(profile_id))
        .filter(bank_accounts::Column::BankAccountId.ne(keep))
        .filter(bank_accounts::Column::IsPrimary.eq(true))
        .exec(conn)
        .await?;
    if result.rows_affected > 0 {
        debug!(
            %profile_id,
            demoted = result.rows_affected,
            "Cleared previous primary bank account"
        );
    }
    Ok(())
}
