//! User repository for database operations.

use invoicely_core::validation::{normalize_email, normalize_username, require_non_empty};
use invoicely_shared::types::{PageRequest, PageResponse, UserId};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::{profiles, users};
use crate::error::DalResult;
use crate::query::{FieldFilter, FindManyArgs};
use crate::store::Store;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Email address; stored trimmed and lower-cased.
    pub email: String,
    /// Username; stored trimmed.
    pub username: String,
    /// Password hash computed by the caller.
    pub password_hash: String,
}

/// Input for updating a user.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    /// New email address.
    pub email: Option<String>,
    /// New username.
    pub username: Option<String>,
    /// New password hash.
    pub password_hash: Option<String>,
}

/// User together with its profile.
#[derive(Debug, Clone)]
pub struct UserWithProfile {
    /// The user record.
    pub user: users::Model,
    /// The profile, if one was created.
    pub profile: Option<profiles::Model>,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    store: Store,
    crud: Crud<users::Entity>,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed email or username and
    /// `ConstraintViolation` if the email or username is taken.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: CreateUserInput) -> DalResult<users::Model> {
        let email = normalize_email(&input.email).inspect_err(|err| warn!(%err, "Rejected user"))?;
        let username = normalize_username(&input.username)?;
        let password_hash = require_non_empty("password_hash", &input.password_hash)?;

        let now = now();
        let user = users::ActiveModel {
            user_id: Set(UserId::new().into_inner()),
            email: Set(email),
            username: Set(username),
            password_hash: Set(password_hash),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            deleted_at: Set(None),
        };

        let user = user.insert(self.store.connection()).await?;
        debug!(user_id = %user.user_id, "Created user");
        Ok(user)
    }

    /// Finds a live user by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist or was deleted.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<users::Model> {
        self.crud.find_unique(id).await
    }

    /// Finds a user by ID, optionally including deleted users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_optional(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> DalResult<Option<users::Model>> {
        self.crud.find_optional(id, include_deleted).await
    }

    /// Finds a live user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> DalResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .filter(users::Column::DeletedAt.is_null())
            .one(self.store.connection())
            .await?)
    }

    /// Finds a live user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_username(&self, username: &str) -> DalResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(username.trim()))
            .filter(users::Column::DeletedAt.is_null())
            .one(self.store.connection())
            .await?)
    }

    /// Lists users matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<users::Entity>,
    ) -> DalResult<Vec<users::Model>> {
        self.crud.find_many(args).await
    }

    /// Returns one page of users matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_page(
        &self,
        args: &FindManyArgs<users::Entity>,
        page: PageRequest,
    ) -> DalResult<PageResponse<users::Model>> {
        self.crud.find_page(args, page).await
    }

    /// Counts users matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<users::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Loads a live user with its profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist or was deleted.
    pub async fn find_with_profile(&self, id: Uuid) -> DalResult<UserWithProfile> {
        let user = self.crud.find_unique(id).await?;
        let profile = user
            .find_related(profiles::Entity)
            .one(self.store.connection())
            .await?;
        Ok(UserWithProfile { user, profile })
    }

    /// Updates a live user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist, `Validation` for
    /// malformed fields and `ConstraintViolation` if the new email or
    /// username is taken.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateUserInput) -> DalResult<users::Model> {
        let email = input.email.as_deref().map(normalize_email).transpose()?;
        let username = input.username.as_deref().map(normalize_username).transpose()?;
        let password_hash = input
            .password_hash
            .as_deref()
            .map(|hash| require_non_empty("password_hash", hash))
            .transpose()?;

        let txn = self.store.begin().await?;
        let user = Crud::<users::Entity>::fetch_existing(&txn, id).await?;

        let mut active: users::ActiveModel = user.into();
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(username) = username {
            active.username = Set(username);
        }
        if let Some(password_hash) = password_hash {
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(user_id = %id, "Updated user");
        Ok(updated)
    }

    /// Soft-deletes a user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live user has this ID.
    pub async fn soft_delete(&self, id: Uuid) -> DalResult<users::Model> {
        self.crud.soft_delete(id).await
    }

    /// Restores a soft-deleted user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no deleted user has this ID.
    pub async fn restore(&self, id: Uuid) -> DalResult<users::Model> {
        self.crud.restore(id).await
    }

    /// Checks if an email is already registered, deleted users included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn email_exists(&self, email: &str) -> DalResult<bool> {
        let args = FindManyArgs::<users::Entity>::new()
            .filter(
                users::Column::Email,
                FieldFilter::equals(email.trim().to_lowercase()),
            )
            .include_deleted(true);
        Ok(self.crud.count(&args).await? > 0)
    }
}
