//! Product repository.
//!
//! Products are catalogue entries that invoice lines may point at. Their
//! price is copied into a line when the line is written, so later price
//! changes never alter issued invoices.

use invoicely_core::invoice::round_money;
use invoicely_core::validation::{require_non_empty, require_non_negative};
use invoicely_shared::types::{PageRequest, PageResponse, ProductId};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::crud::{Crud, now};
use crate::entities::{products, users};
use crate::error::DalResult;
use crate::query::{FieldFilter, FindManyArgs, SortOrder};
use crate::store::Store;

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProductInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Product name.
    pub name: String,
    /// Description printed on lines.
    pub description: Option<String>,
    /// Price per unit (>= 0).
    pub unit_price: Decimal,
    /// Unit label, e.g. "hour".
    pub unit: Option<String>,
}

/// Input for updating a product.
#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    /// Product name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<Option<String>>,
    /// Price per unit.
    pub unit_price: Option<Decimal>,
    /// Unit label.
    pub unit: Option<Option<String>>,
}

/// Product repository.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    store: Store,
    crud: Crud<products::Entity>,
}

impl ProductRepository {
    /// Creates a new product repository.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            crud: Crud::new(store.clone()),
            store,
        }
    }

    /// Creates a product for a live user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name or negative price and
    /// `NotFound` if the user does not exist or was deleted.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create(&self, input: CreateProductInput) -> DalResult<products::Model> {
        let name = require_non_empty("name", &input.name)?;
        let unit_price = round_money(require_non_negative("unit_price", input.unit_price)?);

        let txn = self.store.begin().await?;
        Crud::<users::Entity>::fetch_existing(&txn, input.user_id).await?;

        let now = now();
        let product = products::ActiveModel {
            product_id: Set(ProductId::new().into_inner()),
            user_id: Set(input.user_id),
            name: Set(name),
            description: Set(input.description),
            unit_price: Set(unit_price),
            unit: Set(input.unit),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;
        Store::commit(txn).await?;

        debug!(product_id = %product.product_id, "Created product");
        Ok(product)
    }

    /// Finds a live product by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist or was deleted.
    pub async fn find_unique(&self, id: Uuid) -> DalResult<products::Model> {
        self.crud.find_unique(id).await
    }

    /// Lists products matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_many(
        &self,
        args: &FindManyArgs<products::Entity>,
    ) -> DalResult<Vec<products::Model>> {
        self.crud.find_many(args).await
    }

    /// Returns one page of products matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn find_page(
        &self,
        args: &FindManyArgs<products::Entity>,
        page: PageRequest,
    ) -> DalResult<PageResponse<products::Model>> {
        self.crud.find_page(args, page).await
    }

    /// Counts products matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid filters.
    pub async fn count(&self, args: &FindManyArgs<products::Entity>) -> DalResult<u64> {
        self.crud.count(args).await
    }

    /// Lists the live products of a user by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_user(&self, user_id: Uuid) -> DalResult<Vec<products::Model>> {
        let args = FindManyArgs::new()
            .filter(products::Column::UserId, FieldFilter::equals(user_id))
            .order_by(products::Column::Name, SortOrder::Asc);
        self.crud.find_many(&args).await
    }

    /// Updates a live product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist or was deleted and
    /// `Validation` for a negative price.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateProductInput) -> DalResult<products::Model> {
        let name = input
            .name
            .as_deref()
            .map(|name| require_non_empty("name", name))
            .transpose()?;
        let unit_price = input
            .unit_price
            .map(|price| require_non_negative("unit_price", price).map(round_money))
            .transpose()?;

        let txn = self.store.begin().await?;
        let product = Crud::<products::Entity>::fetch_existing(&txn, id).await?;

        let mut active: products::ActiveModel = product.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(unit_price) = unit_price {
            active.unit_price = Set(unit_price);
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit);
        }
        active.updated_at = Set(Some(now()));

        let updated = active.update(&txn).await?;
        Store::commit(txn).await?;

        debug!(product_id = %id, "Updated product");
        Ok(updated)
    }

    /// Soft-deletes a product. Lines that reference it are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live product has this ID.
    pub async fn soft_delete(&self, id: Uuid) -> DalResult<products::Model> {
        self.crud.soft_delete(id).await
    }

    /// Restores a soft-deleted product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no deleted product has this ID.
    pub async fn restore(&self, id: Uuid) -> DalResult<products::Model> {
        self.crud.restore(id).await
    }
}
