//! Storage-independent query surface.
//!
//! `FindManyArgs` carries per-field predicates (AND-ed together), ordering
//! with explicit null placement, offset/limit pagination and the soft-delete
//! visibility flag. It is turned into a SeaORM `Select` only after every
//! operand has been checked against the entity's enum domains.

use std::fmt;
use std::str::FromStr;

use sea_orm::sea_query::{Expr, Func, LikeExpr, NullOrdering, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, IdenStatic, Order, QueryFilter, QueryOrder, QuerySelect,
    Select, Value,
};

use crate::crud::DalEntity;
use crate::error::{DalError, DalResult};

/// Case sensitivity of string predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Backend default comparison.
    #[default]
    Default,
    /// Compare lower-cased on both sides.
    Insensitive,
}

/// A predicate applied to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    /// `column = value`
    Equals(Value),
    /// `column <> value`
    Not(Value),
    /// `column IN (values)`
    In(Vec<Value>),
    /// `column NOT IN (values)`
    NotIn(Vec<Value>),
    /// `column < value`
    Lt(Value),
    /// `column <= value`
    Lte(Value),
    /// `column > value`
    Gt(Value),
    /// `column >= value`
    Gte(Value),
    /// Substring match.
    Contains(String, QueryMode),
    /// Prefix match.
    StartsWith(String, QueryMode),
    /// Suffix match.
    EndsWith(String, QueryMode),
    /// `column IS NULL`
    IsNull,
    /// `column IS NOT NULL`
    IsNotNull,
}

impl FieldFilter {
    /// `column = value`
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::Equals(value.into())
    }

    /// `column <> value`
    pub fn not(value: impl Into<Value>) -> Self {
        Self::Not(value.into())
    }

    /// `column IN (values)`
    pub fn is_in<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::In(values.into_iter().map(Into::into).collect())
    }

    /// `column NOT IN (values)`
    pub fn not_in<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::NotIn(values.into_iter().map(Into::into).collect())
    }

    /// `column < value`
    pub fn lt(value: impl Into<Value>) -> Self {
        Self::Lt(value.into())
    }

    /// `column <= value`
    pub fn lte(value: impl Into<Value>) -> Self {
        Self::Lte(value.into())
    }

    /// `column > value`
    pub fn gt(value: impl Into<Value>) -> Self {
        Self::Gt(value.into())
    }

    /// `column >= value`
    pub fn gte(value: impl Into<Value>) -> Self {
        Self::Gte(value.into())
    }

    /// Substring match with the backend's default case handling.
    pub fn contains(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into(), QueryMode::Default)
    }

    /// Case-insensitive substring match.
    pub fn contains_insensitive(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into(), QueryMode::Insensitive)
    }

    /// Prefix match.
    pub fn starts_with(prefix: impl Into<String>, mode: QueryMode) -> Self {
        Self::StartsWith(prefix.into(), mode)
    }

    /// Suffix match.
    pub fn ends_with(suffix: impl Into<String>, mode: QueryMode) -> Self {
        Self::EndsWith(suffix.into(), mode)
    }

    /// Values compared against the column, used for domain checks.
    fn operands(&self) -> Vec<&Value> {
        match self {
            Self::Equals(v)
            | Self::Not(v)
            | Self::Lt(v)
            | Self::Lte(v)
            | Self::Gt(v)
            | Self::Gte(v) => vec![v],
            Self::In(values) | Self::NotIn(values) => values.iter().collect(),
            Self::Contains(..)
            | Self::StartsWith(..)
            | Self::EndsWith(..)
            | Self::IsNull
            | Self::IsNotNull => Vec::new(),
        }
    }

    fn to_expr<C: ColumnTrait>(&self, column: C) -> SimpleExpr {
        match self {
            Self::Equals(v) => column.eq(v.clone()),
            Self::Not(v) => column.ne(v.clone()),
            Self::In(values) => column.is_in(values.clone()),
            Self::NotIn(values) => column.is_not_in(values.clone()),
            Self::Lt(v) => column.lt(v.clone()),
            Self::Lte(v) => column.lte(v.clone()),
            Self::Gt(v) => column.gt(v.clone()),
            Self::Gte(v) => column.gte(v.clone()),
            Self::Contains(s, mode) => like(column, *mode, &format!("%{}%", escape_like(s))),
            Self::StartsWith(s, mode) => like(column, *mode, &format!("{}%", escape_like(s))),
            Self::EndsWith(s, mode) => like(column, *mode, &format!("%{}", escape_like(s))),
            Self::IsNull => column.is_null(),
            Self::IsNotNull => column.is_not_null(),
        }
    }
}

/// Escape character of every generated `LIKE` pattern.
const LIKE_ESCAPE: char = '\\';

/// Makes `%` and `_` in a caller's needle match literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

/// `column LIKE pattern`, or `LOWER(column) LIKE lower(pattern)` when
/// insensitive, portable across backends.
fn like<C: ColumnTrait>(column: C, mode: QueryMode, pattern: &str) -> SimpleExpr {
    match mode {
        QueryMode::Default => Expr::col(column.as_column_ref())
            .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)),
        QueryMode::Insensitive => Expr::expr(Func::lower(Expr::col(column.as_column_ref())))
            .like(LikeExpr::new(pattern.to_lowercase()).escape(LIKE_ESCAPE)),
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Self::Asc,
            SortOrder::Desc => Self::Desc,
        }
    }
}

/// Placement of nulls in an ordered column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    /// Nulls before any value.
    First,
    /// Nulls after every value.
    Last,
}

impl From<NullsOrder> for NullOrdering {
    fn from(nulls: NullsOrder) -> Self {
        match nulls {
            NullsOrder::First => Self::First,
            NullsOrder::Last => Self::Last,
        }
    }
}

/// One ordering term.
#[derive(Debug, Clone, Copy)]
pub struct OrderBy<C> {
    /// Column to order by.
    pub column: C,
    /// Direction.
    pub order: SortOrder,
    /// Explicit null placement; `None` keeps the backend default.
    pub nulls: Option<NullsOrder>,
}

/// Arguments of `find_many` and `count`.
///
/// `count` only looks at the filters and `include_deleted`.
pub struct FindManyArgs<E: EntityTrait> {
    filters: Vec<(E::Column, FieldFilter)>,
    order_by: Vec<OrderBy<E::Column>>,
    skip: Option<u64>,
    take: Option<u64>,
    include_deleted: bool,
}

impl<E: EntityTrait> Clone for FindManyArgs<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
            skip: self.skip,
            take: self.take,
            include_deleted: self.include_deleted,
        }
    }
}

impl<E: EntityTrait> fmt::Debug for FindManyArgs<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindManyArgs")
            .field(
                "filters",
                &self
                    .filters
                    .iter()
                    .map(|(column, filter)| (column.as_str(), filter))
                    .collect::<Vec<_>>(),
            )
            .field(
                "order_by",
                &self
                    .order_by
                    .iter()
                    .map(|term| (term.column.as_str(), term.order, term.nulls))
                    .collect::<Vec<_>>(),
            )
            .field("skip", &self.skip)
            .field("take", &self.take)
            .field("include_deleted", &self.include_deleted)
            .finish()
    }
}

impl<E: EntityTrait> Default for FindManyArgs<E> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            include_deleted: false,
        }
    }
}

impl<E: DalEntity> FindManyArgs<E> {
    /// Empty arguments: no filter, backend order, no paging, live rows only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate on a column.
    #[must_use]
    pub fn filter(mut self, column: E::Column, filter: FieldFilter) -> Self {
        self.filters.push((column, filter));
        self
    }

    /// Adds a predicate on a column named at runtime.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the entity has no such field.
    pub fn where_field(self, field: &str, filter: FieldFilter) -> DalResult<Self> {
        let column = resolve_column::<E>(field)?;
        Ok(self.filter(column, filter))
    }

    /// Appends an ordering term with the backend's null placement.
    #[must_use]
    pub fn order_by(mut self, column: E::Column, order: SortOrder) -> Self {
        self.order_by.push(OrderBy {
            column,
            order,
            nulls: None,
        });
        self
    }

    /// Appends an ordering term with explicit null placement.
    #[must_use]
    pub fn order_by_nulls(
        mut self,
        column: E::Column,
        order: SortOrder,
        nulls: NullsOrder,
    ) -> Self {
        self.order_by.push(OrderBy {
            column,
            order,
            nulls: Some(nulls),
        });
        self
    }

    /// Appends an ordering term on a column named at runtime.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the entity has no such field.
    pub fn order_by_field(
        mut self,
        field: &str,
        order: SortOrder,
        nulls: Option<NullsOrder>,
    ) -> DalResult<Self> {
        let column = resolve_column::<E>(field)?;
        self.order_by.push(OrderBy {
            column,
            order,
            nulls,
        });
        Ok(self)
    }

    /// Skips the first `n` rows.
    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` rows.
    #[must_use]
    pub fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }

    /// Includes soft-deleted rows when `yes` is true.
    #[must_use]
    pub fn include_deleted(mut self, yes: bool) -> Self {
        self.include_deleted = yes;
        self
    }

    /// Returns true if soft-deleted rows are included.
    #[must_use]
    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }

    /// Builds the WHERE clause, validating enum operands first.
    pub(crate) fn condition(&self) -> DalResult<Condition> {
        let mut condition = Condition::all();
        for (column, filter) in &self.filters {
            check_domain::<E>(*column, filter)?;
            condition = condition.add(filter.to_expr(*column));
        }
        if !self.include_deleted
            && let Some(deleted_at) = E::deleted_at_column()
        {
            condition = condition.add(deleted_at.is_null());
        }
        Ok(condition)
    }

    /// Builds a filtered and ordered select without paging.
    pub(crate) fn select_unpaged(&self) -> DalResult<Select<E>> {
        let mut select = E::find().filter(self.condition()?);
        for term in &self.order_by {
            select = match term.nulls {
                Some(nulls) => {
                    select.order_by_with_nulls(term.column, term.order.into(), nulls.into())
                }
                None => select.order_by(term.column, term.order.into()),
            };
        }
        // Stable tiebreak so pages never overlap.
        Ok(select.order_by_asc(E::primary_column()))
    }

    /// Builds the full select including paging.
    pub(crate) fn select(&self) -> DalResult<Select<E>> {
        let mut select = self.select_unpaged()?;
        match (self.skip, self.take) {
            (Some(skip), Some(take)) => select = select.offset(skip).limit(take),
            (None, Some(take)) => select = select.limit(take),
            // SQLite needs a LIMIT before OFFSET.
            (Some(skip), None) => select = select.offset(skip).limit(UNBOUNDED),
            (None, None) => {}
        }
        Ok(select)
    }
}

/// Largest limit every backend accepts.
const UNBOUNDED: u64 = i64::MAX.cast_unsigned();

fn resolve_column<E: DalEntity>(field: &str) -> DalResult<E::Column> {
    E::Column::from_str(field).map_err(|_| {
        DalError::Validation(format!("{} has no field '{field}'", E::NAME))
    })
}

fn check_domain<E: DalEntity>(column: E::Column, filter: &FieldFilter) -> DalResult<()> {
    let Some(domain) = E::enum_domain(column) else {
        return Ok(());
    };
    for operand in filter.operands() {
        if let Value::String(Some(value)) = operand
            && !domain.iter().any(|allowed| allowed == value.as_str())
        {
            return Err(DalError::Validation(format!(
                "'{value}' is not a valid value for {}.{}; expected one of {}",
                E::NAME,
                column.as_str(),
                domain.join(", ")
            )));
        }
    }
    Ok(())
}
