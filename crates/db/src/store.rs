//! Transactional store seam.
//!
//! SeaORM's `ConnectionTrait` (execute/query) and `TransactionTrait`
//! (begin/commit/rollback) are the store interface. `Store` adds the
//! isolation policy: every multi-step operation runs in one transaction opened
//! at READ COMMITTED where the backend supports choosing a level.

use std::time::Duration;

use invoicely_shared::DatabaseConfig;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DatabaseTransaction, DbBackend, IsolationLevel, TransactionTrait,
};
use tracing::{debug, info};

use crate::error::{DalError, DalResult};

/// Handle to the backing store shared by every repository.
#[derive(Debug, Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection for single-statement reads.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns the database backend in use.
    #[must_use]
    pub fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// Begins a read-write transaction.
    ///
    /// Dropping the returned transaction without committing rolls it back.
    pub async fn begin(&self) -> DalResult<DatabaseTransaction> {
        self.db
            .begin_with_config(isolation_for(self.backend()), None)
            .await
            .map_err(DalError::transaction)
    }

    /// Commits a transaction opened with [`Store::begin`].
    pub async fn commit(txn: DatabaseTransaction) -> DalResult<()> {
        txn.commit().await.map_err(DalError::transaction)
    }

    /// Checks that the store answers.
    pub async fn ping(&self) -> DalResult<()> {
        self.db.ping().await.map_err(DalError::from)
    }

    /// Closes the pool.
    pub async fn close(self) -> DalResult<()> {
        self.db.close().await.map_err(DalError::from)
    }
}

/// SQLite serializes writers and rejects an explicit level.
fn isolation_for(backend: DbBackend) -> Option<IsolationLevel> {
    match backend {
        DbBackend::Sqlite => None,
        _ => Some(IsolationLevel::ReadCommitted),
    }
}

/// Opens a connection pool from configuration.
///
/// In-memory SQLite databases live inside a single connection, so the pool
/// is pinned to one connection for them.
pub async fn connect(config: &DatabaseConfig) -> DalResult<Store> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    if config.is_sqlite() && config.url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    let store = Store::new(db);
    info!(backend = ?store.backend(), "Connected to database");
    Ok(store)
}

/// Opens a connection pool with default settings.
pub async fn connect_url(url: &str) -> DalResult<Store> {
    debug!("Connecting with default pool settings");
    connect(&DatabaseConfig::with_url(url)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_policy() {
        assert!(isolation_for(DbBackend::Sqlite).is_none());
        assert!(matches!(
            isolation_for(DbBackend::Postgres),
            Some(IsolationLevel::ReadCommitted)
        ));
    }
}
