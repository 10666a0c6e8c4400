pub mod accounts;

#[cfg(test)]
mod tests;

pub use accounts::{Account, AccountSummary, AccountUpdate, NewAccount, ProxySummary};

use redpost_core::{CoreError, DatabaseError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_create_accounts",
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        client_id TEXT NOT NULL,
        client_secret TEXT NOT NULL,
        refresh_token TEXT,
        proxy_type TEXT,
        proxy_host TEXT,
        proxy_port INTEGER,
        proxy_username TEXT,
        proxy_password TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
)];

/// SQLite-backed accounts store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let connection_failed = |e: sqlx::Error| DatabaseError::ConnectionFailed {
            reason: e.to_string(),
        };

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(connection_failed)?
            .create_if_missing(true);

        // Every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(connection_failed)?;

        info!("Connected to database {}", database_url);
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for (name, sql) in MIGRATIONS {
            debug!("Applying migration {}", name);
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    migration: format!("{}: {}", name, e),
                })?;
        }
        info!("Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps sqlx failures onto the narrower database error variants.
pub(crate) fn query_error(error: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return DatabaseError::ConstraintViolation {
                constraint: db_error.message().to_string(),
            };
        }
        if db_error.message().contains("database is locked") {
            return DatabaseError::DatabaseLocked;
        }
    }
    DatabaseError::Sql(error)
}
