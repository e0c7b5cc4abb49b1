//! Embedded, forward-only schema migrations for siren_pg.
//!
//! Applied versions are recorded with a checksum in `_siren_migrations`, so an edited
//! migration is caught before anything else runs.
//!
//! ```rust,ignore
//! let pool = PgPool::connect(&database_url).await?;
//! let applied = Migrator::new(pool).run().await?;
//! log::info!("Applied {} migrations", applied);
//! ```
//!
//! New migrations go in a `mXXX_description.rs` file and at the end of [`MIGRATIONS`].

mod m001_create_alert_details;
mod m002_create_alert_state;

use m001_create_alert_details::CreateAlertDetails;
use m002_create_alert_state::CreateAlertState;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;

/// All migrations, oldest first.
const MIGRATIONS: &[&dyn Migration] = &[&CreateAlertDetails, &CreateAlertState];

/// Errors raised while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An applied migration no longer matches its definition.
    #[error("Migration {version} ({name}) checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        /// Version of the migration.
        version: i64,
        /// Name of the migration.
        name: String,
        /// Checksum recorded in the database.
        expected: String,
        /// Checksum of the current definition.
        found: String,
    },

    /// A migration's statements failed.
    #[error("Migration {version} ({name}) failed: {reason}")]
    MigrationFailed {
        /// Version of the migration.
        version: i64,
        /// Name of the migration.
        name: String,
        /// Database error message.
        reason: String,
    },
}

/// A single schema change.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Sequential, unique version.
    fn version(&self) -> i64;

    /// Short snake_case name.
    fn name(&self) -> &'static str;

    /// Applies the change inside the migrator's transaction.
    async fn up<'a>(&self, tx: &mut Transaction<'a, Postgres>) -> Result<(), MigrationError>;

    /// SHA-256 of version and name.
    fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version().to_le_bytes());
        hasher.update(self.name().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A migration recorded as applied.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    /// Version.
    pub version: i64,
    /// Name.
    pub name: String,
    /// When it was applied.
    pub applied_at: chrono::DateTime<chrono::Utc>,
    /// Checksum at the time it was applied.
    pub checksum: String,
}

/// Applies pending migrations in order, each in its own transaction.
#[derive(Debug, Clone)]
pub struct Migrator {
    pool: PgPool,
}

impl Migrator {
    /// Creates a migrator over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_tracking_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _siren_migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Runs every pending migration and returns how many were applied.
    ///
    /// Fails without applying anything if an applied migration's checksum changed.
    pub async fn run(&self) -> Result<usize, MigrationError> {
        self.ensure_tracking_table().await?;

        let applied = self.applied().await?;
        for record in &applied {
            let Some(migration) = MIGRATIONS.iter().find(|m| m.version() == record.version) else {
                continue;
            };
            let found = migration.checksum();
            if found != record.checksum {
                return Err(MigrationError::ChecksumMismatch {
                    version: record.version,
                    name: record.name.clone(),
                    expected: record.checksum.clone(),
                    found,
                });
            }
        }

        let applied_versions: HashSet<i64> = applied.iter().map(|m| m.version).collect();
        let mut count = 0;
        for migration in MIGRATIONS
            .iter()
            .filter(|m| !applied_versions.contains(&m.version()))
        {
            log::info!(
                "Applying migration {} ({})",
                migration.version(),
                migration.name()
            );

            let mut tx = self.pool.begin().await?;
            migration.up(&mut tx).await.map_err(|e| match e {
                MigrationError::Database(db_err) => MigrationError::MigrationFailed {
                    version: migration.version(),
                    name: migration.name().to_string(),
                    reason: db_err.to_string(),
                },
                other => other,
            })?;
            sqlx::query("INSERT INTO _siren_migrations (version, name, checksum) VALUES ($1, $2, $3)")
                .bind(migration.version())
                .bind(migration.name())
                .bind(migration.checksum())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            count += 1;
        }

        if count > 0 {
            log::info!("Applied {} migrations", count);
        } else {
            log::debug!("Schema is up to date");
        }
        Ok(count)
    }

    /// Highest applied version, 0 when none.
    pub async fn current_version(&self) -> Result<i64, MigrationError> {
        self.ensure_tracking_table().await?;
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM _siren_migrations ORDER BY version DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v).unwrap_or(0))
    }

    /// Migrations not applied yet.
    pub async fn pending(&self) -> Result<Vec<&'static dyn Migration>, MigrationError> {
        let applied_versions: HashSet<i64> =
            self.applied().await?.iter().map(|m| m.version).collect();
        Ok(MIGRATIONS
            .iter()
            .filter(|m| !applied_versions.contains(&m.version()))
            .copied()
            .collect())
    }

    /// Applied migrations, oldest first.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.ensure_tracking_table().await?;
        let rows = sqlx::query(
            "SELECT version, name, applied_at, checksum FROM _siren_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AppliedMigration {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
                checksum: row.get("checksum"),
            })
            .collect())
    }
}
