//! Migration 001: detail versions, one row per CAP message.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{Migration, MigrationError};

/// Creates `siren_alert_details`.
pub struct CreateAlertDetails;

#[async_trait]
impl Migration for CreateAlertDetails {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "create_alert_details"
    }

    async fn up<'a>(&self, tx: &mut Transaction<'a, Postgres>) -> Result<(), MigrationError> {
        // `expires` is duplicated out of `data` so the active-state filter can use it.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS siren_alert_details (
                identifier TEXT PRIMARY KEY,
                expires TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
