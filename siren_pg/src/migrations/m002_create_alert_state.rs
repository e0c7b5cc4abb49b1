//! Migration 002: per-phenomenon state.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{Migration, MigrationError};

/// Creates `siren_alert_state` and its lifecycle index.
pub struct CreateAlertState;

#[async_trait]
impl Migration for CreateAlertState {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "create_alert_state"
    }

    async fn up<'a>(&self, tx: &mut Transaction<'a, Postgres>) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS siren_alert_state (
                identifier TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                most_recent_detail_ref TEXT NOT NULL,
                history JSONB NOT NULL DEFAULT '[]'::jsonb,
                areas TEXT[] NOT NULL DEFAULT '{}',
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_siren_alert_state_state ON siren_alert_state (state)",
        )
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
