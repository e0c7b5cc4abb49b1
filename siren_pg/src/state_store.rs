use async_trait::async_trait;
use siren_core::prelude::*;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

/// [`AlertStateStore`] backed by the `siren_alert_state` and `siren_alert_details` tables.
///
/// Run the [`Migrator`](crate::Migrator) before using it.
#[derive(Clone, Debug)]
pub struct PgAlertStateStore {
    pg: PgPool,
}

impl PgAlertStateStore {
    /// Creates a new `PgAlertStateStore` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pg: pool }
    }
}

#[derive(FromRow)]
struct JoinedRow {
    identifier: String,
    state: String,
    most_recent_detail_ref: String,
    history: Json<Vec<HistoryEntry>>,
    areas: Vec<String>,
    detail: Json<AlertDetail>,
}

impl TryFrom<JoinedRow> for AlertRecord {
    type Error = sqlx::Error;

    fn try_from(row: JoinedRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<LifecycleState>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok(AlertRecord::from_parts(
            PhenomenonState {
                identifier: row.identifier,
                state,
                most_recent_detail_ref: row.most_recent_detail_ref,
                history: row.history.0,
                areas: row.areas,
            },
            row.detail.0,
        ))
    }
}

const JOINED_COLUMNS: &str = r#"
    SELECT s.identifier, s.state, s.most_recent_detail_ref, s.history, s.areas,
           d.data AS detail
    FROM siren_alert_state s
    JOIN siren_alert_details d ON d.identifier = s.most_recent_detail_ref
"#;

#[async_trait]
impl AlertStateStore for PgAlertStateStore {
    type Error = sqlx::Error;

    async fn join_latest(&self, state: LifecycleState) -> Result<Vec<AlertRecord>, Self::Error> {
        let query = format!("{JOINED_COLUMNS} WHERE s.state = $1 ORDER BY s.identifier");
        let rows: Vec<JoinedRow> = sqlx::query_as(&query)
            .bind(state.as_str())
            .fetch_all(&self.pg)
            .await?;
        log::debug!("Joined {} {} phenomena", rows.len(), state.as_str());
        rows.into_iter().map(AlertRecord::try_from).collect()
    }

    async fn records_by_ids(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Self::Error> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "{JOINED_COLUMNS} WHERE s.identifier = ANY($1) \
             ORDER BY array_position($1::text[], s.identifier)"
        );
        let rows: Vec<JoinedRow> = sqlx::query_as(&query)
            .bind(identifiers)
            .fetch_all(&self.pg)
            .await?;
        rows.into_iter().map(AlertRecord::try_from).collect()
    }

    async fn record_detail(&self, detail: AlertDetail) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO siren_alert_details (identifier, expires, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (identifier) DO UPDATE
            SET expires = EXCLUDED.expires, data = EXCLUDED.data, recorded_at = NOW()
            "#,
        )
        .bind(&detail.identifier)
        .bind(detail.expires)
        .bind(Json(&detail))
        .execute(&self.pg)
        .await?;
        Ok(())
    }

    async fn upsert_phenomenon(&self, state: PhenomenonState) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO siren_alert_state (identifier, state, most_recent_detail_ref, history, areas)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (identifier) DO UPDATE
            SET state = EXCLUDED.state,
                most_recent_detail_ref = EXCLUDED.most_recent_detail_ref,
                history = EXCLUDED.history,
                areas = EXCLUDED.areas,
                updated_at = NOW()
            "#,
        )
        .bind(&state.identifier)
        .bind(state.state.as_str())
        .bind(&state.most_recent_detail_ref)
        .bind(Json(&state.history))
        .bind(&state.areas)
        .execute(&self.pg)
        .await?;
        Ok(())
    }
}
