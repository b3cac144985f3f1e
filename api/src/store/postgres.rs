use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hcp_core::interactions::{Interaction, InteractionFields, InteractionPatch};
use sqlx::PgPool;

use super::{InteractionStore, StoreError};

const COLUMNS: &str = "id, hcp_name, interaction_type, interaction_date, interaction_time, \
    attendees, topics_discussed, materials_shared, samples_distributed, sentiment, outcomes, \
    follow_up_actions, created_at, updated_at";

pub struct PgInteractionStore {
    pool: PgPool,
}

impl PgInteractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct InteractionRow {
    id: i64,
    hcp_name: String,
    interaction_type: Option<String>,
    interaction_date: NaiveDate,
    interaction_time: Option<String>,
    attendees: Option<String>,
    topics_discussed: Option<String>,
    materials_shared: Option<String>,
    samples_distributed: Option<String>,
    sentiment: Option<String>,
    outcomes: Option<String>,
    follow_up_actions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InteractionRow {
    fn into_interaction(self) -> Interaction {
        Interaction {
            id: self.id,
            fields: InteractionFields {
                hcp_name: self.hcp_name,
                interaction_date: self.interaction_date,
                interaction_time: self.interaction_time,
                interaction_type: self.interaction_type,
                attendees: self.attendees,
                topics_discussed: self.topics_discussed,
                materials_shared: self.materials_shared,
                samples_distributed: self.samples_distributed,
                sentiment: self.sentiment,
                outcomes: self.outcomes,
                follow_up_actions: self.follow_up_actions,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl InteractionStore for PgInteractionStore {
    async fn create(&self, fields: InteractionFields) -> Result<Interaction, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO interactions (
                hcp_name, interaction_type, interaction_date, interaction_time, attendees,
                topics_discussed, materials_shared, samples_distributed, sentiment, outcomes,
                follow_up_actions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, InteractionRow>(&sql)
            .bind(&fields.hcp_name)
            .bind(&fields.interaction_type)
            .bind(fields.interaction_date)
            .bind(&fields.interaction_time)
            .bind(&fields.attendees)
            .bind(&fields.topics_discussed)
            .bind(&fields.materials_shared)
            .bind(&fields.samples_distributed)
            .bind(&fields.sentiment)
            .bind(&fields.outcomes)
            .bind(&fields.follow_up_actions)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into_interaction())
    }

    async fn get(&self, id: i64) -> Result<Option<Interaction>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM interactions WHERE id = $1");
        let row = sqlx::query_as::<_, InteractionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(InteractionRow::into_interaction))
    }

    async fn update(&self, id: i64, patch: &InteractionPatch) -> Result<Interaction, StoreError> {
        let sql = format!(
            r#"
            UPDATE interactions SET
                hcp_name            = COALESCE($2, hcp_name),
                interaction_date    = COALESCE($3, interaction_date),
                interaction_time    = COALESCE($4, interaction_time),
                interaction_type    = COALESCE($5, interaction_type),
                attendees           = COALESCE($6, attendees),
                topics_discussed    = COALESCE($7, topics_discussed),
                materials_shared    = COALESCE($8, materials_shared),
                samples_distributed = COALESCE($9, samples_distributed),
                sentiment           = COALESCE($10, sentiment),
                outcomes            = COALESCE($11, outcomes),
                follow_up_actions   = COALESCE($12, follow_up_actions),
                updated_at          = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, InteractionRow>(&sql)
            .bind(id)
            .bind(&patch.hcp_name)
            .bind(patch.interaction_date)
            .bind(&patch.interaction_time)
            .bind(&patch.interaction_type)
            .bind(&patch.attendees)
            .bind(&patch.topics_discussed)
            .bind(&patch.materials_shared)
            .bind(&patch.samples_distributed)
            .bind(&patch.sentiment)
            .bind(&patch.outcomes)
            .bind(&patch.follow_up_actions)
            .fetch_optional(&self.pool)
            .await?;
        row.map(InteractionRow::into_interaction)
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_by_hcp_name(&self, hcp_name: &str) -> Result<Vec<Interaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM interactions
            WHERE hcp_name ILIKE $1
            ORDER BY interaction_date DESC, created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query_as::<_, InteractionRow>(&sql)
            .bind(contains_pattern(hcp_name))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(InteractionRow::into_interaction).collect())
    }

    async fn list_since(
        &self,
        hcp_name: Option<&str>,
        since: NaiveDate,
    ) -> Result<Vec<Interaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM interactions
            WHERE interaction_date >= $1
              AND ($2::text IS NULL OR hcp_name ILIKE $2)
            ORDER BY interaction_date DESC, created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query_as::<_, InteractionRow>(&sql)
            .bind(since)
            .bind(hcp_name.map(contains_pattern))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(InteractionRow::into_interaction).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
