//! Interaction persistence.
//!
//! The engine only sees [`InteractionStore`]. Ids and timestamps are assigned
//! here, never by callers. Concurrent updates to one record are last-write-wins.

use async_trait::async_trait;
use chrono::NaiveDate;
use hcp_core::interactions::{Interaction, InteractionFields, InteractionPatch};

mod memory;
mod postgres;

pub use memory::MemoryInteractionStore;
pub use postgres::PgInteractionStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Interaction with ID {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn create(&self, fields: InteractionFields) -> Result<Interaction, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Interaction>, StoreError>;

    /// Apply a partial update. `NotFound` if `id` does not exist.
    async fn update(&self, id: i64, patch: &InteractionPatch) -> Result<Interaction, StoreError>;

    /// Case-insensitive substring match on the HCP name, most recent interaction first.
    async fn list_by_hcp_name(&self, hcp_name: &str) -> Result<Vec<Interaction>, StoreError>;

    /// Interactions dated on or after `since`, optionally filtered by HCP name.
    async fn list_since(
        &self,
        hcp_name: Option<&str>,
        since: NaiveDate,
    ) -> Result<Vec<Interaction>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Ordering shared by both stores: interaction date, then creation, newest first.
pub(crate) fn sort_most_recent_first(records: &mut [Interaction]) {
    records.sort_by(|a, b| {
        b.fields
            .interaction_date
            .cmp(&a.fields.interaction_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}
