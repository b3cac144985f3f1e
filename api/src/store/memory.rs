use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use hcp_core::interactions::{Interaction, InteractionFields, InteractionPatch};
use tokio::sync::RwLock;

use super::{InteractionStore, StoreError, sort_most_recent_first};

/// Process-local store used when no `DATABASE_URL` is configured, and in tests.
#[derive(Default)]
pub struct MemoryInteractionStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<i64, Interaction>,
}

impl MemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn name_matches(record: &Interaction, needle: &str) -> bool {
    record
        .fields
        .hcp_name
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}

#[async_trait]
impl InteractionStore for MemoryInteractionStore {
    async fn create(&self, fields: InteractionFields) -> Result<Interaction, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let now = Utc::now();
        let record = Interaction {
            id: inner.next_id,
            fields,
            created_at: now,
            updated_at: now,
        };
        inner.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<Interaction>, StoreError> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn update(&self, id: i64, patch: &InteractionPatch) -> Result<Interaction, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(&mut record.fields);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_by_hcp_name(&self, hcp_name: &str) -> Result<Vec<Interaction>, StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Interaction> = inner
            .records
            .values()
            .filter(|r| name_matches(r, hcp_name))
            .cloned()
            .collect();
        sort_most_recent_first(&mut matches);
        Ok(matches)
    }

    async fn list_since(
        &self,
        hcp_name: Option<&str>,
        since: NaiveDate,
    ) -> Result<Vec<Interaction>, StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Interaction> = inner
            .records
            .values()
            .filter(|r| r.fields.interaction_date >= since)
            .filter(|r| hcp_name.is_none_or(|name| name_matches(r, name)))
            .cloned()
            .collect();
        sort_most_recent_first(&mut matches);
        Ok(matches)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hcp_core::fields::CanonicalField;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = MemoryInteractionStore::new();
        let a = store.create(InteractionFields::new("Dr. A", day(1))).await.unwrap();
        let b = store.create(InteractionFields::new("Dr. B", day(1))).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.get(a.id).await.unwrap().unwrap().fields.hcp_name, "Dr. A");
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = MemoryInteractionStore::new();
        let err = store.update(42, &InteractionPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let store = MemoryInteractionStore::new();
        let mut fields = InteractionFields::new("Dr. Smith", day(3));
        fields.outcomes = Some("Agreed".into());
        let created = store.create(fields).await.unwrap();

        let mut patch = InteractionPatch::default();
        patch.set(CanonicalField::Sentiment, "Positive".into(), day(3)).unwrap();
        let updated = store.update(created.id, &patch).await.unwrap();

        assert_eq!(updated.fields.sentiment.as_deref(), Some("Positive"));
        assert_eq!(updated.fields.outcomes.as_deref(), Some("Agreed"));
    }

    #[tokio::test]
    async fn name_search_is_case_insensitive_and_most_recent_first() {
        let store = MemoryInteractionStore::new();
        store.create(InteractionFields::new("Dr. John Smith", day(1))).await.unwrap();
        store.create(InteractionFields::new("Dr. Jane Smith", day(5))).await.unwrap();
        store.create(InteractionFields::new("Dr. Lee", day(9))).await.unwrap();

        let found = store.list_by_hcp_name("smith").await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.fields.hcp_name.as_str()).collect();
        assert_eq!(names, vec!["Dr. Jane Smith", "Dr. John Smith"]);
    }

    #[tokio::test]
    async fn list_since_filters_by_date_and_name() {
        let store = MemoryInteractionStore::new();
        store.create(InteractionFields::new("Dr. Smith", day(1))).await.unwrap();
        store.create(InteractionFields::new("Dr. Smith", day(10))).await.unwrap();
        store.create(InteractionFields::new("Dr. Lee", day(12))).await.unwrap();

        assert_eq!(store.list_since(None, day(5)).await.unwrap().len(), 2);
        assert_eq!(store.list_since(Some("smith"), day(5)).await.unwrap().len(), 1);
    }
}
