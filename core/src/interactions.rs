use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dates::{parse_date_flexibly, try_parse_date};
use crate::fields::CanonicalField;
use crate::form::ValidationError;

/// The canonical-field-keyed body of an interaction record.
///
/// Serialized names are exactly the canonical field names, so a form
/// submission and a stored record share one wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFields {
    pub hcp_name: String,
    #[serde(rename = "date")]
    pub interaction_date: NaiveDate,
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub interaction_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics_discussed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials_shared: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_distributed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_actions: Option<String>,
}

impl InteractionFields {
    pub fn new(hcp_name: impl Into<String>, interaction_date: NaiveDate) -> Self {
        Self {
            hcp_name: hcp_name.into(),
            interaction_date,
            interaction_time: None,
            interaction_type: None,
            attendees: None,
            topics_discussed: None,
            materials_shared: None,
            samples_distributed: None,
            sentiment: None,
            outcomes: None,
            follow_up_actions: None,
        }
    }

    /// Current value of a field, rendered as text.
    pub fn get(&self, field: CanonicalField) -> Option<String> {
        match field {
            CanonicalField::HcpName => Some(self.hcp_name.clone()),
            CanonicalField::Date => Some(self.interaction_date.to_string()),
            other => self.optional_slot(other).and_then(|slot| slot.clone()),
        }
    }

    /// Write a canonical value. Dates go through the lenient parser.
    pub fn set(&mut self, field: CanonicalField, value: String, today: NaiveDate) {
        match field {
            CanonicalField::HcpName => self.hcp_name = value,
            CanonicalField::Date => self.interaction_date = parse_date_flexibly(&value, today),
            other => {
                if let Some(slot) = self.optional_slot_mut(other) {
                    *slot = Some(value);
                }
            }
        }
    }

    fn optional_slot(&self, field: CanonicalField) -> Option<&Option<String>> {
        match field {
            CanonicalField::Time => Some(&self.interaction_time),
            CanonicalField::InteractionType => Some(&self.interaction_type),
            CanonicalField::Attendees => Some(&self.attendees),
            CanonicalField::TopicsDiscussed => Some(&self.topics_discussed),
            CanonicalField::MaterialsShared => Some(&self.materials_shared),
            CanonicalField::SamplesDistributed => Some(&self.samples_distributed),
            CanonicalField::Sentiment => Some(&self.sentiment),
            CanonicalField::Outcomes => Some(&self.outcomes),
            CanonicalField::FollowUpActions => Some(&self.follow_up_actions),
            CanonicalField::HcpName | CanonicalField::Date => None,
        }
    }

    fn optional_slot_mut(&mut self, field: CanonicalField) -> Option<&mut Option<String>> {
        match field {
            CanonicalField::Time => Some(&mut self.interaction_time),
            CanonicalField::InteractionType => Some(&mut self.interaction_type),
            CanonicalField::Attendees => Some(&mut self.attendees),
            CanonicalField::TopicsDiscussed => Some(&mut self.topics_discussed),
            CanonicalField::MaterialsShared => Some(&mut self.materials_shared),
            CanonicalField::SamplesDistributed => Some(&mut self.samples_distributed),
            CanonicalField::Sentiment => Some(&mut self.sentiment),
            CanonicalField::Outcomes => Some(&mut self.outcomes),
            CanonicalField::FollowUpActions => Some(&mut self.follow_up_actions),
            CanonicalField::HcpName | CanonicalField::Date => None,
        }
    }
}

/// A persisted interaction. `id` and the timestamps belong to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: i64,
    #[serde(flatten)]
    pub fields: InteractionFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interaction {
    /// One-line description used in history listings and disambiguation prompts.
    pub fn describe(&self) -> String {
        format!(
            "ID {}: {} on {} at {}",
            self.id,
            self.fields.hcp_name,
            self.fields.interaction_date,
            self.fields.interaction_time.as_deref().unwrap_or("N/A")
        )
    }
}

/// Partial update. Absent fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcp_name: Option<String>,
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    pub interaction_date: Option<NaiveDate>,
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub interaction_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics_discussed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials_shared: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_distributed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_actions: Option<String>,
}

impl InteractionPatch {
    /// Stage a change. Unreadable dates are rejected, never replaced with `today`.
    pub fn set(
        &mut self,
        field: CanonicalField,
        value: String,
        today: NaiveDate,
    ) -> Result<(), ValidationError> {
        match field {
            CanonicalField::HcpName => self.hcp_name = Some(value),
            CanonicalField::Date => {
                let date = try_parse_date(&value, today)
                    .ok_or(ValidationError::InvalidDate { value })?;
                self.interaction_date = Some(date);
            }
            CanonicalField::Time => self.interaction_time = Some(value),
            CanonicalField::InteractionType => self.interaction_type = Some(value),
            CanonicalField::Attendees => self.attendees = Some(value),
            CanonicalField::TopicsDiscussed => self.topics_discussed = Some(value),
            CanonicalField::MaterialsShared => self.materials_shared = Some(value),
            CanonicalField::SamplesDistributed => self.samples_distributed = Some(value),
            CanonicalField::Sentiment => self.sentiment = Some(value),
            CanonicalField::Outcomes => self.outcomes = Some(value),
            CanonicalField::FollowUpActions => self.follow_up_actions = Some(value),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == InteractionPatch::default()
    }

    /// Apply onto a full record. Used by the in-memory store.
    pub fn apply_to(&self, fields: &mut InteractionFields) {
        fn merge(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }

        if let Some(name) = &self.hcp_name {
            fields.hcp_name = name.clone();
        }
        if let Some(date) = self.interaction_date {
            fields.interaction_date = date;
        }
        merge(&mut fields.interaction_time, &self.interaction_time);
        merge(&mut fields.interaction_type, &self.interaction_type);
        merge(&mut fields.attendees, &self.attendees);
        merge(&mut fields.topics_discussed, &self.topics_discussed);
        merge(&mut fields.materials_shared, &self.materials_shared);
        merge(&mut fields.samples_distributed, &self.samples_distributed);
        merge(&mut fields.sentiment, &self.sentiment);
        merge(&mut fields.outcomes, &self.outcomes);
        merge(&mut fields.follow_up_actions, &self.follow_up_actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn set_and_get_cover_every_field() {
        let mut fields = InteractionFields::new("Dr. A", day(1));
        for field in CanonicalField::ALL {
            let value = if field == CanonicalField::Date {
                "2026-05-07".to_string()
            } else {
                format!("value-{field}")
            };
            fields.set(field, value.clone(), day(1));
            assert_eq!(fields.get(field), Some(value));
        }
    }

    #[test]
    fn record_serializes_with_canonical_names() {
        let mut fields = InteractionFields::new("Dr. Smith", day(2));
        fields.sentiment = Some("Positive".into());
        fields.interaction_time = Some("09:30".into());

        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value["hcpName"], "Dr. Smith");
        assert_eq!(value["date"], "2026-05-02");
        assert_eq!(value["time"], "09:30");
        assert_eq!(value["sentiment"], "Positive");
        assert!(value.get("attendees").is_none());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut fields = InteractionFields::new("Dr. Smith", day(2));
        fields.outcomes = Some("Pilot agreed".into());

        let mut patch = InteractionPatch::default();
        assert!(patch.is_empty());
        patch.set(CanonicalField::Sentiment, "Negative".into(), day(9)).unwrap();
        patch.set(CanonicalField::Date, "yesterday".into(), day(9)).unwrap();
        patch.apply_to(&mut fields);

        assert_eq!(fields.sentiment.as_deref(), Some("Negative"));
        assert_eq!(fields.interaction_date, day(8));
        assert_eq!(fields.outcomes.as_deref(), Some("Pilot agreed"));
        assert_eq!(fields.hcp_name, "Dr. Smith");
    }

    #[test]
    fn patch_rejects_unreadable_dates() {
        let mut patch = InteractionPatch::default();
        let err = patch
            .set(CanonicalField::Date, "next tuesday".into(), day(20))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDate {
                value: "next tuesday".into()
            }
        );
        assert!(patch.is_empty());
    }
}
