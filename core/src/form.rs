//! Client-held form state with per-field transient highlight flags.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::dates::try_parse_date;
use crate::fields::CanonicalField;
use crate::interactions::InteractionFields;
use crate::normalize::normalize;

/// Transient per-field flag. `RecentlyUpdated` returns to `Idle` once
/// `expires_at` has passed; a new write restarts the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldHighlight {
    Idle,
    RecentlyUpdated { expires_at: DateTime<Utc> },
}

impl FieldHighlight {
    pub fn at(self, now: DateTime<Utc>) -> FieldHighlight {
        match self {
            FieldHighlight::RecentlyUpdated { expires_at } if now < expires_at => self,
            _ => FieldHighlight::Idle,
        }
    }

    pub fn is_highlighted(self, now: DateTime<Utc>) -> bool {
        matches!(self.at(now), FieldHighlight::RecentlyUpdated { .. })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", join_labels(.missing))]
    MissingRequired { missing: Vec<CanonicalField> },
    #[error("could not read date '{value}'")]
    InvalidDate { value: String },
}

impl ValidationError {
    pub fn field(&self) -> CanonicalField {
        match self {
            ValidationError::MissingRequired { missing } => {
                missing.first().copied().unwrap_or(CanonicalField::HcpName)
            }
            ValidationError::InvalidDate { .. } => CanonicalField::Date,
        }
    }
}

fn join_labels(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Field-name keyed values. Keys are canonical names, except for aliases the
/// table does not know, which are stored literally.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: BTreeMap<String, String>,
    highlights: BTreeMap<String, FieldHighlight>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only write path. Normalizes, stores and highlights until `now + window`.
    /// Returns the `(field, value)` actually written.
    pub fn apply_update(
        &mut self,
        alias_field: &str,
        raw_value: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> (String, String) {
        let (field, value) = normalize(alias_field, raw_value);
        if CanonicalField::from_alias(&field).is_none() {
            tracing::warn!(field = %field, "Storing value under unknown field name");
        }
        self.values.insert(field.clone(), value.clone());
        self.highlights.insert(
            field.clone(),
            FieldHighlight::RecentlyUpdated {
                expires_at: now + window,
            },
        );
        (field, value)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn value(&self, field: CanonicalField) -> Option<&str> {
        self.get(field.as_str())
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn highlight(&self, field: &str, now: DateTime<Utc>) -> FieldHighlight {
        self.highlights
            .get(field)
            .map(|h| h.at(now))
            .unwrap_or(FieldHighlight::Idle)
    }

    /// Drop expired highlight flags. Returns the fields that went back to idle.
    pub fn expire_highlights(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .highlights
            .iter()
            .filter(|(_, h)| !h.is_highlighted(now))
            .map(|(field, _)| field.clone())
            .collect();
        for field in &expired {
            self.highlights.remove(field);
        }
        expired
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.highlights.clear();
    }

    fn filled(&self, field: CanonicalField) -> Option<&str> {
        self.value(field)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .into_iter()
            .filter(|f| self.filled(*f).is_none())
            .collect()
    }

    /// Validate and build the create payload for a direct submission.
    ///
    /// Values under unknown field names are left out of the payload.
    pub fn submission(&self, today: NaiveDate) -> Result<InteractionFields, ValidationError> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequired { missing });
        }

        let raw_date = self.filled(CanonicalField::Date).unwrap_or_default();
        let date = try_parse_date(raw_date, today).ok_or_else(|| ValidationError::InvalidDate {
            value: raw_date.to_string(),
        })?;
        let name = self.filled(CanonicalField::HcpName).unwrap_or_default();

        let mut record = InteractionFields::new(name, date);
        for field in CanonicalField::ALL {
            if matches!(field, CanonicalField::HcpName | CanonicalField::Date) {
                continue;
            }
            if let Some(value) = self.filled(field) {
                record.set(field, value.to_string(), today);
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    #[test]
    fn apply_update_normalizes_and_highlights() {
        let mut form = FormState::new();
        let written = form.apply_update("Mood", "happy", t0(), Duration::seconds(3));

        assert_eq!(written, ("sentiment".into(), "Positive".into()));
        assert_eq!(form.value(CanonicalField::Sentiment), Some("Positive"));
        assert_eq!(
            form.highlight("sentiment", t0() + Duration::seconds(2)),
            FieldHighlight::RecentlyUpdated {
                expires_at: t0() + Duration::seconds(3)
            }
        );
        assert_eq!(
            form.highlight("sentiment", t0() + Duration::seconds(3)),
            FieldHighlight::Idle
        );
    }

    #[test]
    fn rewrite_restarts_the_highlight_window() {
        let mut form = FormState::new();
        let window = Duration::seconds(3);
        form.apply_update("sentiment", "bad", t0(), window);
        form.apply_update("sentiment", "good", t0() + Duration::seconds(2), window);

        let later = t0() + Duration::seconds(4);
        assert!(form.highlight("sentiment", later).is_highlighted(later));
        assert!(form.expire_highlights(later).is_empty());
        assert_eq!(
            form.expire_highlights(t0() + Duration::seconds(5)),
            vec!["sentiment".to_string()]
        );
    }

    #[test]
    fn unknown_alias_is_stored_literally() {
        let mut form = FormState::new();
        form.apply_update("favourite colour", "blue", t0(), Duration::seconds(3));
        assert_eq!(form.get("favourite colour"), Some("blue"));
    }

    #[test]
    fn submission_requires_the_required_fields() {
        let mut form = FormState::new();
        form.apply_update("name", "Dr. Smith", t0(), Duration::seconds(3));
        form.apply_update("type", "  ", t0(), Duration::seconds(3));

        let err = form.submission(today()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequired {
                missing: vec![CanonicalField::InteractionType, CanonicalField::Date]
            }
        );
        assert_eq!(err.field(), CanonicalField::InteractionType);
    }

    #[test]
    fn submission_rejects_unreadable_dates() {
        let mut form = FormState::new();
        form.apply_update("hcpName", "Dr. Smith", t0(), Duration::seconds(3));
        form.apply_update("interactionType", "Meeting", t0(), Duration::seconds(3));
        form.apply_update("date", "the other day", t0(), Duration::seconds(3));

        assert_eq!(
            form.submission(today()),
            Err(ValidationError::InvalidDate {
                value: "the other day".into()
            })
        );
    }

    #[test]
    fn full_form_produces_payload_keyed_by_the_canonical_set() {
        let mut form = FormState::new();
        for field in CanonicalField::ALL {
            let value = match field {
                CanonicalField::Date => "2026-03-30".to_string(),
                CanonicalField::Sentiment => "good".to_string(),
                CanonicalField::InteractionType => "phone".to_string(),
                other => format!("{} value", other.label()),
            };
            form.apply_update(field.as_str(), &value, t0(), Duration::seconds(3));
        }
        form.apply_update("favourite colour", "blue", t0(), Duration::seconds(3));

        let payload = form.submission(today()).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        let keys: BTreeSet<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        let canonical: BTreeSet<&str> = CanonicalField::ALL.iter().map(|f| f.as_str()).collect();

        assert_eq!(keys, canonical);
        assert_eq!(json["sentiment"], "Positive");
        assert_eq!(json["interactionType"], "Call");
        assert_eq!(json["date"], "2026-03-30");
    }
}
