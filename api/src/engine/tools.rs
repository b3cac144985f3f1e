//! Tool implementations. Each tool returns exactly one envelope or a
//! [`ToolError`], which the engine turns into an ERROR envelope.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Days, NaiveDate, Utc};
use hcp_core::dates::{parse_date_flexibly, parse_time_expression};
use hcp_core::envelope::{Envelope, FieldUpdate};
use hcp_core::fields::CanonicalField;
use hcp_core::interactions::{Interaction, InteractionFields, InteractionPatch};
use hcp_core::normalize::{normalize, normalize_value, resolve};
use regex::Regex;

use super::ToolCall;
use super::capabilities::{EntityExtractor, InsightSummarizer, doctor_mentioned};
use super::conversation;
use crate::store::{InteractionStore, StoreError};

pub const DEFAULT_HCP_NAME: &str = "Unknown";
pub const DEFAULT_INTERACTION_TYPE: &str = "Meeting";
pub const DEFAULT_SENTIMENT: &str = "Neutral";
/// Candidates listed when a name matches several records.
const MAX_CANDIDATES: usize = 10;

pub type Clock = fn() -> DateTime<Utc>;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Interaction with ID {0} not found.")]
    NotFound(i64),
    #[error("No interactions found for HCP name containing '{0}'.")]
    NoMatches(String),
    #[error("{}", ambiguity_message(.hcp_name, .candidates))]
    AmbiguousReference {
        hcp_name: String,
        candidates: Vec<Interaction>,
    },
    #[error(
        "I couldn't tell which fields to change{}. Try: change <field> to <value>",
        quoted_suffix(.instructions)
    )]
    NoChanges { instructions: String },
    #[error("I couldn't read '{value}' as a date, so nothing was changed. Try YYYY-MM-DD, 'yesterday' or 'March 3, 2026'.")]
    InvalidDate { value: String },
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ToolError::NotFound(id),
            other => ToolError::Store(other),
        }
    }
}

fn ambiguity_message(hcp_name: &str, candidates: &[Interaction]) -> String {
    let listing: Vec<String> = candidates
        .iter()
        .take(MAX_CANDIDATES)
        .map(|c| format!("  - {}", c.describe()))
        .collect();
    let hidden = match candidates.len().saturating_sub(MAX_CANDIDATES) {
        0 => String::new(),
        n => format!("\n  ...and {n} more"),
    };
    format!(
        "Multiple interactions found for '{hcp_name}':\n{}{hidden}\n\nNothing was changed. \
         Use '-edit interaction <ID> change <field> to <value>' to pick one.",
        listing.join("\n")
    )
}

fn quoted_suffix(text: &str) -> String {
    if text.trim().is_empty() {
        String::new()
    } else {
        format!(" from '{}'", text.trim())
    }
}

pub struct ToolSet {
    store: Arc<dyn InteractionStore>,
    extractor: Arc<dyn EntityExtractor>,
    summarizer: Arc<dyn InsightSummarizer>,
    clock: Clock,
}

impl ToolSet {
    pub fn new(
        store: Arc<dyn InteractionStore>,
        extractor: Arc<dyn EntityExtractor>,
        summarizer: Arc<dyn InsightSummarizer>,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            extractor,
            summarizer,
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date_naive()
    }

    pub async fn execute(
        &self,
        call: ToolCall,
        form_data: &BTreeMap<String, String>,
    ) -> Result<Envelope, ToolError> {
        match call {
            ToolCall::LogInteraction { text } => self.log_interaction(&text).await,
            ToolCall::EditInteraction { id, instructions } => {
                self.edit_interaction(id, &instructions).await
            }
            ToolCall::EditInteractionByName {
                hcp_name,
                instructions,
            } => self.edit_interaction_by_name(&hcp_name, &instructions).await,
            ToolCall::UpdateFormField { field, value } => Ok(update_form_field(&field, &value)),
            ToolCall::GetInteractionHistory { hcp_name } => {
                self.get_interaction_history(&hcp_name).await
            }
            ToolCall::GenerateSalesInsights {
                hcp_name,
                period_days,
            } => {
                self.generate_sales_insights(hcp_name.as_deref(), period_days)
                    .await
            }
            ToolCall::FormInformation => Ok(Envelope::plain(conversation::summarize_form(form_data))),
            ToolCall::Help => Ok(Envelope::plain(conversation::HELP_TEXT)),
            ToolCall::GeneralConversation { text } => Ok(Envelope::plain(conversation::reply(&text))),
        }
    }

    /// Extract, default, persist, and hand the populated pairs back to the form.
    pub async fn log_interaction(&self, text: &str) -> Result<Envelope, ToolError> {
        let today = self.today();
        let entities = match self.extractor.extract(text).await {
            Ok(entities) => entities,
            Err(err) => {
                tracing::warn!(error = %err, "Entity extraction failed, using defaults");
                BTreeMap::new()
            }
        };

        let mut record = InteractionFields::new(DEFAULT_HCP_NAME, today);
        let mut filled: Vec<CanonicalField> = Vec::new();
        let mut updates: Vec<FieldUpdate> = Vec::new();

        for (alias, raw) in &entities {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let Some((field, value)) = resolve(alias, raw) else {
                tracing::debug!(alias = %alias, "Extractor returned a field outside the schema");
                updates.push(FieldUpdate::new(alias.clone(), raw));
                continue;
            };
            // Dates and times are resolved for both; other values reach the
            // form as given and are normalized there.
            let (value, shown) = match field {
                CanonicalField::Date => {
                    let date = parse_date_flexibly(&value, today).to_string();
                    (date.clone(), date)
                }
                CanonicalField::Time => {
                    let time = parse_time_expression(&value).unwrap_or(value);
                    (time.clone(), time)
                }
                _ => (value, raw.to_string()),
            };
            record.set(field, value, today);
            filled.push(field);
            updates.push(FieldUpdate::new(alias.clone(), shown));
        }

        let defaults = [
            (
                CanonicalField::HcpName,
                doctor_mentioned(text).unwrap_or_else(|| DEFAULT_HCP_NAME.to_string()),
            ),
            (CanonicalField::Date, today.to_string()),
            (
                CanonicalField::InteractionType,
                DEFAULT_INTERACTION_TYPE.to_string(),
            ),
            (CanonicalField::Sentiment, DEFAULT_SENTIMENT.to_string()),
        ];
        for (field, value) in defaults {
            if !filled.contains(&field) {
                record.set(field, value.clone(), today);
                updates.push(FieldUpdate::new(field.as_str(), value));
            }
        }

        let stored = self.store.create(record).await?;
        tracing::info!(id = stored.id, hcp = %stored.fields.hcp_name, "Logged interaction");

        let message = format!(
            "Logged your interaction with {} (ID {}). I filled in {} form fields; review them and adjust anything that looks off.",
            stored.fields.hcp_name,
            stored.id,
            updates.len()
        );
        Ok(Envelope::form_populate(updates, message))
    }

    pub async fn edit_interaction(&self, id: i64, instructions: &str) -> Result<Envelope, ToolError> {
        let today = self.today();
        let existing = self.store.get(id).await?.ok_or(ToolError::NotFound(id))?;

        let mut changes = parse_field_changes(instructions);
        if changes.is_empty() && !instructions.trim().is_empty() {
            changes = self.extract_changes(instructions).await;
        }
        if changes.is_empty() {
            return Err(ToolError::NoChanges {
                instructions: instructions.to_string(),
            });
        }

        let mut patch = InteractionPatch::default();
        let mut described = Vec::with_capacity(changes.len());
        for (field, value) in changes {
            let value = match field {
                CanonicalField::Time => parse_time_expression(&value).unwrap_or(value),
                _ => value,
            };
            patch
                .set(field, value.clone(), today)
                .map_err(|_| ToolError::InvalidDate {
                    value: value.clone(),
                })?;
            let shown = match (field, patch.interaction_date) {
                (CanonicalField::Date, Some(date)) => date.to_string(),
                _ => value,
            };
            described.push(format!("{} to {}", field.label(), shown));
        }

        let updated = self.store.update(existing.id, &patch).await?;
        tracing::info!(id = updated.id, changes = described.len(), "Updated interaction");

        Ok(Envelope::plain(format!(
            "Updated interaction {} for {}: {}.",
            updated.id,
            updated.fields.hcp_name,
            described.join(", ")
        )))
    }

    /// Fallback for edit instructions the phrase parser could not read.
    async fn extract_changes(&self, instructions: &str) -> Vec<(CanonicalField, String)> {
        match self.extractor.extract(instructions).await {
            Ok(entities) => entities
                .iter()
                .filter(|(_, raw)| !raw.trim().is_empty())
                .filter_map(|(alias, raw)| resolve(alias, raw.trim()))
                .filter(|(field, _)| *field != CanonicalField::HcpName)
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not extract edit instructions");
                Vec::new()
            }
        }
    }

    pub async fn edit_interaction_by_name(
        &self,
        hcp_name: &str,
        instructions: &str,
    ) -> Result<Envelope, ToolError> {
        let mut matches = self.store.list_by_hcp_name(hcp_name).await?;
        match matches.len() {
            0 => Err(ToolError::NoMatches(hcp_name.to_string())),
            1 => {
                let only = matches.remove(0);
                self.edit_interaction(only.id, instructions).await
            }
            n => {
                tracing::info!(hcp = %hcp_name, candidates = n, "Edit by name is ambiguous");
                Err(ToolError::AmbiguousReference {
                    hcp_name: hcp_name.to_string(),
                    candidates: matches,
                })
            }
        }
    }

    /// Name search; a `Dr. Lastname` query with no hits retries on the last name.
    async fn find_by_name(&self, hcp_name: &str) -> Result<Vec<Interaction>, StoreError> {
        let found = self.store.list_by_hcp_name(hcp_name).await?;
        match (found.is_empty(), last_name_of_doctor(hcp_name)) {
            (true, Some(last_name)) => self.store.list_by_hcp_name(last_name).await,
            _ => Ok(found),
        }
    }

    pub async fn get_interaction_history(&self, hcp_name: &str) -> Result<Envelope, ToolError> {
        let records = self.find_by_name(hcp_name).await?;
        if records.is_empty() {
            return Ok(Envelope::plain(format!("No interactions found for {hcp_name}.")));
        }

        let lines: Vec<String> = records.iter().map(history_line).collect();
        Ok(Envelope::plain(format!(
            "Interaction history for {hcp_name} ({} interactions):\n\n{}",
            records.len(),
            lines.join("\n")
        )))
    }

    pub async fn generate_sales_insights(
        &self,
        hcp_name: Option<&str>,
        period_days: u32,
    ) -> Result<Envelope, ToolError> {
        let today = self.today();
        let since = today
            .checked_sub_days(Days::new(u64::from(period_days)))
            .unwrap_or(NaiveDate::MIN);

        let mut records = self.store.list_since(hcp_name, since).await?;
        if records.is_empty() {
            if let Some(last_name) = hcp_name.and_then(last_name_of_doctor) {
                records = self.store.list_since(Some(last_name), since).await?;
            }
        }
        if records.is_empty() {
            let target = hcp_name.unwrap_or("your sales activities");
            return Ok(Envelope::plain(format!(
                "No recent interactions found for {target} in the last {period_days} days."
            )));
        }

        let text = match self.summarizer.summarize(hcp_name, period_days, &records).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "Insight summarizer failed, using counts summary");
                counts_summary(hcp_name, period_days, &records)
            }
        };
        Ok(Envelope::plain(text))
    }
}

/// Direct form write. Normalization here is safe to repeat on the consumer.
pub fn update_form_field(field: &str, value: &str) -> Envelope {
    let (canonical, value) = normalize(field, value.trim());
    let message = match CanonicalField::from_alias(&canonical) {
        Some(known) => format!("Set {} to {}.", known.label(), value),
        None => format!("Set '{canonical}' to {value}. Note: '{canonical}' is not a standard form field."),
    };
    Envelope::form_update(canonical, value, message)
}

fn last_name_of_doctor(hcp_name: &str) -> Option<&str> {
    let rest = hcp_name.trim().strip_prefix("Dr. ")?;
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(last), None) => Some(last),
        _ => None,
    }
}

fn history_line(record: &Interaction) -> String {
    let fields = &record.fields;
    let summary = fields
        .outcomes
        .as_deref()
        .or(fields.topics_discussed.as_deref())
        .unwrap_or("");
    let summary: String = if summary.chars().count() > 100 {
        format!("{}...", summary.chars().take(100).collect::<String>())
    } else {
        summary.to_string()
    };
    format!(
        "- ID {} | {} {} | {} | {} | {}",
        record.id,
        fields.interaction_date,
        fields.interaction_time.as_deref().unwrap_or(""),
        fields.interaction_type.as_deref().unwrap_or("N/A"),
        fields.sentiment.as_deref().unwrap_or("N/A"),
        summary
    )
    .replace("  |", " |")
}

fn counts_summary(hcp_name: Option<&str>, period_days: u32, records: &[Interaction]) -> String {
    fn tally<'a>(values: impl Iterator<Item = Option<&'a str>>) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values {
            *counts.entry(value.unwrap_or("Unspecified")).or_default() += 1;
        }
        counts
            .iter()
            .map(|(k, n)| format!("{k} {n}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    let by_type = tally(records.iter().map(|r| r.fields.interaction_type.as_deref()));
    let by_sentiment = tally(records.iter().map(|r| r.fields.sentiment.as_deref()));
    let latest = records
        .iter()
        .max_by_key(|r| (r.fields.interaction_date, r.created_at))
        .map(|r| format!("{} with {}", r.fields.interaction_date, r.fields.hcp_name))
        .unwrap_or_default();

    format!(
        "Sales Insights - {} (last {period_days} days)\n\n\
         Interactions: {}\n\
         By type: {by_type}\n\
         By sentiment: {by_sentiment}\n\
         Most recent: {latest}",
        hcp_name.unwrap_or("Sales Pipeline"),
        records.len()
    )
}

static CHANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:(?:change|set|update)\s+)?(?:the\s+)?(.+?)\s+(?:to|as)\s+(.+?)\s*$")
        .expect("valid change regex")
});
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:[,;]|\band\b)\s*").expect("valid separator regex"));

fn parse_change(segment: &str) -> Option<(CanonicalField, String)> {
    let caps = CHANGE_RE.captures(segment)?;
    let field = CanonicalField::from_alias(caps[1].trim())?;
    let value = caps[2].trim().trim_matches(|c: char| c == '"' || c == '\'');
    (!value.is_empty()).then(|| (field, value.to_string()))
}

/// Read `change <field> to <value>` phrases, several joined by `,` `;` or `and`.
///
/// A segment that is not itself a change is treated as a continuation of the
/// previous value (`follow up to call back and send the deck`).
pub fn parse_field_changes(text: &str) -> Vec<(CanonicalField, String)> {
    let mut segments: Vec<(&str, &str)> = Vec::new();
    let mut start = 0;
    let mut separator = "";
    for m in SEPARATOR_RE.find_iter(text) {
        segments.push((separator, &text[start..m.start()]));
        separator = m.as_str();
        start = m.end();
    }
    segments.push((separator, &text[start..]));

    let mut changes: Vec<(CanonicalField, String)> = Vec::new();
    for (separator, segment) in segments {
        if segment.trim().is_empty() {
            continue;
        }
        match parse_change(segment) {
            Some(change) => changes.push(change),
            None => {
                if let Some((_, value)) = changes.last_mut() {
                    value.push_str(separator);
                    value.push_str(segment);
                }
            }
        }
    }

    changes
        .into_iter()
        .map(|(field, value)| {
            let value = normalize_value(field, value.trim());
            (field, value)
        })
        .collect()
}
