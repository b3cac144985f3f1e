use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The fixed interaction-record schema.
///
/// Adding a variant means touching three places together: `ALL`, `as_str`, and
/// the alias table below (the value tables too, if the field is enumerated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    HcpName,
    InteractionType,
    Date,
    Time,
    Attendees,
    TopicsDiscussed,
    MaterialsShared,
    SamplesDistributed,
    Sentiment,
    Outcomes,
    FollowUpActions,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 11] = [
        CanonicalField::HcpName,
        CanonicalField::InteractionType,
        CanonicalField::Date,
        CanonicalField::Time,
        CanonicalField::Attendees,
        CanonicalField::TopicsDiscussed,
        CanonicalField::MaterialsShared,
        CanonicalField::SamplesDistributed,
        CanonicalField::Sentiment,
        CanonicalField::Outcomes,
        CanonicalField::FollowUpActions,
    ];

    /// Fields a direct form submission cannot omit.
    pub const REQUIRED: [CanonicalField; 3] = [
        CanonicalField::HcpName,
        CanonicalField::InteractionType,
        CanonicalField::Date,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::HcpName => "hcpName",
            CanonicalField::InteractionType => "interactionType",
            CanonicalField::Date => "date",
            CanonicalField::Time => "time",
            CanonicalField::Attendees => "attendees",
            CanonicalField::TopicsDiscussed => "topicsDiscussed",
            CanonicalField::MaterialsShared => "materialsShared",
            CanonicalField::SamplesDistributed => "samplesDistributed",
            CanonicalField::Sentiment => "sentiment",
            CanonicalField::Outcomes => "outcomes",
            CanonicalField::FollowUpActions => "followUpActions",
        }
    }

    /// Human label used in chat messages and form summaries.
    pub fn label(self) -> &'static str {
        match self {
            CanonicalField::HcpName => "HCP",
            CanonicalField::InteractionType => "Interaction type",
            CanonicalField::Date => "Date",
            CanonicalField::Time => "Time",
            CanonicalField::Attendees => "Attendees",
            CanonicalField::TopicsDiscussed => "Topics discussed",
            CanonicalField::MaterialsShared => "Materials shared",
            CanonicalField::SamplesDistributed => "Samples distributed",
            CanonicalField::Sentiment => "Sentiment",
            CanonicalField::Outcomes => "Outcomes",
            CanonicalField::FollowUpActions => "Follow-up actions",
        }
    }

    /// Resolve any known alias (case-insensitive) to its canonical field.
    pub fn from_alias(alias: &str) -> Option<CanonicalField> {
        let key = alias.trim().to_lowercase();
        if let Some(field) = ALIASES.get(key.as_str()) {
            return Some(*field);
        }
        let underscored = key.replace([' ', '-'], "_");
        ALIASES.get(underscored.as_str()).copied()
    }

    /// Enumerated value domain, if this field has one.
    pub fn value_domain(self) -> Option<&'static HashMap<&'static str, &'static str>> {
        match self {
            CanonicalField::Sentiment => Some(&SENTIMENT_VALUES),
            CanonicalField::InteractionType => Some(&INTERACTION_TYPE_VALUES),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased alias → canonical field. The identity alias of every field is
/// inserted from `CanonicalField::ALL`, so closure holds by construction.
static ALIASES: LazyLock<HashMap<String, CanonicalField>> = LazyLock::new(|| {
    use CanonicalField::*;

    let extra: &[(&str, CanonicalField)] = &[
        // storage / extraction names
        ("hcp_name", HcpName),
        ("interaction_type", InteractionType),
        ("interaction_date", Date),
        ("interaction_time", Time),
        ("key_discussion_points", TopicsDiscussed),
        ("topics_discussed", TopicsDiscussed),
        ("materials_shared", MaterialsShared),
        ("samples_distributed", SamplesDistributed),
        ("follow_up_actions", FollowUpActions),
        ("summary", Outcomes),
        // short forms used in chat commands
        ("name", HcpName),
        ("doctor", HcpName),
        ("hcp", HcpName),
        ("type", InteractionType),
        ("topics", TopicsDiscussed),
        ("discussion", TopicsDiscussed),
        ("materials", MaterialsShared),
        ("samples", SamplesDistributed),
        ("follow_up", FollowUpActions),
        ("followup", FollowUpActions),
        ("results", Outcomes),
        ("when", Date),
        ("meeting_date", Date),
        ("meeting_time", Time),
        // sentiment synonyms
        ("hcpsentiment", Sentiment),
        ("hcp_sentiment", Sentiment),
        ("feeling", Sentiment),
        ("mood", Sentiment),
        ("reaction", Sentiment),
    ];

    let mut table: HashMap<String, CanonicalField> = CanonicalField::ALL
        .iter()
        .map(|field| (field.as_str().to_lowercase(), *field))
        .collect();
    for (alias, field) in extra {
        table.insert((*alias).to_string(), *field);
    }
    table
});

static SENTIMENT_VALUES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("positive", "Positive"),
        ("good", "Positive"),
        ("happy", "Positive"),
        ("pleased", "Positive"),
        ("satisfied", "Positive"),
        ("neutral", "Neutral"),
        ("okay", "Neutral"),
        ("ok", "Neutral"),
        ("fine", "Neutral"),
        ("average", "Neutral"),
        ("negative", "Negative"),
        ("bad", "Negative"),
        ("unhappy", "Negative"),
        ("dissatisfied", "Negative"),
        ("concerned", "Negative"),
    ])
});

static INTERACTION_TYPE_VALUES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("meeting", "Meeting"),
            ("call", "Call"),
            ("phone", "Call"),
            ("phone call", "Call"),
            ("email", "Email"),
            ("e-mail", "Email"),
            ("visit", "Visit"),
            ("conference", "Conference"),
            ("other", "Other"),
        ])
    });

/// Every alias the table knows, for diagnostics and tests.
pub fn known_aliases() -> impl Iterator<Item = (&'static str, CanonicalField)> {
    ALIASES.iter().map(|(alias, field)| (alias.as_str(), *field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_field_has_identity_alias() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_alias(field.as_str()), Some(field));
        }
    }

    #[test]
    fn alias_lookup_ignores_case_and_separators() {
        assert_eq!(
            CanonicalField::from_alias("HCP Name"),
            Some(CanonicalField::HcpName)
        );
        assert_eq!(
            CanonicalField::from_alias("  Key Discussion Points "),
            Some(CanonicalField::TopicsDiscussed)
        );
        assert_eq!(
            CanonicalField::from_alias("follow-up"),
            Some(CanonicalField::FollowUpActions)
        );
        assert_eq!(
            CanonicalField::from_alias("HCPSENTIMENT"),
            Some(CanonicalField::Sentiment)
        );
    }

    #[test]
    fn unknown_alias_is_not_resolved() {
        assert_eq!(CanonicalField::from_alias("favouriteColour"), None);
    }

    #[test]
    fn serde_names_match_canonical_strings() {
        for field in CanonicalField::ALL {
            let encoded = serde_json::to_value(field).unwrap();
            assert_eq!(encoded, serde_json::Value::String(field.as_str().into()));
        }
    }

    #[test]
    fn alias_table_only_targets_known_fields_and_is_lowercase() {
        for (alias, field) in known_aliases() {
            assert_eq!(alias, alias.to_lowercase(), "alias {alias} must be stored lowercased");
            assert!(CanonicalField::ALL.contains(&field));
        }
    }

    #[test]
    fn value_domains_map_canonical_values_to_themselves() {
        for field in [CanonicalField::Sentiment, CanonicalField::InteractionType] {
            let domain = field.value_domain().unwrap();
            for canonical in domain.values() {
                assert_eq!(domain.get(canonical.to_lowercase().as_str()), Some(canonical));
            }
        }
    }

    #[test]
    fn only_enumerated_fields_have_domains() {
        let enumerated: Vec<_> = CanonicalField::ALL
            .into_iter()
            .filter(|f| f.value_domain().is_some())
            .collect();
        assert_eq!(
            enumerated,
            vec![CanonicalField::InteractionType, CanonicalField::Sentiment]
        );
    }
}
