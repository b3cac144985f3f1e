//! Canned conversational replies and the form summary.

use std::collections::BTreeMap;

use hcp_core::fields::CanonicalField;
use hcp_core::normalize::resolve;

pub const HELP_TEXT: &str = "\
I can help you with several HCP interaction tasks. Start a message with '-' to run one:

- Log a new interaction: -log I met Dr. Smith today, she was very positive about the trial data
- Edit an interaction: -edit interaction 12 change sentiment to negative
- Edit by HCP name: -edit interaction with Dr. Smith change time to 10:30
- Update the form: -put sentiment as positive
- Interaction history: -history for Dr. Smith
- Sales insights: -insights for Dr. Smith last 60 days
- Review the form: -form

Without the '-' we're just having a conversation.";

struct Reply {
    phrases: &'static [&'static str],
    max_words: Option<usize>,
    text: &'static str,
}

const REPLIES: &[Reply] = &[
    Reply {
        phrases: &["good morning"],
        max_words: Some(3),
        text: "Good morning! Hope you're having a great day.",
    },
    Reply {
        phrases: &["good afternoon"],
        max_words: Some(3),
        text: "Good afternoon! How's your day going?",
    },
    Reply {
        phrases: &["good evening"],
        max_words: Some(3),
        text: "Good evening! Hope you had a productive day.",
    },
    Reply {
        phrases: &["hello", "hi", "hey"],
        max_words: Some(3),
        text: "Hi! How are you doing today?",
    },
    Reply {
        phrases: &["how are you", "how you doing", "what's up", "how's it going"],
        max_words: None,
        text: "I'm doing great, thanks for asking! I'm ready to help with your HCP interactions.",
    },
    Reply {
        phrases: &["help", "what can you do", "how do i", "commands"],
        max_words: None,
        text: HELP_TEXT,
    },
    Reply {
        phrases: &["thank you", "thanks", "appreciate"],
        max_words: None,
        text: "You're welcome! Anything else you need help with?",
    },
    Reply {
        phrases: &["who are you", "what are you", "tell me about yourself"],
        max_words: None,
        text: "I'm your HCP interaction assistant. I help you log and manage interactions with \
               healthcare professionals. Put '-' in front of any task you want me to perform.",
    },
    Reply {
        phrases: &["what is hcp", "what are hcp", "what does hcp mean", "define hcp"],
        max_words: None,
        text: "HCP stands for Healthcare Professional: doctors, nurses, pharmacists and other \
               clinicians who make treatment decisions and whom field representatives meet.",
    },
    Reply {
        phrases: &["crm", "customer relationship management"],
        max_words: None,
        text: "A CRM keeps track of your meetings, calls, emails and follow-ups with healthcare \
               professionals, so every relationship has a complete history.",
    },
];

const FALLBACK_REPLY: &str = "I'm here to chat or help with HCP interaction tasks. \
    When you want me to do something, start your message with '-', for example -help.";

fn contains_word_or_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.contains(' ') {
        return haystack.contains(phrase);
    }
    haystack
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|word| word == phrase)
}

/// Pick a canned reply for unprefixed small talk.
pub fn reply(text: &str) -> &'static str {
    let lower = text.trim().to_lowercase();
    let words = lower.split_whitespace().count();

    REPLIES
        .iter()
        .find(|reply| {
            reply.max_words.is_none_or(|max| words <= max)
                && reply
                    .phrases
                    .iter()
                    .any(|phrase| contains_word_or_phrase(&lower, phrase))
        })
        .map(|reply| reply.text)
        .unwrap_or(FALLBACK_REPLY)
}

const PREVIEW_CHARS: usize = 100;

fn preview(value: &str) -> String {
    if value.chars().count() <= PREVIEW_CHARS {
        return value.to_string();
    }
    let head: String = value.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Describe a client's current form: filled fields, completeness and readiness.
pub fn summarize_form(form_data: &BTreeMap<String, String>) -> String {
    let mut canonical: BTreeMap<CanonicalField, String> = BTreeMap::new();
    for (alias, raw) in form_data {
        if raw.trim().is_empty() {
            continue;
        }
        if let Some((field, value)) = resolve(alias, raw) {
            canonical.insert(field, value.trim().to_string());
        }
    }

    let mut lines = vec!["Current form summary".to_string(), String::new()];
    for field in CanonicalField::ALL {
        let always_shown = matches!(
            field,
            CanonicalField::HcpName
                | CanonicalField::InteractionType
                | CanonicalField::Date
                | CanonicalField::Time
        );
        match canonical.get(&field) {
            Some(value) => lines.push(format!("{}: {}", field.label(), preview(value))),
            None if always_shown => lines.push(format!("{}: Not specified", field.label())),
            None => {}
        }
    }

    let required_total = CanonicalField::REQUIRED.len();
    let required_filled = CanonicalField::REQUIRED
        .iter()
        .filter(|f| canonical.contains_key(f))
        .count();
    let completeness = required_filled * 100 / required_total;

    lines.push(String::new());
    lines.push(format!(
        "Required fields completed: {required_filled}/{required_total} ({completeness}%)"
    ));
    lines.push(format!(
        "Total fields filled: {}/{}",
        canonical.len(),
        CanonicalField::ALL.len()
    ));
    lines.push(
        if completeness >= 100 {
            "Form is ready for submission."
        } else if completeness >= 66 {
            "Form is mostly complete. Consider adding more details."
        } else {
            "Form needs more information before submission."
        }
        .to_string(),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_greetings_get_a_greeting() {
        assert_eq!(reply("hello"), "Hi! How are you doing today?");
        assert_eq!(reply("Good morning!"), "Good morning! Hope you're having a great day.");
    }

    #[test]
    fn greetings_inside_longer_text_do_not_match() {
        assert_eq!(
            reply("hi there, could you tell me about the weather in town"),
            FALLBACK_REPLY
        );
    }

    #[test]
    fn words_are_matched_whole() {
        // "this" contains "hi" but is not a greeting
        assert_eq!(reply("this"), FALLBACK_REPLY);
    }

    #[test]
    fn help_lists_commands() {
        assert!(reply("what can you do?").contains("-history for Dr. Smith"));
    }

    #[test]
    fn form_summary_reports_completeness() {
        let form = BTreeMap::from([
            ("hcpName".to_string(), "Dr. Smith".to_string()),
            ("hcpSentiment".to_string(), "good".to_string()),
            ("date".to_string(), " ".to_string()),
        ]);
        let summary = summarize_form(&form);
        assert!(summary.contains("HCP: Dr. Smith"));
        assert!(summary.contains("Sentiment: Positive"));
        assert!(summary.contains("Date: Not specified"));
        assert!(summary.contains("Required fields completed: 1/3 (33%)"));
        assert!(summary.contains("Total fields filled: 2/11"));
        assert!(summary.ends_with("Form needs more information before submission."));
    }

    #[test]
    fn complete_form_is_ready() {
        let form = BTreeMap::from([
            ("hcpName".to_string(), "Dr. Smith".to_string()),
            ("interactionType".to_string(), "Call".to_string()),
            ("date".to_string(), "2026-04-01".to_string()),
        ]);
        assert!(summarize_form(&form).ends_with("Form is ready for submission."));
    }
}
