//! Pluggable model-backed capabilities and their deterministic stand-ins.
//!
//! Tools depend on these traits only. Production wires an LLM client wrapped
//! in [`Guarded`] (timeout plus one retry); tests wire fakes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use hcp_core::interactions::Interaction;
use regex::Regex;

use super::ToolName;

/// Loosely-typed extraction result: alias-level field name to raw value.
pub type Entities = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model transport error: {0}")]
    Transport(String),
    #[error("model returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("no model is configured")]
    NotConfigured,
}

impl CapabilityError {
    fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Timeout(_) | CapabilityError::Transport(_))
    }
}

/// A classifier's answer. `params` uses the engine's parameter names
/// (`text`, `hcpName`, `instructions`, `id`, `field`, `value`, `periodDays`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedIntent {
    pub tool: ToolName,
    pub params: BTreeMap<String, String>,
}

impl ClassifiedIntent {
    pub fn new(tool: ToolName) -> Self {
        Self {
            tool,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.params.insert(key.to_string(), value);
        }
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Entities, CapabilityError>;
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, CapabilityError>;
}

#[async_trait]
pub trait InsightSummarizer: Send + Sync {
    async fn summarize(
        &self,
        target: Option<&str>,
        period_days: u32,
        interactions: &[Interaction],
    ) -> Result<String, CapabilityError>;
}

/// Bounds every call with a timeout and retries once on transient failure.
pub struct Guarded<C> {
    inner: C,
    timeout: Duration,
}

impl<C> Guarded<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

const MAX_ATTEMPTS: u32 = 2;

async fn guarded<T, F, Fut>(
    capability: &'static str,
    timeout: Duration,
    mut call: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout(timeout)),
        };
        match result {
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(capability, attempt, error = %err, "Model call failed, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[async_trait]
impl<C: EntityExtractor> EntityExtractor for Guarded<C> {
    async fn extract(&self, text: &str) -> Result<Entities, CapabilityError> {
        guarded("extract", self.timeout, || self.inner.extract(text)).await
    }
}

#[async_trait]
impl<C: IntentClassifier> IntentClassifier for Guarded<C> {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, CapabilityError> {
        guarded("classify", self.timeout, || self.inner.classify(text)).await
    }
}

#[async_trait]
impl<C: InsightSummarizer> InsightSummarizer for Guarded<C> {
    async fn summarize(
        &self,
        target: Option<&str>,
        period_days: u32,
        interactions: &[Interaction],
    ) -> Result<String, CapabilityError> {
        guarded("summarize", self.timeout, || {
            self.inner.summarize(target, period_days, interactions)
        })
        .await
    }
}

static DOCTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bDr\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").expect("valid doctor regex")
});

/// First `Dr. Name` mention in free text, normalized to `Dr. Name`.
pub fn doctor_mentioned(text: &str) -> Option<String> {
    DOCTOR_RE
        .captures(text)
        .map(|caps| format!("Dr. {}", &caps[1]))
}

const LOG_PHRASES: &[&str] = &[
    "met with",
    "had a call",
    "had a meeting",
    "visited",
    "spoke with",
    "discussed with",
];
const EDIT_PHRASES: &[&str] = &["update", "edit", "change", "modify", "correct"];
const FORM_PHRASES: &[&str] = &["the form", "form status", "form summary", "check form"];
const HISTORY_PHRASES: &[&str] = &["history", "past interactions", "previous", "interactions with"];
const INSIGHT_PHRASES: &[&str] = &["analyze", "insights", "report", "analytics", "performance"];

/// Phrase-matching classifier. Deterministic and infallible; used when the
/// model classifier is unavailable or fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify_text(&self, text: &str) -> ClassifiedIntent {
        let lower = text.to_lowercase();
        let has = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));
        let doctor = doctor_mentioned(text).unwrap_or_default();

        if has(LOG_PHRASES) {
            ClassifiedIntent::new(ToolName::LogInteraction).with_param("text", text)
        } else if has(FORM_PHRASES) {
            ClassifiedIntent::new(ToolName::FormInformation)
        } else if has(EDIT_PHRASES) {
            ClassifiedIntent::new(ToolName::EditInteractionByName)
                .with_param("hcpName", doctor)
                .with_param("instructions", text)
        } else if has(HISTORY_PHRASES) {
            ClassifiedIntent::new(ToolName::GetInteractionHistory).with_param("hcpName", doctor)
        } else if has(INSIGHT_PHRASES) {
            ClassifiedIntent::new(ToolName::GenerateSalesInsights).with_param("hcpName", doctor)
        } else {
            ClassifiedIntent::new(ToolName::GeneralConversation).with_param("text", text)
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, CapabilityError> {
        Ok(self.classify_text(text))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> CapabilityError,
    }

    #[async_trait]
    impl EntityExtractor for Flaky {
        async fn extract(&self, _text: &str) -> Result<Entities, CapabilityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(Entities::from([("hcp_name".to_string(), "Dr. Lee".to_string())]))
        }
    }

    struct Slow;

    #[async_trait]
    impl EntityExtractor for Slow {
        async fn extract(&self, _text: &str) -> Result<Entities, CapabilityError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Entities::new())
        }
    }

    fn flaky(failures: u32, error: fn() -> CapabilityError) -> Guarded<Flaky> {
        Guarded::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures,
                error,
            },
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let guarded = flaky(1, || CapabilityError::Transport("reset".into()));
        let entities = guarded.extract("x").await.unwrap();
        assert_eq!(entities["hcp_name"], "Dr. Lee");
        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_failure_is_returned() {
        let guarded = flaky(2, || CapabilityError::Transport("reset".into()));
        assert!(matches!(
            guarded.extract("x").await,
            Err(CapabilityError::Transport(_))
        ));
        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let guarded = flaky(5, || CapabilityError::NotConfigured);
        assert!(matches!(
            guarded.extract("x").await,
            Err(CapabilityError::NotConfigured)
        ));
        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let guarded = Guarded::new(Slow, Duration::from_millis(20));
        assert!(matches!(
            guarded.extract("x").await,
            Err(CapabilityError::Timeout(_))
        ));
    }

    #[test]
    fn doctor_names_are_found_in_free_text() {
        assert_eq!(
            doctor_mentioned("Met Dr Sarah Mitchell at the clinic").as_deref(),
            Some("Dr. Sarah Mitchell")
        );
        assert_eq!(doctor_mentioned("met the nurse"), None);
    }

    #[test]
    fn keyword_classifier_picks_tools_by_phrase() {
        let classifier = KeywordClassifier;
        let log = classifier.classify_text("I met with Dr. Smith today");
        assert_eq!(log.tool, ToolName::LogInteraction);

        let history = classifier.classify_text("show previous visits with Dr. Smith");
        assert_eq!(history.tool, ToolName::GetInteractionHistory);
        assert_eq!(history.param("hcpName"), Some("Dr. Smith"));

        let edit = classifier.classify_text("please update Dr. Smith sentiment to positive");
        assert_eq!(edit.tool, ToolName::EditInteractionByName);

        let chat = classifier.classify_text("what is a CRM?");
        assert_eq!(chat.tool, ToolName::GeneralConversation);
    }
}
