//! Consumer-side synchronization: applies envelopes to a form and a message log.
//!
//! One `SyncSession` is one logging session. Requests go out one at a time and
//! carry a strictly increasing token; a response is applied only if its token
//! is the most recently issued one and has not been applied yet. Time is always
//! passed in, never read from the system clock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::envelope::{ChatRequest, Envelope, ResponseType, parse_payload};
use crate::fields::CanonicalField;
use crate::form::{FieldHighlight, FormState, ValidationError};
use crate::interactions::InteractionFields;

pub const DEFAULT_HIGHLIGHT_WINDOW_SECS: i64 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse { token: u64, issued_at: DateTime<Utc> },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("still waiting for the response to request {token}")]
    Busy { token: u64 },
    #[error("message is empty")]
    EmptyMessage,
}

/// A request the caller must send. The token identifies its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub token: u64,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub expired_fields: Vec<String>,
    pub timed_out: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub highlight_window: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            highlight_window: Duration::seconds(DEFAULT_HIGHLIGHT_WINDOW_SECS),
            request_timeout: Duration::seconds(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSession {
    config: SessionConfig,
    messages: Vec<ChatMessage>,
    form: FormState,
    state: SessionState,
    highest_issued: u64,
    highest_applied: u64,
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SyncSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
            form: FormState::new(),
            state: SessionState::Idle,
            highest_issued: 0,
            highest_applied: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::AwaitingResponse { .. })
    }

    /// Record the user's message and issue the next token.
    pub fn begin_request(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<PendingRequest, SessionError> {
        if let SessionState::AwaitingResponse { token, .. } = self.state {
            return Err(SessionError::Busy { token });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.highest_issued += 1;
        let token = self.highest_issued;
        self.messages.push(ChatMessage {
            role: Role::User,
            content: text.to_string(),
            timestamp: now,
            response_type: None,
            is_error: false,
        });
        self.state = SessionState::AwaitingResponse {
            token,
            issued_at: now,
        };

        Ok(PendingRequest {
            token,
            request: ChatRequest {
                message: text.to_string(),
                form_data: self.form.values().clone(),
            },
        })
    }

    /// Apply the response for `token`, or discard it if it is stale.
    pub fn receive(&mut self, token: u64, envelope: Envelope, now: DateTime<Utc>) -> ApplyOutcome {
        if token != self.highest_issued || token <= self.highest_applied {
            tracing::debug!(
                token,
                highest_issued = self.highest_issued,
                highest_applied = self.highest_applied,
                "Discarding stale response"
            );
            return ApplyOutcome::Stale;
        }

        let response_type = envelope.response_type();
        let (content, is_error) = match envelope {
            Envelope::FormPopulate { .. } | Envelope::FormUpdate { .. } => {
                let written: Vec<(String, String)> = envelope
                    .field_updates()
                    .iter()
                    .map(|u| {
                        self.form
                            .apply_update(&u.field, &u.value, now, self.config.highlight_window)
                    })
                    .collect();
                (describe_change(envelope.message(), &written), false)
            }
            Envelope::Error { message } => (message, true),
            Envelope::Plain { message } => (message, false),
        };

        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content,
            timestamp: now,
            response_type,
            is_error,
        });
        self.highest_applied = token;
        self.state = SessionState::Idle;
        ApplyOutcome::Applied
    }

    /// Like [`receive`](Self::receive) for a raw transport payload.
    pub fn receive_payload(&mut self, token: u64, raw: &str, now: DateTime<Utc>) -> ApplyOutcome {
        self.receive(token, parse_payload(raw), now)
    }

    /// Transport failure for `token`: surfaced as an error message.
    pub fn fail_request(
        &mut self,
        token: u64,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> ApplyOutcome {
        self.receive(token, Envelope::error(reason), now)
    }

    /// Advance virtual time: expire highlights and time out a pending request.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let expired_fields = self.form.expire_highlights(now);
        let mut timed_out = None;

        if let SessionState::AwaitingResponse { token, issued_at } = self.state {
            if now - issued_at >= self.config.request_timeout {
                tracing::warn!(token, "Chat request timed out");
                self.receive(
                    token,
                    Envelope::error("The request timed out. Please try again."),
                    now,
                );
                timed_out = Some(token);
            }
        }

        TickReport {
            expired_fields,
            timed_out,
        }
    }

    /// Direct user edit of a form field.
    pub fn apply_update(&mut self, field: &str, value: &str, now: DateTime<Utc>) -> (String, String) {
        self.form
            .apply_update(field, value, now, self.config.highlight_window)
    }

    pub fn field_state(&self, field: &str, now: DateTime<Utc>) -> FieldHighlight {
        self.form.highlight(field, now)
    }

    pub fn submission(&self, today: NaiveDate) -> Result<InteractionFields, ValidationError> {
        self.form.submission(today)
    }

    /// Start a new record after a successful submission.
    pub fn reset_form(&mut self) {
        self.form.clear();
    }
}

fn describe_change(message: &str, written: &[(String, String)]) -> String {
    if !message.trim().is_empty() {
        return message.to_string();
    }
    let parts: Vec<String> = written
        .iter()
        .map(|(field, value)| {
            let label = CanonicalField::from_alias(field)
                .map(|f| f.label().to_string())
                .unwrap_or_else(|| field.clone());
            format!("{label} = {value}")
        })
        .collect();
    format!("Updated {}.", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::envelope::FieldUpdate;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn populate_normalizes_and_highlights_until_window_elapses() {
        let mut session = SyncSession::default();
        let pending = session.begin_request("-log met Dr. Lee", t(0)).unwrap();

        let envelope = Envelope::form_populate(vec![FieldUpdate::new("sentiment", "good")], "ok");
        assert_eq!(session.receive(pending.token, envelope, t(1)), ApplyOutcome::Applied);

        assert_eq!(session.form().value(CanonicalField::Sentiment), Some("Positive"));
        assert!(session.field_state("sentiment", t(3)).is_highlighted(t(3)));
        assert_eq!(session.field_state("sentiment", t(4)), FieldHighlight::Idle);
        assert_eq!(session.state(), SessionState::Idle);

        let last = session.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "ok");
        assert_eq!(last.response_type, Some(ResponseType::FormPopulate));
    }

    #[test]
    fn stale_tokens_are_discarded() {
        let mut session = SyncSession::default();
        let first = session.begin_request("one", t(0)).unwrap();
        session.tick(t(31));
        let second = session.begin_request("two", t(32)).unwrap();

        let late = Envelope::form_update("sentiment", "bad", "late");
        assert_eq!(session.receive(first.token, late, t(33)), ApplyOutcome::Stale);
        assert_eq!(session.form().value(CanonicalField::Sentiment), None);

        let fresh = Envelope::form_update("sentiment", "good", "fresh");
        assert_eq!(session.receive(second.token, fresh.clone(), t(34)), ApplyOutcome::Applied);
        assert_eq!(session.receive(second.token, fresh, t(35)), ApplyOutcome::Stale);
        assert_eq!(session.form().value(CanonicalField::Sentiment), Some("Positive"));
    }

    #[test]
    fn input_is_rejected_while_awaiting() {
        let mut session = SyncSession::default();
        let pending = session.begin_request("hello", t(0)).unwrap();
        assert_eq!(
            session.begin_request("again", t(1)),
            Err(SessionError::Busy {
                token: pending.token
            })
        );
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut session = SyncSession::default();
        assert_eq!(session.begin_request("   ", t(0)), Err(SessionError::EmptyMessage));
        assert!(!session.is_busy());
    }

    #[test]
    fn malformed_payload_becomes_plain_message() {
        let mut session = SyncSession::default();
        let pending = session.begin_request("hi", t(0)).unwrap();
        session.apply_update("name", "Dr. Kim", t(0));

        let outcome = session.receive_payload(pending.token, "{not json", t(1));
        assert_eq!(outcome, ApplyOutcome::Applied);

        let last = session.messages().last().unwrap();
        assert_eq!(last.content, "{not json");
        assert!(!last.is_error);
        assert_eq!(session.form().value(CanonicalField::HcpName), Some("Dr. Kim"));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn error_envelope_leaves_form_untouched() {
        let mut session = SyncSession::default();
        session.apply_update("type", "call", t(0));
        let pending = session.begin_request("-bogus", t(0)).unwrap();

        session.receive(pending.token, Envelope::error("Unknown command 'bogus'"), t(1));

        let last = session.messages().last().unwrap();
        assert!(last.is_error);
        assert_eq!(session.form().values().len(), 1);
        assert_eq!(session.form().value(CanonicalField::InteractionType), Some("Call"));
    }

    #[test]
    fn timeout_synthesizes_error_and_returns_to_idle() {
        let mut session = SyncSession::default();
        let pending = session.begin_request("slow", t(0)).unwrap();

        assert_eq!(session.tick(t(29)).timed_out, None);
        assert!(session.is_busy());

        let report = session.tick(t(30));
        assert_eq!(report.timed_out, Some(pending.token));
        assert!(!session.is_busy());
        assert!(session.messages().last().unwrap().is_error);
    }

    #[test]
    fn request_carries_current_form_data() {
        let mut session = SyncSession::default();
        session.apply_update("hcp", "Dr. Patel", t(0));
        let pending = session.begin_request("-form", t(1)).unwrap();
        assert_eq!(
            pending.request.form_data.get("hcpName").map(String::as_str),
            Some("Dr. Patel")
        );
    }

    #[test]
    fn populate_without_message_describes_the_change() {
        let mut session = SyncSession::default();
        let pending = session.begin_request("x", t(0)).unwrap();
        let envelope = Envelope::form_populate(vec![FieldUpdate::new("type", "visit")], "");
        session.receive(pending.token, envelope, t(1));
        assert_eq!(
            session.messages().last().unwrap().content,
            "Updated Interaction type = Visit."
        );
    }
}
