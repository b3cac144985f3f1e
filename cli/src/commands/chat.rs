//! Chat against `/v1/chat`, keeping a local form in sync with the envelopes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hcp_core::fields::CanonicalField;
use hcp_core::form::FieldHighlight;
use hcp_core::session::{ApplyOutcome, Role, SessionConfig, SessionError, SyncSession};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::util::{client, endpoint, exit_error, parse_field_pairs};

const REPL_HELP: &str = "\
Type a message to chat, or start it with '-' to run a task (-help lists them).
Local commands:
  :form              show the form
  :set <field>=<v>   edit a form field
  :submit            validate and save the form as a new interaction
  :clear             empty the form
  :quit              leave";

pub struct ChatClient {
    api_url: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        Self {
            api_url: api_url.to_string(),
            timeout,
        }
    }

    /// One request/response round trip applied to `session`.
    pub async fn exchange(
        &self,
        session: &mut SyncSession,
        text: &str,
    ) -> Result<ApplyOutcome, SessionError> {
        let pending = session.begin_request(text, Utc::now())?;
        let url = match endpoint(&self.api_url, &["v1", "chat"]) {
            Ok(url) => url,
            Err(message) => return Ok(session.fail_request(pending.token, message, Utc::now())),
        };

        let sent = client().post(url).json(&pending.request).send();
        let outcome = match tokio::time::timeout(self.timeout, async {
            let resp = sent.await?;
            let status = resp.status();
            resp.text().await.map(|body| (status, body))
        })
        .await
        {
            Ok(Ok((status, body))) if status.is_success() => {
                session.receive_payload(pending.token, &body, Utc::now())
            }
            Ok(Ok((_, body))) => {
                session.fail_request(pending.token, api_error_message(&body), Utc::now())
            }
            Ok(Err(e)) => session.fail_request(
                pending.token,
                format!("Could not reach the API: {e}"),
                Utc::now(),
            ),
            Err(_) => {
                let report = session.tick(Utc::now());
                match report.timed_out {
                    Some(_) => ApplyOutcome::Applied,
                    None => session.fail_request(
                        pending.token,
                        "The request timed out. Please try again.",
                        Utc::now(),
                    ),
                }
            }
        };
        Ok(outcome)
    }
}

/// Message of an `ApiError` body, or the raw body when it is not one.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Form as text. Fields written in the last few seconds are starred.
pub fn render_form(session: &SyncSession, now: DateTime<Utc>) -> String {
    let form = session.form();
    let mut lines = Vec::new();
    for field in CanonicalField::ALL {
        let key = field.as_str();
        let marker = match session.field_state(key, now) {
            FieldHighlight::RecentlyUpdated { .. } => "*",
            FieldHighlight::Idle => " ",
        };
        let required = if CanonicalField::REQUIRED.contains(&field) { " (required)" } else { "" };
        lines.push(format!(
            "{marker} {:<20} {}{required}",
            field.label(),
            form.get(key).unwrap_or("")
        ));
    }
    for (key, value) in form.values() {
        if CanonicalField::from_alias(key).is_none() {
            lines.push(format!("  {key:<20} {value}"));
        }
    }
    lines.join("\n")
}

fn last_reply(session: &SyncSession) -> Option<String> {
    session
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| {
            if m.is_error {
                format!("[error] {}", m.content)
            } else {
                m.content.clone()
            }
        })
}

async fn submit_form(api_url: &str, session: &mut SyncSession) {
    let record = match session.submission(Utc::now().date_naive()) {
        Ok(record) => record,
        Err(err) => {
            println!("Cannot submit yet: {err}");
            return;
        }
    };
    let url = match endpoint(api_url, &["v1", "interactions"]) {
        Ok(url) => url,
        Err(message) => {
            println!("{message}");
            return;
        }
    };

    match client().post(url).json(&record).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!("Saved interaction {}.", body["id"]);
            session.reset_form();
        }
        Ok(resp) => {
            let body = resp.text().await.unwrap_or_default();
            println!("Save failed: {}", api_error_message(&body));
        }
        Err(e) => println!("Could not reach the API: {e}"),
    }
}

/// Interactive loop. Returns the process exit code.
pub async fn repl(api_url: &str, timeout: Duration) -> i32 {
    let chat = ChatClient::new(api_url, timeout);
    let mut session = SyncSession::new(SessionConfig {
        request_timeout: chrono::Duration::from_std(timeout)
            .unwrap_or_else(|_| SessionConfig::default().request_timeout),
        ..SessionConfig::default()
    });

    println!("{REPL_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        session.tick(Utc::now());
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return 0,
            Err(e) => {
                eprintln!("Failed to read input: {e}");
                return 4;
            }
        };
        let line = line.trim();

        match line {
            "" => continue,
            ":quit" | ":q" => return 0,
            ":form" => println!("{}", render_form(&session, Utc::now())),
            ":clear" => {
                session.reset_form();
                println!("Form cleared.");
            }
            ":submit" => submit_form(api_url, &mut session).await,
            _ if line.starts_with(":set ") => {
                match parse_field_pairs(&[line[":set ".len()..].to_string()]) {
                    Ok(pairs) => {
                        for (field, value) in pairs {
                            session.apply_update(&field, &value, Utc::now());
                        }
                        println!("{}", render_form(&session, Utc::now()));
                    }
                    Err(message) => println!("{message}"),
                }
            }
            _ if line.starts_with(':') => println!("{REPL_HELP}"),
            _ => {
                let before = session.form().values().clone();
                match chat.exchange(&mut session, line).await {
                    Ok(_) => {
                        if let Some(reply) = last_reply(&session) {
                            println!("{reply}");
                        }
                        if session.form().values() != &before {
                            println!("{}", render_form(&session, Utc::now()));
                        }
                    }
                    Err(err) => println!("{err}"),
                }
            }
        }
    }
}

/// Single message, optionally with a pre-filled form. Prints reply and form as JSON.
pub async fn send(api_url: &str, timeout: Duration, message: &str, fields: &[String]) -> i32 {
    let pairs = parse_field_pairs(fields).unwrap_or_else(|e| exit_error(&e, None));
    let mut session = SyncSession::default();
    for (field, value) in &pairs {
        session.apply_update(field, value, Utc::now());
    }

    let chat = ChatClient::new(api_url, timeout);
    if let Err(err) = chat.exchange(&mut session, message).await {
        exit_error(&err.to_string(), None);
    }

    let reply = session.messages().last();
    let is_error = reply.is_some_and(|m| m.is_error);
    let output = json!({
        "responseType": reply.and_then(|m| m.response_type).map(|t| t.as_str()),
        "message": reply.map(|m| m.content.as_str()),
        "form": session.form().values(),
    });
    let formatted = serde_json::to_string_pretty(&output).unwrap_or_default();
    if is_error {
        eprintln!("{formatted}");
        1
    } else {
        println!("{formatted}");
        0
    }
}

#[cfg(test)]
mod tests {
    use hcp_core::envelope::{Envelope, FieldUpdate};

    use super::*;

    #[test]
    fn api_error_body_yields_its_message() {
        let body = r#"{"error":"rate_limited","message":"Too many requests.","request_id":"x"}"#;
        assert_eq!(api_error_message(body), "Too many requests.");
        assert_eq!(api_error_message("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn rendered_form_stars_recent_updates() {
        let now = Utc::now();
        let mut session = SyncSession::default();
        let pending = session.begin_request("-put mood as good", now).unwrap();
        session.receive(
            pending.token,
            Envelope::form_populate(vec![FieldUpdate::new("mood", "good")], "ok"),
            now,
        );

        let fresh = render_form(&session, now);
        assert!(fresh.lines().any(|l| l.starts_with('*') && l.contains("Positive")));

        let later = render_form(&session, now + chrono::Duration::seconds(10));
        assert!(!later.lines().any(|l| l.starts_with('*')));
        assert!(later.contains("Positive"));
    }

    #[test]
    fn error_replies_are_tagged() {
        let now = Utc::now();
        let mut session = SyncSession::default();
        let pending = session.begin_request("-dance", now).unwrap();
        session.receive(pending.token, Envelope::error("Unknown command 'dance'."), now);
        assert_eq!(
            last_reply(&session).as_deref(),
            Some("[error] Unknown command 'dance'.")
        );
    }
}
