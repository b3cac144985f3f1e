use chrono::Utc;
use clap::Subcommand;
use hcp_core::form::FormState;
use serde_json::json;

use crate::util::{api_request, exit_error, parse_field_pairs};

#[derive(Subcommand)]
pub enum InteractionCommands {
    /// Save a new interaction from form fields (validated before sending)
    Submit {
        /// Form field as key=value; aliases such as mood=good are accepted (repeatable)
        #[arg(long = "field", short = 'f', required = true)]
        fields: Vec<String>,
    },
    /// Change fields of a stored interaction
    Update {
        /// Interaction id
        id: i64,
        /// Field to change as key=value (repeatable)
        #[arg(long = "field", short = 'f', required = true)]
        fields: Vec<String>,
    },
    /// List interactions for an HCP, most recent first
    History {
        /// Full or partial HCP name
        name: String,
    },
}

pub async fn run(api_url: &str, command: InteractionCommands) -> i32 {
    match command {
        InteractionCommands::Submit { fields } => submit(api_url, &fields).await,
        InteractionCommands::Update { id, fields } => update(api_url, id, &fields).await,
        InteractionCommands::History { name } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &["v1", "interactions", "hcp", &name],
                None,
            )
            .await
        }
    }
}

/// Build the create payload locally. Missing required fields never reach the API.
fn submission_payload(fields: &[String]) -> Result<serde_json::Value, String> {
    let now = Utc::now();
    let mut form = FormState::new();
    for (field, value) in parse_field_pairs(fields)? {
        form.apply_update(&field, &value, now, chrono::Duration::zero());
    }
    let record = form
        .submission(now.date_naive())
        .map_err(|e| e.to_string())?;
    serde_json::to_value(record).map_err(|e| e.to_string())
}

async fn submit(api_url: &str, fields: &[String]) -> i32 {
    let payload = submission_payload(fields).unwrap_or_else(|e| {
        exit_error(&e, Some("hcpName, interactionType and date are required."))
    });
    api_request(
        api_url,
        reqwest::Method::POST,
        &["v1", "interactions"],
        Some(payload),
    )
    .await
}

async fn update(api_url: &str, id: i64, fields: &[String]) -> i32 {
    let pairs = parse_field_pairs(fields).unwrap_or_else(|e| exit_error(&e, None));
    let body: serde_json::Map<String, serde_json::Value> =
        pairs.into_iter().map(|(k, v)| (k, json!(v))).collect();
    let id = id.to_string();
    api_request(
        api_url,
        reqwest::Method::PUT,
        &["v1", "interactions", &id],
        Some(serde_json::Value::Object(body)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_canonical_names() {
        let payload = submission_payload(&[
            "name=Dr. Lee".into(),
            "type=phone".into(),
            "date=2026-02-03".into(),
            "mood=concerned".into(),
        ])
        .unwrap();
        assert_eq!(
            payload,
            json!({
                "hcpName": "Dr. Lee",
                "interactionType": "Call",
                "date": "2026-02-03",
                "sentiment": "Negative"
            })
        );
    }

    #[test]
    fn missing_required_fields_fail_locally() {
        let err = submission_payload(&["hcpName=Dr. Lee".into()]).unwrap_err();
        assert!(err.contains("interactionType"));
        assert!(err.contains("date"));
    }
}
