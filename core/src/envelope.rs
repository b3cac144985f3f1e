//! The closed response protocol between the engine and its consumers.
//!
//! Four shapes exist and only four. On the wire they share one flat object,
//! tagged by `responseType` (absent for plain conversational replies):
//!
//! ```json
//! { "responseType": "FORM_POPULATE", "fieldUpdates": [{"field": "sentiment", "value": "good"}], "message": "..." }
//! { "responseType": "FORM_UPDATE", "field": "sentiment", "value": "Positive", "message": "..." }
//! { "responseType": "ERROR", "message": "..." }
//! { "message": "..." }
//! ```
//!
//! Field/value pairs travel at alias level. Canonicalization happens once,
//! when a `SyncSession` applies the envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ResponseType {
    #[serde(rename = "FORM_POPULATE")]
    FormPopulate,
    #[serde(rename = "FORM_UPDATE")]
    FormUpdate,
    #[serde(rename = "ERROR")]
    Error,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::FormPopulate => "FORM_POPULATE",
            ResponseType::FormUpdate => "FORM_UPDATE",
            ResponseType::Error => "ERROR",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FORM_POPULATE" => Some(ResponseType::FormPopulate),
            "FORM_UPDATE" => Some(ResponseType::FormUpdate),
            "ERROR" => Some(ResponseType::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldUpdate {
    pub field: String,
    pub value: String,
}

impl FieldUpdate {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ChatResponse", try_from = "ChatResponse")]
pub enum Envelope {
    FormPopulate {
        field_updates: Vec<FieldUpdate>,
        message: String,
    },
    FormUpdate {
        field: String,
        value: String,
        message: String,
    },
    Error {
        message: String,
    },
    Plain {
        message: String,
    },
}

impl Envelope {
    pub fn form_populate(field_updates: Vec<FieldUpdate>, message: impl Into<String>) -> Self {
        Envelope::FormPopulate {
            field_updates,
            message: message.into(),
        }
    }

    pub fn form_update(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Envelope::FormUpdate {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }

    pub fn plain(message: impl Into<String>) -> Self {
        Envelope::Plain {
            message: message.into(),
        }
    }

    pub fn response_type(&self) -> Option<ResponseType> {
        match self {
            Envelope::FormPopulate { .. } => Some(ResponseType::FormPopulate),
            Envelope::FormUpdate { .. } => Some(ResponseType::FormUpdate),
            Envelope::Error { .. } => Some(ResponseType::Error),
            Envelope::Plain { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Envelope::FormPopulate { message, .. }
            | Envelope::FormUpdate { message, .. }
            | Envelope::Error { message }
            | Envelope::Plain { message } => message,
        }
    }

    /// Field/value pairs this envelope asks the consumer to write.
    pub fn field_updates(&self) -> Vec<FieldUpdate> {
        match self {
            Envelope::FormPopulate { field_updates, .. } => field_updates.clone(),
            Envelope::FormUpdate { field, value, .. } => {
                vec![FieldUpdate::new(field.clone(), value.clone())]
            }
            Envelope::Error { .. } | Envelope::Plain { .. } => Vec::new(),
        }
    }
}

/// Flat wire form of an [`Envelope`], also the documented `/v1/chat` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default, alias = "response_type", skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(default, alias = "field_updates", skip_serializing_if = "Option::is_none")]
    pub field_updates: Option<Vec<FieldUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Envelope> for ChatResponse {
    fn from(envelope: Envelope) -> Self {
        let response_type = envelope.response_type().map(|t| t.as_str().to_string());
        match envelope {
            Envelope::FormPopulate {
                field_updates,
                message,
            } => ChatResponse {
                response_type,
                field_updates: Some(field_updates),
                message: Some(message),
                ..Default::default()
            },
            Envelope::FormUpdate {
                field,
                value,
                message,
            } => ChatResponse {
                response_type,
                field: Some(field),
                value: Some(value),
                message: Some(message),
                ..Default::default()
            },
            Envelope::Error { message } | Envelope::Plain { message } => ChatResponse {
                response_type,
                message: Some(message),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeShapeError {
    #[error("{response_type} envelope is missing `{missing}`")]
    MissingPart {
        response_type: &'static str,
        missing: &'static str,
    },
    #[error("envelope has neither a known responseType nor a message")]
    NoMessage,
}

impl TryFrom<ChatResponse> for Envelope {
    type Error = EnvelopeShapeError;

    fn try_from(wire: ChatResponse) -> Result<Self, EnvelopeShapeError> {
        let kind = wire.response_type.as_deref().and_then(ResponseType::parse);
        let message = wire.message.unwrap_or_default();

        match kind {
            Some(ResponseType::FormPopulate) => Ok(Envelope::FormPopulate {
                field_updates: wire.field_updates.ok_or(EnvelopeShapeError::MissingPart {
                    response_type: "FORM_POPULATE",
                    missing: "fieldUpdates",
                })?,
                message,
            }),
            Some(ResponseType::FormUpdate) => {
                let missing = |part| EnvelopeShapeError::MissingPart {
                    response_type: "FORM_UPDATE",
                    missing: part,
                };
                Ok(Envelope::FormUpdate {
                    field: wire.field.ok_or_else(|| missing("field"))?,
                    value: wire.value.ok_or_else(|| missing("value"))?,
                    message,
                })
            }
            Some(ResponseType::Error) => Ok(Envelope::Error { message }),
            // absent or unrecognized responseType: conversational
            None if !message.is_empty() => Ok(Envelope::Plain { message }),
            None => Err(EnvelopeShapeError::NoMessage),
        }
    }
}

/// Body of `POST /v1/chat`: the utterance plus the client's current form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, alias = "form_data")]
    pub form_data: BTreeMap<String, String>,
}

/// Read a transport payload that may or may not be a structured envelope.
///
/// Never fails: anything that does not decode into one of the four shapes is
/// surfaced as a plain envelope carrying the raw text.
pub fn parse_payload(raw: &str) -> Envelope {
    match serde_json::from_str::<Envelope>(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::debug!(error = %err, "Payload is not a structured envelope, treating as text");
            Envelope::plain(raw)
        }
    }
}
