//! Intent routing and tool execution.
//!
//! `Engine::handle` is the only entry point: one chat request in, exactly one
//! envelope out. Every failure below this point becomes an ERROR envelope.

use std::fmt;

use hcp_core::envelope::{ChatRequest, Envelope};
use serde::{Deserialize, Serialize};

pub mod capabilities;
pub mod commands;
pub mod conversation;
pub mod llm;
pub mod router;
pub mod tools;

use router::IntentRouter;
use tools::ToolSet;

/// Default insight window when none is given.
pub const DEFAULT_INSIGHT_PERIOD_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    LogInteraction,
    EditInteraction,
    EditInteractionByName,
    UpdateFormField,
    GetInteractionHistory,
    GenerateSalesInsights,
    FormInformation,
    GeneralConversation,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::LogInteraction,
        ToolName::EditInteraction,
        ToolName::EditInteractionByName,
        ToolName::UpdateFormField,
        ToolName::GetInteractionHistory,
        ToolName::GenerateSalesInsights,
        ToolName::FormInformation,
        ToolName::GeneralConversation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::LogInteraction => "log_interaction",
            ToolName::EditInteraction => "edit_interaction",
            ToolName::EditInteractionByName => "edit_interaction_by_name",
            ToolName::UpdateFormField => "update_form_field",
            ToolName::GetInteractionHistory => "get_interaction_history",
            ToolName::GenerateSalesInsights => "generate_sales_insights",
            ToolName::FormInformation => "form_information",
            ToolName::GeneralConversation => "general_conversation",
        }
    }

    /// Lenient lookup for names coming back from a model.
    pub fn parse(raw: &str) -> Option<ToolName> {
        let lowered = raw.trim().to_lowercase();
        let key = lowered.strip_suffix("_tool").unwrap_or(lowered.as_str());
        ToolName::ALL.into_iter().find(|t| t.as_str() == key)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-parameterized tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    LogInteraction {
        text: String,
    },
    EditInteraction {
        id: i64,
        instructions: String,
    },
    EditInteractionByName {
        hcp_name: String,
        instructions: String,
    },
    UpdateFormField {
        field: String,
        value: String,
    },
    GetInteractionHistory {
        hcp_name: String,
    },
    GenerateSalesInsights {
        hcp_name: Option<String>,
        period_days: u32,
    },
    FormInformation,
    Help,
    GeneralConversation {
        text: String,
    },
}

impl ToolCall {
    pub fn tool_name(&self) -> ToolName {
        match self {
            ToolCall::LogInteraction { .. } => ToolName::LogInteraction,
            ToolCall::EditInteraction { .. } => ToolName::EditInteraction,
            ToolCall::EditInteractionByName { .. } => ToolName::EditInteractionByName,
            ToolCall::UpdateFormField { .. } => ToolName::UpdateFormField,
            ToolCall::GetInteractionHistory { .. } => ToolName::GetInteractionHistory,
            ToolCall::GenerateSalesInsights { .. } => ToolName::GenerateSalesInsights,
            ToolCall::FormInformation => ToolName::FormInformation,
            ToolCall::Help | ToolCall::GeneralConversation { .. } => ToolName::GeneralConversation,
        }
    }
}

pub struct Engine {
    router: IntentRouter,
    tools: ToolSet,
}

impl Engine {
    pub fn new(router: IntentRouter, tools: ToolSet) -> Self {
        Self { router, tools }
    }

    pub async fn handle(&self, request: &ChatRequest) -> Envelope {
        let call = match self.router.route(&request.message).await {
            Ok(call) => call,
            Err(err) => {
                tracing::info!(error = %err, "Chat message could not be routed");
                return Envelope::error(err.to_string());
            }
        };

        let tool = call.tool_name();
        tracing::info!(%tool, "Routed chat message");

        match self.tools.execute(call, &request.form_data).await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(%tool, error = %err, "Tool failed");
                Envelope::error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use hcp_core::envelope::ResponseType;
    use hcp_core::interactions::Interaction;

    use super::capabilities::{
        CapabilityError, Entities, EntityExtractor, InsightSummarizer, KeywordClassifier,
    };
    use super::router::RouterMode;
    use super::*;
    use crate::store::MemoryInteractionStore;

    struct Offline;

    #[async_trait]
    impl EntityExtractor for Offline {
        async fn extract(&self, _text: &str) -> Result<Entities, CapabilityError> {
            Err(CapabilityError::NotConfigured)
        }
    }

    #[async_trait]
    impl InsightSummarizer for Offline {
        async fn summarize(
            &self,
            _target: Option<&str>,
            _period_days: u32,
            _interactions: &[Interaction],
        ) -> Result<String, CapabilityError> {
            Err(CapabilityError::NotConfigured)
        }
    }

    fn engine(mode: RouterMode) -> Engine {
        Engine::new(
            IntentRouter::new(mode, Arc::new(KeywordClassifier)),
            ToolSet::new(
                Arc::new(MemoryInteractionStore::new()),
                Arc::new(Offline),
                Arc::new(Offline),
                chrono::Utc::now,
            ),
        )
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            form_data: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn failures_become_error_envelopes() {
        let engine = engine(RouterMode::Direct);
        for message in [
            "-edit interaction 5 change sentiment to good",
            "-histroy for Dr. Smith",
            "-put sentiment",
        ] {
            let envelope = engine.handle(&request(message)).await;
            assert_eq!(envelope.response_type(), Some(ResponseType::Error), "{message}");
        }
    }

    #[tokio::test]
    async fn logged_interaction_is_editable_by_name() {
        let engine = engine(RouterMode::Direct);
        let logged = engine
            .handle(&request("-log Met Dr. Alvarez about dosing"))
            .await;
        assert_eq!(logged.response_type(), Some(ResponseType::FormPopulate));

        let edited = engine
            .handle(&request(
                "-edit interaction with Dr. Alvarez change sentiment to good",
            ))
            .await;
        assert_eq!(edited.response_type(), None);
        assert!(edited.message().contains("Sentiment to Positive"));

        let history = engine.handle(&request("-history for Dr. Alvarez")).await;
        assert!(history.message().contains("| Positive |"));

        let rejected = engine
            .handle(&request("-edit interaction 1 change date to next tuesday"))
            .await;
        assert_eq!(rejected.response_type(), Some(ResponseType::Error));
        assert!(rejected.message().contains("next tuesday"));
    }

    #[tokio::test]
    async fn intelligent_mode_routes_unprefixed_text() {
        let engine = engine(RouterMode::Intelligent);
        let envelope = engine
            .handle(&request("I met with Dr. Kim this morning"))
            .await;
        assert_eq!(envelope.response_type(), Some(ResponseType::FormPopulate));
    }

    #[test]
    fn tool_names_parse_leniently() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(
            ToolName::parse(" Form_Information_Tool "),
            Some(ToolName::FormInformation)
        );
        assert_eq!(ToolName::parse("delete_everything"), None);
    }

    #[test]
    fn serde_names_match_as_str() {
        for tool in ToolName::ALL {
            assert_eq!(
                serde_json::to_value(tool).unwrap(),
                serde_json::Value::String(tool.as_str().to_string())
            );
        }
    }
}
