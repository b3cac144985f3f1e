use std::sync::Arc;

use super::capabilities::{ClassifiedIntent, IntentClassifier, KeywordClassifier};
use super::commands::{RouteError, TASK_PREFIX, parse_command};
use super::{DEFAULT_INSIGHT_PERIOD_DAYS, ToolCall, ToolName};

/// How unprefixed input is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// Unprefixed input is conversation.
    Direct,
    /// Unprefixed input is classified and may reach any tool.
    Intelligent,
}

impl RouterMode {
    pub fn parse(raw: &str) -> Option<RouterMode> {
        match raw.trim().to_lowercase().as_str() {
            "direct" => Some(RouterMode::Direct),
            "intelligent" => Some(RouterMode::Intelligent),
            _ => None,
        }
    }
}

pub struct IntentRouter {
    mode: RouterMode,
    classifier: Arc<dyn IntentClassifier>,
    fallback: KeywordClassifier,
}

impl IntentRouter {
    pub fn new(mode: RouterMode, classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            mode,
            classifier,
            fallback: KeywordClassifier,
        }
    }

    pub async fn route(&self, input: &str) -> Result<ToolCall, RouteError> {
        let input = input.trim();
        if let Some(command) = input.strip_prefix(TASK_PREFIX) {
            return parse_command(command);
        }

        match self.mode {
            RouterMode::Direct => Ok(ToolCall::GeneralConversation {
                text: input.to_string(),
            }),
            RouterMode::Intelligent => {
                let intent = match self.classifier.classify(input).await {
                    Ok(intent) => intent,
                    Err(err) => {
                        tracing::warn!(error = %err, "Classification failed, using keyword fallback");
                        self.fallback.classify_text(input)
                    }
                };
                tool_call_from_intent(intent, input)
            }
        }
    }
}

/// Turn a classifier's answer into a typed call, checking required parameters.
pub fn tool_call_from_intent(intent: ClassifiedIntent, input: &str) -> Result<ToolCall, RouteError> {
    let tool = intent.tool;
    let required = |param: &'static str| {
        intent
            .param(param)
            .map(str::to_string)
            .ok_or(RouteError::MissingParameter { tool, param })
    };
    let text = || intent.param("text").unwrap_or(input).to_string();
    let instructions = || intent.param("instructions").unwrap_or(input).to_string();

    match tool {
        ToolName::LogInteraction => Ok(ToolCall::LogInteraction { text: text() }),
        ToolName::EditInteraction | ToolName::EditInteractionByName => {
            if let Some(id) = intent.param("id").and_then(|id| id.parse::<i64>().ok()) {
                return Ok(ToolCall::EditInteraction {
                    id,
                    instructions: instructions(),
                });
            }
            let hcp_name = required("hcpName").map_err(|_| RouteError::MissingParameter {
                tool: ToolName::EditInteractionByName,
                param: "hcpName",
            })?;
            Ok(ToolCall::EditInteractionByName {
                hcp_name,
                instructions: instructions(),
            })
        }
        ToolName::UpdateFormField => Ok(ToolCall::UpdateFormField {
            field: required("field")?,
            value: required("value")?,
        }),
        ToolName::GetInteractionHistory => Ok(ToolCall::GetInteractionHistory {
            hcp_name: required("hcpName")?,
        }),
        ToolName::GenerateSalesInsights => Ok(ToolCall::GenerateSalesInsights {
            hcp_name: intent.param("hcpName").map(str::to_string),
            period_days: intent
                .param("periodDays")
                .and_then(|days| days.parse::<u32>().ok())
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_INSIGHT_PERIOD_DAYS),
        }),
        ToolName::FormInformation => Ok(ToolCall::FormInformation),
        ToolName::GeneralConversation => Ok(ToolCall::GeneralConversation { text: text() }),
    }
}
