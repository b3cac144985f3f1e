//! OpenAI-compatible chat-completions client backing the model capabilities.

use async_trait::async_trait;
use hcp_core::interactions::Interaction;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::ToolName;
use super::capabilities::{
    CapabilityError, ClassifiedIntent, Entities, EntityExtractor, InsightSummarizer,
    IntentClassifier, doctor_mentioned,
};
use crate::config::LlmConfig;

const TEMPERATURE: f64 = 0.1;
/// Longest slice of user text placed into a prompt.
const MAX_PROMPT_TEXT: usize = 1000;

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, url::ParseError> {
        let base = config.base_url.as_str().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/chat/completions"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one user message and return the first choice's content.
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CapabilityError::NotConfigured)?;

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&json!({
                "model": &self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": TEMPERATURE,
            }))
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            let message = format!("{status}: {snippet}");
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                CapabilityError::Transport(message)
            } else {
                CapabilityError::InvalidResponse(message)
            });
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct CompletionResponse {
            choices: Vec<Choice>,
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CapabilityError::InvalidResponse("no choices returned".into()))
    }

    async fn complete_json(&self, prompt: &str) -> Result<Value, CapabilityError> {
        let content = self.complete(prompt).await?;
        let object = extract_json_object(&content).ok_or_else(|| {
            CapabilityError::InvalidResponse("response contains no JSON object".into())
        })?;
        serde_json::from_str(object).map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
    }
}

/// Strip markdown code fences and return the outermost `{...}` span.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn clip(text: &str) -> String {
    text.chars().take(MAX_PROMPT_TEXT).collect()
}

/// Render a JSON value as plain text; lists are comma-joined.
fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(as_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn extraction_prompt(text: &str) -> String {
    format!(
        r#"Analyze this sales interaction text and extract information. Return ONLY a valid JSON object.

Text: "{text}"

{{
    "hcp_name": "Primary HCP name (e.g., Dr. Sarah Mitchell)",
    "interaction_type": "Meeting, Call, Email, Visit, or Conference",
    "interaction_date": "the date as written, e.g. today, yesterday, 2024-05-01",
    "interaction_time": "complete time expression, e.g. 'morning at 9:15', '4:10 PM', 'evening around 6', 'noon'",
    "attendees": "Other attendees mentioned",
    "summary": "Brief 1-2 sentence summary of key outcomes",
    "key_discussion_points": "Main topics discussed",
    "materials_shared": "Materials provided",
    "samples_distributed": "Samples given",
    "sentiment": "Positive, Neutral, or Negative",
    "follow_up_actions": "Next steps mentioned"
}}

Leave a key out if the text does not mention it. Return only the JSON object, no explanations."#,
        text = clip(text)
    )
}

fn classification_prompt(text: &str) -> String {
    format!(
        r#"You help healthcare sales representatives manage interactions with Healthcare Professionals (HCPs).
Decide which tool should handle this message.

MESSAGE: "{text}"

TOOLS:
- log_interaction: the user describes a NEW interaction ("I met with Dr. Smith today")
- edit_interaction: the user wants to change an existing interaction ("change the sentiment for Dr. Smith to positive")
- get_interaction_history: the user wants past interactions with an HCP ("show interactions with Dr. Smith")
- generate_sales_insights: the user wants analysis or reports ("analyze my last 30 days")
- form_information: the user wants to review the current form ("what's in the form?")
- general_conversation: general questions or casual conversation

Return only JSON:
{{
    "selected_tool": "one of the tool names above",
    "extracted_entities": {{
        "hcp_name": "HCP name if mentioned",
        "interaction_id": "numeric interaction id if mentioned",
        "period_days": "number of days if an analysis window is mentioned",
        "specific_requests": "the requested modification, if any"
    }}
}}"#,
        text = clip(text)
    )
}

fn insights_prompt(target: Option<&str>, period_days: u32, interactions: &[Interaction]) -> String {
    let data: Vec<Value> = interactions
        .iter()
        .map(|i| {
            json!({
                "hcp_name": i.fields.hcp_name,
                "date": i.fields.interaction_date.to_string(),
                "type": i.fields.interaction_type,
                "summary": i.fields.outcomes,
                "sentiment": i.fields.sentiment,
            })
        })
        .collect();
    let data = serde_json::to_string_pretty(&data).unwrap_or_default();

    format!(
        r#"Analyze the following sales interaction data and provide strategic insights.

Target: {target}
Period: Last {period_days} days
Total Interactions: {count}

Interaction Data:
{data}

Respond in JSON with these fields:
- engagement_summary: overall engagement assessment
- sentiment_analysis: breakdown of positive/neutral/negative interactions
- top_opportunities: list of high-potential HCPs or opportunities
- relationship_trends: key trends in HCP relationships
- strategic_recommendations: list of specific actionable recommendations
- success_metrics: key performance indicators

Return only valid JSON."#,
        target = target.unwrap_or("Overall Sales Pipeline"),
        count = interactions.len(),
    )
}

#[async_trait]
impl EntityExtractor for LlmClient {
    async fn extract(&self, text: &str) -> Result<Entities, CapabilityError> {
        let value = self.complete_json(&extraction_prompt(text)).await?;
        let Value::Object(map) = value else {
            return Err(CapabilityError::InvalidResponse(
                "extraction result is not an object".into(),
            ));
        };

        let mut entities: Entities = map
            .iter()
            .filter_map(|(key, value)| as_text(value).map(|text| (key.clone(), text)))
            .collect();
        if !entities.contains_key("hcp_name") {
            if let Some(name) = doctor_mentioned(text) {
                entities.insert("hcp_name".to_string(), name);
            }
        }
        Ok(entities)
    }
}

#[async_trait]
impl IntentClassifier for LlmClient {
    async fn classify(&self, text: &str) -> Result<ClassifiedIntent, CapabilityError> {
        #[derive(Deserialize, Default)]
        struct Extracted {
            hcp_name: Option<Value>,
            interaction_id: Option<Value>,
            period_days: Option<Value>,
            specific_requests: Option<Value>,
        }
        #[derive(Deserialize)]
        struct Classification {
            selected_tool: String,
            #[serde(default)]
            extracted_entities: Extracted,
        }

        let value = self.complete_json(&classification_prompt(text)).await?;
        let parsed: Classification = serde_json::from_value(value)
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;
        let tool = ToolName::parse(&parsed.selected_tool).ok_or_else(|| {
            CapabilityError::InvalidResponse(format!("unknown tool '{}'", parsed.selected_tool))
        })?;

        let entities = parsed.extracted_entities;
        let field = |v: &Option<Value>| v.as_ref().and_then(as_text).unwrap_or_default();
        let instructions = entities
            .specific_requests
            .as_ref()
            .and_then(as_text)
            .unwrap_or_else(|| text.to_string());

        Ok(ClassifiedIntent::new(tool)
            .with_param("text", text)
            .with_param("hcpName", field(&entities.hcp_name))
            .with_param("id", field(&entities.interaction_id))
            .with_param("periodDays", field(&entities.period_days))
            .with_param("instructions", instructions))
    }
}

#[async_trait]
impl InsightSummarizer for LlmClient {
    async fn summarize(
        &self,
        target: Option<&str>,
        period_days: u32,
        interactions: &[Interaction],
    ) -> Result<String, CapabilityError> {
        let value = self
            .complete_json(&insights_prompt(target, period_days, interactions))
            .await?;
        Ok(format_insights(target, period_days, &value))
    }
}

fn format_insights(target: Option<&str>, period_days: u32, insights: &Value) -> String {
    let text = |key: &str| {
        insights
            .get(key)
            .and_then(as_text)
            .unwrap_or_else(|| "N/A".to_string())
    };
    let numbered = |key: &str| -> String {
        match insights.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(as_text)
                .enumerate()
                .map(|(i, item)| format!("  {}. {item}\n", i + 1))
                .collect(),
            other => format!("  {}\n", other.and_then(as_text).unwrap_or_else(|| "N/A".into())),
        }
    };

    format!(
        "Sales Insights - {target} (last {period_days} days)\n\n\
         Engagement summary: {engagement}\n\n\
         Sentiment analysis: {sentiment}\n\n\
         Top opportunities:\n{opportunities}\n\
         Relationship trends: {trends}\n\n\
         Strategic recommendations:\n{recommendations}\n\
         Success metrics: {metrics}",
        target = target.unwrap_or("Sales Pipeline"),
        engagement = text("engagement_summary"),
        sentiment = text("sentiment_analysis"),
        opportunities = numbered("top_opportunities"),
        trends = text("relationship_trends"),
        recommendations = numbered("strategic_recommendations"),
        metrics = text("success_metrics"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_pulled_out_of_code_fences() {
        let content = "```json\n{\"hcp_name\": \"Dr. Lee\"}\n```";
        assert_eq!(extract_json_object(content), Some("{\"hcp_name\": \"Dr. Lee\"}"));

        let chatty = "Sure! Here it is: {\"a\": {\"b\": 1}} Hope that helps.";
        assert_eq!(extract_json_object(chatty), Some("{\"a\": {\"b\": 1}}"));

        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn json_values_render_as_text() {
        assert_eq!(as_text(&json!("  x ")), Some("x".into()));
        assert_eq!(as_text(&json!(["a", "b"])), Some("a, b".into()));
        assert_eq!(as_text(&json!(3)), Some("3".into()));
        assert_eq!(as_text(&json!("")), None);
        assert_eq!(as_text(&Value::Null), None);
    }

    #[test]
    fn insights_are_formatted_with_numbered_lists() {
        let value = json!({
            "engagement_summary": "Steady",
            "top_opportunities": ["Dr. Lee", "Dr. Kim"],
            "strategic_recommendations": "Follow up monthly"
        });
        let text = format_insights(Some("Dr. Lee"), 30, &value);
        assert!(text.starts_with("Sales Insights - Dr. Lee (last 30 days)"));
        assert!(text.contains("  1. Dr. Lee\n  2. Dr. Kim\n"));
        assert!(text.contains("  Follow up monthly\n"));
        assert!(text.contains("Success metrics: N/A"));
    }

    #[tokio::test]
    async fn unconfigured_client_reports_not_configured() {
        let config = LlmConfig {
            api_key: None,
            base_url: Url::parse("https://api.groq.com/openai/v1").unwrap(),
            model: "test-model".into(),
            timeout: std::time::Duration::from_secs(1),
        };
        let client = LlmClient::new(&config).unwrap();
        assert!(!client.is_configured());
        assert_eq!(
            client.endpoint.as_str(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert!(matches!(
            client.extract("met Dr. Lee").await,
            Err(CapabilityError::NotConfigured)
        ));
    }
}
