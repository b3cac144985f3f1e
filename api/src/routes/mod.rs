pub mod chat;
pub mod health;
pub mod interactions;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response};

    use crate::config::{DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, LlmConfig};
    use crate::engine::Engine;
    use crate::engine::llm::LlmClient;
    use crate::engine::router::{IntentRouter, RouterMode};
    use crate::engine::tools::ToolSet;
    use crate::state::AppState;
    use crate::store::MemoryInteractionStore;

    /// Memory store plus an unconfigured model client, so every capability
    /// call degrades without touching the network.
    pub fn state() -> AppState {
        let llm = LlmClient::new(&LlmConfig {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.parse().unwrap(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let llm = Arc::new(llm);
        let store = Arc::new(MemoryInteractionStore::new());
        let engine = Engine::new(
            IntentRouter::new(RouterMode::Direct, llm.clone()),
            ToolSet::new(store.clone(), llm.clone(), llm, chrono::Utc::now),
        );
        AppState {
            store,
            engine: Arc::new(engine),
        }
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
