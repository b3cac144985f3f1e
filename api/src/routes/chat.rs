use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use hcp_core::envelope::{ChatRequest, ChatResponse};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/chat", post(chat))
}

/// Route one chat message and return exactly one envelope
///
/// Messages starting with `-` are task commands (`-log`, `-edit interaction`,
/// `-put`, `-history for`, `-insights`, `-form`, `-help`). Anything else is
/// conversation, or classified by a model when intelligent routing is on.
/// Tool failures come back as `responseType: "ERROR"` with status 200.
#[utoipa::path(
    post,
    path = "/v1/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Envelope for the message", body = ChatResponse),
        (status = 400, description = "Empty or malformed request", body = hcp_core::error::ApiError),
        (status = 429, description = "Rate limited", body = hcp_core::error::ApiError)
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation {
            message: "message must not be empty".to_string(),
            field: Some("message".to_string()),
            received: Some(serde_json::Value::String(request.message)),
            docs_hint: Some("Send a task like '-help' or any conversational text.".to_string()),
        });
    }

    let envelope = state.engine.handle(&request).await;
    Ok(Json(ChatResponse::from(envelope)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support::{json_body, json_request, state};
    use crate::store::InteractionStore;

    #[tokio::test]
    async fn prefixed_put_returns_form_update() {
        let app = router().with_state(state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                json!({"message": "-put sentiment as good", "formData": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["responseType"], "FORM_UPDATE");
        assert_eq!(body["field"], "sentiment");
        assert_eq!(body["value"], "Positive");
    }

    #[tokio::test]
    async fn log_without_model_still_populates_defaults() {
        let app_state = state();
        let app = router().with_state(app_state.clone());
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                json!({"message": "-log Met Dr. Patel about the new inhaler"}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["responseType"], "FORM_POPULATE");
        let updates = body["fieldUpdates"].as_array().unwrap();
        assert!(updates.contains(&json!({"field": "hcpName", "value": "Dr. Patel"})));

        let stored = app_state.store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.fields.hcp_name, "Dr. Patel");
    }

    #[tokio::test]
    async fn unknown_verb_is_an_error_envelope() {
        let app = router().with_state(state());
        let response = app
            .oneshot(json_request("POST", "/v1/chat", json!({"message": "-dance"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["responseType"], "ERROR");
        assert!(body["message"].as_str().unwrap().contains("'dance'"));
    }

    #[tokio::test]
    async fn conversation_has_no_response_type() {
        let app = router().with_state(state());
        let response = app
            .oneshot(json_request("POST", "/v1/chat", json!({"message": "hello"})))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert!(body.get("responseType").is_none());
        assert_eq!(body["message"], "Hi! How are you doing today?");
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let app = router().with_state(state());
        let response = app
            .oneshot(json_request("POST", "/v1/chat", json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "message");
    }

    #[tokio::test]
    async fn missing_message_is_rejected_as_json() {
        let app = router().with_state(state());
        let response = app
            .oneshot(json_request("POST", "/v1/chat", json!({"formData": {}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["field"], "message");
    }
}
