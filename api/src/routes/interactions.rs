use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use hcp_core::error::ApiError;
use hcp_core::form::FormState;
use hcp_core::interactions::{Interaction, InteractionPatch};
use hcp_core::normalize::resolve;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;
use crate::store::InteractionStore;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/interactions", post(create_interaction))
        .route("/v1/interactions/{id}", put(update_interaction))
        .route("/v1/interactions/hcp/{name}", get(list_by_hcp_name))
}

/// Create an interaction from a direct form submission
///
/// Keys may be canonical field names or any known alias; values are
/// normalized the same way chat-driven updates are. Required fields are
/// re-checked here even though clients validate before sending.
#[utoipa::path(
    post,
    path = "/v1/interactions",
    request_body(content = BTreeMap<String, String>, description = "Form values keyed by field name"),
    responses(
        (status = 201, description = "Interaction stored", body = Interaction),
        (status = 400, description = "Missing required field or unreadable date", body = ApiError)
    ),
    tag = "interactions"
)]
pub async fn create_interaction(
    State(state): State<AppState>,
    AppJson(form): AppJson<BTreeMap<String, String>>,
) -> Result<(StatusCode, Json<Interaction>), AppError> {
    let now = Utc::now();
    let mut submitted = FormState::new();
    for (field, value) in &form {
        submitted.apply_update(field, value, now, Duration::zero());
    }

    let record = submitted.submission(now.date_naive())?;
    let stored = state.store.create(record).await?;
    tracing::info!(id = stored.id, hcp = %stored.fields.hcp_name, "Interaction submitted from form");

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Partially update an interaction
///
/// Only the fields present in the body change. Concurrent updates to the same
/// record are last-write-wins.
#[utoipa::path(
    put,
    path = "/v1/interactions/{id}",
    params(
        ("id" = i64, Path, description = "Interaction id")
    ),
    request_body(content = BTreeMap<String, String>, description = "Fields to change, keyed by field name"),
    responses(
        (status = 200, description = "Updated interaction", body = Interaction),
        (status = 400, description = "Unknown field, unreadable date or empty update", body = ApiError),
        (status = 404, description = "No interaction with this id", body = ApiError)
    ),
    tag = "interactions"
)]
pub async fn update_interaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(changes): AppJson<BTreeMap<String, String>>,
) -> Result<Json<Interaction>, AppError> {
    let today = Utc::now().date_naive();
    let mut patch = InteractionPatch::default();
    for (alias, value) in &changes {
        let (field, value) = resolve(alias, value.trim()).ok_or_else(|| AppError::Validation {
            message: format!("'{alias}' is not an interaction field"),
            field: Some(alias.clone()),
            received: Some(serde_json::Value::String(value.clone())),
            docs_hint: None,
        })?;
        patch.set(field, value, today)?;
    }
    if patch.is_empty() {
        return Err(AppError::validation("update has no fields", "body"));
    }

    let updated = state.store.update(id, &patch).await?;
    tracing::info!(id = updated.id, "Interaction updated");
    Ok(Json(updated))
}

/// List interactions whose HCP name contains `name`, most recent first
#[utoipa::path(
    get,
    path = "/v1/interactions/hcp/{name}",
    params(
        ("name" = String, Path, description = "Case-insensitive substring of the HCP name")
    ),
    responses(
        (status = 200, description = "Matching interactions", body = Vec<Interaction>)
    ),
    tag = "interactions"
)]
pub async fn list_by_hcp_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Interaction>>, AppError> {
    let records = state.store.list_by_hcp_name(&name).await?;
    Ok(Json(records))
}
