use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod engine;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
mod store;

use engine::Engine;
use engine::capabilities::Guarded;
use engine::llm::LlmClient;
use engine::router::IntentRouter;
use engine::tools::ToolSet;
use store::{InteractionStore, MemoryInteractionStore, PgInteractionStore};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HCP Interaction API",
        version = "0.1.0",
        description = "Chat-driven logging and editing of healthcare professional interactions. \
                       Task messages start with '-'; every chat message yields exactly one envelope."
    ),
    paths(
        routes::health::health_check,
        routes::chat::chat,
        routes::interactions::create_interaction,
        routes::interactions::update_interaction,
        routes::interactions::list_by_hcp_name,
    ),
    components(schemas(
        HealthResponse,
        hcp_core::error::ApiError,
        hcp_core::envelope::ChatRequest,
        hcp_core::envelope::ChatResponse,
        hcp_core::envelope::FieldUpdate,
        hcp_core::interactions::Interaction,
        hcp_core::interactions::InteractionFields,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hcp_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn InteractionStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .connect(database_url)
                .await
                .expect("Failed to connect to database");

            sqlx::migrate!("../migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            Arc::new(PgInteractionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, interactions are kept in memory only");
            Arc::new(MemoryInteractionStore::new())
        }
    };

    let llm = LlmClient::new(&config.llm).expect("Invalid LLM_BASE_URL");
    if !llm.is_configured() {
        tracing::warn!(
            "No LLM_API_KEY set: extraction uses defaults, intelligent routing uses keywords"
        );
    }
    let llm = Arc::new(Guarded::new(llm, config.llm.timeout));

    let engine = Engine::new(
        IntentRouter::new(config.router_mode, llm.clone()),
        ToolSet::new(store.clone(), llm.clone(), llm, chrono::Utc::now),
    );
    tracing::info!(
        router_mode = ?config.router_mode,
        model = %config.llm.model,
        "Engine ready"
    );

    let app_state = state::AppState {
        store,
        engine: Arc::new(engine),
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::chat::router().layer(middleware::rate_limit::chat_layer()))
        .merge(routes::interactions::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("HCP API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
