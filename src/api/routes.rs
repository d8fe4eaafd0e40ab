//! HTTP route handlers.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{LlmClient, OpenRouterClient, RetryConfig};
use crate::pipeline::{DispatchError, DispatchResponse, GenerationInvoker, TaskDispatcher};
use crate::task::TaskRegistry;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub dispatcher: TaskDispatcher,
}

/// Build the registry, model client and dispatcher from configuration.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let mut registry =
        TaskRegistry::with_builtin_tasks().context("Built-in task catalog is invalid")?;
    if let Some(path) = &config.task_catalog_path {
        let loaded = registry
            .load_catalog_file(path)
            .with_context(|| format!("Failed to load task catalog {}", path.display()))?;
        tracing::info!("Loaded {} tasks from {}", loaded, path.display());
    }
    tracing::info!("Registered tasks: {}", registry.names().join(", "));

    let client: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::with_api_url(
        config.llm.api_key.clone(),
        config.llm.api_url.clone(),
    ));
    let invoker = GenerationInvoker::new(client, config.llm.model.clone())
        .with_timeout(config.llm.timeout)
        .with_retry(RetryConfig::from(&config.llm));

    let dispatcher = TaskDispatcher::new(Arc::new(registry), invoker);
    Ok(Arc::new(AppState { dispatcher }))
}

/// Routes with tracing and CORS layers applied.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:name", post(dispatch_task))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let state = build_state(&config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.dispatcher.invoker().model().to_string(),
        task_count: state.dispatcher.registry().len(),
    })
}

/// List every registered task with its schemas.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<TaskListResponse> {
    Json(TaskListResponse {
        tasks: state.dispatcher.registry().list(),
    })
}

/// Run a task. The status code follows the outcome; the body is the output
/// object or `{"error": "..."}`.
async fn dispatch_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<DispatchResponse>) {
    let response = match body {
        Ok(Json(input)) => state.dispatcher.dispatch(&name, &input).await,
        Err(rejection) => {
            tracing::debug!("Rejected body for task {}: {}", name, rejection.body_text());
            DispatchResponse::Error(DispatchError {
                error: "Request body must be a JSON object with the task's input fields. Please check the request and try again.".to_string(),
                status: StatusCode::BAD_REQUEST,
            })
        }
    };
    (response.status(), Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::MockClient;
    use crate::task::catalog::STRATEGY_DISCLAIMER;
    use serde_json::json;

    fn state(client: Arc<MockClient>) -> Arc<AppState> {
        let config = Config::from_lookup(|key| {
            (key == "OPENROUTER_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();
        let registry = Arc::new(TaskRegistry::with_builtin_tasks().unwrap());
        let invoker = GenerationInvoker::new(client, config.llm.model.clone())
            .with_retry(RetryConfig::from(&config.llm));
        Arc::new(AppState {
            dispatcher: TaskDispatcher::new(registry, invoker),
        })
    }

    #[test]
    fn build_state_registers_catalog_tasks() {
        let config = Config::from_lookup(|key| {
            (key == "OPENROUTER_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();
        let state = build_state(&config).unwrap();
        assert_eq!(state.dispatcher.registry().len(), 8);

        let config = Config::from_lookup(|key| match key {
            "OPENROUTER_API_KEY" => Some("sk-test".to_string()),
            "TASK_CATALOG_PATH" => Some("/nonexistent/tasks.yaml".to_string()),
            _ => None,
        })
        .unwrap();
        let err = build_state(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("/nonexistent/tasks.yaml"));
    }

    #[tokio::test]
    async fn health_reports_model_and_tasks() {
        let Json(body) = health(State(state(Arc::new(MockClient::empty())))).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.model, crate::config::DEFAULT_MODEL);
        assert_eq!(body.task_count, 8);
    }

    #[tokio::test]
    async fn task_list_includes_schemas() {
        let Json(list) = list_tasks(State(state(Arc::new(MockClient::empty())))).await;
        assert_eq!(list.tasks.len(), 8);
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["tasks"][0]["name"], "analyze_document_content");
        assert_eq!(value["tasks"][0]["input_schema"]["type"], "object");
    }

    #[tokio::test]
    async fn dispatch_returns_output_object() {
        let client = Arc::new(MockClient::replying(
            r#"{"requests": ["Produce the signed lease."], "disclaimer": "ignored"}"#,
        ));
        let (status, Json(body)) = dispatch_task(
            State(state(client)),
            Path("generate_discovery_requests".to_string()),
            Ok(Json(json!({
                "caseSummary": "Tenant seeks return of a $1,500 security deposit withheld for pre-existing damage.",
                "discoveryType": "requests_for_production"
            }))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"requests": ["Produce the signed lease."], "disclaimer": STRATEGY_DISCLAIMER})
        );
    }

    #[tokio::test]
    async fn dispatch_errors_use_error_shape() {
        let client = Arc::new(MockClient::empty());
        let (status, Json(body)) = dispatch_task(
            State(state(client.clone())),
            Path("summarize_case".to_string()),
            Ok(Json(json!({"caseDetails": "too short"}))),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 1);
        assert!(value["error"].as_str().unwrap().contains("caseDetails"));
        assert_eq!(client.calls(), 0);

        let (status, _) = dispatch_task(
            State(state(client)),
            Path("no_such_task".to_string()),
            Ok(Json(json!({}))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
