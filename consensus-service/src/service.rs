use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use graph_flow::{FlowRunner, InMemorySessionStorage, Session, SessionStatus, SessionStorage};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    config::Settings,
    error::ConsensusError,
    models::{CaseInput, RunResponse},
    translation::SUPPORTED_LANGUAGES,
    workflow::{ConsensusWorkflow, WorkflowState, create_consensus_session},
};

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "run_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub flow_runner: FlowRunner,
}

impl AppState {
    pub fn new(workflow: &ConsensusWorkflow) -> Self {
        let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let flow_runner = FlowRunner::new(workflow.graph(), session_storage.clone());
        Self {
            session_storage,
            flow_runner,
        }
    }
}

pub fn create_app(settings: &Settings) -> Result<Router, ConsensusError> {
    let workflow = ConsensusWorkflow::from_settings(settings)?;
    Ok(build_router(AppState::new(&workflow)))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/languages", get(languages))
        .route("/consensus/analyze", post(start_analysis))
        .route("/consensus/{run_id}", get(get_run))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Medical Consensus Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-agent consensus diagnosis with source verification and optional translation",
        "endpoints": {
            "POST /consensus/analyze": "Run the consensus workflow for a case",
            "GET /consensus/{run_id}": "Get a stored run and its report",
            "GET /languages": "Languages available for translation",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn languages() -> Json<Value> {
    Json(json!({
        "count": SUPPORTED_LANGUAGES.len(),
        "languages": SUPPORTED_LANGUAGES.as_slice(),
    }))
}

async fn start_analysis(
    State(state): State<AppState>,
    Json(case): Json<CaseInput>,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    validate_case(&case)?;
    info!(topic = %case.topic, realtime = case.realtime_search, "Starting consensus analysis");

    let session = create_consensus_session(&case).await.map_err(|e| {
        error!("Failed to create session: {}", e);
        internal_error("Failed to create analysis run", &e.to_string())
    })?;
    let run_id = session.id.clone();
    state.session_storage.save(session).await.map_err(|e| {
        error!("Failed to save session {}: {}", run_id, e);
        internal_error("Failed to create analysis run", &e.to_string())
    })?;

    let status = match state.flow_runner.run(&run_id).await {
        Ok(result) => {
            info!(run_id = %run_id, stages = result.trail.len(), "Consensus analysis completed");
            StatusCode::OK
        }
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Consensus analysis failed");
            StatusCode::BAD_GATEWAY
        }
    };

    let session = load_session(&state, &run_id).await?;
    Ok((status, Json(run_response(&session))))
}

fn validate_case(case: &CaseInput) -> Result<(), ApiError> {
    if case.topic.trim().is_empty() {
        return Err(bad_request_error("topic is required"));
    }
    Ok(())
}

async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<RunResponse> {
    info!("Getting run: {}", run_id);
    let session = load_session(&state, &run_id).await?;
    Ok(Json(run_response(&session)))
}

async fn load_session(state: &AppState, run_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(run_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Run not found", run_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", run_id, e);
            Err(internal_error("Failed to load run", &e.to_string()))
        }
    }
}

fn run_response(session: &Session) -> RunResponse {
    let state = WorkflowState::from_context(&session.context, &session.trail);
    let mut errors = state.errors.clone();
    let status = match &session.status {
        SessionStatus::Pending => "pending",
        SessionStatus::Completed => "completed",
        SessionStatus::Failed { message } => {
            errors.push(message.clone());
            "failed"
        }
    };
    let report = match session.status {
        SessionStatus::Completed => state.into_report().ok(),
        _ => None,
    };

    RunResponse {
        run_id: session.id.clone(),
        status: status.to_string(),
        stages: session.trail.clone(),
        report,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StageTimeouts,
        llm::{ChatMessage, ChatProvider, LlmClient, ProviderError},
        retry::RetryPolicy,
        search::{TrustedDomains, WebSearchClient},
        tasks::AgentDeps,
        verifier::SourceVerifier,
    };
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    struct Scripted;

    #[async_trait]
    impl ChatProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            Ok("## UNIFIED DIAGNOSIS\nTension-type headache\n\n## RATIONALE\nConsistent findings".to_string())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl ChatProvider for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            Err(ProviderError::Auth { status: 401 })
        }
    }

    fn app_with(provider: Arc<dyn ChatProvider>) -> Router {
        let deps = AgentDeps {
            llm: LlmClient::new(vec![provider], RetryPolicy::none()),
            search: Arc::new(WebSearchClient::new(
                Vec::new(),
                RetryPolicy::none(),
                TrustedDomains::default(),
            )),
            verifier: SourceVerifier::default(),
            max_results: 3,
        };
        let workflow = ConsensusWorkflow::new(deps, StageTimeouts::default()).unwrap();
        build_router(AppState::new(&workflow))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn analyze(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/consensus/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_languages() {
        let app = app_with(Arc::new(Scripted));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/languages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["count"], 36);
        assert_eq!(body["languages"][0]["code"], "ar");
    }

    #[tokio::test]
    async fn blank_topic_is_rejected() {
        let app = app_with(Arc::new(Scripted));
        let response = app.oneshot(analyze(json!({ "topic": "  " }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn completed_run_can_be_fetched_again() {
        let app = app_with(Arc::new(Scripted));
        let response = app
            .clone()
            .oneshot(analyze(json!({ "topic": "Headache", "symptoms": "band-like pressure" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["report"]["sections"][0]["body"], "Tension-type headache");

        let run_id = body["run_id"].as_str().unwrap();
        let response = app
            .oneshot(
                Request::get(format!("/consensus/{run_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let fetched = body_json(response).await;
        assert_eq!(fetched["status"], "completed");
        assert_eq!(fetched["stages"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unreachable_providers_fail_the_run() {
        let app = app_with(Arc::new(Rejecting));
        let response = app
            .oneshot(analyze(json!({ "topic": "Headache" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert!(body["report"].is_null());

        let stages: Vec<_> = body["stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|stage| (stage["task_id"].as_str().unwrap(), stage["outcome"].as_str().unwrap()))
            .collect();
        assert_eq!(
            stages,
            vec![
                ("research", "completed"),
                ("verify_sources", "completed"),
                ("diagnose", "failed"),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let app = app_with(Arc::new(Scripted));
        let response = app
            .oneshot(Request::get("/consensus/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
