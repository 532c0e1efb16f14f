//! HTTP server for the local Git service
//!
//! Exposes the gitcmd operations to the browser extension over localhost.
//!
//! # Routes
//!
//! - `GET  /health` - Liveness marker and version
//! - `GET  /load-config` - config.json presence flags and non-secret fields
//! - `POST /validate-repo` - Repository validation (body: `{"projectPath": "..."}`)
//! - `POST /git-status` - Working tree status
//! - `POST /list-branches` - Local/remote branch enumeration
//! - `POST /create-branch` - Branch creation (body: `{"branchName", "projectPath", ...}`)
//!
//! # Example
//!
//! ```no_run
//! use branchpilot::config::ConfigSnapshot;
//! use branchpilot::server::GitServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = GitServer::new(ConfigSnapshot::default(), None);
//!     server.run("127.0.0.1:3000").await.expect("Server failed");
//! }
//! ```

use crate::config::ConfigSnapshot;
use crate::{BranchPilotError, Result};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gitcmd::{CreateOptions, GitClient, GitError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared server state: an immutable config snapshot and the git client.
/// Requests share nothing mutable; concurrent git commands only contend on
/// git's own lock files.
struct AppState {
    config: ConfigSnapshot,
    config_path: Option<PathBuf>,
    git: GitClient,
}

/// Localhost HTTP server wrapping the git operations
pub struct GitServer {
    state: Arc<AppState>,
}

impl GitServer {
    /// Create a server from a startup config snapshot.
    ///
    /// `config_path` is remembered so `/load-config` re-reads the same file
    /// the server was started with, producing a fresh snapshot per call.
    pub fn new(config: ConfigSnapshot, config_path: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(AppState {
                config,
                config_path,
                git: GitClient::new(),
            }),
        }
    }

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/load-config", get(load_config))
            .route("/validate-repo", post(validate_repo))
            .route("/git-status", post(git_status))
            .route("/list-branches", post(list_branches))
            .route("/create-branch", post(create_branch))
            .fallback(not_found)
            .layer(middleware::from_fn(cors_middleware))
            .with_state(state)
    }

    /// Run the server until ctrl-c
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BranchPilotError::Server(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(addr = addr, version = env!("CARGO_PKG_VERSION"), "Git service listening");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await
            .map_err(|e| BranchPilotError::Server(e.to_string()))
    }
}

/// Extension pages and local tools are the only expected callers
fn is_allowed_origin(origin: &str) -> bool {
    origin.starts_with("chrome-extension://")
        || origin.starts_with("moz-extension://")
        || origin.starts_with("http://localhost")
        || origin.starts_with("http://127.0.0.1")
}

/// CORS layer for the browser extension: echo allowed origins and answer
/// preflight requests without touching the handlers.
async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if let Some(origin) = origin.filter(|o| is_allowed_origin(o)) {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("content-type"),
            );
        }
    }

    response
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Body for the repository read endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathRequest {
    #[serde(default)]
    project_path: String,
}

/// Body for POST /create-branch
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBranchRequest {
    #[serde(default)]
    branch_name: String,
    #[serde(default)]
    project_path: String,
    #[serde(default)]
    auto_checkout: Option<bool>,
    #[serde(default)]
    default_base_branch: Option<String>,
}

/// Error body shared by every failing endpoint
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
    timestamp: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
            timestamp: now(),
        }),
    )
}

/// Map a translated git error onto an HTTP status: caller-fixable kinds are
/// 400, permission problems 403, everything else 500.
fn git_error(err: GitError) -> ApiError {
    let status = if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, GitError::PermissionDenied { .. }) {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    tracing::warn!(code = err.code(), error = %err, "git operation failed");

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: err.to_string(),
            code: err.code().to_string(),
            timestamp: now(),
        }),
    )
}

/// Require a non-empty absolute path before any filesystem access
fn require_project_path(raw: &str) -> std::result::Result<PathBuf, ApiError> {
    if raw.trim().is_empty() {
        return Err(bad_request("projectPath is required"));
    }
    let path = PathBuf::from(raw);
    if !path.is_absolute() {
        return Err(bad_request(format!(
            "projectPath must be an absolute path, got: {raw}"
        )));
    }
    Ok(path)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "Local Git server working",
        "timestamp": now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Report config.json contents without ever exposing the credential itself
async fn load_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let path = state
        .config_path
        .clone()
        .or_else(|| ConfigSnapshot::discover(None));

    let Some(path) = path.filter(|p| p.exists()) else {
        return Json(json!({
            "success": false,
            "error": "config.json not found",
            "path": ConfigSnapshot::default_path().display().to_string(),
            "timestamp": now(),
        }));
    };

    match ConfigSnapshot::load(&path) {
        Ok(config) => Json(json!({
            "success": true,
            "config": {
                "projectPath": config.project_path(),
                "defaultBaseBranch": config.default_base_branch().unwrap_or(""),
                "hasApiKey": config.has_api_key(),
                "hasProjectPath": config.has_project_path(),
                "settings": config.settings,
            },
            "timestamp": now(),
        })),
        Err(e) => Json(json!({
            "success": false,
            "error": e.to_string(),
            "path": path.display().to_string(),
            "timestamp": now(),
        })),
    }
}

async fn validate_repo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PathRequest>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let path = require_project_path(&req.project_path)?;
    let validation = state.git.validate(&path).await.map_err(git_error)?;

    Ok(Json(json!({
        "success": true,
        "isValid": validation.is_valid,
        "path": validation.path,
        "gitVersion": validation.git_version,
        "message": validation.message,
        "timestamp": now(),
    })))
}

async fn git_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PathRequest>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let path = require_project_path(&req.project_path)?;
    let status = state.git.status(&path).await.map_err(git_error)?;

    let mut body = serde_json::to_value(&status).unwrap_or_default();
    if let Some(map) = body.as_object_mut() {
        map.insert("success".into(), json!(true));
        map.insert("timestamp".into(), json!(now()));
    }
    Ok(Json(body))
}

async fn list_branches(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PathRequest>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let path = require_project_path(&req.project_path)?;
    let branches = state.git.branches(&path).await.map_err(git_error)?;

    Ok(Json(json!({
        "success": true,
        "branches": branches,
        "timestamp": now(),
    })))
}

async fn create_branch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBranchRequest>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    if req.branch_name.trim().is_empty() || req.project_path.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                error: "branchName and projectPath are required".to_string(),
                code: "BAD_REQUEST".to_string(),
                timestamp: now(),
            }),
        ));
    }
    let path = require_project_path(&req.project_path)?;

    // Request-level base hint wins over the startup config snapshot
    let base_branch = req
        .default_base_branch
        .filter(|b| !b.trim().is_empty())
        .or_else(|| state.config.default_base_branch().map(str::to_string));

    let options = CreateOptions {
        auto_checkout: req.auto_checkout.unwrap_or(true),
        base_branch,
    };

    tracing::info!(
        branch = %req.branch_name,
        path = %path.display(),
        auto_checkout = options.auto_checkout,
        "create-branch request"
    );

    let result = state
        .git
        .create_branch(&req.branch_name, &path, options)
        .await
        .map_err(git_error)?;

    let mut body = serde_json::to_value(&result).unwrap_or_default();
    if let Some(map) = body.as_object_mut() {
        map.insert("success".into(), json!(true));
        map.insert("timestamp".into(), json!(now()));
    }
    Ok(Json(body))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "availableEndpoints": [
                "GET  /health",
                "GET  /load-config",
                "POST /create-branch",
                "POST /git-status",
                "POST /list-branches",
                "POST /validate-repo",
            ],
            "timestamp": now(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use gitcmd::GitRunner;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = Arc::new(AppState {
            config: ConfigSnapshot::default(),
            config_path: None,
            git: GitClient::new(),
        });
        GitServer::router(state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn git_available() -> bool {
        GitClient::new().git_version(Path::new(".")).await.is_ok()
    }

    async fn init_repo(dir: &Path) {
        let runner = GitRunner::new();
        runner.run(&["init"], dir).await.unwrap();
        runner.run(&["checkout", "-b", "main"], dir).await.unwrap();
        runner
            .run(
                &[
                    "-c",
                    "user.email=tester@example.com",
                    "-c",
                    "user.name=Tester",
                    "commit",
                    "--allow-empty",
                    "-m",
                    "initial commit",
                ],
                dir,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route_lists_endpoints() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/no-such-route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Endpoint not found");
        assert!(body["availableEndpoints"].is_array());
    }

    #[tokio::test]
    async fn test_git_status_requires_project_path() {
        let response = test_app()
            .oneshot(post_json("/git-status", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_git_status_missing_path_maps_to_path_not_found() {
        let response = test_app()
            .oneshot(post_json(
                "/git-status",
                json!({"projectPath": "/definitely/not/a/real/path"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "PATH_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_branches_missing_path_maps_to_path_not_found() {
        let response = test_app()
            .oneshot(post_json(
                "/list-branches",
                json!({"projectPath": "/definitely/not/a/real/path"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "PATH_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_relative_path_is_rejected() {
        let response = test_app()
            .oneshot(post_json(
                "/git-status",
                json!({"projectPath": "relative/dir"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validate_repo_missing_path_maps_to_400() {
        let response = test_app()
            .oneshot(post_json(
                "/validate-repo",
                json!({"projectPath": "/definitely/not/a/real/path"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "PATH_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_validate_repo_non_git_directory() {
        let temp = TempDir::new().unwrap();
        let response = test_app()
            .oneshot(post_json(
                "/validate-repo",
                json!({"projectPath": temp.path().display().to_string()}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "NOT_A_GIT_REPOSITORY");
    }

    #[tokio::test]
    async fn test_create_branch_requires_both_fields() {
        let response = test_app()
            .oneshot(post_json("/create-branch", json!({"branchName": "feat/x"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "branchName and projectPath are required");
    }

    #[tokio::test]
    async fn test_create_branch_rejects_invalid_name() {
        let temp = TempDir::new().unwrap();
        let response = test_app()
            .oneshot(post_json(
                "/create-branch",
                json!({
                    "branchName": "feat/foo; rm -rf /",
                    "projectPath": temp.path().display().to_string(),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INVALID_BRANCH_NAME");
    }

    #[tokio::test]
    async fn test_cors_preflight_for_extension_origin() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/create-branch")
                    .header("Origin", "chrome-extension://abcdefg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "chrome-extension://abcdefg"
        );
    }

    #[tokio::test]
    async fn test_cors_ignores_unknown_origin() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Origin", "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_load_config_reports_missing_file() {
        let state = Arc::new(AppState {
            config: ConfigSnapshot::default(),
            config_path: Some(PathBuf::from("/no/such/config.json")),
            git: GitClient::new(),
        });
        let response = GitServer::router(state)
            .oneshot(
                Request::builder()
                    .uri("/load-config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_load_config_never_exposes_credential() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.json");
        std::fs::write(
            &config_path,
            json!({
                "geminiApiKey": "AIza-top-secret",
                "projectPath": "/home/me/project",
            })
            .to_string(),
        )
        .unwrap();

        let state = Arc::new(AppState {
            config: ConfigSnapshot::default(),
            config_path: Some(config_path),
            git: GitClient::new(),
        });
        let response = GitServer::router(state)
            .oneshot(
                Request::builder()
                    .uri("/load-config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["config"]["hasApiKey"], true);
        assert_eq!(body["config"]["hasProjectPath"], true);
        assert!(!body.to_string().contains("AIza-top-secret"));
    }

    #[tokio::test]
    async fn test_create_branch_full_flow() {
        if !git_available().await {
            return;
        }
        let temp = TempDir::new().unwrap();
        init_repo(temp.path()).await;
        let project_path = temp.path().display().to_string();

        let app = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/create-branch",
                json!({"branchName": "feat/login", "projectPath": project_path}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["branchName"], "feat/login");
        assert_eq!(body["previousBranch"], "main");
        assert_eq!(body["currentBranch"], "feat/login");
        assert_eq!(body["checkedOut"], true);

        let response = app
            .oneshot(post_json(
                "/list-branches",
                json!({"projectPath": temp.path().display().to_string()}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let all: Vec<String> =
            serde_json::from_value(body["branches"]["all"].clone()).unwrap();
        assert!(all.contains(&"main".to_string()));
        assert!(all.contains(&"feat/login".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_branch_maps_to_branch_already_exists() {
        if !git_available().await {
            return;
        }
        let temp = TempDir::new().unwrap();
        init_repo(temp.path()).await;
        let project_path = temp.path().display().to_string();

        let app = test_app();
        let first = app
            .clone()
            .oneshot(post_json(
                "/create-branch",
                json!({"branchName": "feat/dup", "projectPath": project_path.clone()}),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_json(
                "/create-branch",
                json!({"branchName": "feat/dup", "projectPath": project_path}),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let body = body_json(second).await;
        assert_eq!(body["code"], "BRANCH_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_git_status_reports_current_branch() {
        if !git_available().await {
            return;
        }
        let temp = TempDir::new().unwrap();
        init_repo(temp.path()).await;

        let response = test_app()
            .oneshot(post_json(
                "/git-status",
                json!({"projectPath": temp.path().display().to_string()}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["currentBranch"], "main");
        assert_eq!(body["isClean"], true);
    }
}
