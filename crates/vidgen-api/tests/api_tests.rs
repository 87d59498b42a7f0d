//! Router-level tests with in-memory backends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use vidgen_api::auth::{AuthUser, JwksCache};
use vidgen_api::handlers::health::{DependencyCheck, DirectoryCheck};
use vidgen_api::handlers::{submit_narration, submit_quiz, NarrationRequest, QuizRequest};
use vidgen_api::{create_router, ApiConfig, AppState};
use vidgen_firestore::{FinalMedia, FirestoreResult, QuotaDecrement};
use vidgen_models::{Job, JobId, UsageQuota};
use vidgen_notify::{EmailMessage, NotifyResult};
use vidgen_render::{Bundle, Composition, RemotionConfig, RenderEngine, RenderError, RenderRequest, RenderResult};
use vidgen_storage::{StorageError, StorageResult, UploadedObject};
use vidgen_worker::{
    AudioMeter, Collaborators, IntakeService, JobStore, JobSupervisor, Notifier, ObjectStore,
    Pipeline, PipelineConfig, QuizSupport, QuotaStore, ReachabilityProbe, RenderConfig,
};

#[derive(Default)]
struct Jobs(Mutex<HashMap<String, Job>>);

#[async_trait]
impl JobStore for Jobs {
    async fn create_placeholder(&self, job: &Job) -> FirestoreResult<()> {
        self.0.lock().unwrap().insert(job.id.to_string(), job.clone());
        Ok(())
    }
    async fn finalize(&self, _: &str, _: &JobId, _: &FinalMedia) -> FirestoreResult<()> {
        Ok(())
    }
    async fn delete(&self, _: &str, job_id: &JobId) -> FirestoreResult<()> {
        self.0.lock().unwrap().remove(job_id.as_str());
        Ok(())
    }
}

struct Quota(AtomicU32);

#[async_trait]
impl QuotaStore for Quota {
    async fn current(&self, user_id: &str) -> FirestoreResult<UsageQuota> {
        let mut quota = UsageQuota::new(user_id, 10, Utc::now());
        quota.remaining = self.0.load(Ordering::SeqCst);
        Ok(quota)
    }
    async fn decrement(&self, user_id: &str) -> FirestoreResult<QuotaDecrement> {
        let quota = self.current(user_id).await?;
        Ok(match quota.decremented() {
            Some(next) => {
                self.0.store(next.remaining, Ordering::SeqCst);
                QuotaDecrement::Consumed(next)
            }
            None => QuotaDecrement::Exhausted(quota),
        })
    }
}

struct NoStorage;

#[async_trait]
impl ObjectStore for NoStorage {
    async fn upload(&self, _: &Path, _: &str) -> StorageResult<UploadedObject> {
        Err(StorageError::upload_failed("offline"))
    }
}

struct Silent;

#[async_trait]
impl Notifier for Silent {
    async fn send(&self, _: &EmailMessage) -> NotifyResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ReachabilityProbe for Silent {
    async fn is_reachable(&self, _: &str) -> bool {
        true
    }
}

#[async_trait]
impl AudioMeter for Silent {
    async fn measure(&self, _: &Path) -> Option<f64> {
        None
    }
}

/// Renders never start; submissions only need the intake path.
struct NoRenderer;

#[async_trait]
impl RenderEngine for NoRenderer {
    async fn bundle(&self, _: &Path) -> RenderResult<Bundle> {
        Err(RenderError::BinaryNotFound("npx".into()))
    }
    async fn list_compositions(&self, _: &Bundle, _: &Value) -> RenderResult<Vec<Composition>> {
        Ok(Vec::new())
    }
    async fn render(&self, _: &Bundle, request: &RenderRequest) -> RenderResult<PathBuf> {
        Ok(request.output.clone())
    }
}

struct TestApp {
    _root: tempfile::TempDir,
    temp_dir: PathBuf,
    jobs: Arc<Jobs>,
    quota: Arc<Quota>,
    state: AppState,
}

impl TestApp {
    fn new(quiz_remaining: u32) -> Self {
        Self::with_checks(quiz_remaining, |_| Vec::new())
    }

    fn with_checks<F>(quiz_remaining: u32, checks: F) -> Self
    where
        F: FnOnce(&Path) -> Vec<Arc<dyn DependencyCheck>>,
    {
        Self::build(quiz_remaining, true, checks)
    }

    fn without_quiz(quiz_remaining: u32) -> Self {
        Self::build(quiz_remaining, false, |_| Vec::new())
    }

    fn build<F>(quiz_remaining: u32, quiz_enabled: bool, checks: F) -> Self
    where
        F: FnOnce(&Path) -> Vec<Arc<dyn DependencyCheck>>,
    {
        let root = tempfile::tempdir().unwrap();
        let public_dir = root.path().join("public");
        let temp_dir = public_dir.join("temp");
        std::fs::create_dir_all(&temp_dir).unwrap();

        let jobs = Arc::new(Jobs::default());
        let quota = Arc::new(Quota(AtomicU32::new(quiz_remaining)));
        let collaborators = Collaborators {
            jobs: jobs.clone(),
            quotas: quota.clone(),
            objects: Arc::new(NoStorage),
            notifier: Arc::new(Silent),
            speech: None,
            probe: Arc::new(Silent),
            meter: Arc::new(Silent),
            engine: Arc::new(NoRenderer),
        };
        let pipeline = Pipeline::new(
            &PipelineConfig::new("https://app.example.com", "media.example.com"),
            &RenderConfig {
                remotion: RemotionConfig::new(".", "src/index.ts"),
                work_dir: root.path().join("work"),
                public_dir,
            },
            &collaborators,
        );
        let intake = IntakeService::new(
            collaborators.jobs.clone(),
            collaborators.quotas.clone(),
            JobSupervisor::new(Arc::new(pipeline)),
            QuizSupport {
                enabled: quiz_enabled,
                default_voice: Some("rachel".into()),
            },
        );

        let config = ApiConfig {
            firebase_project_id: "vidgen-test".into(),
            jwks_url: "http://127.0.0.1:9/keys".into(),
            ..Default::default()
        };
        let jwks = JwksCache::new(&config.firebase_project_id, &config.jwks_url).unwrap();
        let checks = checks(root.path());
        let state = AppState::new(config, intake, jwks, &temp_dir, checks);

        Self {
            _root: root,
            temp_dir,
            jobs,
            quota,
            state,
        }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone(), None)
    }
}

fn user() -> AuthUser {
    AuthUser {
        uid: "user-1".into(),
        email: Some("ada@example.com".into()),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_sets_security_and_request_id_headers() {
    let app = TestApp::new(3);
    let response = app
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_submission_requires_bearer_token() {
    let app = TestApp::new(3);
    let response = app
        .router()
        .oneshot(
            Request::post("/api/videos/narration")
                .header("content-type", "application/json")
                .body(Body::from(json!({"title": "t", "voice": "v"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Authorization"));
    assert_eq!(app.jobs.0.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn test_submissions_are_rate_limited_per_client() {
    let app = TestApp::new(3);
    let router = app.router();
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/videos/quiz")
                    .header("x-forwarded-for", "198.51.100.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
}

#[tokio::test]
async fn test_ready_reports_failed_dependency() {
    let app = TestApp::with_checks(3, |root| {
        vec![
            Arc::new(DirectoryCheck {
                name: "temp_dir",
                path: root.join("public/temp"),
            }) as Arc<dyn DependencyCheck>,
            Arc::new(DirectoryCheck {
                name: "render_project",
                path: root.join("remotion"),
            }),
        ]
    });
    let response = app
        .router()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["temp_dir"]["status"], "ok");
    assert_eq!(body["checks"]["render_project"]["status"], "error");
}

#[tokio::test]
async fn test_temp_assets_are_served() {
    let app = TestApp::new(3);
    std::fs::write(app.temp_dir.join("audio-abc.mp3"), b"ID3data").unwrap();

    let response = app
        .router()
        .oneshot(Request::get("/temp/audio-abc.mp3").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ID3data");
}

#[tokio::test]
async fn test_metrics_route_absent_without_handle() {
    let app = TestApp::new(3);
    let response = app
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_narration_accepted_with_job_id() {
    let app = TestApp::new(3);
    let request: NarrationRequest = serde_json::from_value(json!({
        "title": "Hello video",
        "voice": "nova",
        "segments": [{"text": "Hello world", "audio": "SUQz"}]
    }))
    .unwrap();

    let (status, Json(body)) = submit_narration(State(app.state.clone()), user(), Ok(Json(request)))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body.estimated_completion, "2-5 minutes");
    assert!(app.jobs.0.lock().unwrap().contains_key(&body.job_id));
}

#[tokio::test]
async fn test_quiz_over_quota_returns_429() {
    let app = TestApp::new(0);
    let request: QuizRequest = serde_json::from_value(json!({
        "title": "Planets",
        "items": [{"type": "text", "content": "Welcome to the quiz"}]
    }))
    .unwrap();

    let err = submit_quiz(State(app.state.clone()), user(), Ok(Json(request)))
        .await
        .unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "QUOTA_EXCEEDED");
    assert!(app.jobs.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_quiz_rejected_before_intake() {
    let app = TestApp::new(3);
    let request: QuizRequest = serde_json::from_value(json!({
        "title": "Planets",
        "questionCount": 99,
        "items": [{"type": "text", "content": "Welcome"}]
    }))
    .unwrap();

    let response = submit_quiz(State(app.state.clone()), user(), Ok(Json(request)))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("question_count"));
}

#[tokio::test]
async fn test_quiz_unavailable_without_speech() {
    let app = TestApp::without_quiz(3);
    let request: QuizRequest = serde_json::from_value(json!({
        "title": "Planets",
        "items": [{"type": "text", "content": "Welcome to the quiz"}]
    }))
    .unwrap();

    let response = submit_quiz(State(app.state.clone()), user(), Ok(Json(request)))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.jobs.0.lock().unwrap().is_empty());
    assert_eq!(app.quota.0.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_oversized_wait_time_rejected() {
    let app = TestApp::new(3);
    let request: QuizRequest = serde_json::from_value(json!({
        "title": "Planets",
        "items": [{
            "type": "question",
            "question": "Largest planet?",
            "choices": {"A": "Mars", "B": "Jupiter", "C": "Venus", "D": "Earth"},
            "correct": "B",
            "wait_time": u32::MAX
        }]
    }))
    .unwrap();

    let response = submit_quiz(State(app.state.clone()), user(), Ok(Json(request)))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .contains("wait_time"));
    assert!(app.jobs.0.lock().unwrap().is_empty());
    assert_eq!(app.quota.0.load(Ordering::SeqCst), 3);
}
