//! Health check handlers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use vidgen_firestore::FirestoreClient;

use crate::state::AppState;

/// A dependency the service cannot work without.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<(), String>;
}

/// Firestore answers a document read; a missing document still counts.
pub struct FirestoreCheck(pub FirestoreClient);

#[async_trait]
impl DependencyCheck for FirestoreCheck {
    fn name(&self) -> &'static str {
        "firestore"
    }

    async fn check(&self) -> Result<(), String> {
        self.0
            .get_document("_health", "_check")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// A local directory exists.
pub struct DirectoryCheck {
    pub name: &'static str,
    pub path: PathBuf,
}

#[async_trait]
impl DependencyCheck for DirectoryCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check(&self) -> Result<(), String> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(format!("{} is not a directory", self.path.display())),
            Err(e) => Err(format!("{}: {}", self.path.display(), e)),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness probe: every registered dependency must answer.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let mut checks = BTreeMap::new();
    for check in state.checks.iter() {
        let start = Instant::now();
        let status = match check.check().await {
            Ok(()) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e),
        };
        checks.insert(check.name(), status);
    }

    let all_ok = checks.values().all(CheckStatus::is_ok);
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
