//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use vidgen_worker::IntakeService;

use crate::auth::JwksCache;
use crate::config::ApiConfig;
use crate::handlers::health::DependencyCheck;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub intake: Arc<IntakeService>,
    pub jwks: Arc<JwksCache>,
    /// Served under `/temp` so the renderer can fetch combined audio
    pub temp_dir: PathBuf,
    pub checks: Arc<Vec<Arc<dyn DependencyCheck>>>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        intake: IntakeService,
        jwks: JwksCache,
        temp_dir: impl Into<PathBuf>,
        checks: Vec<Arc<dyn DependencyCheck>>,
    ) -> Self {
        Self {
            config,
            intake: Arc::new(intake),
            jwks: Arc::new(jwks),
            temp_dir: temp_dir.into(),
            checks: Arc::new(checks),
        }
    }
}
