//! Structured job logging.

use tracing::{error, info, warn, Span};

use vidgen_models::{JobId, VideoVariant};

/// Logger that stamps every line with the job id, variant and owner.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    variant: &'static str,
    user_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, variant: VideoVariant, user_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            variant: variant.as_str(),
            user_id: user_id.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            variant = self.variant,
            user_id = %self.user_id,
            "Job started: {}", message
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            variant = self.variant,
            stage,
            "Job stage: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            variant = self.variant,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            variant = self.variant,
            user_id = %self.user_id,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            variant = self.variant,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span covering the whole background task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            variant = self.variant,
            user_id = %self.user_id
        )
    }
}
