//! Failure compensation.

use std::sync::Arc;

use tracing::{error, info, warn};

use vidgen_models::JobId;
use vidgen_notify::FailureEmail;

use crate::backends::{JobStore, Notifier};
use crate::error::WorkerError;
use crate::metrics::record_notification_failure;
use crate::pipeline::JobContext;
use crate::temp::TempFiles;

pub struct Compensator {
    notifier: Arc<dyn Notifier>,
}

impl Compensator {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Undo what a failed job left behind and tell the user. Never fails.
    pub async fn compensate(&self, ctx: &JobContext, err: &WorkerError, temp: &TempFiles) {
        let removed = temp.cleanup().await;
        info!(job_id = %ctx.job_id, removed, "Removed temp files of failed job");

        let Some(recipient) = ctx.recipient.as_deref() else {
            warn!(job_id = %ctx.job_id, "No email address for user, skipping failure email");
            return;
        };

        let message = FailureEmail {
            recipient,
            title: &ctx.title,
            reason: user_facing_reason(err),
        }
        .render();

        if let Err(e) = self.notifier.send(&message).await {
            warn!(job_id = %ctx.job_id, error = %e, "Failed to send failure email");
            record_notification_failure("failure");
        }
    }
}

/// Delete a placeholder whose quota charge could not be recorded.
///
/// Returns whether the record is gone.
pub async fn rollback_placeholder(jobs: &dyn JobStore, user_id: &str, job_id: &JobId) -> bool {
    match jobs.delete(user_id, job_id).await {
        Ok(()) => {
            info!(job_id = %job_id, user_id, "Rolled back placeholder job");
            true
        }
        Err(e) => {
            error!(job_id = %job_id, user_id, error = %e, "Failed to roll back placeholder job");
            false
        }
    }
}

/// Short explanation for the failure email. Internal detail stays in logs.
pub fn user_facing_reason(err: &WorkerError) -> &'static str {
    match err {
        WorkerError::NoAudioProvided | WorkerError::InvalidAudio(_) => {
            "the narration audio was missing or unreadable"
        }
        WorkerError::SpeechFailed(_) => "we could not generate the narration voice",
        WorkerError::RenderTimeout(_) => "rendering took too long",
        WorkerError::CompositionNotFound(_) | WorkerError::RenderFailed(_) => {
            "the video renderer reported an error"
        }
        WorkerError::UploadExhausted { .. } | WorkerError::Storage(_) => {
            "the finished video could not be uploaded"
        }
        WorkerError::Finalize(_) | WorkerError::Firestore(_) => {
            "the finished video could not be saved to your library"
        }
        _ => "an unexpected error occurred",
    }
}
