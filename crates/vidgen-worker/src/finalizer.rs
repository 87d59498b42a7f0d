//! Job finalization: record the final media, tell the user, clean up.

use std::sync::Arc;

use tracing::{info, warn};

use vidgen_firestore::FinalMedia;
use vidgen_notify::CompletionEmail;
use vidgen_storage::UploadedObject;

use crate::backends::{JobStore, Notifier};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics::record_notification_failure;
use crate::pipeline::JobContext;
use crate::temp::TempFiles;

pub struct Finalizer {
    jobs: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    library_url: String,
}

impl Finalizer {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        library_url: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            notifier,
            library_url: library_url.into(),
        }
    }

    /// Write the uploaded video onto the placeholder record and send the
    /// completion email. Temp files are removed whether or not the record
    /// update succeeds; a failed email is only logged.
    pub async fn finalize(
        &self,
        ctx: &JobContext,
        uploaded: &UploadedObject,
        duration: f64,
        temp: &TempFiles,
    ) -> WorkerResult<()> {
        let media = FinalMedia {
            video_url: uploaded.url.clone(),
            storage_key: uploaded.key.clone(),
            file_size: uploaded.size,
            duration,
        };

        if let Err(e) = self.jobs.finalize(&ctx.user_id, &ctx.job_id, &media).await {
            temp.cleanup().await;
            return Err(WorkerError::finalize(e.to_string()));
        }
        info!(job_id = %ctx.job_id, url = %uploaded.url, size = uploaded.size, "Job record finalized");

        self.notify(ctx, uploaded, duration).await;
        temp.cleanup().await;
        Ok(())
    }

    async fn notify(&self, ctx: &JobContext, uploaded: &UploadedObject, duration: f64) {
        let Some(recipient) = ctx.recipient.as_deref() else {
            warn!(job_id = %ctx.job_id, "No email address for user, skipping completion email");
            return;
        };

        let message = CompletionEmail {
            recipient,
            title: &ctx.title,
            duration_seconds: duration,
            library_url: &self.library_url,
            video_url: &uploaded.url,
        }
        .render();

        if let Err(e) = self.notifier.send(&message).await {
            warn!(job_id = %ctx.job_id, error = %e, "Failed to send completion email");
            record_notification_failure("completion");
        }
    }
}
