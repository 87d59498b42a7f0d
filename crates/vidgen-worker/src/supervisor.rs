//! Supervised background job tasks.
//!
//! Each accepted job runs in its own task. The supervisor awaits it and
//! guarantees a terminal step: finalize on success, compensate on error or
//! panic.

use std::any::Any;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};

use vidgen_models::JobState;

use crate::error::WorkerError;
use crate::logging::JobLogger;
use crate::metrics::{record_job_failed, record_job_finalized};
use crate::pipeline::{Pipeline, JobTracker, RenderJob, Stage};
use crate::temp::TempFiles;

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Finalized { url: String, size: u64 },
    Failed { stage: Stage, error: String },
}

impl JobOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, JobOutcome::Finalized { .. })
    }
}

#[derive(Clone)]
pub struct JobSupervisor {
    pipeline: Arc<Pipeline>,
}

impl JobSupervisor {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Start `job` in the background.
    pub fn spawn(&self, job: RenderJob) -> JoinHandle<JobOutcome> {
        let pipeline = self.pipeline.clone();
        let ctx = &job.context;
        let log = JobLogger::new(&ctx.job_id, ctx.variant, &ctx.user_id);
        let span = log.create_span();

        tokio::spawn(
            async move {
                let job = Arc::new(job);
                let temp = TempFiles::new();
                let tracker = JobTracker::new();

                let worker = {
                    let pipeline = pipeline.clone();
                    let job = job.clone();
                    let temp = temp.clone();
                    let tracker = tracker.clone();
                    tokio::spawn(
                        async move { pipeline.run(&job, &tracker, &temp).await }
                            .in_current_span(),
                    )
                };

                let result = match worker.await {
                    Ok(result) => result,
                    Err(join) if join.is_panic() => {
                        Err(WorkerError::Panicked(panic_message(join.into_panic())))
                    }
                    Err(join) => Err(WorkerError::Panicked(join.to_string())),
                };

                let variant = job.context.variant.as_str();
                match result {
                    Ok(video) => {
                        record_job_finalized(variant);
                        info!(url = %video.url, size = video.size, "Job finalized");
                        JobOutcome::Finalized {
                            url: video.url,
                            size: video.size,
                        }
                    }
                    Err(err) => {
                        let stage = tracker.stage();
                        if !tracker.state().is_terminal() {
                            let _ = tracker.advance(JobState::Failed);
                        }
                        log.log_error(&format!("{} stage failed: {}", stage, err));
                        record_job_failed(variant, err.kind());

                        pipeline.compensate(&job.context, &err, &temp).await;
                        JobOutcome::Failed {
                            stage,
                            error: err.to_string(),
                        }
                    }
                }
            }
            .instrument(span),
        )
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        error!("Job task panicked with a non-string payload");
        "unknown panic".to_string()
    }
}
