//! Background render pipeline for narration and quiz videos.
//!
//! This crate provides:
//! - Validated startup configuration (`VidgenConfig`)
//! - Collaborator seams with Firestore, R2, email, speech and Remotion backends
//! - The pipeline stages: combiner, background resolver, quiz expander,
//!   render orchestrator, upload with retry, finalizer and compensator
//! - Supervised per-job tasks and the synchronous intake path

pub mod background;
pub mod backends;
pub mod combiner;
pub mod compensator;
pub mod config;
pub mod error;
pub mod finalizer;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod quiz;
pub mod retry;
pub mod speech;
pub mod supervisor;
pub mod temp;
pub mod upload;

pub use backends::{
    AudioMeter, Collaborators, JobStore, Notifier, ObjectStore, QuotaStore, ReachabilityProbe,
    SpeechSynthesizer,
};
pub use config::{PipelineConfig, RenderConfig, SpeechConfig, VidgenConfig};
pub use error::{WorkerError, WorkerResult};
pub use intake::{
    Accepted, AcceptedJob, IntakeError, IntakeService, NarrationSubmission, QuizSubmission,
    QuizSupport, Requester,
};
pub use pipeline::{FinishedVideo, JobContext, JobInput, JobTracker, Pipeline, RenderJob, Stage};
pub use supervisor::{JobOutcome, JobSupervisor};
pub use temp::TempFiles;

use std::sync::Arc;

/// Wire the pipeline, supervisor and intake for a configuration.
pub fn build_intake(config: &VidgenConfig, collaborators: &Collaborators) -> IntakeService {
    let pipeline = Arc::new(Pipeline::new(
        &config.pipeline,
        &config.render,
        collaborators,
    ));
    IntakeService::new(
        collaborators.jobs.clone(),
        collaborators.quotas.clone(),
        JobSupervisor::new(pipeline),
        QuizSupport {
            enabled: collaborators.speech.is_some(),
            default_voice: config.speech.as_ref().and_then(|s| s.default_voice.clone()),
        },
    )
}
