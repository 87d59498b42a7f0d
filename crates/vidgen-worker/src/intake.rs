//! Job intake: validate, charge quota, create the placeholder, start the task.
//!
//! Everything here runs on the request path. Once the placeholder exists the
//! caller gets the job id back and the render continues in the background.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use vidgen_firestore::QuotaDecrement;
use vidgen_models::{
    AudioSegment, Job, JobId, JobMetadata, QuizItem, StyleParams, VideoVariant,
    MAX_ITEM_SECONDS, MAX_WAIT_SECONDS,
};

use crate::backends::{JobStore, QuotaStore};
use crate::compensator::rollback_placeholder;
use crate::metrics::{record_intake_rejected, record_job_accepted};
use crate::pipeline::{JobContext, JobInput, RenderJob};
use crate::supervisor::{JobOutcome, JobSupervisor};

const MAX_TITLE_CHARS: usize = 200;
const MAX_QUIZ_ITEMS: usize = 50;

/// Errors returned synchronously to the submitter.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Service not configured: {0}")]
    Configuration(String),

    #[error("Monthly quiz limit reached; resets {reset_date}")]
    QuotaExceeded { reset_date: DateTime<Utc> },

    #[error("Could not record usage for this job: {0}")]
    Consistency(String),

    #[error("Job store unavailable: {0}")]
    Store(String),
}

impl IntakeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::QuotaExceeded { .. } => "quota",
            Self::Consistency(_) => "consistency",
            Self::Store(_) => "store",
        }
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NarrationSubmission {
    pub title: String,
    pub description: Option<String>,
    pub script: Option<String>,
    pub voice: String,
    pub segments: Vec<AudioSegment>,
    pub background_video: Option<String>,
    pub background_music: Option<String>,
    pub style: StyleParams,
}

#[derive(Debug, Clone, Default)]
pub struct QuizSubmission {
    pub title: String,
    pub description: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub question_count: Option<u32>,
    /// Blank falls back to the configured default voice
    pub voice: Option<String>,
    pub items: Vec<QuizItem>,
    pub background_video: Option<String>,
    pub background_music: Option<String>,
    pub style: StyleParams,
}

/// Response for an accepted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub job_id: JobId,
    pub message: String,
    pub estimated_completion: &'static str,
}

/// An accepted job and its supervised task.
pub struct AcceptedJob {
    pub accepted: Accepted,
    pub task: JoinHandle<JobOutcome>,
}

/// Whether quiz jobs can run, and with which fallback voice.
#[derive(Debug, Clone, Default)]
pub struct QuizSupport {
    pub enabled: bool,
    pub default_voice: Option<String>,
}

pub struct IntakeService {
    jobs: Arc<dyn JobStore>,
    quotas: Arc<dyn QuotaStore>,
    supervisor: JobSupervisor,
    quiz: QuizSupport,
}

impl IntakeService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        quotas: Arc<dyn QuotaStore>,
        supervisor: JobSupervisor,
        quiz: QuizSupport,
    ) -> Self {
        Self {
            jobs,
            quotas,
            supervisor,
            quiz,
        }
    }

    pub async fn submit_narration(
        &self,
        requester: &Requester,
        submission: NarrationSubmission,
    ) -> IntakeResult<AcceptedJob> {
        self.narration_job(requester, submission)
            .await
            .inspect_err(|e| record_intake_rejected(e.reason()))
    }

    pub async fn submit_quiz(
        &self,
        requester: &Requester,
        submission: QuizSubmission,
    ) -> IntakeResult<AcceptedJob> {
        self.quiz_job(requester, submission)
            .await
            .inspect_err(|e| record_intake_rejected(e.reason()))
    }

    async fn narration_job(
        &self,
        requester: &Requester,
        submission: NarrationSubmission,
    ) -> IntakeResult<AcceptedJob> {
        let title = validate_title(&submission.title)?;

        let estimate: f64 = submission
            .segments
            .iter()
            .map(AudioSegment::effective_duration)
            .sum();
        let metadata = JobMetadata {
            voice: submission.voice.clone(),
            style: submission.style.clone(),
            background_video: submission.background_video.clone(),
            background_music: submission.background_music.clone(),
            script: submission.script.clone(),
            ..Default::default()
        };
        let job = Job::new_placeholder(
            &requester.user_id,
            VideoVariant::Narration,
            title,
            submission.description.clone(),
            metadata.to_blob(),
            estimate,
        );

        self.create_placeholder(&job).await?;

        Ok(self.start(
            requester,
            &job,
            JobInput::Narration {
                segments: submission.segments,
            },
            submission.style,
            submission.background_video,
            submission.background_music,
        ))
    }

    async fn quiz_job(
        &self,
        requester: &Requester,
        submission: QuizSubmission,
    ) -> IntakeResult<AcceptedJob> {
        if !self.quiz.enabled {
            return Err(IntakeError::Configuration(
                "speech synthesis is not configured".to_string(),
            ));
        }
        let title = validate_title(&submission.title)?;
        validate_quiz_items(&submission.items, submission.question_count)?;
        let voice = submission
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| self.quiz.default_voice.clone())
            .ok_or_else(|| IntakeError::validation("voice is required"))?;

        let quota = self
            .quotas
            .current(&requester.user_id)
            .await
            .map_err(|e| IntakeError::Store(e.to_string()))?;
        if !quota.has_remaining() {
            return Err(IntakeError::QuotaExceeded {
                reset_date: quota.reset_date,
            });
        }

        let estimate: f64 = submission.items.iter().map(QuizItem::declared_duration).sum();
        let metadata = JobMetadata {
            voice: voice.clone(),
            style: submission.style.clone(),
            background_video: submission.background_video.clone(),
            background_music: submission.background_music.clone(),
            topic: submission.topic.clone(),
            difficulty: submission.difficulty.clone(),
            question_count: submission.question_count,
            quiz_items: submission.items.clone(),
            ..Default::default()
        };
        let job = Job::new_placeholder(
            &requester.user_id,
            VideoVariant::Quiz,
            title,
            submission.description.clone(),
            metadata.to_blob(),
            estimate,
        );

        self.create_placeholder(&job).await?;
        self.charge_quota(&job).await?;

        Ok(self.start(
            requester,
            &job,
            JobInput::Quiz {
                items: submission.items,
                voice,
            },
            submission.style,
            submission.background_video,
            submission.background_music,
        ))
    }

    async fn create_placeholder(&self, job: &Job) -> IntakeResult<()> {
        self.jobs
            .create_placeholder(job)
            .await
            .map_err(|e| IntakeError::Store(e.to_string()))
    }

    /// Decrement the quota for a freshly created quiz placeholder. If that
    /// fails the placeholder is deleted so the user's job list is unchanged.
    async fn charge_quota(&self, job: &Job) -> IntakeResult<()> {
        let failure = match self.quotas.decrement(&job.user_id).await {
            Ok(QuotaDecrement::Consumed(quota)) => {
                info!(job_id = %job.id, remaining = quota.remaining, "Charged quiz quota");
                return Ok(());
            }
            Ok(QuotaDecrement::Exhausted(quota)) => {
                format!("quota ran out concurrently (resets {})", quota.reset_date)
            }
            Err(e) => e.to_string(),
        };

        warn!(job_id = %job.id, error = %failure, "Quota decrement failed, removing placeholder");
        rollback_placeholder(self.jobs.as_ref(), &job.user_id, &job.id).await;
        Err(IntakeError::Consistency(failure))
    }

    fn start(
        &self,
        requester: &Requester,
        job: &Job,
        input: JobInput,
        style: StyleParams,
        background_video: Option<String>,
        background_music: Option<String>,
    ) -> AcceptedJob {
        let task = self.supervisor.spawn(RenderJob {
            context: JobContext {
                job_id: job.id.clone(),
                user_id: requester.user_id.clone(),
                recipient: requester.email.clone(),
                title: job.title.clone(),
                variant: job.variant,
            },
            input,
            style,
            background_video,
            background_music,
        });

        record_job_accepted(job.variant.as_str());
        info!(job_id = %job.id, variant = job.variant.as_str(), "Accepted job");

        AcceptedJob {
            accepted: Accepted {
                job_id: job.id.clone(),
                message: format!(
                    "Your {} video is being generated. We'll email you when it's ready.",
                    job.variant.as_str()
                ),
                estimated_completion: job.variant.estimated_completion(),
            },
            task,
        }
    }
}

fn validate_title(title: &str) -> IntakeResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(IntakeError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(IntakeError::validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_quiz_items(items: &[QuizItem], question_count: Option<u32>) -> IntakeResult<()> {
    if items.is_empty() {
        return Err(IntakeError::validation("quiz needs at least one item"));
    }
    if items.len() > MAX_QUIZ_ITEMS {
        return Err(IntakeError::validation(format!(
            "quiz may have at most {MAX_QUIZ_ITEMS} items"
        )));
    }
    if let Some(count) = question_count {
        if count == 0 || count as usize > MAX_QUIZ_ITEMS {
            return Err(IntakeError::validation(format!(
                "question_count must be between 1 and {MAX_QUIZ_ITEMS}"
            )));
        }
    }

    for (index, item) in items.iter().enumerate() {
        if let Some(duration) = item.authored_duration() {
            if !duration.is_finite() || duration <= 0.0 || duration > MAX_ITEM_SECONDS {
                return Err(IntakeError::validation(format!(
                    "item {index}: duration must be between 0 and {MAX_ITEM_SECONDS} seconds"
                )));
            }
        }
        match item {
            QuizItem::Question {
                question,
                choices,
                wait_time,
                ..
            } => {
                if wait_time.is_some_and(|w| w > MAX_WAIT_SECONDS) {
                    return Err(IntakeError::validation(format!(
                        "item {index}: wait_time must be at most {MAX_WAIT_SECONDS} seconds"
                    )));
                }
                if question.trim().is_empty() {
                    return Err(IntakeError::validation(format!(
                        "item {index}: question text is empty"
                    )));
                }
                if [&choices.a, &choices.b, &choices.c, &choices.d]
                    .iter()
                    .any(|c| c.trim().is_empty())
                {
                    return Err(IntakeError::validation(format!(
                        "item {index}: every choice needs text"
                    )));
                }
            }
            QuizItem::Text { content, .. } => {
                if content.trim().is_empty() {
                    return Err(IntakeError::validation(format!(
                        "item {index}: text is empty"
                    )));
                }
            }
        }
    }
    Ok(())
}
