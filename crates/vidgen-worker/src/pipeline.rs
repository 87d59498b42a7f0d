//! The render pipeline for one accepted job.
//!
//! Audio (combine or synthesize) → background → render → upload → finalize,
//! strictly in order. The job's lifecycle is tracked by [`JobTracker`], which
//! only allows the forward transitions of [`JobState`].

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::json;

use vidgen_models::{AudioSegment, JobId, JobState, QuizItem, StyleParams, VideoVariant};
use vidgen_storage::video_key;

use crate::background::BackgroundResolver;
use crate::backends::{AudioMeter, Collaborators, SpeechSynthesizer};
use crate::combiner::{self, PublicAssets};
use crate::compensator::Compensator;
use crate::config::{PipelineConfig, RenderConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::finalizer::Finalizer;
use crate::logging::JobLogger;
use crate::orchestrator::RenderOrchestrator;
use crate::quiz;
use crate::retry::RetryConfig;
use crate::temp::TempFiles;
use crate::upload::UploadClient;

/// Who and what a job is, independent of its input.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub user_id: String,
    /// Notification address; no emails are sent without one
    pub recipient: Option<String>,
    pub title: String,
    pub variant: VideoVariant,
}

/// Variant-specific input.
#[derive(Debug, Clone)]
pub enum JobInput {
    Narration { segments: Vec<AudioSegment> },
    Quiz { items: Vec<QuizItem>, voice: String },
}

/// Everything the background task needs.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub context: JobContext,
    pub input: JobInput,
    pub style: StyleParams,
    pub background_video: Option<String>,
    pub background_music: Option<String>,
}

/// Pipeline step, for failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Audio,
    Background,
    Render,
    Upload,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Audio => "audio",
            Stage::Background => "background",
            Stage::Render => "render",
            Stage::Upload => "upload",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared view of a running job's state and stage.
///
/// The supervisor keeps a clone so it can tell where a panicked task died.
#[derive(Debug, Clone)]
pub struct JobTracker {
    inner: Arc<Mutex<(JobState, Stage)>>,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new((JobState::Placeholder, Stage::Audio))),
        }
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.snapshot().0
    }

    pub fn stage(&self) -> Stage {
        self.snapshot().1
    }

    fn snapshot(&self) -> (JobState, Stage) {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn enter(&self, stage: Stage) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.1 = stage;
        }
    }

    /// Move to `next`, rejecting anything the state machine forbids.
    pub fn advance(&self, next: JobState) -> WorkerResult<JobState> {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.0 = guard.0.transition(next)?;
        Ok(guard.0)
    }
}

/// Result of a successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedVideo {
    pub url: String,
    pub key: String,
    pub size: u64,
    /// Seconds of rendered video
    pub duration: f64,
}

pub struct Pipeline {
    assets: PublicAssets,
    background: BackgroundResolver,
    orchestrator: RenderOrchestrator,
    uploader: UploadClient,
    finalizer: Finalizer,
    compensator: Compensator,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    meter: Arc<dyn AudioMeter>,
    fps: u32,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, render: &RenderConfig, collaborators: &Collaborators) -> Self {
        let upload_retry = RetryConfig::new("upload_video")
            .with_max_attempts(config.upload_max_attempts)
            .with_backoff(config.upload_backoff_base, config.upload_backoff_max)
            .with_attempt_timeout(config.upload_attempt_timeout);

        Self {
            assets: PublicAssets::new(&render.public_dir, &config.asset_base_url),
            background: BackgroundResolver::new(
                &config.site_base_url,
                &config.storage_host,
                collaborators.probe.clone(),
                config.probe_timeout,
            ),
            orchestrator: RenderOrchestrator::new(
                collaborators.engine.clone(),
                &render.work_dir,
                config.render_timeout,
                config.fps,
            ),
            uploader: UploadClient::new(collaborators.objects.clone(), upload_retry),
            finalizer: Finalizer::new(
                collaborators.jobs.clone(),
                collaborators.notifier.clone(),
                &config.library_url,
            ),
            compensator: Compensator::new(collaborators.notifier.clone()),
            speech: collaborators.speech.clone(),
            meter: collaborators.meter.clone(),
            fps: config.fps,
        }
    }

    /// Run a job to completion. On error the caller must compensate.
    pub async fn run(
        &self,
        job: &RenderJob,
        tracker: &JobTracker,
        temp: &TempFiles,
    ) -> WorkerResult<FinishedVideo> {
        let ctx = &job.context;
        let log = JobLogger::new(&ctx.job_id, ctx.variant, &ctx.user_id);
        log.log_start(&ctx.title);

        tracker.enter(Stage::Audio);
        let (mut props, duration) = match &job.input {
            JobInput::Narration { segments } => {
                let audio = combiner::combine(segments, &self.assets, temp).await?;
                log.log_stage("audio", &format!("combined {} segments, {:.2}s", segments.len(), audio.duration));
                let segment_props: Vec<_> = segments
                    .iter()
                    .map(|s| json!({"text": s.text, "duration": s.effective_duration()}))
                    .collect();
                let props = json!({
                    "title": ctx.title,
                    "audioUrl": audio.url,
                    "durationInSeconds": audio.duration,
                    "segments": segment_props,
                });
                (props, audio.duration)
            }
            JobInput::Quiz { items, voice } => {
                let speech = self
                    .speech
                    .as_deref()
                    .ok_or_else(|| WorkerError::config_error("speech synthesis is not configured"))?;
                let mut segments = quiz::expand(items);
                quiz::synthesize(&mut segments, voice, speech, self.meter.as_ref(), &self.assets, temp)
                    .await?;
                let total = quiz::total_duration(&segments, items);
                log.log_stage("audio", &format!("synthesized {} segments, {:.2}s", segments.len(), total));
                let props = json!({
                    "title": ctx.title,
                    "durationInSeconds": total,
                    "segments": quiz::timeline(&segments, self.fps),
                });
                (props, total)
            }
        };

        tracker.enter(Stage::Background);
        let background_video = self.background.resolve(job.background_video.as_deref()).await;
        let background_music = self.background.resolve(job.background_music.as_deref()).await;
        if job.background_video.is_some() && background_video.is_none() {
            log.log_warning("background video unavailable, rendering with fallback");
        }
        if let Some(map) = props.as_object_mut() {
            map.insert("backgroundVideoUrl".to_string(), json!(background_video));
            map.insert("backgroundMusicUrl".to_string(), json!(background_music));
            map.insert("style".to_string(), serde_json::to_value(&job.style)?);
        }

        tracker.advance(JobState::Rendering)?;
        tracker.enter(Stage::Render);
        let rendered = self
            .orchestrator
            .render(&ctx.job_id, ctx.variant, &props, duration, temp)
            .await?;
        let rendered_seconds = rendered.frames as f64 / self.fps as f64;
        log.log_stage("render", &format!("{} frames", rendered.frames));

        tracker.advance(JobState::Uploading)?;
        tracker.enter(Stage::Upload);
        let key = video_key(&ctx.user_id, &ctx.job_id, &ctx.title);
        let uploaded = self
            .uploader
            .upload(&rendered.path, &key)
            .await
            .ok_or(WorkerError::UploadExhausted {
                attempts: self.uploader.max_attempts(),
            })?;

        tracker.enter(Stage::Finalize);
        self.finalizer
            .finalize(ctx, &uploaded, rendered_seconds, temp)
            .await?;
        tracker.advance(JobState::Finalized)?;
        log.log_completion(&uploaded.url);

        Ok(FinishedVideo {
            url: uploaded.url,
            key: uploaded.key,
            size: uploaded.size,
            duration: rendered_seconds,
        })
    }

    /// Clean up after a failed job and notify the user.
    pub async fn compensate(&self, ctx: &JobContext, err: &WorkerError, temp: &TempFiles) {
        self.compensator.compensate(ctx, err, temp).await;
    }
}
