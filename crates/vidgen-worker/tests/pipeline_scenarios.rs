//! End-to-end pipeline runs against in-memory collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;

use vidgen_firestore::{FinalMedia, FirestoreError, FirestoreResult, QuotaDecrement};
use vidgen_models::{
    AudioSegment, ChoiceLabel, Job, JobId, QuizChoices, QuizItem, UsageQuota,
};
use vidgen_notify::{EmailMessage, NotifyError, NotifyResult};
use vidgen_render::{Bundle, Composition, RemotionConfig, RenderEngine, RenderRequest, RenderResult};
use vidgen_storage::{StorageError, StorageResult, UploadedObject};
use vidgen_worker::{
    AudioMeter, Collaborators, IntakeError, IntakeService, JobOutcome, JobStore, JobSupervisor,
    NarrationSubmission, Notifier, ObjectStore, Pipeline, PipelineConfig, QuizSubmission,
    QuizSupport, QuotaStore, ReachabilityProbe, RenderConfig, Requester, SpeechSynthesizer, Stage,
    WorkerResult,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryJobs {
    jobs: Mutex<HashMap<String, Job>>,
    finalized: Mutex<Vec<(JobId, FinalMedia)>>,
    fail_finalize: AtomicBool,
}

impl MemoryJobs {
    fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobStore for MemoryJobs {
    async fn create_placeholder(&self, job: &Job) -> FirestoreResult<()> {
        self.jobs
            .lock()
            .unwrap()
            .insert(job.id.to_string(), job.clone());
        Ok(())
    }

    async fn finalize(&self, _user_id: &str, job_id: &JobId, media: &FinalMedia) -> FirestoreResult<()> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(FirestoreError::ServerError(503, "unavailable".into()));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| FirestoreError::not_found(job_id.to_string()))?;
        job.video_url = Some(media.video_url.clone());
        job.storage_key = Some(media.storage_key.clone());
        job.file_size = media.file_size;
        job.duration = media.duration;
        self.finalized
            .lock()
            .unwrap()
            .push((job_id.clone(), media.clone()));
        Ok(())
    }

    async fn delete(&self, _user_id: &str, job_id: &JobId) -> FirestoreResult<()> {
        self.jobs.lock().unwrap().remove(job_id.as_str());
        Ok(())
    }
}

struct MemoryQuota {
    remaining: AtomicU32,
    fail_decrement: AtomicBool,
}

impl MemoryQuota {
    fn new(remaining: u32) -> Self {
        Self {
            remaining: AtomicU32::new(remaining),
            fail_decrement: AtomicBool::new(false),
        }
    }

    fn quota(&self, user_id: &str) -> UsageQuota {
        let mut quota = UsageQuota::new(user_id, 10, Utc::now());
        quota.remaining = self.remaining.load(Ordering::SeqCst);
        quota
    }
}

#[async_trait]
impl QuotaStore for MemoryQuota {
    async fn current(&self, user_id: &str) -> FirestoreResult<UsageQuota> {
        Ok(self.quota(user_id))
    }

    async fn decrement(&self, user_id: &str) -> FirestoreResult<QuotaDecrement> {
        if self.fail_decrement.load(Ordering::SeqCst) {
            return Err(FirestoreError::PreconditionFailed("contention".into()));
        }
        let quota = self.quota(user_id);
        match quota.decremented() {
            Some(next) => {
                self.remaining.store(next.remaining, Ordering::SeqCst);
                Ok(QuotaDecrement::Consumed(next))
            }
            None => Ok(QuotaDecrement::Exhausted(quota)),
        }
    }
}

#[derive(Default)]
struct MemoryObjects {
    always_fail: AtomicBool,
    uploads: AtomicU32,
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<UploadedObject> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("connection reset"));
        }
        let size = tokio::fs::metadata(path).await?.len();
        Ok(UploadedObject {
            url: format!("https://media.example.com/{key}"),
            key: key.to_string(),
            size,
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::rejected(500, "mail server down"));
        }
        Ok(())
    }
}

struct EchoSpeech;

#[async_trait]
impl SpeechSynthesizer for EchoSpeech {
    async fn synthesize(&self, text: &str, _voice: &str) -> WorkerResult<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

/// One second per spoken segment.
struct OneSecondMeter;

#[async_trait]
impl AudioMeter for OneSecondMeter {
    async fn measure(&self, _path: &Path) -> Option<f64> {
        Some(1.0)
    }
}

struct FixedProbe(bool);

#[async_trait]
impl ReachabilityProbe for FixedProbe {
    async fn is_reachable(&self, _url: &str) -> bool {
        self.0
    }
}

#[derive(Default)]
struct FakeEngine {
    render_delay: Duration,
    panic_on_render: bool,
    requests: Mutex<Vec<RenderRequest>>,
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn bundle(&self, out_dir: &Path) -> RenderResult<Bundle> {
        tokio::fs::create_dir_all(out_dir).await?;
        tokio::fs::write(out_dir.join("index.html"), b"<html/>").await?;
        Ok(Bundle {
            dir: out_dir.to_path_buf(),
        })
    }

    async fn list_compositions(
        &self,
        _bundle: &Bundle,
        _props: &serde_json::Value,
    ) -> RenderResult<Vec<Composition>> {
        Ok(["SampleVideo", "QuizVideo"]
            .iter()
            .map(|id| Composition {
                id: id.to_string(),
                fps: 60,
                width: 1080,
                height: 1920,
                duration_in_frames: 150,
            })
            .collect())
    }

    async fn render(&self, _bundle: &Bundle, request: &RenderRequest) -> RenderResult<PathBuf> {
        self.requests.lock().unwrap().push(request.clone());
        if self.panic_on_render {
            panic!("renderer crashed");
        }
        tokio::time::sleep(self.render_delay).await;
        tokio::fs::write(&request.output, vec![0u8; 4096]).await?;
        Ok(request.output.clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _root: tempfile::TempDir,
    work_dir: PathBuf,
    public_dir: PathBuf,
    jobs: Arc<MemoryJobs>,
    quota: Arc<MemoryQuota>,
    objects: Arc<MemoryObjects>,
    notifier: Arc<RecordingNotifier>,
    engine: Arc<FakeEngine>,
    intake: IntakeService,
}

impl Harness {
    fn new(engine: FakeEngine) -> Self {
        Self::with(engine, MemoryQuota::new(3), true)
    }

    fn with(engine: FakeEngine, quota: MemoryQuota, probe_ok: bool) -> Self {
        Self::build(engine, quota, probe_ok, true)
    }

    /// No speech backend, so quiz support is off.
    fn without_speech() -> Self {
        Self::build(FakeEngine::default(), MemoryQuota::new(3), true, false)
    }

    fn build(engine: FakeEngine, quota: MemoryQuota, probe_ok: bool, speech: bool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("work");
        let public_dir = root.path().join("public");

        let jobs = Arc::new(MemoryJobs::default());
        let quota = Arc::new(quota);
        let objects = Arc::new(MemoryObjects::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Arc::new(engine);

        let collaborators = Collaborators {
            jobs: jobs.clone(),
            quotas: quota.clone(),
            objects: objects.clone(),
            notifier: notifier.clone(),
            speech: speech.then(|| Arc::new(EchoSpeech) as Arc<dyn SpeechSynthesizer>),
            probe: Arc::new(FixedProbe(probe_ok)),
            meter: Arc::new(OneSecondMeter),
            engine: engine.clone(),
        };
        let config = PipelineConfig::new("https://app.example.com", "media.example.com");
        let render = RenderConfig {
            remotion: RemotionConfig::new(".", "src/index.ts"),
            work_dir: work_dir.clone(),
            public_dir: public_dir.clone(),
        };
        let pipeline = Arc::new(Pipeline::new(&config, &render, &collaborators));
        let intake = IntakeService::new(
            jobs.clone(),
            quota.clone(),
            JobSupervisor::new(pipeline),
            QuizSupport {
                enabled: speech,
                default_voice: Some("rachel".to_string()),
            },
        );

        Self {
            _root: root,
            work_dir,
            public_dir,
            jobs,
            quota,
            objects,
            notifier,
            engine,
            intake,
        }
    }

    /// Files left in the work and public temp directories.
    fn leftover_files(&self) -> Vec<PathBuf> {
        [self.work_dir.clone(), self.public_dir.join("temp")]
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flatten()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect()
    }

    fn last_props(&self) -> serde_json::Value {
        self.engine
            .requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.props.clone())
            .unwrap()
    }
}

fn requester() -> Requester {
    Requester {
        user_id: "user-1".to_string(),
        email: Some("ada@example.com".to_string()),
    }
}

fn narration(segments: Vec<AudioSegment>) -> NarrationSubmission {
    NarrationSubmission {
        title: "Hello video".to_string(),
        voice: "nova".to_string(),
        segments,
        ..Default::default()
    }
}

fn hello_segment() -> AudioSegment {
    AudioSegment {
        text: "Hello world".to_string(),
        audio: STANDARD.encode(b"ID3-hello"),
        word_count: 2,
        duration: None,
    }
}

fn quiz_submission() -> QuizSubmission {
    QuizSubmission {
        title: "Planets".to_string(),
        topic: Some("astronomy".to_string()),
        question_count: Some(1),
        items: vec![
            QuizItem::Question {
                question: "Which planet is largest?".to_string(),
                choices: QuizChoices {
                    a: "Mars".into(),
                    b: "Venus".into(),
                    c: "Jupiter".into(),
                    d: "Earth".into(),
                },
                correct: ChoiceLabel::C,
                wait_time: Some(3),
                duration: None,
            },
            QuizItem::Text {
                content: "Thanks for playing".to_string(),
                duration: None,
            },
        ],
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_short_narration_renders_five_seconds() {
    let h = Harness::new(FakeEngine::default());
    let job = h
        .intake
        .submit_narration(&requester(), narration(vec![hello_segment()]))
        .await
        .unwrap();

    assert_eq!(job.accepted.estimated_completion, "2-5 minutes");
    assert_eq!(h.jobs.count(), 1);

    let outcome = job.task.await.unwrap();
    assert!(outcome.is_finalized(), "{outcome:?}");

    let request = h.engine.requests.lock().unwrap()[0].clone();
    assert_eq!(request.composition.id, "SampleVideo");
    assert_eq!(request.composition.duration_in_frames, 300);
    assert_eq!(request.preset.audio_bitrate, "320k");
    assert!((h.last_props()["durationInSeconds"].as_f64().unwrap() - 0.8).abs() < 1e-9);

    let finalized = h.jobs.finalized.lock().unwrap().clone();
    assert_eq!(finalized.len(), 1);
    let (job_id, media) = &finalized[0];
    assert_eq!(job_id, &job.accepted.job_id);
    assert_eq!(media.file_size, 4096);
    assert!((media.duration - 5.0).abs() < 1e-9);
    assert!(media.storage_key.starts_with("videos/user-1/"));
    assert!(media.storage_key.ends_with("-hello-video.mp4"));

    assert_eq!(h.notifier.subjects(), vec!["Your video \"Hello video\" is ready"]);
    assert!(h.leftover_files().is_empty(), "{:?}", h.leftover_files());
}

#[tokio::test]
async fn test_quiz_segments_render_in_order() {
    let h = Harness::new(FakeEngine::default());
    let job = h
        .intake
        .submit_quiz(&requester(), quiz_submission())
        .await
        .unwrap();
    assert_eq!(h.quota.remaining.load(Ordering::SeqCst), 2);

    let outcome = job.task.await.unwrap();
    assert!(outcome.is_finalized(), "{outcome:?}");

    let props = h.last_props();
    let kinds: Vec<&str> = props["segments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["question", "choices", "wait", "answer", "text"]);
    assert_eq!(props["segments"][2]["text"], "3, 2, 1");
    assert!(props["segments"][2].get("audioUrl").is_none());
    assert!(props["segments"][0]["audioUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://app.example.com/temp/"));

    let request = h.engine.requests.lock().unwrap()[0].clone();
    assert_eq!(request.composition.id, "QuizVideo");
    assert_eq!(request.preset.audio_bitrate, "192k");
    assert!(h.leftover_files().is_empty(), "{:?}", h.leftover_files());
}

#[tokio::test(start_paused = true)]
async fn test_render_timeout_fails_and_cleans_up() {
    let h = Harness::new(FakeEngine {
        render_delay: Duration::from_secs(600),
        ..Default::default()
    });
    let job = h
        .intake
        .submit_narration(&requester(), narration(vec![hello_segment()]))
        .await
        .unwrap();

    match job.task.await.unwrap() {
        JobOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Render);
            assert!(error.contains("timed out"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }

    assert!(h.leftover_files().is_empty(), "{:?}", h.leftover_files());
    assert!(h.jobs.finalized.lock().unwrap().is_empty());
    assert_eq!(h.notifier.subjects(), vec!["Video generation failed: Hello video (failed)"]);
}

#[tokio::test]
async fn test_quota_failure_leaves_job_count_unchanged() {
    let h = Harness::new(FakeEngine::default());
    h.quota.fail_decrement.store(true, Ordering::SeqCst);

    let err = h
        .intake
        .submit_quiz(&requester(), quiz_submission())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, IntakeError::Consistency(_)), "{err}");
    assert_eq!(h.jobs.count(), 0);
    assert!(h.engine.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_exhausted_quota_rejected_before_job_creation() {
    let h = Harness::with(FakeEngine::default(), MemoryQuota::new(0), true);
    let err = h
        .intake
        .submit_quiz(&requester(), quiz_submission())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, IntakeError::QuotaExceeded { .. }));
    assert_eq!(h.jobs.count(), 0);
}

#[tokio::test]
async fn test_quiz_without_speech_is_a_configuration_error() {
    let h = Harness::without_speech();
    let err = h
        .intake
        .submit_quiz(&requester(), quiz_submission())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, IntakeError::Configuration(_)), "{err}");
    assert_eq!(h.jobs.count(), 0);
    assert_eq!(h.quota.remaining.load(Ordering::SeqCst), 3);
    assert!(h.engine.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_narration_fails_in_background() {
    let h = Harness::new(FakeEngine::default());
    let job = h
        .intake
        .submit_narration(&requester(), narration(Vec::new()))
        .await
        .unwrap();

    match job.task.await.unwrap() {
        JobOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Audio);
            assert_eq!(error, "No audio segments provided");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_exhaustion_is_fatal() {
    let h = Harness::new(FakeEngine::default());
    h.objects.always_fail.store(true, Ordering::SeqCst);

    let job = h
        .intake
        .submit_narration(&requester(), narration(vec![hello_segment()]))
        .await
        .unwrap();

    match job.task.await.unwrap() {
        JobOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Upload);
            assert_eq!(error, "Upload failed after 3 attempts");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.objects.uploads.load(Ordering::SeqCst), 3);
    assert!(h.leftover_files().is_empty(), "{:?}", h.leftover_files());
}

#[tokio::test]
async fn test_panicking_render_is_compensated() {
    let h = Harness::new(FakeEngine {
        panic_on_render: true,
        ..Default::default()
    });
    let job = h
        .intake
        .submit_narration(&requester(), narration(vec![hello_segment()]))
        .await
        .unwrap();

    match job.task.await.unwrap() {
        JobOutcome::Failed { stage, error } => {
            assert_eq!(stage, Stage::Render);
            assert!(error.contains("renderer crashed"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(h.leftover_files().is_empty(), "{:?}", h.leftover_files());
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_update_failure_is_fatal() {
    let h = Harness::new(FakeEngine::default());
    h.jobs.fail_finalize.store(true, Ordering::SeqCst);

    let job = h
        .intake
        .submit_narration(&requester(), narration(vec![hello_segment()]))
        .await
        .unwrap();

    match job.task.await.unwrap() {
        JobOutcome::Failed { stage, .. } => assert_eq!(stage, Stage::Finalize),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(h.leftover_files().is_empty(), "{:?}", h.leftover_files());
    assert_eq!(
        h.notifier.subjects(),
        vec!["Video generation failed: Hello video (failed)"]
    );
}

#[tokio::test]
async fn test_unreachable_background_falls_back() {
    let h = Harness::with(FakeEngine::default(), MemoryQuota::new(3), false);
    let mut submission = narration(vec![hello_segment()]);
    submission.background_video = Some("https://media.example.com/backgrounds/gone.mp4".into());
    submission.background_music = Some("/music/calm.mp3".into());

    let job = h.intake.submit_narration(&requester(), submission).await.unwrap();
    assert!(job.task.await.unwrap().is_finalized());

    let props = h.last_props();
    assert!(props["backgroundVideoUrl"].is_null());
    assert_eq!(props["backgroundMusicUrl"], "https://app.example.com/music/calm.mp3");
    assert_eq!(props["style"]["fontFamily"], "Inter");
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_job() {
    let h = Harness::new(FakeEngine::default());
    h.notifier.fail.store(true, Ordering::SeqCst);

    let job = h
        .intake
        .submit_narration(&requester(), narration(vec![hello_segment()]))
        .await
        .unwrap();
    assert!(job.task.await.unwrap().is_finalized());
    assert_eq!(h.jobs.finalized.lock().unwrap().len(), 1);
}
