//! Collaborator seams for the pipeline and their production implementations.
//!
//! The pipeline only talks to these traits, so tests can swap in in-memory
//! fakes for Firestore, R2, the email API, the speech API and the renderer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use vidgen_firestore::{
    FinalMedia, FirestoreClient, FirestoreResult, JobRepository, QuotaDecrement,
    UsageQuotaRepository,
};
use vidgen_models::{Job, JobId, UsageQuota};
use vidgen_notify::{EmailClient, EmailMessage, NotifyResult};
use vidgen_render::{probe_duration, RemotionEngine, RenderEngine};
use vidgen_storage::{R2Client, StorageResult, UploadedObject};

use crate::config::VidgenConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::speech::SpeechClient;

/// Persisted job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_placeholder(&self, job: &Job) -> FirestoreResult<()>;

    async fn finalize(
        &self,
        user_id: &str,
        job_id: &JobId,
        media: &FinalMedia,
    ) -> FirestoreResult<()>;

    async fn delete(&self, user_id: &str, job_id: &JobId) -> FirestoreResult<()>;
}

/// Per-user quiz quota.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn current(&self, user_id: &str) -> FirestoreResult<UsageQuota>;

    async fn decrement(&self, user_id: &str) -> FirestoreResult<QuotaDecrement>;
}

/// Durable storage for finished videos.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload and return the public URL, key and confirmed size.
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<UploadedObject>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()>;
}

/// Text to MP3 bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> WorkerResult<Vec<u8>>;
}

/// Whether a URL currently serves content.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Measured playback length of a local audio file.
#[async_trait]
pub trait AudioMeter: Send + Sync {
    async fn measure(&self, path: &Path) -> Option<f64>;
}

/// Firestore-backed [`JobStore`].
pub struct FirestoreJobStore {
    client: FirestoreClient,
}

impl FirestoreJobStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn repo(&self, user_id: &str) -> JobRepository {
        JobRepository::new(self.client.clone(), user_id)
    }
}

#[async_trait]
impl JobStore for FirestoreJobStore {
    async fn create_placeholder(&self, job: &Job) -> FirestoreResult<()> {
        self.repo(&job.user_id).create_placeholder(job).await
    }

    async fn finalize(
        &self,
        user_id: &str,
        job_id: &JobId,
        media: &FinalMedia,
    ) -> FirestoreResult<()> {
        self.repo(user_id).finalize(job_id, media).await
    }

    async fn delete(&self, user_id: &str, job_id: &JobId) -> FirestoreResult<()> {
        self.repo(user_id).delete(job_id).await
    }
}

#[async_trait]
impl QuotaStore for UsageQuotaRepository {
    async fn current(&self, user_id: &str) -> FirestoreResult<UsageQuota> {
        UsageQuotaRepository::current(self, user_id).await
    }

    async fn decrement(&self, user_id: &str) -> FirestoreResult<QuotaDecrement> {
        UsageQuotaRepository::decrement(self, user_id).await
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<UploadedObject> {
        self.upload_file(path, key, "video/mp4").await
    }
}

#[async_trait]
impl Notifier for EmailClient {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        let id = EmailClient::send(self, message).await?;
        debug!(to = %message.to, id = id.as_deref().unwrap_or("-"), "Email accepted");
        Ok(())
    }
}

/// HEAD-request reachability check.
pub struct HttpProbe {
    http: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> WorkerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => {
                debug!(url, status = response.status().as_u16(), "Probed asset");
                response.status().is_success()
            }
            Err(e) => {
                debug!(url, error = %e, "Asset probe failed");
                false
            }
        }
    }
}

/// [`AudioMeter`] backed by ffprobe.
pub struct FfprobeMeter;

#[async_trait]
impl AudioMeter for FfprobeMeter {
    async fn measure(&self, path: &Path) -> Option<f64> {
        match probe_duration(path).await {
            Ok(seconds) => Some(seconds),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not probe audio duration");
                None
            }
        }
    }
}

/// Everything the pipeline and intake talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub jobs: Arc<dyn JobStore>,
    pub quotas: Arc<dyn QuotaStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
    /// Absent when no speech provider is configured
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub meter: Arc<dyn AudioMeter>,
    pub engine: Arc<dyn RenderEngine>,
}

impl Collaborators {
    /// Production collaborators for a validated configuration.
    pub async fn from_config(config: &VidgenConfig) -> WorkerResult<Self> {
        let firestore = FirestoreClient::new(config.firestore.clone()).await?;
        let email = EmailClient::new(config.email.clone())?;
        let speech = match &config.speech {
            Some(speech) => {
                Some(Arc::new(SpeechClient::new(speech.clone())?) as Arc<dyn SpeechSynthesizer>)
            }
            None => None,
        };

        Ok(Self {
            jobs: Arc::new(FirestoreJobStore::new(firestore.clone())),
            quotas: Arc::new(UsageQuotaRepository::new(
                firestore,
                config.pipeline.quiz_monthly_limit,
            )),
            objects: Arc::new(R2Client::new(config.r2.clone())),
            notifier: Arc::new(email),
            speech,
            probe: Arc::new(HttpProbe::new(config.pipeline.probe_timeout)?),
            meter: Arc::new(FfprobeMeter),
            engine: Arc::new(RemotionEngine::new(config.render.remotion.clone())),
        })
    }
}
