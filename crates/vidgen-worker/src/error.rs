//! Worker error types.

use thiserror::Error;

use vidgen_render::RenderError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No audio segments provided")]
    NoAudioProvided,

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("Speech synthesis failed: {0}")]
    SpeechFailed(String),

    #[error("Composition not found: {0}")]
    CompositionNotFound(String),

    #[error("Render timed out after {0}s")]
    RenderTimeout(u64),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Upload failed after {attempts} attempts")]
    UploadExhausted { attempts: u32 },

    #[error("Failed to finalize job record: {0}")]
    Finalize(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    InvalidTransition(#[from] vidgen_models::InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] vidgen_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] vidgen_firestore::FirestoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] vidgen_notify::NotifyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for WorkerError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::CompositionNotFound(id) => Self::CompositionNotFound(id),
            RenderError::Timeout(secs) => Self::RenderTimeout(secs),
            RenderError::CommandFailed { ref stderr, .. } => {
                match stderr.as_deref().and_then(|s| s.lines().last()) {
                    Some(last) if !last.trim().is_empty() => {
                        Self::RenderFailed(format!("{err}: {}", last.trim()))
                    }
                    _ => Self::RenderFailed(err.to_string()),
                }
            }
            other => Self::RenderFailed(other.to_string()),
        }
    }
}

impl WorkerError {
    pub fn invalid_audio(msg: impl Into<String>) -> Self {
        Self::InvalidAudio(msg.into())
    }

    pub fn speech_failed(msg: impl Into<String>) -> Self {
        Self::SpeechFailed(msg.into())
    }

    pub fn finalize(msg: impl Into<String>) -> Self {
        Self::Finalize(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoAudioProvided => "no_audio",
            Self::InvalidAudio(_) => "invalid_audio",
            Self::SpeechFailed(_) => "speech",
            Self::CompositionNotFound(_) => "composition_not_found",
            Self::RenderTimeout(_) => "render_timeout",
            Self::RenderFailed(_) => "render",
            Self::UploadExhausted { .. } => "upload_exhausted",
            Self::Finalize(_) => "finalize",
            Self::ConfigError(_) => "config",
            Self::Panicked(_) => "panic",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Storage(_) => "storage",
            Self::Firestore(_) => "firestore",
            Self::Notify(_) => "notify",
            Self::Json(_) => "json",
            Self::Io(_) => "io",
        }
    }

    /// Whether the job must stop here and go to compensation.
    ///
    /// A single failed storage attempt is transient: the upload loop retries
    /// it and only reports `UploadExhausted` once attempts run out.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
