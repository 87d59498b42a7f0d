//! Job records and their lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::encoding::VideoVariant;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle state of a job.
///
/// `Placeholder -> Rendering -> Uploading -> Finalized`, or any non-terminal
/// state straight to `Failed`. `Finalized` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Record exists, no media yet
    #[default]
    Placeholder,
    /// Audio prepared, render in progress
    Rendering,
    /// Rendered file is being pushed to storage
    Uploading,
    /// Record updated with final media
    Finalized,
    /// Compensated failure
    Failed,
}

/// Attempted a transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid job state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Placeholder => "placeholder",
            JobState::Rendering => "rendering",
            JobState::Uploading => "uploading",
            JobState::Finalized => "finalized",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finalized | JobState::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Placeholder, JobState::Rendering) => true,
            (JobState::Rendering, JobState::Uploading) => true,
            (JobState::Uploading, JobState::Finalized) => true,
            (from, JobState::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(self, next: JobState) -> Result<JobState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted video-generation job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning user
    pub user_id: String,

    /// Which composition family this job renders
    pub variant: VideoVariant,

    /// User-supplied title
    pub title: String,

    /// Optional user-supplied description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Styling, voice and source parameters, stored opaquely
    #[serde(default)]
    #[schemars(with = "serde_json::Value")]
    pub metadata: serde_json::Value,

    /// Public location of the final video (set on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Object-storage key of the final video (set on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    /// Confirmed size in bytes (0 until success)
    #[serde(default)]
    pub file_size: u64,

    /// Duration in seconds (estimate until success, final afterwards)
    #[serde(default)]
    pub duration: f64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a placeholder record: no location, no key, zero size.
    pub fn new_placeholder(
        user_id: impl Into<String>,
        variant: VideoVariant,
        title: impl Into<String>,
        description: Option<String>,
        metadata: serde_json::Value,
        estimated_duration: f64,
    ) -> Self {
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            variant,
            title: title.into(),
            description,
            metadata,
            video_url: None,
            storage_key: None,
            file_size: 0,
            duration: estimated_duration,
            created_at: Utc::now(),
        }
    }

    /// Whether the record has been filled in with final media.
    pub fn is_placeholder(&self) -> bool {
        self.video_url.is_none() && self.storage_key.is_none()
    }
}
