//! Shared data models for the vidgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and their lifecycle state machine
//! - Narration audio segments and duration estimates
//! - Quiz items and their expanded narration segments
//! - Styling parameters and render encoding presets
//! - Per-user usage quotas

pub mod encoding;
pub mod job;
pub mod quiz;
pub mod quota;
pub mod segment;
pub mod style;

// Re-export common types
pub use encoding::{
    frame_count, CompositionId, RenderPreset, VideoVariant, MIN_RENDER_SECONDS, OUTPUT_FPS,
    OUTPUT_HEIGHT, OUTPUT_WIDTH,
};
pub use job::{InvalidTransition, Job, JobId, JobState};
pub use quiz::{
    ChoiceLabel, QuizAudioSegment, QuizChoices, QuizItem, QuizSegmentKind, DEFAULT_WAIT_SECONDS,
    MAX_ITEM_SECONDS, MAX_WAIT_SECONDS,
};
pub use quota::UsageQuota;
pub use segment::{estimate_seconds, word_count, AudioSegment, SECONDS_PER_WORD};
pub use style::{JobMetadata, StyleParams, TextAlignment, TextAnimation};
