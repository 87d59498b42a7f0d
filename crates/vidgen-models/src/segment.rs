//! Narration audio segments.

use serde::{Deserialize, Serialize};

/// Seconds of narration assumed per word when no duration is known.
pub const SECONDS_PER_WORD: f64 = 0.4;

/// One timed unit of narration with its synthesized audio inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSegment {
    /// Narration text
    pub text: String,

    /// Base64-encoded audio payload (optionally a `data:` URL)
    pub audio: String,

    /// Word count of the source text
    pub word_count: u32,

    /// Explicit duration in seconds, when the synthesizer reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl AudioSegment {
    /// Declared duration, falling back to the word-count estimate.
    pub fn effective_duration(&self) -> f64 {
        self.duration
            .unwrap_or_else(|| self.word_count as f64 * SECONDS_PER_WORD)
    }
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Word-count duration estimate for a piece of narration.
pub fn estimate_seconds(text: &str) -> f64 {
    word_count(text) as f64 * SECONDS_PER_WORD
}
