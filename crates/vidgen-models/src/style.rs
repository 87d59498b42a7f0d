//! Visual styling and job metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quiz::QuizItem;

/// Caption alignment on the vertical frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Caption entrance animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAnimation {
    None,
    #[default]
    Fade,
    Pop,
    Typewriter,
    Slide,
}

/// Styling parameters forwarded to the composition as input props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StyleParams {
    #[serde(default = "default_font_family")]
    pub font_family: String,

    #[serde(default = "default_font_color")]
    pub font_color: String,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    #[serde(default)]
    pub text_alignment: TextAlignment,

    /// Background blur radius in pixels
    #[serde(default)]
    pub background_blur: u32,

    #[serde(default)]
    pub text_animation: TextAnimation,
}

fn default_font_family() -> String {
    "Inter".to_string()
}
fn default_font_color() -> String {
    "#FFFFFF".to_string()
}
fn default_font_size() -> u32 {
    64
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_color: default_font_color(),
            font_size: default_font_size(),
            text_alignment: TextAlignment::default(),
            background_blur: 0,
            text_animation: TextAnimation::default(),
        }
    }
}

/// Parameters persisted in a job's metadata blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobMetadata {
    /// Voice used for synthesis
    pub voice: String,

    #[serde(default)]
    pub style: StyleParams,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_video: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<String>,

    /// Narration script (single-narration jobs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Quiz topic (quiz jobs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,

    /// Authored quiz items (quiz jobs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quiz_items: Vec<QuizItem>,
}

impl JobMetadata {
    /// Serialize into the opaque blob stored on the job.
    pub fn to_blob(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
