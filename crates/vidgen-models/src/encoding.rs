//! Output format and render encoding presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output frame width
pub const OUTPUT_WIDTH: u32 = 1080;
/// Output frame height
pub const OUTPUT_HEIGHT: u32 = 1920;
/// Output frame rate
pub const OUTPUT_FPS: u32 = 60;
/// Shortest video ever rendered, in seconds
pub const MIN_RENDER_SECONDS: f64 = 5.0;

/// Default video codec (H.264)
pub const DEFAULT_CODEC: &str = "h264";
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Software rasterizer used by the headless browser
pub const DEFAULT_GL_RENDERER: &str = "swangle";

/// Composition registered in the render project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum CompositionId {
    SampleVideo,
    QuizVideo,
}

impl CompositionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionId::SampleVideo => "SampleVideo",
            CompositionId::QuizVideo => "QuizVideo",
        }
    }
}

impl fmt::Display for CompositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two job variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoVariant {
    /// One narration track over a background
    Narration,
    /// Question / choices / countdown / answer sequence
    Quiz,
}

impl VideoVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoVariant::Narration => "narration",
            VideoVariant::Quiz => "quiz",
        }
    }

    pub fn composition(&self) -> CompositionId {
        match self {
            VideoVariant::Narration => CompositionId::SampleVideo,
            VideoVariant::Quiz => CompositionId::QuizVideo,
        }
    }

    pub fn preset(&self) -> RenderPreset {
        match self {
            VideoVariant::Narration => RenderPreset::with_audio_bitrate("320k"),
            VideoVariant::Quiz => RenderPreset::with_audio_bitrate("192k"),
        }
    }

    /// Human-readable completion window returned on acceptance.
    pub fn estimated_completion(&self) -> &'static str {
        match self {
            VideoVariant::Narration => "2-5 minutes",
            VideoVariant::Quiz => "3-8 minutes",
        }
    }
}

impl fmt::Display for VideoVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed encoding parameters for one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RenderPreset {
    pub codec: String,
    pub pixel_format: String,
    pub audio_bitrate: String,
    pub muted: bool,
    /// Browser tabs rendering in parallel
    pub concurrency: u32,
    pub gl_renderer: String,
    /// Render every n-th frame; 1 renders all frames
    pub every_nth_frame: u32,
}

impl RenderPreset {
    pub fn with_audio_bitrate(audio_bitrate: impl Into<String>) -> Self {
        Self {
            codec: DEFAULT_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            audio_bitrate: audio_bitrate.into(),
            muted: false,
            concurrency: 1,
            gl_renderer: DEFAULT_GL_RENDERER.to_string(),
            every_nth_frame: 1,
        }
    }
}

/// Frame count for a video of `duration` seconds, never shorter than the minimum.
pub fn frame_count(duration: f64, fps: u32) -> u32 {
    (duration.max(MIN_RENDER_SECONDS) * fps as f64).floor() as u32
}
