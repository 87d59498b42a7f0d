//! Remotion CLI wrapper for rendering compositions.
//!
//! This crate provides:
//! - The `RenderEngine` seam (bundle, list compositions, render)
//! - `RemotionEngine`, which drives the `remotion` CLI with timeouts
//! - Composition table parsing and render progress parsing
//! - `probe_duration` for measuring synthesized audio with ffprobe

pub mod command;
pub mod composition;
pub mod engine;
pub mod error;
pub mod probe;
pub mod progress;

pub use command::{ProcessOutput, ProcessRunner, RemotionCommand};
pub use composition::{parse_compositions, Composition};
pub use engine::{Bundle, RemotionConfig, RemotionEngine, RenderEngine, RenderRequest};
pub use error::{RenderError, RenderResult};
pub use probe::probe_duration;
pub use progress::{RenderProgress, RenderStage};
