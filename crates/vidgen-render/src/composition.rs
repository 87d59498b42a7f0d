//! Compositions registered in a bundle.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Metadata of one composition as reported by `remotion compositions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub id: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub duration_in_frames: u32,
}

impl Composition {
    /// The same composition rendered for `frames` frames.
    pub fn with_duration_in_frames(mut self, frames: u32) -> Self {
        self.duration_in_frames = frames;
        self
    }

    /// Inclusive frame range argument, e.g. `0-299`.
    pub fn frame_range(&self) -> String {
        format!("0-{}", self.duration_in_frames.saturating_sub(1))
    }
}

/// Parse the table printed by `remotion compositions`.
///
/// Rows look like `SampleVideo  60  1080x1920  300 (5.00 sec)`; headers and
/// blank lines are skipped.
pub fn parse_compositions(output: &str) -> Vec<Composition> {
    output.lines().filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<Composition> {
    let mut cols = line.split_whitespace();
    let id = cols.next()?;
    let fps = cols.next()?.parse().ok()?;
    let (width, height) = cols.next()?.split_once('x')?;
    let duration_in_frames = cols.next()?.parse().ok()?;

    Some(Composition {
        id: id.to_string(),
        fps,
        width: width.parse().ok()?,
        height: height.parse().ok()?,
        duration_in_frames,
    })
}

/// Find `id` among `compositions`.
pub fn select(compositions: &[Composition], id: &str) -> RenderResult<Composition> {
    compositions
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .ok_or_else(|| RenderError::CompositionNotFound(id.to_string()))
}
