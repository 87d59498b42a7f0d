//! FFprobe duration measurement.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{RenderError, RenderResult};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Duration in seconds of an audio or video file.
pub async fn probe_duration(path: impl AsRef<Path>) -> RenderResult<f64> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RenderError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| RenderError::BinaryNotFound("ffprobe".to_string()))?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(RenderError::ProbeFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    parse_duration(&output.stdout)
}

fn parse_duration(json: &[u8]) -> RenderResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| RenderError::ProbeFailed("no duration in ffprobe output".to_string()))
}
