//! Segment combiner: inline narration audio into one servable MP3.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;
use uuid::Uuid;

use vidgen_models::AudioSegment;

use crate::error::{WorkerError, WorkerResult};
use crate::temp::TempFiles;

/// Writes temp assets under the public directory so the renderer can fetch
/// them over HTTP.
#[derive(Debug, Clone)]
pub struct PublicAssets {
    public_dir: PathBuf,
    base_url: String,
}

impl PublicAssets {
    pub fn new(public_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            public_dir: public_dir.into(),
            base_url: base_url.into(),
        }
    }

    /// Write `bytes` to `temp/<prefix>-<uuid>.mp3` and track it.
    pub async fn write_mp3(
        &self,
        prefix: &str,
        bytes: &[u8],
        temp: &TempFiles,
    ) -> WorkerResult<(PathBuf, String)> {
        let name = format!("{prefix}-{}.mp3", Uuid::new_v4());
        let dir = self.public_dir.join("temp");
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(&name);
        temp.track(&path);
        tokio::fs::write(&path, bytes).await?;

        let url = format!("{}/temp/{}", self.base_url.trim_end_matches('/'), name);
        Ok((path, url))
    }
}

/// Result of combining narration segments.
#[derive(Debug, Clone)]
pub struct CombinedAudio {
    pub path: PathBuf,
    pub url: String,
    /// Seconds
    pub duration: f64,
}

/// Decode a base64 payload, with or without a `data:` URL prefix.
pub fn decode_payload(audio: &str) -> WorkerResult<Vec<u8>> {
    let encoded = match audio.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| WorkerError::invalid_audio("data URL without payload"))?,
        None => audio,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| WorkerError::invalid_audio(e.to_string()))
}

/// Sum of per-segment durations, falling back to the word-count estimate.
pub fn total_duration(segments: &[AudioSegment]) -> f64 {
    segments.iter().map(AudioSegment::effective_duration).sum()
}

/// Concatenate segment audio in order into a single temp MP3.
pub async fn combine(
    segments: &[AudioSegment],
    assets: &PublicAssets,
    temp: &TempFiles,
) -> WorkerResult<CombinedAudio> {
    if segments.is_empty() {
        return Err(WorkerError::NoAudioProvided);
    }

    let mut bytes = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let decoded = decode_payload(&segment.audio).map_err(|e| match e {
            WorkerError::InvalidAudio(msg) => {
                WorkerError::invalid_audio(format!("segment {index}: {msg}"))
            }
            other => other,
        })?;
        bytes.extend_from_slice(&decoded);
    }

    let duration = total_duration(segments);
    let (path, url) = assets.write_mp3("audio", &bytes, temp).await?;
    debug!(
        segments = segments.len(),
        bytes = bytes.len(),
        duration,
        "Combined narration audio"
    );

    Ok(CombinedAudio {
        path,
        url,
        duration,
    })
}
