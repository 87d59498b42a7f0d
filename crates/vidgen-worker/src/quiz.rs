//! Quiz segment expansion, synthesis and timing.

use serde::Serialize;
use tracing::{debug, warn};

use vidgen_models::{QuizAudioSegment, QuizItem, QuizSegmentKind};

use crate::backends::{AudioMeter, SpeechSynthesizer};
use crate::combiner::PublicAssets;
use crate::error::WorkerResult;
use crate::metrics::record_speech_segment;
use crate::temp::TempFiles;

/// Countdown narration for a wait of `seconds`, e.g. `"5, 4, 3, 2, 1"`.
pub fn countdown_text(seconds: u32) -> String {
    (1..=seconds)
        .rev()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered narration segments for the quiz items.
///
/// A question becomes question, choices, wait and answer; a text item
/// becomes a single text segment.
pub fn expand(items: &[QuizItem]) -> Vec<QuizAudioSegment> {
    let mut segments = Vec::with_capacity(items.len() * 4);
    for (index, item) in items.iter().enumerate() {
        match item {
            QuizItem::Question {
                question, choices, ..
            } => {
                let wait = item.wait_seconds();
                segments.push(QuizAudioSegment::spoken(
                    QuizSegmentKind::Question,
                    index,
                    question.clone(),
                ));
                segments.push(QuizAudioSegment::spoken(
                    QuizSegmentKind::Choices,
                    index,
                    choices.narration(),
                ));
                segments.push(QuizAudioSegment::wait(index, countdown_text(wait), wait));
                if let Some(answer) = item.answer_narration() {
                    segments.push(QuizAudioSegment::spoken(
                        QuizSegmentKind::Answer,
                        index,
                        answer,
                    ));
                }
            }
            QuizItem::Text { content, .. } => {
                segments.push(QuizAudioSegment::spoken(
                    QuizSegmentKind::Text,
                    index,
                    content.clone(),
                ));
            }
        }
    }
    segments
}

/// Synthesize every spoken segment, write it to a temp asset and measure it.
///
/// Wait segments keep their fixed duration and get no audio. When a file
/// cannot be measured the word-count estimate stands.
pub async fn synthesize(
    segments: &mut [QuizAudioSegment],
    voice: &str,
    speech: &dyn SpeechSynthesizer,
    meter: &dyn AudioMeter,
    assets: &PublicAssets,
    temp: &TempFiles,
) -> WorkerResult<()> {
    for (position, segment) in segments.iter_mut().enumerate() {
        if !segment.kind.is_spoken() || segment.text.trim().is_empty() {
            continue;
        }

        let audio = speech.synthesize(&segment.text, voice).await?;
        let prefix = format!("quiz-{position:03}-{}", segment.kind.as_str());
        let (path, url) = assets.write_mp3(&prefix, &audio, temp).await?;

        match meter.measure(&path).await {
            Some(seconds) => {
                segment.duration = seconds;
                record_speech_segment(true);
            }
            None => {
                warn!(
                    position,
                    kind = segment.kind.as_str(),
                    estimate = segment.duration,
                    "Could not measure synthesized audio, using estimate"
                );
                record_speech_segment(false);
            }
        }
        segment.audio_url = Some(url);
        debug!(position, kind = segment.kind.as_str(), duration = segment.duration, "Synthesized quiz segment");
    }
    Ok(())
}

/// `max(Σ segment durations, Σ declared item durations)`.
pub fn total_duration(segments: &[QuizAudioSegment], items: &[QuizItem]) -> f64 {
    let measured: f64 = segments.iter().map(|s| s.duration).sum();
    let declared: f64 = items.iter().map(QuizItem::declared_duration).sum();
    measured.max(declared)
}

/// One segment placed on the composition timeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedSegment {
    pub kind: QuizSegmentKind,
    pub item_index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub start_frame: u32,
    pub duration_in_frames: u32,
}

/// Lay segments end to end at `fps`. Frame boundaries come from the running
/// total so rounding never opens gaps between segments.
pub fn timeline(segments: &[QuizAudioSegment], fps: u32) -> Vec<TimedSegment> {
    let fps = fps as f64;
    let mut elapsed = 0.0;
    segments
        .iter()
        .map(|segment| {
            let start = (elapsed * fps).floor() as u32;
            elapsed += segment.duration.max(0.0);
            let end = (elapsed * fps).floor() as u32;
            TimedSegment {
                kind: segment.kind,
                item_index: segment.item_index,
                text: segment.text.clone(),
                audio_url: segment.audio_url.clone(),
                start_frame: start,
                duration_in_frames: end - start,
            }
        })
        .collect()
}
