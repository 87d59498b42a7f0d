//! Quiz items and their expanded narration segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::segment::estimate_seconds;

/// Wait time used when a question does not specify one.
pub const DEFAULT_WAIT_SECONDS: u32 = 5;

/// Longest countdown a question may ask for.
pub const MAX_WAIT_SECONDS: u32 = 60;

/// Longest pacing an item may declare, in seconds.
pub const MAX_ITEM_SECONDS: f64 = 600.0;

/// Label of one of the four answer choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ChoiceLabel {
    A,
    B,
    C,
    D,
}

impl ChoiceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceLabel::A => "A",
            ChoiceLabel::B => "B",
            ChoiceLabel::C => "C",
            ChoiceLabel::D => "D",
        }
    }
}

impl fmt::Display for ChoiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four labeled choices of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuizChoices {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl QuizChoices {
    /// Text of the choice with the given label.
    pub fn get(&self, label: ChoiceLabel) -> &str {
        match label {
            ChoiceLabel::A => &self.a,
            ChoiceLabel::B => &self.b,
            ChoiceLabel::C => &self.c,
            ChoiceLabel::D => &self.d,
        }
    }

    /// Spoken form: `"A: <A>. B: <B>. C: <C>. D: <D>"`.
    pub fn narration(&self) -> String {
        format!(
            "A: {}. B: {}. C: {}. D: {}",
            self.a, self.b, self.c, self.d
        )
    }
}

/// One authored quiz item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizItem {
    Question {
        question: String,
        choices: QuizChoices,
        correct: ChoiceLabel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_time: Option<u32>,
        /// Intended pacing for the whole item, in seconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
}

impl QuizItem {
    /// Wait time in seconds for question items (default applied), 0 for text.
    pub fn wait_seconds(&self) -> u32 {
        match self {
            QuizItem::Question { wait_time, .. } => wait_time.unwrap_or(DEFAULT_WAIT_SECONDS),
            QuizItem::Text { .. } => 0,
        }
    }

    /// Authored pacing, if any.
    pub fn authored_duration(&self) -> Option<f64> {
        match self {
            QuizItem::Question { duration, .. } | QuizItem::Text { duration, .. } => *duration,
        }
    }

    /// Spoken reveal of the correct answer, `None` for text items.
    pub fn answer_narration(&self) -> Option<String> {
        match self {
            QuizItem::Question {
                choices, correct, ..
            } => Some(format!(
                "The correct answer is {}: {}",
                correct,
                choices.get(*correct)
            )),
            QuizItem::Text { .. } => None,
        }
    }

    /// Raw declared duration: the authored value, else the word-count
    /// estimate of all spoken parts plus the wait period.
    pub fn declared_duration(&self) -> f64 {
        match self {
            QuizItem::Question {
                question,
                choices,
                duration,
                ..
            } => duration.unwrap_or_else(|| {
                let answer = self.answer_narration().unwrap_or_default();
                estimate_seconds(question)
                    + estimate_seconds(&choices.narration())
                    + estimate_seconds(&answer)
                    + self.wait_seconds() as f64
            }),
            QuizItem::Text { content, duration } => {
                duration.unwrap_or_else(|| estimate_seconds(content))
            }
        }
    }
}

/// Role of an expanded quiz segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuizSegmentKind {
    Question,
    Choices,
    Wait,
    Answer,
    Text,
}

impl QuizSegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizSegmentKind::Question => "question",
            QuizSegmentKind::Choices => "choices",
            QuizSegmentKind::Wait => "wait",
            QuizSegmentKind::Answer => "answer",
            QuizSegmentKind::Text => "text",
        }
    }

    /// Whether audio is synthesized for this kind.
    pub fn is_spoken(&self) -> bool {
        !matches!(self, QuizSegmentKind::Wait)
    }
}

/// One pipeline segment derived from a quiz item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAudioSegment {
    pub kind: QuizSegmentKind,

    /// Index of the source item
    pub item_index: usize,

    /// Narration (or on-screen countdown for waits)
    pub text: String,

    /// Synthesized audio bytes; never set for waits
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,

    /// Fetchable location of the audio once written out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Duration in seconds (explicit for waits, measured after synthesis)
    pub duration: f64,
}

impl QuizAudioSegment {
    /// A spoken segment awaiting synthesis, with its word-count estimate.
    pub fn spoken(kind: QuizSegmentKind, item_index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let duration = estimate_seconds(&text);
        Self {
            kind,
            item_index,
            text,
            audio: None,
            audio_url: None,
            duration,
        }
    }

    /// A silent countdown segment.
    pub fn wait(item_index: usize, text: impl Into<String>, seconds: u32) -> Self {
        Self {
            kind: QuizSegmentKind::Wait,
            item_index,
            text: text.into(),
            audio: None,
            audio_url: None,
            duration: seconds as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question(wait_time: Option<u32>) -> QuizItem {
        QuizItem::Question {
            question: "What is the capital of France?".to_string(),
            choices: QuizChoices {
                a: "Berlin".to_string(),
                b: "Paris".to_string(),
                c: "Rome".to_string(),
                d: "Madrid".to_string(),
            },
            correct: ChoiceLabel::B,
            wait_time,
            duration: None,
        }
    }

    #[test]
    fn test_choices_narration() {
        let QuizItem::Question { choices, .. } = sample_question(None) else {
            panic!("expected question");
        };
        assert_eq!(
            choices.narration(),
            "A: Berlin. B: Paris. C: Rome. D: Madrid"
        );
    }

    #[test]
    fn test_answer_narration() {
        assert_eq!(
            sample_question(None).answer_narration().unwrap(),
            "The correct answer is B: Paris"
        );
    }

    #[test]
    fn test_wait_default() {
        assert_eq!(sample_question(None).wait_seconds(), DEFAULT_WAIT_SECONDS);
        assert_eq!(sample_question(Some(3)).wait_seconds(), 3);
    }

    #[test]
    fn test_declared_duration_prefers_authored_value() {
        let item = QuizItem::Text {
            content: "Welcome to the quiz".to_string(),
            duration: Some(7.0),
        };
        assert!((item.declared_duration() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_declared_duration_includes_wait() {
        let item = sample_question(Some(3));
        // 6 + 8 + 6 words plus 3 seconds of waiting
        assert!((item.declared_duration() - (20.0 * 0.4 + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_item_deserializes_from_tagged_json() {
        let json = serde_json::json!({
            "type": "question",
            "question": "2 + 2?",
            "choices": {"A": "3", "B": "4", "C": "5", "D": "22"},
            "correct": "B",
            "wait_time": 4
        });
        let item: QuizItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.wait_seconds(), 4);

        let text: QuizItem =
            serde_json::from_value(serde_json::json!({"type": "text", "content": "Hi"})).unwrap();
        assert!(matches!(text, QuizItem::Text { .. }));
    }
}
