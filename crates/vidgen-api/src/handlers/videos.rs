//! Video submission handlers.
//!
//! Both endpoints validate the request, hand it to the intake service and
//! answer as soon as the job record exists. Rendering continues in the
//! background; the outcome arrives by email and in the user's library.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use vidgen_models::{word_count, AudioSegment, QuizItem, StyleParams};
use vidgen_worker::{Accepted, NarrationSubmission, QuizSubmission};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One narrated segment with its synthesized audio inline.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRequest {
    #[validate(length(max = 5000))]
    pub text: String,
    /// Base64 MP3, optionally as a `data:` URL
    #[validate(length(min = 1, message = "must contain audio"))]
    pub audio: String,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl From<SegmentRequest> for AudioSegment {
    fn from(req: SegmentRequest) -> Self {
        let words = req.word_count.unwrap_or_else(|| word_count(&req.text));
        AudioSegment {
            text: req.text,
            audio: req.audio,
            word_count: words,
            duration: req.duration.filter(|d| d.is_finite() && *d > 0.0),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NarrationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Full narration text the segments were cut from
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub script: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub voice: String,
    #[serde(default)]
    #[validate(nested)]
    pub segments: Vec<SegmentRequest>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub background_video: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub background_music: Option<String>,
    #[serde(default)]
    pub style: StyleParams,
}

impl From<NarrationRequest> for NarrationSubmission {
    fn from(req: NarrationRequest) -> Self {
        NarrationSubmission {
            title: req.title,
            description: req.description,
            script: req.script,
            voice: req.voice,
            segments: req.segments.into_iter().map(AudioSegment::from).collect(),
            background_video: req.background_video,
            background_music: req.background_music,
            style: req.style,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub topic: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub difficulty: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 50))]
    pub question_count: Option<u32>,
    /// Falls back to the configured default voice
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub voice: Option<String>,
    #[validate(length(min = 1, max = 50, message = "must hold between 1 and 50 items"))]
    pub items: Vec<QuizItem>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub background_video: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub background_music: Option<String>,
    #[serde(default)]
    pub style: StyleParams,
}

impl From<QuizRequest> for QuizSubmission {
    fn from(req: QuizRequest) -> Self {
        QuizSubmission {
            title: req.title,
            description: req.description,
            topic: req.topic,
            difficulty: req.difficulty,
            question_count: req.question_count,
            voice: req.voice,
            items: req.items,
            background_video: req.background_video,
            background_music: req.background_music,
            style: req.style,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub message: String,
    pub estimated_completion: String,
}

impl From<Accepted> for SubmitResponse {
    fn from(accepted: Accepted) -> Self {
        Self {
            job_id: accepted.job_id.to_string(),
            message: accepted.message,
            estimated_completion: accepted.estimated_completion.to_string(),
        }
    }
}

/// POST /api/videos/narration
pub async fn submit_narration(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<NarrationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;
    info!(
        uid = %user.uid,
        segments = request.segments.len(),
        "Narration render requested"
    );

    let job = state
        .intake
        .submit_narration(&user.requester(), request.into())
        .await?;
    // The supervisor owns the task from here; dropping the handle detaches it.
    Ok((StatusCode::ACCEPTED, Json(job.accepted.into())))
}

/// POST /api/videos/quiz
pub async fn submit_quiz(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;
    info!(
        uid = %user.uid,
        items = request.items.len(),
        "Quiz render requested"
    );

    let job = state
        .intake
        .submit_quiz(&user.requester(), request.into())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job.accepted.into())))
}
