//! Text-to-speech client (ElevenLabs-compatible API).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::backends::SpeechSynthesizer;
use crate::config::SpeechConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryConfig, RetryResult};

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Synthesizes MP3 narration over HTTP.
pub struct SpeechClient {
    http: Client,
    config: SpeechConfig,
    retry: RetryConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("speech HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            retry: RetryConfig::new("speech_synthesis"),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, voice: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.api_base.trim_end_matches('/'),
            urlencode(voice)
        )
    }

    async fn request_once(&self, text: &str, voice: &str) -> WorkerResult<Vec<u8>> {
        let response = self
            .http
            .post(self.endpoint(voice))
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.config.model_id,
            })
            .send()
            .await
            .map_err(|e| WorkerError::speech_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::speech_failed(format!(
                "{} {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkerError::speech_failed(e.to_string()))?;
        if bytes.is_empty() {
            return Err(WorkerError::speech_failed("empty audio response"));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str, voice: &str) -> WorkerResult<Vec<u8>> {
        let voice = match voice.trim() {
            "" => self.config.default_voice.as_deref().unwrap_or_default(),
            v => v,
        };
        if voice.is_empty() {
            return Err(WorkerError::speech_failed("no voice given and no default voice"));
        }

        let result = retry_async(&self.retry, |_| self.request_once(text, voice), |_, _| {}).await;
        match result {
            RetryResult::Success { value, attempts } => {
                debug!(voice, bytes = value.len(), attempts, "Synthesized speech");
                Ok(value)
            }
            RetryResult::Failed { error, attempts } => Err(WorkerError::speech_failed(format!(
                "{error} (after {attempts} attempts)"
            ))),
        }
    }
}

fn urlencode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
