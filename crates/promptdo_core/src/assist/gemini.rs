//! Gemini HTTP client.
//!
//! # Responsibility
//! - Send `generateContent` requests over HTTPS with the configured key.
//! - Map transport, status and decode failures to `AssistError`.
//!
//! # Invariants
//! - The API key is sent in a header and never logged.
//! - Log lines carry operation, model, status and timing only.

use super::audio::SpeechAudio;
use super::wire::{self, GenerateContentRequest, GenerateContentResponse};
use super::{AssistError, AssistProvider, AssistResult, SubtaskDraft};
use crate::config::GeminiSettings;
use crate::model::todo::ResearchResult;
use log::{error, info};
use reqwest::blocking::Client;
use std::time::{Duration, Instant};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Blocking Gemini client implementing `AssistProvider`.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    settings: GeminiSettings,
}

impl GeminiClient {
    /// Builds a client from settings.
    ///
    /// # Errors
    /// - `MissingApiKey` when no non-blank key is configured.
    /// - `Transport` when the HTTP client cannot be constructed.
    pub fn new(settings: GeminiSettings) -> AssistResult<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AssistError::MissingApiKey)?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("promptdo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key,
            settings,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn generate(
        &self,
        op: &'static str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> AssistResult<GenerateContentResponse> {
        let started_at = Instant::now();
        let result = self.send(model, request);
        match &result {
            Ok(_) => info!(
                "event=assist_request module=assist op={op} model={model} status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=assist_request module=assist op={op} model={model} status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn send(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> AssistResult<GenerateContentResponse> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(AssistError::Status {
                code: status.as_u16(),
                message: wire::error_message(&body),
            });
        }

        let parsed = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}

impl AssistProvider for GeminiClient {
    fn break_down(&self, task_text: &str) -> AssistResult<Vec<SubtaskDraft>> {
        let response = self.generate(
            "break_down",
            &self.settings.subtask_model,
            &wire::break_down_request(task_text),
        )?;
        wire::parse_subtasks(&response)
    }

    fn research(&self, topic: &str) -> AssistResult<ResearchResult> {
        let response = self.generate(
            "research",
            &self.settings.research_model,
            &wire::research_request(topic),
        )?;
        Ok(wire::parse_research(&response))
    }

    fn speak(&self, text: &str) -> AssistResult<SpeechAudio> {
        if text.trim().is_empty() {
            return Ok(SpeechAudio::empty());
        }
        let response = self.generate(
            "speak",
            &self.settings.speech_model,
            &wire::speech_request(text, &self.settings.voice),
        )?;
        wire::parse_speech(&response)
    }
}
