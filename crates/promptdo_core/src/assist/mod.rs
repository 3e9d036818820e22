//! External AI assistance.
//!
//! # Responsibility
//! - Define the provider contract the services depend on.
//! - Keep provider wire details (`wire`) and HTTP transport (`gemini`)
//!   behind that contract.
//!
//! # Invariants
//! - Providers are stateless pass-throughs; caching lives in the service.
//! - Provider calls never retry. A failure is returned to the caller as-is.

pub mod audio;
pub mod gemini;
pub mod wire;

use crate::model::todo::ResearchResult;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use audio::SpeechAudio;
pub use gemini::GeminiClient;

pub type AssistResult<T> = Result<T, AssistError>;

/// Subtask as returned by the provider, before it gets a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtaskDraft {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// AI operations used by the to-do services.
pub trait AssistProvider {
    /// Splits one task into smaller actionable steps.
    fn break_down(&self, task_text: &str) -> AssistResult<Vec<SubtaskDraft>>;
    /// Produces a search-grounded summary with cited sources.
    fn research(&self, topic: &str) -> AssistResult<ResearchResult>;
    /// Synthesizes speech for `text`. Blank text yields empty audio.
    fn speak(&self, text: &str) -> AssistResult<SpeechAudio>;
}

impl<P: AssistProvider + ?Sized> AssistProvider for &P {
    fn break_down(&self, task_text: &str) -> AssistResult<Vec<SubtaskDraft>> {
        (**self).break_down(task_text)
    }

    fn research(&self, topic: &str) -> AssistResult<ResearchResult> {
        (**self).research(topic)
    }

    fn speak(&self, text: &str) -> AssistResult<SpeechAudio> {
        (**self).speak(text)
    }
}

/// Provider call failure.
#[derive(Debug)]
pub enum AssistError {
    /// No API key configured.
    MissingApiKey,
    /// Connection, TLS or timeout failure.
    Transport(reqwest::Error),
    /// Provider answered with a non-success HTTP status.
    Status { code: u16, message: String },
    /// Response body did not have the expected shape.
    Decode(String),
    /// Speech response carried no inline audio.
    EmptyAudio,
}

impl Display for AssistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(
                f,
                "API key is not set; export GEMINI_API_KEY or add it to config.json"
            ),
            Self::Transport(err) => write!(f, "request failed: {err}"),
            Self::Status { code, message } => write!(f, "provider returned HTTP {code}: {message}"),
            Self::Decode(message) => write!(f, "unexpected provider response: {message}"),
            Self::EmptyAudio => write!(f, "no audio data received from provider"),
        }
    }
}

impl Error for AssistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AssistError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

impl From<serde_json::Error> for AssistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
