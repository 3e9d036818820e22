//! Gemini `generateContent` request/response shapes.
//!
//! # Responsibility
//! - Build request bodies for the three assist operations.
//! - Extract subtasks, grounded research and inline audio from responses.
//!
//! # Invariants
//! - Only fields this crate reads are modelled; unknown fields are ignored.
//! - Pure functions only; no I/O here so fixtures can drive the tests.

use super::audio::SpeechAudio;
use super::{AssistError, AssistResult, SubtaskDraft};
use crate::model::todo::{ResearchResult, ResearchSource};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    /// Set on reasoning parts that are not part of the answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl GenerateContentResponse {
    fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Concatenated answer text of the first candidate.
    pub fn text(&self) -> String {
        self.first_candidate()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// First inline data part of the first candidate.
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|part| part.inline_data.as_ref())
    }
}

fn user_prompt(text: String) -> Vec<Content> {
    vec![Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: Some(text),
            ..Part::default()
        }],
    }]
}

/// Request for structured task decomposition.
pub fn break_down_request(task_text: &str) -> GenerateContentRequest {
    let prompt = format!(
        "Break down the following to-do item into a list of smaller, actionable sub-tasks. \
         Provide the response as a JSON array of objects, where each object has 'text' and \
         'completed' properties. The 'completed' property should be false. Task: \"{task_text}\""
    );
    GenerateContentRequest {
        contents: user_prompt(prompt),
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(subtask_schema()),
            ..GenerationConfig::default()
        }),
        tools: Vec::new(),
    }
}

fn subtask_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "text": {
                    "type": "STRING",
                    "description": "The text of the sub-task."
                },
                "completed": {
                    "type": "BOOLEAN",
                    "description": "The completion status of the sub-task."
                }
            },
            "required": ["text", "completed"]
        }
    })
}

/// Request for a search-grounded topic summary.
pub fn research_request(topic: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: user_prompt(format!(
            "Research the following topic and provide a concise summary. Topic: \"{topic}\""
        )),
        generation_config: None,
        tools: vec![json!({ "googleSearch": {} })],
    }
}

/// Request for single-voice speech synthesis.
pub fn speech_request(text: &str, voice_name: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: user_prompt(format!("Read the following to-do list: {text}")),
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: Some(json!({
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice_name }
                }
            })),
            ..GenerationConfig::default()
        }),
        tools: Vec::new(),
    }
}

/// Parses the JSON array answer of a decomposition request.
///
/// Tolerates a fenced code block around the array.
pub fn parse_subtasks(response: &GenerateContentResponse) -> AssistResult<Vec<SubtaskDraft>> {
    let text = response.text();
    let json_text = strip_code_fence(text.trim());
    if json_text.is_empty() {
        return Err(AssistError::Decode("empty decomposition response".to_string()));
    }
    let drafts: Vec<SubtaskDraft> = serde_json::from_str(json_text)?;
    Ok(drafts)
}

/// Extracts summary text and cited web sources.
///
/// Sources missing a uri or title are dropped; order is preserved.
pub fn parse_research(response: &GenerateContentResponse) -> ResearchResult {
    let sources = response
        .first_candidate()
        .and_then(|candidate| candidate.grounding_metadata.as_ref())
        .map(|metadata| {
            metadata
                .grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| match (web.uri.as_deref(), web.title.as_deref()) {
                    (Some(uri), Some(title)) if !uri.is_empty() && !title.is_empty() => {
                        Some(ResearchSource {
                            uri: uri.to_string(),
                            title: title.to_string(),
                        })
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    ResearchResult {
        summary: response.text(),
        sources,
    }
}

/// Decodes the inline audio of a speech response.
pub fn parse_speech(response: &GenerateContentResponse) -> AssistResult<SpeechAudio> {
    let inline = response
        .inline_data()
        .filter(|inline| !inline.data.is_empty())
        .ok_or(AssistError::EmptyAudio)?;
    let data = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|err| AssistError::Decode(format!("invalid base64 audio: {err}")))?;
    Ok(SpeechAudio::from_inline(inline.mime_type.as_deref(), data))
}

/// Best-effort message from an error response body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{status}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.chars().take(200).collect(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
