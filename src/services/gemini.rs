use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{env_string, env_u64, normalize_endpoint};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_API_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Marker the service embeds in failure details when a prompt or response is
/// rejected by its safety filters.
const SAFETY_MARKER: &str = "SAFETY";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let api_key = env_string("GEMINI_API_KEY");
        let model = env_string("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_endpoint = normalize_endpoint(
            env_string("GEMINI_API_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("GEMINI_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        Self { api_key, model, api_endpoint, timeout }
    }
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("content blocked by safety settings")]
    SafetyBlocked,
    #[error("empty model response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), inline_data: None }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type: mime_type.into(), data: data.into() }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Some("user".to_string()), parts }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self { role: Some("model".to_string()), parts }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { role: None, parts: vec![Part::text(text)] }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, or `None` when the response
    /// carries no text at all.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let mut out = String::new();
        for part in &content.parts {
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    pub fn safety_blocked(&self) -> bool {
        let feedback_blocked = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
            .is_some_and(|r| r.contains(SAFETY_MARKER));
        let candidate_blocked = self
            .candidates
            .iter()
            .filter_map(|c| c.finish_reason.as_deref())
            .any(|r| r.contains(SAFETY_MARKER));
        feedback_blocked || candidate_blocked
    }
}

/// Client for the generative model API. One instance per session; cheap to
/// clone (shares the underlying connection pool).
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::from_env())
    }

    pub fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
            && !self.config.api_endpoint.trim().is_empty()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_key(&self) -> Result<&str, GeminiError> {
        self.config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(GeminiError::NotConfigured("GEMINI_API_KEY"))
    }

    fn model_url(&self, operation: &str) -> String {
        format!("{}/models/{}:{}", self.config.api_endpoint, self.config.model, operation)
    }

    /// Single request, single response. No retry: every failure is terminal
    /// for the call and propagated to the caller.
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let api_key = self.api_key()?;
        let url = self.model_url("generateContent");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if body.contains(SAFETY_MARKER) {
                return Err(GeminiError::SafetyBlocked);
            }
            return Err(GeminiError::HttpStatus { status, body });
        }

        let response: GenerateContentResponse = serde_json::from_slice(&resp.bytes().await?)?;
        if response.safety_blocked() {
            return Err(GeminiError::SafetyBlocked);
        }
        Ok(response)
    }

    /// Opens a streamed reply and returns a lazy, single-pass chunk source.
    /// The stream cannot be restarted; abandoning it mid-way is allowed and
    /// leaves the connection to be torn down on drop.
    pub async fn stream_generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<TextChunkStream, GeminiError> {
        let api_key = self.api_key()?;
        let url = format!("{}?alt=sse", self.model_url("streamGenerateContent"));

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if body.contains(SAFETY_MARKER) {
                return Err(GeminiError::SafetyBlocked);
            }
            return Err(GeminiError::HttpStatus { status, body });
        }

        Ok(TextChunkStream::new(resp))
    }
}

/// Incremental text fragments of one streamed model reply, decoded from
/// server-sent events. Single-pass: once `next_chunk` returns `None` or an
/// error the stream is exhausted.
pub struct TextChunkStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buf: String,
    pending: VecDeque<String>,
    done: bool,
}

impl TextChunkStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            inner: Box::pin(response.bytes_stream()),
            buf: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    pub async fn next_chunk(&mut self) -> Option<Result<String, GeminiError>> {
        loop {
            if let Some(text) = self.pending.pop_front() {
                return Some(Ok(text));
            }
            if self.done {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(bytes)) => {
                    self.buf.push_str(&String::from_utf8_lossy(&bytes));
                    if let Err(err) = self.drain_lines() {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(GeminiError::Request(err)));
                }
                None => {
                    self.done = true;
                    let tail = std::mem::take(&mut self.buf);
                    if let Err(err) = self.consume_line(tail.trim()) {
                        return Some(Err(err));
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Result<(), GeminiError> {
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            self.consume_line(line.trim())?;
        }
        Ok(())
    }

    fn consume_line(&mut self, line: &str) -> Result<(), GeminiError> {
        let Some(payload) = sse_data(line) else {
            return Ok(());
        };
        if payload == "[DONE]" {
            self.done = true;
            return Ok(());
        }
        if let Some(text) = chunk_text(payload)? {
            self.pending.push_back(text);
        }
        Ok(())
    }
}

/// Extracts the payload of an SSE `data:` line; comment and event lines are
/// skipped.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Decodes one streamed event payload into its text fragment. A fragment-less
/// event (metadata only) yields `Ok(None)`.
pub(crate) fn chunk_text(payload: &str) -> Result<Option<String>, GeminiError> {
    let response: GenerateContentResponse = serde_json::from_str(payload)?;
    if response.safety_blocked() {
        return Err(GeminiError::SafetyBlocked);
    }
    Ok(response.text())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_payload(text: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    #[test]
    fn sse_data_extracts_payload() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data(": keep-alive"), None);
        assert_eq!(sse_data(""), None);
    }

    #[test]
    fn chunk_text_yields_fragment() {
        let text = chunk_text(&chunk_payload("Hello ")).unwrap();
        assert_eq!(text.as_deref(), Some("Hello "));
    }

    #[test]
    fn chunk_text_skips_metadata_only_events() {
        let payload = serde_json::json!({ "candidates": [] }).to_string();
        assert!(chunk_text(&payload).unwrap().is_none());
    }

    #[test]
    fn chunk_text_surfaces_malformed_payload() {
        assert!(matches!(chunk_text("{not json"), Err(GeminiError::Json(_))));
    }

    #[test]
    fn chunk_text_detects_safety_rejection() {
        let payload = serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })
        .to_string();
        assert!(matches!(chunk_text(&payload), Err(GeminiError::SafetyBlocked)));
    }

    #[test]
    fn response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "foo" }, { "text": "bar" }] }
            }]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("foobar"));
    }

    #[test]
    fn prompt_feedback_block_reason_is_safety() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(response.safety_blocked());
    }

    #[test]
    fn request_serializes_camel_case_wire_fields() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::inline_data("application/pdf", "AAAA"),
                Part::text("prompt"),
            ])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(serde_json::json!({ "type": "OBJECT" })),
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert!(value.get("systemInstruction").is_none());
    }
}
