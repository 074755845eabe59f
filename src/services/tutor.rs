use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::models::{Role, TutorMessage};
use crate::services::gemini::{
    Content, GeminiClient, GeminiError, GenerateContentRequest, Part, TextChunkStream,
};

/// First transcript entry of every session; shown before any exchange.
pub const TUTOR_GREETING: &str =
    "Hello! I'm your AI tutor. Ask me anything about your study material.";

/// Seeded when tutoring starts before any document has been processed.
const FALLBACK_CONTEXT: &str =
    "General knowledge. The user hasn't uploaded a document yet, but be a helpful tutor.";

/// Message surfaced when a reply stream fails; the session itself survives.
pub const TUTOR_UNAVAILABLE_MESSAGE: &str = "Sorry, I couldn't get a response. Please try again.";

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("tutor request failed: {0}")]
    Gemini(#[from] GeminiError),
}

/// Advisory cancellation flag for one streamed reply. Checked between chunks;
/// it cannot interrupt an in-flight network read, only stop further local
/// application of later chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn system_instruction(context: &str) -> String {
    format!(
        "You are an expert AI tutor. Your role is to help the user understand their study \
material. The user has uploaded a document, and here is its summary:\n\n---\n{context}\n---\n\n\
Answer the user's questions based on this context. Be helpful, encouraging, and clear in your \
explanations. If a question is outside the scope of the document, politely state that you can \
only answer questions related to the provided material."
    )
}

/// One conversational tutoring session, seeded with document context and
/// owned by the orchestrator. Replacing the session (after a new generation)
/// discards the old transcript; only one conversation is active at a time.
pub struct TutorSession {
    client: GeminiClient,
    system_instruction: String,
    transcript: Vec<TutorMessage>,
}

impl TutorSession {
    /// `context` is the generated summary; `None` seeds the general-knowledge
    /// fallback so tutoring works before any document is processed.
    pub fn new(client: GeminiClient, context: Option<&str>) -> Self {
        Self {
            client,
            system_instruction: system_instruction(context.unwrap_or(FALLBACK_CONTEXT)),
            transcript: vec![TutorMessage { role: Role::Model, text: TUTOR_GREETING.to_string() }],
        }
    }

    pub fn transcript(&self) -> &[TutorMessage] {
        &self.transcript
    }

    /// Conversation history as wire contents. The greeting (and anything else
    /// before the first user turn) is display-only and not sent; an empty
    /// trailing model placeholder is likewise skipped.
    fn request_contents(&self) -> Vec<Content> {
        self.transcript
            .iter()
            .skip_while(|m| m.role == Role::Model)
            .filter(|m| !(m.role == Role::Model && m.text.is_empty()))
            .map(|m| match m.role {
                Role::User => Content::user(vec![Part::text(m.text.clone())]),
                Role::Model => Content::model(vec![Part::text(m.text.clone())]),
            })
            .collect()
    }

    /// Sends a user message and opens the streamed reply.
    ///
    /// On success the transcript gains the user turn plus an empty model
    /// placeholder that the caller grows via [`apply_chunk`]. On failure the
    /// user turn stays but no placeholder is added, so nothing needs rolling
    /// back.
    ///
    /// [`apply_chunk`]: TutorSession::apply_chunk
    pub async fn ask(&mut self, message: &str) -> Result<TutorReply, TutorError> {
        self.transcript.push(TutorMessage { role: Role::User, text: message.to_string() });

        let request = GenerateContentRequest {
            contents: self.request_contents(),
            system_instruction: Some(Content::system(self.system_instruction.clone())),
            generation_config: None,
        };

        let stream = self.client.stream_generate_content(&request).await?;

        self.transcript.push(TutorMessage { role: Role::Model, text: String::new() });
        Ok(TutorReply { stream, cancel: CancelToken::new() })
    }

    /// Grows the in-flight model reply in place. Text applied before an
    /// abandonment stays in the transcript; it is never rolled back.
    pub fn apply_chunk(&mut self, text: &str) {
        if let Some(last) = self.transcript.last_mut() {
            if last.role == Role::Model {
                last.text.push_str(text);
            }
        }
    }

    /// Removes the reply placeholder after a stream failure, but only while
    /// it is still empty: a turn with visible text stays in the transcript.
    pub fn abort_reply(&mut self) {
        if let Some(last) = self.transcript.last() {
            if last.role == Role::Model && last.text.is_empty() {
                self.transcript.pop();
            }
        }
    }
}

/// A streamed tutor reply: pull chunks with `next_chunk`, apply each to the
/// session, and stop whenever the user cancels or an error surfaces.
///
/// ```ignore
/// let mut reply = session.ask("What is mitosis?").await?;
/// let cancel = reply.cancel_token();
/// while let Some(chunk) = reply.next_chunk().await {
///     match chunk {
///         Ok(text) => session.apply_chunk(&text),
///         Err(_) => {
///             session.abort_reply();
///             break;
///         }
///     }
/// }
/// ```
pub struct TutorReply {
    stream: TextChunkStream,
    cancel: CancelToken,
}

impl TutorReply {
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// `None` once the model finishes or the reply was cancelled. The check
    /// happens between chunks, so cancellation never tears mid-fragment.
    pub async fn next_chunk(&mut self) -> Option<Result<String, TutorError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.stream
            .next_chunk()
            .await
            .map(|chunk| chunk.map_err(TutorError::from))
    }
}
