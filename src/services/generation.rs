use thiserror::Error;
use tracing::error;

use crate::models::{FileState, StudySet};
use crate::services::gemini::{
    Content, GeminiClient, GeminiError, GenerateContentRequest, GenerationConfig, Part,
};

/// The four top-level fields the model must return. A response missing any of
/// them is an error, never a partial study set.
const REQUIRED_FIELDS: [&str; 4] = ["flashcards", "quiz", "summary", "questionPaper"];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("The content could not be processed due to safety settings. Please try with a different document.")]
    SafetyBlocked,
    #[error("Generated data is missing one or more required fields.")]
    MissingFields,
    #[error("Failed to generate study materials. Please check the document and try again. Details: {0}")]
    Service(String),
}

impl GenerationError {
    /// Message shown to the user in the transient error notification.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<GeminiError> for GenerationError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::SafetyBlocked => GenerationError::SafetyBlocked,
            GeminiError::Json(_) => GenerationError::MissingFields,
            other => GenerationError::Service(other.to_string()),
        }
    }
}

fn generation_prompt(file_name: &str) -> String {
    format!(
        "Based on the provided document (\"{file_name}\"), generate a comprehensive study set. \
The set should include:\n\
1.  Flashcards: Create 10-20 flashcards covering key terms, concepts, and definitions.\n\
2.  Quiz: Design a quiz with a mix of 5-10 multiple-choice and subjective questions to test understanding.\n\
3.  Summary: Provide a concise summary of the document's main points.\n\
4.  Question Paper: Create a mock question paper with marks for each question.\n\n\
Return the entire study set in a single JSON object matching the provided schema."
    )
}

/// Structured-output schema binding for the generation call. Load-bearing:
/// the response is only accepted when it parses as this structure.
pub fn study_set_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "flashcards": {
                "type": "ARRAY",
                "description": "10-20 flashcards, each with a question, a concise answer, and a difficulty of 'Easy', 'Medium', or 'Hard'.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING" },
                        "answer": { "type": "STRING" },
                        "difficulty": { "type": "STRING", "description": "'Easy', 'Medium', or 'Hard'." }
                    },
                    "required": ["question", "answer", "difficulty"]
                }
            },
            "quiz": {
                "type": "OBJECT",
                "description": "A quiz with a title and a mix of 5-10 MCQ and Subjective questions.",
                "properties": {
                    "title": { "type": "STRING" },
                    "questions": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "type": { "type": "STRING", "description": "Either 'MCQ' or 'Subjective'." },
                                "question": { "type": "STRING" },
                                "options": { "type": "ARRAY", "description": "For MCQ: an array of 4 option strings.", "items": { "type": "STRING" } },
                                "answer": { "type": "STRING", "description": "For MCQ it must be one of the options; for Subjective a model answer." },
                                "explanation": { "type": "STRING", "description": "For MCQ: a brief explanation of the correct answer." }
                            },
                            "required": ["type", "question", "answer"]
                        }
                    }
                },
                "required": ["title", "questions"]
            },
            "summary": {
                "type": "STRING",
                "description": "A concise, well-structured markdown summary of the document's key points."
            },
            "questionPaper": {
                "type": "OBJECT",
                "description": "A mock question paper with a title, total marks, and per-question marks.",
                "properties": {
                    "title": { "type": "STRING" },
                    "totalMarks": { "type": "NUMBER" },
                    "questions": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "question": { "type": "STRING" },
                                "marks": { "type": "NUMBER" }
                            },
                            "required": ["question", "marks"]
                        }
                    }
                },
                "required": ["title", "totalMarks", "questions"]
            }
        },
        "required": ["flashcards", "quiz", "summary", "questionPaper"]
    })
}

/// Parses the model's JSON payload into a `StudySet`. Malformed JSON and a
/// payload missing any top-level field both fail as `MissingFields`: the
/// caller never sees a partial result.
pub fn parse_study_set(text: &str) -> Result<StudySet, GenerationError> {
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|_| GenerationError::MissingFields)?;

    for field in REQUIRED_FIELDS {
        if value.get(field).map_or(true, |v| v.is_null()) {
            return Err(GenerationError::MissingFields);
        }
    }

    serde_json::from_value(value).map_err(|_| GenerationError::MissingFields)
}

/// Turns an uploaded document into a study set with one generation call.
/// No retry and no persistence: the caller owns the result, and every failure
/// is terminal for this call.
pub async fn generate_study_set(
    client: &GeminiClient,
    file: &FileState,
) -> Result<StudySet, GenerationError> {
    let request = GenerateContentRequest {
        contents: vec![Content::user(vec![
            Part::inline_data(file.mime_type.clone(), file.content.clone()),
            Part::text(generation_prompt(&file.name)),
        ])],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(study_set_schema()),
        }),
    };

    let response = client.generate_content(&request).await.map_err(|err| {
        error!(error = %err, file = %file.name, "study set generation failed");
        GenerationError::from(err)
    })?;

    let text = response.text().ok_or(GeminiError::EmptyResponse)?;
    parse_study_set(&text)
}
