use base64::Engine;
use thiserror::Error;

use crate::models::FileState;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ACCEPTED_MIME_TYPES: [&str; 3] = [
    "application/pdf",
    "text/plain",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File is too large or not a valid type. Please upload a PDF, DOCX, or TXT file under 10MB.")]
    UnsupportedType(String),
    #[error("File is too large or not a valid type. Please upload a PDF, DOCX, or TXT file under 10MB.")]
    TooLarge(usize),
    #[error("Could not read file content.")]
    EmptyContent,
}

pub fn is_supported_mime_type(mime_type: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&mime_type)
}

/// Local, synchronous gate in front of generation. Rejections never reach a
/// remote collaborator and reset on the next attempt.
pub fn prepare_upload(name: &str, mime_type: &str, bytes: &[u8]) -> Result<FileState, UploadError> {
    if !is_supported_mime_type(mime_type) {
        return Err(UploadError::UnsupportedType(mime_type.to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge(bytes.len()));
    }
    if bytes.is_empty() {
        return Err(UploadError::EmptyContent);
    }

    Ok(FileState {
        name: name.to_string(),
        content: base64::engine::general_purpose::STANDARD.encode(bytes),
        mime_type: mime_type.to_string(),
    })
}
