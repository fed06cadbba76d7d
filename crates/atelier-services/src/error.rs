use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The projection only supports students paired through a single token.
    #[error("Student {student_id} is connected to {token_count} tokens; exactly one is supported")]
    UnsupportedConfiguration {
        student_id: String,
        token_count: usize,
    },

    #[error(
        "Question {question_id} of teacher {teacher_id} has category ordinal {ordinal}, expected 0..{label_count}"
    )]
    CategoryOutOfRange {
        teacher_id: String,
        question_id: String,
        ordinal: i64,
        label_count: usize,
    },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Blob storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Push delivery error: {0}")]
    Push(#[source] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Rejects ids that would address a parent node instead of a record.
pub fn validate_id(id: &str) -> ServiceResult<()> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(ServiceError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}
