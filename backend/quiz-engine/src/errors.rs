use crate::store::StoreError;

/// Failures surfaced by the engine to candidates and admins.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("quiz {0} not found")]
    QuizNotFound(String),

    #[error("this quiz is not currently accepting candidates")]
    QuizNotActive,

    #[error("invalid contact number or credential")]
    InvalidCredentials,

    #[error("a submission already exists for this candidate")]
    DuplicateSubmission,

    #[error("no questions are available for this quiz")]
    NoQuestionsAvailable,

    #[error("result {0} not found")]
    ResultNotFound(String),

    #[error("illegal session state: {0}")]
    IllegalState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Submission write still failing after the bounded retries; the session
    /// keeps its snapshot so the write can be retried later.
    #[error("failed to persist the submission: {0}")]
    Persistence(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(errors.to_string())
    }
}
