//! Storage seam for quiz content and results.
//!
//! The engine addresses documents by logical path:
//! `quizzes/{quizId}`, `quizzes/{quizId}/folders/{folderId}/questions/{qId}`,
//! `quizzes/{quizId}/candidates/{contact}` and
//! `quizzes/{quizId}/results/{contact}`. The Mongo backend flattens these
//! into collections; the in-memory backend keeps them in nested maps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{Candidate, OverridePoints, Question, Quiz, QuizResult};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document already exists at {path}")]
    AlreadyExists { path: String },
    #[error("document not found at {path}")]
    NotFound { path: String },
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Backend faults (connectivity, timeouts) are worth retrying;
    /// `AlreadyExists` and `NotFound` describe durable state and are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

/// Question banks for one quiz, split by folder kind.
#[derive(Debug, Clone, Default)]
pub struct QuestionPartitions {
    pub fixed: Vec<Question>,
    pub pool: Vec<Question>,
}

impl QuestionPartitions {
    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.pool.is_empty()
    }
}

/// Score fields rewritten by an admin override. Everything else on the
/// result document stays as submitted.
#[derive(Debug, Clone)]
pub struct ScoreUpdate {
    pub score: u32,
    pub priority_score: u32,
    pub overrides: BTreeMap<String, OverridePoints>,
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError>;

    async fn load_question_partitions(
        &self,
        quiz_id: &str,
    ) -> Result<QuestionPartitions, StoreError>;

    async fn find_candidate(
        &self,
        quiz_id: &str,
        contact: &str,
    ) -> Result<Option<Candidate>, StoreError>;

    /// Marks the candidate as attending and stamps the session start with
    /// the store's clock. Returns the stamped instant.
    async fn begin_attendance(
        &self,
        quiz_id: &str,
        contact: &str,
    ) -> Result<DateTime<Utc>, StoreError>;

    async fn fetch_result(
        &self,
        quiz_id: &str,
        result_id: &str,
    ) -> Result<Option<QuizResult>, StoreError>;

    /// Create-if-absent. Fails with `AlreadyExists` when a result is already
    /// stored under the same candidate key; never overwrites.
    async fn create_result(&self, quiz_id: &str, result: &QuizResult) -> Result<(), StoreError>;

    async fn update_result_scores(
        &self,
        quiz_id: &str,
        result_id: &str,
        update: &ScoreUpdate,
    ) -> Result<QuizResult, StoreError>;

    async fn list_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>, StoreError>;
}
