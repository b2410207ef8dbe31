//! In-memory backend used by tests and local tooling. Mirrors the Mongo
//! backend's semantics, including create-if-absent on results.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{Candidate, CandidateStatus, Question, QuestionFolder, Quiz, QuizResult};

use super::{QuestionPartitions, QuizStore, ScoreUpdate, StoreError};

#[derive(Default)]
struct MemoryInner {
    quizzes: HashMap<String, Quiz>,
    folders: HashMap<String, Vec<QuestionFolder>>,
    questions: HashMap<(String, String), Vec<Question>>,
    candidates: HashMap<String, BTreeMap<String, Candidate>>,
    results: HashMap<String, BTreeMap<String, QuizResult>>,
    result_write_failures: u32,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_quiz(&self, quiz: Quiz) {
        let mut inner = self.inner.write().await;
        inner.quizzes.insert(quiz.id.clone(), quiz);
    }

    pub async fn add_folder(&self, quiz_id: &str, folder: QuestionFolder) {
        let mut inner = self.inner.write().await;
        inner
            .folders
            .entry(quiz_id.to_string())
            .or_default()
            .push(folder);
    }

    pub async fn add_question(&self, quiz_id: &str, folder_id: &str, question: Question) {
        let mut inner = self.inner.write().await;
        inner
            .questions
            .entry((quiz_id.to_string(), folder_id.to_string()))
            .or_default()
            .push(question);
    }

    pub async fn put_candidate(&self, quiz_id: &str, candidate: Candidate) {
        let mut inner = self.inner.write().await;
        inner
            .candidates
            .entry(quiz_id.to_string())
            .or_default()
            .insert(candidate.contact.clone(), candidate);
    }

    /// Makes the next `count` calls to `create_result` fail with a backend
    /// error, simulating a storage outage.
    pub async fn fail_result_creates(&self, count: u32) {
        let mut inner = self.inner.write().await;
        inner.result_write_failures = count;
    }

    pub async fn result_count(&self, quiz_id: &str) -> usize {
        let inner = self.inner.read().await;
        inner.results.get(quiz_id).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.quizzes.get(quiz_id).cloned())
    }

    async fn load_question_partitions(
        &self,
        quiz_id: &str,
    ) -> Result<QuestionPartitions, StoreError> {
        let inner = self.inner.read().await;
        let mut partitions = QuestionPartitions::default();
        let Some(folders) = inner.folders.get(quiz_id) else {
            return Ok(partitions);
        };
        for folder in folders {
            let key = (quiz_id.to_string(), folder.id.clone());
            let questions = inner.questions.get(&key).cloned().unwrap_or_default();
            match folder.kind {
                crate::models::FolderKind::Fixed => partitions.fixed.extend(questions),
                crate::models::FolderKind::Pool => partitions.pool.extend(questions),
            }
        }
        Ok(partitions)
    }

    async fn find_candidate(
        &self,
        quiz_id: &str,
        contact: &str,
    ) -> Result<Option<Candidate>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .candidates
            .get(quiz_id)
            .and_then(|by_contact| by_contact.get(contact))
            .cloned())
    }

    async fn begin_attendance(
        &self,
        quiz_id: &str,
        contact: &str,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut inner = self.inner.write().await;
        let candidate = inner
            .candidates
            .get_mut(quiz_id)
            .and_then(|by_contact| by_contact.get_mut(contact))
            .ok_or_else(|| StoreError::NotFound {
                path: format!("quizzes/{}/candidates/{}", quiz_id, contact),
            })?;
        let now = Utc::now();
        candidate.status = CandidateStatus::Attending;
        candidate.session_start_time = Some(now);
        Ok(now)
    }

    async fn fetch_result(
        &self,
        quiz_id: &str,
        result_id: &str,
    ) -> Result<Option<QuizResult>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .get(quiz_id)
            .and_then(|by_id| by_id.get(result_id))
            .cloned())
    }

    async fn create_result(&self, quiz_id: &str, result: &QuizResult) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.result_write_failures > 0 {
            inner.result_write_failures -= 1;
            return Err(StoreError::Backend(anyhow::anyhow!(
                "simulated storage outage"
            )));
        }
        let by_id = inner.results.entry(quiz_id.to_string()).or_default();
        if by_id.contains_key(&result.id) {
            return Err(StoreError::AlreadyExists {
                path: format!("quizzes/{}/results/{}", quiz_id, result.id),
            });
        }
        by_id.insert(result.id.clone(), result.clone());
        Ok(())
    }

    async fn update_result_scores(
        &self,
        quiz_id: &str,
        result_id: &str,
        update: &ScoreUpdate,
    ) -> Result<QuizResult, StoreError> {
        let mut inner = self.inner.write().await;
        let result = inner
            .results
            .get_mut(quiz_id)
            .and_then(|by_id| by_id.get_mut(result_id))
            .ok_or_else(|| StoreError::NotFound {
                path: format!("quizzes/{}/results/{}", quiz_id, result_id),
            })?;
        result.score = update.score;
        result.priority_score = update.priority_score;
        result.overrides = update.overrides.clone();
        Ok(result.clone())
    }

    async fn list_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .get(quiz_id)
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_result(id: &str) -> QuizResult {
        QuizResult {
            id: id.to_string(),
            candidate_id: "c1".to_string(),
            answers: BTreeMap::new(),
            score: 1,
            total_possible_score: 2,
            priority_score: 0,
            answered_count: 1,
            total_questions: 2,
            session_start_time: Utc::now(),
            submitted_at: Utc::now(),
            overrides: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn create_result_is_create_if_absent() {
        let store = MemoryStore::new();
        let result = sample_result("0555123456");

        store.create_result("quiz-1", &result).await.unwrap();
        let err = store.create_result("quiz-1", &result).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.result_count("quiz-1").await, 1);
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_run_out() {
        let store = MemoryStore::new();
        let result = sample_result("0555123456");
        store.fail_result_creates(2).await;

        let first = store.create_result("quiz-1", &result).await.unwrap_err();
        assert!(first.is_transient());
        let second = store.create_result("quiz-1", &result).await.unwrap_err();
        assert!(second.is_transient());
        store.create_result("quiz-1", &result).await.unwrap();
    }

    #[tokio::test]
    async fn begin_attendance_stamps_the_candidate() {
        let store = MemoryStore::new();
        store
            .put_candidate(
                "quiz-1",
                Candidate {
                    id: "c1".to_string(),
                    name: "Ayse Yilmaz".to_string(),
                    place: None,
                    contact: "0555123456".to_string(),
                    credential: "secret".to_string(),
                    status: CandidateStatus::NotAttended,
                    session_start_time: None,
                },
            )
            .await;

        let stamped = store.begin_attendance("quiz-1", "0555123456").await.unwrap();
        let candidate = store
            .find_candidate("quiz-1", "0555123456")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Attending);
        assert_eq!(candidate.session_start_time, Some(stamped));
    }
}
