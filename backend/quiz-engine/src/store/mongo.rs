//! MongoDB backend. The logical document tree is flattened into the
//! `quizzes`, `question_folders`, `questions`, `candidates` and `results`
//! collections, scoped by a `quizId` field. Result documents carry a
//! composite `_id` of `{quizId}:{contact}` so the one-submission-per
//! -candidate rule is enforced by the `_id` index itself.

use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Database;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::metrics::track_db_operation;
use crate::models::{
    Candidate, CandidateStatus, FolderKind, OverridePoints, Question, Quiz, QuizResult,
};

use super::{QuestionPartitions, QuizStore, ScoreUpdate, StoreError};

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn connect(config: &EngineConfig) -> anyhow::Result<Self> {
        let client = mongodb::Client::with_uri_str(&config.mongo_uri)
            .await
            .context("Failed to connect to MongoDB")?;
        let db = client.database(&config.mongo_database);
        tracing::info!("MongoDB connected, database={}", config.mongo_database);
        Ok(Self { db })
    }

    /// Seeds the two folders every quiz starts with. Safe to call for a quiz
    /// that already has them; duplicate inserts are ignored.
    pub async fn ensure_default_folders(&self, quiz_id: &str) -> Result<(), StoreError> {
        let collection: mongodb::Collection<FolderDoc> = self.db.collection("question_folders");
        let defaults = [
            FolderDoc {
                id: format!("{}-fixed", quiz_id),
                quiz_id: quiz_id.to_string(),
                name: "Fixed Questions".to_string(),
                kind: FolderKind::Fixed,
            },
            FolderDoc {
                id: format!("{}-pool", quiz_id),
                quiz_id: quiz_id.to_string(),
                name: "Question Pool".to_string(),
                kind: FolderKind::Pool,
            },
        ];

        for folder in &defaults {
            if let Err(e) = collection.insert_one(folder).await {
                if is_duplicate_key(&e) {
                    continue;
                }
                return Err(StoreError::Backend(
                    anyhow::Error::new(e).context("Failed to seed default folders"),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MongoStore {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        let collection: mongodb::Collection<Quiz> = self.db.collection("quizzes");
        track_db_operation("find_one", "quizzes", async {
            collection
                .find_one(doc! { "_id": quiz_id })
                .await
                .context("Failed to query quizzes collection")
                .map_err(StoreError::Backend)
        })
        .await
    }

    async fn load_question_partitions(
        &self,
        quiz_id: &str,
    ) -> Result<QuestionPartitions, StoreError> {
        let folder_coll: mongodb::Collection<FolderDoc> = self.db.collection("question_folders");
        let kinds: HashMap<String, FolderKind> =
            track_db_operation("find", "question_folders", async {
                let mut kinds = HashMap::new();
                let mut cursor = folder_coll
                    .find(doc! { "quizId": quiz_id })
                    .await
                    .context("Failed to query question_folders collection")?;
                while cursor.advance().await.context("Failed to advance cursor")? {
                    let folder: FolderDoc = cursor
                        .deserialize_current()
                        .context("Failed to deserialize folder")?;
                    kinds.insert(folder.id, folder.kind);
                }
                Ok::<_, StoreError>(kinds)
            })
            .await?;

        let question_coll: mongodb::Collection<QuestionDoc> = self.db.collection("questions");
        track_db_operation("find", "questions", async {
            let mut partitions = QuestionPartitions::default();
            let mut cursor = question_coll
                .find(doc! { "quizId": quiz_id })
                .await
                .context("Failed to query questions collection")?;
            while cursor.advance().await.context("Failed to advance cursor")? {
                let question_doc: QuestionDoc = cursor
                    .deserialize_current()
                    .context("Failed to deserialize question")?;
                match kinds.get(&question_doc.folder_id) {
                    Some(FolderKind::Fixed) => partitions.fixed.push(question_doc.question),
                    Some(FolderKind::Pool) => partitions.pool.push(question_doc.question),
                    None => {
                        tracing::warn!(
                            "Question {} references unknown folder {}, skipping",
                            question_doc.question.id,
                            question_doc.folder_id
                        );
                    }
                }
            }
            Ok(partitions)
        })
        .await
    }

    async fn find_candidate(
        &self,
        quiz_id: &str,
        contact: &str,
    ) -> Result<Option<Candidate>, StoreError> {
        let collection: mongodb::Collection<CandidateDoc> = self.db.collection("candidates");
        let found = track_db_operation("find_one", "candidates", async {
            collection
                .find_one(doc! { "quizId": quiz_id, "contact": contact })
                .await
                .context("Failed to query candidates collection")
                .map_err(StoreError::Backend)
        })
        .await?;
        Ok(found.map(CandidateDoc::into_candidate))
    }

    async fn begin_attendance(
        &self,
        quiz_id: &str,
        contact: &str,
    ) -> Result<DateTime<Utc>, StoreError> {
        let collection: mongodb::Collection<CandidateDoc> = self.db.collection("candidates");
        // $currentDate stamps with the database clock, not this process.
        let updated = track_db_operation("find_one_and_update", "candidates", async {
            collection
                .find_one_and_update(
                    doc! { "quizId": quiz_id, "contact": contact },
                    doc! {
                        "$set": { "status": "attending" },
                        "$currentDate": { "sessionStartTime": true },
                    },
                )
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .await
                .context("Failed to stamp candidate attendance")
                .map_err(StoreError::Backend)
        })
        .await?
        .ok_or_else(|| StoreError::NotFound {
            path: format!("quizzes/{}/candidates/{}", quiz_id, contact),
        })?;

        updated.session_start_time.ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!(
                "sessionStartTime missing after attendance update"
            ))
        })
    }

    async fn fetch_result(
        &self,
        quiz_id: &str,
        result_id: &str,
    ) -> Result<Option<QuizResult>, StoreError> {
        let collection: mongodb::Collection<ResultDoc> = self.db.collection("results");
        let found = track_db_operation("find_one", "results", async {
            collection
                .find_one(doc! { "_id": result_key(quiz_id, result_id) })
                .await
                .context("Failed to query results collection")
                .map_err(StoreError::Backend)
        })
        .await?;
        Ok(found.map(ResultDoc::into_result))
    }

    async fn create_result(&self, quiz_id: &str, result: &QuizResult) -> Result<(), StoreError> {
        let collection: mongodb::Collection<ResultDoc> = self.db.collection("results");
        let result_doc = ResultDoc::from_result(quiz_id, result);
        track_db_operation("insert_one", "results", async {
            match collection.insert_one(&result_doc).await {
                Ok(_) => Ok(()),
                Err(e) if is_duplicate_key(&e) => Err(StoreError::AlreadyExists {
                    path: format!("quizzes/{}/results/{}", quiz_id, result.id),
                }),
                Err(e) => Err(StoreError::Backend(
                    anyhow::Error::new(e).context("Failed to insert result"),
                )),
            }
        })
        .await
    }

    async fn update_result_scores(
        &self,
        quiz_id: &str,
        result_id: &str,
        update: &ScoreUpdate,
    ) -> Result<QuizResult, StoreError> {
        let collection: mongodb::Collection<ResultDoc> = self.db.collection("results");
        let overrides = mongodb::bson::to_bson(&update.overrides)
            .context("Failed to encode score overrides")?;

        let updated = track_db_operation("find_one_and_update", "results", async {
            collection
                .find_one_and_update(
                    doc! { "_id": result_key(quiz_id, result_id) },
                    doc! { "$set": {
                        "score": update.score,
                        "priorityScore": update.priority_score,
                        "overrides": overrides,
                    }},
                )
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .await
                .context("Failed to update result scores")
                .map_err(StoreError::Backend)
        })
        .await?;

        updated
            .map(ResultDoc::into_result)
            .ok_or_else(|| StoreError::NotFound {
                path: format!("quizzes/{}/results/{}", quiz_id, result_id),
            })
    }

    async fn list_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>, StoreError> {
        let collection: mongodb::Collection<ResultDoc> = self.db.collection("results");
        track_db_operation("find", "results", async {
            let mut results = Vec::new();
            let mut cursor = collection
                .find(doc! { "quizId": quiz_id })
                .await
                .context("Failed to query results collection")?;
            while cursor.advance().await.context("Failed to advance cursor")? {
                let result_doc: ResultDoc = cursor
                    .deserialize_current()
                    .context("Failed to deserialize result")?;
                results.push(result_doc.into_result());
            }
            Ok(results)
        })
        .await
    }
}

fn result_key(quiz_id: &str, result_id: &str) -> String {
    format!("{}:{}", quiz_id, result_id)
}

// Duplicate key error (code 11000) means the document already exists.
fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *e.kind
    {
        return we.code == 11000;
    }
    false
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderDoc {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    name: String,
    #[serde(rename = "type")]
    kind: FolderKind,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDoc {
    quiz_id: String,
    folder_id: String,
    #[serde(flatten)]
    question: Question,
}

// Candidates and results keep explicit fields rather than a flattened model;
// the bson datetime bridge does not survive serde's flatten buffering.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateDoc {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    candidate_id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    place: Option<String>,
    contact: String,
    credential: String,
    #[serde(default)]
    status: CandidateStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::models::bson_datetime_as_chrono_option"
    )]
    session_start_time: Option<DateTime<Utc>>,
}

impl CandidateDoc {
    fn into_candidate(self) -> Candidate {
        Candidate {
            id: self.candidate_id,
            name: self.name,
            place: self.place,
            contact: self.contact,
            credential: self.credential,
            status: self.status,
            session_start_time: self.session_start_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultDoc {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    contact: String,
    candidate_id: String,
    answers: BTreeMap<String, String>,
    score: u32,
    total_possible_score: u32,
    priority_score: u32,
    answered_count: u32,
    total_questions: u32,
    #[serde(with = "crate::models::bson_datetime_as_chrono")]
    session_start_time: DateTime<Utc>,
    #[serde(with = "crate::models::bson_datetime_as_chrono")]
    submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    overrides: BTreeMap<String, OverridePoints>,
}

impl ResultDoc {
    fn from_result(quiz_id: &str, result: &QuizResult) -> Self {
        ResultDoc {
            id: result_key(quiz_id, &result.id),
            quiz_id: quiz_id.to_string(),
            contact: result.id.clone(),
            candidate_id: result.candidate_id.clone(),
            answers: result.answers.clone(),
            score: result.score,
            total_possible_score: result.total_possible_score,
            priority_score: result.priority_score,
            answered_count: result.answered_count,
            total_questions: result.total_questions,
            session_start_time: result.session_start_time,
            submitted_at: result.submitted_at,
            overrides: result.overrides.clone(),
        }
    }

    fn into_result(self) -> QuizResult {
        QuizResult {
            id: self.contact,
            candidate_id: self.candidate_id,
            answers: self.answers,
            score: self.score,
            total_possible_score: self.total_possible_score,
            priority_score: self.priority_score,
            answered_count: self.answered_count,
            total_questions: self.total_questions,
            session_start_time: self.session_start_time,
            submitted_at: self.submitted_at,
            overrides: self.overrides,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_doc_key_scopes_by_quiz() {
        assert_eq!(result_key("quiz-1", "0555123456"), "quiz-1:0555123456");
    }

    #[test]
    fn result_doc_round_trips_the_model() {
        let result = QuizResult {
            id: "0555123456".to_string(),
            candidate_id: "c1".to_string(),
            answers: BTreeMap::from([("q1".to_string(), "Paris".to_string())]),
            score: 1,
            total_possible_score: 2,
            priority_score: 0,
            answered_count: 1,
            total_questions: 2,
            session_start_time: Utc::now(),
            submitted_at: Utc::now(),
            overrides: BTreeMap::new(),
        };

        let doc = ResultDoc::from_result("quiz-1", &result);
        assert_eq!(doc.id, "quiz-1:0555123456");
        assert_eq!(doc.quiz_id, "quiz-1");

        let back = doc.into_result();
        assert_eq!(back.id, result.id);
        assert_eq!(back.answers, result.answers);
        assert_eq!(back.score, result.score);
    }
}
