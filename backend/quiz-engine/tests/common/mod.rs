#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use quizegon_engine::models::{
    Candidate, CandidateLoginRequest, CandidateStatus, FolderKind, ManualStatus, Question,
    QuestionFolder, Quiz, QuizAvailability, QuizType,
};
use quizegon_engine::services::result_service::ResultService;
use quizegon_engine::services::session_service::SessionService;
use quizegon_engine::store::memory::MemoryStore;
use quizegon_engine::store::QuizStore;
use quizegon_engine::EngineConfig;

pub const QUIZ_ID: &str = "qz-backend-screening";
pub const CONTACT: &str = "0555123456";
pub const CREDENTIAL: &str = "tr-ankara-42";

/// Initialize tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        mongo_uri: "mongodb://localhost:27017".to_string(),
        mongo_database: "quizegon-test".to_string(),
        submit_retry_attempts: 3,
    }
}

pub fn session_service(store: &Arc<MemoryStore>) -> SessionService {
    let store: Arc<dyn QuizStore> = store.clone();
    SessionService::new(store, &test_config())
}

pub fn result_service(store: &Arc<MemoryStore>) -> ResultService {
    let store: Arc<dyn QuizStore> = store.clone();
    ResultService::new(store)
}

pub fn fixed_folder_id() -> String {
    format!("{}-fixed", QUIZ_ID)
}

pub fn pool_folder_id() -> String {
    format!("{}-pool", QUIZ_ID)
}

pub fn manual_active_quiz(quiz_type: QuizType) -> Quiz {
    Quiz {
        id: QUIZ_ID.to_string(),
        name: "Backend Screening".to_string(),
        quiz_type,
        duration_seconds: 300,
        fixed_question_count: 2,
        pool_question_count: 0,
        anti_cheating_enabled: false,
        availability: QuizAvailability::Manual {
            status: ManualStatus::Active,
        },
        instructions: Some("Answer every question before the timer runs out.".to_string()),
        created_at: Utc::now(),
    }
}

pub fn mc_question(id: &str, text: &str, options: &[&str], correct: &str) -> Question {
    Question {
        id: id.to_string(),
        text: text.to_string(),
        score: 1,
        is_priority: false,
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: Some(correct.to_string()),
        answer_parameters: None,
    }
}

pub fn descriptive_question(id: &str, text: &str, keywords: &str) -> Question {
    Question {
        id: id.to_string(),
        text: text.to_string(),
        score: 1,
        is_priority: false,
        options: Vec::new(),
        correct_answer: None,
        answer_parameters: Some(keywords.to_string()),
    }
}

pub fn roster_candidate() -> Candidate {
    Candidate {
        id: "cand-1".to_string(),
        name: "Ayse Yilmaz".to_string(),
        place: Some("Ankara".to_string()),
        contact: CONTACT.to_string(),
        credential: CREDENTIAL.to_string(),
        status: CandidateStatus::NotAttended,
        session_start_time: None,
    }
}

pub fn login_request() -> CandidateLoginRequest {
    CandidateLoginRequest {
        contact: CONTACT.to_string(),
        credential: CREDENTIAL.to_string(),
    }
}

/// Seeds a manual-active multiple-choice quiz with two fixed questions
/// (capital of France, 2 + 2) and one rostered candidate.
pub async fn seed_basic_quiz(store: &MemoryStore) {
    store
        .put_quiz(manual_active_quiz(QuizType::MultipleChoice))
        .await;
    store
        .add_folder(
            QUIZ_ID,
            QuestionFolder {
                id: fixed_folder_id(),
                name: "Fixed Questions".to_string(),
                kind: FolderKind::Fixed,
            },
        )
        .await;
    store
        .add_folder(
            QUIZ_ID,
            QuestionFolder {
                id: pool_folder_id(),
                name: "Question Pool".to_string(),
                kind: FolderKind::Pool,
            },
        )
        .await;
    store
        .add_question(
            QUIZ_ID,
            &fixed_folder_id(),
            mc_question(
                "q1",
                "What is the capital of France?",
                &["Paris", "London", "Berlin"],
                "Paris",
            ),
        )
        .await;
    store
        .add_question(
            QUIZ_ID,
            &fixed_folder_id(),
            mc_question("q2", "2 + 2 = ?", &["3", "4", "5"], "4"),
        )
        .await;
    store.put_candidate(QUIZ_ID, roster_candidate()).await;
}
