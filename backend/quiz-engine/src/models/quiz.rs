use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Quiz definition stored in the "quizzes" collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    /// Session length in seconds.
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: u32,
    /// Number of questions drawn from the fixed bank.
    #[serde(rename = "fixedQuestionCount", default)]
    pub fixed_question_count: u32,
    /// Number of questions drawn from the pool bank. Zero disables the pool.
    #[serde(rename = "poolQuestionCount", default)]
    pub pool_question_count: u32,
    #[serde(rename = "antiCheatingEnabled", default)]
    pub anti_cheating_enabled: bool,
    pub availability: QuizAvailability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// How answers are captured and scored for every question of the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizType {
    MultipleChoice,
    Descriptive,
}

/// Whether candidates may log in, controlled either by an admin-set status
/// or by a scheduled window. A quiz carries exactly one of the two forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum QuizAvailability {
    Manual {
        status: ManualStatus,
    },
    #[serde(rename_all = "camelCase")]
    Scheduled {
        #[serde(with = "bson_datetime_as_chrono")]
        start_time: DateTime<Utc>,
        #[serde(with = "bson_datetime_as_chrono")]
        end_time: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualStatus {
    Pending,
    Active,
    Inactive,
}

/// Status derived from availability at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Pending,
    Scheduled,
    Active,
    Inactive,
}

impl QuizAvailability {
    /// Whether candidates may start sessions at `now`. Scheduled windows are
    /// inclusive at both ends.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            QuizAvailability::Manual { status } => *status == ManualStatus::Active,
            QuizAvailability::Scheduled {
                start_time,
                end_time,
            } => now >= *start_time && now <= *end_time,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> QuizStatus {
        match self {
            QuizAvailability::Manual { status } => match status {
                ManualStatus::Pending => QuizStatus::Pending,
                ManualStatus::Active => QuizStatus::Active,
                ManualStatus::Inactive => QuizStatus::Inactive,
            },
            QuizAvailability::Scheduled {
                start_time,
                end_time,
            } => {
                if now < *start_time {
                    QuizStatus::Scheduled
                } else if now <= *end_time {
                    QuizStatus::Active
                } else {
                    QuizStatus::Inactive
                }
            }
        }
    }
}
