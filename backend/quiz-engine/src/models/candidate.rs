use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono_option;

/// Candidate roster entry for a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    /// Natural key used for login and as the result document id.
    pub contact: String,
    /// Secondary credential; a password or a date of birth depending on the
    /// deployment. Compared verbatim.
    pub credential: String,
    #[serde(default)]
    pub status: CandidateStatus,
    #[serde(
        rename = "sessionStartTime",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub session_start_time: Option<DateTime<Utc>>,
}

/// Stored attendance state. "Attended" is never stored; it is derived from
/// the existence of a result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateStatus {
    #[default]
    NotAttended,
    Attending,
}

/// Roster status shown to admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RosterStatus {
    NotAttended,
    Attending,
    Attended,
}

impl Candidate {
    pub fn roster_status(&self, has_result: bool) -> RosterStatus {
        if has_result {
            return RosterStatus::Attended;
        }
        match self.status {
            CandidateStatus::NotAttended => RosterStatus::NotAttended,
            CandidateStatus::Attending => RosterStatus::Attending,
        }
    }
}

/// Candidate login payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CandidateLoginRequest {
    #[validate(length(min = 1, max = 64, message = "Contact number is required"))]
    pub contact: String,

    #[validate(length(min = 1, max = 128, message = "Credential is required"))]
    pub credential: String,
}
