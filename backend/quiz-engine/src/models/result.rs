use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;
use super::session::SubmitTrigger;

/// Persisted outcome of a candidate's session, keyed by the candidate's
/// contact number. Written once per candidate per quiz; score fields may be
/// rewritten later by admin overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// Candidate natural key, equal to `Candidate::contact`.
    pub id: String,
    pub candidate_id: String,
    pub answers: BTreeMap<String, String>,
    pub score: u32,
    pub total_possible_score: u32,
    pub priority_score: u32,
    pub answered_count: u32,
    pub total_questions: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub session_start_time: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, OverridePoints>,
}

impl QuizResult {
    /// Time the candidate spent in the session, start stamp to submission.
    pub fn elapsed(&self) -> Duration {
        self.submitted_at - self.session_start_time
    }
}

/// Admin override for a single question. The point-valued form is canonical;
/// the boolean form written by older deployments maps to full or zero credit
/// for the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverridePoints {
    Points(u32),
    Verdict(bool),
}

impl OverridePoints {
    /// Points awarded for a question worth `full_score`.
    pub fn points_for(&self, full_score: u32) -> u32 {
        match self {
            OverridePoints::Points(points) => *points,
            OverridePoints::Verdict(true) => full_score,
            OverridePoints::Verdict(false) => 0,
        }
    }
}

/// Compact outcome handed back after a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub result_id: String,
    pub trigger: SubmitTrigger,
    pub score: u32,
    pub total_possible_score: u32,
    pub priority_score: u32,
    pub answered_count: u32,
    pub total_questions: u32,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_points_resolve_against_question_score() {
        assert_eq!(OverridePoints::Points(3).points_for(5), 3);
        assert_eq!(OverridePoints::Verdict(true).points_for(5), 5);
        assert_eq!(OverridePoints::Verdict(false).points_for(5), 0);
    }

    #[test]
    fn override_wire_form_accepts_numbers_and_booleans() {
        let points: OverridePoints = serde_json::from_str("2").unwrap();
        assert_eq!(points, OverridePoints::Points(2));

        let verdict: OverridePoints = serde_json::from_str("true").unwrap();
        assert_eq!(verdict, OverridePoints::Verdict(true));

        assert_eq!(
            serde_json::to_string(&OverridePoints::Points(2)).unwrap(),
            "2"
        );
    }

    #[test]
    fn elapsed_is_submission_minus_start() {
        let start = Utc::now();
        let result = QuizResult {
            id: "0555123456".to_string(),
            candidate_id: "c1".to_string(),
            answers: BTreeMap::new(),
            score: 0,
            total_possible_score: 0,
            priority_score: 0,
            answered_count: 0,
            total_questions: 0,
            session_start_time: start,
            submitted_at: start + Duration::seconds(95),
            overrides: BTreeMap::new(),
        };
        assert_eq!(result.elapsed(), Duration::seconds(95));
    }
}
