use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::CandidateQuestion;
use super::result::ResultSummary;

/// Lifecycle of a candidate session. Transitions only move forward;
/// `Submitted`, `Rejected` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    AwaitingConfirmation,
    Active,
    Submitting,
    Submitted,
    Rejected,
    Expired,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::AwaitingConfirmation => "awaiting_confirmation",
            SessionState::Active => "active",
            SessionState::Submitting => "submitting",
            SessionState::Submitted => "submitted",
            SessionState::Rejected => "rejected",
            SessionState::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Submitted | SessionState::Rejected | SessionState::Expired
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a submission. Recorded on the summary and on metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitTrigger {
    Manual,
    TimeExpired,
    AntiCheat,
}

impl SubmitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::TimeExpired => "time-expired",
            SubmitTrigger::AntiCheat => "anti-cheat",
        }
    }
}

/// Candidate action suppressed by the anti-cheating monitor. Purely
/// informational, never escalates a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockedAction {
    Copy,
    Paste,
    ContextMenu,
}

impl BlockedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockedAction::Copy => "copy",
            BlockedAction::Paste => "paste",
            BlockedAction::ContextMenu => "context-menu",
        }
    }
}

/// Notifications pushed to the candidate-facing channel while a session runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    CheatingWarning(CheatingWarning),
    SubmissionForced(SubmissionForced),
    ActionBlocked(ActionBlocked),
    Submitted(SubmittedNotice),
    SubmissionFailed(SubmissionFailed),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerTick {
    pub session_id: String,
    pub remaining_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeExpired {
    pub session_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatingWarning {
    pub session_id: String,
    pub violation_count: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionForced {
    pub session_id: String,
    pub violation_count: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBlocked {
    pub session_id: String,
    pub action: BlockedAction,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedNotice {
    pub session_id: String,
    pub summary: ResultSummary,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFailed {
    pub session_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::TimerTick(_) => "timer-tick",
            SessionEvent::TimeExpired(_) => "time-expired",
            SessionEvent::CheatingWarning(_) => "cheating-warning",
            SessionEvent::SubmissionForced(_) => "submission-forced",
            SessionEvent::ActionBlocked(_) => "action-blocked",
            SessionEvent::Submitted(_) => "submitted",
            SessionEvent::SubmissionFailed(_) => "submission-failed",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Handed back by `confirm_start`: everything the candidate UI needs to
/// render the attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub questions: Vec<CandidateQuestion>,
    pub duration_seconds: u32,
    pub fixed_shortfall: u32,
    pub pool_shortfall: u32,
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: String,
    pub state: SessionState,
    pub remaining_seconds: u32,
    pub answered_count: u32,
    pub total_questions: u32,
    pub questions: Vec<QuestionProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionProgress {
    pub question_id: String,
    pub answered: bool,
    pub marked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_flagged() {
        assert!(SessionState::Submitted.is_terminal());
        assert!(SessionState::Rejected.is_terminal());
        assert!(SessionState::Expired.is_terminal());
        assert!(!SessionState::Active.is_terminal());
        assert!(!SessionState::Submitting.is_terminal());
    }

    #[test]
    fn events_tag_with_kebab_case_type() {
        let event = SessionEvent::TimerTick(TimerTick {
            session_id: "s1".to_string(),
            remaining_seconds: 42,
            timestamp: Utc::now(),
        });
        assert_eq!(event.event_name(), "timer-tick");
        let json = event.to_json();
        assert!(json.contains("\"type\":\"timer-tick\""));
        assert!(json.contains("\"remainingSeconds\":42"));
    }

    #[test]
    fn trigger_labels_match_wire_form() {
        assert_eq!(SubmitTrigger::TimeExpired.as_str(), "time-expired");
        let json = serde_json::to_string(&SubmitTrigger::AntiCheat).unwrap();
        assert_eq!(json, "\"anti-cheat\"");
    }
}
