use std::collections::{BTreeMap, BTreeSet};

use crate::errors::EngineError;

/// In-session record of the candidate's answers and review marks. The ledger
/// is sealed at the moment a submission is claimed; every mutation after
/// that is rejected, so the persisted snapshot cannot drift.
#[derive(Debug, Default)]
pub struct AnswerLedger {
    answers: BTreeMap<String, String>,
    marked: BTreeSet<String>,
    sealed: bool,
}

impl AnswerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or replaces the answer for a question. Storing an empty
    /// string returns the question to the unanswered pool.
    pub fn set_answer(&mut self, question_id: &str, answer: &str) -> Result<(), EngineError> {
        self.ensure_mutable()?;
        self.answers
            .insert(question_id.to_string(), answer.to_string());
        Ok(())
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub fn answered_count(&self) -> u32 {
        self.answers.values().filter(|a| !a.is_empty()).count() as u32
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers
            .get(question_id)
            .is_some_and(|a| !a.is_empty())
    }

    /// Flips the review mark for a question and returns the new state.
    pub fn toggle_mark(&mut self, question_id: &str) -> Result<bool, EngineError> {
        self.ensure_mutable()?;
        if self.marked.remove(question_id) {
            Ok(false)
        } else {
            self.marked.insert(question_id.to_string());
            Ok(true)
        }
    }

    pub fn is_marked(&self, question_id: &str) -> bool {
        self.marked.contains(question_id)
    }

    pub fn marked(&self) -> &BTreeSet<String> {
        &self.marked
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.answers.clone()
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_mutable(&self) -> Result<(), EngineError> {
        if self.sealed {
            return Err(EngineError::IllegalState(
                "answer ledger is sealed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_can_be_set_and_replaced() {
        let mut ledger = AnswerLedger::new();
        ledger.set_answer("q1", "Paris").unwrap();
        ledger.set_answer("q1", "Lyon").unwrap();

        assert_eq!(ledger.answer("q1"), Some("Lyon"));
        assert_eq!(ledger.answered_count(), 1);
    }

    #[test]
    fn empty_answers_do_not_count_as_answered() {
        let mut ledger = AnswerLedger::new();
        ledger.set_answer("q1", "Paris").unwrap();
        ledger.set_answer("q1", "").unwrap();

        assert!(!ledger.is_answered("q1"));
        assert_eq!(ledger.answered_count(), 0);
        assert_eq!(ledger.answer("q1"), Some(""));
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let mut ledger = AnswerLedger::new();
        ledger.set_answer("q1", "Paris").unwrap();
        let snapshot = ledger.snapshot();
        ledger.set_answer("q1", "Lyon").unwrap();

        assert_eq!(snapshot.get("q1").map(String::as_str), Some("Paris"));
    }

    #[test]
    fn sealing_rejects_all_mutation() {
        let mut ledger = AnswerLedger::new();
        ledger.set_answer("q1", "Paris").unwrap();
        ledger.seal();

        assert!(matches!(
            ledger.set_answer("q2", "4"),
            Err(EngineError::IllegalState(_))
        ));
        assert!(matches!(
            ledger.toggle_mark("q1"),
            Err(EngineError::IllegalState(_))
        ));
        assert_eq!(ledger.answer("q1"), Some("Paris"));
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[test]
    fn review_marks_toggle() {
        let mut ledger = AnswerLedger::new();
        assert!(ledger.toggle_mark("q1").unwrap());
        assert!(ledger.is_marked("q1"));
        assert!(!ledger.toggle_mark("q1").unwrap());
        assert!(!ledger.is_marked("q1"));
    }
}
