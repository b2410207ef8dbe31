use std::sync::Arc;

use crate::errors::EngineError;
use crate::metrics::OVERRIDES_APPLIED_TOTAL;
use crate::models::{OverridePoints, QuizResult};
use crate::services::scoring_service::score_attempt;
use crate::store::{QuizStore, ScoreUpdate};

/// Reviewer-side operations on stored results: manual score overrides and
/// the ranked listing used for shortlisting.
pub struct ResultService {
    store: Arc<dyn QuizStore>,
}

impl ResultService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn fetch_result(
        &self,
        quiz_id: &str,
        result_id: &str,
    ) -> Result<QuizResult, EngineError> {
        self.store
            .fetch_result(quiz_id, result_id)
            .await?
            .ok_or_else(|| EngineError::ResultNotFound(result_id.to_string()))
    }

    /// Awards `points` for one question in place of its automatic score,
    /// then recomputes the stored totals from the recorded answers. The
    /// override replaces automatic scoring entirely, so zero points revokes
    /// credit the engine granted. Applying the same override again leaves
    /// the result unchanged.
    pub async fn override_question_score(
        &self,
        quiz_id: &str,
        result_id: &str,
        question_id: &str,
        points: u32,
    ) -> Result<QuizResult, EngineError> {
        let existing = self
            .store
            .fetch_result(quiz_id, result_id)
            .await?
            .ok_or_else(|| EngineError::ResultNotFound(result_id.to_string()))?;
        let quiz = self
            .store
            .fetch_quiz(quiz_id)
            .await?
            .ok_or_else(|| EngineError::QuizNotFound(quiz_id.to_string()))?;

        // The recompute walks the whole bank. Questions the candidate never
        // saw have no recorded answer and contribute nothing, so the stored
        // paper-wide totals stay valid.
        let partitions = self.store.load_question_partitions(quiz_id).await?;
        let mut bank = partitions.fixed;
        bank.extend(partitions.pool);

        let mut overrides = existing.overrides.clone();
        overrides.insert(question_id.to_string(), OverridePoints::Points(points));

        let breakdown = score_attempt(&bank, &existing.answers, quiz.quiz_type, &overrides);

        let update = ScoreUpdate {
            score: breakdown.score,
            priority_score: breakdown.priority_score,
            overrides,
        };
        let updated = self
            .store
            .update_result_scores(quiz_id, result_id, &update)
            .await?;

        OVERRIDES_APPLIED_TOTAL.inc();
        tracing::info!(
            "Score override applied: quiz={}, result={}, question={}, points={}, score={}/{}",
            quiz_id,
            result_id,
            question_id,
            points,
            updated.score,
            updated.total_possible_score
        );
        Ok(updated)
    }

    /// Results ordered for review: score first, priority points break ties,
    /// and between equal papers the faster candidate ranks higher.
    pub async fn list_ranked_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>, EngineError> {
        let mut results = self.store.list_results(quiz_id).await?;
        results.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.priority_score.cmp(&a.priority_score))
                .then_with(|| a.elapsed().cmp(&b.elapsed()))
        });
        Ok(results)
    }
}
