use std::collections::BTreeMap;

use crate::models::{OverridePoints, Question, QuizType};

/// Totals for one attempt. Pure function of the paper, the answers and any
/// admin overrides, so recomputing with the same inputs always agrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreBreakdown {
    pub score: u32,
    pub total_possible_score: u32,
    pub priority_score: u32,
    pub answered_count: u32,
    pub total_questions: u32,
}

/// Scores an attempt over the questions that made up the paper. An override
/// for a question replaces its automatic points entirely; answers keyed by
/// ids outside the paper earn nothing but still count as answered.
pub fn score_attempt(
    questions: &[Question],
    answers: &BTreeMap<String, String>,
    quiz_type: QuizType,
    overrides: &BTreeMap<String, OverridePoints>,
) -> ScoreBreakdown {
    let mut score = 0u32;
    let mut total_possible_score = 0u32;
    let mut priority_score = 0u32;

    for question in questions {
        total_possible_score += question.score;

        let answer = answers
            .get(&question.id)
            .map(String::as_str)
            .unwrap_or_default();
        let awarded = match overrides.get(&question.id) {
            Some(overridden) => overridden.points_for(question.score),
            None if is_answer_correct(question, answer, quiz_type) => question.score,
            None => 0,
        };

        score += awarded;
        if question.is_priority {
            priority_score += awarded;
        }
    }

    let answered_count = answers.values().filter(|a| !a.is_empty()).count() as u32;

    ScoreBreakdown {
        score,
        total_possible_score,
        priority_score,
        answered_count,
        total_questions: questions.len() as u32,
    }
}

/// Automatic correctness check. Multiple choice compares the stored option
/// verbatim; descriptive demands every keyword appear in the lowercased
/// answer.
pub fn is_answer_correct(question: &Question, answer: &str, quiz_type: QuizType) -> bool {
    match quiz_type {
        QuizType::MultipleChoice => match question.correct_answer.as_deref() {
            Some(correct) if !correct.is_empty() => answer == correct,
            _ => false,
        },
        QuizType::Descriptive => {
            let keywords = parse_keywords(question.answer_parameters.as_deref());
            if keywords.is_empty() {
                return false;
            }
            let answer = answer.to_lowercase();
            keywords.iter().all(|keyword| answer.contains(keyword.as_str()))
        }
    }
}

/// Keywords are comma separated, compared trimmed and lowercased.
pub fn parse_keywords(answer_parameters: Option<&str>) -> Vec<String> {
    answer_parameters
        .unwrap_or_default()
        .split(',')
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}
