use serde::{Deserialize, Serialize};

/// Question stored under a quiz folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    /// Point value counted toward the total.
    #[serde(default = "default_score")]
    pub score: u32,
    #[serde(rename = "isPriority", default)]
    pub is_priority: bool,
    /// Choices presented for multiple-choice quizzes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Exact expected option for multiple-choice questions.
    #[serde(rename = "correctAnswer", default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Comma-separated keywords for descriptive questions.
    #[serde(
        rename = "answerParameters",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub answer_parameters: Option<String>,
}

fn default_score() -> u32 {
    1
}

/// Question view handed to candidates, without the answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateQuestion {
    pub id: String,
    pub text: String,
    pub score: u32,
    pub options: Vec<String>,
}

impl From<&Question> for CandidateQuestion {
    fn from(question: &Question) -> Self {
        CandidateQuestion {
            id: question.id.clone(),
            text: question.text.clone(),
            score: question.score,
            options: question.options.clone(),
        }
    }
}

/// Folder partitioning a quiz's question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFolder {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FolderKind,
}

/// Every question of a fixed folder is eligible for the fixed draw; pool
/// folders feed the randomized pool draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    Fixed,
    Pool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_defaults_to_one_point() {
        let question: Question = serde_json::from_value(serde_json::json!({
            "_id": "q1",
            "text": "What is the capital of France?",
            "options": ["Paris", "London"],
            "correctAnswer": "Paris"
        }))
        .unwrap();

        assert_eq!(question.score, 1);
        assert!(!question.is_priority);
    }

    #[test]
    fn candidate_view_omits_the_answer_key() {
        let question = Question {
            id: "q1".to_string(),
            text: "2 + 2 = ?".to_string(),
            score: 2,
            is_priority: true,
            options: vec!["3".to_string(), "4".to_string()],
            correct_answer: Some("4".to_string()),
            answer_parameters: None,
        };

        let view = CandidateQuestion::from(&question);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correctAnswer").is_none());
        assert!(json.get("answerParameters").is_none());
        assert_eq!(json["options"], serde_json::json!(["3", "4"]));
    }
}
