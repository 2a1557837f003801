//! Quiz payload and validation
//!
//! The quiz payload is the only input the session engine receives from the
//! surrounding application. It is validated once, before a session is
//! constructed; malformed data never reaches the state machine.

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::question::Question;

/// A complete quiz as supplied by the quiz data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Backend identifier used for submission
    ///
    /// A missing id is rejected at construction. An empty id is accepted and
    /// makes the session resolve its result locally.
    #[garde(skip)]
    #[serde(default)]
    pub id: Option<String>,
    /// Display title
    #[garde(length(max = crate::constants::quiz::MAX_TITLE_LENGTH))]
    #[serde(default)]
    pub title: String,
    /// Per-question time budget in seconds; zero or negative means no limit
    #[garde(range(max = crate::constants::quiz::MAX_TIME_LIMIT))]
    #[serde(default)]
    pub time_limit_seconds: i64,
    /// Ordered questions
    #[garde(length(max = crate::constants::quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<Question>,
}

/// Reasons a quiz payload cannot start a session
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The quiz contains no questions
    #[error("quiz has no questions")]
    Empty,
    /// The quiz carries no id
    #[error("quiz id is missing")]
    MissingId,
    /// The payload could not be parsed
    #[error("quiz payload is malformed: {0}")]
    Malformed(String),
    /// A field violates one of the configured limits
    #[error("quiz data is invalid: {0}")]
    Invalid(String),
}

impl Quiz {
    /// Parses a quiz from its JSON wire form and validates it
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` when the JSON does not match the payload
    /// shape, or any error `check` reports.
    pub fn from_json(payload: &str) -> Result<Self, Error> {
        let quiz: Quiz =
            serde_json::from_str(payload).map_err(|e| Error::Malformed(e.to_string()))?;
        quiz.check()?;
        Ok(quiz)
    }

    /// Checks everything a session needs before it can start
    ///
    /// # Errors
    ///
    /// Returns `Error::Empty` for a quiz with no questions, `Error::MissingId`
    /// when the id is absent, and `Error::Invalid` for limit violations.
    pub fn check(&self) -> Result<(), Error> {
        if self.questions.is_empty() {
            return Err(Error::Empty);
        }
        if self.id.is_none() {
            return Err(Error::MissingId);
        }
        self.validate().map_err(|report| Error::Invalid(report.to_string()))
    }

    /// The id used for submission, empty when the provider sent an empty id
    pub fn submission_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Returns the number of questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if the quiz contains any questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The time limit, or `None` when questions are untimed
    pub fn time_limit(&self) -> Option<u64> {
        u64::try_from(self.time_limit_seconds)
            .ok()
            .filter(|seconds| *seconds > 0)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::quiz::question::AnswerOption;

    fn create_test_quiz() -> Quiz {
        Quiz {
            id: Some("quiz-1".to_string()),
            title: "Geography".to_string(),
            time_limit_seconds: 30,
            questions: vec![Question {
                id: Some("q1".to_string()),
                text: "Capital of Italy?".to_string(),
                options: vec![
                    AnswerOption::new("Rome", true),
                    AnswerOption::new("Milan", false),
                ],
                explanation: None,
            }],
        }
    }

    #[test]
    fn test_valid_quiz_passes() {
        assert_eq!(create_test_quiz().check(), Ok(()));
    }

    #[test]
    fn test_empty_quiz_rejected() {
        let mut quiz = create_test_quiz();
        quiz.questions.clear();
        assert_eq!(quiz.check(), Err(Error::Empty));
        assert!(quiz.is_empty());
    }

    #[test]
    fn test_missing_id_rejected() {
        let mut quiz = create_test_quiz();
        quiz.id = None;
        assert_eq!(quiz.check(), Err(Error::MissingId));
    }

    #[test]
    fn test_empty_id_accepted() {
        let mut quiz = create_test_quiz();
        quiz.id = Some(String::new());
        assert_eq!(quiz.check(), Ok(()));
        assert_eq!(quiz.submission_id(), "");
    }

    #[test]
    fn test_title_too_long() {
        let mut quiz = create_test_quiz();
        quiz.title = "a".repeat(crate::constants::quiz::MAX_TITLE_LENGTH + 1);
        assert!(matches!(quiz.check(), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_time_limit_too_long() {
        let mut quiz = create_test_quiz();
        quiz.time_limit_seconds = crate::constants::quiz::MAX_TIME_LIMIT + 1;
        assert!(matches!(quiz.check(), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_time_limit_non_positive_means_untimed() {
        let mut quiz = create_test_quiz();
        assert_eq!(quiz.time_limit(), Some(30));

        quiz.time_limit_seconds = 0;
        assert_eq!(quiz.time_limit(), None);

        quiz.time_limit_seconds = -5;
        assert_eq!(quiz.time_limit(), None);
        assert_eq!(quiz.check(), Ok(()));
    }

    #[test]
    fn test_from_json() {
        let quiz = Quiz::from_json(
            r#"{
                "id": "abc",
                "title": "Math",
                "timeLimitSeconds": 20,
                "questions": [
                    {"text": "1+1?", "options": [{"text": "2", "isCorrect": true}]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(quiz.submission_id(), "abc");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz.time_limit(), Some(20));
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            Quiz::from_json("{\"id\": 3}"),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_from_json_without_questions_is_empty() {
        assert_eq!(
            Quiz::from_json(r#"{"id": "x", "questions": []}"#),
            Err(Error::Empty)
        );
    }
}
