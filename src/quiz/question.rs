//! Questions and answer options

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A single answer option attached to a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    /// Text shown to the user; this is also what gets submitted to the backend
    #[garde(length(max = crate::constants::answer_text::MAX_LENGTH))]
    pub text: String,
    /// Whether choosing this option counts as a correct answer
    #[garde(skip)]
    #[serde(default)]
    pub is_correct: bool,
}

impl AnswerOption {
    /// Creates an option with the given text and correctness
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

/// A multiple choice question
///
/// Any number of options may be marked correct. Scoring only ever looks at
/// whether the selected option is marked correct, so zero or several correct
/// options are both well-defined.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Server-side identifier; may be omitted by the generator
    #[garde(skip)]
    #[serde(default)]
    pub id: Option<String>,
    /// The question prompt
    #[garde(length(max = crate::constants::question::MAX_TEXT_LENGTH))]
    pub text: String,
    /// Ordered answer options
    #[garde(length(min = 1, max = crate::constants::question::MAX_OPTION_COUNT), dive)]
    pub options: Vec<AnswerOption>,
    /// Explanation revealed once the question is answered or timed out
    #[garde(length(max = crate::constants::question::MAX_EXPLANATION_LENGTH))]
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    /// Identifier used when submitting this question
    ///
    /// Falls back to the question's position so that submissions stay
    /// well-formed when the generator omitted the id.
    pub fn question_id(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| index.to_string())
    }

    /// Returns the option at `index`, if any
    pub fn option(&self, index: usize) -> Option<&AnswerOption> {
        self.options.get(index)
    }

    /// Whether `option_index` points at an option marked correct
    pub fn is_correct(&self, option_index: usize) -> bool {
        self.option(option_index).is_some_and(|o| o.is_correct)
    }

    /// Indices of every option marked correct
    pub fn correct_indices(&self) -> Vec<usize> {
        self.options.iter().positions(|o| o.is_correct).collect_vec()
    }

    /// Texts of every option marked correct
    pub fn correct_texts(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.text.clone())
            .collect_vec()
    }

    /// Texts of all options in display order
    pub fn option_texts(&self) -> Vec<String> {
        self.options.iter().map(|o| o.text.clone()).collect_vec()
    }
}
