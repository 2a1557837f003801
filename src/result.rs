//! Final result summary
//!
//! `project` turns a finished session into something a UI can show: the
//! percentage, a qualitative band, and a per-question review list that pairs
//! each stored answer with its correctness. It is a pure function of its
//! inputs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    constants::band,
    ledger::{AnswerLedger, AnswerRecord},
    quiz::question::Question,
    submission::SubmissionResult,
};

/// Qualitative grouping of a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    /// 80% and above
    Excellent,
    /// 60% up to 80%
    Good,
    /// 40% up to 60%
    Fair,
    /// Below 40%
    NeedsPractice,
}

impl Band {
    /// Picks the band for `percentage`
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= band::EXCELLENT {
            Self::Excellent
        } else if percentage >= band::GOOD {
            Self::Good
        } else if percentage >= band::FAIR {
            Self::Fair
        } else {
            Self::NeedsPractice
        }
    }
}

/// Where the final numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Source {
    /// The backend computed the result
    Server,
    /// The device computed the result
    Local,
}

/// One question in the post-quiz review
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    /// Position of the question
    pub index: usize,
    /// Identifier the question was submitted under
    pub question_id: String,
    /// The question text
    pub question: String,
    /// The stored decision
    pub record: AnswerRecord,
    /// Text of the selected option
    pub answer: Option<String>,
    /// Texts of every option marked correct
    pub correct_answers: Vec<String>,
    /// Explanation, if the question has one
    pub explanation: Option<String>,
    /// Whether the stored decision is correct
    pub correct: bool,
    /// Time between the question first appearing and the answer locking in
    #[serde_as(as = "Option<serde_with::DurationSecondsWithFrac<f64>>")]
    pub elapsed: Option<Duration>,
}

/// Display model of a finished session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Which side produced the numbers
    pub source: Source,
    /// Number of questions scored
    pub total_questions: usize,
    /// Number of correct answers
    pub correct_count: usize,
    /// Exact percentage, zero when there are no questions
    pub percentage: f64,
    /// Percentage rounded for display
    pub rounded_percentage: u8,
    /// Qualitative band for the percentage
    pub band: Band,
    /// Backend score, when the backend produced the result
    pub score: Option<u32>,
    /// Backend identifier, when the backend produced the result
    pub submission_id: Option<String>,
    /// Backend completion time, when the backend produced the result
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the backend failed and the numbers are locally computed
    pub degraded: bool,
    /// One entry per question, in quiz order
    pub review: Vec<ReviewItem>,
}

impl Summary {
    /// Marks the summary as a local fallback for a failed submission
    #[must_use]
    pub fn degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }
}

/// Percentage of `correct` over `total`, zero when `total` is zero
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.
    } else {
        correct as f64 / total as f64 * 100.
    }
}

/// Projects a finished session into its display summary
///
/// `elapsed` holds the answer time per question and may be shorter than the
/// question list; missing entries are reported as unknown.
pub fn project(
    result: &SubmissionResult,
    questions: &[Question],
    ledger: &AnswerLedger,
    elapsed: &[Option<Duration>],
) -> Summary {
    let total_questions = result.total_questions();
    let correct_count = result.correct_count();
    let percentage = percentage(correct_count, total_questions);

    let (source, score, submission_id, completed_at) = match result {
        SubmissionResult::Server(r) => (
            Source::Server,
            Some(r.score),
            Some(r.submission_id.clone()),
            Some(r.completed_at),
        ),
        SubmissionResult::Local(_) => (Source::Local, None, None, None),
    };

    Summary {
        source,
        total_questions,
        correct_count,
        percentage,
        rounded_percentage: percentage.round().clamp(0., 100.) as u8,
        band: Band::from_percentage(percentage),
        score,
        submission_id,
        completed_at,
        degraded: false,
        review: questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let record = ledger.get(index).unwrap_or_default();
                ReviewItem {
                    index,
                    question_id: question.question_id(index),
                    question: question.text.clone(),
                    record,
                    answer: record
                        .selected()
                        .and_then(|option| question.option(option))
                        .map(|o| o.text.clone()),
                    correct_answers: question.correct_texts(),
                    explanation: question.explanation.clone(),
                    correct: ledger.is_correct(index, question),
                    elapsed: elapsed.get(index).copied().flatten(),
                }
            })
            .collect_vec(),
    }
}
