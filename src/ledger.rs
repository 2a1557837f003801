//! Write-once answer records
//!
//! The ledger holds exactly one `AnswerRecord` per question. A record starts
//! as `Unanswered` and may be written once; every later write for the same
//! index is rejected. This is what makes a stray input arriving after a
//! timeout (or a timeout arriving after an input) harmless: whichever event
//! reaches the ledger first wins and the other is discarded.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quiz::question::Question;

/// The user's decision for one question
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "option", rename_all = "camelCase")]
pub enum AnswerRecord {
    /// No decision yet
    #[default]
    Unanswered,
    /// The user picked the option at this index
    Selected(usize),
    /// The countdown ran out before the user picked anything
    TimedOut,
}

impl AnswerRecord {
    /// Whether this record is final
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unanswered)
    }

    /// The selected option index, if the user picked one
    pub fn selected(self) -> Option<usize> {
        match self {
            Self::Selected(option) => Some(option),
            Self::Unanswered | Self::TimedOut => None,
        }
    }
}

/// Errors that can occur when writing to the ledger
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The record at this index is already terminal
    #[error("question {index} already has a terminal answer")]
    InvalidTransition {
        /// Index of the question that was already answered
        index: usize,
    },
    /// There is no question at this index
    #[error("question {index} does not exist")]
    OutOfRange {
        /// The requested index
        index: usize,
    },
    /// `Unanswered` was passed as a new record
    #[error("unanswered is not a terminal record")]
    NotTerminal,
}

/// Aggregate of correct answers over all questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Number of questions answered with an option marked correct
    pub correct: usize,
    /// Number of questions in the quiz
    pub total: usize,
}

/// Authoritative record of one answer decision per question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerLedger {
    records: Vec<AnswerRecord>,
}

impl AnswerLedger {
    /// Creates a ledger with `len` unanswered records
    pub fn new(len: usize) -> Self {
        Self {
            records: vec![AnswerRecord::Unanswered; len],
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger has no records at all
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in question order
    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }

    /// Returns the record at `index`
    pub fn get(&self, index: usize) -> Option<AnswerRecord> {
        self.records.get(index).copied()
    }

    /// Writes a terminal record for `index`
    ///
    /// # Errors
    ///
    /// * `Error::InvalidTransition` if the record is already terminal
    /// * `Error::OutOfRange` if `index` is past the end
    /// * `Error::NotTerminal` if `record` is `Unanswered`
    pub fn record(&mut self, index: usize, record: AnswerRecord) -> Result<(), Error> {
        if !record.is_terminal() {
            return Err(Error::NotTerminal);
        }
        let slot = self
            .records
            .get_mut(index)
            .ok_or(Error::OutOfRange { index })?;
        if slot.is_terminal() {
            return Err(Error::InvalidTransition { index });
        }
        *slot = record;
        Ok(())
    }

    /// Whether the record at `index` is terminal
    pub fn is_answered(&self, index: usize) -> bool {
        self.get(index).is_some_and(AnswerRecord::is_terminal)
    }

    /// Whether every record is terminal
    pub fn is_complete(&self) -> bool {
        self.records.iter().all(|r| r.is_terminal())
    }

    /// Whether the record at `index` selects an option marked correct
    pub fn is_correct(&self, index: usize, question: &Question) -> bool {
        self.get(index)
            .and_then(AnswerRecord::selected)
            .is_some_and(|option| question.is_correct(option))
    }

    /// Counts correct answers against `questions`
    ///
    /// `TimedOut` and `Unanswered` never count as correct.
    pub fn score(&self, questions: &[Question]) -> Score {
        Score {
            correct: questions
                .iter()
                .enumerate()
                .filter(|(index, question)| self.is_correct(*index, question))
                .count(),
            total: questions.len(),
        }
    }

    /// Indices whose record is terminal
    pub fn answered_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .positions(|r| r.is_terminal())
            .collect_vec()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::quiz::question::AnswerOption;

    fn questions() -> Vec<Question> {
        (0..3)
            .map(|i| Question {
                id: None,
                text: format!("Q{i}"),
                options: vec![
                    AnswerOption::new("right", true),
                    AnswerOption::new("wrong", false),
                ],
                explanation: None,
            })
            .collect()
    }

    #[test]
    fn test_new_ledger_is_unanswered() {
        let ledger = AnswerLedger::new(3);
        assert_eq!(ledger.len(), 3);
        assert!(ledger.records().iter().all(|r| *r == AnswerRecord::Unanswered));
        assert!(!ledger.is_answered(0));
        assert!(!ledger.is_complete());
    }

    #[test]
    fn test_record_is_write_once() {
        let mut ledger = AnswerLedger::new(2);
        assert_eq!(ledger.record(0, AnswerRecord::Selected(1)), Ok(()));
        assert_eq!(
            ledger.record(0, AnswerRecord::Selected(0)),
            Err(Error::InvalidTransition { index: 0 })
        );
        assert_eq!(
            ledger.record(0, AnswerRecord::TimedOut),
            Err(Error::InvalidTransition { index: 0 })
        );
        assert_eq!(ledger.get(0), Some(AnswerRecord::Selected(1)));
    }

    #[test]
    fn test_timed_out_blocks_late_selection() {
        let mut ledger = AnswerLedger::new(1);
        ledger.record(0, AnswerRecord::TimedOut).unwrap();
        assert_eq!(
            ledger.record(0, AnswerRecord::Selected(0)),
            Err(Error::InvalidTransition { index: 0 })
        );
        assert!(ledger.is_answered(0));
    }

    #[test]
    fn test_record_out_of_range() {
        let mut ledger = AnswerLedger::new(1);
        assert_eq!(
            ledger.record(5, AnswerRecord::TimedOut),
            Err(Error::OutOfRange { index: 5 })
        );
    }

    #[test]
    fn test_unanswered_cannot_be_recorded() {
        let mut ledger = AnswerLedger::new(1);
        assert_eq!(
            ledger.record(0, AnswerRecord::Unanswered),
            Err(Error::NotTerminal)
        );
    }

    #[test]
    fn test_score_ignores_timeouts_and_unanswered() {
        let questions = questions();
        let mut ledger = AnswerLedger::new(3);
        ledger.record(0, AnswerRecord::Selected(0)).unwrap();
        ledger.record(1, AnswerRecord::TimedOut).unwrap();

        assert_eq!(
            ledger.score(&questions),
            Score {
                correct: 1,
                total: 3
            }
        );
    }

    #[test]
    fn test_score_counts_any_option_marked_correct() {
        let mut questions = questions();
        questions[0].options[1].is_correct = true;
        questions[1].options[0].is_correct = false;

        let mut ledger = AnswerLedger::new(3);
        ledger.record(0, AnswerRecord::Selected(1)).unwrap();
        ledger.record(1, AnswerRecord::Selected(0)).unwrap();
        ledger.record(2, AnswerRecord::Selected(1)).unwrap();

        assert_eq!(ledger.score(&questions).correct, 1);
        assert!(ledger.is_complete());
        assert_eq!(ledger.answered_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_record_serialization() {
        assert_eq!(
            serde_json::to_string(&AnswerRecord::Selected(2)).unwrap(),
            r#"{"kind":"selected","option":2}"#
        );
        assert_eq!(
            serde_json::to_string(&AnswerRecord::TimedOut).unwrap(),
            r#"{"kind":"timedOut"}"#
        );
    }
}
