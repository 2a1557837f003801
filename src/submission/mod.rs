//! Result submission with local fallback
//!
//! When a session completes, the engine freezes its ledger into a
//! `PendingSubmission`: the wire request for the backend plus the locally
//! computed result. The `Coordinator` then tries the backend and, on any
//! failure, hands back the local result together with the reason. It never
//! fails itself, so a session can always finish.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::ClientConfig,
    ledger::{AnswerLedger, AnswerRecord},
    quiz::question::Question,
    session::SessionId,
};

/// One question's entry in a submission
///
/// Selected answers are sent by option text, not index; the backend matches
/// answers by text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    /// The question's id, or its position when the generator omitted one
    pub question_id: String,
    /// Text of the chosen option; empty for timed-out or unanswered questions
    pub selected_answers: Vec<String>,
}

/// The request sent to the submission service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    /// Backend quiz identifier
    pub quiz_id: String,
    /// One entry per question, in quiz order
    pub answers: Vec<SubmittedAnswer>,
}

/// Result computed and returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerResult {
    /// Number of questions scored
    pub total_questions: usize,
    /// Number of correct answers
    pub correct_count: usize,
    /// Backend score
    pub score: u32,
    /// Backend percentage; kept for display only
    pub percentage: f64,
    /// When the backend recorded the submission
    pub completed_at: DateTime<Utc>,
    /// Backend identifier of the stored submission
    pub submission_id: String,
}

/// Result computed on the device by replaying the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalResult {
    /// Number of questions scored
    pub total_questions: usize,
    /// Number of correct answers
    pub correct_count: usize,
}

/// The final score of a session, from whichever side produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum SubmissionResult {
    /// The backend accepted the submission
    Server(ServerResult),
    /// The result was computed locally
    Local(LocalResult),
}

impl SubmissionResult {
    /// Number of questions the result covers
    pub fn total_questions(&self) -> usize {
        match self {
            Self::Server(r) => r.total_questions,
            Self::Local(r) => r.total_questions,
        }
    }

    /// Number of questions answered correctly
    pub fn correct_count(&self) -> usize {
        match self {
            Self::Server(r) => r.correct_count,
            Self::Local(r) => r.correct_count,
        }
    }

    /// Whether the backend produced this result
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }
}

/// Errors that can occur while talking to the submission service
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The request could not be sent or the connection failed
    #[error("submission request failed: {0}")]
    Http(String),
    /// The service answered with a non-success status
    #[error("submission rejected with status {0}")]
    HttpStatus(u16),
    /// The response body did not match the expected result shape
    #[error("submission response could not be decoded: {0}")]
    Decode(String),
    /// The service did not answer in time
    #[error("submission timed out")]
    Timeout,
    /// The configured base URL cannot carry a submission path
    #[error("invalid submission base url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::HttpStatus(status.as_u16())
        } else {
            Self::Http(error.to_string())
        }
    }
}

/// The external submission service
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submits the answers of one completed session
    ///
    /// # Errors
    ///
    /// Any transport or server failure. The coordinator treats every error
    /// the same way.
    async fn submit(&self, request: &SubmissionRequest) -> Result<ServerResult, Error>;
}

/// Everything needed to resolve a completed session, frozen at completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    /// Session the submission belongs to
    pub session: SessionId,
    /// Wire request for the backend
    pub request: SubmissionRequest,
    /// Result to fall back on
    pub local: LocalResult,
}

impl PendingSubmission {
    /// Freezes the ledger of a completed session
    pub fn new(
        session: SessionId,
        quiz_id: &str,
        questions: &[Question],
        ledger: &AnswerLedger,
    ) -> Self {
        let score = ledger.score(questions);
        Self {
            session,
            request: SubmissionRequest {
                quiz_id: quiz_id.to_owned(),
                answers: build_answers(questions, ledger),
            },
            local: LocalResult {
                total_questions: score.total,
                correct_count: score.correct,
            },
        }
    }
}

/// How a pending submission was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The backend accepted the submission
    Server(ServerResult),
    /// No submission was attempted
    Local(LocalResult),
    /// The backend call failed and the local result stands in for it
    Degraded {
        /// The locally computed result
        local: LocalResult,
        /// Why the backend call failed
        error: Error,
    },
}

impl SubmissionOutcome {
    /// The result to show
    pub fn result(&self) -> SubmissionResult {
        match self {
            Self::Server(r) => SubmissionResult::Server(r.clone()),
            Self::Local(local) | Self::Degraded { local, .. } => SubmissionResult::Local(*local),
        }
    }

    /// The backend failure, if the submission degraded to a local result
    pub fn failure(&self) -> Option<&Error> {
        match self {
            Self::Degraded { error, .. } => Some(error),
            Self::Server(_) | Self::Local(_) => None,
        }
    }

    /// Whether the user should be told the result is locally computed
    pub fn is_degraded(&self) -> bool {
        self.failure().is_some()
    }
}

/// Builds one `SubmittedAnswer` per question from the ledger
pub fn build_answers(questions: &[Question], ledger: &AnswerLedger) -> Vec<SubmittedAnswer> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| SubmittedAnswer {
            question_id: question.question_id(index),
            selected_answers: match ledger.get(index) {
                Some(AnswerRecord::Selected(option)) => question
                    .option(option)
                    .map(|o| o.text.clone())
                    .into_iter()
                    .collect_vec(),
                Some(AnswerRecord::TimedOut | AnswerRecord::Unanswered) | None => Vec::new(),
            },
        })
        .collect_vec()
}

/// Resolves pending submissions against an optional submission service
#[derive(Clone, Default)]
pub struct Coordinator {
    submitter: Option<Arc<dyn Submitter>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("online", &self.submitter.is_some())
            .finish()
    }
}

impl Coordinator {
    /// Creates a coordinator backed by `submitter`
    pub fn new(submitter: Arc<dyn Submitter>) -> Self {
        Self {
            submitter: Some(submitter),
        }
    }

    /// Creates a coordinator that always resolves locally
    pub fn offline() -> Self {
        Self::default()
    }

    /// Creates a coordinator from the environment
    ///
    /// Without `QUIZ_API_BASE_URL` the coordinator is offline.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for an unusable base URL, or `Error::Http`
    /// if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, Error> {
        match ClientConfig::from_env() {
            Some(config) => Ok(Self::new(Arc::new(http::HttpSubmitter::new(config)?))),
            None => {
                tracing::info!("QUIZ_API_BASE_URL not set, results will be computed locally");
                Ok(Self::offline())
            }
        }
    }

    /// Resolves a pending submission; never fails
    ///
    /// An empty quiz id, or no configured submitter, skips the network call
    /// entirely. Any submitter failure yields `SubmissionOutcome::Degraded`
    /// carrying the precomputed local result.
    pub async fn resolve(&self, pending: &PendingSubmission) -> SubmissionOutcome {
        if pending.request.quiz_id.trim().is_empty() {
            tracing::info!(session = %pending.session, "quiz id is empty, resolving locally");
            return SubmissionOutcome::Local(pending.local);
        }

        let Some(submitter) = &self.submitter else {
            tracing::info!(session = %pending.session, "no submission service, resolving locally");
            return SubmissionOutcome::Local(pending.local);
        };

        match submitter.submit(&pending.request).await {
            Ok(result) => {
                tracing::info!(
                    session = %pending.session,
                    submission_id = %result.submission_id,
                    correct = result.correct_count,
                    total = result.total_questions,
                    "submission accepted"
                );
                SubmissionOutcome::Server(result)
            }
            Err(error) => {
                tracing::warn!(
                    session = %pending.session,
                    %error,
                    "submission failed, falling back to local result"
                );
                SubmissionOutcome::Degraded {
                    local: pending.local,
                    error,
                }
            }
        }
    }
}
