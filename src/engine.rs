//! Quiz session state machine
//!
//! This module contains the engine that drives one quiz attempt from the
//! first question to the final result. It owns the answer ledger and the
//! question timer, reacts to user actions and timer alarms, and hands a
//! frozen `PendingSubmission` to the caller when the last question is done.
//!
//! The engine is synchronous. Every method runs to completion on the
//! caller's thread, and timing is expressed through the `schedule_message`
//! closure exactly like any other deferred event. Hosts serialize user input
//! and alarms onto one thread; see `runner` for the tokio host.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use web_time::Instant;

use crate::{
    ledger::{AnswerLedger, AnswerRecord},
    quiz::{
        config::{self, Quiz},
        question::Question,
    },
    result::{self, Summary},
    session::{SessionId, Tunnel},
    submission::{Coordinator, PendingSubmission, SubmissionOutcome, SubmissionResult},
    timer::{AlarmMessage, Fired, QuestionTimer},
};

/// Where the session currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// The question is on screen and accepts one answer or one timeout
    AwaitingAnswer(usize),
    /// The question has a terminal record; feedback is shown
    Answered(usize),
    /// Every question is done and the result has been requested
    Complete,
}

/// Navigation request from the UI
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Previous question; from the first question this leaves the session
    Back,
    /// Next question; from the last question this completes the session
    Forward,
}

/// Coarse phase of the session, for UI layers that only switch screens
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the user to pick an option
    Answering,
    /// Showing feedback for a locked-in answer
    Feedback,
    /// Waiting for the submission to resolve
    Submitting,
    /// The result is available
    Finished,
    /// The user left the session
    Abandoned,
}

/// What a navigation request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Another question is now on screen
    Moved(usize),
    /// The last question was passed; `None` if a submission was already pending
    Completed(Option<PendingSubmission>),
    /// The user backed out of the first question and the session is over
    Left,
}

/// Errors returned by engine operations
///
/// Only `InvalidQuizData` is fatal. Everything else describes an event that
/// was discarded; the session itself is unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The quiz payload cannot start a session
    #[error(transparent)]
    InvalidQuizData(#[from] config::Error),
    /// The question already has a terminal record
    #[error("question {index} already has a terminal answer")]
    InvalidTransition {
        /// Index of the question the event was meant for
        index: usize,
    },
    /// The option index does not exist on the question
    #[error("question {index} has no option {option}")]
    InvalidOption {
        /// Index of the question on screen
        index: usize,
        /// The requested option
        option: usize,
    },
    /// The navigation is not allowed from the current state
    #[error("cannot navigate {direction:?} from question {index}")]
    InvalidNavigation {
        /// Index of the question on screen
        index: usize,
        /// The requested direction
        direction: Direction,
    },
    /// Completion was requested before the last question was answered
    #[error("not every question has been answered")]
    QuestionsRemaining,
    /// A submission outcome arrived with no submission in flight
    #[error("no submission is pending")]
    NoSubmissionPending,
    /// The final result was requested before the session finished
    #[error("session is not complete")]
    NotComplete,
    /// The user left the session
    #[error("session was abandoned")]
    Abandoned,
}

/// Update messages pushed to the UI as the session progresses
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UpdateMessage {
    /// A question is now on screen
    QuestionAnnouncement {
        /// Index of the question (0-based)
        index: usize,
        /// Total number of questions
        count: usize,
        /// The question text
        question: String,
        /// Option texts in display order
        options: Vec<String>,
        /// Countdown length in seconds; absent for untimed or answered questions
        duration: Option<u64>,
    },
    /// The countdown advanced
    Tick {
        /// Index of the question
        index: usize,
        /// Whole seconds left
        remaining: u64,
    },
    /// A question's record is terminal; reveal correctness
    AnswerFeedback {
        /// Index of the question
        index: usize,
        /// The stored record
        record: AnswerRecord,
        /// Whether the stored record is a correct answer
        correct: bool,
        /// Indices of every option marked correct
        correct_options: Vec<usize>,
        /// Explanation, if the question has one
        explanation: Option<String>,
    },
    /// The result has been requested
    Submitting,
    /// The backend failed; the result that follows is locally computed
    SubmissionDegraded {
        /// Human-readable failure reason
        reason: String,
    },
    /// The final result is available
    Finished(Box<Summary>),
    /// The user left the session
    Abandoned,
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Full snapshot of what the UI should show
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    /// Session the snapshot belongs to
    pub session: SessionId,
    /// Coarse phase of the session
    pub phase: Phase,
    /// Index of the question on screen
    pub index: usize,
    /// Total number of questions
    pub count: usize,
    /// Quiz title
    pub title: String,
    /// Text of the question on screen
    pub question: String,
    /// Option texts in display order
    pub options: Vec<String>,
    /// Configured limit; `None` for untimed quizzes
    pub time_limit: Option<u64>,
    /// Seconds left on the countdown for this question, if one is running
    pub remaining_seconds: Option<u64>,
    /// Stored decision for the question on screen
    pub record: AnswerRecord,
    /// Revealed once the question is answered or timed out
    pub correct_options: Option<Vec<usize>>,
    /// Revealed once the question is answered or timed out
    pub explanation: Option<String>,
    /// Whether a back move is allowed
    pub can_go_back: bool,
    /// Whether a forward move is allowed
    pub can_advance: bool,
    /// Whether this is the last question
    pub is_last: bool,
}

/// The quiz session engine
///
/// Owns all mutable state of one attempt. Nothing else writes to the ledger
/// or the timer.
#[derive(Debug)]
pub struct Engine {
    id: SessionId,
    quiz: Quiz,
    ledger: AnswerLedger,
    timer: QuestionTimer,
    /// When each question first appeared
    shown_at: Vec<Option<Instant>>,
    /// How long each answer took to lock in
    elapsed: Vec<Option<Duration>>,
    current: usize,
    state: State,
    started: bool,
    is_submitting: bool,
    abandoned: bool,
    outcome: Option<SubmissionOutcome>,
    summary: Option<Summary>,
}

impl Engine {
    /// Creates an engine for `quiz` without showing anything yet
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuizData` when the quiz has no questions, no
    /// id, or violates a configured limit.
    pub fn new(quiz: Quiz) -> Result<Self, Error> {
        quiz.check()?;

        let len = quiz.len();
        Ok(Self {
            id: SessionId::new(),
            ledger: AnswerLedger::new(len),
            timer: QuestionTimer::new(),
            shown_at: vec![None; len],
            elapsed: vec![None; len],
            current: 0,
            state: State::AwaitingAnswer(0),
            started: false,
            is_submitting: false,
            abandoned: false,
            outcome: None,
            summary: None,
            quiz,
        })
    }

    /// Creates an engine and shows the first question
    ///
    /// # Errors
    ///
    /// See `Engine::new`.
    pub fn start_session<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        quiz: Quiz,
        tunnel: &T,
        schedule_message: S,
    ) -> Result<Self, Error> {
        let mut engine = Self::new(quiz)?;
        engine.start(tunnel, schedule_message);
        Ok(engine)
    }

    /// Shows the first question and starts its countdown
    ///
    /// Calling this more than once has no effect.
    pub fn start<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        tunnel: &T,
        schedule_message: S,
    ) {
        if self.started || self.abandoned {
            return;
        }
        self.started = true;

        tracing::info!(
            session = %self.id,
            quiz = self.quiz.submission_id(),
            questions = self.quiz.len(),
            time_limit = self.quiz.time_limit_seconds,
            "quiz session started"
        );

        self.enter(0, tunnel, schedule_message);
    }

    /// Locks in `option` for the question on screen
    ///
    /// # Errors
    ///
    /// * `Error::InvalidTransition` if the question already has a terminal
    ///   record (re-answering, or the timeout won the race)
    /// * `Error::InvalidOption` if the option does not exist
    /// * `Error::Abandoned` if the user left the session
    pub fn select_answer<T: Tunnel>(&mut self, option: usize, tunnel: &T) -> Result<(), Error> {
        self.ensure_live()?;

        let State::AwaitingAnswer(index) = self.state else {
            let error = Error::InvalidTransition {
                index: self.current,
            };
            tracing::warn!(session = %self.id, %error, option, "discarding answer");
            return Err(error);
        };

        if self.question(index).option(option).is_none() {
            return Err(Error::InvalidOption { index, option });
        }

        self.ledger
            .record(index, AnswerRecord::Selected(option))
            .map_err(|error| {
                tracing::warn!(session = %self.id, %error, "discarding answer");
                Error::InvalidTransition { index }
            })?;
        self.timer.cancel();

        tracing::debug!(session = %self.id, index, option, "answer locked in");
        self.lock_in(index, tunnel);

        Ok(())
    }

    /// Applies a timer alarm delivered by the host
    ///
    /// Stale alarms, and any alarm arriving after completion or exit, are
    /// dropped.
    ///
    /// # Returns
    ///
    /// `true` if the alarm timed out the question on screen
    pub fn receive_alarm<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        message: &AlarmMessage,
        tunnel: &T,
        schedule_message: S,
    ) -> bool {
        if self.abandoned || self.state == State::Complete {
            tracing::debug!(session = %self.id, ?message, "dropping alarm for inactive session");
            return false;
        }

        match self.timer.receive_alarm(message, schedule_message) {
            Fired::Stale => {
                tracing::debug!(session = %self.id, ?message, "dropping stale alarm");
                false
            }
            Fired::Tick { index, remaining } => {
                tunnel.send_message(&UpdateMessage::Tick { index, remaining });
                false
            }
            Fired::Timeout { index } => self.time_out(index, tunnel),
        }
    }

    fn time_out<T: Tunnel>(&mut self, index: usize, tunnel: &T) -> bool {
        if self.state != State::AwaitingAnswer(index) {
            tracing::warn!(session = %self.id, index, "discarding timeout for question not on screen");
            return false;
        }

        match self.ledger.record(index, AnswerRecord::TimedOut) {
            Ok(()) => {
                tracing::info!(session = %self.id, index, "question timed out");
                self.lock_in(index, tunnel);
                true
            }
            Err(error) => {
                tracing::warn!(session = %self.id, %error, "discarding timeout");
                false
            }
        }
    }

    /// Moves between questions
    ///
    /// Going back redisplays the previous question with its stored answer and
    /// never restarts its countdown. It is only allowed once the question on
    /// screen is answered, so a running countdown can never be left and
    /// restarted. Going back from the first question leaves the session.
    /// Going forward is only allowed once the question on screen is answered;
    /// from the last question it completes the session.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidNavigation` for moves away from an unanswered question
    ///   other than leaving from the first one, or any move after completion
    /// * `Error::Abandoned` if the user left the session
    pub fn navigate<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        direction: Direction,
        tunnel: &T,
        schedule_message: S,
    ) -> Result<Navigation, Error> {
        self.ensure_live()?;

        let invalid = Error::InvalidNavigation {
            index: self.current,
            direction,
        };

        match (direction, self.state) {
            (_, State::Complete) => Err(invalid),
            (Direction::Back, _) if self.current == 0 => {
                self.exit(tunnel);
                Ok(Navigation::Left)
            }
            (Direction::Back, State::AwaitingAnswer(index)) => {
                tracing::warn!(session = %self.id, index, "discarding back move from unanswered question");
                Err(invalid)
            }
            (Direction::Back, State::Answered(_)) => {
                let target = self.current - 1;
                self.enter(target, tunnel, schedule_message);
                Ok(Navigation::Moved(target))
            }
            (Direction::Forward, State::Answered(index)) if index + 1 < self.quiz.len() => {
                self.enter(index + 1, tunnel, schedule_message);
                Ok(Navigation::Moved(index + 1))
            }
            (Direction::Forward, State::Answered(_)) => {
                Ok(Navigation::Completed(self.complete(tunnel)?))
            }
            (Direction::Forward, State::AwaitingAnswer(_)) => Err(invalid),
        }
    }

    /// Completes the session and freezes the ledger for submission
    ///
    /// # Returns
    ///
    /// The pending submission the caller must resolve, or `None` if the
    /// session was already completed; a second completion is a no-op.
    ///
    /// # Errors
    ///
    /// * `Error::QuestionsRemaining` unless the last question is on screen
    ///   and answered
    /// * `Error::Abandoned` if the user left the session
    pub fn complete<T: Tunnel>(&mut self, tunnel: &T) -> Result<Option<PendingSubmission>, Error> {
        self.ensure_live()?;

        if self.state == State::Complete {
            tracing::debug!(session = %self.id, "ignoring duplicate completion");
            return Ok(None);
        }
        if self.state != State::Answered(self.quiz.len() - 1) {
            return Err(Error::QuestionsRemaining);
        }

        self.timer.cancel();
        self.state = State::Complete;
        self.is_submitting = true;

        let pending = PendingSubmission::new(
            self.id,
            self.quiz.submission_id(),
            &self.quiz.questions,
            &self.ledger,
        );

        tracing::info!(
            session = %self.id,
            correct = pending.local.correct_count,
            total = pending.local.total_questions,
            "quiz session complete"
        );

        tunnel.send_message(&UpdateMessage::Submitting);
        tunnel.send_state(&self.display_state());

        Ok(Some(pending))
    }

    /// Applies the resolved submission and projects the final summary
    ///
    /// # Errors
    ///
    /// * `Error::Abandoned` if the user left while the submission was in
    ///   flight; the outcome is dropped
    /// * `Error::NoSubmissionPending` if nothing was submitted, or the outcome
    ///   was already applied
    pub fn finish<T: Tunnel>(
        &mut self,
        outcome: SubmissionOutcome,
        tunnel: &T,
    ) -> Result<&Summary, Error> {
        self.ensure_live()?;

        if !self.is_submitting {
            return Err(Error::NoSubmissionPending);
        }
        self.is_submitting = false;

        if let Some(error) = outcome.failure() {
            tunnel.send_message(&UpdateMessage::SubmissionDegraded {
                reason: error.to_string(),
            });
        }

        let summary = result::project(
            &outcome.result(),
            &self.quiz.questions,
            &self.ledger,
            &self.elapsed,
        )
        .degraded(outcome.is_degraded());

        tunnel.send_message(&UpdateMessage::Finished(Box::new(summary.clone())));

        self.outcome = Some(outcome);
        self.summary = Some(summary);
        tunnel.send_state(&self.display_state());

        self.summary.as_ref().ok_or(Error::NotComplete)
    }

    /// Completes the session and resolves it through `coordinator`
    ///
    /// Convenience for hosts that can await in place. Returns `None` when the
    /// session had already been completed.
    ///
    /// # Errors
    ///
    /// See `Engine::complete` and `Engine::finish`.
    pub async fn complete_and_submit<T: Tunnel>(
        &mut self,
        coordinator: &Coordinator,
        tunnel: &T,
    ) -> Result<Option<&Summary>, Error> {
        let Some(pending) = self.complete(tunnel)? else {
            return Ok(None);
        };
        let outcome = coordinator.resolve(&pending).await;
        self.finish(outcome, tunnel).map(Some)
    }

    /// Leaves the session
    ///
    /// Cancels the countdown. A submission still in flight may complete, but
    /// its outcome will be rejected by `finish`.
    pub fn exit<T: Tunnel>(&mut self, tunnel: &T) {
        if self.abandoned {
            return;
        }
        self.timer.cancel();
        self.abandoned = true;

        if self.is_submitting {
            tracing::info!(session = %self.id, "session left with a submission in flight");
        } else {
            tracing::info!(session = %self.id, index = self.current, "session left");
        }

        tunnel.send_message(&UpdateMessage::Abandoned);
        tunnel.send_state(&self.display_state());
    }

    /// Snapshot of everything the UI needs to draw the current screen
    pub fn display_state(&self) -> DisplayState {
        let index = self.current;
        let question = self.question(index);
        let record = self.ledger.get(index).unwrap_or_default();
        let answered = record.is_terminal();
        let live = !self.abandoned && self.state != State::Complete;

        DisplayState {
            session: self.id,
            phase: self.phase(),
            index,
            count: self.quiz.len(),
            title: self.quiz.title.clone(),
            question: question.text.clone(),
            options: question.option_texts(),
            time_limit: self.quiz.time_limit(),
            remaining_seconds: if self.timer.running_index() == Some(index) {
                self.timer.remaining()
            } else {
                None
            },
            record,
            correct_options: answered.then(|| question.correct_indices()),
            explanation: if answered {
                question.explanation.clone()
            } else {
                None
            },
            can_go_back: live && index > 0 && answered,
            can_advance: live && matches!(self.state, State::Answered(_)),
            is_last: index + 1 == self.quiz.len(),
        }
    }

    /// The final result, available once the submission has resolved
    ///
    /// # Errors
    ///
    /// Returns `Error::NotComplete` before that.
    pub fn final_result(&self) -> Result<SubmissionResult, Error> {
        self.outcome
            .as_ref()
            .map(SubmissionOutcome::result)
            .ok_or(Error::NotComplete)
    }

    /// The final summary, once available
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// The resolved submission outcome, once available
    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        self.outcome.as_ref()
    }

    /// The session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Index of the question on screen
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The answer ledger
    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    /// The quiz this session was built from
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Whether a submission is in flight
    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    /// Whether the user left the session
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Whether a countdown is running
    pub fn is_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    fn phase(&self) -> Phase {
        if self.abandoned {
            Phase::Abandoned
        } else if self.summary.is_some() {
            Phase::Finished
        } else {
            match self.state {
                State::AwaitingAnswer(_) => Phase::Answering,
                State::Answered(_) => Phase::Feedback,
                State::Complete => Phase::Submitting,
            }
        }
    }

    fn ensure_live(&self) -> Result<(), Error> {
        if self.abandoned {
            Err(Error::Abandoned)
        } else {
            Ok(())
        }
    }

    fn question(&self, index: usize) -> &Question {
        &self.quiz.questions[index]
    }

    /// Puts `index` on screen
    ///
    /// An answered question is redisplayed with its feedback and no
    /// countdown. An unanswered one gets a fresh countdown.
    fn enter<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        index: usize,
        tunnel: &T,
        schedule_message: S,
    ) {
        self.timer.cancel();
        self.current = index;

        let answered = self.ledger.is_answered(index);
        if answered {
            self.state = State::Answered(index);
        } else {
            self.state = State::AwaitingAnswer(index);
            self.shown_at[index].get_or_insert_with(Instant::now);
            self.timer
                .start(index, self.quiz.time_limit_seconds, schedule_message);
        }

        let question = self.question(index);
        tunnel.send_message(&UpdateMessage::QuestionAnnouncement {
            index,
            count: self.quiz.len(),
            question: question.text.clone(),
            options: question.option_texts(),
            duration: if answered {
                None
            } else {
                self.quiz.time_limit()
            },
        });
        if answered {
            tunnel.send_message(&self.feedback(index));
        }
        tunnel.send_state(&self.display_state());
    }

    fn lock_in<T: Tunnel>(&mut self, index: usize, tunnel: &T) {
        self.elapsed[index] = self.shown_at[index].map(|shown| shown.elapsed());
        self.state = State::Answered(index);

        tunnel.send_message(&self.feedback(index));
        tunnel.send_state(&self.display_state());
    }

    fn feedback(&self, index: usize) -> UpdateMessage {
        let question = self.question(index);
        UpdateMessage::AnswerFeedback {
            index,
            record: self.ledger.get(index).unwrap_or_default(),
            correct: self.ledger.is_correct(index, question),
            correct_options: question.correct_indices(),
            explanation: question.explanation.clone(),
        }
    }
}
