//! Tokio host for a quiz session
//!
//! The engine is synchronous and single-threaded; this module gives it a
//! home on a tokio runtime. One task owns the `Engine` and applies every
//! event in arrival order: user commands from `SessionHandle`, alarms
//! scheduled by the timer, and resolved submissions. Alarms and
//! submissions run in their own tasks and post back onto the session's
//! queue, so the engine is never touched concurrently.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    engine::{self, Direction, DisplayState, Engine, Navigation, Phase, UpdateMessage},
    quiz::config::Quiz,
    result::Summary,
    session::{SessionId, Tunnel},
    submission::{Coordinator, PendingSubmission, SubmissionOutcome},
    timer::AlarmMessage,
};

/// Errors returned by `SessionHandle`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The engine rejected the request
    #[error(transparent)]
    Engine(#[from] engine::Error),
    /// The session task has stopped
    #[error("session is closed")]
    Closed,
}

type Reply<T> = oneshot::Sender<Result<T, engine::Error>>;

#[derive(Debug)]
enum Command {
    Select { option: usize, reply: Reply<()> },
    Navigate {
        direction: Direction,
        reply: Reply<Navigation>,
    },
    Complete { reply: Reply<bool> },
    Exit,
}

/// Events produced inside the session
#[derive(Debug, derive_more::From)]
enum Event {
    Alarm(AlarmMessage),
    Submitted(SessionId, SubmissionOutcome),
}

/// Tunnel that publishes onto tokio channels
struct ChannelTunnel {
    updates: mpsc::UnboundedSender<UpdateMessage>,
    state: watch::Sender<DisplayState>,
    summary: watch::Sender<Option<Summary>>,
}

impl Tunnel for ChannelTunnel {
    fn send_message(&self, message: &UpdateMessage) {
        if let UpdateMessage::Finished(summary) = message {
            self.summary.send_replace(Some(summary.as_ref().clone()));
        }
        // nobody listening for updates is fine
        let _ = self.updates.send(message.clone());
    }

    fn send_state(&self, state: &DisplayState) {
        self.state.send_replace(state.clone());
    }

    fn close(self) {}
}

/// Handle to a running session
///
/// Cheap to clone. When the last handle is dropped the session is exited.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<DisplayState>,
    summary: watch::Receiver<Option<Summary>>,
}

impl SessionHandle {
    /// Identifier of the session
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Latest snapshot published by the session
    pub fn display_state(&self) -> DisplayState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified whenever the snapshot changes
    pub fn watch_state(&self) -> watch::Receiver<DisplayState> {
        self.state.clone()
    }

    /// Locks in an option for the question on screen
    ///
    /// # Errors
    ///
    /// Any `engine::Error` from `Engine::select_answer`, or `Error::Closed`.
    pub async fn select(&self, option: usize) -> Result<(), Error> {
        self.request(|reply| Command::Select { option, reply })
            .await
    }

    /// Moves to the previous or next question
    ///
    /// Moving forward past the last question completes the session and
    /// starts the submission in the background.
    ///
    /// # Errors
    ///
    /// Any `engine::Error` from `Engine::navigate`, or `Error::Closed`.
    pub async fn navigate(&self, direction: Direction) -> Result<Navigation, Error> {
        self.request(|reply| Command::Navigate { direction, reply })
            .await
    }

    /// Completes the session and starts the submission in the background
    ///
    /// # Returns
    ///
    /// `false` if the session had already been completed
    ///
    /// # Errors
    ///
    /// Any `engine::Error` from `Engine::complete`, or `Error::Closed`.
    pub async fn complete(&self) -> Result<bool, Error> {
        self.request(|reply| Command::Complete { reply }).await
    }

    /// Leaves the session; a no-op if it has already stopped
    pub fn exit(&self) {
        if self.commands.send(Command::Exit).is_err() {
            tracing::debug!(session = %self.id, "exit sent to closed session");
        }
    }

    /// Waits for the final summary
    ///
    /// # Errors
    ///
    /// `engine::Error::Abandoned` if the user left first, otherwise
    /// `Error::Closed` if the session stopped without a result.
    pub async fn finished(&self) -> Result<Summary, Error> {
        let mut summary = self.summary.clone();
        match summary.wait_for(Option::is_some).await {
            Ok(summary) => summary.clone().ok_or(Error::Closed),
            Err(_) if self.state.borrow().phase == Phase::Abandoned => {
                Err(engine::Error::Abandoned.into())
            }
            Err(_) => Err(Error::Closed),
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| Error::Closed)?;
        Ok(response.await.map_err(|_| Error::Closed)??)
    }
}

/// Owner of a session's engine inside its task
pub struct SessionRunner {
    engine: Engine,
    coordinator: Coordinator,
    tunnel: ChannelTunnel,
    events: mpsc::UnboundedSender<Event>,
}

impl SessionRunner {
    /// Validates `quiz`, spawns the session task, and shows the first question
    ///
    /// Must be called from within a tokio runtime. The returned receiver
    /// carries every `UpdateMessage` in order; dropping it is allowed.
    ///
    /// # Errors
    ///
    /// `engine::Error::InvalidQuizData` if the quiz cannot start a session.
    pub fn spawn(
        quiz: Quiz,
        coordinator: Coordinator,
    ) -> Result<(SessionHandle, mpsc::UnboundedReceiver<UpdateMessage>), Error> {
        let engine = Engine::new(quiz)?;
        let id = engine.id();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(engine.display_state());
        let (summary_tx, summary_rx) = watch::channel(None);

        let runner = Self {
            engine,
            coordinator,
            tunnel: ChannelTunnel {
                updates: updates_tx,
                state: state_tx,
                summary: summary_tx,
            },
            events: events_tx,
        };
        tokio::spawn(runner.run(commands_rx, events_rx));

        Ok((
            SessionHandle {
                id,
                commands: commands_tx,
                state: state_rx,
                summary: summary_rx,
            },
            updates_rx,
        ))
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        self.engine
            .start(&self.tunnel, schedule_message(&self.events));

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!(session = %self.engine.id(), "all handles dropped");
                        self.engine.exit(&self.tunnel);
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }

            if self.engine.is_abandoned() || self.engine.summary().is_some() {
                break;
            }
        }

        tracing::debug!(session = %self.engine.id(), "session task stopped");
        self.tunnel.close();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Select { option, reply } => {
                let _ = reply.send(self.engine.select_answer(option, &self.tunnel));
            }
            Command::Navigate { direction, reply } => {
                let navigation =
                    self.engine
                        .navigate(direction, &self.tunnel, schedule_message(&self.events));
                if let Ok(Navigation::Completed(Some(pending))) = &navigation {
                    self.submit(pending.clone());
                }
                let _ = reply.send(navigation);
            }
            Command::Complete { reply } => {
                let response = self.engine.complete(&self.tunnel).map(|pending| match pending {
                    Some(pending) => {
                        self.submit(pending);
                        true
                    }
                    None => false,
                });
                let _ = reply.send(response);
            }
            Command::Exit => self.engine.exit(&self.tunnel),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Alarm(message) => {
                self.engine
                    .receive_alarm(&message, &self.tunnel, schedule_message(&self.events));
            }
            Event::Submitted(session, outcome) => {
                if session != self.engine.id() {
                    tracing::debug!(%session, "dropping outcome for another session");
                    return;
                }
                if let Err(error) = self.engine.finish(outcome, &self.tunnel) {
                    tracing::warn!(%session, %error, "discarding submission outcome");
                }
            }
        }
    }

    fn submit(&self, pending: PendingSubmission) {
        let coordinator = self.coordinator.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = coordinator.resolve(&pending).await;
            if events.send(Event::from((pending.session, outcome))).is_err() {
                tracing::debug!(session = %pending.session, "session gone, dropping submission outcome");
            }
        });
    }
}

/// Scheduler that delivers each alarm back to the session after its delay
fn schedule_message(
    events: &mpsc::UnboundedSender<Event>,
) -> impl FnMut(AlarmMessage, Duration) + '_ {
    move |message, delay| {
        let events = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(Event::from(message)).is_err() {
                tracing::trace!(?message, "session gone, dropping alarm");
            }
        });
    }
}
