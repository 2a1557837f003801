//! Presentation channel and session identity
//!
//! This module defines the trait the engine uses to push updates to
//! whatever UI layer renders the session, and the identifier that tags
//! one quiz attempt. The engine never depends on a UI toolkit; it only
//! hands messages to a `Tunnel`.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::engine::{DisplayState, UpdateMessage};

/// A unique identifier for one quiz attempt
///
/// Results coming back from the submission service are tagged with this id
/// so they can be dropped if the session they belong to is gone.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Trait for sending session updates to a UI layer
///
/// Implementations might render to a terminal, forward over a socket, or
/// record messages for tests.
pub trait Tunnel {
    /// Sends an incremental update
    ///
    /// Updates describe what just happened: a question was shown, the
    /// countdown ticked, an answer was locked in, the result arrived.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a full snapshot of the session
    ///
    /// Snapshots are sent after every transition so a UI that missed
    /// updates can redraw from scratch.
    fn send_state(&self, state: &DisplayState);

    /// Closes the tunnel once the session is over
    fn close(self);
}
