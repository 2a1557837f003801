//! # Quiz Session Library
//!
//! This library provides the session logic for timed multiple-choice
//! quizzes. It presents questions one at a time, runs a per-question
//! countdown, records exactly one decision per question, lets the user
//! review earlier questions without changing them, and submits the result
//! to a backend with a locally computed fallback.
//!
//! The `engine` is synchronous and UI-agnostic; it talks to the outside
//! world through a `session::Tunnel` and a scheduling closure. The `runner`
//! hosts an engine on a tokio runtime.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod engine;
pub mod ledger;
pub mod quiz;
pub mod result;
pub mod runner;
pub mod session;
pub mod submission;
pub mod timer;

pub use config::ClientConfig;
pub use engine::{Direction, DisplayState, Engine, UpdateMessage};
pub use quiz::{config::Quiz, question::Question};
pub use runner::{SessionHandle, SessionRunner};
pub use session::{SessionId, Tunnel};
pub use submission::{Coordinator, SubmissionOutcome, SubmissionResult};
