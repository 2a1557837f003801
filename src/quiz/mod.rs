//! Quiz data supplied by the quiz-generation collaborator
//!
//! This module contains the immutable question set a session is built from:
//! the top-level `Quiz` payload and the questions and answer options inside it.
//! Everything here is loaded once, validated, and never mutated afterwards.

pub mod config;
pub mod question;
