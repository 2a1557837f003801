//! Configuration constants for the quiz session engine
//!
//! This module contains the limits used to validate incoming quiz data
//! and the fixed parameters of timing and result banding.

use std::time::Duration;

/// Quiz-level limits
pub mod quiz {
    /// Maximum number of questions accepted in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Upper bound for the per-question time limit, in seconds
    pub const MAX_TIME_LIMIT: i64 = 3600;
}

/// Question-level limits
pub mod question {
    /// Maximum length of a question text in characters
    pub const MAX_TEXT_LENGTH: usize = 1000;
    /// Maximum length of an explanation in characters
    pub const MAX_EXPLANATION_LENGTH: usize = 2000;
    /// Maximum number of answer options for one question
    pub const MAX_OPTION_COUNT: usize = 8;
}

/// Answer option limits
pub mod answer_text {
    /// Maximum length of an answer option in characters
    pub const MAX_LENGTH: usize = 500;
}

/// Countdown parameters
pub mod timer {
    use super::Duration;

    /// Interval between two countdown ticks
    pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
}

/// Percentage thresholds for the qualitative result bands
pub mod band {
    /// Lowest percentage considered excellent
    pub const EXCELLENT: f64 = 80.;
    /// Lowest percentage considered good
    pub const GOOD: f64 = 60.;
    /// Lowest percentage considered fair
    pub const FAIR: f64 = 40.;
}

/// Submission transport defaults
pub mod submission {
    /// Request timeout used when none is configured
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
}
