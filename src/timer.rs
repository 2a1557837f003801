//! Per-question countdown
//!
//! The timer never sleeps. Each activation hands `AlarmMessage`s to a
//! caller-supplied scheduling closure, one tick per second, and the host
//! feeds them back through `receive_alarm`. Every activation gets a fresh
//! `activation` number; alarms carrying any other number are stale and are
//! dropped, which is how `cancel` guarantees that nothing fires after it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::timer::TICK_INTERVAL;

/// Alarm messages for the question countdown
///
/// These messages are scheduled by the timer and delivered back to it by
/// whatever event loop hosts the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// One second of the countdown has elapsed
    Tick {
        /// Question the countdown belongs to
        index: usize,
        /// Activation that scheduled this tick
        activation: u64,
    },
}

impl AlarmMessage {
    /// Question index the alarm was scheduled for
    pub fn index(&self) -> usize {
        match self {
            Self::Tick { index, .. } => *index,
        }
    }
}

/// What a delivered alarm meant for the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// The countdown advanced and is still running
    Tick {
        /// Question the countdown belongs to
        index: usize,
        /// Whole seconds left
        remaining: u64,
    },
    /// The countdown reached zero; the activation is now spent
    Timeout {
        /// Question the countdown belonged to
        index: usize,
    },
    /// The alarm belongs to a cancelled or finished activation
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Activation {
    index: usize,
    id: u64,
    remaining: u64,
}

/// Single-instance countdown for the question on screen
#[derive(Debug, Clone, Default)]
pub struct QuestionTimer {
    /// Number of activations handed out so far
    activations: u64,
    active: Option<Activation>,
}

impl QuestionTimer {
    /// Creates an idle timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a countdown of `duration_seconds` for `index`
    ///
    /// Any running countdown is cancelled first. A non-positive duration
    /// starts nothing and returns `false`; the caller treats the question as
    /// untimed.
    pub fn start<S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        index: usize,
        duration_seconds: i64,
        mut schedule_message: S,
    ) -> bool {
        self.cancel();

        let Some(seconds) = u64::try_from(duration_seconds).ok().filter(|s| *s > 0) else {
            return false;
        };

        self.activations += 1;
        let activation = Activation {
            index,
            id: self.activations,
            remaining: seconds,
        };
        self.active = Some(activation);

        schedule_message(
            AlarmMessage::Tick {
                index,
                activation: activation.id,
            },
            TICK_INTERVAL,
        );

        true
    }

    /// Stops the countdown; returns whether one was running
    ///
    /// Calling this on an idle timer is a no-op.
    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Whether a countdown is running
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Question index of the running countdown
    pub fn running_index(&self) -> Option<usize> {
        self.active.map(|a| a.index)
    }

    /// Seconds left on the running countdown
    pub fn remaining(&self) -> Option<u64> {
        self.active.map(|a| a.remaining)
    }

    /// Applies a delivered alarm
    ///
    /// A live tick decrements the countdown and schedules the next tick, or
    /// ends the activation when it reaches zero.
    pub fn receive_alarm<S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        message: &AlarmMessage,
        mut schedule_message: S,
    ) -> Fired {
        let AlarmMessage::Tick { index, activation } = *message;

        let Some(active) = self.active.as_mut() else {
            return Fired::Stale;
        };
        if active.id != activation || active.index != index {
            return Fired::Stale;
        }

        active.remaining = active.remaining.saturating_sub(1);

        if active.remaining == 0 {
            self.active = None;
            Fired::Timeout { index }
        } else {
            schedule_message(*message, TICK_INTERVAL);
            Fired::Tick {
                index,
                remaining: active.remaining,
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_start_schedules_first_tick() {
        let mut timer = QuestionTimer::new();
        let mut scheduled = Vec::new();

        assert!(timer.start(2, 3, |msg, d| scheduled.push((msg, d))));

        assert_eq!(
            scheduled,
            vec![(
                AlarmMessage::Tick {
                    index: 2,
                    activation: 1
                },
                Duration::from_secs(1)
            )]
        );
        assert_eq!(timer.remaining(), Some(3));
        assert_eq!(timer.running_index(), Some(2));
    }

    #[test]
    fn test_non_positive_duration_does_not_start() {
        let mut timer = QuestionTimer::new();
        let mut scheduled = 0;

        assert!(!timer.start(0, 0, |_, _| scheduled += 1));
        assert!(!timer.start(0, -10, |_, _| scheduled += 1));

        assert_eq!(scheduled, 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_countdown_ticks_then_times_out_once() {
        let mut timer = QuestionTimer::new();
        let mut queue = Vec::new();
        timer.start(0, 3, |msg, _| queue.push(msg));

        let mut fired = Vec::new();
        while let Some(msg) = queue.pop() {
            fired.push(timer.receive_alarm(&msg, |m, _| queue.push(m)));
        }

        assert_eq!(
            fired,
            vec![
                Fired::Tick {
                    index: 0,
                    remaining: 2
                },
                Fired::Tick {
                    index: 0,
                    remaining: 1
                },
                Fired::Timeout { index: 0 },
            ]
        );
        assert!(!timer.is_running());
    }

    #[test]
    fn test_cancel_makes_pending_alarms_stale() {
        let mut timer = QuestionTimer::new();
        let mut queue = Vec::new();
        timer.start(0, 5, |msg, _| queue.push(msg));

        assert!(timer.cancel());
        assert!(!timer.cancel());

        assert_eq!(timer.receive_alarm(&queue[0], |_, _| {}), Fired::Stale);
    }

    #[test]
    fn test_restart_invalidates_previous_activation() {
        let mut timer = QuestionTimer::new();
        let mut queue = Vec::new();
        timer.start(0, 5, |msg, _| queue.push(msg));
        timer.start(1, 5, |msg, _| queue.push(msg));

        let mut rescheduled = Vec::new();
        assert_eq!(
            timer.receive_alarm(&queue[0], |m, _| rescheduled.push(m)),
            Fired::Stale
        );
        assert_eq!(
            timer.receive_alarm(&queue[1], |m, _| rescheduled.push(m)),
            Fired::Tick {
                index: 1,
                remaining: 4
            }
        );
        assert_eq!(rescheduled, vec![queue[1]]);
    }

    #[test]
    fn test_one_second_limit_times_out_on_first_tick() {
        let mut timer = QuestionTimer::new();
        let mut queue = Vec::new();
        timer.start(4, 1, |msg, _| queue.push(msg));

        let mut rescheduled = 0;
        assert_eq!(
            timer.receive_alarm(&queue[0], |_, _| rescheduled += 1),
            Fired::Timeout { index: 4 }
        );
        assert_eq!(rescheduled, 0);
        assert_eq!(
            timer.receive_alarm(&queue[0], |_, _| rescheduled += 1),
            Fired::Stale
        );
    }
}
