//! Round clock for the Yardsale simulation.
//!
//! The clock is the single source of truth for how far the run has
//! progressed. It counts completed driver rounds, derives the number of
//! plays from the round count, and measures the wall-clock time between
//! snapshots for the status line.
//!
//! All counter arithmetic is checked; a run long enough to overflow a
//! `u64` counter is reported as an error rather than wrapping.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Round counter would overflow.
    #[error("round counter overflow: cannot advance beyond u64::MAX")]
    RoundOverflow,

    /// `rounds * plays_per_round` does not fit in a `u64`.
    #[error("play counter overflow at round {round}")]
    PlayOverflow {
        /// The round at which the product overflowed.
        round: u64,
    },
}

/// Round counter and snapshot timer.
#[derive(Debug, Clone)]
pub struct RoundClock {
    /// Completed driver rounds.
    round: u64,
    /// Plays executed per round.
    plays_per_round: u32,
    /// Wall-clock time the run started.
    started_at: DateTime<Utc>,
    /// Monotonic start, for elapsed-time reporting.
    started: Instant,
    /// Monotonic time of the last lap.
    last_lap: Instant,
}

impl RoundClock {
    /// Create a clock at round 0, started now.
    pub fn new(plays_per_round: u32) -> Self {
        let now = Instant::now();
        Self {
            round: 0,
            plays_per_round,
            started_at: Utc::now(),
            started: now,
            last_lap: now,
        }
    }

    /// Record one completed round. Returns the new round number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::RoundOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.round = self.round.checked_add(1).ok_or(ClockError::RoundOverflow)?;
        Ok(self.round)
    }

    /// Return the number of completed rounds.
    pub const fn round(&self) -> u64 {
        self.round
    }

    /// Return the configured plays per round.
    pub const fn plays_per_round(&self) -> u32 {
        self.plays_per_round
    }

    /// Return the total number of plays executed so far.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PlayOverflow`] if the product overflows.
    pub fn total_plays(&self) -> Result<u64, ClockError> {
        self.round
            .checked_mul(u64::from(self.plays_per_round))
            .ok_or(ClockError::PlayOverflow { round: self.round })
    }

    /// Return the wall-clock time the run started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Return the time elapsed since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Return the time since the previous lap (or since start) and reset
    /// the lap timer.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let since = now.saturating_duration_since(self.last_lap);
        self.last_lap = now;
        since
    }
}

#[cfg(test)]
impl RoundClock {
    /// A clock that has already completed `round` rounds.
    pub(crate) fn at_round(plays_per_round: u32, round: u64) -> Self {
        Self {
            round,
            ..Self::new(plays_per_round)
        }
    }
}

/// Convert a duration to whole milliseconds, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_round_zero() {
        let clock = RoundClock::new(100);
        assert_eq!(clock.round(), 0);
        assert_eq!(clock.plays_per_round(), 100);
        assert_eq!(clock.total_plays().unwrap(), 0);
    }

    #[test]
    fn clock_advances() {
        let mut clock = RoundClock::new(100);
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert_eq!(clock.round(), 2);
        assert_eq!(clock.total_plays().unwrap(), 200);
    }

    #[test]
    fn play_count_overflow_is_an_error() {
        let clock = RoundClock::at_round(u32::MAX, u64::MAX);
        assert!(matches!(
            clock.total_plays(),
            Err(ClockError::PlayOverflow { round: u64::MAX })
        ));
        let mut clock = RoundClock::at_round(1, u64::MAX);
        assert!(matches!(clock.advance(), Err(ClockError::RoundOverflow)));
    }

    #[test]
    fn lap_resets_timer() {
        let mut clock = RoundClock::new(1);
        std::thread::sleep(Duration::from_millis(5));
        let first = clock.lap();
        assert!(first >= Duration::from_millis(5));
        let second = clock.lap();
        assert!(second < first);
        assert!(clock.elapsed() >= first);
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(42)), 42);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
