//! Supplies UTC timestamps for recorded ledger events.

use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

/// A source of monotonically increasing, UTC-normalized event timestamps.
///
/// History keys require distinct timestamps per account, but wall clocks
/// can stall or step backwards. The clock tracks the last instant it
/// handed out and bumps forward by one millisecond whenever wall time has
/// not advanced past it, so timestamps issued by one process never repeat.
#[derive(Debug)]
pub struct Clock {
    state: Mutex<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    last: OffsetDateTime,
    frozen: bool,
}

impl Clock {
    /// Create a clock backed by the system UTC time.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                last: OffsetDateTime::UNIX_EPOCH,
                frozen: false,
            }),
        }
    }

    /// Create a clock that always returns `instant`, for forcing history
    /// key collisions in tests.
    #[cfg(test)]
    pub(crate) fn frozen_at(instant: OffsetDateTime) -> Self {
        Self {
            state: Mutex::new(ClockState {
                last: instant,
                frozen: true,
            }),
        }
    }

    /// The timestamp for the next recorded event.
    pub fn now(&self) -> OffsetDateTime {
        let mut state = self.state.lock().unwrap();

        if state.frozen {
            return state.last;
        }

        let wall = OffsetDateTime::now_utc();
        state.last = if wall > state.last {
            wall
        } else {
            state.last + Duration::milliseconds(1)
        };

        state.last
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
