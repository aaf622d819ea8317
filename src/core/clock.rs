use std::cell::Cell;
use std::rc::Rc;

use chrono::{Duration, Local, NaiveDateTime, Utc};

/// Source of wall-clock time. Calendar facts (hour, weekday) come from
/// `now()`, timers run on `now_ms()`.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn now_ms(&self) -> i64 {
        self.now().and_utc().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    /// Real epoch time, so timers keep running across DST changes.
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.current.set(self.current.get() + Duration::milliseconds(ms));
    }

    pub fn set(&self, at: NaiveDateTime) {
        self.current.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.current.get()
    }
}
