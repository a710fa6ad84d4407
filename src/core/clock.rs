//! Strictly increasing wall-clock timestamps.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Hands out UTC timestamps that never repeat and never go backwards.
///
/// Resolution is one microsecond; two calls within the same microsecond get
/// consecutive values.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    /// Create a new clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(0),
        }
    }

    /// Next timestamp, strictly after every timestamp issued before.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut prev = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self.last_micros.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return from_micros(next).unwrap_or_else(Utc::now),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Convert microseconds since the Unix epoch into a UTC timestamp.
#[must_use]
pub fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(micros).single()
}
