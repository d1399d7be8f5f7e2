//! Wall-clock source for note timestamps and ages.

use chrono::Utc;

/// Fractional seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

#[cfg(test)]
pub mod testing {
    use super::Clock;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<f64>,
    }

    impl ManualClock {
        pub fn new(start: f64) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        pub fn advance(&self, secs: f64) {
            *self.now.lock().unwrap() += secs;
        }

        pub fn set(&self, now: f64) {
            *self.now.lock().unwrap() = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            *self.now.lock().unwrap()
        }
    }
}
