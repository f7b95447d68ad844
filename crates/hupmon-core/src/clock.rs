//! Monotonic clock and deadline arithmetic.
//!
//! All deadlines are absolute instants; poll timeouts are derived as
//! `max(0, deadline - now)` and truncated to milliseconds.

use std::time::{Duration, Instant};

/// An absolute point in time a probe or poll must complete by.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline {
            at: Instant::now() + timeout,
        }
    }

    /// Milliseconds remaining until the deadline, clamped at 0.
    pub fn remaining_ms(&self) -> i32 {
        let now = Instant::now();
        if self.at <= now {
            0
        } else {
            let remaining = self.at - now;
            // Truncated, not rounded: a poll that returns slightly early
            // just loops back in rather than overshoot the deadline.
            remaining.as_millis().min(i32::MAX as u128) as i32
        }
    }

    /// Whether the deadline has already passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Push the deadline further out, e.g. on an XOFF-triggered extension.
    pub fn extend(&mut self, by: Duration) {
        self.at += by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_ms_nonnegative_after_expiry() {
        let d = Deadline::after(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(d.remaining_ms(), 0);
        assert!(d.expired());
    }

    #[test]
    fn extend_pushes_deadline_out() {
        let mut d = Deadline::after(Duration::from_millis(10));
        let before = d.remaining_ms();
        d.extend(Duration::from_millis(100));
        assert!(d.remaining_ms() >= before + 90);
    }

    #[test]
    fn fresh_deadline_not_expired() {
        let d = Deadline::after(Duration::from_millis(200));
        assert!(!d.expired());
        assert!(d.remaining_ms() > 0);
    }
}
