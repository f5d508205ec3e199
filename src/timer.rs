//! One-shot timers driven by the owner's clock
//!
//! Nothing here sleeps. The owner asks for [`OneShot::deadline`] to know how
//! long its loop may block, then calls [`OneShot::fire_if_due`] with the
//! current instant. Cancelling clears the deadline synchronously, so a
//! cancelled timer can never be delivered afterwards.

use std::time::{Duration, Instant};

use crate::constants::timing::MAX_TIMER_DELAY;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OneShot {
    deadline: Option<Instant>,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm to fire `after` from `now`, replacing any pending deadline.
    /// Delays beyond [`MAX_TIMER_DELAY`] are capped.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        let after = after.min(MAX_TIMER_DELAY);
        self.deadline = Some(now.checked_add(after).unwrap_or(now));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_deadline() {
        let t0 = Instant::now();
        let mut timer = OneShot::new();
        timer.arm(t0, Duration::from_secs(2));

        assert!(!timer.fire_if_due(t0 + Duration::from_secs(1)));
        assert!(timer.fire_if_due(t0 + Duration::from_secs(2)));
        assert!(!timer.is_pending());
        assert!(!timer.fire_if_due(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_cancel_prevents_delivery() {
        let t0 = Instant::now();
        let mut timer = OneShot::new();
        timer.arm(t0, Duration::from_secs(1));
        timer.cancel();
        assert!(!timer.fire_if_due(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let t0 = Instant::now();
        let mut timer = OneShot::new();
        timer.arm(t0, Duration::from_secs(1));
        timer.arm(t0, Duration::from_secs(5));
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_secs(5)));
        assert!(!timer.fire_if_due(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_huge_delay_is_capped() {
        let t0 = Instant::now();
        let mut timer = OneShot::new();
        timer.arm(t0, Duration::from_secs(u64::MAX));
        assert_eq!(timer.deadline(), Some(t0 + MAX_TIMER_DELAY));
        assert!(!timer.fire_if_due(t0 + Duration::from_secs(3600)));
    }
}
