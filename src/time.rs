//! Wrapping millisecond time helpers.
//!
//! The clock is a `u32` millisecond counter that rolls over roughly every
//! 49.7 days. Comparisons go through [`reached`], which stays correct across a
//! single rollover between two readings.

/// Returns `true` once `now` is at or past `deadline`.
///
/// The wrapping difference reinterpreted as signed gives the distance between
/// the two instants modulo 2^32, so this holds as long as they are less than
/// `i32::MAX` milliseconds apart.
#[inline(always)]
pub fn reached(now: u32, deadline: u32) -> bool {
    now.wrapping_sub(deadline) as i32 >= 0
}

/// A periodic deadline on the wrapping clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    at: u32,
    period_ms: u32,
}

impl Deadline {
    /// Arms a deadline one period after `now`.
    pub fn new(now: u32, period_ms: u32) -> Self {
        Self {
            at: now.wrapping_add(period_ms),
            period_ms,
        }
    }

    pub fn at(&self) -> u32 {
        self.at
    }

    /// Checks the deadline and, when it fired, re-arms it one period after
    /// `now`.
    pub fn poll(&mut self, now: u32) -> bool {
        if reached(now, self.at) {
            self.at = now.wrapping_add(self.period_ms);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reached_without_wrap() {
        assert!(!reached(999, 1000));
        assert!(reached(1000, 1000));
        assert!(reached(1001, 1000));
    }

    #[test]
    fn reached_across_wrap() {
        let deadline = u32::MAX - 1;
        assert!(!reached(u32::MAX - 2, deadline));
        assert!(reached(u32::MAX - 1, deadline));
        assert!(reached(u32::MAX, deadline));
        assert!(reached(1, deadline));
        // far in the past relative to a deadline just after the wrap
        assert!(!reached(u32::MAX - 5, 2));
    }

    #[test]
    fn deadline_fires_once_across_wrap() {
        let start = u32::MAX - 1_000;
        let mut deadline = Deadline::new(start, 3_000);
        assert_eq!(deadline.at(), 1_999);

        let mut fired = 0;
        let mut fired_at = None;
        let mut now = start;
        for _ in 0..3_000 {
            now = now.wrapping_add(1);
            if deadline.poll(now) {
                fired += 1;
                fired_at = Some(now);
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(fired_at, Some(1_999));
        assert_eq!(deadline.at(), 4_999);
    }

    #[test]
    fn late_poll_rearms_from_now() {
        let mut deadline = Deadline::new(0, 3_000);
        assert!(deadline.poll(3_500));
        assert_eq!(deadline.at(), 6_500);
        assert!(!deadline.poll(6_499));
    }
}
