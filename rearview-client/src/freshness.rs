/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Stale-frame detection.
//!
//! The monitor only knows when the last frame arrived. A half-open socket
//! that never reports a failure still stops producing frames, so checking
//! wall-clock age here is what keeps a frozen picture off the display.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct FrameFreshnessMonitor {
    expiration: Duration,
    last_frame_at: Option<Instant>,
    expiry_reported: bool,
}

impl FrameFreshnessMonitor {
    pub fn new(expiration: Duration) -> Self {
        Self {
            expiration,
            last_frame_at: None,
            expiry_reported: false,
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub fn last_frame_at(&self) -> Option<Instant> {
        self.last_frame_at
    }

    pub fn record_frame(&mut self, now: Instant) {
        self.last_frame_at = Some(now);
        self.expiry_reported = false;
    }

    /// True once `expiration` or more has passed since the last frame.
    /// Never true before the first frame.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.last_frame_at
            .is_some_and(|last| now.saturating_duration_since(last) >= self.expiration)
    }

    /// Like [`is_expired`](Self::is_expired) but reports each stale period
    /// only once. A new frame re-arms it.
    pub fn check(&mut self, now: Instant) -> bool {
        if self.expiry_reported || !self.is_expired(now) {
            return false;
        }
        self.expiry_reported = true;
        true
    }

    /// Forgets the last frame so a fresh session is not judged stale.
    pub fn reset(&mut self) {
        self.last_frame_at = None;
        self.expiry_reported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRATION: Duration = Duration::from_millis(200);

    #[test]
    fn test_no_frame_never_expires() {
        let mut monitor = FrameFreshnessMonitor::new(EXPIRATION);
        let now = Instant::now();
        assert!(!monitor.is_expired(now + Duration::from_secs(60)));
        assert!(!monitor.check(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_expiry_boundary() {
        let mut monitor = FrameFreshnessMonitor::new(EXPIRATION);
        let t = Instant::now();
        monitor.record_frame(t);

        assert!(!monitor.is_expired(t));
        assert!(!monitor.is_expired(t + Duration::from_millis(199)));
        assert!(!monitor.is_expired(t + EXPIRATION - Duration::from_nanos(1)));
        assert!(monitor.is_expired(t + EXPIRATION));
        assert!(monitor.is_expired(t + Duration::from_millis(250)));
    }

    #[test]
    fn test_check_reports_once_per_stale_period() {
        let mut monitor = FrameFreshnessMonitor::new(EXPIRATION);
        let t = Instant::now();
        monitor.record_frame(t);

        assert!(!monitor.check(t + Duration::from_millis(100)));
        assert!(monitor.check(t + Duration::from_millis(210)));
        assert!(!monitor.check(t + Duration::from_millis(240)));

        let t2 = t + Duration::from_millis(300);
        monitor.record_frame(t2);
        assert!(!monitor.check(t2 + Duration::from_millis(10)));
        assert!(monitor.check(t2 + Duration::from_millis(200)));
    }

    #[test]
    fn test_reset_forgets_last_frame() {
        let mut monitor = FrameFreshnessMonitor::new(EXPIRATION);
        let t = Instant::now();
        monitor.record_frame(t);
        monitor.reset();
        assert_eq!(monitor.last_frame_at(), None);
        assert!(!monitor.is_expired(t + Duration::from_secs(1)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_expired() {
        let mut monitor = FrameFreshnessMonitor::new(EXPIRATION);
        let t = Instant::now() + Duration::from_secs(1);
        monitor.record_frame(t);
        assert!(!monitor.is_expired(t - Duration::from_millis(500)));
    }
}
