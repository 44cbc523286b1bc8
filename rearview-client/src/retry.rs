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

use rearview_transport::TerminationReason;
use std::time::Duration;

/// What the session does after a connection terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    pub delay: Duration,
    /// Clear the display right away instead of waiting for the freshness check.
    pub clear_display: bool,
    pub show_reconnecting: bool,
}

/// Maps a termination reason to a reconnect plan. Retries are not capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub server_close_delay: Duration,
    pub failure_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            server_close_delay: Duration::from_millis(200),
            failure_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `None` means do not reconnect.
    pub fn plan(&self, reason: TerminationReason) -> Option<RetryPlan> {
        match reason {
            TerminationReason::ClosedByClient => None,
            // The camera process restarts its listener in a loop.
            TerminationReason::ClosedByServer => Some(RetryPlan {
                delay: self.server_close_delay,
                clear_display: false,
                show_reconnecting: false,
            }),
            TerminationReason::EstablishmentFailure
            | TerminationReason::EstablishmentTimeout
            | TerminationReason::UnexpectedDisconnection
            | TerminationReason::ConnectionDropTimeout => Some(RetryPlan {
                delay: self.failure_delay,
                clear_display: true,
                show_reconnecting: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_for_every_reason() {
        let policy = RetryPolicy::default();
        for reason in TerminationReason::ALL {
            let plan = policy.plan(reason);
            match reason {
                TerminationReason::ClosedByClient => assert_eq!(plan, None),
                TerminationReason::ClosedByServer => assert_eq!(
                    plan,
                    Some(RetryPlan {
                        delay: Duration::from_millis(200),
                        clear_display: false,
                        show_reconnecting: false,
                    })
                ),
                _ => assert_eq!(
                    plan,
                    Some(RetryPlan {
                        delay: Duration::from_secs(1),
                        clear_display: true,
                        show_reconnecting: true,
                    }),
                    "unexpected plan for {reason}"
                ),
            }
        }
    }

    #[test]
    fn test_plan_uses_configured_delays() {
        let policy = RetryPolicy {
            server_close_delay: Duration::from_millis(50),
            failure_delay: Duration::from_secs(3),
        };
        assert_eq!(
            policy.plan(TerminationReason::ClosedByServer).map(|p| p.delay),
            Some(Duration::from_millis(50))
        );
        assert_eq!(
            policy.plan(TerminationReason::EstablishmentTimeout).map(|p| p.delay),
            Some(Duration::from_secs(3))
        );
    }
}
