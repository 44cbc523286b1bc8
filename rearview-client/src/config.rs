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

use crate::retry::RetryPolicy;
use rearview_transport::ConnectionOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_VIDEO_PORT: u16 = 5001;
pub const DEFAULT_CONTROL_PORT: u16 = 5002;

/// Runtime settings for a rearview session.
///
/// Every field has a default so partial YAML documents deserialize cleanly.
/// Durations are stored as milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RearviewConfig {
    /// Literal IPv4 or IPv6 address of the camera. Validated when a session starts.
    pub camera_address: String,
    pub video_port: u16,
    pub control_port: u16,
    pub establishment_timeout_ms: u64,
    pub drop_timeout_ms: u64,
    pub minimum_receive_length: usize,
    pub maximum_receive_length: usize,
    /// Delay before reconnecting after the camera closed the stream cleanly.
    pub server_close_retry_delay_ms: u64,
    /// Delay before reconnecting after any other failure.
    pub failure_retry_delay_ms: u64,
    /// Rate of the stale-frame check, in checks per second.
    pub freshness_check_hz: u32,
    pub frame_expiration_ms: u64,
    /// Send sensitivity presets to the camera's control port.
    pub camera_control_enabled: bool,
    /// Pause between attempts when a camera options request fails.
    pub control_retry_interval_ms: u64,
    pub digital_gain_for_low_light_mode: f32,
    pub digital_gain_for_ultra_low_light_mode: f32,
}

impl Default for RearviewConfig {
    fn default() -> Self {
        Self {
            camera_address: String::new(),
            video_port: DEFAULT_VIDEO_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            establishment_timeout_ms: 1000,
            drop_timeout_ms: 1000,
            minimum_receive_length: 500,
            maximum_receive_length: 100_000,
            server_close_retry_delay_ms: 200,
            failure_retry_delay_ms: 1000,
            freshness_check_hz: 30,
            frame_expiration_ms: 200,
            camera_control_enabled: true,
            control_retry_interval_ms: 1000,
            digital_gain_for_low_light_mode: 4.0,
            digital_gain_for_ultra_low_light_mode: 8.0,
        }
    }
}

impl RearviewConfig {
    pub fn with_camera_address(camera_address: impl Into<String>) -> Self {
        Self {
            camera_address: camera_address.into(),
            ..Self::default()
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            establishment_timeout: Duration::from_millis(self.establishment_timeout_ms),
            drop_timeout: Duration::from_millis(self.drop_timeout_ms),
            minimum_incomplete_length: self.minimum_receive_length,
            maximum_length: self.maximum_receive_length.max(1),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            server_close_delay: self.server_close_retry_delay(),
            failure_delay: self.failure_retry_delay(),
        }
    }

    pub fn server_close_retry_delay(&self) -> Duration {
        Duration::from_millis(self.server_close_retry_delay_ms)
    }

    pub fn failure_retry_delay(&self) -> Duration {
        Duration::from_millis(self.failure_retry_delay_ms)
    }

    /// Interval between stale-frame checks. A zero rate falls back to 30Hz.
    pub fn freshness_period(&self) -> Duration {
        let hz = if self.freshness_check_hz == 0 {
            30
        } else {
            self.freshness_check_hz
        };
        Duration::from_secs(1) / hz
    }

    pub fn frame_expiration(&self) -> Duration {
        Duration::from_millis(self.frame_expiration_ms)
    }

    pub fn control_retry_interval(&self) -> Duration {
        Duration::from_millis(self.control_retry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_camera_conventions() {
        let config = RearviewConfig::default();
        assert_eq!(config.video_port, 5001);
        assert_eq!(config.control_port, 5002);
        assert_eq!(config.server_close_retry_delay(), Duration::from_millis(200));
        assert_eq!(config.failure_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.frame_expiration(), Duration::from_millis(200));
        assert_eq!(config.control_retry_interval(), Duration::from_secs(1));
        assert_eq!(config.freshness_period(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn test_connection_options_follow_config() {
        let config = RearviewConfig {
            establishment_timeout_ms: 250,
            minimum_receive_length: 10,
            ..RearviewConfig::default()
        };
        let options = config.connection_options();
        assert_eq!(options.establishment_timeout, Duration::from_millis(250));
        assert_eq!(options.drop_timeout, Duration::from_secs(1));
        assert_eq!(options.minimum_incomplete_length, 10);
        assert_eq!(options.maximum_length, 100_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RearviewConfig =
            serde_json::from_str(r#"{"camera_address": "192.168.0.7", "video_port": 6001}"#)
                .unwrap();
        assert_eq!(config.camera_address, "192.168.0.7");
        assert_eq!(config.video_port, 6001);
        assert_eq!(config.control_port, 5002);
        assert_eq!(config.digital_gain_for_low_light_mode, 4.0);
    }

    #[test]
    fn test_zero_rate_falls_back_to_30hz() {
        let config = RearviewConfig {
            freshness_check_hz: 0,
            ..RearviewConfig::default()
        };
        assert_eq!(config.freshness_period(), Duration::from_secs(1) / 30);
    }
}
