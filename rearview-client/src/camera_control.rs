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

//! HTTP side-channel that pushes camera options to the control server.
//!
//! # Example
//!
//! ```no_run
//! use rearview_client::{CameraOptionsAdjuster, CameraSensitivityMode, Daylight, RearviewConfig};
//!
//! # async fn example() -> Result<(), rearview_client::ControlError> {
//! let config = RearviewConfig::with_camera_address("192.168.1.20");
//! let adjuster = CameraOptionsAdjuster::new(&config)?;
//! adjuster
//!     .apply(CameraSensitivityMode::Auto, Some(Daylight::Night), 3)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::camera_options::{CameraOptions, CameraSensitivityMode, Daylight, SensitivityGains};
use crate::config::RearviewConfig;
use log::{debug, info, warn};
use rearview_transport::{AddressError, CameraHost};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const OPTIONS_PATH: &str = "/raspivid-options";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Invalid camera address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Camera rejected options ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Sends sensitivity presets to `PUT /raspivid-options` on the camera.
///
/// Clones share the "last request failed" flag.
#[derive(Debug, Clone)]
pub struct CameraOptionsAdjuster {
    http: Client,
    url: String,
    gains: SensitivityGains,
    retry_interval: Duration,
    last_request_failed: Arc<AtomicBool>,
}

impl CameraOptionsAdjuster {
    pub fn new(config: &RearviewConfig) -> Result<Self, ControlError> {
        let host: CameraHost = config.camera_address.parse()?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: format!(
                "http://{}{}",
                host.socket_addr(config.control_port),
                OPTIONS_PATH
            ),
            gains: SensitivityGains {
                low_light: config.digital_gain_for_low_light_mode,
                ultra_low_light: config.digital_gain_for_ultra_low_light_mode,
            },
            retry_interval: config.control_retry_interval(),
            last_request_failed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options_for(
        &self,
        mode: CameraSensitivityMode,
        daylight: Option<Daylight>,
    ) -> Option<CameraOptions> {
        mode.camera_options(daylight, self.gains)
    }

    /// Whether the most recent request failed.
    pub fn last_request_failed(&self) -> bool {
        self.last_request_failed.load(Ordering::Relaxed)
    }

    /// Resolves `mode` and sends it, retrying failures up to `max_retry_count`
    /// more times. Returns the options that were accepted, or `None` when the
    /// mode could not be resolved (auto without daylight information).
    pub async fn apply(
        &self,
        mode: CameraSensitivityMode,
        daylight: Option<Daylight>,
        max_retry_count: u32,
    ) -> Result<Option<CameraOptions>, ControlError> {
        info!("Applying camera sensitivity mode {mode}");
        let Some(options) = self.options_for(mode, daylight) else {
            info!("No daylight information, leaving camera options unchanged");
            return Ok(None);
        };

        let mut remaining = max_retry_count;
        loop {
            match self.send(&options).await {
                Ok(()) => return Ok(Some(options)),
                Err(e) if remaining > 0 => {
                    warn!("Camera options request failed ({e}), {remaining} retries left");
                    remaining -= 1;
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends one options update.
    pub async fn send(&self, options: &CameraOptions) -> Result<(), ControlError> {
        let result = self.put(options).await;
        self.last_request_failed
            .store(result.is_err(), Ordering::Relaxed);
        result
    }

    async fn put(&self, options: &CameraOptions) -> Result<(), ControlError> {
        debug!("PUT {} {:?}", self.url, options);
        let response = self.http.put(&self.url).json(options).send().await?;
        let status = response.status();
        if status.is_success() {
            debug!("Camera options accepted ({status})");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ControlError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_uses_control_port() {
        let config = RearviewConfig::with_camera_address("192.168.1.20");
        let adjuster = CameraOptionsAdjuster::new(&config).unwrap();
        assert_eq!(adjuster.url(), "http://192.168.1.20:5002/raspivid-options");
        assert!(!adjuster.last_request_failed());
    }

    #[test]
    fn test_ipv6_url_is_bracketed() {
        let config = RearviewConfig {
            control_port: 8080,
            ..RearviewConfig::with_camera_address("fe80::1")
        };
        let adjuster = CameraOptionsAdjuster::new(&config).unwrap();
        assert_eq!(adjuster.url(), "http://[fe80::1]:8080/raspivid-options");
    }

    #[test]
    fn test_rejects_invalid_address() {
        let config = RearviewConfig::with_camera_address("raspberrypi.local");
        assert!(matches!(
            CameraOptionsAdjuster::new(&config),
            Err(ControlError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_configured_gains_are_used() {
        let config = RearviewConfig {
            digital_gain_for_low_light_mode: 6.0,
            ..RearviewConfig::with_camera_address("10.0.0.2")
        };
        let adjuster = CameraOptionsAdjuster::new(&config).unwrap();
        let options = adjuster
            .options_for(CameraSensitivityMode::LowLight, None)
            .unwrap();
        assert_eq!(options.digitalgain, Some(6.0));
    }
}
