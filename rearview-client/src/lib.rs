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

//! Client side of the rearview camera: a self-healing live H.264 session.
//!
//! [`RearviewSession`] connects to the camera's video port, turns the Annex-B
//! byte stream into decodable frames and pushes them into a [`DisplaySink`].
//! It reconnects on its own after failures, clears the display whenever the
//! picture goes stale, and keeps the camera's sensitivity preset in sync over
//! the HTTP control port.
//!
//! This crate makes no assumptions about how frames are rendered. The sink
//! receives frames already paired with their decoder configuration.

mod camera_control;
mod camera_options;
mod config;
mod display;
mod freshness;
mod retry;
mod session;

pub use camera_control::{CameraOptionsAdjuster, ControlError};
pub use camera_options::{
    Awb, AwbGains, CameraOptions, CameraSensitivityMode, ColourFx, Daylight, DrcLevel, Exposure,
    Flicker, ImageFx, IntraRefreshType, Level, MeterMode, Profile, Roi, SensitivityGains,
};
pub use config::{RearviewConfig, DEFAULT_CONTROL_PORT, DEFAULT_VIDEO_PORT};
pub use display::DisplaySink;
pub use freshness::FrameFreshnessMonitor;
pub use retry::{RetryPlan, RetryPolicy};
pub use session::{RearviewSession, SessionClosed, SessionEvent};

pub use rearview_codecs;
pub use rearview_transport;
