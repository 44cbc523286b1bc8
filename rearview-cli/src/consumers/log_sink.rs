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

use rearview_client::rearview_codecs::DecodableFrame;
use rearview_client::DisplaySink;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Stands in for a screen: logs what would be shown and reports the frame rate.
pub struct LogSink {
    frames: u64,
    keyframes: u64,
    frames_since_report: u64,
    last_report: Instant,
    showing_image: bool,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            frames: 0,
            keyframes: 0,
            frames_since_report: 0,
            last_report: Instant::now(),
            showing_image: false,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn keyframes(&self) -> u64 {
        self.keyframes
    }

    pub fn is_showing_image(&self) -> bool {
        self.showing_image
    }
}

impl DisplaySink for LogSink {
    fn enqueue(&mut self, frame: DecodableFrame) {
        self.frames += 1;
        self.frames_since_report += 1;
        if frame.is_keyframe() {
            self.keyframes += 1;
            debug!(
                "Keyframe {} ({} bytes, {})",
                frame.sequence_number,
                frame.slice().len(),
                frame.format().codec_string()
            );
        }
        self.showing_image = true;

        let elapsed = self.last_report.elapsed();
        if elapsed >= REPORT_INTERVAL {
            let fps = self.frames_since_report as f64 / elapsed.as_secs_f64();
            info!(
                "Displaying {:.1} fps ({} frames, {} keyframes total)",
                fps, self.frames, self.keyframes
            );
            self.frames_since_report = 0;
            self.last_report = Instant::now();
        }
    }

    fn flush_and_remove_image(&mut self) {
        if self.showing_image {
            info!("Display cleared");
        }
        self.showing_image = false;
    }

    fn fade_in(&mut self) {
        info!("First frame, fading in");
    }

    fn set_reconnecting(&mut self, reconnecting: bool) {
        if reconnecting {
            info!("Reconnecting...");
        } else {
            info!("Reconnected");
        }
    }
}
