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

use log_sink::LogSink;
use recording_sink::RecordingSink;
use rearview_client::rearview_codecs::DecodableFrame;
use rearview_client::DisplaySink;

pub mod log_sink;
pub mod recording_sink;

pub enum ViewSinks {
    Log(LogSink),
    Recording(Box<RecordingSink>),
}

impl DisplaySink for ViewSinks {
    fn enqueue(&mut self, frame: DecodableFrame) {
        match self {
            ViewSinks::Log(sink) => sink.enqueue(frame),
            ViewSinks::Recording(sink) => sink.enqueue(frame),
        }
    }

    fn flush_and_remove_image(&mut self) {
        match self {
            ViewSinks::Log(sink) => sink.flush_and_remove_image(),
            ViewSinks::Recording(sink) => sink.flush_and_remove_image(),
        }
    }

    fn fade_in(&mut self) {
        match self {
            ViewSinks::Log(sink) => sink.fade_in(),
            ViewSinks::Recording(sink) => sink.fade_in(),
        }
    }

    fn set_reconnecting(&mut self, reconnecting: bool) {
        match self {
            ViewSinks::Log(sink) => sink.set_reconnecting(reconnecting),
            ViewSinks::Recording(sink) => sink.set_reconnecting(reconnecting),
        }
    }
}
