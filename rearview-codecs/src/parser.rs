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

//! The byte stream parser: start code extraction feeding the access unit
//! bridge.

use crate::bridge::AccessUnitBridge;
use crate::format::FormatError;
use crate::frame::DecodableFrame;
use crate::nal::NalUnitExtractor;

/// What a parse pass produced, in stream order.
#[derive(Debug)]
pub enum ParseEvent {
    Frame(DecodableFrame),
    /// The current parameter sets could not be turned into a format
    /// description; slices are dropped until they change.
    FormatError(FormatError),
}

/// Parses an H.264 Annex-B byte stream delivered in arbitrary chunks.
#[derive(Debug, Default)]
pub struct H264StreamParser {
    extractor: NalUnitExtractor,
    bridge: AccessUnitBridge,
}

impl H264StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk. Every frame it completes is passed to `on_event`
    /// before this returns.
    pub fn parse(&mut self, chunk: &[u8], mut on_event: impl FnMut(ParseEvent)) {
        let bridge = &mut self.bridge;
        self.extractor.append_with(chunk, |unit| match bridge.process(unit) {
            Ok(Some(frame)) => on_event(ParseEvent::Frame(frame)),
            Ok(None) => {}
            Err(e) => on_event(ParseEvent::FormatError(e)),
        });
    }

    /// Convenience wrapper around [`parse`](Self::parse) that collects the
    /// events.
    pub fn parse_to_vec(&mut self, chunk: &[u8]) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        self.parse(chunk, |event| events.push(event));
        events
    }

    /// Discards partially received units. Parameter sets are kept.
    ///
    /// Called when a new connection starts so that the tail of the previous
    /// stream is never glued onto the head of the next one.
    pub fn reset_stream(&mut self) {
        self.extractor.clear();
    }

    pub fn bridge(&self) -> &AccessUnitBridge {
        &self.bridge
    }

    pub fn buffered_len(&self) -> usize {
        self.extractor.buffered().len()
    }
}
