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

//! Contains the fundamental data structures for video frames.

use crate::format::{FormatDescription, NAL_LENGTH_SIZE};
use crate::nal::START_CODE;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;

/// The type of a video frame, indicating its dependency on other frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Built from an IDR slice; decodable without any earlier frame.
    KeyFrame,
    /// Built from a non-IDR slice; needs the preceding frames.
    DeltaFrame,
}

/// One encoded access unit, ready to hand to a hardware or software decoder.
///
/// The payload is a single slice in length-prefixed (AVCC) form, paired with
/// the format description that was current when the slice arrived.
#[derive(Debug, Clone)]
pub struct DecodableFrame {
    /// Position of this frame in the parser's output, starting at 0.
    pub sequence_number: u64,
    pub frame_type: FrameType,
    /// The stream has no B-frames, so frames are shown as soon as they are
    /// decoded instead of waiting for a presentation timestamp.
    pub display_immediately: bool,
    format: Arc<FormatDescription>,
    data: Bytes,
}

impl DecodableFrame {
    /// Wraps a slice payload (header byte included, no start code).
    ///
    /// Returns `None` if the slice does not fit the 32-bit length prefix.
    pub fn new(
        sequence_number: u64,
        frame_type: FrameType,
        format: Arc<FormatDescription>,
        slice: &[u8],
    ) -> Option<Self> {
        let length = u32::try_from(slice.len()).ok()?;
        let mut data = BytesMut::with_capacity(NAL_LENGTH_SIZE + slice.len());
        data.put_u32(length);
        data.extend_from_slice(slice);

        Some(Self {
            sequence_number,
            frame_type,
            display_immediately: true,
            format,
            data: data.freeze(),
        })
    }

    pub fn format(&self) -> &Arc<FormatDescription> {
        &self.format
    }

    /// The length-prefixed sample.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The slice without its length prefix.
    pub fn slice(&self) -> &[u8] {
        &self.data[NAL_LENGTH_SIZE..]
    }

    pub fn is_keyframe(&self) -> bool {
        self.frame_type == FrameType::KeyFrame
    }

    /// Re-encodes the slice as Annex-B, optionally preceded by the parameter
    /// sets so the output can start a stream on its own.
    pub fn to_annex_b(&self, with_parameter_sets: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.data.len() + self.format.sps().len() + self.format.pps().len() + 12,
        );
        if with_parameter_sets {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(self.format.sps());
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(self.format.pps());
        }
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(self.slice());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nal::NalUnit;

    fn format() -> Arc<FormatDescription> {
        Arc::new(
            FormatDescription::from_parameter_sets(
                &NalUnit::new(&[0x67u8, 0x42, 0xc0, 0x1f][..]),
                &NalUnit::new(&[0x68u8, 0xce, 0x3c, 0x80][..]),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_length_prefix() {
        let frame = DecodableFrame::new(0, FrameType::KeyFrame, format(), &[0x65, 1, 2, 3, 4]).unwrap();
        assert_eq!(&frame.data()[..4], &[0, 0, 0, 5]);
        assert_eq!(frame.slice(), &[0x65, 1, 2, 3, 4]);
        assert!(frame.display_immediately);
        assert!(frame.is_keyframe());
    }

    #[test]
    fn test_annex_b_output() {
        let frame = DecodableFrame::new(3, FrameType::DeltaFrame, format(), &[0x41, 9]).unwrap();
        assert_eq!(frame.to_annex_b(false), vec![0, 0, 0, 1, 0x41, 9]);

        let full = frame.to_annex_b(true);
        assert_eq!(&full[..8], &[0, 0, 0, 1, 0x67, 0x42, 0xc0, 0x1f]);
        assert!(full.ends_with(&[0, 0, 0, 1, 0x41, 9]));
    }
}
