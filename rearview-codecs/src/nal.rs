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

//! Annex-B start code scanning and NAL unit classification.
//!
//! The camera server sends a bare H.264 elementary stream over TCP, so NAL
//! unit boundaries are only visible as start codes inside an arbitrarily
//! chunked byte stream. [`NalUnitExtractor`] accumulates the chunks and hands
//! out every unit that is delimited on both sides.

use bytes::{Buf, Bytes, BytesMut};
use log::{trace, warn};

/// The start code that precedes every NAL unit in the stream.
///
/// Only the 4-byte form is recognised; the raspivid based camera server never
/// emits the 3-byte `00 00 01` form.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// The `nal_unit_type` field of a NAL unit header (ITU-T H.264 Table 7-1).
///
/// Every 5-bit value maps to a variant, so classification never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// Types 0 and 24..=31.
    Unspecified(u8),
    CodedSliceOfNonIdrPicture,
    CodedSliceDataPartitionA,
    CodedSliceDataPartitionB,
    CodedSliceDataPartitionC,
    CodedSliceOfIdrPicture,
    SupplementalEnhancementInformation,
    SequenceParameterSet,
    PictureParameterSet,
    AccessUnitDelimiter,
    EndOfSequence,
    EndOfStream,
    FillerData,
    SequenceParameterSetExtension,
    PrefixNalUnit,
    SubsetSequenceParameterSet,
    DepthParameterSet,
    /// Types 17, 18, 22 and 23.
    Reserved(u8),
    CodedSliceOfAuxiliaryPicture,
    CodedSliceExtension,
    CodedSliceExtensionForDepthView,
}

impl From<u8> for NalUnitType {
    /// Decodes the type from a NAL unit header byte. Only the low 5 bits are
    /// looked at.
    fn from(header: u8) -> Self {
        match header & 0b1_1111 {
            1 => NalUnitType::CodedSliceOfNonIdrPicture,
            2 => NalUnitType::CodedSliceDataPartitionA,
            3 => NalUnitType::CodedSliceDataPartitionB,
            4 => NalUnitType::CodedSliceDataPartitionC,
            5 => NalUnitType::CodedSliceOfIdrPicture,
            6 => NalUnitType::SupplementalEnhancementInformation,
            7 => NalUnitType::SequenceParameterSet,
            8 => NalUnitType::PictureParameterSet,
            9 => NalUnitType::AccessUnitDelimiter,
            10 => NalUnitType::EndOfSequence,
            11 => NalUnitType::EndOfStream,
            12 => NalUnitType::FillerData,
            13 => NalUnitType::SequenceParameterSetExtension,
            14 => NalUnitType::PrefixNalUnit,
            15 => NalUnitType::SubsetSequenceParameterSet,
            16 => NalUnitType::DepthParameterSet,
            19 => NalUnitType::CodedSliceOfAuxiliaryPicture,
            20 => NalUnitType::CodedSliceExtension,
            21 => NalUnitType::CodedSliceExtensionForDepthView,
            n @ (17 | 18 | 22 | 23) => NalUnitType::Reserved(n),
            n => NalUnitType::Unspecified(n),
        }
    }
}

impl NalUnitType {
    /// The raw 5-bit type value.
    pub fn id(&self) -> u8 {
        match *self {
            NalUnitType::Unspecified(n) | NalUnitType::Reserved(n) => n,
            NalUnitType::CodedSliceOfNonIdrPicture => 1,
            NalUnitType::CodedSliceDataPartitionA => 2,
            NalUnitType::CodedSliceDataPartitionB => 3,
            NalUnitType::CodedSliceDataPartitionC => 4,
            NalUnitType::CodedSliceOfIdrPicture => 5,
            NalUnitType::SupplementalEnhancementInformation => 6,
            NalUnitType::SequenceParameterSet => 7,
            NalUnitType::PictureParameterSet => 8,
            NalUnitType::AccessUnitDelimiter => 9,
            NalUnitType::EndOfSequence => 10,
            NalUnitType::EndOfStream => 11,
            NalUnitType::FillerData => 12,
            NalUnitType::SequenceParameterSetExtension => 13,
            NalUnitType::PrefixNalUnit => 14,
            NalUnitType::SubsetSequenceParameterSet => 15,
            NalUnitType::DepthParameterSet => 16,
            NalUnitType::CodedSliceOfAuxiliaryPicture => 19,
            NalUnitType::CodedSliceExtension => 20,
            NalUnitType::CodedSliceExtensionForDepthView => 21,
        }
    }

    /// Slices that can be turned into a displayable frame.
    pub fn is_picture_slice(&self) -> bool {
        matches!(
            self,
            NalUnitType::CodedSliceOfIdrPicture | NalUnitType::CodedSliceOfNonIdrPicture
        )
    }
}

/// One NAL unit: the header byte and its body, without the start code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    data: Bytes,
}

impl NalUnit {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The payload including the header byte.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn header(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// The unit type. An empty unit (two adjacent start codes) classifies as
    /// `Unspecified(0)` and is ignored downstream.
    pub fn nal_type(&self) -> NalUnitType {
        self.header()
            .map(NalUnitType::from)
            .unwrap_or(NalUnitType::Unspecified(0))
    }

    /// `nal_ref_idc`, the 2-bit reference importance field.
    pub fn ref_idc(&self) -> u8 {
        self.header().map(|h| (h >> 5) & 0b11).unwrap_or(0)
    }
}

/// Longest NAL unit the extractor buffers before giving up on it.
///
/// A 1080p IDR slice from the camera is a few hundred kilobytes.
pub const MAX_NAL_UNIT_LENGTH: usize = 16 * 1024 * 1024;

/// Incremental Annex-B splitter.
///
/// Bytes are appended in arrival order; a unit is emitted once the start code
/// that follows it has arrived. Whatever follows the last start code stays
/// buffered for the next call. Bytes before the first start code are never
/// part of a unit and are dropped as soon as they are seen.
#[derive(Debug)]
pub struct NalUnitExtractor {
    buffer: BytesMut,
    /// Offset up to which the buffer is known to hold no start code after the
    /// leading one. Saves rescanning large slices that arrive in many reads.
    scanned: usize,
    max_unit_length: usize,
}

impl Default for NalUnitExtractor {
    fn default() -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_unit_length: MAX_NAL_UNIT_LENGTH,
        }
    }
}

impl NalUnitExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An unterminated unit longer than `max_unit_length` is discarded and
    /// the extractor resynchronises on the next start code. Units are
    /// length-prefixed with 32 bits downstream, which caps the limit.
    pub fn with_max_unit_length(mut self, max_unit_length: usize) -> Self {
        self.max_unit_length = max_unit_length.min(u32::MAX as usize);
        self
    }

    pub fn max_unit_length(&self) -> usize {
        self.max_unit_length
    }

    /// Appends `data` and returns every NAL unit it completed, in stream order.
    pub fn append(&mut self, data: &[u8]) -> Vec<NalUnit> {
        let mut units = Vec::new();
        self.append_with(data, |unit| units.push(unit));
        units
    }

    /// Appends `data` and synchronously passes each completed unit to
    /// `on_unit` before returning.
    pub fn append_with(&mut self, data: &[u8], mut on_unit: impl FnMut(NalUnit)) {
        self.buffer.extend_from_slice(data);

        loop {
            let Some(first) = find_start_code(&self.buffer, 0) else {
                self.discard_all_but_tail();
                break;
            };
            if first > 0 {
                trace!("Discarding {} bytes before start code", first);
                self.buffer.advance(first);
                self.scanned = 0;
            }
            let body_start = START_CODE.len();

            let search_from = self.scanned.max(body_start);
            let Some(second) = find_start_code(&self.buffer, search_from) else {
                if self.buffer.len() - body_start > self.max_unit_length {
                    warn!(
                        "Discarding unterminated NAL unit longer than {} bytes",
                        self.max_unit_length
                    );
                    self.discard_all_but_tail();
                } else {
                    // A start code may straddle the end of the buffer, so the
                    // last three bytes must be looked at again next time.
                    self.scanned = self
                        .buffer
                        .len()
                        .saturating_sub(START_CODE.len() - 1)
                        .max(body_start);
                }
                break;
            };

            self.buffer.advance(body_start);
            let unit = self.buffer.split_to(second - body_start).freeze();
            self.scanned = 0;

            trace!("Extracted NAL unit of {} bytes", unit.len());
            on_unit(NalUnit::new(unit));
        }
    }

    /// Keeps only the bytes that could be the start of a start code cut off
    /// by the end of the read.
    fn discard_all_but_tail(&mut self) {
        let keep = START_CODE.len() - 1;
        if self.buffer.len() > keep {
            self.buffer.advance(self.buffer.len() - keep);
        }
        self.scanned = 0;
    }

    /// Bytes received but not yet emitted as a unit.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Drops all buffered bytes, e.g. when switching to a new connection.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

fn find_start_code(haystack: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(START_CODE.len())
        .position(|window| window == START_CODE)
        .map(|position| position + from)
}
