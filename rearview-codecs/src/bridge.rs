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

//! Turns NAL units into decodable frames.
//!
//! Parameter sets are remembered as they pass by; every picture slice is
//! paired with a format description derived from the current SPS/PPS pair.

use crate::format::{FormatDescription, FormatError};
use crate::frame::{DecodableFrame, FrameType};
use crate::nal::{NalUnit, NalUnitType};
use log::{debug, trace, warn};
use std::sync::Arc;

/// Parameter-set state plus the format description cache.
///
/// The cached description is built lazily on the first slice after a
/// parameter set changed and reused for every slice until one of them changes
/// again. A parameter set that is re-sent with identical bytes (raspivid's
/// `--inline` repeats them before each IDR) is not a change.
#[derive(Debug, Default)]
pub struct AccessUnitBridge {
    sps: Option<NalUnit>,
    pps: Option<NalUnit>,
    cached_format: Option<Result<Arc<FormatDescription>, FormatError>>,
    format_builds: u64,
    next_sequence_number: u64,
}

impl AccessUnitBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one NAL unit.
    ///
    /// Returns a frame for picture slices once both parameter sets are
    /// known, `Ok(None)` for everything that does not produce a frame, and an
    /// error the first time the current parameter sets fail to produce a
    /// format description. Slices are dropped in both of the latter cases.
    pub fn process(&mut self, unit: NalUnit) -> Result<Option<DecodableFrame>, FormatError> {
        match unit.nal_type() {
            NalUnitType::SequenceParameterSet => {
                if Self::replace(&mut self.sps, unit) {
                    debug!("Sequence parameter set changed");
                    self.cached_format = None;
                }
                Ok(None)
            }
            NalUnitType::PictureParameterSet => {
                if Self::replace(&mut self.pps, unit) {
                    debug!("Picture parameter set changed");
                    self.cached_format = None;
                }
                Ok(None)
            }
            nal_type if nal_type.is_picture_slice() => {
                let format = match self.format_description() {
                    Some(Ok(format)) => format,
                    Some(Err(e)) => return Err(e),
                    None => {
                        trace!("Dropping {:?} received before parameter sets", nal_type);
                        return Ok(None);
                    }
                };

                let frame_type = if nal_type == NalUnitType::CodedSliceOfIdrPicture {
                    FrameType::KeyFrame
                } else {
                    FrameType::DeltaFrame
                };
                let Some(frame) =
                    DecodableFrame::new(self.next_sequence_number, frame_type, format, unit.data())
                else {
                    warn!("Dropping slice of {} bytes", unit.len());
                    return Ok(None);
                };
                self.next_sequence_number += 1;
                Ok(Some(frame))
            }
            other => {
                trace!("Ignoring NAL unit of type {:?}", other);
                Ok(None)
            }
        }
    }

    /// The current format description, building it if the cache is empty.
    ///
    /// `None` until both parameter sets have been seen. A failed build is
    /// reported once; afterwards slices are dropped quietly until a parameter
    /// set changes.
    fn format_description(&mut self) -> Option<Result<Arc<FormatDescription>, FormatError>> {
        let (sps, pps) = (self.sps.as_ref()?, self.pps.as_ref()?);

        match &self.cached_format {
            Some(Ok(format)) => Some(Ok(format.clone())),
            Some(Err(_)) => None,
            None => {
                self.format_builds += 1;
                let built = FormatDescription::from_parameter_sets(sps, pps).map(Arc::new);
                match &built {
                    Ok(format) => debug!("Built format description {}", format.codec_string()),
                    Err(e) => debug!("Unable to build format description: {}", e),
                }
                self.cached_format = Some(built.clone());
                Some(built)
            }
        }
    }

    /// Stores `unit` in `slot`, returning whether the stored bytes changed.
    fn replace(slot: &mut Option<NalUnit>, unit: NalUnit) -> bool {
        let changed = slot.as_ref() != Some(&unit);
        *slot = Some(unit);
        changed
    }

    pub fn has_parameter_sets(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// The cached format description, if one has been built successfully.
    pub fn cached_format(&self) -> Option<&Arc<FormatDescription>> {
        self.cached_format.as_ref().and_then(|cached| cached.as_ref().ok())
    }

    /// How many times a format description has been built.
    pub fn format_builds(&self) -> u64 {
        self.format_builds
    }

    /// Forgets parameter sets and the cached description.
    pub fn reset(&mut self) {
        self.sps = None;
        self.pps = None;
        self.cached_format = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sps() -> NalUnit {
        NalUnit::new(&[0x67u8, 0x64, 0x00, 0x28, 0xac, 0xd9][..])
    }

    fn pps() -> NalUnit {
        NalUnit::new(&[0x68u8, 0xeb, 0xe3, 0xcb][..])
    }

    fn idr() -> NalUnit {
        NalUnit::new(&[0x65u8, 0x88, 0x84, 0x21][..])
    }

    fn non_idr() -> NalUnit {
        NalUnit::new(&[0x41u8, 0x9a, 0x02][..])
    }

    #[test]
    fn test_slice_before_parameter_sets_is_dropped() {
        let mut bridge = AccessUnitBridge::new();
        assert!(bridge.process(idr()).unwrap().is_none());
        assert!(bridge.process(sps()).unwrap().is_none());
        assert!(bridge.process(non_idr()).unwrap().is_none());
        assert_eq!(bridge.format_builds(), 0);

        bridge.process(pps()).unwrap();
        let frame = bridge.process(idr()).unwrap().expect("frame");
        assert_eq!(frame.sequence_number, 0);
        assert_eq!(frame.frame_type, FrameType::KeyFrame);
        assert_eq!(frame.slice(), idr().data().as_ref());
    }

    #[test]
    fn test_format_description_is_built_once() {
        let mut bridge = AccessUnitBridge::new();
        bridge.process(sps()).unwrap();
        bridge.process(pps()).unwrap();

        let first = bridge.process(idr()).unwrap().unwrap();
        for _ in 0..1000 {
            let frame = bridge.process(non_idr()).unwrap().unwrap();
            assert!(Arc::ptr_eq(frame.format(), first.format()));
            assert_eq!(frame.frame_type, FrameType::DeltaFrame);
        }
        assert_eq!(bridge.format_builds(), 1);
    }

    #[test]
    fn test_changed_parameter_set_forces_one_rebuild() {
        let mut bridge = AccessUnitBridge::new();
        bridge.process(sps()).unwrap();
        bridge.process(pps()).unwrap();
        let before = bridge.process(idr()).unwrap().unwrap();

        bridge
            .process(NalUnit::new(&[0x68u8, 0xee, 0x3c, 0x80][..]))
            .unwrap();
        assert!(bridge.cached_format().is_none());

        let after = bridge.process(idr()).unwrap().unwrap();
        let again = bridge.process(non_idr()).unwrap().unwrap();
        assert!(!Arc::ptr_eq(before.format(), after.format()));
        assert!(Arc::ptr_eq(after.format(), again.format()));
        assert_eq!(bridge.format_builds(), 2);

        bridge
            .process(NalUnit::new(&[0x67u8, 0x42, 0xc0, 0x1f][..]))
            .unwrap();
        let rebuilt = bridge.process(idr()).unwrap().unwrap();
        assert_eq!(rebuilt.format().profile_idc(), 0x42);
        assert_eq!(bridge.format_builds(), 3);
    }

    #[test]
    fn test_repeated_identical_parameter_sets_keep_cache() {
        let mut bridge = AccessUnitBridge::new();
        bridge.process(sps()).unwrap();
        bridge.process(pps()).unwrap();
        let first = bridge.process(idr()).unwrap().unwrap();

        bridge.process(sps()).unwrap();
        bridge.process(pps()).unwrap();
        let second = bridge.process(idr()).unwrap().unwrap();

        assert!(Arc::ptr_eq(first.format(), second.format()));
        assert_eq!(bridge.format_builds(), 1);
    }

    #[test]
    fn test_unusable_parameter_sets_report_once() {
        let mut bridge = AccessUnitBridge::new();
        bridge.process(NalUnit::new(&[0x67u8, 0x64][..])).unwrap();
        bridge.process(pps()).unwrap();

        assert_eq!(
            bridge.process(idr()).unwrap_err(),
            FormatError::SequenceParameterSetTooShort(2)
        );
        assert!(bridge.process(non_idr()).unwrap().is_none());
        assert_eq!(bridge.format_builds(), 1);

        bridge.process(sps()).unwrap();
        assert!(bridge.process(idr()).unwrap().is_some());
    }

    #[test]
    fn test_other_units_are_ignored() {
        let mut bridge = AccessUnitBridge::new();
        bridge.process(sps()).unwrap();
        bridge.process(pps()).unwrap();
        for header in [0x06u8, 0x09, 0x0c, 0x02, 0x14, 0x1f] {
            assert!(bridge.process(NalUnit::new(vec![header, 0xff])).unwrap().is_none());
        }
        assert!(bridge.process(NalUnit::new(bytes::Bytes::new())).unwrap().is_none());
        assert_eq!(bridge.format_builds(), 0);
    }
}
