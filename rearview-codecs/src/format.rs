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

//! Decoder format descriptions built from H.264 parameter sets.

use crate::nal::NalUnit;
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the big-endian length prefix in front of every slice handed to the
/// decoder. Matches `lengthSizeMinusOne = 3` in the configuration record.
pub const NAL_LENGTH_SIZE: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("sequence parameter set is too short ({0} bytes)")]
    SequenceParameterSetTooShort(usize),
    #[error("picture parameter set is empty")]
    EmptyPictureParameterSet,
    #[error("parameter set of {0} bytes does not fit a 16-bit length")]
    ParameterSetTooLarge(usize),
}

/// Everything a decoder needs to interpret the slices of one coded video
/// sequence.
///
/// Holds an `AVCDecoderConfigurationRecord` (ISO/IEC 14496-15 5.2.4.1) with
/// exactly one SPS and one PPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescription {
    avc_config: Bytes,
    sps: Bytes,
    pps: Bytes,
}

impl FormatDescription {
    pub fn from_parameter_sets(sps: &NalUnit, pps: &NalUnit) -> Result<Self, FormatError> {
        let sps = sps.data().clone();
        let pps = pps.data().clone();

        // Header byte plus profile_idc, constraint flags and level_idc.
        if sps.len() < 4 {
            return Err(FormatError::SequenceParameterSetTooShort(sps.len()));
        }
        if pps.is_empty() {
            return Err(FormatError::EmptyPictureParameterSet);
        }
        let sps_len =
            u16::try_from(sps.len()).map_err(|_| FormatError::ParameterSetTooLarge(sps.len()))?;
        let pps_len =
            u16::try_from(pps.len()).map_err(|_| FormatError::ParameterSetTooLarge(pps.len()))?;

        let mut record = BytesMut::with_capacity(11 + sps.len() + pps.len());
        record.put_u8(1); // configurationVersion
        record.extend_from_slice(&sps[1..4]);
        record.put_u8(0b1111_1100 | (NAL_LENGTH_SIZE as u8 - 1));
        record.put_u8(0b1110_0000 | 1); // one SPS
        record.put_u16(sps_len);
        record.extend_from_slice(&sps);
        record.put_u8(1); // one PPS
        record.put_u16(pps_len);
        record.extend_from_slice(&pps);

        Ok(Self {
            avc_config: record.freeze(),
            sps,
            pps,
        })
    }

    /// The serialized `AVCDecoderConfigurationRecord` ("avcC").
    pub fn avc_config(&self) -> &Bytes {
        &self.avc_config
    }

    pub fn sps(&self) -> &Bytes {
        &self.sps
    }

    pub fn pps(&self) -> &Bytes {
        &self.pps
    }

    pub fn profile_idc(&self) -> u8 {
        self.sps[1]
    }

    pub fn constraint_flags(&self) -> u8 {
        self.sps[2]
    }

    pub fn level_idc(&self) -> u8 {
        self.sps[3]
    }

    /// RFC 6381 codec string, e.g. `avc1.640028`.
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02X}{:02X}{:02X}",
            self.profile_idc(),
            self.constraint_flags(),
            self.level_idc()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x28, 0xac, 0xd9, 0x40];
    const PPS: &[u8] = &[0x68, 0xeb, 0xe3, 0xcb];

    #[test]
    fn test_builds_avc_configuration_record() {
        let format =
            FormatDescription::from_parameter_sets(&NalUnit::new(SPS), &NalUnit::new(PPS))
                .unwrap();

        let record = format.avc_config();
        assert_eq!(record.len(), 11 + SPS.len() + PPS.len());
        assert_eq!(&record[..6], &[0x01, 0x64, 0x00, 0x28, 0xff, 0xe1]);
        assert_eq!(&record[6..8], &(SPS.len() as u16).to_be_bytes());
        assert_eq!(&record[8..8 + SPS.len()], SPS);
        let pps_at = 8 + SPS.len();
        assert_eq!(record[pps_at], 0x01);
        assert_eq!(&record[pps_at + 1..pps_at + 3], &(PPS.len() as u16).to_be_bytes());
        assert_eq!(&record[pps_at + 3..], PPS);

        assert_eq!(format.profile_idc(), 100);
        assert_eq!(format.level_idc(), 40);
        assert_eq!(format.codec_string(), "avc1.640028");
    }

    #[test]
    fn test_rejects_unusable_parameter_sets() {
        let short = NalUnit::new(vec![0x67u8, 0x64]);
        assert_eq!(
            FormatDescription::from_parameter_sets(&short, &NalUnit::new(PPS)),
            Err(FormatError::SequenceParameterSetTooShort(2))
        );
        assert_eq!(
            FormatDescription::from_parameter_sets(&NalUnit::new(SPS), &NalUnit::new(Bytes::new())),
            Err(FormatError::EmptyPictureParameterSet)
        );

        let mut huge = SPS.to_vec();
        huge.resize(70_000, 0x11);
        assert_eq!(
            FormatDescription::from_parameter_sets(&NalUnit::new(huge), &NalUnit::new(PPS)),
            Err(FormatError::ParameterSetTooLarge(70_000))
        );
    }
}
