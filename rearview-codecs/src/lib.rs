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

//! H.264 Annex-B parsing for the rearview camera feed.
//!
//! Bytes read from the camera socket go into an [`H264StreamParser`], which
//! splits them into NAL units, tracks the parameter sets and hands back
//! [`DecodableFrame`]s that a decoder or display layer can consume directly.

pub mod bridge;
pub mod format;
pub mod frame;
pub mod nal;
pub mod parser;

pub use bridge::AccessUnitBridge;
pub use format::{FormatDescription, FormatError};
pub use frame::{DecodableFrame, FrameType};
pub use nal::{NalUnit, NalUnitExtractor, NalUnitType, MAX_NAL_UNIT_LENGTH, START_CODE};
pub use parser::{H264StreamParser, ParseEvent};
