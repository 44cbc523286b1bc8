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

//! raspivid options understood by the camera's control server.
//!
//! Field names and value spellings are the raspivid command line flags, so
//! the control server can forward them verbatim. Unset fields are omitted
//! from the JSON body and keep whatever the camera currently uses.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const MIN_DIGITAL_GAIN: f32 = 1.0;
pub const MAX_DIGITAL_GAIN: f32 = 64.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CameraOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<i32>,
    #[serde(rename = "ISO", skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vstab: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<Exposure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flicker: Option<Flicker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awb: Option<Awb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imxfx: Option<ImageFx>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colfx: Option<ColourFx>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metering: Option<MeterMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hflip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vflip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<Roi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drc: Option<DrcLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awbgains: Option<AwbGains>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analoggain: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digitalgain: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framerate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intra: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irefresh: Option<IntraRefreshType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spstimings: Option<bool>,
}

impl CameraOptions {
    /// Daylight settings: automatic exposure, fixed white balance, 1440x1080 at 40fps.
    pub fn day() -> Self {
        Self {
            sharpness: Some(100),
            saturation: Some(12),
            exposure: Some(Exposure::Auto),
            flicker: Some(Flicker::Auto),
            awb: Some(Awb::Off),
            imxfx: Some(ImageFx::Denoise),
            metering: Some(MeterMode::Average),
            hflip: Some(true),
            drc: Some(DrcLevel::High),
            awbgains: Some(AwbGains {
                blue: 1.4,
                red: 1.6,
            }),
            width: Some(1440),
            height: Some(1080),
            framerate: Some(40),
            profile: Some(Profile::High),
            level: Some(Level::FourPointTwo),
            ..Self::default()
        }
    }

    pub fn night() -> Self {
        Self {
            brightness: Some(55),
            exposure: Some(Exposure::NightPreview),
            awbgains: Some(AwbGains {
                blue: 1.45,
                red: 1.7,
            }),
            ..Self::day()
        }
    }

    /// Night settings with a fixed ISP digital gain, clamped to 1.0..=64.0.
    pub fn fixed_sensitivity(digital_gain: f32) -> Self {
        Self {
            digitalgain: Some(sanitize_digital_gain(digital_gain)),
            ..Self::night()
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn sanitize_digital_gain(gain: f32) -> f32 {
    // NaN compares false both ways and would otherwise pass through.
    if gain.is_nan() {
        return MIN_DIGITAL_GAIN;
    }
    gain.clamp(MIN_DIGITAL_GAIN, MAX_DIGITAL_GAIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    Auto,
    Night,
    NightPreview,
    Backlight,
    Spotlight,
    Sports,
    Snow,
    Beach,
    VeryLong,
    FixedFps,
    AntiShake,
    Fireworks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flicker {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "50hz")]
    FiftyHz,
    #[serde(rename = "60hz")]
    SixtyHz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Awb {
    Off,
    Auto,
    Sun,
    Cloud,
    Shade,
    Tungsten,
    Fluorescent,
    Incandescent,
    Flash,
    Horizon,
    GreyWorld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFx {
    None,
    Negative,
    Solarise,
    Posterise,
    Whiteboard,
    Blackboard,
    Sketch,
    Denoise,
    Emboss,
    OilPaint,
    Hatch,
    GPen,
    Pastel,
    Watercolour,
    Film,
    Blur,
    Saturation,
    ColourSwap,
    WashedOut,
    ColourPoint,
    ColourBalance,
    Cartoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterMode {
    Average,
    Spot,
    Backlit,
    Matrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrcLevel {
    Off,
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Baseline,
    Main,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "4.1")]
    FourPointOne,
    #[serde(rename = "4.2")]
    FourPointTwo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntraRefreshType {
    Cyclic,
    Adaptive,
    Both,
    CyclicRows,
}

/// Fixed chroma values, sent as `"u,v"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColourFx {
    pub u: u32,
    pub v: u32,
}

impl Serialize for ColourFx {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{},{}", self.u, self.v))
    }
}

/// Normalised region of interest, sent as `"x,y,w,h"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Serialize for Roi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!(
            "{:?},{:?},{:?},{:?}",
            self.x, self.y, self.width, self.height
        ))
    }
}

/// Manual white balance gains, sent as `"blue,red"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AwbGains {
    pub blue: f32,
    pub red: f32,
}

impl Serialize for AwbGains {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{:?},{:?}", self.blue, self.red))
    }
}

/// Whether it is currently light outside. Used to resolve
/// [`CameraSensitivityMode::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Daylight {
    Day,
    Night,
}

impl FromStr for Daylight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Daylight::Day),
            "night" => Ok(Daylight::Night),
            other => Err(format!("unknown daylight value '{other}', expected day or night")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSensitivityMode {
    #[default]
    Auto,
    Day,
    Night,
    LowLight,
    UltraLowLight,
}

impl CameraSensitivityMode {
    pub const ALL: [CameraSensitivityMode; 5] = [
        CameraSensitivityMode::Auto,
        CameraSensitivityMode::Day,
        CameraSensitivityMode::Night,
        CameraSensitivityMode::LowLight,
        CameraSensitivityMode::UltraLowLight,
    ];

    /// Resolves the options to send. `Auto` needs `daylight`; without it
    /// there is nothing to send.
    pub fn camera_options(
        &self,
        daylight: Option<Daylight>,
        gains: SensitivityGains,
    ) -> Option<CameraOptions> {
        match self {
            CameraSensitivityMode::Auto => daylight.map(|daylight| match daylight {
                Daylight::Day => CameraOptions::day(),
                Daylight::Night => CameraOptions::night(),
            }),
            CameraSensitivityMode::Day => Some(CameraOptions::day()),
            CameraSensitivityMode::Night => Some(CameraOptions::night()),
            CameraSensitivityMode::LowLight => {
                Some(CameraOptions::fixed_sensitivity(gains.low_light))
            }
            CameraSensitivityMode::UltraLowLight => {
                Some(CameraOptions::fixed_sensitivity(gains.ultra_low_light))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraSensitivityMode::Auto => "auto",
            CameraSensitivityMode::Day => "day",
            CameraSensitivityMode::Night => "night",
            CameraSensitivityMode::LowLight => "low_light",
            CameraSensitivityMode::UltraLowLight => "ultra_low_light",
        }
    }
}

impl fmt::Display for CameraSensitivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraSensitivityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CameraSensitivityMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| format!("unknown sensitivity mode '{s}'"))
    }
}

/// Digital gains used by the fixed-sensitivity modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityGains {
    pub low_light: f32,
    pub ultra_low_light: f32,
}

impl Default for SensitivityGains {
    fn default() -> Self {
        Self {
            low_light: 4.0,
            ultra_low_light: 8.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(options: &CameraOptions) -> Value {
        serde_json::to_value(options).unwrap()
    }

    #[test]
    fn test_day_preset_json() {
        assert_eq!(
            to_value(&CameraOptions::day()),
            json!({
                "sharpness": 100,
                "saturation": 12,
                "exposure": "auto",
                "flicker": "auto",
                "awb": "off",
                "imxfx": "denoise",
                "metering": "average",
                "hflip": true,
                "drc": "high",
                "awbgains": "1.4,1.6",
                "width": 1440,
                "height": 1080,
                "framerate": 40,
                "profile": "high",
                "level": "4.2",
            })
        );
    }

    #[test]
    fn test_night_preset_overrides_day() {
        let night = CameraOptions::night();
        assert_eq!(night.brightness, Some(55));
        assert_eq!(night.exposure, Some(Exposure::NightPreview));
        assert_eq!(
            night.awbgains,
            Some(AwbGains {
                blue: 1.45,
                red: 1.7
            })
        );
        assert_eq!(night.width, Some(1440));
        assert_eq!(to_value(&night)["exposure"], "nightpreview");
        assert_eq!(to_value(&night)["awbgains"], "1.45,1.7");
    }

    #[test]
    fn test_fixed_sensitivity_clamps_gain() {
        assert_eq!(CameraOptions::fixed_sensitivity(0.2).digitalgain, Some(1.0));
        assert_eq!(CameraOptions::fixed_sensitivity(6.0).digitalgain, Some(6.0));
        assert_eq!(CameraOptions::fixed_sensitivity(100.0).digitalgain, Some(64.0));
        assert_eq!(CameraOptions::fixed_sensitivity(f32::NAN).digitalgain, Some(1.0));
        assert_eq!(
            CameraOptions::fixed_sensitivity(6.0).exposure,
            Some(Exposure::NightPreview)
        );
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let options = CameraOptions {
            iso: Some(800),
            ..CameraOptions::default()
        };
        assert_eq!(options.to_json().unwrap(), r#"{"ISO":800}"#);
        assert_eq!(CameraOptions::default().to_json().unwrap(), "{}");
    }

    #[test]
    fn test_composite_values_are_comma_joined() {
        let options = CameraOptions {
            colfx: Some(ColourFx { u: 128, v: 64 }),
            roi: Some(Roi {
                x: 0.5,
                y: 0.0,
                width: 0.25,
                height: 1.0,
            }),
            flicker: Some(Flicker::FiftyHz),
            ..CameraOptions::default()
        };
        assert_eq!(
            to_value(&options),
            json!({
                "colfx": "128,64",
                "roi": "0.5,0.0,0.25,1.0",
                "flicker": "50hz",
            })
        );
    }

    #[test]
    fn test_modes_resolve_to_presets() {
        let gains = SensitivityGains::default();
        assert_eq!(CameraSensitivityMode::Auto.camera_options(None, gains), None);
        assert_eq!(
            CameraSensitivityMode::Auto.camera_options(Some(Daylight::Night), gains),
            Some(CameraOptions::night())
        );
        assert_eq!(
            CameraSensitivityMode::Day.camera_options(Some(Daylight::Night), gains),
            Some(CameraOptions::day())
        );
        assert_eq!(
            CameraSensitivityMode::LowLight
                .camera_options(None, gains)
                .and_then(|o| o.digitalgain),
            Some(4.0)
        );
        assert_eq!(
            CameraSensitivityMode::UltraLowLight
                .camera_options(None, gains)
                .and_then(|o| o.digitalgain),
            Some(8.0)
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "ultra-low-light".parse::<CameraSensitivityMode>(),
            Ok(CameraSensitivityMode::UltraLowLight)
        );
        assert_eq!("Night".parse::<CameraSensitivityMode>(), Ok(CameraSensitivityMode::Night));
        assert!("dusk".parse::<CameraSensitivityMode>().is_err());
        assert_eq!("night".parse::<Daylight>(), Ok(Daylight::Night));
        for mode in CameraSensitivityMode::ALL {
            assert_eq!(mode.to_string().parse::<CameraSensitivityMode>(), Ok(mode));
        }
    }
}
