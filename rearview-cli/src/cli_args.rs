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

use clap::{Args, Parser, Subcommand};
use rearview_client::{CameraSensitivityMode, Daylight};
use std::path::PathBuf;

/// Rearview camera CLI
///
/// Connects to a Raspberry Pi camera that streams raw H.264 over TCP
/// (raspivid `--listen -o tcp://0.0.0.0:5001`) and controls its exposure
/// through the HTTP options service on the adjacent port.
#[derive(Parser, Debug)]
#[clap(name = "rearview")]
pub struct Opt {
    #[clap(flatten)]
    pub camera: CameraArgs,

    #[clap(subcommand)]
    pub mode: Mode,
}

/// Where the camera is. Flags override the config file and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct CameraArgs {
    /// YAML configuration file. Defaults to `$REARVIEW_CONFIG_PATH` when set.
    #[clap(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Literal IPv4 or IPv6 address of the camera.
    #[clap(long = "camera-address", short = 'c', global = true)]
    pub camera_address: Option<String>,

    #[clap(long = "video-port", global = true)]
    pub video_port: Option<u16>,

    #[clap(long = "control-port", global = true)]
    pub control_port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Watch the live stream, logging connection health and frame rate.
    View(View),

    /// Push one sensitivity preset to the camera and exit.
    CameraOptions(CameraOptionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct View {
    /// Write the received stream to this file as Annex-B H.264.
    #[clap(long = "record")]
    pub record: Option<PathBuf>,

    /// Stop after this many seconds. Runs until Ctrl-C otherwise.
    #[clap(long = "duration")]
    pub duration: Option<u64>,

    /// Sensitivity preset to apply when the session starts.
    #[clap(long = "mode", short = 'm', default_value = "auto")]
    pub mode: CameraSensitivityMode,

    /// Needed for the auto preset: `day` or `night`.
    #[clap(long = "daylight")]
    pub daylight: Option<Daylight>,

    /// Do not send sensitivity presets to the camera.
    #[clap(long = "no-camera-control")]
    pub no_camera_control: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CameraOptionsArgs {
    /// auto, day, night, low-light or ultra-low-light.
    #[clap(long = "mode", short = 'm')]
    pub mode: CameraSensitivityMode,

    /// Needed for the auto preset: `day` or `night`.
    #[clap(long = "daylight")]
    pub daylight: Option<Daylight>,

    /// Extra attempts, one second apart, if the camera does not answer.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=60))]
    pub retries: u32,
}
