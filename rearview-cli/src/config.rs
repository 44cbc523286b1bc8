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

use crate::cli_args::CameraArgs;
use rearview_client::RearviewConfig;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const CONFIG_PATH_VAR: &str = "REARVIEW_CONFIG_PATH";

pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<RearviewConfig> {
    let content = fs::read_to_string(path)?;
    let config: RearviewConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

pub fn from_env_or_default() -> anyhow::Result<RearviewConfig> {
    // Try to load from config file first
    if let Ok(config_path) = std::env::var(CONFIG_PATH_VAR) {
        return from_file(&config_path);
    }
    Ok(from_vars(|name| std::env::var(name).ok()))
}

/// Builds a config from `CAMERA_ADDRESS`, `VIDEO_PORT` and `CONTROL_PORT`
/// over the defaults.
pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> RearviewConfig {
    let mut config = RearviewConfig::default();
    if let Some(address) = var("CAMERA_ADDRESS") {
        config.camera_address = address;
    }
    config.video_port = port_var(&var, "VIDEO_PORT", config.video_port);
    config.control_port = port_var(&var, "CONTROL_PORT", config.control_port);
    config
}

fn port_var(var: &impl Fn(&str) -> Option<String>, name: &str, default: u16) -> u16 {
    match var(name) {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring {name}={value}, not a port number");
            default
        }),
        None => default,
    }
}

/// Resolves the effective config: `--config`, else the environment, then
/// command line overrides.
pub fn load(args: &CameraArgs) -> anyhow::Result<RearviewConfig> {
    let mut config = match &args.config {
        Some(path) => from_file(path)?,
        None => from_env_or_default()?,
    };
    if let Some(address) = &args.camera_address {
        config.camera_address = address.clone();
    }
    if let Some(port) = args.video_port {
        config.video_port = port;
    }
    if let Some(port) = args.control_port {
        config.control_port = port;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let config = from_vars(vars(&[
            ("CAMERA_ADDRESS", "192.168.1.20"),
            ("VIDEO_PORT", "6001"),
        ]));
        assert_eq!(config.camera_address, "192.168.1.20");
        assert_eq!(config.video_port, 6001);
        assert_eq!(config.control_port, 5002);
    }

    #[test]
    fn test_bad_port_falls_back_to_default() {
        let config = from_vars(vars(&[("CONTROL_PORT", "http")]));
        assert_eq!(config.control_port, 5002);
    }

    #[test]
    fn test_yaml_file_with_cli_overrides() {
        let path = std::env::temp_dir().join(format!("rearview-config-{}.yaml", std::process::id()));
        fs::write(
            &path,
            "camera_address: 10.0.0.2\nfailure_retry_delay_ms: 2000\ndigital_gain_for_low_light_mode: 6.0\n",
        )
        .unwrap();

        let args = CameraArgs {
            config: Some(path.clone()),
            camera_address: None,
            video_port: Some(7001),
            control_port: None,
        };
        let config = load(&args).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.camera_address, "10.0.0.2");
        assert_eq!(config.failure_retry_delay_ms, 2000);
        assert_eq!(config.digital_gain_for_low_light_mode, 6.0);
        assert_eq!(config.video_port, 7001);
        assert_eq!(config.control_port, 5002);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let args = CameraArgs {
            config: Some("/nonexistent/rearview.yaml".into()),
            ..CameraArgs::default()
        };
        assert!(load(&args).is_err());
    }
}
