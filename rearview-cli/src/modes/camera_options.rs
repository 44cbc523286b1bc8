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

use rearview_cli::cli_args::CameraOptionsArgs;
use rearview_client::{CameraOptionsAdjuster, RearviewConfig};
use tracing::info;

pub async fn camera_options(config: RearviewConfig, opt: CameraOptionsArgs) -> anyhow::Result<()> {
    let adjuster = CameraOptionsAdjuster::new(&config)?;
    info!("Sending {} preset to {}", opt.mode, adjuster.url());

    match adjuster.apply(opt.mode, opt.daylight, opt.retries).await? {
        Some(options) => println!("{}", serde_json::to_string_pretty(&options)?),
        None => println!("The auto preset needs --daylight day|night; nothing was sent."),
    }
    Ok(())
}
