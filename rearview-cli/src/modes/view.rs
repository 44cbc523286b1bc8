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

use rearview_client::{RearviewConfig, RearviewSession, SessionEvent};
use rearview_cli::cli_args::View;
use rearview_cli::consumers::log_sink::LogSink;
use rearview_cli::consumers::recording_sink::RecordingSink;
use rearview_cli::consumers::ViewSinks;
use std::time::Duration;
use tracing::{debug, info, warn};

pub async fn view(mut config: RearviewConfig, opt: View) -> anyhow::Result<()> {
    if opt.no_camera_control {
        config.camera_control_enabled = false;
    }

    let sink = match &opt.record {
        Some(path) => ViewSinks::Recording(Box::new(RecordingSink::create(path)?)),
        None => ViewSinks::Log(LogSink::new()),
    };

    info!(
        "Connecting to camera {} (video port {}, control port {})",
        config.camera_address, config.video_port, config.control_port
    );
    let (session, mut events) = RearviewSession::spawn(config, sink);
    session.set_sensitivity_mode(opt.mode)?;
    session.set_daylight(opt.daylight)?;
    session.start()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let duration_elapsed = async {
        match opt.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(duration_elapsed);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, stopping");
                break Ok(());
            }
            _ = &mut duration_elapsed => {
                info!("Duration elapsed, stopping");
                break Ok(());
            }
            event = events.recv() => match event {
                Some(SessionEvent::InvalidAddress(e)) => {
                    break Err(anyhow::anyhow!(
                        "{e}. Set the camera address with --camera-address or CAMERA_ADDRESS"
                    ));
                }
                Some(event) => log_event(&event),
                None => break Err(anyhow::anyhow!("session ended unexpectedly")),
            }
        }
    };

    session.shutdown().await;
    result
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connecting { connection_id } => {
            debug!("Connection {connection_id} connecting")
        }
        SessionEvent::Established { connection_id } => {
            info!("Connection {connection_id} established")
        }
        SessionEvent::Terminated {
            reason,
            retry_after: Some(delay),
        } => info!("Connection terminated ({reason}), retrying in {delay:?}"),
        SessionEvent::Terminated {
            reason,
            retry_after: None,
        } => info!("Connection terminated ({reason})"),
        SessionEvent::FrameExpired => warn!("Stream went stale, display cleared"),
        SessionEvent::DecodeError(e) => warn!("Cannot decode stream: {e}"),
        SessionEvent::InvalidAddress(e) => warn!("{e}"),
        SessionEvent::Stopped => info!("Session stopped"),
    }
}
