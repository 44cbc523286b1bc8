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

use super::log_sink::LogSink;
use rearview_client::rearview_codecs::{DecodableFrame, FormatDescription};
use rearview_client::DisplaySink;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Writes every displayed frame back out as an Annex-B elementary stream.
///
/// Parameter sets are written in front of the first frame and again whenever
/// the stream's format description changes, so the file plays in standard
/// tools such as `ffplay`.
pub struct RecordingSink<W: Write = BufWriter<File>> {
    inner: LogSink,
    writer: Option<W>,
    last_format: Option<Arc<FormatDescription>>,
    bytes_written: u64,
}

impl RecordingSink {
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!("Recording stream to {}", path.display());
        Ok(Self::with_writer(BufWriter::new(file)))
    }
}

impl<W: Write> RecordingSink<W> {
    pub fn with_writer(writer: W) -> Self {
        Self {
            inner: LogSink::new(),
            writer: Some(writer),
            last_format: None,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_writer(mut self) -> Option<W> {
        self.writer.take()
    }

    fn write_frame(&mut self, frame: &DecodableFrame) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let format_changed = self
            .last_format
            .as_ref()
            .map_or(true, |last| !Arc::ptr_eq(last, frame.format()));
        let bytes = frame.to_annex_b(format_changed);

        match writer.write_all(&bytes) {
            Ok(()) => {
                self.bytes_written += bytes.len() as u64;
                self.last_format = Some(frame.format().clone());
            }
            Err(e) => {
                error!("Recording stopped: {e}");
                self.writer = None;
            }
        }
    }
}

impl<W: Write + Send + 'static> DisplaySink for RecordingSink<W> {
    fn enqueue(&mut self, frame: DecodableFrame) {
        self.write_frame(&frame);
        self.inner.enqueue(frame);
    }

    fn flush_and_remove_image(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                error!("Failed to flush recording: {e}");
            }
        }
        self.inner.flush_and_remove_image();
    }

    fn fade_in(&mut self) {
        self.inner.fade_in();
    }

    fn set_reconnecting(&mut self, reconnecting: bool) {
        self.inner.set_reconnecting(reconnecting);
    }
}

impl<W: Write> Drop for RecordingSink<W> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                error!("Failed to flush recording: {e}");
            }
            info!("Recorded {} bytes", self.bytes_written);
        }
    }
}
