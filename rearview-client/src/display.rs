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

use rearview_codecs::DecodableFrame;

/// Where decoded frames go. Called only from the session task.
pub trait DisplaySink: Send + 'static {
    /// Shows `frame` next. Frames arrive in decode order.
    fn enqueue(&mut self, frame: DecodableFrame);

    /// Drops anything queued and blanks the picture.
    fn flush_and_remove_image(&mut self);

    /// Called before the first frame of each established connection.
    fn fade_in(&mut self) {}

    fn set_reconnecting(&mut self, _reconnecting: bool) {}
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn enqueue(&mut self, frame: DecodableFrame) {
        (**self).enqueue(frame)
    }

    fn flush_and_remove_image(&mut self) {
        (**self).flush_and_remove_image()
    }

    fn fade_in(&mut self) {
        (**self).fade_in()
    }

    fn set_reconnecting(&mut self, reconnecting: bool) {
        (**self).set_reconnecting(reconnecting)
    }
}
