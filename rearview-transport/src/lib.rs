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

//! TCP transport for the rearview camera's H.264 video stream.
//!
//! [`Connection`] owns one TCP client connection and reports its lifecycle as
//! tagged events over a tokio channel. [`CameraHost`] validates the camera
//! address up front.

pub mod address;
pub mod connection;

pub use address::{AddressError, CameraHost};
pub use connection::{
    Connection, ConnectionEvent, ConnectionMessage, ConnectionOptions, ConnectionState,
    TerminationReason,
};
