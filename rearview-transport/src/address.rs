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

//! Camera endpoint addressing.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Error returned when a camera host is not a literal IP address.
///
/// The camera is a device on the local network whose address is entered by
/// the user, so host names are never resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("no camera address is set")]
    Empty,
    #[error("'{0}' is not an IPv4 or IPv6 address")]
    NotAnIpAddress(String),
}

/// A validated camera host: a literal IPv4 or IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHost(IpAddr);

impl CameraHost {
    pub fn ip(&self) -> IpAddr {
        self.0
    }

    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.0, port)
    }
}

impl FromStr for CameraHost {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        // Accept the bracketed IPv6 form people copy out of URLs.
        let unbracketed = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);

        unbracketed
            .parse::<IpAddr>()
            .map(CameraHost)
            .map_err(|_| AddressError::NotAnIpAddress(s.to_string()))
    }
}

impl From<IpAddr> for CameraHost {
    fn from(ip: IpAddr) -> Self {
        CameraHost(ip)
    }
}

impl fmt::Display for CameraHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
