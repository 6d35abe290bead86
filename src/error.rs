// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for discovery and connection sessions.

use thiserror::Error;

use crate::peer::PeerAddress;

/// Errors returned directly to the caller of a session operation.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Location permission not granted, discovery not started")]
    PermissionDenied,

    #[error("Bluetooth adapter is disabled")]
    RadioDisabled,

    #[error("A connection to {target} is already in progress")]
    AlreadyConnecting { target: PeerAddress },

    #[error("Invalid peer: {0}")]
    InvalidPeer(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    #[error("No active connection")]
    NotConnected,

    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport failures of a single connection attempt.
///
/// These never reach the caller of `connect()`; they are reported through
/// the listener together with the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Connection timed out")]
    Timeout,

    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Connection I/O error: {0}")]
    Io(String),

    #[error("Socket closed during connect")]
    Closed,
}

impl ConnectError {
    /// Stable short code for the failure reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ConnectError::Timeout => "timeout",
            ConnectError::Refused(_) => "refused",
            ConnectError::Io(_) => "io",
            ConnectError::Closed => "closed",
        }
    }
}

impl From<std::io::Error> for ConnectError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => ConnectError::Timeout,
            std::io::ErrorKind::ConnectionRefused => ConnectError::Refused(err.to_string()),
            _ => ConnectError::Io(err.to_string()),
        }
    }
}

/// Errors raised by the platform radio stack.
#[derive(Error, Debug, Clone)]
pub enum RadioError {
    #[error("Bluetooth adapter not available")]
    Unavailable,

    #[error("Bluetooth backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(ConnectError::Timeout.reason_code(), "timeout");
        assert_eq!(ConnectError::Refused("busy".into()).reason_code(), "refused");
        assert_eq!(ConnectError::Closed.reason_code(), "closed");
    }

    #[test]
    fn test_io_error_mapping() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(ConnectError::from(err), ConnectError::Timeout);

        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no");
        assert_eq!(ConnectError::from(err).reason_code(), "refused");

        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(ConnectError::from(err).reason_code(), "io");
    }
}
