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

//! Platform collaborators consumed by the sessions.
//!
//! The core owns none of these. A host wires in a real radio (see the
//! `bluez` backend) or the fakes from [`super::mock`].

use std::io;
use uuid::Uuid;

use crate::error::{ConnectError, RadioError};
use crate::peer::{PeerAddress, RemotePeer};

/// Signals emitted by the radio layer while discovering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioSignal {
    ScanStarted,
    PeerFound(RemotePeer),
    ScanFinished,
}

/// The Bluetooth adapter.
///
/// `start_discovery` only asks the adapter to scan; progress arrives later
/// as [`RadioSignal`]s which the host feeds into the discovery session.
pub trait RadioStack: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Ask the platform to power the adapter on. May complete later.
    fn request_enable(&self) -> Result<(), RadioError>;

    fn disable(&self) -> Result<(), RadioError>;

    fn is_discovering(&self) -> bool;

    fn start_discovery(&self) -> Result<(), RadioError>;

    fn cancel_discovery(&self) -> Result<(), RadioError>;

    /// Enumerate bonded devices. May block.
    fn bonded_peers(&self) -> Result<Vec<RemotePeer>, RadioError>;

    /// Create an unconnected stream socket to `peer` for `service`.
    fn open_socket(
        &self,
        peer: &PeerAddress,
        service: Uuid,
    ) -> Result<Box<dyn PeerSocket>, ConnectError>;
}

/// Closable duplex byte stream to one peer.
pub trait PeerSocket: Send + Sync {
    /// Blocking connect. Must return (with an error) once `close` is called
    /// from another thread.
    fn connect(&self) -> Result<(), ConnectError>;

    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Idempotent, never fails.
    fn close(&self);
}

/// Location permission check required before scanning.
pub trait PermissionGate: Send + Sync {
    fn location_granted(&self) -> bool;
}

/// Permission gate for platforms without a location permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn location_granted(&self) -> bool {
        true
    }
}
