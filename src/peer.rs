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

//! Peer identity and records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// Unique, stable identifier of a physical device.
///
/// Opaque to the core: the value is never normalised, only checked to be
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Validate and wrap an address.
    pub fn new(address: impl Into<String>) -> Result<Self, SessionError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(SessionError::InvalidPeer("empty address".to_string()));
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.0
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerOrigin {
    /// Found by a scan in this session.
    Discovered,
    /// Enumerated from the adapter's bonded devices.
    Paired,
}

/// A known peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: PeerAddress,
    pub display_name: String,
    pub origin: PeerOrigin,
}

impl PeerRecord {
    pub fn discovered(address: PeerAddress, display_name: impl Into<String>) -> Self {
        Self {
            address,
            display_name: display_name.into(),
            origin: PeerOrigin::Discovered,
        }
    }

    pub fn paired(address: PeerAddress, display_name: impl Into<String>) -> Self {
        Self {
            address,
            display_name: display_name.into(),
            origin: PeerOrigin::Paired,
        }
    }
}

/// A device as reported by the radio layer, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePeer {
    pub address: Option<String>,
    pub name: Option<String>,
}

impl RemotePeer {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            name: Some(name.into()),
        }
    }

    /// Validate into an address and a non-empty display name.
    ///
    /// Devices without a name are rejected just like devices without an
    /// address.
    pub fn validate(&self) -> Result<(PeerAddress, String), SessionError> {
        let address = self
            .address
            .as_deref()
            .ok_or_else(|| SessionError::InvalidPeer("missing address".to_string()))?;
        let address = PeerAddress::new(address)?;

        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok((address, name.to_string())),
            _ => Err(SessionError::InvalidPeer(format!("{} has no name", address))),
        }
    }
}
