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

//! Session state enums.

/// State of the outbound connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed,
    Cancelled,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
            ConnectionState::Cancelled => "Cancelled",
        }
    }

    /// Whether a new `connect()` must be refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// State of the discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryState {
    #[default]
    Idle,
    Scanning,
}

impl DiscoveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryState::Idle => "Idle",
            DiscoveryState::Scanning => "Searching...",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states() {
        assert!(ConnectionState::Connecting.is_busy());
        assert!(ConnectionState::Connected.is_busy());
        assert!(!ConnectionState::Idle.is_busy());
        assert!(!ConnectionState::Failed.is_busy());
        assert!(!ConnectionState::Cancelled.is_busy());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert_eq!(DiscoveryState::default().as_str(), "Idle");
    }
}
