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

//! Session core for discovering and connecting to classic Bluetooth peers.
//!
//! A host (UI or otherwise) injects a radio stack, a permission gate and a
//! dispatcher, feeds radio signals in, and receives notifications through
//! [`events::SessionListener`].

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod peer;
pub mod state;

pub use bluetooth::{ConnectionSession, DiscoverySession, PeerManager, PeerRegistry};
pub use error::{ConnectError, RadioError, SessionError};
pub use events::{Dispatcher, QueueDispatcher, SessionEvent, SessionListener};
pub use peer::{PeerAddress, PeerOrigin, PeerRecord, RemotePeer};
pub use state::{ConnectionState, DiscoveryState};
