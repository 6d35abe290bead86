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

//! Bluetooth discovery and connection sessions.
//!
//! Platform radio access sits behind [`RadioStack`]; the sessions never talk
//! to an adapter directly.

#[cfg(all(feature = "bluez", target_os = "linux"))]
mod bluez;
mod connection;
pub mod constants;
mod discovery;
mod manager;
pub mod mock;
mod radio;
mod registry;

#[cfg(all(feature = "bluez", target_os = "linux"))]
pub use bluez::BluezRadio;
pub use connection::{ConnectionOptions, ConnectionSession};
pub use constants::SERVICE_UUID;
pub use discovery::{DiscoveryOptions, DiscoverySession};
pub use manager::PeerManager;
pub use radio::{AlwaysGranted, PeerSocket, PermissionGate, RadioSignal, RadioStack};
pub use registry::PeerRegistry;
