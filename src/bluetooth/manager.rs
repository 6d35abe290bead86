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

//! Entry point wiring registry, discovery and connection to one adapter.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::connection::{ConnectionOptions, ConnectionSession};
use super::discovery::{DiscoveryOptions, DiscoverySession};
use super::radio::{PermissionGate, RadioSignal, RadioStack};
use super::registry::PeerRegistry;
use crate::config::Config;
use crate::error::SessionError;
use crate::events::{Dispatcher, EventBus, SessionListener};
use crate::peer::{PeerAddress, PeerRecord};
use crate::state::{ConnectionState, DiscoveryState};

/// Manager for Bluetooth discovery and connection with state.
pub struct PeerManager {
    radio: Arc<dyn RadioStack>,
    registry: PeerRegistry,
    bus: EventBus,
    discovery: DiscoverySession,
    connection: Arc<ConnectionSession>,
}

impl PeerManager {
    pub fn new(
        radio: Arc<dyn RadioStack>,
        permissions: Arc<dyn PermissionGate>,
        dispatcher: Arc<dyn Dispatcher>,
        runtime: Handle,
        discovery_options: DiscoveryOptions,
        connection_options: ConnectionOptions,
    ) -> Self {
        let registry = PeerRegistry::new();
        let bus = EventBus::new(dispatcher);
        let discovery = DiscoverySession::new(
            radio.clone(),
            permissions,
            registry.clone(),
            bus.clone(),
            runtime.clone(),
            discovery_options,
        );
        let connection = Arc::new(ConnectionSession::new(
            radio.clone(),
            bus.clone(),
            runtime,
            connection_options,
        ));

        Self {
            radio,
            registry,
            bus,
            discovery,
            connection,
        }
    }

    /// Create a manager with options taken from `config`.
    pub fn from_config(
        radio: Arc<dyn RadioStack>,
        permissions: Arc<dyn PermissionGate>,
        dispatcher: Arc<dyn Dispatcher>,
        runtime: Handle,
        config: &Config,
    ) -> Self {
        Self::new(
            radio,
            permissions,
            dispatcher,
            runtime,
            config.discovery.discovery_options(),
            config.bluetooth.connection_options(),
        )
    }

    pub fn attach_listener(&self, listener: Arc<dyn SessionListener>) {
        self.bus.attach(listener);
    }

    pub fn detach_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        self.bus.detach(listener)
    }

    /// Read handle to the peer registry.
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Shared handle to the connection session, e.g. to cancel from
    /// another thread.
    pub fn connection(&self) -> &Arc<ConnectionSession> {
        &self.connection
    }

    pub fn discovery_state(&self) -> DiscoveryState {
        self.discovery.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_radio_enabled(&self) -> bool {
        self.radio.is_enabled()
    }

    /// Disable the adapter when on, otherwise request enabling it.
    /// Returns the state that was requested.
    pub fn toggle_radio(&self) -> Result<bool, SessionError> {
        if self.radio.is_enabled() {
            self.radio.disable()?;
            info!("Bluetooth adapter disabled");
            Ok(false)
        } else {
            self.radio.request_enable()?;
            info!("Bluetooth adapter enable requested");
            Ok(true)
        }
    }

    pub fn start_scan(&self) -> Result<(), SessionError> {
        self.discovery.start_scan()
    }

    pub fn stop_scan(&self) -> Result<(), SessionError> {
        self.discovery.stop_scan()
    }

    /// Route a radio signal to the discovery session.
    pub fn handle_signal(&self, signal: RadioSignal) {
        self.discovery.handle_signal(signal);
    }

    pub fn refresh_paired(&self) -> JoinHandle<Result<usize, SessionError>> {
        self.discovery.refresh_paired()
    }

    /// Known peers, bonded first.
    pub fn peers(&self) -> Vec<PeerRecord> {
        let mut peers = self.registry.paired();
        peers.extend(self.registry.discovered());
        peers
    }

    /// Connect to a peer the user picked from the registry.
    pub fn connect_to(&self, address: &str) -> Result<(), SessionError> {
        let address = PeerAddress::new(address)?;
        let record = self
            .registry
            .get(&address)
            .ok_or_else(|| SessionError::UnknownPeer(address.to_string()))?;
        info!("Selected {} ({})", record.display_name, record.address);
        self.connection.connect(record.address)
    }

    /// Connect to an address whether or not it is in the registry.
    pub fn connect(&self, peer: PeerAddress) -> Result<(), SessionError> {
        self.connection.connect(peer)
    }

    pub fn cancel(&self) -> bool {
        self.connection.cancel()
    }

    /// Close any connection and stop a running scan.
    pub fn shutdown(&self) {
        self.connection.cancel();
        if let Err(e) = self.discovery.stop_scan() {
            warn!("Failed to stop scan on shutdown: {}", e);
        }
        info!("Peer manager stopped");
    }
}
