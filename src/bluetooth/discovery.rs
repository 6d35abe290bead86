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

//! Scan state machine.
//!
//! State changes only on radio signals: `start_scan` asks the adapter to
//! scan but the session stays Idle until the adapter reports that the scan
//! has started.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::radio::{PermissionGate, RadioSignal, RadioStack};
use super::registry::PeerRegistry;
use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent};
use crate::peer::{PeerRecord, RemotePeer};
use crate::state::DiscoveryState;

/// Discovery behavior switches.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Refresh bonded devices whenever a scan starts.
    pub refresh_paired_on_scan: bool,
    /// Refuse to scan without location permission.
    pub require_location_permission: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            refresh_paired_on_scan: true,
            require_location_permission: true,
        }
    }
}

/// Drives one adapter's scans and keeps the registry in sync.
pub struct DiscoverySession {
    radio: Arc<dyn RadioStack>,
    permissions: Arc<dyn PermissionGate>,
    registry: PeerRegistry,
    bus: EventBus,
    runtime: Handle,
    options: DiscoveryOptions,
    state: Mutex<DiscoveryState>,
}

impl DiscoverySession {
    pub fn new(
        radio: Arc<dyn RadioStack>,
        permissions: Arc<dyn PermissionGate>,
        registry: PeerRegistry,
        bus: EventBus,
        runtime: Handle,
        options: DiscoveryOptions,
    ) -> Self {
        Self {
            radio,
            permissions,
            registry,
            bus,
            runtime,
            options,
            state: Mutex::new(DiscoveryState::Idle),
        }
    }

    pub fn state(&self) -> DiscoveryState {
        *self.state.lock()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Ask the radio to start scanning.
    pub fn start_scan(&self) -> Result<(), SessionError> {
        if !self.radio.is_enabled() {
            warn!("Cannot scan: Bluetooth adapter is disabled");
            return Err(SessionError::RadioDisabled);
        }
        if self.options.require_location_permission && !self.permissions.location_granted() {
            warn!("Cannot scan: location permission not granted");
            return Err(SessionError::PermissionDenied);
        }
        if self.state() == DiscoveryState::Scanning {
            debug!("Scan already running");
            return Ok(());
        }

        self.radio.start_discovery()?;
        info!("Discovery requested");
        Ok(())
    }

    /// Ask the radio to stop scanning. No-op while Idle.
    pub fn stop_scan(&self) -> Result<(), SessionError> {
        if self.state() == DiscoveryState::Idle && !self.radio.is_discovering() {
            debug!("Stop requested while idle");
            return Ok(());
        }
        self.radio.cancel_discovery()?;
        info!("Discovery cancel requested");
        Ok(())
    }

    /// Feed one radio signal into the state machine.
    pub fn handle_signal(&self, signal: RadioSignal) {
        match signal {
            RadioSignal::ScanStarted => self.on_scan_started(),
            RadioSignal::PeerFound(peer) => {
                self.on_peer_found(&peer);
            }
            RadioSignal::ScanFinished => self.on_scan_finished(),
        }
    }

    pub fn on_scan_started(&self) {
        let mut state = self.state.lock();
        if *state == DiscoveryState::Scanning {
            debug!("Scan restarted while scanning");
        }
        *state = DiscoveryState::Scanning;
        self.registry.clear_discovered();
        self.bus.emit(SessionEvent::ScanStarted);
        drop(state);

        info!("Scan started");
        if self.options.refresh_paired_on_scan {
            self.refresh_paired();
        }
    }

    /// Record a found peer. Returns false if the report was ignored.
    pub fn on_peer_found(&self, peer: &RemotePeer) -> bool {
        let (address, name) = match peer.validate() {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Ignoring discovery report: {}", e);
                return false;
            }
        };

        let _state = self.state.lock();
        let is_new = self.registry.upsert_discovered(address.clone(), name.clone());
        self.bus.emit(SessionEvent::PeerListChanged);

        if is_new {
            info!("Found {} ({})", name, address);
        } else {
            debug!("Updated {} ({})", name, address);
        }
        true
    }

    pub fn on_scan_finished(&self) {
        let mut state = self.state.lock();
        if *state == DiscoveryState::Idle {
            debug!("Scan finished while idle");
            return;
        }
        *state = DiscoveryState::Idle;
        self.bus.emit(SessionEvent::ScanFinished);
        info!("Scan finished, {} peers found", self.registry.discovered().len());
    }

    /// Enumerate bonded devices on the blocking pool and replace the paired
    /// partition. Resolves to the number of paired records stored.
    ///
    /// Listeners hear about it only when the paired set actually changed.
    pub fn refresh_paired(&self) -> JoinHandle<Result<usize, SessionError>> {
        let radio = self.radio.clone();
        let registry = self.registry.clone();
        let bus = self.bus.clone();

        self.runtime.spawn_blocking(move || {
            if !radio.is_enabled() {
                return Err(SessionError::RadioDisabled);
            }

            let bonded = radio.bonded_peers().map_err(|e| {
                warn!("Failed to list paired devices: {}", e);
                SessionError::from(e)
            })?;

            let records: Vec<PeerRecord> = bonded
                .iter()
                .filter_map(|peer| match peer.validate() {
                    Ok((address, name)) => Some(PeerRecord::paired(address, name)),
                    Err(e) => {
                        debug!("Skipping bonded device: {}", e);
                        None
                    }
                })
                .collect();

            if records.is_empty() {
                info!("No paired devices");
            } else {
                info!("{} paired devices", records.len());
            }

            let changed = registry.set_paired(records);
            let count = registry.paired().len();
            if changed {
                bus.emit(SessionEvent::PeerListChanged);
            } else {
                debug!("Paired devices unchanged");
            }
            Ok(count)
        })
    }
}
