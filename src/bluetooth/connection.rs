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

//! Outbound connection session.
//!
//! At most one attempt is in flight. The blocking connect runs on the
//! runtime's blocking pool; `cancel()` closes the socket to unblock it.
//! Every attempt gets a fresh id, and a background completion whose id no
//! longer matches (or whose attempt was already cancelled) is discarded, so
//! each attempt produces exactly one terminal notification.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::constants::SERVICE_UUID;
use super::radio::{PeerSocket, RadioStack};
use crate::error::{ConnectError, SessionError};
use crate::events::{EventBus, SessionEvent};
use crate::peer::PeerAddress;
use crate::state::ConnectionState;

/// Connection behavior switches.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub service_uuid: Uuid,
    /// Stop a running scan before connecting; scanning slows the connect.
    pub cancel_discovery_before_connect: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            service_uuid: SERVICE_UUID,
            cancel_discovery_before_connect: true,
        }
    }
}

#[derive(Default)]
struct Slot {
    attempt: u64,
    target: Option<PeerAddress>,
    state: ConnectionState,
    socket: Option<Arc<dyn PeerSocket>>,
}

struct Shared {
    radio: Arc<dyn RadioStack>,
    bus: EventBus,
    options: ConnectionOptions,
    slot: Mutex<Slot>,
}

/// Owner of the single outbound connection.
pub struct ConnectionSession {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl ConnectionSession {
    pub fn new(
        radio: Arc<dyn RadioStack>,
        bus: EventBus,
        runtime: Handle,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                radio,
                bus,
                options,
                slot: Mutex::new(Slot::default()),
            }),
            runtime,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.slot.lock().state
    }

    /// Peer of the current (or last) attempt.
    pub fn target(&self) -> Option<PeerAddress> {
        self.shared.slot.lock().target.clone()
    }

    /// Identity of the current (or last) attempt. Zero before the first.
    pub fn session_id(&self) -> u64 {
        self.shared.slot.lock().attempt
    }

    /// Start connecting to `peer` in the background.
    ///
    /// Fails with `AlreadyConnecting` while an attempt is in flight or a
    /// connection is up; the existing session is left untouched.
    pub fn connect(&self, peer: PeerAddress) -> Result<(), SessionError> {
        let mut slot = self.shared.slot.lock();
        if slot.state.is_busy() {
            let target = slot.target.clone().unwrap_or_else(|| peer.clone());
            warn!("Connect to {} refused, busy with {}", peer, target);
            return Err(SessionError::AlreadyConnecting { target });
        }
        if !self.shared.radio.is_enabled() {
            warn!("Connect to {} refused, adapter disabled", peer);
            return Err(SessionError::RadioDisabled);
        }

        slot.attempt += 1;
        slot.target = Some(peer.clone());
        slot.state = ConnectionState::Connecting;
        slot.socket = None;
        let attempt = slot.attempt;
        self.shared.bus.emit(SessionEvent::Connecting(peer.clone()));
        drop(slot);

        info!("Connecting to {} (attempt {})", peer, attempt);
        let shared = self.shared.clone();
        self.runtime
            .spawn_blocking(move || shared.run_attempt(attempt, peer));
        Ok(())
    }

    /// Abort an in-flight attempt or close the established connection.
    ///
    /// Returns false (and notifies nobody) when there was nothing to cancel.
    /// Safe to call repeatedly and from any thread.
    pub fn cancel(&self) -> bool {
        let mut slot = self.shared.slot.lock();
        let event = match (slot.state, slot.target.clone()) {
            (ConnectionState::Connecting, Some(peer)) => SessionEvent::Cancelled(peer),
            (ConnectionState::Connected, Some(peer)) => SessionEvent::Disconnected(peer),
            (state, _) => {
                debug!("Cancel ignored in state {}", state.as_str());
                return false;
            }
        };

        slot.state = ConnectionState::Cancelled;
        let socket = slot.socket.take();
        info!("Cancelling connection (attempt {})", slot.attempt);
        self.shared.bus.emit(event);
        drop(slot);

        if let Some(socket) = socket {
            socket.close();
        }
        true
    }

    /// Write to the connected peer.
    pub fn send(&self, data: &[u8]) -> Result<usize, SessionError> {
        let socket = self.connected_socket()?;
        Ok(socket.write(data)?)
    }

    /// Read from the connected peer. May block until data arrives.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let socket = self.connected_socket()?;
        Ok(socket.read(buf)?)
    }

    fn connected_socket(&self) -> Result<Arc<dyn PeerSocket>, SessionError> {
        let slot = self.shared.slot.lock();
        match (&slot.state, &slot.socket) {
            (ConnectionState::Connected, Some(socket)) => Ok(socket.clone()),
            _ => Err(SessionError::NotConnected),
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        // An attempt still in flight gets its terminal notification here; its
        // background completion is discarded as stale.
        if self.cancel() {
            debug!("Connection cancelled on drop");
        }
    }
}

impl Shared {
    /// Body of the background job for one attempt.
    fn run_attempt(&self, attempt: u64, peer: PeerAddress) {
        if self.options.cancel_discovery_before_connect && self.radio.is_discovering() {
            debug!("Cancelling discovery before connect");
            if let Err(e) = self.radio.cancel_discovery() {
                warn!("Failed to cancel discovery: {}", e);
            }
        }

        let socket: Arc<dyn PeerSocket> =
            match self.radio.open_socket(&peer, self.options.service_uuid) {
                Ok(socket) => Arc::from(socket),
                Err(e) => {
                    self.finish(attempt, &peer, Err(e), None);
                    return;
                }
            };

        {
            let mut slot = self.slot.lock();
            if slot.attempt != attempt || slot.state != ConnectionState::Connecting {
                drop(slot);
                debug!("Attempt {} cancelled before connect", attempt);
                socket.close();
                return;
            }
            slot.socket = Some(socket.clone());
        }

        let result = socket.connect();
        self.finish(attempt, &peer, result, Some(socket));
    }

    fn finish(
        &self,
        attempt: u64,
        peer: &PeerAddress,
        result: Result<(), ConnectError>,
        socket: Option<Arc<dyn PeerSocket>>,
    ) {
        let mut slot = self.slot.lock();
        if slot.attempt != attempt || slot.state != ConnectionState::Connecting {
            drop(slot);
            debug!("Discarding outcome of attempt {}: {:?}", attempt, result);
            if let Some(socket) = socket {
                socket.close();
            }
            return;
        }

        match result {
            Ok(()) => {
                slot.state = ConnectionState::Connected;
                self.bus.emit(SessionEvent::Connected(peer.clone()));
                drop(slot);
                info!("Connected to {}", peer);
            }
            Err(reason) => {
                slot.state = ConnectionState::Failed;
                slot.socket = None;
                self.bus.emit(SessionEvent::ConnectFailed {
                    peer: peer.clone(),
                    reason: reason.clone(),
                });
                drop(slot);
                error!("Connection to {} failed: {}", peer, reason);
                if let Some(socket) = socket {
                    socket.close();
                }
            }
        }
    }
}
