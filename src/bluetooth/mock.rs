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

//! In-process radio, socket and permission fakes.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::radio::{PeerSocket, PermissionGate, RadioStack};
use crate::error::{ConnectError, RadioError};
use crate::events::{SessionEvent, SessionListener};
use crate::peer::{PeerAddress, RemotePeer};

/// What a fake socket does when `connect()` is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail(ConnectError),
    /// Block until [`MockRadio::release`] or `close()`.
    Hold,
    /// Block until [`MockRadio::release`] only. `close()` does not interrupt,
    /// so the released outcome is returned even on a closed socket.
    HoldPastClose,
}

#[derive(Debug, Default)]
struct SocketInner {
    outcome: Option<Result<(), ConnectError>>,
    waiting: bool,
    connected: bool,
    closed: bool,
    close_calls: usize,
    written: Vec<u8>,
    inbound: VecDeque<u8>,
}

/// Shared view of a socket handed out by [`MockRadio`].
#[derive(Debug)]
pub struct MockSocketHandle {
    peer: PeerAddress,
    service: Uuid,
    behavior: ConnectBehavior,
    inner: Mutex<SocketInner>,
    cond: Condvar,
}

impl MockSocketHandle {
    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    pub fn service(&self) -> Uuid {
        self.service
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().close_calls
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Whether a `connect()` call is currently blocked.
    pub fn is_waiting(&self) -> bool {
        self.inner.lock().waiting
    }

    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().written.clone()
    }

    /// Queue bytes for the next `read()`.
    pub fn push_inbound(&self, data: &[u8]) {
        self.inner.lock().inbound.extend(data);
    }

    fn release(&self, outcome: Result<(), ConnectError>) {
        let mut inner = self.inner.lock();
        if inner.outcome.is_none() {
            inner.outcome = Some(outcome);
            self.cond.notify_all();
        }
    }
}

struct MockSocket {
    shared: Arc<MockSocketHandle>,
}

impl PeerSocket for MockSocket {
    fn connect(&self) -> Result<(), ConnectError> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        if inner.closed {
            return Err(ConnectError::Closed);
        }

        let result = match &shared.behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail(err) => Err(err.clone()),
            ConnectBehavior::Hold | ConnectBehavior::HoldPastClose => {
                let interruptible = shared.behavior == ConnectBehavior::Hold;
                inner.waiting = true;
                while inner.outcome.is_none() && !(interruptible && inner.closed) {
                    shared.cond.wait(&mut inner);
                }
                inner.waiting = false;
                if interruptible && inner.closed {
                    Err(ConnectError::Closed)
                } else {
                    inner.outcome.clone().unwrap_or(Err(ConnectError::Closed))
                }
            }
        };

        inner.connected = result.is_ok() && !inner.closed;
        result
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.shared.inner.lock();
        if inner.closed || !inner.connected {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket not connected"));
        }
        let mut n = 0;
        while n < buf.len() {
            match inner.inbound.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.shared.inner.lock();
        if inner.closed || !inner.connected {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket not connected"));
        }
        inner.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&self) {
        let mut inner = self.shared.inner.lock();
        inner.close_calls += 1;
        inner.closed = true;
        inner.connected = false;
        self.shared.cond.notify_all();
    }
}

/// Scriptable radio stack.
///
/// Discovery calls only flip flags; tests feed [`super::RadioSignal`]s into
/// the discovery session themselves, as the platform would.
pub struct MockRadio {
    enabled: AtomicBool,
    discovering: AtomicBool,
    bonded: Mutex<Vec<RemotePeer>>,
    bonded_error: Mutex<Option<RadioError>>,
    behavior: Mutex<ConnectBehavior>,
    open_error: Mutex<Option<ConnectError>>,
    sockets: Mutex<Vec<Arc<MockSocketHandle>>>,
    start_discovery_calls: AtomicUsize,
    cancel_discovery_calls: AtomicUsize,
    enable_requests: AtomicUsize,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            discovering: AtomicBool::new(false),
            bonded: Mutex::new(Vec::new()),
            bonded_error: Mutex::new(None),
            behavior: Mutex::new(ConnectBehavior::Succeed),
            open_error: Mutex::new(None),
            sockets: Mutex::new(Vec::new()),
            start_discovery_calls: AtomicUsize::new(0),
            cancel_discovery_calls: AtomicUsize::new(0),
            enable_requests: AtomicUsize::new(0),
        }
    }
}

impl MockRadio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_discovering(&self, discovering: bool) {
        self.discovering.store(discovering, Ordering::SeqCst);
    }

    pub fn set_bonded(&self, peers: Vec<RemotePeer>) {
        *self.bonded.lock() = peers;
    }

    pub fn fail_bonded(&self, err: Option<RadioError>) {
        *self.bonded_error.lock() = err;
    }

    /// Behavior of sockets opened from now on.
    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn fail_open(&self, err: Option<ConnectError>) {
        *self.open_error.lock() = err;
    }

    /// Complete every held connect that has no outcome yet.
    pub fn release(&self, outcome: Result<(), ConnectError>) {
        for socket in self.sockets.lock().iter() {
            socket.release(outcome.clone());
        }
    }

    pub fn sockets(&self) -> Vec<Arc<MockSocketHandle>> {
        self.sockets.lock().clone()
    }

    pub fn last_socket(&self) -> Option<Arc<MockSocketHandle>> {
        self.sockets.lock().last().cloned()
    }

    pub fn start_discovery_calls(&self) -> usize {
        self.start_discovery_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_discovery_calls(&self) -> usize {
        self.cancel_discovery_calls.load(Ordering::SeqCst)
    }

    pub fn enable_requests(&self) -> usize {
        self.enable_requests.load(Ordering::SeqCst)
    }
}

impl RadioStack for MockRadio {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn request_enable(&self) -> Result<(), RadioError> {
        self.enable_requests.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) -> Result<(), RadioError> {
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    fn start_discovery(&self) -> Result<(), RadioError> {
        if !self.is_enabled() {
            return Err(RadioError::Unavailable);
        }
        self.start_discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.discovering.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel_discovery(&self) -> Result<(), RadioError> {
        self.cancel_discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.discovering.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn bonded_peers(&self) -> Result<Vec<RemotePeer>, RadioError> {
        if let Some(err) = self.bonded_error.lock().clone() {
            return Err(err);
        }
        Ok(self.bonded.lock().clone())
    }

    fn open_socket(
        &self,
        peer: &PeerAddress,
        service: Uuid,
    ) -> Result<Box<dyn PeerSocket>, ConnectError> {
        if let Some(err) = self.open_error.lock().clone() {
            return Err(err);
        }
        let shared = Arc::new(MockSocketHandle {
            peer: peer.clone(),
            service,
            behavior: self.behavior.lock().clone(),
            inner: Mutex::new(SocketInner::default()),
            cond: Condvar::new(),
        });
        self.sockets.lock().push(shared.clone());
        Ok(Box::new(MockSocket { shared }))
    }
}

/// Permission gate with a switch.
#[derive(Debug)]
pub struct MockPermission {
    granted: AtomicBool,
}

impl MockPermission {
    pub fn new(granted: bool) -> Arc<Self> {
        Arc::new(Self {
            granted: AtomicBool::new(granted),
        })
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionGate for MockPermission {
    fn location_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// Listener that records every notification it receives.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<SessionEvent>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn terminal_count(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_terminal()).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}

impl SessionListener for EventRecorder {
    fn on_scan_started(&self) {
        self.push(SessionEvent::ScanStarted);
    }

    fn on_peer_list_changed(&self) {
        self.push(SessionEvent::PeerListChanged);
    }

    fn on_scan_finished(&self) {
        self.push(SessionEvent::ScanFinished);
    }

    fn on_connecting(&self, peer: &PeerAddress) {
        self.push(SessionEvent::Connecting(peer.clone()));
    }

    fn on_connected(&self, peer: &PeerAddress) {
        self.push(SessionEvent::Connected(peer.clone()));
    }

    fn on_connect_failed(&self, peer: &PeerAddress, reason: &ConnectError) {
        self.push(SessionEvent::ConnectFailed {
            peer: peer.clone(),
            reason: reason.clone(),
        });
    }

    fn on_cancelled(&self, peer: &PeerAddress) {
        self.push(SessionEvent::Cancelled(peer.clone()));
    }

    fn on_disconnected(&self, peer: &PeerAddress) {
        self.push(SessionEvent::Disconnected(peer.clone()));
    }
}
