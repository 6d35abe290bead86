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

//! Session notifications and their delivery.
//!
//! The core never calls a listener directly. Every notification is wrapped
//! in a job and handed to a [`Dispatcher`], which runs it on whatever context
//! the host wants listeners to see (a UI thread, a dedicated task, ...).

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::bluetooth::PeerRegistry;
use crate::error::ConnectError;
use crate::peer::PeerAddress;

/// Receiver of session notifications.
///
/// All methods default to doing nothing.
pub trait SessionListener: Send + Sync {
    fn on_scan_started(&self) {}
    fn on_peer_list_changed(&self) {}
    fn on_scan_finished(&self) {}
    fn on_connecting(&self, _peer: &PeerAddress) {}
    fn on_connected(&self, _peer: &PeerAddress) {}
    fn on_connect_failed(&self, _peer: &PeerAddress, _reason: &ConnectError) {}
    fn on_cancelled(&self, _peer: &PeerAddress) {}
    /// An established connection was closed by `cancel()`.
    fn on_disconnected(&self, _peer: &PeerAddress) {}
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ScanStarted,
    PeerListChanged,
    ScanFinished,
    Connecting(PeerAddress),
    Connected(PeerAddress),
    ConnectFailed { peer: PeerAddress, reason: ConnectError },
    Cancelled(PeerAddress),
    Disconnected(PeerAddress),
}

impl SessionEvent {
    /// Whether this event ends a connect attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Connected(_)
                | SessionEvent::ConnectFailed { .. }
                | SessionEvent::Cancelled(_)
        )
    }

    /// Invoke the matching listener method.
    pub fn deliver(&self, listener: &dyn SessionListener) {
        match self {
            SessionEvent::ScanStarted => listener.on_scan_started(),
            SessionEvent::PeerListChanged => listener.on_peer_list_changed(),
            SessionEvent::ScanFinished => listener.on_scan_finished(),
            SessionEvent::Connecting(peer) => listener.on_connecting(peer),
            SessionEvent::Connected(peer) => listener.on_connected(peer),
            SessionEvent::ConnectFailed { peer, reason } => {
                listener.on_connect_failed(peer, reason)
            }
            SessionEvent::Cancelled(peer) => listener.on_cancelled(peer),
            SessionEvent::Disconnected(peer) => listener.on_disconnected(peer),
        }
    }
}

/// Unit of work handed to a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// "Run this on the caller-visible context."
///
/// Implementations must run jobs exactly once, in submission order, and must
/// not run a job on the submitting thread: jobs are submitted while session
/// locks are held.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// FIFO dispatcher backed by an unbounded channel.
///
/// The paired [`DispatchQueue`] is drained by the host, either by polling
/// [`DispatchQueue::run_pending`] from its own loop or by running
/// [`DispatchQueue::run`] as a task.
#[derive(Clone)]
pub struct QueueDispatcher {
    tx: async_channel::Sender<Job>,
}

impl QueueDispatcher {
    pub fn new() -> (Self, DispatchQueue) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx }, DispatchQueue { rx })
    }

    /// Create a dispatcher whose queue is drained by a task on `runtime`.
    pub fn spawn_on(runtime: &Handle) -> Self {
        let (dispatcher, queue) = Self::new();
        runtime.spawn(queue.run());
        dispatcher
    }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, job: Job) {
        if self.tx.try_send(job).is_err() {
            warn!("Dispatch queue closed, notification dropped");
        }
    }
}

/// Receiving end of a [`QueueDispatcher`].
pub struct DispatchQueue {
    rx: async_channel::Receiver<Job>,
}

impl DispatchQueue {
    /// Run every job queued so far. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Wait for the next job and run it. Returns false once every dispatcher
    /// has been dropped and the queue is empty.
    pub async fn run_next(&self) -> bool {
        match self.rx.recv().await {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Run jobs until every dispatcher is dropped.
    pub async fn run(self) {
        while self.run_next().await {}
        debug!("Dispatch queue drained and closed");
    }
}

/// Fan-out of events to the attached listeners through one dispatcher.
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn SessionListener>>>>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl EventBus {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            dispatcher,
        }
    }

    pub fn attach(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.write().push(listener);
    }

    /// Detach a listener previously attached. Returns whether it was found.
    pub fn detach(&self, listener: &Arc<dyn SessionListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Queue `event` for every listener attached right now.
    pub fn emit(&self, event: SessionEvent) {
        debug!("Emitting {:?}", event);
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return;
        }
        self.dispatcher.dispatch(Box::new(move || {
            for listener in &listeners {
                event.deliver(listener.as_ref());
            }
        }));
    }
}

/// Listener that writes every notification to the log.
pub struct LoggingListener {
    registry: PeerRegistry,
}

impl LoggingListener {
    pub fn new(registry: PeerRegistry) -> Self {
        Self { registry }
    }
}

impl SessionListener for LoggingListener {
    fn on_scan_started(&self) {
        info!("Searching...");
    }

    fn on_peer_list_changed(&self) {
        debug!(
            "Peer list changed: {} discovered, {} paired",
            self.registry.discovered().len(),
            self.registry.paired().len()
        );
    }

    fn on_scan_finished(&self) {
        info!("Scan finished");
        for record in self.registry.paired() {
            info!("  paired      {}  {}", record.address, record.display_name);
        }
        for record in self.registry.discovered() {
            info!("  discovered  {}  {}", record.address, record.display_name);
        }
    }

    fn on_connecting(&self, peer: &PeerAddress) {
        info!("Connecting to {}", peer);
    }

    fn on_connected(&self, peer: &PeerAddress) {
        info!("Connected to {}", peer);
    }

    fn on_connect_failed(&self, peer: &PeerAddress, reason: &ConnectError) {
        warn!("Connection to {} failed ({}): {}", peer, reason.reason_code(), reason);
    }

    fn on_cancelled(&self, peer: &PeerAddress) {
        info!("Connection to {} cancelled", peer);
    }

    fn on_disconnected(&self, peer: &PeerAddress) {
        info!("Disconnected from {}", peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Tally {
        seen: Mutex<Vec<String>>,
    }

    impl SessionListener for Tally {
        fn on_scan_started(&self) {
            self.seen.lock().push("started".into());
        }

        fn on_connected(&self, peer: &PeerAddress) {
            self.seen.lock().push(format!("connected {}", peer));
        }
    }

    fn peer(s: &str) -> PeerAddress {
        PeerAddress::new(s).unwrap()
    }

    #[test]
    fn test_queue_preserves_order() {
        let (dispatcher, queue) = QueueDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = seen.clone();
            dispatcher.dispatch(Box::new(move || seen.lock().push(i)));
        }

        assert!(seen.lock().is_empty());
        assert_eq!(queue.run_pending(), 5);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn test_fan_out_to_all_listeners() {
        let (dispatcher, queue) = QueueDispatcher::new();
        let bus = EventBus::new(Arc::new(dispatcher));
        let a = Arc::new(Tally::default());
        let b = Arc::new(Tally::default());
        bus.attach(a.clone());
        bus.attach(b.clone());

        bus.emit(SessionEvent::ScanStarted);
        bus.emit(SessionEvent::Connected(peer("AA:BB")));
        // Unhandled by Tally, falls through to the default method.
        bus.emit(SessionEvent::ScanFinished);
        queue.run_pending();

        assert_eq!(*a.seen.lock(), vec!["started", "connected AA:BB"]);
        assert_eq!(*b.seen.lock(), vec!["started", "connected AA:BB"]);
    }

    #[test]
    fn test_detach() {
        let (dispatcher, queue) = QueueDispatcher::new();
        let bus = EventBus::new(Arc::new(dispatcher));
        let tally = Arc::new(Tally::default());
        let listener: Arc<dyn SessionListener> = tally.clone();
        bus.attach(listener.clone());
        assert_eq!(bus.listener_count(), 1);

        assert!(bus.detach(&listener));
        assert!(!bus.detach(&listener));

        bus.emit(SessionEvent::ScanStarted);
        assert_eq!(queue.run_pending(), 0);
        assert!(tally.seen.lock().is_empty());
    }

    #[test]
    fn test_terminal_events() {
        let p = peer("AA:BB");
        assert!(SessionEvent::Connected(p.clone()).is_terminal());
        assert!(SessionEvent::Cancelled(p.clone()).is_terminal());
        assert!(SessionEvent::ConnectFailed {
            peer: p.clone(),
            reason: ConnectError::Timeout
        }
        .is_terminal());
        assert!(!SessionEvent::Connecting(p.clone()).is_terminal());
        assert!(!SessionEvent::Disconnected(p).is_terminal());
        assert!(!SessionEvent::ScanFinished.is_terminal());
    }

    #[tokio::test]
    async fn test_run_next_stops_when_closed() {
        let (dispatcher, queue) = QueueDispatcher::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        dispatcher.dispatch(Box::new(move || *h.lock() += 1));
        drop(dispatcher);

        assert!(queue.run_next().await);
        assert!(!queue.run_next().await);
        assert_eq!(*hits.lock(), 1);
    }
}
