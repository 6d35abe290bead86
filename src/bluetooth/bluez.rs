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

//! BlueZ radio stack.
//!
//! Discovery runs as a task that translates adapter events into
//! [`RadioSignal`]s. Socket connects go through an RFCOMM client profile
//! registered for the service UUID, so BlueZ resolves the channel via SDP.

use anyhow::Result;
use bluer::rfcomm::{Profile, Role, Stream};
use bluer::{Adapter, AdapterEvent, AdapterProperty, Address, Session};
use futures::StreamExt;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::radio::{PeerSocket, RadioSignal, RadioStack};
use crate::config::Config;
use crate::error::{ConnectError, RadioError};
use crate::peer::{PeerAddress, RemotePeer};

fn radio_error(err: bluer::Error) -> RadioError {
    RadioError::Backend(err.to_string())
}

fn connect_error(err: bluer::Error) -> ConnectError {
    match err.kind {
        bluer::ErrorKind::ConnectionAttemptFailed | bluer::ErrorKind::NotAvailable => {
            ConnectError::Refused(err.message)
        }
        _ => ConnectError::Io(err.to_string()),
    }
}

/// Radio stack backed by a BlueZ adapter.
pub struct BluezRadio {
    session: Session,
    adapter: Adapter,
    runtime: Handle,
    powered: Arc<AtomicBool>,
    discovering: Arc<AtomicBool>,
    scan_stop: Mutex<Option<oneshot::Sender<()>>>,
    signal_tx: mpsc::UnboundedSender<RadioSignal>,
    scan_duration: Duration,
    connect_timeout: Duration,
}

impl BluezRadio {
    /// Open the configured adapter.
    ///
    /// Returns the radio and the receiver of its discovery signals, which the
    /// host feeds into `PeerManager::handle_signal`.
    pub async fn new(config: &Config) -> Result<(Self, mpsc::UnboundedReceiver<RadioSignal>)> {
        info!("Initializing Bluetooth radio...");

        let session = Session::new().await?;
        info!("BlueZ session created");

        let adapter = match &config.bluetooth.adapter {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };
        info!("Using Bluetooth adapter: {}", adapter.name());

        let powered = Arc::new(AtomicBool::new(adapter.is_powered().await?));
        Self::watch_power(&adapter, powered.clone()).await?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let radio = Self {
            session,
            adapter,
            runtime: Handle::current(),
            powered,
            discovering: Arc::new(AtomicBool::new(false)),
            scan_stop: Mutex::new(None),
            signal_tx,
            scan_duration: config.discovery.scan_duration(),
            connect_timeout: config.bluetooth.connect_timeout(),
        };
        Ok((radio, signal_rx))
    }

    /// Keep the cached power flag in sync with the adapter.
    async fn watch_power(adapter: &Adapter, powered: Arc<AtomicBool>) -> Result<()> {
        let events = adapter.events().await?;
        tokio::spawn(async move {
            futures::pin_mut!(events);
            while let Some(event) = events.next().await {
                if let AdapterEvent::PropertyChanged(AdapterProperty::Powered(on)) = event {
                    info!("Bluetooth adapter powered {}", if on { "on" } else { "off" });
                    powered.store(on, Ordering::SeqCst);
                }
            }
        });
        Ok(())
    }

    fn set_powered(&self, on: bool) {
        let adapter = self.adapter.clone();
        let powered = self.powered.clone();
        self.runtime.spawn(async move {
            match adapter.set_powered(on).await {
                Ok(()) => powered.store(on, Ordering::SeqCst),
                Err(e) => error!("Failed to set adapter power: {}", e),
            }
        });
    }

    async fn scan(
        adapter: Adapter,
        signal_tx: mpsc::UnboundedSender<RadioSignal>,
        mut stop_rx: oneshot::Receiver<()>,
        duration: Duration,
    ) -> bluer::Result<()> {
        let events = adapter.discover_devices().await?;
        futures::pin_mut!(events);
        let _ = signal_tx.send(RadioSignal::ScanStarted);

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(AdapterEvent::DeviceAdded(addr)) => {
                        let name = match adapter.device(addr) {
                            Ok(device) => device.name().await.ok().flatten(),
                            Err(_) => None,
                        };
                        let _ = signal_tx.send(RadioSignal::PeerFound(RemotePeer {
                            address: Some(addr.to_string()),
                            name,
                        }));
                    }
                    Some(_) => {}
                    None => break,
                },
                _ = &mut deadline => {
                    debug!("Scan duration elapsed");
                    break;
                }
                _ = &mut stop_rx => {
                    debug!("Scan stopped");
                    break;
                }
            }
        }
        Ok(())
    }
}

impl RadioStack for BluezRadio {
    fn is_enabled(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    fn request_enable(&self) -> Result<(), RadioError> {
        info!("Powering on Bluetooth adapter...");
        self.set_powered(true);
        Ok(())
    }

    fn disable(&self) -> Result<(), RadioError> {
        info!("Powering off Bluetooth adapter...");
        self.set_powered(false);
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    fn start_discovery(&self) -> Result<(), RadioError> {
        if self.discovering.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.scan_stop.lock() = Some(stop_tx);

        let adapter = self.adapter.clone();
        let signal_tx = self.signal_tx.clone();
        let discovering = self.discovering.clone();
        let duration = self.scan_duration;
        self.runtime.spawn(async move {
            if let Err(e) = Self::scan(adapter, signal_tx.clone(), stop_rx, duration).await {
                error!("Discovery error: {}", e);
            }
            discovering.store(false, Ordering::SeqCst);
            let _ = signal_tx.send(RadioSignal::ScanFinished);
        });
        Ok(())
    }

    fn cancel_discovery(&self) -> Result<(), RadioError> {
        if let Some(stop_tx) = self.scan_stop.lock().take() {
            let _ = stop_tx.send(());
        }
        Ok(())
    }

    fn bonded_peers(&self) -> Result<Vec<RemotePeer>, RadioError> {
        self.runtime.block_on(async {
            let mut peers = Vec::new();
            for addr in self.adapter.device_addresses().await.map_err(radio_error)? {
                let device = self.adapter.device(addr).map_err(radio_error)?;
                if device.is_paired().await.map_err(radio_error)? {
                    let name = device.name().await.map_err(radio_error)?;
                    peers.push(RemotePeer {
                        address: Some(addr.to_string()),
                        name,
                    });
                }
            }
            Ok(peers)
        })
    }

    fn open_socket(
        &self,
        peer: &PeerAddress,
        service: Uuid,
    ) -> Result<Box<dyn PeerSocket>, ConnectError> {
        let address: Address = peer
            .as_str()
            .parse()
            .map_err(|_| ConnectError::Io(format!("invalid Bluetooth address {}", peer)))?;
        let (closed_tx, _) = watch::channel(false);

        Ok(Box::new(BluezSocket {
            session: self.session.clone(),
            adapter: self.adapter.clone(),
            address,
            service,
            runtime: self.runtime.clone(),
            timeout: self.connect_timeout,
            closed_tx,
            stream: tokio::sync::Mutex::new(None),
        }))
    }
}

/// RFCOMM client socket to one device.
struct BluezSocket {
    session: Session,
    adapter: Adapter,
    address: Address,
    service: Uuid,
    runtime: Handle,
    timeout: Duration,
    closed_tx: watch::Sender<bool>,
    stream: tokio::sync::Mutex<Option<Stream>>,
}

impl BluezSocket {
    async fn open_stream(&self) -> Result<Stream, ConnectError> {
        let profile = Profile {
            uuid: self.service,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = self
            .session
            .register_profile(profile)
            .await
            .map_err(connect_error)?;
        let device = self.adapter.device(self.address).map_err(connect_error)?;

        let connect = device.connect_profile(&self.service);
        tokio::pin!(connect);
        let mut requested = false;

        loop {
            tokio::select! {
                res = &mut connect, if !requested => {
                    res.map_err(connect_error)?;
                    requested = true;
                    debug!("Profile connect to {} issued", self.address);
                }
                req = handle.next() => {
                    let req = req.ok_or_else(|| ConnectError::Io("profile handle closed".to_string()))?;
                    return req.accept().map_err(|e| ConnectError::Io(e.to_string()));
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }
}

impl PeerSocket for BluezSocket {
    fn connect(&self) -> Result<(), ConnectError> {
        let mut closed = self.closed_tx.subscribe();
        if self.is_closed() {
            return Err(ConnectError::Closed);
        }

        self.runtime.block_on(async {
            let stream = tokio::select! {
                _ = closed.wait_for(|c| *c) => return Err(ConnectError::Closed),
                res = tokio::time::timeout(self.timeout, self.open_stream()) => match res {
                    Ok(stream) => stream?,
                    Err(_) => return Err(ConnectError::Timeout),
                },
            };

            if self.is_closed() {
                return Err(ConnectError::Closed);
            }
            info!("RFCOMM stream open to {}", self.address);
            *self.stream.lock().await = Some(stream);
            Ok(())
        })
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut closed = self.closed_tx.subscribe();
        self.runtime.block_on(async {
            let mut guard = self.stream.lock().await;
            let stream = guard
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))?;
            tokio::select! {
                _ = closed.wait_for(|c| *c) => {
                    Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"))
                }
                res = stream.read(buf) => res,
            }
        })
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut closed = self.closed_tx.subscribe();
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"));
        }
        self.runtime.block_on(async {
            let mut guard = self.stream.lock().await;
            let stream = guard
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))?;
            tokio::select! {
                _ = closed.wait_for(|c| *c) => {
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"))
                }
                res = async {
                    stream.write_all(buf).await?;
                    stream.flush().await
                } => res.map(|()| buf.len()),
            }
        })
    }

    fn close(&self) {
        if self.closed_tx.send_replace(true) {
            return;
        }
        match self.stream.try_lock() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    debug!("RFCOMM stream to {} closed", self.address);
                }
            }
            // A reader holds the stream; it sees the close flag and exits,
            // and the stream is dropped with the socket.
            Err(_) => warn!("Stream to {} busy during close", self.address),
        }
    }
}
