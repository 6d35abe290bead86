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

//! Peerlink: scan for Bluetooth peers and optionally connect to one.
//!
//! Usage: `peerlink [ADDRESS]`

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peerlink::bluetooth::{AlwaysGranted, BluezRadio, PeerManager, RadioSignal};
use peerlink::config::Config;
use peerlink::events::{LoggingListener, QueueDispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peerlink=info".parse()?),
        )
        .init();

    info!("Starting Peerlink v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Configuration loaded");

    let (radio, mut signals) = BluezRadio::new(&config).await?;
    let dispatcher = QueueDispatcher::spawn_on(&Handle::current());
    let manager = PeerManager::from_config(
        Arc::new(radio),
        Arc::new(AlwaysGranted),
        Arc::new(dispatcher),
        Handle::current(),
        &config,
    );
    manager.attach_listener(Arc::new(LoggingListener::new(manager.registry().clone())));

    if !manager.is_radio_enabled() {
        info!("Bluetooth adapter is off, requesting power on");
        manager.toggle_radio()?;
        for _ in 0..50 {
            if manager.is_radio_enabled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let mut target = std::env::args().nth(1);
    manager.start_scan()?;

    loop {
        tokio::select! {
            Some(signal) = signals.recv() => {
                let finished = signal == RadioSignal::ScanFinished;
                manager.handle_signal(signal);
                if finished {
                    if let Some(address) = target.take() {
                        if let Err(e) = manager.connect_to(&address) {
                            error!("Cannot connect to {}: {}", address, e);
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.shutdown();
    info!("Peerlink stopped");
    Ok(())
}
