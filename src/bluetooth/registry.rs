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

//! Deduplicated store of known peers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::peer::{PeerAddress, PeerRecord};

/// Insertion-ordered records keyed by address.
#[derive(Debug, Default)]
struct Partition {
    records: Vec<PeerRecord>,
    index: HashMap<PeerAddress, usize>,
}

impl Partition {
    /// Insert or overwrite in place. Returns true if the address was new.
    fn upsert(&mut self, record: PeerRecord) -> bool {
        match self.index.get(&record.address) {
            Some(&slot) => {
                self.records[slot] = record;
                false
            }
            None => {
                self.index.insert(record.address.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    fn get(&self, address: &PeerAddress) -> Option<&PeerRecord> {
        self.index.get(address).map(|&slot| &self.records[slot])
    }

    fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

#[derive(Debug, Default)]
struct Inner {
    discovered: Partition,
    paired: Partition,
}

/// Peers found this session and peers bonded with the adapter.
///
/// Cloning yields another handle to the same store. Reads may run
/// concurrently with the background paired-device refresh.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or rename a discovered peer. Returns whether it was new.
    pub fn upsert_discovered(&self, address: PeerAddress, name: impl Into<String>) -> bool {
        self.inner
            .write()
            .discovered
            .upsert(PeerRecord::discovered(address, name))
    }

    /// Replace the paired partition wholesale. Returns whether its contents
    /// changed.
    ///
    /// Records are stored with origin `Paired` whatever they carried.
    pub fn set_paired(&self, records: Vec<PeerRecord>) -> bool {
        let mut paired = Partition::default();
        for record in records {
            paired.upsert(PeerRecord::paired(record.address, record.display_name));
        }
        let mut inner = self.inner.write();
        let changed = inner.paired.records != paired.records;
        inner.paired = paired;
        changed
    }

    pub fn clear_discovered(&self) {
        self.inner.write().discovered.clear();
    }

    /// Resolve an address. A bonded record wins over a discovered one.
    pub fn get(&self, address: &PeerAddress) -> Option<PeerRecord> {
        let inner = self.inner.read();
        inner
            .paired
            .get(address)
            .or_else(|| inner.discovered.get(address))
            .cloned()
    }

    /// Discovered peers in the order they were first found.
    pub fn discovered(&self) -> Vec<PeerRecord> {
        self.inner.read().discovered.records.clone()
    }

    pub fn paired(&self) -> Vec<PeerRecord> {
        self.inner.read().paired.records.clone()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.discovered.records.is_empty() && inner.paired.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerOrigin;

    fn addr(s: &str) -> PeerAddress {
        PeerAddress::new(s).unwrap()
    }

    #[test]
    fn test_upsert_dedupes_and_latest_name_wins() {
        let registry = PeerRegistry::new();

        assert!(registry.upsert_discovered(addr("AA:BB"), "Phone"));
        assert!(registry.upsert_discovered(addr("CC:DD"), "Laptop"));
        assert!(!registry.upsert_discovered(addr("AA:BB"), "Phone2"));
        assert!(!registry.upsert_discovered(addr("AA:BB"), "Phone2"));

        let discovered = registry.discovered();
        assert_eq!(discovered.len(), 2);
        assert_eq!(discovered[0].address, addr("AA:BB"));
        assert_eq!(discovered[0].display_name, "Phone2");
        assert_eq!(discovered[1].display_name, "Laptop");
        assert!(discovered.iter().all(|r| r.origin == PeerOrigin::Discovered));
    }

    #[test]
    fn test_clear_discovered() {
        let registry = PeerRegistry::new();
        registry.upsert_discovered(addr("AA:BB"), "Phone");
        registry.set_paired(vec![PeerRecord::paired(addr("EE:FF"), "Headset")]);

        registry.clear_discovered();

        assert!(registry.discovered().is_empty());
        assert_eq!(registry.paired().len(), 1);
        assert!(registry.get(&addr("AA:BB")).is_none());

        // Clearing an empty partition is fine too.
        registry.clear_discovered();
        assert!(registry.discovered().is_empty());
    }

    #[test]
    fn test_set_paired_replaces() {
        let registry = PeerRegistry::new();
        registry.set_paired(vec![
            PeerRecord::paired(addr("11:11"), "One"),
            PeerRecord::paired(addr("22:22"), "Two"),
        ]);
        registry.set_paired(vec![
            PeerRecord::discovered(addr("33:33"), "Three"),
            PeerRecord::paired(addr("33:33"), "Three again"),
        ]);

        let paired = registry.paired();
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].display_name, "Three again");
        assert!(!registry.set_paired(paired.clone()));
        assert!(registry.set_paired(Vec::new()));
        assert!(!registry.set_paired(Vec::new()));
        registry.set_paired(paired.clone());
        assert_eq!(paired[0].origin, PeerOrigin::Paired);
        assert!(registry.get(&addr("11:11")).is_none());
    }

    #[test]
    fn test_rediscovered_paired_peer_keeps_origin() {
        let registry = PeerRegistry::new();
        registry.set_paired(vec![PeerRecord::paired(addr("AA:BB"), "Headset")]);
        registry.upsert_discovered(addr("AA:BB"), "Headset (nearby)");

        // Both partitions hold their own record.
        assert_eq!(registry.discovered().len(), 1);
        assert_eq!(registry.paired().len(), 1);

        let record = registry.get(&addr("AA:BB")).unwrap();
        assert_eq!(record.origin, PeerOrigin::Paired);
        assert_eq!(record.display_name, "Headset");
    }

    #[test]
    fn test_concurrent_refresh_and_discovery() {
        let registry = PeerRegistry::new();
        let writer = registry.clone();

        let handle = std::thread::spawn(move || {
            for i in 0..200 {
                writer.set_paired(vec![PeerRecord::paired(addr("PA:IR"), format!("p{}", i))]);
            }
        });
        for i in 0..200 {
            registry.upsert_discovered(addr(&format!("D{}", i % 10)), "d");
        }
        handle.join().unwrap();

        assert_eq!(registry.discovered().len(), 10);
        assert_eq!(registry.paired()[0].display_name, "p199");
        assert!(!registry.is_empty());
    }
}
