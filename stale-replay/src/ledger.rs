// Copyright (C) 2024-2025 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Bookkeeping of every block the proxy hands out.
//!
//! [`ServedStaleSet`] enforces that each stale block is served at most once per
//! process. [`ServedBlockLedger`] is the ordered, append-only record used to
//! check afterwards that every stale block preceded its canonical competitor.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use hashbrown::HashSet;
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedKind {
    Stale,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedBlock {
    pub kind: ServedKind,
    pub height: u64,
    pub hash: Sha256dHash,
}

// The guarded collections are only ever pushed to, so a poisoned lock still
// holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Append-only log of served blocks, shared by all sessions
#[derive(Default)]
pub struct ServedBlockLedger {
    entries: Mutex<Vec<ServedBlock>>,
}

impl ServedBlockLedger {
    pub fn new() -> ServedBlockLedger {
        ServedBlockLedger::default()
    }

    /// Record a served block. Returns its position in the ledger.
    pub fn append(&self, kind: ServedKind, height: u64, hash: Sha256dHash) -> usize {
        let mut entries = lock(&self.entries);
        entries.push(ServedBlock { kind, height, hash });
        entries.len() - 1
    }

    /// Snapshot of the ledger in append order
    pub fn entries(&self) -> Vec<ServedBlock> {
        lock(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stale entries in first-served order, without duplicates
    pub fn served_stale(&self) -> Vec<ServedBlock> {
        let mut seen = HashSet::new();
        lock(&self.entries)
            .iter()
            .filter(|e| e.kind == ServedKind::Stale && seen.insert(e.hash))
            .cloned()
            .collect()
    }

    /// Index of the first ledger entry for `hash`
    pub fn position_of(&self, hash: &Sha256dHash) -> Option<usize> {
        lock(&self.entries).iter().position(|e| e.hash == *hash)
    }

    /// Write the ledger as a JSON array
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let entries = self.entries();
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &entries)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

/// Hashes of stale blocks already handed out, shared by all sessions
#[derive(Default)]
pub struct ServedStaleSet {
    served: Mutex<HashSet<Sha256dHash>>,
}

impl ServedStaleSet {
    pub fn new() -> ServedStaleSet {
        ServedStaleSet::default()
    }

    /// Atomically claim `hash`. Only the first caller gets `true`.
    pub fn mark_served(&self, hash: &Sha256dHash) -> bool {
        lock(&self.served).insert(*hash)
    }

    pub fn contains(&self, hash: &Sha256dHash) -> bool {
        lock(&self.served).contains(hash)
    }

    pub fn len(&self) -> usize {
        lock(&self.served).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_ledger_order_and_queries() {
        let ledger = ServedBlockLedger::new();
        let a = Sha256dHash::from_data(b"a");
        let b = Sha256dHash::from_data(b"b");

        assert_eq!(ledger.append(ServedKind::Stale, 5, a), 0);
        assert_eq!(ledger.append(ServedKind::Active, 5, b), 1);
        assert_eq!(ledger.append(ServedKind::Stale, 5, a), 2);

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.position_of(&a), Some(0));
        assert_eq!(ledger.position_of(&b), Some(1));
        assert_eq!(ledger.position_of(&Sha256dHash::from_data(b"c")), None);

        let stale = ledger.served_stale();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].hash, a);
        assert_eq!(stale[0].height, 5);
    }

    #[test]
    fn test_write_json() {
        let ledger = ServedBlockLedger::new();
        let hash = Sha256dHash::from_hex(
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
        )
        .unwrap();
        ledger.append(ServedKind::Stale, 5, hash);
        ledger.append(ServedKind::Active, 6, hash);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        ledger.write_json(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"kind": "stale", "height": 5, "hash": hash.be_hex_string()},
                {"kind": "active", "height": 6, "hash": hash.be_hex_string()},
            ])
        );

        let back: Vec<ServedBlock> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, ledger.entries());
    }

    #[test]
    fn test_mark_served_is_at_most_once_across_threads() {
        let served = Arc::new(ServedStaleSet::new());
        let hash = Sha256dHash::from_data(b"stale");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let served = served.clone();
                thread::spawn(move || served.mark_served(&hash))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(served.contains(&hash));
        assert_eq!(served.len(), 1);
        assert!(!served.mark_served(&hash));
    }
}
