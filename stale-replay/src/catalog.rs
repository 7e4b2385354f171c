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

//! The catalog of stale (orphaned) blocks to replay, loaded once from disk.
//!
//! Each stale block lives in its own file named `<height>-<hash>.bin`, where
//! `<hash>` is the lowercase big-endian hex block hash and the content is the
//! raw consensus-serialized block (with witness data).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, io};

use hashbrown::HashMap;
use replay_common::deps_common::bitcoin::blockdata::block::Block;
use replay_common::deps_common::bitcoin::network::serialize::{self, deserialize, BitcoinHash};
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode stale block {}: {source}", .path.display())]
    Unparseable {
        path: PathBuf,
        #[source]
        source: serialize::Error,
    },
    #[error("stale block {} hashes to {actual}, not {expected}", .path.display())]
    CorruptRecord {
        path: PathBuf,
        expected: Sha256dHash,
        actual: Sha256dHash,
    },
    #[error("stale block {} claims height 0", .path.display())]
    BadHeight { path: PathBuf },
}

/// One stale block and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct StaleBlockRecord {
    pub height: u64,
    pub hash: Sha256dHash,
    pub parent_hash: Sha256dHash,
    pub block: Block,
    pub source_path: PathBuf,
}

impl StaleBlockRecord {
    pub fn new(height: u64, block: Block, source_path: PathBuf) -> StaleBlockRecord {
        StaleBlockRecord {
            height,
            hash: block.bitcoin_hash(),
            parent_hash: block.header.prev_blockhash,
            block,
            source_path,
        }
    }
}

/// Split `<height>-<64 lowercase hex>.bin` into its parts
fn parse_file_name(name: &str) -> Option<(u64, Sha256dHash)> {
    let stem = name.strip_suffix(".bin")?;
    let (height, hash) = stem.split_once('-')?;
    if height.is_empty() || !height.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if hash.len() != 64 || !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    Some((height.parse().ok()?, Sha256dHash::from_hex(hash).ok()?))
}

/// Immutable index of stale blocks by parent and by hash.
#[derive(Default)]
pub struct StaleCatalog {
    records: Vec<Arc<StaleBlockRecord>>,
    by_parent: HashMap<Sha256dHash, Vec<Arc<StaleBlockRecord>>>,
    by_hash: HashMap<Sha256dHash, Arc<StaleBlockRecord>>,
}

impl StaleCatalog {
    /// Scan `dir` (non-recursively) for stale block files. Files with other names
    /// are skipped. Any unreadable, undecodable or mislabeled block aborts the load.
    pub fn load(dir: &Path) -> Result<StaleCatalog, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = vec![];
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some((height, hash)) = parse_file_name(name) else {
                trace!("Skip non-block file {}", name);
                continue;
            };
            paths.push((height, hash, entry.path()));
        }
        paths.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut records = Vec::with_capacity(paths.len());
        for (height, expected, path) in paths {
            if height == 0 {
                return Err(CatalogError::BadHeight { path });
            }
            let bytes = fs::read(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            let block: Block = match deserialize(&bytes) {
                Ok(block) => block,
                Err(source) => return Err(CatalogError::Unparseable { path, source }),
            };
            let actual = block.bitcoin_hash();
            if actual != expected {
                return Err(CatalogError::CorruptRecord {
                    path,
                    expected,
                    actual,
                });
            }
            records.push(StaleBlockRecord::new(height, block, path));
        }

        let catalog = StaleCatalog::from_records(records);
        info!(
            "Loaded {} stale blocks from {}",
            catalog.len(),
            dir.display()
        );
        Ok(catalog)
    }

    /// Index in-memory records, ordered by `(height, hash)`
    pub fn from_records(mut records: Vec<StaleBlockRecord>) -> StaleCatalog {
        records.sort_by(|a, b| (a.height, a.hash).cmp(&(b.height, b.hash)));

        let mut catalog = StaleCatalog::default();
        for record in records {
            if catalog.by_hash.contains_key(&record.hash) {
                warn!(
                    "Duplicate stale block {} in {}",
                    record.hash,
                    record.source_path.display()
                );
                continue;
            }
            let record = Arc::new(record);
            catalog
                .by_parent
                .entry(record.parent_hash)
                .or_default()
                .push(record.clone());
            catalog.by_hash.insert(record.hash, record.clone());
            catalog.records.push(record);
        }
        catalog
    }

    /// Stale children of `parent`, lowest `(height, hash)` first
    pub fn candidates_for(&self, parent: &Sha256dHash) -> &[Arc<StaleBlockRecord>] {
        self.by_parent
            .get(parent)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn lookup(&self, hash: &Sha256dHash) -> Option<&Arc<StaleBlockRecord>> {
        self.by_hash.get(hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Arc<StaleBlockRecord>] {
        &self.records
    }
}
