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

//! A cache-through view of the upstream node's active chain.
//!
//! Everything except the tip height is immutable once the upstream chain is
//! finalized, so every lookup is cached forever after its first successful
//! resolution. Failed lookups cache nothing.

use std::sync::Arc;

use replay_common::deps_common::bitcoin::blockdata::block::{Block, BlockHeader};
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;
use replay_common::util::cache::FetchCache;

use crate::upstream::{UpstreamChain, UpstreamError};

pub struct ChainView<U: UpstreamChain> {
    upstream: U,
    hash_by_height: FetchCache<u64, Sha256dHash>,
    height_by_hash: FetchCache<Sha256dHash, Option<u64>>,
    header_by_hash: FetchCache<Sha256dHash, BlockHeader>,
    block_by_hash: FetchCache<Sha256dHash, Arc<Block>>,
}

impl<U: UpstreamChain> ChainView<U> {
    pub fn new(upstream: U) -> ChainView<U> {
        ChainView {
            upstream,
            hash_by_height: FetchCache::new(),
            height_by_hash: FetchCache::new(),
            header_by_hash: FetchCache::new(),
            block_by_hash: FetchCache::new(),
        }
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Current upstream tip. Never cached.
    pub fn tip_height(&self) -> Result<u64, UpstreamError> {
        self.upstream.tip_height()
    }

    /// The tip as seen by a target capped at `max_height`
    pub fn effective_tip(&self, max_height: Option<u64>) -> Result<u64, UpstreamError> {
        let tip = self.tip_height()?;
        Ok(match max_height {
            Some(max) => tip.min(max),
            None => tip,
        })
    }

    pub fn hash_at(&self, height: u64) -> Result<Sha256dHash, UpstreamError> {
        self.hash_by_height.get_or_fetch(&height, || {
            trace!("Fetch block hash at height {}", height);
            self.upstream.block_hash_at_height(height)
        })
    }

    /// Height of `hash` on the active chain. `Ok(None)` (unknown or side chain)
    /// is cached just like a positive answer.
    pub fn active_height_of(&self, hash: &Sha256dHash) -> Result<Option<u64>, UpstreamError> {
        let height = self.height_by_hash.get_or_fetch(hash, || {
            trace!("Fetch active height of {}", hash);
            self.upstream.active_height_of(hash)
        })?;
        if let Some(height) = height {
            self.hash_by_height.insert(height, *hash);
        }
        Ok(height)
    }

    pub fn header(&self, hash: &Sha256dHash) -> Result<BlockHeader, UpstreamError> {
        self.header_by_hash.get_or_fetch(hash, || {
            trace!("Fetch header {}", hash);
            self.upstream.header_at(hash)
        })
    }

    pub fn block(&self, hash: &Sha256dHash) -> Result<Arc<Block>, UpstreamError> {
        self.block_by_hash.get_or_fetch(hash, || {
            debug!("Fetch block {}", hash);
            let block = self.upstream.block_at(hash)?;
            self.header_by_hash.insert(*hash, block.header);
            Ok(Arc::new(block))
        })
    }
}
