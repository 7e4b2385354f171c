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

//! In-memory chain fixtures shared by unit and integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use hashbrown::HashMap;
use replay_common::deps_common::bitcoin::blockdata::block::{Block, BlockHeader};
use replay_common::deps_common::bitcoin::blockdata::transaction::{
    OutPoint, Transaction, TxIn, TxOut,
};
use replay_common::deps_common::bitcoin::network::serialize::BitcoinHash;
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;

use crate::catalog::StaleBlockRecord;
use crate::upstream::bitcoin_rpc_client::RPC_INVALID_ADDRESS_OR_KEY;
use crate::upstream::rpc_transport::RpcError;
use crate::upstream::{UpstreamChain, UpstreamError};

/// Build a one-coinbase block on top of `prev`. Distinct `salt`s give distinct
/// hashes for the same parent. No proof of work.
pub fn make_block(prev: Sha256dHash, salt: u32) -> Block {
    let mut script_sig = vec![0x04];
    script_sig.extend_from_slice(&salt.to_le_bytes());
    script_sig.extend_from_slice(&prev.as_bytes()[..4]);
    let coinbase = Transaction {
        version: 1,
        lock_time: 0,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig,
            sequence: 0xffffffff,
            witness: vec![],
        }],
        output: vec![TxOut {
            value: 50 * 100_000_000,
            script_pubkey: vec![0x51],
        }],
    };
    Block {
        header: BlockHeader {
            version: 0x20000000,
            prev_blockhash: prev,
            merkle_root: coinbase.txid(),
            time: 1_600_000_000 + salt,
            bits: 0x207fffff,
            nonce: salt,
        },
        txdata: vec![coinbase],
    }
}

struct MockChain {
    active: Vec<Block>,
    heights: HashMap<Sha256dHash, u64>,
}

/// A fake upstream node holding an active chain built with `make_block`.
pub struct MockUpstream {
    chain: Mutex<MockChain>,
    offline: AtomicBool,
    calls: Mutex<HashMap<&'static str, usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn not_found(hash: &Sha256dHash) -> UpstreamError {
    UpstreamError::Rpc(RpcError::Service {
        code: RPC_INVALID_ADDRESS_OR_KEY,
        message: format!("Block not found: {hash}"),
    })
}

impl MockUpstream {
    /// A chain with blocks at heights `0..=tip_height`
    pub fn new(tip_height: u64) -> MockUpstream {
        let genesis = make_block(Sha256dHash::default(), 0);
        let mut heights = HashMap::new();
        heights.insert(genesis.bitcoin_hash(), 0);
        let upstream = MockUpstream {
            chain: Mutex::new(MockChain {
                active: vec![genesis],
                heights,
            }),
            offline: AtomicBool::new(false),
            calls: Mutex::new(HashMap::new()),
        };
        upstream.extend(tip_height);
        upstream
    }

    /// Append `count` blocks to the active chain
    pub fn extend(&self, count: u64) {
        let mut chain = lock(&self.chain);
        for _ in 0..count {
            let height = chain.active.len() as u64;
            let prev = chain.active[chain.active.len() - 1].bitcoin_hash();
            let block = make_block(prev, 0);
            chain.heights.insert(block.bitcoin_hash(), height);
            chain.active.push(block);
        }
    }

    /// Make every call fail as if the node were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// How many times the named `UpstreamChain` method was called
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).get(method).copied().unwrap_or(0)
    }

    pub fn hash_at(&self, height: u64) -> Sha256dHash {
        lock(&self.chain).active[height as usize].bitcoin_hash()
    }

    pub fn block_at_height(&self, height: u64) -> Block {
        lock(&self.chain).active[height as usize].clone()
    }

    /// A side-chain block competing with the active block at `height`.
    /// `salt` must be non-zero.
    pub fn stale_block_at(&self, height: u64, salt: u32) -> Block {
        assert!(height >= 1 && salt != 0);
        make_block(self.hash_at(height - 1), salt)
    }

    pub fn stale_record(&self, height: u64, salt: u32) -> StaleBlockRecord {
        let block = self.stale_block_at(height, salt);
        let path = PathBuf::from(format!("{}-{}.bin", height, block.bitcoin_hash()));
        StaleBlockRecord::new(height, block, path)
    }

    fn enter(&self, method: &'static str) -> Result<(), UpstreamError> {
        *lock(&self.calls).entry(method).or_insert(0) += 1;
        if self.offline.load(Ordering::SeqCst) {
            return Err(UpstreamError::Rpc(RpcError::Network(
                "connection refused".to_string(),
            )));
        }
        Ok(())
    }

    fn find(&self, hash: &Sha256dHash) -> Option<Block> {
        let chain = lock(&self.chain);
        let height = *chain.heights.get(hash)?;
        Some(chain.active[height as usize].clone())
    }
}

impl UpstreamChain for MockUpstream {
    fn tip_height(&self) -> Result<u64, UpstreamError> {
        self.enter("tip_height")?;
        Ok(lock(&self.chain).active.len() as u64 - 1)
    }

    fn block_hash_at_height(&self, height: u64) -> Result<Sha256dHash, UpstreamError> {
        self.enter("block_hash_at_height")?;
        lock(&self.chain)
            .active
            .get(height as usize)
            .map(|b| b.bitcoin_hash())
            .ok_or(UpstreamError::HeightOutOfRange(height))
    }

    fn header_at(&self, hash: &Sha256dHash) -> Result<BlockHeader, UpstreamError> {
        self.enter("header_at")?;
        self.find(hash).map(|b| b.header).ok_or_else(|| not_found(hash))
    }

    fn active_height_of(&self, hash: &Sha256dHash) -> Result<Option<u64>, UpstreamError> {
        self.enter("active_height_of")?;
        Ok(lock(&self.chain).heights.get(hash).copied())
    }

    fn block_at(&self, hash: &Sha256dHash) -> Result<Block, UpstreamError> {
        self.enter("block_at")?;
        self.find(hash).ok_or_else(|| not_found(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_chain_links() {
        let upstream = MockUpstream::new(5);
        assert_eq!(upstream.tip_height().unwrap(), 5);
        for h in 1..=5 {
            let block = upstream.block_at_height(h);
            assert_eq!(block.header.prev_blockhash, upstream.hash_at(h - 1));
            assert_eq!(upstream.active_height_of(&block.bitcoin_hash()).unwrap(), Some(h));
        }

        let stale = upstream.stale_block_at(3, 1);
        assert_eq!(stale.header.prev_blockhash, upstream.hash_at(2));
        assert_ne!(stale.bitcoin_hash(), upstream.hash_at(3));
        assert_eq!(upstream.active_height_of(&stale.bitcoin_hash()).unwrap(), None);
        assert!(upstream.block_at(&stale.bitcoin_hash()).is_err());
    }
}
