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

//! Access to the upstream node that holds the finalized canonical chain.

pub mod bitcoin_rpc_client;
pub mod rpc_transport;

use replay_common::deps_common::bitcoin::blockdata::block::{Block, BlockHeader};
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;

use crate::upstream::rpc_transport::RpcError;

/// Failure to obtain chain data from upstream
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// The RPC call itself failed
    #[error("upstream RPC failed: {0}")]
    Rpc(#[from] RpcError),
    /// Upstream answered, but with data we could not decode
    #[error("malformed upstream data: {0}")]
    Malformed(String),
    /// Upstream does not (yet) have a block at this height
    #[error("upstream has no block at height {0}")]
    HeightOutOfRange(u64),
}

/// The read-only view of the canonical chain the replay engine needs.
///
/// Implemented by the JSON-RPC client for real deployments and by
/// `testing::MockUpstream` in tests.
pub trait UpstreamChain: Send + Sync {
    /// Height of the current best block
    fn tip_height(&self) -> Result<u64, UpstreamError>;
    /// Hash of the active-chain block at `height`
    fn block_hash_at_height(&self, height: u64) -> Result<Sha256dHash, UpstreamError>;
    /// Header of the block with the given hash
    fn header_at(&self, hash: &Sha256dHash) -> Result<BlockHeader, UpstreamError>;
    /// Height of the block if it is on the active chain, `None` if it is unknown
    /// or part of a side chain
    fn active_height_of(&self, hash: &Sha256dHash) -> Result<Option<u64>, UpstreamError>;
    /// Full block with the given hash, including witness data
    fn block_at(&self, hash: &Sha256dHash) -> Result<Block, UpstreamError>;
}
