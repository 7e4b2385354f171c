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

use std::time::Duration;

use replay_common::deps_common::bitcoin::blockdata::block::{Block, BlockHeader};
use replay_common::deps_common::bitcoin::network::serialize::{deserialize, BitcoinHash};
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;
use replay_common::util::hash::hex_bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::upstream::rpc_transport::{RpcAuth, RpcError, RpcResult, RpcTransport};
use crate::upstream::{UpstreamChain, UpstreamError};

/// `RPC_INVALID_ADDRESS_OR_KEY`: bitcoind's answer for an unknown block hash
pub const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
/// `RPC_INVALID_PARAMETER`: returned by `getblockhash` for a height above the tip
pub const RPC_INVALID_PARAMETER: i64 = -8;

/// Response structure for the verbose `getblockheader` RPC call.
///
/// # Note
/// This struct supports a subset of available fields to match current usage.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeaderInfo {
    pub hash: String,
    pub height: u64,
    /// `-1` when the block is not part of the active chain
    pub confirmations: i64,
}

/// JSON-RPC client for the read-only chain queries of a Bitcoin Core node.
pub struct BitcoinRpcClient {
    client_id: String,
    endpoint: RpcTransport,
}

/// Alias for results returned from client operations.
pub type BitcoinRpcClientResult<T> = RpcResult<T>;

impl BitcoinRpcClient {
    /// Create a client for `endpoint` (`host:port` or a full URL).
    ///
    /// # Errors
    /// Returns an error if the endpoint cannot be parsed or the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        auth: RpcAuth,
        timeout: Option<Duration>,
    ) -> BitcoinRpcClientResult<Self> {
        Ok(Self {
            client_id: "stale-replay".to_string(),
            endpoint: RpcTransport::from_url(endpoint, auth, timeout)?,
        })
    }

    /// Base URL of the node this client talks to, without credentials
    pub fn url(&self) -> &str {
        &self.endpoint.url
    }

    /// Returns the height of the most-work fully-validated chain.
    ///
    /// # Availability
    /// Available in Bitcoin Core since **v0.1.0**.
    pub fn get_block_count(&self) -> BitcoinRpcClientResult<u64> {
        self.endpoint.send(&self.client_id, "getblockcount", vec![])
    }

    /// Returns the hash of the block at `height` in the active chain, as big-endian hex.
    pub fn get_block_hash(&self, height: u64) -> BitcoinRpcClientResult<String> {
        self.endpoint
            .send(&self.client_id, "getblockhash", vec![height.into()])
    }

    /// Returns height and confirmation count of the block with the given hash.
    ///
    /// # Errors
    /// Fails with `RpcError::Service` code `-5` if the node has never seen the block.
    pub fn get_block_header_info(&self, hash: &str) -> BitcoinRpcClientResult<BlockHeaderInfo> {
        self.endpoint.send(
            &self.client_id,
            "getblockheader",
            vec![hash.into(), Value::Bool(true)],
        )
    }

    /// Returns the 80-byte serialized header, hex encoded.
    pub fn get_block_header_hex(&self, hash: &str) -> BitcoinRpcClientResult<String> {
        self.endpoint.send(
            &self.client_id,
            "getblockheader",
            vec![hash.into(), Value::Bool(false)],
        )
    }

    /// Returns the full serialized block (with witness data), hex encoded.
    pub fn get_block_hex(&self, hash: &str) -> BitcoinRpcClientResult<String> {
        self.endpoint
            .send(&self.client_id, "getblock", vec![hash.into(), 0.into()])
    }
}

fn decode_hex_payload(hex: &str, what: &str) -> Result<Vec<u8>, UpstreamError> {
    hex_bytes(hex).map_err(|e| UpstreamError::Malformed(format!("{what} is not hex: {e}")))
}

fn check_hash(requested: &Sha256dHash, got: Sha256dHash) -> Result<(), UpstreamError> {
    if *requested != got {
        return Err(UpstreamError::Malformed(format!(
            "asked for {requested}, upstream returned {got}"
        )));
    }
    Ok(())
}

impl UpstreamChain for BitcoinRpcClient {
    fn tip_height(&self) -> Result<u64, UpstreamError> {
        Ok(self.get_block_count()?)
    }

    fn block_hash_at_height(&self, height: u64) -> Result<Sha256dHash, UpstreamError> {
        let hex = match self.get_block_hash(height) {
            Ok(hex) => hex,
            Err(RpcError::Service { code, .. }) if code == RPC_INVALID_PARAMETER => {
                return Err(UpstreamError::HeightOutOfRange(height));
            }
            Err(e) => return Err(e.into()),
        };
        Sha256dHash::from_hex(&hex)
            .map_err(|e| UpstreamError::Malformed(format!("block hash '{hex}': {e}")))
    }

    fn header_at(&self, hash: &Sha256dHash) -> Result<BlockHeader, UpstreamError> {
        let hex = self.get_block_header_hex(&hash.be_hex_string())?;
        let header: BlockHeader = deserialize(&decode_hex_payload(&hex, "block header")?)
            .map_err(|e| UpstreamError::Malformed(format!("block header {hash}: {e}")))?;
        check_hash(hash, header.bitcoin_hash())?;
        Ok(header)
    }

    fn active_height_of(&self, hash: &Sha256dHash) -> Result<Option<u64>, UpstreamError> {
        match self.get_block_header_info(&hash.be_hex_string()) {
            Ok(info) if info.confirmations < 0 => Ok(None),
            Ok(info) => Ok(Some(info.height)),
            Err(RpcError::Service { code, .. }) if code == RPC_INVALID_ADDRESS_OR_KEY => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn block_at(&self, hash: &Sha256dHash) -> Result<Block, UpstreamError> {
        let hex = self.get_block_hex(&hash.be_hex_string())?;
        let block: Block = deserialize(&decode_hex_payload(&hex, "block")?)
            .map_err(|e| UpstreamError::Malformed(format!("block {hash}: {e}")))?;
        check_hash(hash, block.bitcoin_hash())?;
        Ok(block)
    }
}
