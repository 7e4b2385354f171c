// Rust Bitcoin Library
// Written in 2014 by
//     Andrew Poelstra <apoelstra@wpsoftware.net>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication
// along with this software.
// If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.
//

//! Bitcoin Block
//!
//! A block is a bundle of transactions with a proof-of-work attached,
//! which attaches to an earlier block to form the blockchain. This
//! module describes structures and functions needed to describe
//! these blocks and the blockchain.
//!

use crate::deps_common::bitcoin::blockdata::transaction::Transaction;
use crate::deps_common::bitcoin::network::encodable::{ConsensusEncodable, VarInt};
use crate::deps_common::bitcoin::network::serialize::BitcoinHash;
use crate::deps_common::bitcoin::util::hash::{Sha256dEncoder, Sha256dHash};

/// A block header, which contains all the block's information except
/// the actual transactions
#[derive(Copy, PartialEq, Eq, Clone, Debug, Hash)]
pub struct BlockHeader {
    /// The protocol version. Should always be 1.
    pub version: u32,
    /// Reference to the previous block in the chain
    pub prev_blockhash: Sha256dHash,
    /// The root hash of the merkle tree of transactions in the block
    pub merkle_root: Sha256dHash,
    /// The timestamp of the block, as claimed by the miner
    pub time: u32,
    /// The target value below which the blockhash must lie, encoded as a
    /// a float (with well-defined rounding, of course)
    pub bits: u32,
    /// The nonce, selected to obtain a low enough blockhash
    pub nonce: u32,
}

/// A Bitcoin block, which is a collection of transactions with an attached
/// proof of work.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct Block {
    /// The block header
    pub header: BlockHeader,
    /// List of transactions contained in the block
    pub txdata: Vec<Transaction>,
}

/// A block header with txcount attached, which is given in the `headers`
/// network message.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct LoneBlockHeader {
    /// The actual block header
    pub header: BlockHeader,
    /// The number of transactions in the block. This will always be zero
    /// when the LoneBlockHeader is returned as part of a `headers` message.
    pub tx_count: VarInt,
}

impl LoneBlockHeader {
    /// Wrap a header for a `headers` message
    pub fn new(header: BlockHeader) -> LoneBlockHeader {
        LoneBlockHeader {
            header,
            tx_count: VarInt(0),
        }
    }
}

impl BitcoinHash for BlockHeader {
    fn bitcoin_hash(&self) -> Sha256dHash {
        let mut enc = Sha256dEncoder::new();
        // hashing into memory cannot fail
        let _ = self.consensus_encode(&mut enc);
        enc.into_hash()
    }
}

impl BitcoinHash for Block {
    fn bitcoin_hash(&self) -> Sha256dHash {
        self.header.bitcoin_hash()
    }
}

impl BitcoinHash for LoneBlockHeader {
    fn bitcoin_hash(&self) -> Sha256dHash {
        self.header.bitcoin_hash()
    }
}

impl_consensus_encoding!(BlockHeader, version, prev_blockhash, merkle_root, time, bits, nonce);
impl_consensus_encoding!(Block, header, txdata);
impl_consensus_encoding!(LoneBlockHeader, header, tx_count);

#[cfg(test)]
mod tests {
    use super::{Block, BlockHeader, LoneBlockHeader};

    use crate::deps_common::bitcoin::network::serialize::{deserialize, serialize, BitcoinHash};
    use crate::util::hash::hex_bytes as hex_decode;

    const GENESIS: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c0101000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    #[test]
    fn block_test() {
        let some_block = hex_decode(GENESIS).unwrap();
        let cutoff_block = hex_decode(&GENESIS[..GENESIS.len() - 2]).unwrap();

        let decode: Result<Block, _> = deserialize(&some_block);
        let bad_decode: Result<Block, _> = deserialize(&cutoff_block);

        assert!(decode.is_ok());
        assert!(bad_decode.is_err());
        let real_decode = decode.unwrap();
        assert_eq!(real_decode.header.version, 1);
        assert!(real_decode.header.prev_blockhash.is_zero());
        assert_eq!(
            real_decode.header.merkle_root,
            real_decode.txdata[0].txid()
        );
        assert_eq!(real_decode.header.time, 1231006505);
        assert_eq!(real_decode.header.bits, 486604799);
        assert_eq!(real_decode.header.nonce, 2083236893);
        assert_eq!(
            real_decode.bitcoin_hash().be_hex_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );

        assert_eq!(serialize(&real_decode).ok(), Some(some_block));
    }

    #[test]
    fn header_test() {
        let raw = hex_decode(&GENESIS[..160]).unwrap();
        let header: BlockHeader = deserialize(&raw).unwrap();
        assert_eq!(
            header.bitcoin_hash().to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );

        let lone = LoneBlockHeader::new(header);
        let mut expected = raw.clone();
        expected.push(0);
        assert_eq!(serialize(&lone).unwrap(), expected);
        assert_eq!(lone.bitcoin_hash(), header.bitcoin_hash());
    }
}
