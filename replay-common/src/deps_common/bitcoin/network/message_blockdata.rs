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

//! Blockdata network messages
//!
//! This module describes network messages which are used for passing
//! Bitcoin data (blocks and transactions) around.
//!

use crate::deps_common::bitcoin::network::constants;
use crate::deps_common::bitcoin::network::encodable::{ConsensusDecodable, ConsensusEncodable};
use crate::deps_common::bitcoin::network::serialize::{self, SimpleDecoder, SimpleEncoder};
use crate::deps_common::bitcoin::util::hash::Sha256dHash;

/// Flag OR'd into an inventory type to request witness serialization
pub const MSG_WITNESS_FLAG: u32 = 1 << 30;
/// Mask that strips the witness flag from an inventory type
pub const MSG_TYPE_MASK: u32 = 0xffffffff >> 2;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
/// The type of an inventory object
pub enum InvType {
    /// Error --- these inventories can be ignored
    Error,
    /// Transaction
    Transaction,
    /// Block
    Block,
    /// Witness Block
    WitnessBlock,
    /// Witness Transaction
    WitnessTransaction,
    /// Any other type (filtered blocks, compact blocks, ...), kept verbatim
    Other(u32),
}

impl InvType {
    /// The on-wire type code
    pub fn to_u32(&self) -> u32 {
        match *self {
            InvType::Error => 0,
            InvType::Transaction => 1,
            InvType::Block => 2,
            InvType::WitnessBlock => MSG_WITNESS_FLAG | 2,
            InvType::WitnessTransaction => MSG_WITNESS_FLAG | 1,
            InvType::Other(code) => code,
        }
    }

    /// Decode an on-wire type code. Never fails.
    pub fn from_u32(code: u32) -> InvType {
        match code {
            0 => InvType::Error,
            1 => InvType::Transaction,
            2 => InvType::Block,
            0x40000002 => InvType::WitnessBlock,
            0x40000001 => InvType::WitnessTransaction,
            other => InvType::Other(other),
        }
    }

    /// Whether this entry refers to a full block, with or without witness data
    pub fn is_block(&self) -> bool {
        self.to_u32() & MSG_TYPE_MASK == 2
    }
}

/// The `getheaders` message
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct GetHeadersMessage {
    /// The protocol version
    pub version: u32,
    /// Locator hashes --- ordered newest to oldest. The remote peer will
    /// reply with its longest known chain, starting from a locator hash
    /// if possible and block 1 otherwise.
    pub locator_hashes: Vec<Sha256dHash>,
    /// References the header to stop at, or zero to just fetch the maximum 2000 headers
    pub stop_hash: Sha256dHash,
}

/// An inventory object --- a reference to a Bitcoin object
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Inventory {
    /// The type of object that is referenced
    pub inv_type: InvType,
    /// The object's hash
    pub hash: Sha256dHash,
}

impl GetHeadersMessage {
    /// Construct a new `getheaders` message
    pub fn new(locator_hashes: Vec<Sha256dHash>, stop_hash: Sha256dHash) -> GetHeadersMessage {
        GetHeadersMessage {
            version: constants::PROTOCOL_VERSION,
            locator_hashes,
            stop_hash,
        }
    }

    /// The stop hash, unless it is the all-zero "no limit" value
    pub fn stop(&self) -> Option<&Sha256dHash> {
        if self.stop_hash.is_zero() {
            None
        } else {
            Some(&self.stop_hash)
        }
    }
}

impl_consensus_encoding!(GetHeadersMessage, version, locator_hashes, stop_hash);

impl Inventory {
    /// A plain block inventory entry for the given hash
    pub fn block(hash: Sha256dHash) -> Inventory {
        Inventory {
            inv_type: InvType::Block,
            hash,
        }
    }

    /// A witness-block inventory entry for the given hash
    pub fn witness_block(hash: Sha256dHash) -> Inventory {
        Inventory {
            inv_type: InvType::WitnessBlock,
            hash,
        }
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for Inventory {
    #[inline]
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        self.inv_type.to_u32().consensus_encode(s)?;
        self.hash.consensus_encode(s)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for Inventory {
    #[inline]
    fn consensus_decode(d: &mut D) -> Result<Inventory, serialize::Error> {
        let int_type: u32 = ConsensusDecodable::consensus_decode(d)?;
        Ok(Inventory {
            inv_type: InvType::from_u32(int_type),
            hash: ConsensusDecodable::consensus_decode(d)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{GetHeadersMessage, InvType, Inventory};

    use crate::util::hash::hex_bytes as hex_decode;

    use crate::deps_common::bitcoin::network::serialize::{deserialize, serialize};
    use crate::deps_common::bitcoin::util::hash::Sha256dHash;
    use std::default::Default;

    #[test]
    fn getheaders_message_test() {
        let from_sat = hex_decode("72110100014a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b0000000000000000000000000000000000000000000000000000000000000000").unwrap();
        let genhash =
            hex_decode("4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b").unwrap();

        let decode: Result<GetHeadersMessage, _> = deserialize(&from_sat);
        assert!(decode.is_ok());
        let real_decode = decode.unwrap();
        assert_eq!(real_decode.version, 70002);
        assert_eq!(real_decode.locator_hashes.len(), 1);
        assert_eq!(
            serialize(&real_decode.locator_hashes[0]).ok(),
            Some(genhash)
        );
        assert_eq!(real_decode.stop_hash, Default::default());
        assert_eq!(real_decode.stop(), None);

        assert_eq!(serialize(&real_decode).ok(), Some(from_sat));
    }

    #[test]
    fn inventory_types() {
        assert!(InvType::Block.is_block());
        assert!(InvType::WitnessBlock.is_block());
        assert!(!InvType::Transaction.is_block());
        assert!(!InvType::WitnessTransaction.is_block());
        // MSG_FILTERED_BLOCK and MSG_CMPCT_BLOCK
        assert!(!InvType::from_u32(3).is_block());
        assert!(!InvType::from_u32(4).is_block());
        assert_eq!(InvType::from_u32(0x40000002), InvType::WitnessBlock);
        assert_eq!(InvType::from_u32(7), InvType::Other(7));
    }

    #[test]
    fn unknown_inventory_type_decodes() {
        let mut bytes = vec![0x05, 0, 0, 0];
        bytes.extend_from_slice(&[0xab; 32]);
        let inv: Inventory = deserialize(&bytes).unwrap();
        assert_eq!(inv.inv_type, InvType::Other(5));
        assert_eq!(inv.hash, Sha256dHash([0xab; 32]));
        assert_eq!(serialize(&inv).unwrap(), bytes);

        let witness = Inventory::witness_block(Sha256dHash([1; 32]));
        assert_eq!(&serialize(&witness).unwrap()[0..4], &[0x02, 0, 0, 0x40]);
    }
}
