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

//! Bitcoin Transaction
//!
//! A transaction describes a transfer of money. It consumes previously-unspent
//! transaction outputs and produces new ones, satisfying the condition to spend
//! the old outputs (typically a digital signature with a specific key must be
//! provided) and defining the condition to spend the new ones. The use of digital
//! signatures ensures that coins cannot be spent by unauthorized parties.
//!
//! Scripts are carried as opaque byte strings: nothing here interprets them.
//!

use crate::deps_common::bitcoin::network::encodable::{ConsensusDecodable, ConsensusEncodable};
use crate::deps_common::bitcoin::network::serialize::{
    self, BitcoinHash, SimpleDecoder, SimpleEncoder,
};
use crate::deps_common::bitcoin::util::hash::{Sha256dEncoder, Sha256dHash};

/// A reference to a transaction output
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct OutPoint {
    /// The referenced transaction's txid
    pub txid: Sha256dHash,
    /// The index of the referenced output in its transaction's vout
    pub vout: u32,
}
impl_consensus_encoding!(OutPoint, txid, vout);

impl OutPoint {
    /// Creates a "null" `OutPoint`, as used by coinbase inputs
    #[inline]
    pub fn null() -> OutPoint {
        OutPoint {
            txid: Default::default(),
            vout: u32::MAX,
        }
    }

    /// Checks if an `OutPoint` is "null".
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == OutPoint::null()
    }
}

/// A transaction input, which defines old coins to be consumed
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TxIn {
    /// The reference to the previous output that is being used an an input
    pub previous_output: OutPoint,
    /// The script which pushes values on the stack which will cause
    /// the referenced output's script to accept
    pub script_sig: Vec<u8>,
    /// The sequence number, which suggests to miners which of two
    /// conflicting transactions should be preferred, or 0xFFFFFFFF
    /// to ignore this feature. This is generally never used since
    /// the miner behaviour cannot be enforced.
    pub sequence: u32,
    /// Witness data: an array of byte-arrays.
    /// Note that this field is *not* (de)serialized with the rest of the TxIn in
    /// ConsensusEncodable/ConsensusDecodable, as it is (de)serialized at the end of the full
    /// Transaction. It *is* (de)serialized with the rest of the TxIn in other (de)serialization
    /// routines.
    pub witness: Vec<Vec<u8>>,
}

/// A transaction output, which defines new coins to be created from old ones.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TxOut {
    /// The value of the output, in satoshis
    pub value: u64,
    /// The script which must satisfy for the output to be spent
    pub script_pubkey: Vec<u8>,
}
impl_consensus_encoding!(TxOut, value, script_pubkey);

/// A Bitcoin transaction, which describes an authenticated movement of coins
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Transaction {
    /// The protocol version, should always be 1.
    pub version: u32,
    /// Block number before which this transaction is valid, or 0 for
    /// valid immediately.
    pub lock_time: u32,
    /// List of inputs
    pub input: Vec<TxIn>,
    /// List of outputs
    pub output: Vec<TxOut>,
}

impl Transaction {
    /// Computes the txid. For non-segwit transactions this will be identical
    /// to the output of `BitcoinHash::bitcoin_hash()`, but for segwit transactions,
    /// this will give the correct txid (not including witnesses) while `bitcoin_hash`
    /// will also hash witnesses.
    pub fn txid(&self) -> Sha256dHash {
        let mut enc = Sha256dEncoder::new();
        // hashing into memory cannot fail
        let _ = self
            .version
            .consensus_encode(&mut enc)
            .and_then(|_| self.input.consensus_encode(&mut enc))
            .and_then(|_| self.output.consensus_encode(&mut enc))
            .and_then(|_| self.lock_time.consensus_encode(&mut enc));
        enc.into_hash()
    }

    /// Whether any input carries witness data, i.e. whether this
    /// transaction serializes in the BIP144 extended format
    pub fn has_witness(&self) -> bool {
        self.input.iter().any(|i| !i.witness.is_empty())
    }

    /// Is this a coin base transaction?
    pub fn is_coin_base(&self) -> bool {
        self.input.len() == 1 && self.input[0].previous_output.is_null()
    }
}

impl BitcoinHash for Transaction {
    fn bitcoin_hash(&self) -> Sha256dHash {
        let mut enc = Sha256dEncoder::new();
        let _ = self.consensus_encode(&mut enc);
        enc.into_hash()
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for TxIn {
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        self.previous_output.consensus_encode(s)?;
        self.script_sig.consensus_encode(s)?;
        self.sequence.consensus_encode(s)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for TxIn {
    fn consensus_decode(d: &mut D) -> Result<TxIn, serialize::Error> {
        Ok(TxIn {
            previous_output: ConsensusDecodable::consensus_decode(d)?,
            script_sig: ConsensusDecodable::consensus_decode(d)?,
            sequence: ConsensusDecodable::consensus_decode(d)?,
            witness: vec![],
        })
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for Transaction {
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        self.version.consensus_encode(s)?;
        if self.has_witness() {
            // segwit marker and flag
            0u8.consensus_encode(s)?;
            1u8.consensus_encode(s)?;
            self.input.consensus_encode(s)?;
            self.output.consensus_encode(s)?;
            for input in &self.input {
                input.witness.consensus_encode(s)?;
            }
        } else {
            self.input.consensus_encode(s)?;
            self.output.consensus_encode(s)?;
        }
        self.lock_time.consensus_encode(s)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for Transaction {
    fn consensus_decode(d: &mut D) -> Result<Transaction, serialize::Error> {
        let version: u32 = ConsensusDecodable::consensus_decode(d)?;
        let input: Vec<TxIn> = ConsensusDecodable::consensus_decode(d)?;
        // An empty input vector is either the segwit marker or a true empty transaction
        if input.is_empty() {
            let segwit_flag: u8 = ConsensusDecodable::consensus_decode(d)?;
            match segwit_flag {
                // Empty tx
                0 => Ok(Transaction {
                    version,
                    input,
                    output: vec![],
                    lock_time: ConsensusDecodable::consensus_decode(d)?,
                }),
                // BIP144 input witnesses
                1 => {
                    let mut input: Vec<TxIn> = ConsensusDecodable::consensus_decode(d)?;
                    let output: Vec<TxOut> = ConsensusDecodable::consensus_decode(d)?;
                    for txin in input.iter_mut() {
                        txin.witness = ConsensusDecodable::consensus_decode(d)?;
                    }
                    if !input.is_empty() && input.iter().all(|i| i.witness.is_empty()) {
                        Err(serialize::Error::ParseFailed(
                            "witness flag set but no witnesses present",
                        ))
                    } else {
                        Ok(Transaction {
                            version,
                            input,
                            output,
                            lock_time: ConsensusDecodable::consensus_decode(d)?,
                        })
                    }
                }
                // We don't support anything else
                x => Err(serialize::Error::UnsupportedSegwitFlag(x)),
            }
        // non-segwit
        } else {
            Ok(Transaction {
                version,
                input,
                output: ConsensusDecodable::consensus_decode(d)?,
                lock_time: ConsensusDecodable::consensus_decode(d)?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OutPoint, Transaction, TxIn, TxOut};

    use crate::deps_common::bitcoin::network::serialize::{
        deserialize, serialize, BitcoinHash, Error,
    };
    use crate::deps_common::bitcoin::util::hash::Sha256dHash;
    use crate::util::hash::hex_bytes;

    fn segwit_tx() -> Transaction {
        Transaction {
            version: 2,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Sha256dHash([7; 32]),
                    vout: 1,
                },
                script_sig: vec![],
                sequence: 0xfffffffd,
                witness: vec![vec![0x30; 71], vec![0x02; 33]],
            }],
            output: vec![TxOut {
                value: 50_000,
                script_pubkey: vec![0x00, 0x14, 0xaa, 0xbb],
            }],
        }
    }

    #[test]
    fn test_genesis_coinbase() {
        let raw = hex_bytes("01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000").unwrap();
        let tx: Transaction = deserialize(&raw).unwrap();
        assert!(tx.is_coin_base());
        assert!(!tx.has_witness());
        assert_eq!(tx.output[0].value, 5_000_000_000);
        assert_eq!(
            tx.txid().be_hex_string(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
        assert_eq!(tx.txid(), tx.bitcoin_hash());
        assert_eq!(serialize(&tx).unwrap(), raw);
    }

    #[test]
    fn test_segwit_roundtrip() {
        let tx = segwit_tx();
        let raw = serialize(&tx).unwrap();
        // version, then marker and flag
        assert_eq!(&raw[4..6], &[0x00, 0x01]);

        let decoded: Transaction = deserialize(&raw).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.input[0].witness.len(), 2);
        // txid excludes witnesses, wtxid does not
        assert_ne!(tx.txid(), tx.bitcoin_hash());

        let mut stripped = tx.clone();
        stripped.input[0].witness.clear();
        assert_eq!(stripped.txid(), tx.txid());
        assert_eq!(stripped.txid(), stripped.bitcoin_hash());
    }

    #[test]
    fn test_bad_segwit_flag() {
        let mut raw = serialize(&segwit_tx()).unwrap();
        raw[5] = 0x02;
        match deserialize::<Transaction>(&raw) {
            Err(Error::UnsupportedSegwitFlag(2)) => {}
            x => panic!("expected unsupported segwit flag, got {:?}", x),
        }
    }

    #[test]
    fn test_witness_flag_without_witnesses() {
        let mut tx = segwit_tx();
        tx.input[0].witness.clear();
        let legacy = serialize(&tx).unwrap();
        // splice in marker and flag without any witness data
        let mut raw = legacy[0..4].to_vec();
        raw.extend_from_slice(&[0x00, 0x01]);
        raw.extend_from_slice(&legacy[4..legacy.len() - 4]);
        raw.push(0x00);
        raw.extend_from_slice(&legacy[legacy.len() - 4..]);
        assert!(deserialize::<Transaction>(&raw).is_err());
    }
}
