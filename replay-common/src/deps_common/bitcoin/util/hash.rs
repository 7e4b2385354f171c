// Rust Bitcoin Library
// Written in 2014 by
//     Andrew Poelstra <apoelstra@wpsoftware.net>
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication
// along with this software.
// If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.
//

//! Hash functions
//!
//! Double-SHA256 hashes, as used for block and transaction identifiers.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::deps_common::bitcoin::network::encodable::{ConsensusDecodable, ConsensusEncodable};
use crate::deps_common::bitcoin::network::serialize::{self, SimpleDecoder, SimpleEncoder};
use crate::util::HexError;

/// A Bitcoin hash, 32-bytes, computed from x as SHA256(SHA256(x))
pub struct Sha256dHash(pub [u8; 32]);
impl_array_newtype!(Sha256dHash, u8, 32);

/// An object that allows serializing data into a sha256d
pub struct Sha256dEncoder(Sha256);

impl Default for Sha256dEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256dEncoder {
    /// Create a new encoder
    pub fn new() -> Sha256dEncoder {
        Sha256dEncoder(Sha256::new())
    }

    /// Extract the hash from an encoder
    pub fn into_hash(self) -> Sha256dHash {
        let mut tmp = [0; 32];
        tmp.copy_from_slice(self.0.finalize().as_slice());
        let mut second_sha = Sha256::new();
        second_sha.update(tmp);
        tmp.copy_from_slice(second_sha.finalize().as_slice());
        Sha256dHash(tmp)
    }
}

impl SimpleEncoder for Sha256dEncoder {
    fn emit_u64(&mut self, v: u64) -> Result<(), serialize::Error> {
        self.0.update(v.to_le_bytes());
        Ok(())
    }

    fn emit_u32(&mut self, v: u32) -> Result<(), serialize::Error> {
        self.0.update(v.to_le_bytes());
        Ok(())
    }

    fn emit_u16(&mut self, v: u16) -> Result<(), serialize::Error> {
        self.0.update(v.to_le_bytes());
        Ok(())
    }

    fn emit_u8(&mut self, v: u8) -> Result<(), serialize::Error> {
        self.0.update([v]);
        Ok(())
    }

    fn emit_i64(&mut self, v: i64) -> Result<(), serialize::Error> {
        self.0.update(v.to_le_bytes());
        Ok(())
    }

    fn emit_i32(&mut self, v: i32) -> Result<(), serialize::Error> {
        self.0.update(v.to_le_bytes());
        Ok(())
    }

    fn emit_i16(&mut self, v: i16) -> Result<(), serialize::Error> {
        self.0.update(v.to_le_bytes());
        Ok(())
    }

    fn emit_i8(&mut self, v: i8) -> Result<(), serialize::Error> {
        self.0.update([v as u8]);
        Ok(())
    }

    fn emit_bool(&mut self, v: bool) -> Result<(), serialize::Error> {
        self.0.update([if v { 1 } else { 0 }]);
        Ok(())
    }

    fn emit_slice(&mut self, v: &[u8]) -> Result<(), serialize::Error> {
        self.0.update(v);
        Ok(())
    }
}

// This doesn't make much sense to me, but is implicit behaviour
// in the C++ reference client, so we need it for consensus.
impl Default for Sha256dHash {
    #[inline]
    fn default() -> Sha256dHash {
        Sha256dHash([0u8; 32])
    }
}

impl Sha256dHash {
    /// Create a hash by hashing some data
    pub fn from_data(data: &[u8]) -> Sha256dHash {
        let mut ret = [0u8; 32];
        ret.copy_from_slice(Sha256::digest(data).as_slice());
        let second = Sha256::digest(ret);
        ret.copy_from_slice(second.as_slice());
        Sha256dHash(ret)
    }

    /// The all-zero hash, used on the wire to mean "no hash"
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    // Human-readable hex output

    /// Decodes a big-endian (i.e. reversed vs sha256sum output) hex string as a Sha256dHash
    #[inline]
    pub fn from_hex(s: &str) -> Result<Sha256dHash, HexError> {
        if s.len() != 64 {
            return Err(HexError::BadLength(s.len()));
        }

        let bytes = s.as_bytes();
        let mut ret = [0; 32];
        for i in 0..32 {
            let hi = hex_nibble(bytes[2 * i])?;
            let lo = hex_nibble(bytes[2 * i + 1])?;
            ret[31 - i] = hi * 0x10 + lo;
        }
        Ok(Sha256dHash(ret))
    }

    /// Human-readable hex output, in the byte order used on the wire
    pub fn le_hex_string(&self) -> String {
        crate::util::hash::to_hex(&self.0)
    }

    /// Human-readable hex output, in the byte order block explorers and RPC use
    pub fn be_hex_string(&self) -> String {
        let mut data = self.0;
        data.reverse();
        crate::util::hash::to_hex(&data)
    }
}

fn hex_nibble(b: u8) -> Result<u8, HexError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        b => Err(HexError::BadCharacter(b as char)),
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for Sha256dHash {
    #[inline]
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        s.emit_slice(&self.0)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for Sha256dHash {
    #[inline]
    fn consensus_decode(d: &mut D) -> Result<Sha256dHash, serialize::Error> {
        let mut ret = [0u8; 32];
        d.read_slice(&mut ret)?;
        Ok(Sha256dHash(ret))
    }
}

impl serde::Serialize for Sha256dHash {
    /// Serialize a `Sha256dHash`.
    ///
    /// Note that this outputs hashes as big endian hex numbers, so this should be
    /// used only for user-facing stuff. Internal and network serialization is
    /// little-endian and should be done using the consensus
    /// [`ConsensusEncodable`][1] interface.
    ///
    /// [1]: ../../network/encodable/trait.ConsensusEncodable.html
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.be_hex_string())
    }
}

impl<'de> serde::Deserialize<'de> for Sha256dHash {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex: String = serde::Deserialize::deserialize(deserializer)?;
        Sha256dHash::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Sha256dHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.be_hex_string())
    }
}

impl fmt::Debug for Sha256dHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sha256dHash({})", self.be_hex_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps_common::bitcoin::network::serialize::{deserialize, serialize};

    #[test]
    fn test_sha256d() {
        // nb the 5df6... output is the one you get from sha256sum. this is the
        // "little-endian" hex string since it matches the in-memory representation
        // of a Uint256 (which is little-endian) after transmutation
        assert_eq!(
            Sha256dHash::from_data(&[]).le_hex_string(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
        assert_eq!(
            Sha256dHash::from_data(&[]).be_hex_string(),
            "56944c5d3f98413ef45cf54545538103cc9f298e0575820ad3591376e2e0f65d"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let hex = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let hash = Sha256dHash::from_hex(hex).unwrap();
        assert_eq!(hash.be_hex_string(), hex);
        assert_eq!(format!("{}", hash), hex);
        assert_eq!(hash[31], 0x00);
        assert_eq!(hash[0], 0x6f);

        assert_eq!(
            Sha256dHash::from_hex("00"),
            Err(HexError::BadLength(2))
        );
        assert!(Sha256dHash::from_hex(&"z".repeat(64)).is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut low = [0u8; 32];
        low[0] = 0xff;
        let mut high = [0u8; 32];
        high[31] = 0x01;
        assert!(Sha256dHash(low) < Sha256dHash(high));
    }

    #[test]
    fn test_consensus_encode_roundtrip() {
        let hash = Sha256dHash::from_data(&[1, 2, 3]);
        let bytes = serialize(&hash).unwrap();
        assert_eq!(bytes, hash.0.to_vec());
        let decoded: Sha256dHash = deserialize(&bytes).unwrap();
        assert_eq!(decoded, hash);
        assert!(Sha256dHash::default().is_zero());
        assert!(!hash.is_zero());
    }

    #[test]
    fn test_serde_big_endian() {
        let hex = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
        let hash = Sha256dHash::from_hex(hex).unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hex));
        let back: Sha256dHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
