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

//! Network constants
//!
//! This module provides various constants relating to the Bitcoin network
//! protocol, such as protocol versioning and magic header bytes.
//!

use std::fmt;
use std::str::FromStr;

/// Version of the protocol as appearing in network message headers
pub const PROTOCOL_VERSION: u32 = 70016;
/// Bitfield of services provided by this node
pub const SERVICES: u64 = NODE_NETWORK | NODE_WITNESS;
/// Service bit: can serve the full block chain
pub const NODE_NETWORK: u64 = 1 << 0;
/// Service bit: can serve blocks and transactions with witness data
pub const NODE_WITNESS: u64 = 1 << 3;
/// Maximum number of headers returned in a single `headers` message
pub const MAX_HEADERS_RESULTS: usize = 2000;
/// User agent advertised in our `version` messages
pub const USER_AGENT: &str = "/stale-replay:0.1.0/";

/// The cryptocurrency network to act on
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Network {
    /// Classic Bitcoin
    Bitcoin,
    /// Bitcoin's testnet3
    Testnet,
    /// Bitcoin's testnet4
    Testnet4,
    /// Bitcoin's signet
    Signet,
    /// Bitcoin's regtest
    Regtest,
}

impl Network {
    /// Return the network magic bytes, which should be encoded little-endian
    /// at the start of every message
    pub fn magic(&self) -> u32 {
        match *self {
            Network::Bitcoin => 0xD9B4BEF9,
            Network::Testnet => 0x0709110B,
            Network::Testnet4 => 0x283F161C,
            Network::Signet => 0x40CF030A,
            Network::Regtest => 0xDAB5BFFA,
        }
    }

    /// Reverse of `magic()`
    pub fn from_magic(magic: u32) -> Option<Network> {
        [
            Network::Bitcoin,
            Network::Testnet,
            Network::Testnet4,
            Network::Signet,
            Network::Regtest,
        ]
        .into_iter()
        .find(|net| net.magic() == magic)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Network::Bitcoin => "mainnet",
            Network::Testnet => "testnet",
            Network::Testnet4 => "testnet4",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Network, String> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Bitcoin),
            "testnet" | "testnet3" | "test" => Ok(Network::Testnet),
            "testnet4" => Ok(Network::Testnet4),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}
