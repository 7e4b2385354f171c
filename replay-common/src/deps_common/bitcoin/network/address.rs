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

//! Bitcoin network addresses
//!
//! This module defines the structures and functions needed to encode
//! network addresses in Bitcoin messages.
//!

use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use crate::deps_common::bitcoin::network::encodable::{ConsensusDecodable, ConsensusEncodable};
use crate::deps_common::bitcoin::network::serialize::{self, SimpleDecoder, SimpleEncoder};

/// A message which can be sent on the Bitcoin network
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Services provided by the peer whose address this is
    pub services: u64,
    /// Network byte-order ipv6 address, or ipv4-mapped ipv6 address
    pub address: [u16; 8],
    /// Network port
    pub port: u16,
}

const ONION: [u16; 3] = [0xFD87, 0xD87E, 0xEB43];

impl Address {
    /// Create an address message for a socket
    pub fn new(socket: &SocketAddr, services: u64) -> Address {
        let (address, port) = match *socket {
            SocketAddr::V4(addr) => (addr.ip().to_ipv6_mapped().segments(), addr.port()),
            SocketAddr::V6(addr) => (addr.ip().segments(), addr.port()),
        };
        Address {
            address,
            port,
            services,
        }
    }

    /// The unspecified address, as sent by peers that do not know their own
    pub fn unspecified(services: u64) -> Address {
        Address {
            services,
            address: [0; 8],
            port: 0,
        }
    }

    /// Convert to a socket address, unless this is an onion address
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let addr = &self.address;
        if addr[0..3] == ONION {
            return None;
        }
        let ip = Ipv6Addr::new(
            addr[0], addr[1], addr[2], addr[3], addr[4], addr[5], addr[6], addr[7],
        );
        let ip = match ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(ip),
        };
        Some(SocketAddr::new(ip, self.port))
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for Address {
    #[inline]
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        self.services.consensus_encode(s)?;
        for segment in self.address.iter() {
            segment.swap_bytes().consensus_encode(s)?;
        }
        self.port.swap_bytes().consensus_encode(s)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for Address {
    #[inline]
    fn consensus_decode(d: &mut D) -> Result<Address, serialize::Error> {
        let services = ConsensusDecodable::consensus_decode(d)?;
        let mut address = [0u16; 8];
        for segment in address.iter_mut() {
            let raw: u16 = ConsensusDecodable::consensus_decode(d)?;
            *segment = raw.swap_bytes();
        }
        let port: u16 = ConsensusDecodable::consensus_decode(d)?;
        Ok(Address {
            services,
            address,
            port: port.swap_bytes(),
        })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.socket_addr() {
            Some(addr) => write!(f, "Address {{services: {}, address: {}}}", self.services, addr),
            None => write!(f, "Address {{services: {}, address: <onion>}}", self.services),
        }
    }
}
