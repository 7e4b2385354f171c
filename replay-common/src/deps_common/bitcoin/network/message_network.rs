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

//! Network-related network messages
//!
//! This module defines network messages which describe peers and their
//! capabilities
//!

use std::io;
use std::net::SocketAddr;

use crate::deps_common::bitcoin::network::address::Address;
use crate::deps_common::bitcoin::network::constants;
use crate::deps_common::bitcoin::network::encodable::{ConsensusDecodable, ConsensusEncodable};
use crate::deps_common::bitcoin::network::serialize::{self, SimpleDecoder, SimpleEncoder};
use crate::util::get_epoch_time_secs;

// Some simple messages

/// The `version` message
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct VersionMessage {
    /// The P2P network protocol version
    pub version: u32,
    /// A bitmask describing the services supported by this node
    pub services: u64,
    /// The time at which the `version` message was sent
    pub timestamp: i64,
    /// The network address of the peer receiving the message
    pub receiver: Address,
    /// The network address of the peer sending the message
    pub sender: Address,
    /// A random nonce used to detect loops in the network
    pub nonce: u64,
    /// A string describing the peer's software
    pub user_agent: String,
    /// The height of the maximum-work blockchain that the peer is aware of
    pub start_height: i32,
    /// Whether the receiving peer should relay messages to the sender; used
    /// if the sender is bandwidth-limited and would like to support bloom
    /// filtering. Defaults to true. Peers predating BIP37 omit it.
    pub relay: bool,
}

impl VersionMessage {
    /// Constructs a new `version` message advertising a full witness node
    pub fn new(
        timestamp: i64,
        receiver: &SocketAddr,
        sender: &SocketAddr,
        nonce: u64,
        user_agent: String,
        start_height: i32,
    ) -> VersionMessage {
        VersionMessage {
            version: constants::PROTOCOL_VERSION,
            services: constants::SERVICES,
            timestamp,
            receiver: Address::new(receiver, constants::SERVICES),
            sender: Address::new(sender, constants::SERVICES),
            nonce,
            user_agent,
            start_height,
            relay: false,
        }
    }

    /// Constructs a `version` message stamped with the current time
    pub fn now(
        receiver: &SocketAddr,
        sender: &SocketAddr,
        nonce: u64,
        user_agent: String,
        start_height: i32,
    ) -> VersionMessage {
        VersionMessage::new(
            get_epoch_time_secs() as i64,
            receiver,
            sender,
            nonce,
            user_agent,
            start_height,
        )
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for VersionMessage {
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        self.version.consensus_encode(s)?;
        self.services.consensus_encode(s)?;
        self.timestamp.consensus_encode(s)?;
        self.receiver.consensus_encode(s)?;
        self.sender.consensus_encode(s)?;
        self.nonce.consensus_encode(s)?;
        self.user_agent.consensus_encode(s)?;
        self.start_height.consensus_encode(s)?;
        self.relay.consensus_encode(s)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for VersionMessage {
    fn consensus_decode(d: &mut D) -> Result<VersionMessage, serialize::Error> {
        let version = ConsensusDecodable::consensus_decode(d)?;
        let services = ConsensusDecodable::consensus_decode(d)?;
        let timestamp = ConsensusDecodable::consensus_decode(d)?;
        let receiver = ConsensusDecodable::consensus_decode(d)?;
        let sender = ConsensusDecodable::consensus_decode(d)?;
        let nonce = ConsensusDecodable::consensus_decode(d)?;
        let user_agent = ConsensusDecodable::consensus_decode(d)?;
        let start_height = ConsensusDecodable::consensus_decode(d)?;
        let relay = match d.read_bool() {
            Ok(relay) => relay,
            Err(serialize::Error::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => true,
            Err(e) => return Err(e),
        };
        Ok(VersionMessage {
            version,
            services,
            timestamp,
            receiver,
            sender,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}
