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

//! Network message
//!
//! This module defines the `NetworkMessage` and `RawNetworkMessage` types that
//! are used for (de)serializing Bitcoin objects for transmission on the network.
//! Commands this crate has no use for are carried opaquely as
//! `NetworkMessage::Unknown`, so that a peer speaking a newer protocol
//! never causes a decode failure.
//!

use std::io::Cursor;
use std::iter;

use crate::deps_common::bitcoin::blockdata::block;
use crate::deps_common::bitcoin::network::encodable::CheckedData;
use crate::deps_common::bitcoin::network::encodable::{ConsensusDecodable, ConsensusEncodable};
use crate::deps_common::bitcoin::network::message_blockdata;
use crate::deps_common::bitcoin::network::message_network;
use crate::deps_common::bitcoin::network::serialize::{
    self, serialize, RawDecoder, SimpleDecoder, SimpleEncoder,
};

/// Serializer for command string
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct CommandString(pub String);

impl<S: SimpleEncoder> ConsensusEncodable<S> for CommandString {
    #[inline]
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        let CommandString(ref inner_str) = *self;
        let mut rawbytes = [0u8; 12];
        let strbytes = inner_str.as_bytes();
        if strbytes.len() > 12 {
            return Err(serialize::Error::ParseFailed(
                "command string longer than 12 bytes",
            ));
        }
        rawbytes[..strbytes.len()].copy_from_slice(strbytes);
        rawbytes.consensus_encode(s)
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for CommandString {
    #[inline]
    fn consensus_decode(d: &mut D) -> Result<CommandString, serialize::Error> {
        let rawbytes: [u8; 12] = ConsensusDecodable::consensus_decode(d)?;
        let rv = iter::FromIterator::from_iter(rawbytes.iter().filter_map(|&u| {
            if u > 0 {
                Some(u as char)
            } else {
                None
            }
        }));
        Ok(CommandString(rv))
    }
}

/// A Network message
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawNetworkMessage {
    /// Magic bytes to identify the network these messages are meant for
    pub magic: u32,
    /// The actual message data
    pub payload: NetworkMessage,
}

#[derive(Clone, PartialEq, Eq, Debug)]
/// A Network message payload. Proper documentation is available on at
/// [Bitcoin Wiki: Protocol Specification](https://en.bitcoin.it/wiki/Protocol_specification)
pub enum NetworkMessage {
    /// `version`
    Version(message_network::VersionMessage),
    /// `verack`
    Verack,
    /// `inv`
    Inv(Vec<message_blockdata::Inventory>),
    /// `getdata`
    GetData(Vec<message_blockdata::Inventory>),
    /// `notfound`
    NotFound(Vec<message_blockdata::Inventory>),
    /// `getheaders`
    GetHeaders(message_blockdata::GetHeadersMessage),
    /// `block`
    Block(block::Block),
    /// `headers`
    Headers(Vec<block::LoneBlockHeader>),
    /// `sendheaders`
    SendHeaders,
    /// `ping`
    Ping(u64),
    /// `pong`
    Pong(u64),
    /// Any other command, with its undecoded payload
    Unknown {
        /// The command string as received
        command: String,
        /// The raw payload
        payload: Vec<u8>,
    },
}

impl NetworkMessage {
    /// Return the message command. This is useful for debug outputs.
    pub fn command(&self) -> &str {
        match *self {
            NetworkMessage::Version(_) => "version",
            NetworkMessage::Verack => "verack",
            NetworkMessage::Inv(_) => "inv",
            NetworkMessage::GetData(_) => "getdata",
            NetworkMessage::NotFound(_) => "notfound",
            NetworkMessage::GetHeaders(_) => "getheaders",
            NetworkMessage::Block(_) => "block",
            NetworkMessage::Headers(_) => "headers",
            NetworkMessage::SendHeaders => "sendheaders",
            NetworkMessage::Ping(_) => "ping",
            NetworkMessage::Pong(_) => "pong",
            NetworkMessage::Unknown { ref command, .. } => command.as_str(),
        }
    }

    fn payload_bytes(&self) -> Result<Vec<u8>, serialize::Error> {
        match *self {
            NetworkMessage::Version(ref dat) => serialize(dat),
            NetworkMessage::Verack => Ok(vec![]),
            NetworkMessage::Inv(ref dat) => serialize(dat),
            NetworkMessage::GetData(ref dat) => serialize(dat),
            NetworkMessage::NotFound(ref dat) => serialize(dat),
            NetworkMessage::GetHeaders(ref dat) => serialize(dat),
            NetworkMessage::Block(ref dat) => serialize(dat),
            NetworkMessage::Headers(ref dat) => serialize(dat),
            NetworkMessage::SendHeaders => Ok(vec![]),
            NetworkMessage::Ping(ref dat) => serialize(dat),
            NetworkMessage::Pong(ref dat) => serialize(dat),
            NetworkMessage::Unknown { ref payload, .. } => Ok(payload.clone()),
        }
    }
}

impl RawNetworkMessage {
    /// Frame a payload for the network identified by `magic`
    pub fn new(magic: u32, payload: NetworkMessage) -> RawNetworkMessage {
        RawNetworkMessage { magic, payload }
    }

    /// Return the message command. This is useful for debug outputs.
    pub fn command(&self) -> String {
        self.payload.command().to_owned()
    }
}

impl<S: SimpleEncoder> ConsensusEncodable<S> for RawNetworkMessage {
    fn consensus_encode(&self, s: &mut S) -> Result<(), serialize::Error> {
        self.magic.consensus_encode(s)?;
        CommandString(self.command()).consensus_encode(s)?;
        CheckedData(self.payload.payload_bytes()?).consensus_encode(s)?;
        Ok(())
    }
}

impl<D: SimpleDecoder> ConsensusDecodable<D> for RawNetworkMessage {
    fn consensus_decode(d: &mut D) -> Result<RawNetworkMessage, serialize::Error> {
        let magic = ConsensusDecodable::consensus_decode(d)?;
        let CommandString(cmd): CommandString = ConsensusDecodable::consensus_decode(d)?;
        let CheckedData(raw_payload): CheckedData = ConsensusDecodable::consensus_decode(d)?;

        let mut mem_d = RawDecoder::new(Cursor::new(&raw_payload[..]));
        let payload = match &cmd[..] {
            "version" => NetworkMessage::Version(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            "verack" => NetworkMessage::Verack,
            "inv" => NetworkMessage::Inv(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            "getdata" => NetworkMessage::GetData(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            "notfound" => {
                NetworkMessage::NotFound(ConsensusDecodable::consensus_decode(&mut mem_d)?)
            }
            "getheaders" => {
                NetworkMessage::GetHeaders(ConsensusDecodable::consensus_decode(&mut mem_d)?)
            }
            "block" => NetworkMessage::Block(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            "headers" => NetworkMessage::Headers(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            "sendheaders" => NetworkMessage::SendHeaders,
            "ping" => NetworkMessage::Ping(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            "pong" => NetworkMessage::Pong(ConsensusDecodable::consensus_decode(&mut mem_d)?),
            _ => NetworkMessage::Unknown {
                command: cmd.clone(),
                payload: raw_payload.clone(),
            },
        };
        Ok(RawNetworkMessage { magic, payload })
    }
}
