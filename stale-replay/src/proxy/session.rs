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

//! One connected target: frames messages on the socket, performs the version
//! handshake and hands `getheaders`/`getdata` to the [`ReplayEngine`].

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::{thread_rng, Rng};
use replay_common::deps_common::bitcoin::network::encodable::{
    ConsensusDecodable, ConsensusEncodable,
};
use replay_common::deps_common::bitcoin::network::message::{NetworkMessage, RawNetworkMessage};
use replay_common::deps_common::bitcoin::network::message_network::VersionMessage;
use replay_common::deps_common::bitcoin::network::serialize::{self, RawDecoder, RawEncoder};

use crate::proxy::engine::{ReplayEngine, ReplayRequest};
use crate::proxy::ProxyError;
use crate::upstream::UpstreamChain;

/// Once the first byte of a message has arrived, the rest must follow within this time
pub const MESSAGE_READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Writing a single message (blocks included) must not take longer than this
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ProxySession<U: UpstreamChain> {
    engine: ReplayEngine<U>,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    magic: u32,
    user_agent: String,
    version_nonce: u64,
    idle_timeout: Duration,
    version_sent: bool,
    handshake_complete: bool,
    should_keep_running: Arc<AtomicBool>,
}

impl<U: UpstreamChain> ProxySession<U> {
    pub fn new(
        stream: TcpStream,
        engine: ReplayEngine<U>,
        magic: u32,
        user_agent: String,
        idle_timeout: Duration,
        should_keep_running: Arc<AtomicBool>,
    ) -> Result<ProxySession<U>, ProxyError> {
        stream.set_read_timeout(Some(idle_timeout))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let writer = BufWriter::new(stream.try_clone()?);

        Ok(ProxySession {
            engine,
            reader: BufReader::new(stream),
            writer,
            peer_addr,
            local_addr,
            magic,
            user_agent,
            version_nonce: thread_rng().gen(),
            idle_timeout,
            version_sent: false,
            handshake_complete: false,
            should_keep_running,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    /// Send a Bitcoin protocol message on the wire
    pub fn send_message(&mut self, payload: NetworkMessage) -> Result<(), ProxyError> {
        trace!("Send {} to {}", payload.command(), self.peer_addr);
        let message = RawNetworkMessage::new(self.magic, payload);
        message.consensus_encode(&mut RawEncoder::new(&mut self.writer))?;
        self.writer.flush()?;
        Ok(())
    }

    /// Receive a Bitcoin protocol message on the wire.
    /// Returns `Ok(None)` if nothing arrived within the idle timeout, and
    /// `Err(ConnectionBroken)` if the peer hung up.
    pub fn recv_message(&mut self) -> Result<Option<NetworkMessage>, ProxyError> {
        match self.reader.fill_buf() {
            Ok([]) => return Err(ProxyError::ConnectionBroken),
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        // a message has started; don't mistake a slow sender for an idle one
        self.reader.get_ref().set_read_timeout(Some(MESSAGE_READ_TIMEOUT))?;
        let decoded: Result<RawNetworkMessage, _> =
            ConsensusDecodable::consensus_decode(&mut RawDecoder::new(&mut self.reader));
        self.reader.get_ref().set_read_timeout(Some(self.idle_timeout))?;

        let decoded = decoded.map_err(|e| match e {
            // if we can't finish a recv(), then report that the connection is broken
            serialize::Error::Io(ref io_error)
                if io_error.kind() == io::ErrorKind::UnexpectedEof =>
            {
                ProxyError::ConnectionBroken
            }
            serialize::Error::Io(io_error) => ProxyError::Io(io_error),
            e => ProxyError::Serialization(e),
        })?;

        // sanity check -- must match our network
        if decoded.magic != self.magic {
            return Err(ProxyError::InvalidMagic(decoded.magic));
        }
        trace!("Recv {} from {}", decoded.command(), self.peer_addr);
        Ok(Some(decoded.payload))
    }

    /// Send our `version`, advertising the capped upstream tip as our height
    pub fn send_version(&mut self) -> Result<(), ProxyError> {
        let tip = self.engine.effective_tip()?;
        let start_height = i32::try_from(tip).unwrap_or(i32::MAX);
        let payload = VersionMessage::now(
            &self.peer_addr,
            &self.local_addr,
            self.version_nonce,
            self.user_agent.clone(),
            start_height,
        );

        debug!(
            "Send version (nonce={}, height={}) to {}",
            self.version_nonce, start_height, self.peer_addr
        );
        self.send_message(NetworkMessage::Version(payload))?;
        self.version_sent = true;
        Ok(())
    }

    /// Handle one inbound message
    pub fn handle_message(&mut self, message: NetworkMessage) -> Result<(), ProxyError> {
        match message {
            NetworkMessage::Version(version) => {
                if version.nonce == self.version_nonce {
                    return Err(ProxyError::InvalidMessage(
                        "connected to ourselves".to_string(),
                    ));
                }
                info!(
                    "Peer {} is {} (protocol {}, height {})",
                    self.peer_addr, version.user_agent, version.version, version.start_height
                );
                if !self.version_sent {
                    self.send_version()?;
                }
                debug!("Send verack to {}", self.peer_addr);
                self.send_message(NetworkMessage::Verack)
            }
            NetworkMessage::Verack => {
                debug!("Handshake with {} complete", self.peer_addr);
                self.handshake_complete = true;
                Ok(())
            }
            NetworkMessage::Ping(nonce) => self.send_message(NetworkMessage::Pong(nonce)),
            other => match ReplayRequest::try_from(other) {
                Ok(request) => self.handle_request(request),
                Err(ignored) => {
                    debug!(
                        "Ignore {} from {}",
                        ignored.command(),
                        self.peer_addr
                    );
                    Ok(())
                }
            },
        }
    }

    fn handle_request(&mut self, request: ReplayRequest) -> Result<(), ProxyError> {
        let mut replies = vec![];
        let result = self.engine.handle(request, &mut replies);
        // whatever was answered before a failure still goes out
        for reply in replies {
            self.send_message(reply)?;
        }
        result
    }

    /// Process messages until the peer disconnects, an error occurs or
    /// `should_keep_running` is cleared
    pub fn run(&mut self) -> Result<(), ProxyError> {
        while self.should_keep_running.load(Ordering::SeqCst) {
            match self.recv_message() {
                Ok(Some(message)) => self.handle_message(message)?,
                Ok(None) => {}
                Err(ProxyError::ConnectionBroken) => {
                    info!("Peer {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Stop session with {}", self.peer_addr);
        Ok(())
    }
}
