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

//! The replay peer: the protocol engine, the per-connection session loop and
//! the listener that ties them to sockets.

pub mod engine;
pub mod server;
pub mod session;

use std::io;

use replay_common::deps_common::bitcoin::network::serialize;

use crate::upstream::UpstreamError;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    /// I/O error on the peer socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A message could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serialize::Error),
    /// The peer speaks for a different network
    #[error("invalid network magic {0:#010x}")]
    InvalidMagic(u32),
    /// The peer hung up
    #[error("connection broken")]
    ConnectionBroken,
    /// The upstream node could not answer
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// Well-formed, but not acceptable here
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
