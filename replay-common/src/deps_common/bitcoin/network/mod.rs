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

//! Network Support
//!
//! Functions and data types needed to speak the Bitcoin peer-to-peer
//! protocol.
//!

pub mod address;
pub mod constants;
pub mod encodable;
pub mod message;
pub mod message_blockdata;
pub mod message_network;
pub mod serialize;
