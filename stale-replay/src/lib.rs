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

//! A Bitcoin peer that replays previously orphaned ("stale") blocks to a syncing
//! node immediately before the canonical block at the same height, so that the
//! node has to perform real reorganizations while it catches up.
//!
//! The crate is split along the data flow: the [`catalog`] of stale blocks is
//! loaded once at startup, the [`chain_view`] fills lazily from an upstream node
//! through the [`upstream`] RPC client, and the [`proxy`] combines both to answer
//! `getheaders`/`getdata` requests while recording every block it hands out in
//! the [`ledger`].

#![allow(clippy::new_without_default)]

#[allow(unused_imports)]
#[macro_use(o, slog_log, slog_trace, slog_debug, slog_info, slog_warn, slog_error)]
extern crate slog;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate replay_common;

pub mod catalog;
pub mod chain_view;
pub mod cli;
pub mod config;
pub mod ledger;
pub mod proxy;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod upstream;
