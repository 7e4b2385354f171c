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

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::catalog::StaleCatalog;
use crate::chain_view::ChainView;
use crate::config::ProxyConfig;
use crate::ledger::{ServedBlockLedger, ServedStaleSet};
use crate::proxy::engine::ReplayEngine;
use crate::proxy::session::ProxySession;
use crate::proxy::ProxyError;
use crate::upstream::UpstreamChain;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state of a running proxy. Every session gets its own engine over
/// the same catalog, chain view, served set and ledger.
pub struct ReplayProxy<U: UpstreamChain> {
    catalog: Arc<StaleCatalog>,
    chain: Arc<ChainView<U>>,
    served: Arc<ServedStaleSet>,
    ledger: Arc<ServedBlockLedger>,
    magic: u32,
    user_agent: String,
    max_height: Option<u64>,
    read_timeout: Duration,
}

impl<U: UpstreamChain + 'static> ReplayProxy<U> {
    pub fn new(config: &ProxyConfig, catalog: StaleCatalog, chain: ChainView<U>) -> ReplayProxy<U> {
        ReplayProxy {
            catalog: Arc::new(catalog),
            chain: Arc::new(chain),
            served: Arc::new(ServedStaleSet::new()),
            ledger: Arc::new(ServedBlockLedger::new()),
            magic: config.network.magic(),
            user_agent: config.user_agent.clone(),
            max_height: config.max_height,
            read_timeout: config.read_timeout,
        }
    }

    pub fn catalog(&self) -> &StaleCatalog {
        &self.catalog
    }

    pub fn chain(&self) -> &ChainView<U> {
        &self.chain
    }

    pub fn ledger(&self) -> &Arc<ServedBlockLedger> {
        &self.ledger
    }

    pub fn served(&self) -> &Arc<ServedStaleSet> {
        &self.served
    }

    /// A fresh engine over the shared state
    pub fn engine(&self) -> ReplayEngine<U> {
        ReplayEngine::new(
            self.catalog.clone(),
            self.chain.clone(),
            self.served.clone(),
            self.ledger.clone(),
            self.max_height,
        )
    }

    pub fn bind(addr: &SocketAddr) -> Result<TcpListener, ProxyError> {
        let listener = TcpListener::bind(addr)?;
        info!("Listening for targets on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub fn open_session(
        &self,
        stream: TcpStream,
        should_keep_running: Arc<AtomicBool>,
    ) -> Result<ProxySession<U>, ProxyError> {
        ProxySession::new(
            stream,
            self.engine(),
            self.magic,
            self.user_agent.clone(),
            self.read_timeout,
            should_keep_running,
        )
    }

    /// Accept targets until `should_keep_running` is cleared, running each
    /// session on its own thread. Waits for all sessions before returning.
    pub fn serve(
        &self,
        listener: TcpListener,
        should_keep_running: Arc<AtomicBool>,
    ) -> Result<(), ProxyError> {
        listener.set_nonblocking(true)?;
        let mut sessions: Vec<JoinHandle<()>> = vec![];

        while should_keep_running.load(Ordering::SeqCst) {
            let (stream, addr) = match listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    sessions.retain(|handle| !handle.is_finished());
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
            };

            info!("Accepted target connection from {}", addr);
            stream.set_nonblocking(false)?;
            let mut session = match self.open_session(stream, should_keep_running.clone()) {
                Ok(session) => session,
                Err(e) => {
                    warn!("Failed to set up session with {}: {}", addr, e);
                    continue;
                }
            };

            let handle = thread::Builder::new()
                .name(format!("peer-{}", addr))
                .spawn(move || match session.run() {
                    Ok(()) => debug!("Session with {} finished", addr),
                    Err(e) => warn!("Session with {} failed: {}", addr, e),
                })?;
            sessions.push(handle);
        }

        debug!("Stop accepting; waiting on {} sessions", sessions.len());
        for handle in sessions {
            if handle.join().is_err() {
                error!("Session thread panicked");
            }
        }
        Ok(())
    }

    /// Dial the target and run a single session on the current thread. We
    /// speak first, as the initiator of a Bitcoin connection must.
    pub fn connect(
        &self,
        addr: &SocketAddr,
        should_keep_running: Arc<AtomicBool>,
    ) -> Result<(), ProxyError> {
        info!("Connecting to target {}", addr);
        let stream = TcpStream::connect_timeout(addr, CONNECT_TIMEOUT)?;
        let mut session = self.open_session(stream, should_keep_running)?;
        session.send_version()?;
        session.run()
    }
}
