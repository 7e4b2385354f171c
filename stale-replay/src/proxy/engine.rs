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

//! Answers `getheaders` and `getdata` so that each stale block reaches the
//! target before the canonical block at the same height.
//!
//! When walking headers forward from the target's fork point, a stale child of
//! the previous block that has not been served yet is offered *instead of* the
//! canonical header and ends the batch. The target then asks for that block,
//! which is marked served, and the next `getheaders` round continues along the
//! canonical chain, forcing a reorganization.

use std::sync::Arc;

use replay_common::deps_common::bitcoin::blockdata::block::LoneBlockHeader;
use replay_common::deps_common::bitcoin::network::constants::MAX_HEADERS_RESULTS;
use replay_common::deps_common::bitcoin::network::message::NetworkMessage;
use replay_common::deps_common::bitcoin::network::message_blockdata::{
    GetHeadersMessage, Inventory,
};
use replay_common::deps_common::bitcoin::util::hash::Sha256dHash;

use crate::catalog::{StaleBlockRecord, StaleCatalog};
use crate::chain_view::ChainView;
use crate::ledger::{ServedBlockLedger, ServedKind, ServedStaleSet};
use crate::proxy::ProxyError;
use crate::upstream::UpstreamChain;

/// The inbound messages the engine answers
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayRequest {
    GetHeaders(GetHeadersMessage),
    GetData(Vec<Inventory>),
}

impl TryFrom<NetworkMessage> for ReplayRequest {
    type Error = NetworkMessage;

    /// Hands back any message the engine does not handle
    fn try_from(message: NetworkMessage) -> Result<ReplayRequest, NetworkMessage> {
        match message {
            NetworkMessage::GetHeaders(msg) => Ok(ReplayRequest::GetHeaders(msg)),
            NetworkMessage::GetData(inv) => Ok(ReplayRequest::GetData(inv)),
            other => Err(other),
        }
    }
}

pub struct ReplayEngine<U: UpstreamChain> {
    catalog: Arc<StaleCatalog>,
    chain: Arc<ChainView<U>>,
    served: Arc<ServedStaleSet>,
    ledger: Arc<ServedBlockLedger>,
    max_height: Option<u64>,
}

impl<U: UpstreamChain> Clone for ReplayEngine<U> {
    fn clone(&self) -> Self {
        ReplayEngine {
            catalog: self.catalog.clone(),
            chain: self.chain.clone(),
            served: self.served.clone(),
            ledger: self.ledger.clone(),
            max_height: self.max_height,
        }
    }
}

impl<U: UpstreamChain> ReplayEngine<U> {
    pub fn new(
        catalog: Arc<StaleCatalog>,
        chain: Arc<ChainView<U>>,
        served: Arc<ServedStaleSet>,
        ledger: Arc<ServedBlockLedger>,
        max_height: Option<u64>,
    ) -> ReplayEngine<U> {
        ReplayEngine {
            catalog,
            chain,
            served,
            ledger,
            max_height,
        }
    }

    pub fn chain(&self) -> &ChainView<U> {
        &self.chain
    }

    pub fn max_height(&self) -> Option<u64> {
        self.max_height
    }

    /// Upstream tip capped at the configured ceiling
    pub fn effective_tip(&self) -> Result<u64, ProxyError> {
        Ok(self.chain.effective_tip(self.max_height)?)
    }

    /// Answer `request`, pushing replies onto `replies` in transmission order.
    /// On error, `replies` still holds whatever was produced before the failure.
    pub fn handle(
        &self,
        request: ReplayRequest,
        replies: &mut Vec<NetworkMessage>,
    ) -> Result<(), ProxyError> {
        match request {
            ReplayRequest::GetHeaders(msg) => {
                let headers = self.get_headers(&msg)?;
                replies.push(NetworkMessage::Headers(headers));
                Ok(())
            }
            ReplayRequest::GetData(inventory) => self.get_data(&inventory, replies),
        }
    }

    /// Like `handle`, but collects the replies
    pub fn respond(&self, request: ReplayRequest) -> Result<Vec<NetworkMessage>, ProxyError> {
        let mut replies = vec![];
        self.handle(request, &mut replies)?;
        Ok(replies)
    }

    /// Height and hash of the newest locator entry on the active chain, or genesis
    pub fn find_fork_point(
        &self,
        locator: &[Sha256dHash],
    ) -> Result<(u64, Sha256dHash), ProxyError> {
        for hash in locator {
            if let Some(height) = self.chain.active_height_of(hash)? {
                return Ok((height, *hash));
            }
        }
        debug!("No locator entry on the active chain; starting from genesis");
        Ok((0, self.chain.hash_at(0)?))
    }

    fn above_ceiling(&self, height: u64) -> bool {
        matches!(self.max_height, Some(max) if height > max)
    }

    /// The first unserved stale child of `parent` that may be offered now
    pub fn next_stale_candidate(
        &self,
        parent: &Sha256dHash,
        stop: Option<&Sha256dHash>,
    ) -> Option<&Arc<StaleBlockRecord>> {
        self.catalog.candidates_for(parent).iter().find(|record| {
            if self.served.contains(&record.hash) {
                return false;
            }
            if self.above_ceiling(record.height) {
                return false;
            }
            match stop {
                Some(stop) => record.hash == *stop,
                None => true,
            }
        })
    }

    fn get_headers(&self, msg: &GetHeadersMessage) -> Result<Vec<LoneBlockHeader>, ProxyError> {
        let (fork_height, fork_hash) = self.find_fork_point(&msg.locator_hashes)?;
        let tip = self.effective_tip()?;
        let stop = msg.stop();

        let mut headers = vec![];
        let mut prev = fork_hash;
        for height in (fork_height + 1)..=tip {
            if headers.len() >= MAX_HEADERS_RESULTS {
                break;
            }
            if let Some(stale) = self.next_stale_candidate(&prev, stop) {
                info!(
                    "Offer stale header {} at height {} ahead of the canonical block",
                    stale.hash, stale.height
                );
                headers.push(LoneBlockHeader::new(stale.block.header));
                break;
            }

            let hash = self.chain.hash_at(height)?;
            headers.push(LoneBlockHeader::new(self.chain.header(&hash)?));
            if stop == Some(&hash) {
                break;
            }
            prev = hash;
        }

        debug!(
            "Answer getheaders from fork height {} (tip {}) with {} headers",
            fork_height,
            tip,
            headers.len()
        );
        Ok(headers)
    }

    fn get_data(
        &self,
        inventory: &[Inventory],
        replies: &mut Vec<NetworkMessage>,
    ) -> Result<(), ProxyError> {
        for inv in inventory {
            if !inv.inv_type.is_block() {
                trace!("Ignore non-block getdata entry {:?}", inv.inv_type);
                continue;
            }
            if self.serve_stale(&inv.hash, replies)? {
                continue;
            }
            self.serve_active(&inv.hash, replies)?;
        }
        Ok(())
    }

    /// Serve `hash` if it is a stale block nobody has received yet.
    /// Returns whether it was served.
    fn serve_stale(
        &self,
        hash: &Sha256dHash,
        replies: &mut Vec<NetworkMessage>,
    ) -> Result<bool, ProxyError> {
        let Some(record) = self.catalog.lookup(hash) else {
            return Ok(false);
        };
        if self.above_ceiling(record.height) {
            debug!(
                "Stale block {} at height {} is above the ceiling",
                hash, record.height
            );
            return Ok(false);
        }
        if self.served.contains(hash) {
            debug!("Stale block {} was already served", hash);
            return Ok(false);
        }

        // resolve upstream data before claiming the block, so that a failure
        // leaves it available
        let tip = self.effective_tip()?;
        let next = if record.height < tip {
            Some(self.chain.hash_at(record.height + 1)?)
        } else {
            None
        };

        if !self.served.mark_served(hash) {
            debug!("Stale block {} was served concurrently", hash);
            return Ok(false);
        }
        let position = self
            .ledger
            .append(ServedKind::Stale, record.height, record.hash);
        info!(
            "Serve stale block {} at height {} (ledger #{})",
            record.hash, record.height, position
        );
        replies.push(NetworkMessage::Block(record.block.clone()));
        if let Some(next) = next {
            replies.push(NetworkMessage::Inv(vec![Inventory::block(next)]));
        }
        Ok(true)
    }

    fn serve_active(
        &self,
        hash: &Sha256dHash,
        replies: &mut Vec<NetworkMessage>,
    ) -> Result<(), ProxyError> {
        let Some(height) = self.chain.active_height_of(hash)? else {
            debug!("Ignore getdata for unknown block {}", hash);
            return Ok(());
        };
        if self.above_ceiling(height) {
            debug!("Ignore getdata for block {} above the ceiling", hash);
            return Ok(());
        }
        let block = self.chain.block(hash)?;
        let position = self.ledger.append(ServedKind::Active, height, *hash);
        debug!(
            "Serve active block {} at height {} (ledger #{})",
            hash, height, position
        );
        replies.push(NetworkMessage::Block(block.as_ref().clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use replay_common::deps_common::bitcoin::network::message_blockdata::InvType;
    use replay_common::deps_common::bitcoin::network::serialize::BitcoinHash;

    use super::*;
    use crate::testing::MockUpstream;
    use crate::upstream::UpstreamError;

    /// Engine over a mock chain with tip `tip` and stale blocks at `stale_heights`
    fn setup(
        tip: u64,
        stale_heights: &[u64],
        max_height: Option<u64>,
    ) -> ReplayEngine<MockUpstream> {
        let upstream = MockUpstream::new(tip);
        let records = stale_heights
            .iter()
            .map(|h| upstream.stale_record(*h, 1))
            .collect();
        ReplayEngine::new(
            Arc::new(StaleCatalog::from_records(records)),
            Arc::new(ChainView::new(upstream)),
            Arc::new(ServedStaleSet::new()),
            Arc::new(ServedBlockLedger::new()),
            max_height,
        )
    }

    fn getheaders(locator: Vec<Sha256dHash>, stop: Sha256dHash) -> ReplayRequest {
        ReplayRequest::GetHeaders(GetHeadersMessage::new(locator, stop))
    }

    fn getdata(hashes: &[Sha256dHash]) -> ReplayRequest {
        ReplayRequest::GetData(hashes.iter().map(|h| Inventory::witness_block(*h)).collect())
    }

    fn header_hashes(replies: &[NetworkMessage]) -> Vec<Sha256dHash> {
        match replies {
            [NetworkMessage::Headers(headers)] => {
                headers.iter().map(|h| h.header.bitcoin_hash()).collect()
            }
            other => panic!("expected one headers message, got {:?}", other),
        }
    }

    fn block_hashes(replies: &[NetworkMessage]) -> Vec<Sha256dHash> {
        replies
            .iter()
            .filter_map(|m| match m {
                NetworkMessage::Block(b) => Some(b.bitcoin_hash()),
                _ => None,
            })
            .collect()
    }

    fn upstream(engine: &ReplayEngine<MockUpstream>) -> &MockUpstream {
        engine.chain().upstream()
    }

    #[test]
    fn test_headers_without_stale_blocks() {
        let engine = setup(10, &[], None);
        let genesis = upstream(&engine).hash_at(0);

        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![genesis], Sha256dHash::default()))
                .unwrap(),
        );
        let expected: Vec<_> = (1..=10).map(|h| upstream(&engine).hash_at(h)).collect();
        assert_eq!(hashes, expected);

        // already at the tip
        let tip = upstream(&engine).hash_at(10);
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![tip], Sha256dHash::default()))
                .unwrap(),
        );
        assert!(hashes.is_empty());
    }

    #[test]
    fn test_unknown_locator_falls_back_to_genesis() {
        let engine = setup(5, &[], None);
        let hashes = header_hashes(
            &engine
                .respond(getheaders(
                    vec![Sha256dHash::from_data(b"elsewhere")],
                    Sha256dHash::default(),
                ))
                .unwrap(),
        );
        assert_eq!(hashes.len(), 5);
        assert_eq!(hashes[0], upstream(&engine).hash_at(1));

        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![], Sha256dHash::default()))
                .unwrap(),
        );
        assert_eq!(hashes.len(), 5);
    }

    #[test]
    fn test_locator_uses_newest_active_entry() {
        let engine = setup(10, &[], None);
        let h7 = upstream(&engine).hash_at(7);
        let h3 = upstream(&engine).hash_at(3);
        let (height, hash) = engine
            .find_fork_point(&[Sha256dHash::from_data(b"x"), h7, h3])
            .unwrap();
        assert_eq!((height, hash), (7, h7));
    }

    #[test]
    fn test_stale_block_served_before_canonical() {
        let engine = setup(10, &[5], None);
        let up = upstream(&engine);
        let genesis = up.hash_at(0);
        let stale = up.stale_block_at(5, 1).bitcoin_hash();

        // first round ends with the stale header
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![genesis], Sha256dHash::default()))
                .unwrap(),
        );
        let mut expected: Vec<_> = (1..=4).map(|h| up.hash_at(h)).collect();
        expected.push(stale);
        assert_eq!(hashes, expected);

        // until it is fetched, the stale header keeps being offered
        let h4 = up.hash_at(4);
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![h4], Sha256dHash::default()))
                .unwrap(),
        );
        assert_eq!(hashes, vec![stale]);

        let mut canonical: Vec<_> = (1..=4).map(|h| up.hash_at(h)).collect();
        canonical.push(stale);
        let replies = engine.respond(getdata(&canonical)).unwrap();
        assert_eq!(block_hashes(&replies), canonical);
        assert_eq!(
            replies.last(),
            Some(&NetworkMessage::Inv(vec![Inventory::block(up.hash_at(6))]))
        );

        // the target now sits on the stale block; its locator falls back to h4
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![stale, h4, genesis], Sha256dHash::default()))
                .unwrap(),
        );
        let expected: Vec<_> = (5..=10).map(|h| up.hash_at(h)).collect();
        assert_eq!(hashes, expected);

        let replies = engine.respond(getdata(&expected)).unwrap();
        assert_eq!(block_hashes(&replies), expected);

        let ledger = &engine.ledger;
        let stale_pos = ledger.position_of(&stale).unwrap();
        let canonical_pos = ledger.position_of(&up.hash_at(5)).unwrap();
        assert!(stale_pos < canonical_pos);
        let served = ledger.served_stale();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0].height, 5);
        assert_eq!(served[0].hash, stale);
        assert_eq!(ledger.len(), 11);
    }

    #[test]
    fn test_stale_block_served_at_most_once() {
        let engine = setup(10, &[5], None);
        let stale = upstream(&engine).stale_block_at(5, 1).bitcoin_hash();

        let first = engine.respond(getdata(&[stale])).unwrap();
        assert_eq!(block_hashes(&first), vec![stale]);

        // a second request falls through to the active chain, which does not have it
        let second = engine.respond(getdata(&[stale])).unwrap();
        assert!(second.is_empty());

        // and another session sharing the served set gets nothing either
        let other_session = engine.clone();
        assert!(other_session.respond(getdata(&[stale])).unwrap().is_empty());
        assert_eq!(engine.ledger.served_stale().len(), 1);
        assert_eq!(engine.ledger.len(), 1);
    }

    #[test]
    fn test_stale_block_served_once_across_threads() {
        let engine = setup(10, &[5], None);
        let stale = upstream(&engine).stale_block_at(5, 1).bitcoin_hash();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || engine.respond(getdata(&[stale])).unwrap())
            })
            .collect();
        let served: usize = handles
            .into_iter()
            .map(|h| block_hashes(&h.join().unwrap()).len())
            .sum();

        assert_eq!(served, 1);
        assert_eq!(engine.ledger.served_stale().len(), 1);
    }

    #[test]
    fn test_no_announcement_for_stale_block_at_tip() {
        let engine = setup(10, &[10], None);
        let stale = upstream(&engine).stale_block_at(10, 1).bitcoin_hash();
        let replies = engine.respond(getdata(&[stale])).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(block_hashes(&replies), vec![stale]);
    }

    #[test]
    fn test_max_height_ceiling() {
        let engine = setup(10, &[8], Some(6));
        let up = upstream(&engine);
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![up.hash_at(0)], Sha256dHash::default()))
                .unwrap(),
        );
        let expected: Vec<_> = (1..=6).map(|h| up.hash_at(h)).collect();
        assert_eq!(hashes, expected);

        // a stale block above the ceiling is never offered
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![up.hash_at(6)], Sha256dHash::default()))
                .unwrap(),
        );
        assert!(hashes.is_empty());
        assert_eq!(engine.effective_tip().unwrap(), 6);
    }

    #[test]
    fn test_getdata_above_ceiling_is_ignored() {
        let engine = setup(10, &[8], Some(6));
        let up = upstream(&engine);
        let stale = up.stale_block_at(8, 1).bitcoin_hash();

        let replies = engine.respond(getdata(&[stale, up.hash_at(9)])).unwrap();
        assert!(replies.is_empty());
        assert!(engine.ledger.is_empty());
        assert!(!engine.served.contains(&stale));

        // blocks at the ceiling are still served
        let replies = engine.respond(getdata(&[up.hash_at(6)])).unwrap();
        assert_eq!(block_hashes(&replies), vec![up.hash_at(6)]);
    }

    #[test]
    fn test_stale_at_ceiling_announces_nothing() {
        let engine = setup(10, &[6], Some(6));
        let stale = upstream(&engine).stale_block_at(6, 1).bitcoin_hash();
        let replies = engine.respond(getdata(&[stale])).unwrap();
        assert_eq!(replies.len(), 1);
    }

    #[test]
    fn test_hash_stop() {
        let engine = setup(10, &[5], None);
        let up = upstream(&engine);
        let genesis = up.hash_at(0);

        // stop before the stale block's height
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![genesis], up.hash_at(3)))
                .unwrap(),
        );
        let expected: Vec<_> = (1..=3).map(|h| up.hash_at(h)).collect();
        assert_eq!(hashes, expected);

        // stop on the stale block itself
        let stale = up.stale_block_at(5, 1).bitcoin_hash();
        let hashes = header_hashes(&engine.respond(getheaders(vec![genesis], stale)).unwrap());
        assert_eq!(hashes.last(), Some(&stale));
        assert_eq!(hashes.len(), 5);

        // a stop hash past the stale height skips the stale candidate
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![genesis], up.hash_at(7)))
                .unwrap(),
        );
        let expected: Vec<_> = (1..=7).map(|h| up.hash_at(h)).collect();
        assert_eq!(hashes, expected);
    }

    #[test]
    fn test_headers_capped_at_2000() {
        let engine = setup(2500, &[], None);
        let up = upstream(&engine);
        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![up.hash_at(0)], Sha256dHash::default()))
                .unwrap(),
        );
        assert_eq!(hashes.len(), MAX_HEADERS_RESULTS);
        assert_eq!(hashes.last(), Some(&up.hash_at(2000)));

        let hashes = header_hashes(
            &engine
                .respond(getheaders(vec![up.hash_at(2000)], Sha256dHash::default()))
                .unwrap(),
        );
        assert_eq!(hashes.len(), 500);
    }

    #[test]
    fn test_getdata_filters_entries() {
        let engine = setup(5, &[], None);
        let up = upstream(&engine);
        let h2 = up.hash_at(2);
        let h3 = up.hash_at(3);

        let request = ReplayRequest::GetData(vec![
            Inventory {
                inv_type: InvType::Transaction,
                hash: h2,
            },
            Inventory {
                inv_type: InvType::WitnessTransaction,
                hash: h2,
            },
            Inventory::witness_block(Sha256dHash::from_data(b"unknown")),
            Inventory::block(h3),
            Inventory::witness_block(h2),
        ]);
        let replies = engine.respond(request).unwrap();
        assert_eq!(block_hashes(&replies), vec![h3, h2]);

        let entries = engine.ledger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ServedKind::Active);
        assert_eq!(entries[0].height, 3);
    }

    #[test]
    fn test_upstream_failure_is_fatal_and_keeps_stale_available() {
        let engine = setup(10, &[5], None);
        let stale = upstream(&engine).stale_block_at(5, 1).bitcoin_hash();

        upstream(&engine).set_offline(true);
        match engine.respond(getdata(&[stale])) {
            Err(ProxyError::Upstream(UpstreamError::Rpc(_))) => {}
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert!(engine
            .respond(getheaders(vec![], Sha256dHash::default()))
            .is_err());
        assert!(engine.ledger.is_empty());

        upstream(&engine).set_offline(false);
        let replies = engine.respond(getdata(&[stale])).unwrap();
        assert_eq!(block_hashes(&replies), vec![stale]);
    }

    #[test]
    fn test_partial_replies_survive_failure() {
        let engine = setup(5, &[], None);
        let h1 = upstream(&engine).hash_at(1);
        let mut replies = vec![];
        engine.handle(getdata(&[h1]), &mut replies).unwrap();
        assert_eq!(replies.len(), 1);

        upstream(&engine).set_offline(true);
        let h2 = upstream(&engine).hash_at(2);
        assert!(engine.handle(getdata(&[h1, h2]), &mut replies).is_err());
        // h1 is fully cached, so it was answered before h2 failed
        assert_eq!(block_hashes(&replies), vec![h1, h1]);
    }

    #[test]
    fn test_request_conversion() {
        let msg = NetworkMessage::GetData(vec![]);
        assert_eq!(
            ReplayRequest::try_from(msg),
            Ok(ReplayRequest::GetData(vec![]))
        );
        assert_eq!(
            ReplayRequest::try_from(NetworkMessage::Verack),
            Err(NetworkMessage::Verack)
        );
    }
}
