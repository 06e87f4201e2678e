//! Peer segment import
//!
//! Every chain segment a peer delivers goes through the reorg guard before
//! it touches the local chain. This module tracks the delivering peers,
//! serializes imports behind the chain's write lock, and stops listening
//! to peers that keep proposing rejected reorgs.

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::guard::ChainGuard;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Rejected segments after which a peer is ignored.
pub const MAX_REJECTED_SEGMENTS: u32 = 3;

const PEER_STALE_AFTER: Duration = Duration::from_secs(300);

/// Peer sync information
#[derive(Debug, Clone)]
pub struct PeerSyncInfo {
    pub addr: String,
    pub height: u64,
    pub last_seen: Instant,
    pub blocks_received: u64,
    pub rejected_segments: u32,
    pub is_syncing: bool,
}

impl PeerSyncInfo {
    pub fn new(addr: String, height: u64) -> Self {
        Self {
            addr,
            height,
            last_seen: Instant::now(),
            blocks_received: 0,
            rejected_segments: 0,
            is_syncing: false,
        }
    }

    /// Check if peer should be considered unreliable
    pub fn is_unreliable(&self) -> bool {
        self.rejected_segments >= MAX_REJECTED_SEGMENTS
    }

    /// Check if peer is stale (not seen in 5 minutes)
    pub fn is_stale(&self) -> bool {
        self.last_seen.elapsed() > PEER_STALE_AFTER
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub blocks_imported: u64,
    pub segments_imported: u64,
    pub segments_rejected: u64,
    pub segments_invalid: u64,
}

pub struct SegmentSynchronizer {
    chain: Arc<RwLock<Blockchain>>,
    guard: Arc<ChainGuard>,
    peers: Arc<RwLock<HashMap<String, PeerSyncInfo>>>,
    stats: Arc<RwLock<SyncStats>>,
}

impl SegmentSynchronizer {
    pub fn new(chain: Arc<RwLock<Blockchain>>, guard: Arc<ChainGuard>) -> Self {
        Self {
            chain,
            guard,
            peers: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(SyncStats::default())),
        }
    }

    pub fn chain(&self) -> Arc<RwLock<Blockchain>> {
        Arc::clone(&self.chain)
    }

    pub fn guard(&self) -> Arc<ChainGuard> {
        Arc::clone(&self.guard)
    }

    /// Register a peer for synchronization
    pub async fn register_peer(&self, addr: &str, height: u64) -> Result<(), ChainError> {
        let mut peers = self.peers.write().await;

        if let std::collections::hash_map::Entry::Vacant(e) = peers.entry(addr.to_string()) {
            e.insert(PeerSyncInfo::new(addr.to_string(), height));
            Ok(())
        } else {
            Err(ChainError::NetworkError(format!("Peer {} already registered", addr)))
        }
    }

    /// Highest peer that is neither unreliable, stale, nor busy.
    pub async fn get_best_peer(&self) -> Option<String> {
        let peers = self.peers.read().await;

        peers
            .values()
            .filter(|p| !p.is_unreliable() && !p.is_stale() && !p.is_syncing)
            .max_by_key(|p| p.height)
            .map(|p| p.addr.clone())
    }

    pub async fn get_peer_info(&self, addr: &str) -> Option<PeerSyncInfo> {
        self.peers.read().await.get(addr).cloned()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn remove_peer(&self, addr: &str) -> Result<(), ChainError> {
        self.peers
            .write()
            .await
            .remove(addr)
            .map(|_| ())
            .ok_or_else(|| ChainError::NetworkError(format!("Peer {} not found", addr)))
    }

    pub async fn get_stats(&self) -> SyncStats {
        self.stats.read().await.clone()
    }

    async fn set_peer_syncing(&self, addr: &str, syncing: bool) -> Result<(), ChainError> {
        let mut peers = self.peers.write().await;
        let peer = peers
            .get_mut(addr)
            .ok_or_else(|| ChainError::NetworkError(format!("Peer {} not found", addr)))?;
        if syncing && peer.is_unreliable() {
            return Err(ChainError::NetworkError(format!(
                "Peer {} is marked unreliable after {} rejected segments",
                addr, peer.rejected_segments
            )));
        }
        peer.is_syncing = syncing;
        peer.last_seen = Instant::now();
        Ok(())
    }

    /// Run a peer-delivered segment through the guard and adopt it.
    ///
    /// Returns the number of blocks applied. A guard rejection surfaces as
    /// [`ChainError::RejectedReorg`] and counts against the peer.
    pub async fn import_segment(&self, addr: &str, segment: Vec<Block>) -> Result<usize, ChainError> {
        self.set_peer_syncing(addr, true).await?;
        let segment_len = segment.len();
        let last_height = segment.last().map(|b| b.header.height);

        let result = {
            let mut chain = self.chain.write().await;
            chain.insert_chain(segment, &self.guard)
        };

        let mut peers = self.peers.write().await;
        let mut stats = self.stats.write().await;
        if let Some(peer) = peers.get_mut(addr) {
            peer.is_syncing = false;
            match &result {
                Ok(imported) => {
                    peer.blocks_received += *imported as u64;
                    // The peer holds at least everything it just delivered.
                    if let Some(h) = last_height {
                        peer.height = peer.height.max(h);
                    }
                    stats.blocks_imported += *imported as u64;
                    stats.segments_imported += 1;
                    debug!(peer = addr, imported, segment_len, "segment imported");
                }
                Err(ChainError::RejectedReorg { penalty }) => {
                    peer.rejected_segments += 1;
                    stats.segments_rejected += 1;
                    warn!(peer = addr, penalty, rejected = peer.rejected_segments, "peer proposed a rejected reorg");
                    if peer.is_unreliable() {
                        warn!(peer = addr, "peer marked as unreliable");
                    }
                }
                Err(e) => {
                    stats.segments_invalid += 1;
                    warn!(peer = addr, error = %e, "segment import failed");
                }
            }
        }

        result
    }

    /// Drop peers that have not been seen for a while.
    pub async fn cleanup_stale_peers(&self) -> usize {
        let mut peers = self.peers.write().await;
        let before = peers.len();
        peers.retain(|addr, p| {
            let keep = !p.is_stale();
            if !keep {
                debug!(peer = %addr, "removing stale peer");
            }
            keep
        });
        before - peers.len()
    }
}
