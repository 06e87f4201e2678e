use crate::error::ChainError;
use crate::guard::ChainGuard;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::validation::validate_segment_linkage;

pub type Sha256Hash = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: u64,
    pub previous_hash: Sha256Hash,
    pub payload_root: Sha256Hash,
    pub difficulty: u64,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.payload_root);
        hasher.update(self.difficulty.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(height: u64, previous_hash: Sha256Hash, difficulty: u64, payload: Vec<u8>) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let payload_root = Block::calculate_payload_root(&payload);

        Block {
            header: BlockHeader {
                height,
                timestamp,
                previous_hash,
                payload_root,
                difficulty,
                nonce: 0,
            },
            payload,
        }
    }

    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn calculate_payload_root(payload: &[u8]) -> Sha256Hash {
        Sha256::digest(payload).into()
    }
}

/// Snapshot of the local best chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChainTip {
    pub height: u64,
    pub difficulty: u64,
}

/// Read access to the local chain, as needed by the reorg guard.
///
/// `current_tip` must return height and difficulty of the same head block;
/// the guard calls it exactly once per evaluation.
pub trait ChainReader {
    fn current_tip(&self) -> ChainTip;

    fn block_at_height(&self, _height: u64) -> Option<Block> {
        None
    }
}

impl ChainReader for ChainTip {
    fn current_tip(&self) -> ChainTip {
        *self
    }
}

/// Anything the guard can score. Only the height matters.
pub trait CandidateBlock {
    fn height(&self) -> u64;
}

impl CandidateBlock for Block {
    fn height(&self) -> u64 {
        self.header.height
    }
}

impl CandidateBlock for BlockHeader {
    fn height(&self) -> u64 {
        self.height
    }
}

// A bare height is a complete candidate as far as scoring goes.
impl CandidateBlock for u64 {
    fn height(&self) -> u64 {
        *self
    }
}

const GENESIS_TIMESTAMP: u64 = 1672531200000;

/// In-memory chain store. Heights are contiguous from genesis, so
/// `blocks[h]` is the block at height `h`.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    /// Difficulty stamped on locally built blocks.
    pub difficulty: u64,
}

impl Blockchain {
    pub fn new(initial_difficulty: u64) -> Self {
        Blockchain {
            blocks: vec![Self::create_genesis_block(initial_difficulty)],
            difficulty: initial_difficulty,
        }
    }

    fn create_genesis_block(initial_difficulty: u64) -> Block {
        let payload = b"genesis".to_vec();
        let payload_root = Block::calculate_payload_root(&payload);

        Block {
            header: BlockHeader {
                height: 0,
                timestamp: GENESIS_TIMESTAMP,
                previous_hash: [0u8; 32],
                payload_root,
                difficulty: initial_difficulty,
                nonce: 0,
            },
            payload,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tip(&self) -> &Block {
        // Never empty: the genesis block is installed by `new` and cannot be replaced.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.tip().header.height
    }

    pub fn get_block_by_height(&self, height: u64) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|i| self.blocks.get(i))
    }

    /// Build (but do not apply) the next block on top of the current tip.
    pub fn next_block(&self, payload: Vec<u8>) -> Block {
        let tip = self.tip();
        Block::new(tip.header.height + 1, tip.hash(), self.difficulty, payload)
    }

    /// Append `count` locally built blocks.
    pub fn extend_local(&mut self, count: u64) -> Result<(), ChainError> {
        for i in 0..count {
            let block = self.next_block(i.to_le_bytes().to_vec());
            self.apply_block(block)?;
        }
        Ok(())
    }

    /// Build a competing branch of `len` blocks whose first block has the
    /// local block at `parent_height` as its parent. `tag` makes the branch
    /// hashes differ from the local ones.
    pub fn build_branch(&self, parent_height: u64, len: u64, tag: &[u8]) -> Result<Vec<Block>, ChainError> {
        let parent = self
            .get_block_by_height(parent_height)
            .ok_or(ChainError::ForkNotFound(parent_height + 1))?;

        let mut branch: Vec<Block> = Vec::new();
        let mut previous_hash = parent.hash();
        for offset in 1..=len {
            let mut payload = tag.to_vec();
            payload.extend_from_slice(&offset.to_le_bytes());
            let block = Block::new(parent_height + offset, previous_hash, self.difficulty, payload);
            previous_hash = block.hash();
            branch.push(block);
        }
        Ok(branch)
    }

    pub fn apply_block(&mut self, block: Block) -> Result<(), ChainError> {
        if block.header.height == 0 {
            return Err(ChainError::InvalidBlock("Genesis block cannot be re-applied.".to_string()));
        }

        let last_block = self.tip();
        if block.header.height != last_block.header.height + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid block height. Expected {}, but got {}.",
                last_block.header.height + 1,
                block.header.height
            )));
        }

        if block.header.previous_hash != last_block.hash() {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid previous block hash. Expected {}, but got {}.",
                hex::encode(last_block.hash()),
                hex::encode(block.header.previous_hash)
            )));
        }

        let expected_payload_root = Block::calculate_payload_root(&block.payload);
        if expected_payload_root != block.header.payload_root {
            return Err(ChainError::InvalidBlock(format!(
                "Payload root mismatch. Expected {}, but got {}.",
                hex::encode(expected_payload_root),
                hex::encode(block.header.payload_root)
            )));
        }

        self.blocks.push(block);
        Ok(())
    }

    /// Adopt a peer-delivered segment, replacing the local suffix it forks off.
    ///
    /// The reorg guard runs before anything is touched; a rejected segment
    /// leaves the chain unchanged. Returns the number of blocks applied
    /// (blocks already present locally are skipped).
    pub fn insert_chain(&mut self, segment: Vec<Block>, guard: &ChainGuard) -> Result<usize, ChainError> {
        let Some(first) = segment.first() else {
            return Ok(0);
        };
        let first_height = first.header.height;

        validate_segment_linkage(&segment)?;
        guard.check(&*self, &segment)?;

        let fork_height = first_height
            .checked_sub(1)
            .ok_or_else(|| ChainError::InvalidBlock("Segment cannot replace the genesis block.".to_string()))?;
        let parent = self
            .get_block_by_height(fork_height)
            .ok_or(ChainError::ForkNotFound(first_height))?;
        if parent.hash() != first.header.previous_hash {
            return Err(ChainError::ForkNotFound(first_height));
        }

        let known = segment
            .iter()
            .take_while(|b| self.get_block_by_height(b.header.height).map(Block::hash) == Some(b.hash()))
            .count();
        if known == segment.len() {
            debug!(first_height, "segment already present, nothing to import");
            return Ok(0);
        }

        let split_at = (first_height as usize) + known;
        let removed = self.blocks.split_off(split_at.min(self.blocks.len()));
        let new_blocks: Vec<Block> = segment.into_iter().skip(known).collect();
        let imported = new_blocks.len();

        for block in new_blocks {
            if let Err(e) = self.apply_block(block) {
                self.blocks.truncate(split_at);
                self.blocks.extend(removed);
                return Err(e);
            }
        }

        if !removed.is_empty() {
            info!(
                depth = removed.len(),
                fork_height = split_at as u64 - 1,
                new_height = self.height(),
                "chain reorganized"
            );
        }
        Ok(imported)
    }
}

impl ChainReader for Blockchain {
    fn current_tip(&self) -> ChainTip {
        let tip = self.tip();
        ChainTip {
            height: tip.header.height,
            difficulty: tip.header.difficulty,
        }
    }

    fn block_at_height(&self, height: u64) -> Option<Block> {
        self.get_block_by_height(height).cloned()
    }
}
