use crate::error::ChainError;

use super::chain::Block;

/// Check that a delivered segment is internally consistent: strictly
/// consecutive heights, each block naming its predecessor as parent.
pub fn validate_segment_linkage(segment: &[Block]) -> Result<(), ChainError> {
    for pair in segment.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.header.height.checked_add(1) != Some(next.header.height) {
            return Err(ChainError::InvalidBlock(format!(
                "Segment is not contiguous: height {} follows {}",
                next.header.height, prev.header.height
            )));
        }
        if next.header.previous_hash != prev.hash() {
            return Err(ChainError::InvalidBlock(format!(
                "Block {} does not link to {} in the segment (parent {})",
                next.header.height,
                hex::encode(prev.hash()),
                hex::encode(next.header.previous_hash)
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;

    #[test]
    fn test_linked_branch_is_valid() {
        let mut chain = Blockchain::new(1);
        chain.extend_local(3).unwrap();
        let branch = chain.build_branch(1, 4, b"x").unwrap();
        assert!(validate_segment_linkage(&branch).is_ok());
        assert!(validate_segment_linkage(&[]).is_ok());
    }

    #[test]
    fn test_gap_in_heights() {
        let chain = Blockchain::new(1);
        let mut branch = chain.build_branch(0, 3, b"x").unwrap();
        branch.remove(1);
        assert!(matches!(validate_segment_linkage(&branch), Err(ChainError::InvalidBlock(_))));
    }

    #[test]
    fn test_height_overflow_is_invalid() {
        let top = Block::new(u64::MAX, [0u8; 32], 1, vec![1]);
        let wrapped = Block::new(0, top.hash(), 1, vec![2]);
        assert!(matches!(
            validate_segment_linkage(&[top, wrapped]),
            Err(ChainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_broken_parent_link() {
        let chain = Blockchain::new(1);
        let mut branch = chain.build_branch(0, 3, b"x").unwrap();
        branch[2].header.previous_hash = [0xAB; 32];
        assert!(matches!(validate_segment_linkage(&branch), Err(ChainError::InvalidBlock(_))));
    }
}
