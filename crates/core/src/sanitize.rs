//! Block list sanitation applied to every save payload.

use std::collections::HashSet;

use crate::block::{new_block_id, Block};

/// Give every block with a blank id a fresh one.
pub fn ensure_block_ids(blocks: Vec<Block>) -> Vec<Block> {
    blocks
        .into_iter()
        .map(|mut block| {
            if block.id.trim().is_empty() {
                block.id = new_block_id();
            }
            block
        })
        .collect()
}

/// Drop blocks whose id was already seen, keeping the first occurrence.
pub fn deduplicate_blocks(blocks: Vec<Block>) -> Vec<Block> {
    let mut seen = HashSet::with_capacity(blocks.len());
    blocks
        .into_iter()
        .filter(|block| seen.insert(block.id.clone()))
        .collect()
}

/// `deduplicate_blocks(ensure_block_ids(blocks))`.
pub fn sanitize_blocks(blocks: Vec<Block>) -> Vec<Block> {
    deduplicate_blocks(ensure_block_ids(blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;

    fn block(id: &str, kind: BlockKind) -> Block {
        let mut b = Block::new(kind);
        b.id = id.to_string();
        b
    }

    #[test]
    fn blank_ids_are_filled() {
        let blocks = ensure_block_ids(vec![block("", BlockKind::Text), block("  ", BlockKind::Link)]);
        assert!(blocks.iter().all(|b| !b.id.trim().is_empty()));
        assert_ne!(blocks[0].id, blocks[1].id);
    }

    #[test]
    fn existing_ids_are_kept() {
        let blocks = ensure_block_ids(vec![block("a", BlockKind::Text)]);
        assert_eq!(blocks[0].id, "a");
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let blocks = deduplicate_blocks(vec![
            block("a", BlockKind::Text),
            block("b", BlockKind::Link),
            block("a", BlockKind::Image),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind(), BlockKind::Text);
        assert_eq!(blocks[1].id, "b");
    }

    #[test]
    fn sanitation_is_idempotent() {
        let input = vec![
            block("a", BlockKind::Text),
            block("", BlockKind::Link),
            block("a", BlockKind::Image),
            block("", BlockKind::Faq),
            block("c", BlockKind::Event),
            block("c", BlockKind::Event),
        ];
        let once = sanitize_blocks(input);
        let twice = sanitize_blocks(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }
}
