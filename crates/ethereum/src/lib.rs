//! Chain event feed boundary: a narrow trait the engine drives, reduced to
//! the single operation the core actually needs. Log decoding and reorg
//! handling are out of scope (they live upstream of this crate); what's
//! here is the seam plus a fixture source for tests and offline replay.

use std::collections::VecDeque;

use async_trait::async_trait;

use tablesql_core::BlockEvents;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("event feed exhausted or disconnected: {0}")]
    Disconnected(String),
}

/// Source of already-decoded, per-block event batches, consumed one block
/// at a time by the executor's drive loop.
#[async_trait]
pub trait BlockEventsSource: Send + Sync {
    async fn next_block(&mut self) -> Result<Option<BlockEvents>, FeedError>;
}

/// Replays a fixed, in-memory sequence of blocks, used in tests and for
/// driving the binary against recorded fixtures rather than a live chain.
pub struct FixtureBlockEventsSource {
    blocks: VecDeque<BlockEvents>,
}

impl FixtureBlockEventsSource {
    pub fn new(blocks: Vec<BlockEvents>) -> Self {
        Self { blocks: blocks.into() }
    }

    /// Parses fixture blocks from a JSON array of `BlockEvents`.
    pub fn from_json(data: &str) -> Result<Self, FeedError> {
        let blocks: Vec<BlockEvents> =
            serde_json::from_str(data).map_err(|e| FeedError::Disconnected(e.to_string()))?;
        Ok(Self::new(blocks))
    }
}

#[async_trait]
impl BlockEventsSource for FixtureBlockEventsSource {
    async fn next_block(&mut self) -> Result<Option<BlockEvents>, FeedError> {
        Ok(self.blocks.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesql_core::ChainId;

    #[tokio::test]
    async fn fixture_source_replays_in_order() {
        let blocks = vec![
            BlockEvents { chain_id: ChainId(1337), block_number: 1, txns: vec![] },
            BlockEvents { chain_id: ChainId(1337), block_number: 2, txns: vec![] },
        ];
        let mut source = FixtureBlockEventsSource::new(blocks);
        assert_eq!(source.next_block().await.unwrap().unwrap().block_number, 1);
        assert_eq!(source.next_block().await.unwrap().unwrap().block_number, 2);
        assert!(source.next_block().await.unwrap().is_none());
    }
}
