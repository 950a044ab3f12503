//! Fan-out of accepted blocks to subscribers

use crate::core::Block;
use tokio::sync::broadcast;

/// Default number of blocks buffered per subscriber
pub const DEFAULT_BROADCAST_CAPACITY: usize = 100;

/// Publishes every appended block exactly once.
///
/// Publishing never waits on subscribers; a receiver that falls more than
/// `capacity` blocks behind gets `RecvError::Lagged` and loses the oldest.
#[derive(Debug)]
pub struct BlockBroadcaster {
    sender: broadcast::Sender<Block>,
}

impl BlockBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a block to all subscribers
    pub fn publish(&self, block: Block) {
        // No subscribers is fine
        let _ = self.sender.send(block);
    }

    /// Subscribe to blocks appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Block> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BlockBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn empty_block(timestamp: i64) -> Block {
        Block::new(Block::genesis().hash, vec![], timestamp)
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broadcaster = BlockBroadcaster::default();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.publish(empty_block(1));
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let broadcaster = BlockBroadcaster::default();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        let block = empty_block(1);
        broadcaster.publish(block.clone());

        assert_eq!(first.recv().await.unwrap(), block);
        assert_eq!(second.recv().await.unwrap(), block);
        assert_eq!(first.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let broadcaster = BlockBroadcaster::new(2);
        let mut slow = broadcaster.subscribe();

        for ts in 1..=4 {
            broadcaster.publish(empty_block(ts));
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(slow.recv().await.unwrap().timestamp, 3);
    }
}
