use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::FeedBatch;

/// Source of "units were added to or removed from the page" batches.
/// `None` means the feed is closed for good.
#[async_trait]
pub trait ChangeFeed: Send {
    async fn next_batch(&mut self) -> Option<FeedBatch>;
}

pub struct ChannelFeed {
    receiver: mpsc::UnboundedReceiver<FeedBatch>,
}

#[derive(Clone)]
pub struct FeedPublisher {
    sender: mpsc::UnboundedSender<FeedBatch>,
}

pub fn channel_feed() -> (FeedPublisher, ChannelFeed) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (FeedPublisher { sender }, ChannelFeed { receiver })
}

impl FeedPublisher {
    /// Returns `false` once the scanner side has gone away.
    pub fn publish(&self, batch: FeedBatch) -> bool {
        if batch.is_empty() {
            return true;
        }
        self.sender.send(batch).is_ok()
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn next_batch(&mut self) -> Option<FeedBatch> {
        self.receiver.recv().await
    }
}
