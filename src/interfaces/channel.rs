//! In-process transport over tokio channels, for embedding the service.

use crate::domain::message::{InboundMessage, ReplyMessage};
use crate::domain::ports::{MessageFeed, ReplySink};
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub struct ChannelFeed {
    receiver: mpsc::Receiver<InboundMessage>,
}

impl ChannelFeed {
    pub fn new(receiver: mpsc::Receiver<InboundMessage>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl MessageFeed for ChannelFeed {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, TransportError>> {
        self.receiver.recv().await.map(Ok)
    }
}

pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ReplyMessage>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<ReplyMessage>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl ReplySink for ChannelSink {
    async fn emit(&self, reply: ReplyMessage) -> Result<(), TransportError> {
        self.sender.send(reply).map_err(|_| TransportError::Closed)
    }
}

/// A connected feed/sink pair plus the ends a caller drives.
pub fn channel_transport(
    capacity: usize,
) -> (
    mpsc::Sender<InboundMessage>,
    ChannelFeed,
    ChannelSink,
    mpsc::UnboundedReceiver<ReplyMessage>,
) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    (
        inbound_tx,
        ChannelFeed::new(inbound_rx),
        ChannelSink::new(reply_tx),
        reply_rx,
    )
}
