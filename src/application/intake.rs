use super::dispatcher::ActionDispatcher;
use crate::domain::message::{InboundMessage, ReplyMessage};
use crate::domain::ports::{IntentClassifier, MessageFeed, ReplySink};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Counters reported when a feed ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeStats {
    pub received: usize,
    pub skipped_own: usize,
    pub replied: usize,
    pub emit_failures: usize,
    pub feed_errors: usize,
}

impl IntakeStats {
    fn record(&mut self, result: Result<bool, JoinError>) {
        match result {
            Ok(true) => self.replied += 1,
            Ok(false) => self.emit_failures += 1,
            Err(err) => {
                tracing::error!(error = %err, "message task aborted");
                self.emit_failures += 1;
            }
        }
    }
}

/// Consumes inbound chat messages and answers each user message exactly once.
///
/// Messages are processed concurrently, bounded by `max_in_flight`. The
/// service's own replies are recognised by their sender tag and ignored.
#[derive(Clone)]
pub struct MessageIntake {
    classifier: Arc<dyn IntentClassifier>,
    dispatcher: Arc<ActionDispatcher>,
    sink: Arc<dyn ReplySink>,
    max_in_flight: usize,
}

impl MessageIntake {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        dispatcher: Arc<ActionDispatcher>,
        sink: Arc<dyn ReplySink>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            sink,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Builds the reply for one message; `None` for the service's own messages.
    pub async fn handle(&self, message: &InboundMessage) -> Option<ReplyMessage> {
        if message.is_system() {
            return None;
        }
        tracing::info!(message_id = %message.id, "new message");
        let record = self.classifier.classify(&message.content).await;
        let text = self.dispatcher.dispatch(&message.id, record).await;
        Some(ReplyMessage::to(message, text))
    }

    async fn process(&self, message: InboundMessage) -> bool {
        let Some(reply) = self.handle(&message).await else {
            return true;
        };
        match self.sink.emit(reply).await {
            Ok(()) => {
                tracing::info!(message_id = %message.id, "reply sent");
                true
            }
            Err(err) => {
                tracing::error!(message_id = %message.id, error = %err, "failed to emit reply");
                false
            }
        }
    }

    /// Runs until the feed ends, then waits for in-flight messages.
    pub async fn run<F: MessageFeed>(&self, feed: F) -> IntakeStats {
        self.run_until(feed, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops reading the feed once `shutdown`
    /// resolves. Messages already taken from the feed are still answered.
    pub async fn run_until<F, S>(&self, mut feed: F, shutdown: S) -> IntakeStats
    where
        F: MessageFeed,
        S: Future<Output = ()>,
    {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut stats = IntakeStats::default();
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            let item = tokio::select! {
                item = feed.next_message() => item,
                () = &mut shutdown => {
                    tracing::info!(in_flight = tasks.len(), "shutdown requested, finishing in-flight messages");
                    break;
                }
            };
            let Some(item) = item else {
                break;
            };
            let message = match item {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable inbound message");
                    stats.feed_errors += 1;
                    continue;
                }
            };
            stats.received += 1;
            if message.is_system() {
                stats.skipped_own += 1;
                continue;
            }

            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let intake = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                intake.process(message).await
            });

            while let Some(result) = tasks.try_join_next() {
                stats.record(result);
            }
        }

        while let Some(result) = tasks.join_next().await {
            stats.record(result);
        }
        tracing::info!(?stats, "message intake stopped");
        stats
    }
}
