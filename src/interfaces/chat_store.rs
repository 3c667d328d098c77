//! Transport over the conversation store's REST interface.
//!
//! New rows are picked up by polling for ids greater than the last one seen;
//! replies are inserted as new rows with the system sender tag.

use crate::config::ChatStoreConfig;
use crate::domain::message::{InboundMessage, MessageId, ReplyMessage};
use crate::domain::ports::{MessageFeed, ReplySink};
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Clone)]
pub struct ChatStoreClient {
    client: Client,
    table_url: String,
    api_key: String,
}

impl ChatStoreClient {
    pub fn new(config: &ChatStoreConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{}", config.url.trim_end_matches('/'), config.table),
            api_key: config.api_key.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Id of the newest stored message, so a fresh feed skips history.
    async fn latest_id(&self) -> std::result::Result<Option<MessageId>, TransportError> {
        #[derive(Deserialize)]
        struct IdOnly {
            id: MessageId,
        }

        let rows: Vec<IdOnly> = self
            .authorized(self.client.get(&self.table_url))
            .query(&[("select", "id"), ("order", "id.desc"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }

    /// Raw rows newer than `cursor`; each row is decoded by the feed on its own.
    async fn messages_after(
        &self,
        cursor: Option<&MessageId>,
    ) -> std::result::Result<Vec<Value>, TransportError> {
        let mut query = vec![("select", "*".to_string()), ("order", "id.asc".to_string())];
        if let Some(cursor) = cursor {
            query.push(("id", format!("gt.{cursor}")));
        }
        let rows = self
            .authorized(self.client.get(&self.table_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }

    /// Starts a feed at the current end of the table.
    pub async fn feed(&self, poll_interval: Duration) -> std::result::Result<PollingFeed, TransportError> {
        let cursor = self.latest_id().await?;
        tracing::info!(cursor = ?cursor, "listening for new chat messages");
        Ok(PollingFeed {
            store: self.clone(),
            cursor,
            poll_interval,
            pending: VecDeque::new(),
        })
    }
}

#[async_trait]
impl ReplySink for ChatStoreClient {
    async fn emit(&self, reply: ReplyMessage) -> std::result::Result<(), TransportError> {
        self.authorized(self.client.post(&self.table_url))
            .header("Prefer", "return=minimal")
            .json(&reply)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Endless feed of rows inserted after it started.
///
/// The cursor always moves past every fetched row, so a row that does not
/// decode is reported once and never fetched again.
pub struct PollingFeed {
    store: ChatStoreClient,
    cursor: Option<MessageId>,
    poll_interval: Duration,
    pending: VecDeque<std::result::Result<InboundMessage, TransportError>>,
}

impl PollingFeed {
    fn accept(&mut self, rows: Vec<Value>) {
        for row in rows {
            match row.get("id").cloned().map(serde_json::from_value::<MessageId>) {
                Some(Ok(id)) => self.cursor = Some(id),
                _ => tracing::warn!(row = %row, "chat row without a usable id"),
            }
            self.pending
                .push_back(serde_json::from_value(row).map_err(TransportError::from));
        }
    }
}

#[async_trait]
impl MessageFeed for PollingFeed {
    async fn next_message(&mut self) -> Option<std::result::Result<InboundMessage, TransportError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            tokio::time::sleep(self.poll_interval).await;
            match self.store.messages_after(self.cursor.as_ref()).await {
                Ok(rows) => self.accept(rows),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
